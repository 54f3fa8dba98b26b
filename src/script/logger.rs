use tracing::info;

use crate::script::types::LogEntry;

/// 接收脚本中 `log(...)` 输出的组件
pub trait ScriptLogger: Send + Sync {
    fn log(&self, entry: &LogEntry);
}

/// 默认实现：写入 tracing
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogger;

impl ScriptLogger for TracingLogger {
    fn log(&self, entry: &LogEntry) {
        info!(target: "rqscript::script", phase = %entry.phase, "{}", entry.message);
    }
}
