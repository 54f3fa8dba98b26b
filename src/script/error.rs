use boa_engine::JsError;

#[derive(Debug, Clone, thiserror::Error)]
pub enum ScriptError {
    /// 脚本语法错误
    #[error("Script compilation error: {message}")]
    Compilation { message: String },

    /// 脚本运行时错误，包括未捕获的异常和超出运行限制
    #[error("Script runtime error: {message}")]
    Runtime { message: String },

    /// 无法把宿主数据转换为脚本值（例如 JSON 响应体无效）
    #[error("Script projection error: {0}")]
    Projection(String),

    /// 脚本运行后无法读回结构化数据
    #[error("Script extraction error: {0}")]
    Extraction(String),
}

impl ScriptError {
    pub fn compilation<S: Into<String>>(message: S) -> Self {
        Self::Compilation {
            message: message.into(),
        }
    }

    pub fn runtime<S: Into<String>>(message: S) -> Self {
        Self::Runtime {
            message: message.into(),
        }
    }
}

impl From<JsError> for ScriptError {
    fn from(err: JsError) -> Self {
        Self::runtime(err.to_string())
    }
}
