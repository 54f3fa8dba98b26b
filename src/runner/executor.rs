use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info};

use crate::Result;
use crate::http::Transport;
use crate::parser::{self, ParsedFile};
use crate::runner::pipeline::ExecutionContext;
use crate::runner::types::TestResult;
use crate::script::{ScriptLogger, ScriptOptions, TracingLogger};
use crate::variable::Environment;

/// 一个文件的执行结果
#[derive(Debug, Clone)]
pub struct FileReport {
    pub path: PathBuf,
    pub results: Vec<TestResult>,
}

/// 按文件执行请求
///
/// 每个文件使用独立的 [`ExecutionContext`]，文件内的请求按顺序执行并共享环境。
pub struct TestExecutor {
    transport: Arc<dyn Transport>,
    logger: Arc<dyn ScriptLogger>,
    environment: Environment,
    options: ScriptOptions,
}

impl TestExecutor {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            logger: Arc::new(TracingLogger),
            environment: Environment::new(),
            options: ScriptOptions::default(),
        }
    }

    pub fn with_environment(mut self, environment: Environment) -> Self {
        self.environment = environment;
        self
    }

    pub fn with_logger(mut self, logger: Arc<dyn ScriptLogger>) -> Self {
        self.logger = logger;
        self
    }

    pub fn with_script_options(mut self, options: ScriptOptions) -> Self {
        self.options = options;
        self
    }

    fn context(&self) -> ExecutionContext {
        ExecutionContext::new(self.transport.clone())
            .with_environment(self.environment.clone())
            .with_logger(self.logger.clone())
            .with_script_options(self.options.clone())
    }

    /// 按顺序执行文件中的所有请求
    pub async fn execute_all(&self, parsed_file: ParsedFile) -> Vec<TestResult> {
        let mut ctx = self.context();
        let mut results = Vec::with_capacity(parsed_file.len());

        for (index, mut request) in parsed_file.requests.into_iter().enumerate() {
            let request_number = index + 1;
            let outcome = ctx.execute(&mut request).await;
            results.push(TestResult::from_outcome(request_number, &request, outcome));
        }

        results
    }

    /// 解析并执行单个文件，解析失败记为一个失败的结果
    pub async fn run_file<P: AsRef<Path>>(&self, path: P) -> FileReport {
        let path = path.as_ref().to_path_buf();
        info!(path = %path.display(), "running file");

        let results = match parser::parse_file(&path) {
            Ok(parsed) => self.execute_all(parsed).await,
            Err(e) => vec![TestResult::error(
                1,
                path.display().to_string(),
                format!("解析失败: {}", e),
            )],
        };

        FileReport { path, results }
    }

    /// 递归执行目录下所有 `.http` 文件（按路径排序）
    pub async fn run_dir<P: AsRef<Path>>(&self, dir: P) -> Result<Vec<FileReport>> {
        let files = collect_http_files(dir.as_ref())?;
        debug!(count = files.len(), "collected .http files");

        let mut reports = Vec::with_capacity(files.len());
        for file in files {
            reports.push(self.run_file(file).await);
        }
        Ok(reports)
    }

    /// 文件或目录
    pub async fn run_path<P: AsRef<Path>>(&self, path: P) -> Result<Vec<FileReport>> {
        let path = path.as_ref();
        if path.is_dir() {
            self.run_dir(path).await
        } else {
            Ok(vec![self.run_file(path).await])
        }
    }
}

/// 递归收集 `.http` 文件
pub fn collect_http_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let mut pending = vec![dir.to_path_buf()];

    while let Some(current) = pending.pop() {
        for entry in std::fs::read_dir(&current)? {
            let path = entry?.path();
            if path.is_dir() {
                pending.push(path);
            } else if path.extension().is_some_and(|ext| ext == "http") {
                files.push(path);
            }
        }
    }

    files.sort();
    Ok(files)
}
