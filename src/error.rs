use thiserror::Error;

use crate::http::TransportError;
use crate::parser::ParseError;
use crate::runner::ExecuteError;
use crate::script::ScriptError;
use crate::variable::ConfigError;

#[derive(Error, Debug)]
pub enum RqError {
    #[error("解析错误: {0}")]
    Parse(#[from] ParseError),

    #[error("脚本错误: {0}")]
    Script(#[from] ScriptError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("执行失败: {0}")]
    Execute(#[from] ExecuteError),

    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),

    #[error("IO 错误: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

/// Result type for rqscript crate
pub type Result<T> = std::result::Result<T, RqError>;
