pub mod error;
pub mod http;
pub mod logger;
pub mod parser;
pub mod runner;
pub mod script;
pub mod variable;

// Re-export commonly used types
pub use error::{Result, RqError};
pub use parser::{ParsedFile, ParsedRequest};
pub use runner::{ExecutionContext, Outcome, ScriptedResponse};
pub use variable::Environment;
