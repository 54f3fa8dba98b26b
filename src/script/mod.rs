pub mod error;
pub mod logger;
pub mod runtime;
pub mod types;

pub use error::ScriptError;
pub use logger::{ScriptLogger, TracingLogger};
pub use runtime::{ScriptOptions, ScriptRuntime};
pub use types::{Assertion, LogEntry, Phase, RequestProjection, ResponseProjection};
