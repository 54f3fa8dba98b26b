pub mod executor;
pub mod pipeline;
pub mod reporter;
pub mod types;

pub use executor::{FileReport, TestExecutor, collect_http_files};
pub use pipeline::{ExecuteError, ExecutionContext, Outcome, ScriptedResponse};
pub use reporter::TestReporter;
pub use types::{TestResult, TestSummary};
