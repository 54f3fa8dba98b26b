pub mod config;
pub mod resolver;
pub mod types;

pub use config::{ConfigError, ConfigLoader};
pub use resolver::VariableResolver;
pub use types::{Environment, Profile, ProjectConfig};
