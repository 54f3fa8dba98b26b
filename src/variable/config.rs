use crate::variable::resolver::VariableResolver;
use crate::variable::types::{Environment, ProjectConfig};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Unknown environment '{0}'")]
    UnknownProfile(String),

    #[error("Invalid variable '{0}': expected KEY=VALUE")]
    InvalidVariable(String),
}

/// 配置文件加载器
pub struct ConfigLoader;

impl ConfigLoader {
    /// 配置文件名
    pub const CONFIG_FILE: &'static str = "rqscript.toml";

    /// 从指定路径加载配置文件
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<ProjectConfig, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        debug!(path = %path.display(), "loaded config file");
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// 查找并加载配置文件
    /// 查找顺序：
    /// 1. 当前目录及其父目录
    /// 2. 用户配置目录 ~/.config/rqscript/
    pub fn find_and_load() -> Result<Option<ProjectConfig>, ConfigError> {
        match Self::find_config_path() {
            Some(path) => Self::load_from_path(path).map(Some),
            None => Ok(None),
        }
    }

    fn find_config_path() -> Option<PathBuf> {
        if let Ok(mut current) = std::env::current_dir() {
            loop {
                let config_path = current.join(Self::CONFIG_FILE);
                if config_path.exists() {
                    return Some(config_path);
                }
                if !current.pop() {
                    break;
                }
            }
        }

        let home = dirs::home_dir()?;
        let config_path = home
            .join(".config")
            .join("rqscript")
            .join(Self::CONFIG_FILE);
        config_path.exists().then_some(config_path)
    }

    /// 构建初始变量环境
    /// profile: 环境名称（如 "dev", "prod"）
    /// cli_vars: CLI 传入的变量覆盖（--var key=value），优先级最高
    pub fn build_environment(
        config: &ProjectConfig,
        profile: Option<&str>,
        cli_vars: &[(String, String)],
    ) -> Result<Environment, ConfigError> {
        let mut env = Environment::new();

        if let Some(name) = profile {
            let profile = config
                .get_profile(name)
                .ok_or_else(|| ConfigError::UnknownProfile(name.to_string()))?;
            for (key, value) in &profile.variables {
                env.insert(key.clone(), VariableResolver::resolve_env_vars(value));
            }
        }

        for (key, value) in cli_vars {
            env.insert(key.clone(), value.clone());
        }

        Ok(env)
    }

    /// 解析 CLI 变量参数 "key=value"
    pub fn parse_cli_var(s: &str) -> Result<(String, String), ConfigError> {
        s.split_once('=')
            .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
            .filter(|(k, _)| !k.is_empty())
            .ok_or_else(|| ConfigError::InvalidVariable(s.to_string()))
    }
}
