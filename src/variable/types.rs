use serde::Deserialize;
use std::collections::HashMap;

use crate::http::ClientOptions;
use crate::script::ScriptOptions;

/// 变量环境：变量名到字符串值的映射
///
/// 在一个执行上下文内由脚本读取和修改，修改在请求之间保留。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Environment {
    variables: HashMap<String, String>,
}

impl Environment {
    /// 创建新的空环境
    pub fn new() -> Self {
        Self::default()
    }

    /// 插入变量
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.variables.insert(key.into(), value.into());
    }

    /// 设置变量 (insert 的别名)
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.insert(key, value);
    }

    /// 获取变量值
    pub fn get(&self, key: &str) -> Option<&str> {
        self.variables.get(key).map(|s| s.as_str())
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.variables.remove(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.variables.contains_key(key)
    }

    /// 批量插入变量
    pub fn extend(&mut self, vars: impl IntoIterator<Item = (String, String)>) {
        self.variables.extend(vars);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.variables.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// 变量数量
    pub fn len(&self) -> usize {
        self.variables.len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    pub fn into_inner(self) -> HashMap<String, String> {
        self.variables
    }
}

impl From<HashMap<String, String>> for Environment {
    fn from(variables: HashMap<String, String>) -> Self {
        Self { variables }
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Environment {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            variables: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// 配置文件中的一个命名环境（如 dev、prod）
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Profile {
    /// 变量映射
    #[serde(flatten)]
    pub variables: HashMap<String, String>,
}

/// 完整的 rqscript.toml 配置
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ProjectConfig {
    /// 所有环境配置
    #[serde(default)]
    pub environments: HashMap<String, Profile>,

    #[serde(default)]
    pub script: ScriptOptions,

    #[serde(default)]
    pub client: ClientOptions,
}

impl ProjectConfig {
    /// 获取指定环境的变量
    pub fn get_profile(&self, name: &str) -> Option<&Profile> {
        self.environments.get(name)
    }
}
