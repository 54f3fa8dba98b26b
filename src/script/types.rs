use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::http::Response;
use crate::parser::ParsedRequest;
use crate::script::error::ScriptError;

/// 脚本所处的生命周期阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Phase {
    #[default]
    PreRequest,
    PostRequest,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::PreRequest => f.write_str("pre-request"),
            Phase::PostRequest => f.write_str("post-request"),
        }
    }
}

/// 脚本通过 `assert(condition, message)` 记录的断言
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assertion {
    pub message: String,
    pub success: bool,
}

impl Assertion {
    pub fn new(message: impl Into<String>, success: bool) -> Self {
        Self {
            message: message.into(),
            success,
        }
    }
}

/// 脚本通过 `log(...)` 记录的日志
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub phase: Phase,
    pub message: String,
}

/// 暴露给脚本的 `request` 对象
#[derive(Debug, Clone, PartialEq)]
pub struct RequestProjection {
    pub name: String,
    pub body: String,
    pub headers: Vec<(String, String)>,
    pub method: String,
    pub url: String,
}

impl From<&ParsedRequest> for RequestProjection {
    fn from(request: &ParsedRequest) -> Self {
        Self {
            name: request.name.clone().unwrap_or_default(),
            body: request.body.clone(),
            headers: request
                .headers
                .iter()
                .map(|h| (h.key.clone(), h.value.clone()))
                .collect(),
            method: request.method.to_string(),
            url: request.url.clone(),
        }
    }
}

impl RequestProjection {
    /// `{ name, body, headers: [{ key, value }], method, url }`
    pub fn to_json(&self) -> Value {
        let headers: Vec<Value> = self
            .headers
            .iter()
            .map(|(key, value)| json!({ "key": key, "value": value }))
            .collect();

        json!({
            "name": self.name,
            "body": self.body,
            "headers": headers,
            "method": self.method,
            "url": self.url,
        })
    }
}

/// 暴露给脚本的只读 `response` 对象
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseProjection {
    pub body: String,
    pub headers: Vec<(String, String)>,
    /// 状态行，例如 "200 OK"
    pub status: String,
    pub status_code: u16,
    /// Content-Type 为 JSON 时解析后的 body
    pub json: Option<serde_json::Value>,
}

impl TryFrom<&Response> for ResponseProjection {
    type Error = ScriptError;

    fn try_from(response: &Response) -> Result<Self, Self::Error> {
        let json = if response.is_json() && !response.body.trim().is_empty() {
            let value = response.json().map_err(|e| {
                ScriptError::Projection(format!("response body is not valid JSON: {}", e))
            })?;
            Some(value)
        } else {
            None
        };

        Ok(Self {
            body: response.body.clone(),
            headers: response.headers.clone(),
            status: response.status.status_line(),
            status_code: response.status.code(),
            json,
        })
    }
}

impl ResponseProjection {
    /// `{ body, headers: { name: value }, status, statusCode, json }`
    ///
    /// 重复的 header 以 ", " 合并。
    pub fn to_json(&self) -> Value {
        let mut headers = Map::new();
        for (name, value) in &self.headers {
            let merged = match headers.get(name).and_then(Value::as_str) {
                Some(existing) => format!("{}, {}", existing, value),
                None => value.clone(),
            };
            headers.insert(name.clone(), Value::String(merged));
        }

        let mut object = Map::new();
        object.insert("body".into(), Value::String(self.body.clone()));
        object.insert("headers".into(), Value::Object(headers));
        object.insert("status".into(), Value::String(self.status.clone()));
        object.insert("statusCode".into(), self.status_code.into());
        if let Some(json) = &self.json {
            object.insert("json".into(), json.clone());
        }
        Value::Object(object)
    }
}
