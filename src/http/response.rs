use std::time::Duration;

use crate::http::types::Status;

/// Transport 返回的响应，body 已完整缓冲，可被脚本和输出多次读取
#[derive(Debug, Clone)]
pub struct Response {
    pub status: Status,
    pub headers: Vec<(String, String)>,
    pub body: String,
    pub duration: Duration,
}

impl Response {
    pub fn new(status: u16, headers: Vec<(String, String)>, body: String, duration: Duration) -> Self {
        Self {
            status: Status::new(status),
            headers,
            body,
            duration,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// 按名称查找第一个 header（大小写不敏感）
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }

    /// Content-Type 是否为 JSON（application/json 或 +json 后缀）
    pub fn is_json(&self) -> bool {
        self.content_type()
            .map(|ct| {
                let ct = ct.to_ascii_lowercase();
                ct.contains("application/json") || ct.contains("+json")
            })
            .unwrap_or(false)
    }

    pub fn json(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::from_str(&self.body)
    }

    pub fn text(&self) -> &str {
        &self.body
    }
}
