use crate::http::types::Method;

/// 交给 Transport 的完整请求描述（变量已替换）
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub method: Method,
    pub url: String,
    /// Headers 列表，保持原始顺序，允许重复
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

impl Request {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((key.into(), value.into()));
        self
    }

    /// 空字符串视为没有 body
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        let body = body.into();
        self.body = if body.is_empty() { None } else { Some(body) };
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_keeps_header_order_and_duplicates() {
        let request = Request::new(Method::Post, "http://example.com")
            .with_header("Accept", "text/plain")
            .with_header("X-Tag", "a")
            .with_header("X-Tag", "b")
            .with_body("hello\n");

        assert_eq!(request.headers.len(), 3);
        assert_eq!(request.headers[1], ("X-Tag".to_string(), "a".to_string()));
        assert_eq!(request.headers[2], ("X-Tag".to_string(), "b".to_string()));
        assert_eq!(request.header("accept"), Some("text/plain"));
        assert_eq!(request.body.as_deref(), Some("hello\n"));
    }

    #[test]
    fn test_empty_body_is_none() {
        let request = Request::new(Method::Get, "http://example.com").with_body("");
        assert_eq!(request.body, None);
    }
}
