use std::fmt;
use std::path::PathBuf;

use crate::http::{self, Method};
use crate::variable::{Environment, VariableResolver};

/// 请求分隔符，其后的内容为请求名称
pub const REQUEST_SEPARATOR: &str = "###";

/// 单个 header，保持书写顺序
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub key: String,
    pub value: String,
}

impl Header {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// 单个解析后的 HTTP 请求
///
/// 解析完成后只有 `skip` 会被修改（由请求前脚本设置）。
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedRequest {
    /// `###` 之后的请求名称
    pub name: Option<String>,

    /// 发送前执行的脚本
    pub pre_request_script: Option<String>,

    /// 收到响应后执行的脚本
    pub post_request_script: Option<String>,

    pub method: Method,

    /// 请求 URL，可能包含 {{variable}} 占位符
    pub url: String,

    /// Headers 列表，保持原始顺序，重复的 key 不合并
    pub headers: Vec<Header>,

    /// 原始请求体，每行以换行结尾，不做解析
    pub body: String,

    /// 请求前脚本设置 `request.skip = true` 时为 true
    pub skip: bool,

    /// 请求在文件中的起始行号（用于错误报告）
    pub line_number: usize,
}

impl ParsedRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            name: None,
            pre_request_script: None,
            post_request_script: None,
            method,
            url: url.into(),
            headers: Vec::new(),
            body: String::new(),
            skip: false,
            line_number: 0,
        }
    }

    /// 显示名称：优先使用请求名称，否则为 "METHOD URL"
    pub fn display_name(&self) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => format!("{} {}", self.method, self.url),
        }
    }

    /// 检查请求是否应该被跳过
    pub fn should_skip(&self) -> bool {
        self.skip
    }

    /// 不含名称和脚本的请求文本
    pub fn http_text(&self) -> String {
        let mut text = format!("{} {}\n", self.method, self.url);
        for header in &self.headers {
            text.push_str(&format!("{}: {}\n", header.key, header.value));
        }
        if !self.body.is_empty() {
            text.push('\n');
            text.push_str(&self.body);
        }
        text
    }

    /// 用环境变量替换 URL、body 和 headers，生成交给 Transport 的请求
    pub fn substitute(&self, env: &Environment) -> http::Request {
        let mut request = http::Request::new(self.method, VariableResolver::substitute(&self.url, env))
            .with_body(VariableResolver::substitute(&self.body, env));
        request.headers = self
            .headers
            .iter()
            .map(|header| {
                (
                    VariableResolver::substitute(&header.key, env),
                    VariableResolver::substitute(&header.value, env),
                )
            })
            .collect();
        request
    }
}

impl fmt::Display for ParsedRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(name) = &self.name {
            writeln!(f, "{} {}", REQUEST_SEPARATOR, name)?;
        }
        f.write_str(&self.http_text())
    }
}

/// 整个文件的解析结果
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ParsedFile {
    /// 解析出的所有请求
    pub requests: Vec<ParsedRequest>,

    /// 源文件路径（用于错误报告）
    pub source_path: Option<PathBuf>,
}

impl ParsedFile {
    /// 创建一个新的空文件解析结果
    pub fn new() -> Self {
        Self::default()
    }

    /// 设置源文件路径
    pub fn with_source_path(mut self, path: PathBuf) -> Self {
        self.source_path = Some(path);
        self
    }

    /// 添加一个请求
    pub fn add_request(&mut self, request: ParsedRequest) {
        self.requests.push(request);
    }

    /// 获取所有未标记为跳过的请求
    pub fn active_requests(&self) -> impl Iterator<Item = &ParsedRequest> {
        self.requests.iter().filter(|r| !r.should_skip())
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }
}

/// 解析错误类型
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    /// 请求行格式错误或重复
    #[error("invalid request at line {line}: {reason}: {content:?}")]
    InvalidRequest {
        line: usize,
        content: String,
        reason: String,
    },

    /// 有名称或脚本，但缺少请求行
    #[error("invalid request at line {line}: missing method and URL")]
    MissingRequestLine { line: usize },

    /// 无法读取引用的脚本文件
    #[error("failed to read script file {path}: {source}")]
    ScriptFile {
        path: PathBuf,
        source: std::io::Error,
    },

    /// IO 错误
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ParseError {
    /// 是否为 "invalid request" 类错误
    pub fn is_invalid_request(&self) -> bool {
        matches!(
            self,
            ParseError::InvalidRequest { .. } | ParseError::MissingRequestLine { .. }
        )
    }
}

/// 解析结果类型别名
pub type ParseResult<T> = Result<T, ParseError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ParsedRequest {
        let mut req = ParsedRequest::new(Method::Post, "{{host}}/users");
        req.headers.push(Header::new("Content-Type", "application/json"));
        req.headers.push(Header::new("X-{{tag}}", "{{token}}"));
        req.body = "{\"name\": \"{{user}}\"}\n".to_string();
        req
    }

    #[test]
    fn test_display_name() {
        let mut req = ParsedRequest::new(Method::Get, "http://localhost/users");
        assert_eq!(req.display_name(), "GET http://localhost/users");

        req.name = Some("List Users".to_string());
        assert_eq!(req.display_name(), "List Users");
    }

    #[test]
    fn test_http_text() {
        let req = sample();
        assert_eq!(
            req.http_text(),
            "POST {{host}}/users\nContent-Type: application/json\nX-{{tag}}: {{token}}\n\n{\"name\": \"{{user}}\"}\n"
        );
    }

    #[test]
    fn test_to_string_includes_name() {
        let mut req = ParsedRequest::new(Method::Get, "http://localhost");
        req.name = Some("Ping".to_string());
        assert_eq!(req.to_string(), "### Ping\nGET http://localhost\n");
    }

    #[test]
    fn test_substitute() {
        let env: Environment = [
            ("host", "http://x"),
            ("tag", "Trace"),
            ("token", "abc"),
            ("user", "alice"),
        ]
        .into_iter()
        .collect();

        let request = sample().substitute(&env);
        assert_eq!(request.method, Method::Post);
        assert_eq!(request.url, "http://x/users");
        assert_eq!(
            request.headers,
            vec![
                ("Content-Type".to_string(), "application/json".to_string()),
                ("X-Trace".to_string(), "abc".to_string()),
            ]
        );
        assert_eq!(request.body.as_deref(), Some("{\"name\": \"alice\"}\n"));
    }

    #[test]
    fn test_substitute_keeps_unresolved() {
        let request = sample().substitute(&Environment::new());
        assert_eq!(request.url, "{{host}}/users");
        assert_eq!(request.headers[1].1, "{{token}}");
    }

    #[test]
    fn test_active_requests() {
        let mut file = ParsedFile::new();
        let req1 = ParsedRequest::new(Method::Get, "http://example.com");
        let mut req2 = ParsedRequest::new(Method::Get, "http://example.org");
        req2.skip = true;

        file.add_request(req1);
        file.add_request(req2);

        let active: Vec<_> = file.active_requests().collect();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].url, "http://example.com");
    }

    #[test]
    fn test_parsed_file_with_source_path() {
        let file = ParsedFile::new().with_source_path(PathBuf::from("/test/file.http"));
        assert_eq!(file.source_path, Some(PathBuf::from("/test/file.http")));
        assert!(file.is_empty());
    }
}
