use std::fmt::Write as _;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::header::{HeaderName, HeaderValue};
use serde::Deserialize;
use tracing::{debug, info};

use crate::http::request::Request;
use crate::http::response::Response;

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("无效的 URL '{url}': {message}")]
    InvalidUrl { url: String, message: String },

    #[error("无效的 header '{name}': {message}")]
    InvalidHeader { name: String, message: String },

    #[error("HTTP 请求失败: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{0}")]
    Other(String),
}

/// 发送请求的可插拔组件，调用方可以替换为拦截、记录或回放实现
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: Request) -> Result<Response, TransportError>;
}

/// `[client]` 配置段
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClientOptions {
    /// 请求超时（秒），0 表示不限制
    pub timeout_secs: u64,
    pub user_agent: Option<String>,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            user_agent: None,
        }
    }
}

/// 基于 reqwest 的默认 Transport
#[derive(Clone)]
pub struct Client {
    inner: reqwest::Client,
}

impl Client {
    pub fn new() -> Result<Self, TransportError> {
        Self::with_options(&ClientOptions::default())
    }

    pub fn with_options(options: &ClientOptions) -> Result<Self, TransportError> {
        let mut builder = reqwest::Client::builder();
        if options.timeout_secs > 0 {
            builder = builder.timeout(Duration::from_secs(options.timeout_secs));
        }
        if let Some(user_agent) = &options.user_agent {
            builder = builder.user_agent(user_agent.as_str());
        }
        Ok(Self {
            inner: builder.build()?,
        })
    }

    fn build(&self, request: Request) -> Result<reqwest::RequestBuilder, TransportError> {
        let url = reqwest::Url::parse(&request.url).map_err(|e| TransportError::InvalidUrl {
            url: request.url.clone(),
            message: e.to_string(),
        })?;

        let mut builder = self.inner.request(request.method.into(), url);
        for (key, value) in &request.headers {
            let name = HeaderName::from_bytes(key.trim().as_bytes()).map_err(|e| {
                TransportError::InvalidHeader {
                    name: key.clone(),
                    message: e.to_string(),
                }
            })?;
            let value = HeaderValue::from_str(value).map_err(|e| TransportError::InvalidHeader {
                name: key.clone(),
                message: e.to_string(),
            })?;
            // header() 追加而不是覆盖，重复的 key 会原样发送
            builder = builder.header(name, value);
        }

        if let Some(body) = request.body {
            builder = builder.body(body);
        }
        Ok(builder)
    }
}

#[async_trait]
impl Transport for Client {
    async fn send(&self, request: Request) -> Result<Response, TransportError> {
        debug!(method = %request.method, url = %request.url, "sending request");
        let builder = self.build(request)?;

        let start = Instant::now();
        let response = builder.send().await?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();
        let body = response.text().await?;
        let duration = start.elapsed();

        Ok(Response::new(status, headers, body, duration))
    }
}

/// 包装任意 Transport，通过 tracing 输出完整的请求与响应内容
pub struct LoggingTransport<T> {
    inner: T,
}

impl<T: Transport> LoggingTransport<T> {
    pub fn new(inner: T) -> Self {
        Self { inner }
    }

    pub fn into_inner(self) -> T {
        self.inner
    }
}

#[async_trait]
impl<T: Transport> Transport for LoggingTransport<T> {
    async fn send(&self, request: Request) -> Result<Response, TransportError> {
        info!(target: "rqscript::traffic", "{}", format_request(&request));

        let response = self.inner.send(request).await?;

        info!(target: "rqscript::traffic", "{}", format_response(&response));
        Ok(response)
    }
}

fn format_request(request: &Request) -> String {
    let mut out = String::from("\n----- Request\n");
    let _ = writeln!(out, "{} {}", request.method, request.url);
    for (key, value) in &request.headers {
        let _ = writeln!(out, "{}: {}", key, value);
    }
    if let Some(body) = &request.body {
        out.push('\n');
        out.push_str(body);
    }
    out
}

fn format_response(response: &Response) -> String {
    let mut out = format!(
        "----- Response (duration: {:?})\n{}\n",
        response.duration,
        response.status.status_line()
    );
    for (key, value) in &response.headers {
        let _ = writeln!(out, "{}: {}", key, value);
    }
    if !response.body.is_empty() {
        out.push('\n');
        out.push_str(&response.body);
    }
    out
}
