//! 单个请求的执行流程：请求前脚本 → 变量替换 → 发送 → 请求后脚本
//!
//! 同一个 [`ExecutionContext`] 中的请求共享一个环境，
//! 前一个请求的脚本写入的变量对后续请求可见。

use std::ops::Deref;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::http::{Response, Transport, TransportError};
use crate::parser::ParsedRequest;
use crate::script::{
    Assertion, Phase, ScriptError, ScriptLogger, ScriptOptions, ScriptRuntime, TracingLogger,
};
use crate::variable::Environment;

/// 已发送请求的响应，附带两个阶段的断言
#[derive(Debug, Clone)]
pub struct ScriptedResponse {
    pub response: Response,
    pub pre_request_assertions: Vec<Assertion>,
    pub post_request_assertions: Vec<Assertion>,
}

impl ScriptedResponse {
    /// 全部断言（请求前在前）
    pub fn assertions(&self) -> impl Iterator<Item = &Assertion> {
        self.pre_request_assertions
            .iter()
            .chain(self.post_request_assertions.iter())
    }

    pub fn all_assertions_passed(&self) -> bool {
        self.assertions().all(|a| a.success)
    }
}

impl Deref for ScriptedResponse {
    type Target = Response;

    fn deref(&self) -> &Self::Target {
        &self.response
    }
}

#[derive(Debug)]
pub enum Outcome {
    Dispatched(ScriptedResponse),
    /// 请求前脚本设置了 `request.skip`，没有发送请求
    Skipped {
        pre_request_assertions: Vec<Assertion>,
    },
}

impl Outcome {
    pub fn response(&self) -> Option<&ScriptedResponse> {
        match self {
            Outcome::Dispatched(response) => Some(response),
            Outcome::Skipped { .. } => None,
        }
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, Outcome::Skipped { .. })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ExecuteError {
    /// 请求前脚本失败，请求未发送
    #[error("请求前脚本执行失败: {0}")]
    PreRequestScript(ScriptError),

    /// 无法创建脚本运行时
    #[error("脚本运行时初始化失败: {0}")]
    Runtime(ScriptError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    /// 请求后脚本失败，已收到的响应仍然保留
    #[error("请求后脚本执行失败: {source}")]
    PostRequestScript {
        source: ScriptError,
        response: Box<ScriptedResponse>,
    },
}

impl ExecuteError {
    /// 失败前已收到的响应（仅请求后脚本失败时存在）
    pub fn response(&self) -> Option<&ScriptedResponse> {
        match self {
            ExecuteError::PostRequestScript { response, .. } => Some(response),
            _ => None,
        }
    }
}

/// 一条请求链的执行上下文
pub struct ExecutionContext {
    transport: Arc<dyn Transport>,
    logger: Arc<dyn ScriptLogger>,
    environment: Environment,
    options: ScriptOptions,
    runtime: Option<ScriptRuntime>,
}

impl ExecutionContext {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            logger: Arc::new(TracingLogger),
            environment: Environment::new(),
            options: ScriptOptions::default(),
            runtime: None,
        }
    }

    /// 设置初始环境
    pub fn with_environment(mut self, environment: Environment) -> Self {
        self.environment = environment;
        self.runtime = None;
        self
    }

    pub fn with_logger(mut self, logger: Arc<dyn ScriptLogger>) -> Self {
        self.logger = logger;
        self
    }

    pub fn with_script_options(mut self, options: ScriptOptions) -> Self {
        self.options = options;
        self.runtime = None;
        self
    }

    /// 当前环境，包含脚本写入的变量
    pub fn environment(&self) -> Environment {
        match &self.runtime {
            Some(runtime) => runtime.environment(),
            None => self.environment.clone(),
        }
    }

    pub fn into_environment(self) -> Environment {
        match self.runtime {
            Some(runtime) => runtime.environment(),
            None => self.environment,
        }
    }

    /// 执行一个请求
    ///
    /// 无论成功与否，结束后运行时都会被重置，环境保留。
    pub async fn execute(&mut self, request: &mut ParsedRequest) -> Result<Outcome, ExecuteError> {
        let mut runtime = match self.runtime.take() {
            Some(runtime) => runtime,
            None => ScriptRuntime::new(self.environment.clone(), &self.options)
                .map_err(ExecuteError::Runtime)?,
        };

        debug!(request = %request.display_name(), "starting request lifecycle");
        let outcome = run_lifecycle(
            &mut runtime,
            self.transport.as_ref(),
            self.logger.as_ref(),
            request,
        )
        .await;

        match runtime.reset() {
            Ok(()) => self.runtime = Some(runtime),
            Err(e) => {
                // 下次执行时用保留下来的环境重建运行时
                warn!(error = %e, "failed to reset script runtime");
                self.environment = runtime.environment();
            }
        }
        outcome
    }
}

async fn run_lifecycle(
    runtime: &mut ScriptRuntime,
    transport: &dyn Transport,
    logger: &dyn ScriptLogger,
    request: &mut ParsedRequest,
) -> Result<Outcome, ExecuteError> {
    let mut pre_request_assertions = Vec::new();

    if let Some(script) = &request.pre_request_script {
        let result = runtime
            .set_request(request)
            .and_then(|()| runtime.run(Phase::PreRequest, script));
        forward_logs(runtime, logger);
        result.map_err(ExecuteError::PreRequestScript)?;

        pre_request_assertions = runtime.take_assertions();
        if runtime
            .skip_requested()
            .map_err(ExecuteError::PreRequestScript)?
        {
            request.skip = true;
        }
    }

    if request.should_skip() {
        info!(request = %request.display_name(), "skipped by pre-request script");
        return Ok(Outcome::Skipped {
            pre_request_assertions,
        });
    }

    let http_request = runtime.with_environment(|env| request.substitute(env));
    info!(method = %http_request.method, url = %http_request.url, "dispatching request");
    let response = transport.send(http_request).await?;
    debug!(status = response.status.code(), "response received");

    let mut scripted = ScriptedResponse {
        response,
        pre_request_assertions,
        post_request_assertions: Vec::new(),
    };

    if let Some(script) = &request.post_request_script {
        let result = run_post_script(runtime, request, &scripted.response, script);
        forward_logs(runtime, logger);
        match result {
            Ok(()) => scripted.post_request_assertions = runtime.take_assertions(),
            Err(source) => {
                return Err(ExecuteError::PostRequestScript {
                    source,
                    response: Box::new(scripted),
                });
            }
        }
    }

    Ok(Outcome::Dispatched(scripted))
}

fn run_post_script(
    runtime: &mut ScriptRuntime,
    request: &ParsedRequest,
    response: &Response,
    script: &str,
) -> Result<(), ScriptError> {
    runtime.set_request(request)?;
    runtime.set_response(response)?;
    runtime.run(Phase::PostRequest, script)
}

fn forward_logs(runtime: &mut ScriptRuntime, logger: &dyn ScriptLogger) {
    for entry in runtime.take_logs() {
        logger.log(&entry);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::Request;
    use crate::parser::parse_content;
    use crate::script::LogEntry;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::time::Duration;

    /// 记录收到的请求，返回固定响应
    struct MockTransport {
        sent: Mutex<Vec<Request>>,
        status: u16,
        body: String,
        fail: bool,
    }

    impl MockTransport {
        fn json(status: u16, body: &str) -> Arc<Self> {
            Arc::new(Self {
                sent: Mutex::new(Vec::new()),
                status,
                body: body.to_string(),
                fail: false,
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                sent: Mutex::new(Vec::new()),
                status: 0,
                body: String::new(),
                fail: true,
            })
        }

        fn sent(&self) -> Vec<Request> {
            self.sent.lock().clone()
        }
    }

    #[async_trait]
    impl Transport for MockTransport {
        async fn send(&self, request: Request) -> Result<Response, TransportError> {
            self.sent.lock().push(request);
            if self.fail {
                return Err(TransportError::Other("connection refused".to_string()));
            }
            Ok(Response::new(
                self.status,
                vec![("content-type".to_string(), "application/json".to_string())],
                self.body.clone(),
                Duration::from_millis(1),
            ))
        }
    }

    #[derive(Default)]
    struct RecordingLogger {
        entries: Mutex<Vec<LogEntry>>,
    }

    impl ScriptLogger for RecordingLogger {
        fn log(&self, entry: &LogEntry) {
            self.entries.lock().push(entry.clone());
        }
    }

    fn single(content: &str) -> ParsedRequest {
        parse_content(content).unwrap().requests.remove(0)
    }

    #[tokio::test]
    async fn test_plain_request_is_substituted_and_sent() {
        let transport = MockTransport::json(200, "{}");
        let env: Environment = [("host", "http://api"), ("token", "t1")].into_iter().collect();
        let mut ctx = ExecutionContext::new(transport.clone()).with_environment(env);

        let mut request = single(
            "GET {{host}}/users\nAuthorization: Bearer {{token}}\n",
        );
        let outcome = ctx.execute(&mut request).await.unwrap();

        let response = outcome.response().unwrap();
        assert_eq!(response.status.code(), 200);
        assert!(response.pre_request_assertions.is_empty());
        assert!(response.post_request_assertions.is_empty());

        let sent = transport.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].url, "http://api/users");
        assert_eq!(sent[0].header("Authorization"), Some("Bearer t1"));
    }

    #[tokio::test]
    async fn test_pre_script_mutations_reach_substitution() {
        let transport = MockTransport::json(200, "{}");
        let mut ctx = ExecutionContext::new(transport.clone());

        let mut request = single(
            r#"< {% setEnv("id", 7); environment.kind = "json"; assert(true, "ready"); %}
POST http://api/items/{{id}}
Content-Type: application/{{kind}}

{"id": {{id}}}
"#,
        );
        let outcome = ctx.execute(&mut request).await.unwrap();

        let response = outcome.response().unwrap();
        assert_eq!(response.pre_request_assertions, vec![Assertion::new("ready", true)]);

        let sent = transport.sent();
        assert_eq!(sent[0].url, "http://api/items/7");
        assert_eq!(sent[0].header("content-type"), Some("application/json"));
        assert_eq!(sent[0].body.as_deref(), Some("{\"id\": 7}\n"));
    }

    #[tokio::test]
    async fn test_post_script_chains_into_next_request() {
        let transport = MockTransport::json(200, r#"{"token": "abc"}"#);
        let mut ctx = ExecutionContext::new(transport.clone());

        let mut login = single(
            r#"POST http://api/login

< {%
  assert(response.statusCode == 200, "logged in");
  setEnv("token", response.json.token);
%}
"#,
        );
        let outcome = ctx.execute(&mut login).await.unwrap();
        let response = outcome.response().unwrap();
        assert_eq!(
            response.post_request_assertions,
            vec![Assertion::new("logged in", true)]
        );
        assert_eq!(ctx.environment().get("token"), Some("abc"));

        let mut me = single("GET http://api/me\nAuthorization: {{token}}\n");
        ctx.execute(&mut me).await.unwrap();
        assert_eq!(transport.sent()[1].header("Authorization"), Some("abc"));
    }

    #[tokio::test]
    async fn test_pre_script_host_reaches_url() {
        let transport = MockTransport::json(200, "{}");
        let mut ctx = ExecutionContext::new(transport.clone());

        let mut request = single("< {% setEnv('host', 'http://x') %}\nGET {{host}}/y\n");
        ctx.execute(&mut request).await.unwrap();

        assert_eq!(transport.sent()[0].url, "http://x/y");
    }

    #[tokio::test]
    async fn test_post_script_strict_equality_assert() {
        let mut ctx = ExecutionContext::new(MockTransport::json(200, "{}"));

        let mut request =
            single("GET http://api\n\n< {% assert(response.statusCode === 200, 'ok') %}\n");
        let outcome = ctx.execute(&mut request).await.unwrap();

        assert_eq!(
            outcome.response().unwrap().post_request_assertions,
            vec![Assertion::new("ok", true)]
        );
    }

    #[tokio::test]
    async fn test_post_script_env_visible_to_next_pre_script() {
        let transport = MockTransport::json(200, "{}");
        let mut ctx = ExecutionContext::new(transport.clone());

        let mut first = single("GET http://api\n\n< {% setEnv('k','v') %}\n");
        ctx.execute(&mut first).await.unwrap();

        let mut second = single("< {% assert(getEnv('k') === 'v', 'chained') %}\nGET http://api\n");
        let outcome = ctx.execute(&mut second).await.unwrap();

        assert_eq!(
            outcome.response().unwrap().pre_request_assertions,
            vec![Assertion::new("chained", true)]
        );
        assert_eq!(transport.sent().len(), 2);
    }

    #[tokio::test]
    async fn test_skip_does_not_dispatch() {
        let transport = MockTransport::json(200, "{}");
        let mut ctx = ExecutionContext::new(transport.clone());

        let mut request = single(
            "< {% assert(true, \"checked\"); request.skip = true; %}\nGET http://api/never\n",
        );
        let outcome = ctx.execute(&mut request).await.unwrap();

        assert!(outcome.is_skipped());
        assert!(request.skip);
        match outcome {
            Outcome::Skipped {
                pre_request_assertions,
            } => assert_eq!(pre_request_assertions, vec![Assertion::new("checked", true)]),
            Outcome::Dispatched(_) => panic!("expected skip"),
        }
        assert!(transport.sent().is_empty());
    }

    #[tokio::test]
    async fn test_pre_script_failure_prevents_dispatch() {
        let transport = MockTransport::json(200, "{}");
        let mut ctx = ExecutionContext::new(transport.clone());

        let mut request = single("< {% setEnv(\"a\", \"1\"); undefined_fn(); %}\nGET http://api\n");
        let err = ctx.execute(&mut request).await.unwrap_err();

        assert!(matches!(err, ExecuteError::PreRequestScript(_)));
        assert!(transport.sent().is_empty());
        // 失败前写入的变量保留
        assert_eq!(ctx.environment().get("a"), Some("1"));
    }

    #[tokio::test]
    async fn test_transport_error_is_verbatim() {
        let mut ctx = ExecutionContext::new(MockTransport::failing());
        let mut request = single("GET http://api\n");

        let err = ctx.execute(&mut request).await.unwrap_err();
        assert!(matches!(err, ExecuteError::Transport(TransportError::Other(_))));
        assert_eq!(err.to_string(), "connection refused");
    }

    #[tokio::test]
    async fn test_post_script_failure_keeps_response() {
        let transport = MockTransport::json(503, "{}");
        let mut ctx = ExecutionContext::new(transport);

        let mut request = single(
            "< {% assert(true, \"pre\"); %}\nGET http://api\n\n< {% throw \"boom\"; %}\n",
        );
        let err = ctx.execute(&mut request).await.unwrap_err();

        let response = err.response().unwrap();
        assert_eq!(response.status.code(), 503);
        assert_eq!(response.pre_request_assertions, vec![Assertion::new("pre", true)]);
        assert!(matches!(
            err,
            ExecuteError::PostRequestScript {
                source: ScriptError::Runtime { .. },
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_logs_are_forwarded_with_phase() {
        let logger = Arc::new(RecordingLogger::default());
        let mut ctx = ExecutionContext::new(MockTransport::json(200, "{}"))
            .with_logger(logger.clone());

        let mut request = single(
            "< {% log(\"before\"); %}\nGET http://api\n\n< {% log(\"status\", response.statusCode); %}\n",
        );
        ctx.execute(&mut request).await.unwrap();

        let entries = logger.entries.lock().clone();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].phase, Phase::PreRequest);
        assert_eq!(entries[0].message, "before");
        assert_eq!(entries[1].phase, Phase::PostRequest);
        assert_eq!(entries[1].message, "status 200");
    }

    #[tokio::test]
    async fn test_bindings_do_not_leak_between_requests() {
        let mut ctx = ExecutionContext::new(MockTransport::json(200, "{}"));

        let mut first = single(
            "< {% let marker = 1; %}\nGET http://api\n\n< {% assert(marker == 1, \"same request\"); %}\n",
        );
        let outcome = ctx.execute(&mut first).await.unwrap();
        assert!(outcome.response().unwrap().all_assertions_passed());

        let mut second = single("< {% marker; %}\nGET http://api\n");
        let err = ctx.execute(&mut second).await.unwrap_err();
        assert!(matches!(err, ExecuteError::PreRequestScript(_)));
    }

    #[tokio::test]
    async fn test_invalid_json_fails_post_script() {
        let mut ctx = ExecutionContext::new(MockTransport::json(200, "{oops"));
        let mut request = single("GET http://api\n\n< {% log(response.body); %}\n");

        let err = ctx.execute(&mut request).await.unwrap_err();
        assert!(matches!(
            err,
            ExecuteError::PostRequestScript {
                source: ScriptError::Projection(_),
                ..
            }
        ));
    }
}
