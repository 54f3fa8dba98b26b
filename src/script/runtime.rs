//! 嵌入式 JavaScript 运行时
//!
//! 每个执行上下文持有一个 [`ScriptRuntime`]。脚本可以调用以下全局函数：
//!
//! - `assert(condition, message)`：记录一条断言
//! - `setEnv(key, value)` / `getEnv(key)`：读写环境变量
//! - `log(...entries)`：记录日志，之后转发给 [`ScriptLogger`](crate::script::ScriptLogger)
//!
//! 并可以访问 `request`、`response` 和 `environment` 三个全局对象。
//! `environment` 直接写入宿主的环境映射，在多个请求之间保留。

use std::sync::Arc;

use boa_engine::object::builtins::JsArray;
use boa_engine::property::Attribute;
use boa_engine::{
    Context, JsArgs, JsError, JsNativeError, JsResult, JsString, JsValue, NativeFunction, Script,
    Source, js_string,
};
use parking_lot::Mutex;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::http::Response;
use crate::parser::ParsedRequest;
use crate::script::error::ScriptError;
use crate::script::types::{Assertion, LogEntry, Phase, RequestProjection, ResponseProjection};
use crate::variable::Environment;

/// `[script]` 配置段
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScriptOptions {
    /// 单个循环允许的最大迭代次数，防止死循环
    pub max_loop_iterations: u64,
    /// 最大递归深度
    pub max_recursion_depth: usize,
}

impl Default for ScriptOptions {
    fn default() -> Self {
        Self {
            max_loop_iterations: 1_000_000,
            max_recursion_depth: 512,
        }
    }
}

/// `environment` 对象：读写都转发给宿主环境
const ENVIRONMENT_PROXY: &str = r#"(function (get, set, has, keys) {
    return new Proxy({}, {
        get: (_, key) => typeof key === "string" ? get(key) : undefined,
        set: (_, key, value) => {
            if (typeof key === "string") {
                set(key, value);
            }
            return true;
        },
        has: (_, key) => typeof key === "string" && has(key),
        ownKeys: () => keys(),
        getOwnPropertyDescriptor: (_, key) =>
            typeof key === "string" && has(key)
                ? { value: get(key), writable: true, enumerable: true, configurable: true }
                : undefined,
    });
})"#;

const DEEP_FREEZE: &str = r#"(function freeze(value) {
    if (value !== null && typeof value === "object") {
        Object.values(value).forEach(freeze);
        Object.freeze(value);
    }
    return value;
})"#;

/// 运行时状态，由注册到引擎的函数共享
#[derive(Debug, Default)]
struct ScriptState {
    environment: Environment,
    phase: Phase,
    assertions: Vec<Assertion>,
    logs: Vec<LogEntry>,
}

type SharedState = Arc<Mutex<ScriptState>>;

pub struct ScriptRuntime {
    context: Context,
    state: SharedState,
    options: ScriptOptions,
}

impl ScriptRuntime {
    pub fn new(environment: Environment, options: &ScriptOptions) -> Result<Self, ScriptError> {
        let state: SharedState = Arc::new(Mutex::new(ScriptState {
            environment,
            ..ScriptState::default()
        }));
        let context = build_context(&state, options)?;
        Ok(Self {
            context,
            state,
            options: options.clone(),
        })
    }

    /// 设置 `request` 对象
    pub fn set_request(&mut self, request: &ParsedRequest) -> Result<(), ScriptError> {
        let projection = RequestProjection::from(request);
        let value = JsValue::from_json(&projection.to_json(), &mut self.context)?;
        self.context
            .register_global_property(js_string!("request"), value, Attribute::all())?;
        Ok(())
    }

    /// 设置只读的 `response` 对象
    pub fn set_response(&mut self, response: &Response) -> Result<(), ScriptError> {
        let projection = ResponseProjection::try_from(response)?;
        let value = JsValue::from_json(&projection.to_json(), &mut self.context)?;

        let freeze = self.context.eval(Source::from_bytes(DEEP_FREEZE))?;
        let freeze = freeze
            .as_callable()
            .cloned()
            .ok_or_else(|| ScriptError::runtime("freeze helper is not callable"))?;
        freeze.call(&JsValue::undefined(), &[value.clone()], &mut self.context)?;

        self.context.register_global_property(
            js_string!("response"),
            value,
            Attribute::ENUMERABLE | Attribute::CONFIGURABLE,
        )?;
        Ok(())
    }

    /// 执行脚本，断言和日志记入 `phase`
    pub fn run(&mut self, phase: Phase, source: &str) -> Result<(), ScriptError> {
        self.state.lock().phase = phase;
        debug!(%phase, "running script");

        let script = Script::parse(Source::from_bytes(source), None, &mut self.context)
            .map_err(|e| ScriptError::compilation(e.to_string()))?;
        script
            .evaluate(&mut self.context)
            .map_err(|e| describe(e, &mut self.context))?;
        Ok(())
    }

    /// 取出并清空已记录的断言
    pub fn take_assertions(&mut self) -> Vec<Assertion> {
        std::mem::take(&mut self.state.lock().assertions)
    }

    /// 取出并清空已记录的日志
    pub fn take_logs(&mut self) -> Vec<LogEntry> {
        std::mem::take(&mut self.state.lock().logs)
    }

    /// 读取脚本设置的 `request.skip`，只有布尔值 true 才算跳过
    pub fn skip_requested(&mut self) -> Result<bool, ScriptError> {
        let request = self
            .context
            .global_object()
            .get(js_string!("request"), &mut self.context)?;
        if request.is_undefined() {
            return Ok(false);
        }
        let Some(object) = request.as_object() else {
            return Err(ScriptError::Extraction(format!(
                "`request` must be an object, found {}",
                request.type_of()
            )));
        };
        let skip = object.get(js_string!("skip"), &mut self.context)?;
        Ok(skip.as_boolean() == Some(true))
    }

    /// 当前环境的快照
    pub fn environment(&self) -> Environment {
        self.state.lock().environment.clone()
    }

    pub fn with_environment<R>(&self, f: impl FnOnce(&Environment) -> R) -> R {
        f(&self.state.lock().environment)
    }

    /// 清空 request/response、断言、日志和脚本变量，环境保留
    pub fn reset(&mut self) -> Result<(), ScriptError> {
        {
            let mut state = self.state.lock();
            state.assertions.clear();
            state.logs.clear();
            state.phase = Phase::default();
        }
        self.context = build_context(&self.state, &self.options)?;
        Ok(())
    }
}

/// 创建新的 JS 上下文并注册全局函数和 `environment` 对象
fn build_context(state: &SharedState, options: &ScriptOptions) -> JsResult<Context> {
    let mut context = Context::default();
    let limits = context.runtime_limits_mut();
    limits.set_loop_iteration_limit(options.max_loop_iterations);
    limits.set_recursion_limit(options.max_recursion_depth);

    let globals = [
        (js_string!("assert"), 2, assert_fn(state.clone())),
        (js_string!("setEnv"), 2, set_env_fn(state.clone())),
        (js_string!("getEnv"), 1, get_env_fn(state.clone())),
        (js_string!("log"), 1, log_fn(state.clone())),
    ];
    for (name, length, function) in globals {
        context.register_global_builtin_callable(name, length, function)?;
    }

    let factory = context.eval(Source::from_bytes(ENVIRONMENT_PROXY))?;
    let factory = factory.as_callable().cloned().ok_or_else(|| {
        JsNativeError::typ().with_message("environment factory is not callable")
    })?;
    let realm = context.realm().clone();
    let accessors: [JsValue; 4] = [
        get_env_fn(state.clone()).to_js_function(&realm).into(),
        set_env_fn(state.clone()).to_js_function(&realm).into(),
        has_env_fn(state.clone()).to_js_function(&realm).into(),
        env_keys_fn(state.clone()).to_js_function(&realm).into(),
    ];
    let environment = factory.call(&JsValue::undefined(), &accessors, &mut context)?;
    context.register_global_property(
        js_string!("environment"),
        environment,
        Attribute::WRITABLE | Attribute::CONFIGURABLE,
    )?;

    Ok(context)
}

fn native<F>(f: F) -> NativeFunction
where
    F: Fn(&JsValue, &[JsValue], &mut Context) -> JsResult<JsValue> + 'static,
{
    // SAFETY: 这里的闭包只捕获 SharedState，不持有任何由 GC 管理的值
    unsafe { NativeFunction::from_closure(f) }
}

fn assert_fn(state: SharedState) -> NativeFunction {
    native(move |_, args, context| {
        let success = args.get_or_undefined(0).to_boolean();
        let message = display(args.get_or_undefined(1), context)?;
        if !success {
            warn!(target: "rqscript::script", %message, "assertion failed");
        }
        state.lock().assertions.push(Assertion::new(message, success));
        Ok(JsValue::undefined())
    })
}

fn set_env_fn(state: SharedState) -> NativeFunction {
    native(move |_, args, context| {
        let key = display(args.get_or_undefined(0), context)?;
        let value = display(args.get_or_undefined(1), context)?;
        state.lock().environment.insert(key, value);
        Ok(JsValue::undefined())
    })
}

fn get_env_fn(state: SharedState) -> NativeFunction {
    native(move |_, args, context| {
        let key = display(args.get_or_undefined(0), context)?;
        Ok(state
            .lock()
            .environment
            .get(&key)
            .map(|value| JsValue::from(JsString::from(value)))
            .unwrap_or_else(JsValue::undefined))
    })
}

fn has_env_fn(state: SharedState) -> NativeFunction {
    native(move |_, args, context| {
        let key = display(args.get_or_undefined(0), context)?;
        Ok(JsValue::from(state.lock().environment.contains(&key)))
    })
}

fn env_keys_fn(state: SharedState) -> NativeFunction {
    native(move |_, _, context| {
        let mut keys: Vec<String> = state
            .lock()
            .environment
            .iter()
            .map(|(k, _)| k.to_string())
            .collect();
        keys.sort();
        let values = keys
            .iter()
            .map(|k| JsValue::from(JsString::from(k.as_str())));
        Ok(JsArray::from_iter(values, context).into())
    })
}

fn log_fn(state: SharedState) -> NativeFunction {
    native(move |_, args, context| {
        let parts = args
            .iter()
            .map(|arg| display(arg, context))
            .collect::<JsResult<Vec<_>>>()?;
        let mut state = state.lock();
        let phase = state.phase;
        state.logs.push(LogEntry {
            phase,
            message: parts.join(" "),
        });
        Ok(JsValue::undefined())
    })
}

/// 抛出的 Error 对象转换为 "Error: message" 形式，其他值原样显示
fn describe(err: JsError, context: &mut Context) -> ScriptError {
    match err.try_native(context) {
        Ok(native) => ScriptError::runtime(native.to_string()),
        Err(_) => ScriptError::from(err),
    }
}

/// 字符串原样输出，对象输出为 JSON，其余按 JS 的 String() 转换
fn display(value: &JsValue, context: &mut Context) -> JsResult<String> {
    if let Some(text) = value.as_string() {
        return Ok(text.to_std_string_escaped());
    }
    if value.is_object() && !value.is_callable() {
        if let Ok(json) = value.to_json(context) {
            return Ok(json.to_string());
        }
    }
    Ok(value.to_string(context)?.to_std_string_escaped())
}
