use std::time::Duration;

use crate::parser::ParsedRequest;
use crate::runner::pipeline::{ExecuteError, Outcome};
use crate::script::Assertion;

/// 单个请求的执行结果
#[derive(Debug, Clone)]
pub struct TestResult {
    /// 请求序号（从 1 开始）
    pub request_number: usize,

    /// 请求名称或 "METHOD URL"
    pub name: String,

    pub method: String,

    /// 原始 URL（未替换变量）
    pub url: String,

    /// 响应状态码（已发送时）
    pub status: Option<u16>,

    pub duration: Duration,

    /// 没有错误且所有断言通过
    pub success: bool,

    pub error: Option<String>,

    pub skipped: bool,

    pub pre_request_assertions: Vec<Assertion>,
    pub post_request_assertions: Vec<Assertion>,
}

impl TestResult {
    fn base(request_number: usize, request: &ParsedRequest) -> Self {
        Self {
            request_number,
            name: request.display_name(),
            method: request.method.to_string(),
            url: request.url.clone(),
            status: None,
            duration: Duration::ZERO,
            success: false,
            error: None,
            skipped: false,
            pre_request_assertions: Vec::new(),
            post_request_assertions: Vec::new(),
        }
    }

    pub fn from_outcome(
        request_number: usize,
        request: &ParsedRequest,
        outcome: Result<Outcome, ExecuteError>,
    ) -> Self {
        let mut result = Self::base(request_number, request);
        match outcome {
            Ok(Outcome::Dispatched(response)) => {
                result.status = Some(response.status.code());
                result.duration = response.duration;
                result.success = response.all_assertions_passed();
                result.pre_request_assertions = response.pre_request_assertions;
                result.post_request_assertions = response.post_request_assertions;
            }
            Ok(Outcome::Skipped {
                pre_request_assertions,
            }) => {
                result.skipped = true;
                result.success = pre_request_assertions.iter().all(|a| a.success);
                result.pre_request_assertions = pre_request_assertions;
            }
            Err(err) => {
                result.error = Some(err.to_string());
                if let ExecuteError::PostRequestScript { response, .. } = err {
                    result.status = Some(response.status.code());
                    result.duration = response.duration;
                    result.pre_request_assertions = response.pre_request_assertions;
                }
            }
        }
        result
    }

    /// 无法执行的请求（例如文件解析失败）
    pub fn error(request_number: usize, name: String, error: String) -> Self {
        Self {
            request_number,
            name,
            method: String::new(),
            url: String::new(),
            status: None,
            duration: Duration::ZERO,
            success: false,
            error: Some(error),
            skipped: false,
            pre_request_assertions: Vec::new(),
            post_request_assertions: Vec::new(),
        }
    }

    pub fn assertions(&self) -> impl Iterator<Item = &Assertion> {
        self.pre_request_assertions
            .iter()
            .chain(self.post_request_assertions.iter())
    }
}

/// 测试摘要
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TestSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub total_duration: Duration,
    pub total_assertions: usize,
    pub passed_assertions: usize,
    pub failed_assertions: usize,
}

impl TestSummary {
    pub fn from_results(results: &[TestResult]) -> Self {
        let skipped = results.iter().filter(|r| r.skipped).count();
        let passed = results.iter().filter(|r| r.success && !r.skipped).count();
        let total_duration = results.iter().map(|r| r.duration).sum();

        let total_assertions = results.iter().map(|r| r.assertions().count()).sum();
        let passed_assertions = results
            .iter()
            .flat_map(|r| r.assertions())
            .filter(|a| a.success)
            .count();

        Self {
            total: results.len(),
            passed,
            failed: results.len() - passed - skipped,
            skipped,
            total_duration,
            total_assertions,
            passed_assertions,
            failed_assertions: total_assertions - passed_assertions,
        }
    }

    pub fn is_success(&self) -> bool {
        self.failed == 0 && self.failed_assertions == 0
    }
}
