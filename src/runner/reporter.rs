use colored::Colorize;

use crate::script::Assertion;
use crate::runner::types::{TestResult, TestSummary};

pub struct TestReporter {
    verbose: bool,
}

impl TestReporter {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }

    /// 打印单个请求结果
    pub fn print_result(&self, result: &TestResult) {
        if result.skipped {
            println!(
                " {} [{}] {} {} {}",
                "⊘".dimmed(),
                result.request_number,
                result.name,
                result.method.cyan(),
                "(skipped)".dimmed()
            );
        } else {
            let symbol = if result.success {
                "✓".green()
            } else {
                "✗".red()
            };
            let status = result
                .status
                .map(|s| format!(" {}", s))
                .unwrap_or_default();
            println!(
                " {} [{}] {} {}{} ({}ms)",
                symbol,
                result.request_number,
                result.name,
                result.method.cyan(),
                status,
                result.duration.as_millis()
            );
        }

        if self.verbose && !result.url.is_empty() {
            println!("   {}", result.url.dimmed());
        }

        if let Some(error) = &result.error {
            println!("   {}: {}", "Error".red().bold(), error);
        }

        self.print_assertions("Pre-Request Assertions", &result.pre_request_assertions);
        self.print_assertions("Post-Request Assertions", &result.post_request_assertions);
    }

    fn print_assertions(&self, title: &str, assertions: &[Assertion]) {
        if assertions.is_empty() {
            return;
        }
        // 非 verbose 模式下只在有失败时展开
        if !self.verbose && assertions.iter().all(|a| a.success) {
            return;
        }
        println!("   {}:", title);
        for assertion in assertions {
            if assertion.success {
                println!("     {} {}", "✓".green(), assertion.message);
            } else {
                println!("     {} {}", "✗".red(), assertion.message.red());
            }
        }
    }

    /// 打印文件标题
    pub fn print_header(&self, file_path: &str, total: usize) {
        println!(
            "\nRunning {} requests from {}...\n",
            total,
            file_path.bold()
        );
    }

    pub fn print_summary(&self, summary: &TestSummary) {
        println!("\n{}", "━".repeat(50));
        println!("{}", "Summary".bold());
        println!("{}", "━".repeat(50));

        let mut parts = vec![format!("{} passed", summary.passed.to_string().green())];
        if summary.failed > 0 {
            parts.push(format!("{} failed", summary.failed.to_string().red()));
        }
        if summary.skipped > 0 {
            parts.push(format!("{} skipped", summary.skipped.to_string().dimmed()));
        }
        parts.push(format!("{} total", summary.total));
        println!("  {}: {}", "Requests".bold(), parts.join(", "));

        if summary.total_assertions > 0 {
            if summary.failed_assertions == 0 {
                println!(
                    "  {}: {} passed, {} total",
                    "Assertions".bold(),
                    summary.passed_assertions.to_string().green(),
                    summary.total_assertions
                );
            } else {
                println!(
                    "  {}: {} passed, {} failed, {} total",
                    "Assertions".bold(),
                    summary.passed_assertions.to_string().green(),
                    summary.failed_assertions.to_string().red(),
                    summary.total_assertions
                );
            }
        }

        println!(
            "  {}: {:.3}s",
            "Duration".bold(),
            summary.total_duration.as_secs_f64()
        );
        println!();
    }
}

impl Default for TestReporter {
    fn default() -> Self {
        Self::new(false)
    }
}
