use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};

use rqscript::http::{Client, LoggingTransport, Transport};
use rqscript::parser;
use rqscript::runner::{TestExecutor, TestReporter, TestResult, TestSummary};
use rqscript::variable::{ConfigLoader, ProjectConfig};

pub type Result<T> = std::result::Result<T, anyhow::Error>;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// 输出 debug 日志以及完整的请求/响应内容
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// 执行 .http 文件或目录
    Run {
        /// 文件或目录（目录会递归查找 .http 文件）
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// 使用配置文件中的环境
        #[arg(short, long)]
        env: Option<String>,

        /// 变量覆盖，格式 KEY=VALUE，可重复
        #[arg(long = "var", value_name = "KEY=VALUE")]
        vars: Vec<String>,

        /// 配置文件路径，默认自动查找 rqscript.toml
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// 解析文件并打印请求
    Parse { file: PathBuf },
}

/// 执行 run 命令，返回是否全部通过
pub async fn run(
    paths: Vec<PathBuf>,
    env: Option<String>,
    vars: Vec<String>,
    config: Option<PathBuf>,
    verbose: bool,
) -> Result<bool> {
    let config = match config {
        Some(path) => ConfigLoader::load_from_path(&path)?,
        None => ConfigLoader::find_and_load()?.unwrap_or_default(),
    };

    let cli_vars = vars
        .iter()
        .map(|v| ConfigLoader::parse_cli_var(v))
        .collect::<std::result::Result<Vec<_>, _>>()?;
    let environment = ConfigLoader::build_environment(&config, env.as_deref(), &cli_vars)?;

    let executor = TestExecutor::new(build_transport(&config, verbose)?)
        .with_environment(environment)
        .with_script_options(config.script.clone());
    let reporter = TestReporter::new(verbose);

    let mut all_results: Vec<TestResult> = Vec::new();
    for path in &paths {
        let reports = executor
            .run_path(path)
            .await
            .with_context(|| format!("无法执行 {}", path.display()))?;

        for report in reports {
            reporter.print_header(&report.path.display().to_string(), report.results.len());
            for result in &report.results {
                reporter.print_result(result);
            }
            all_results.extend(report.results);
        }
    }

    let summary = TestSummary::from_results(&all_results);
    reporter.print_summary(&summary);
    Ok(summary.is_success())
}

fn build_transport(config: &ProjectConfig, verbose: bool) -> Result<Arc<dyn Transport>> {
    let client = Client::with_options(&config.client)?;
    if verbose {
        Ok(Arc::new(LoggingTransport::new(client)))
    } else {
        Ok(Arc::new(client))
    }
}

/// 执行 parse 命令
pub fn parse(file: PathBuf) -> Result<()> {
    let parsed = parser::parse_file(&file)
        .with_context(|| format!("无法解析 {}", file.display()))?;

    for (index, request) in parsed.requests.iter().enumerate() {
        if index > 0 {
            println!();
        }
        print!("{}", request);
    }
    Ok(())
}
