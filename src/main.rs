mod cli;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    rqscript::logger::init_logger(cli.verbose);

    match cli.command {
        Commands::Run {
            paths,
            env,
            vars,
            config,
        } => {
            let passed = cli::run(paths, env, vars, config, cli.verbose).await?;
            if !passed {
                std::process::exit(1);
            }
        }
        Commands::Parse { file } => cli::parse(file)?,
    }
    Ok(())
}
