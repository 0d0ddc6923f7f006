use adbhost::cli::Cli;
use adbhost::commands::runner::CommandRunner;
use adbhost::config::Config;
use adbhost::output::OutputFormatter;
use clap::Parser;
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    env_logger::Builder::new()
        .filter_level(cli.verbose.log_level_filter())
        .init();

    let runner = CommandRunner::new(Config::load());
    match runner.run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            OutputFormatter::new().error(&e.to_string());
            ExitCode::FAILURE
        }
    }
}
