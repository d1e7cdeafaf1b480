use clap::Parser;
use snafu::ResultExt;
use tracing_subscriber::EnvFilter;

use rozgar::cli::Cli;
use rozgar::error::{AppResult, LogFilterSnafu};

#[snafu::report]
#[tokio::main]
async fn main() -> AppResult<()> {
    let cli = Cli::parse();

    // RUST_LOG wins over --log-level.
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&cli.log_level).context(LogFilterSnafu {
            stage: "parse-log-level",
            directive: cli.log_level.clone(),
        })?,
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    rozgar::run(cli).await
}
