//! sqlpreview CLI - Preview schema migrations on pull requests.

use clap::Parser;

use sqlpreview_cli::cli::{Cli, Command};
use sqlpreview_cli::commands;
use sqlpreview_cli::error::CliResult;
use sqlpreview_cli::logging;
use sqlpreview_cli::output;

#[tokio::main]
async fn main() {
    logging::init();

    if let Err(e) = run().await {
        output::newline();
        output::error(&e.to_string());
        std::process::exit(1);
    }
}

async fn run() -> CliResult<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Preview(args) => commands::preview::run(*args).await,
        Command::Version => commands::version::run().await,
    }
}
