use clap::Parser;
use ypost_core::logging;

mod cli;

use crate::cli::Cli;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // The log file keeps the terminal free for the status line; stderr if it cannot be opened.
    if logging::init_logging(cli.verbose).is_err() {
        logging::init_logging_stderr(cli.verbose);
    }

    if let Err(err) = cli.run().await {
        eprintln!("ypost error: {:#}", err);
        std::process::exit(1);
    }
}
