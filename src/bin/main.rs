//! Binary entrypoint for the envelope client

use colored::Colorize;

#[tokio::main]
async fn main() {
    if let Err(err) = envelope_client::cli::run().await {
        eprintln!("{} {}", "error:".red().bold(), err);
        std::process::exit(1);
    }
}
