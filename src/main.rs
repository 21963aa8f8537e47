//! kithub - snippet store for an HTML/CSS/JS playground
//!
//! Command-line front end over the snippet store: save, update and list
//! snippets, move them in and out as JSON, start from templates, recover
//! autosaved drafts and render snippets as standalone pages.

use clap::Parser;
use env_logger::{Builder, Env};
use std::error::Error;

use kithub::cli::{self, Cli};

fn init_logger() {
    // RUST_LOG overrides; the CLI stays quiet below warn by default
    Builder::from_env(Env::default().default_filter_or("warn"))
        .format_timestamp_millis()
        .init();
}

/// Application entry point: parse arguments, open the store and run one
/// command.
#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    color_eyre::install()?;
    init_logger();

    let args = Cli::parse();
    cli::run(args).await?;

    Ok(())
}
