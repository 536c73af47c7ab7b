//! TexCal CLI — turn shared text into a calendar event.
//!
//! Asks a language model to extract one schedule from free-form text,
//! resolves it into concrete start/end instants, and prints it as text,
//! JSON, or an iCalendar event.

mod commands;
mod render;

use std::process::ExitCode;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
