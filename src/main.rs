//! osa-releases command-line entry point.

use anyhow::Result;
use clap::Parser;
use osa_releases::cli;
use osa_releases::core::user_friendly_error;

fn main() -> Result<()> {
    let cli = cli::Cli::parse();

    // Logs on stderr keep stdout clean for reports
    tracing_subscriber::fmt()
        .with_env_filter(cli.env_filter())
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    // Set up colored output for Windows
    #[cfg(windows)]
    colored::control::set_virtual_terminal(true).ok();

    let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build()?;

    match runtime.block_on(cli.execute()) {
        Ok(()) => Ok(()),
        Err(e) => {
            // Convert to user-friendly error with context and suggestions
            let error_ctx = user_friendly_error(e);
            error_ctx.display();
            std::process::exit(1);
        }
    }
}
