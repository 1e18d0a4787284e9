//! sfpkg entry point
//!
//! Loads the pipeline configuration from `sfpkg.toml` and the `SFPKG_*`
//! environment, runs the pipeline, and prints the test list for the
//! deployment step to capture. Logs go to stderr; stdout carries only the
//! test list or the `not a test` sentinel.

use anyhow::Result;
use sfpkg_cli::apex::TestRequirement;
use sfpkg_cli::config::PipelineConfig;
use sfpkg_cli::core::user_friendly_error;
use sfpkg_cli::pipeline::Pipeline;
use tracing_subscriber::EnvFilter;

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

async fn run() -> Result<TestRequirement> {
    let config = PipelineConfig::load().await?;
    let outcome = Pipeline::new(config).run().await?;
    Ok(outcome.tests)
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();

    // Set up colored output for Windows
    #[cfg(windows)]
    colored::control::set_virtual_terminal(true).ok();

    match run().await {
        Ok(tests) => {
            println!("{tests}");
            Ok(())
        }
        Err(e) => {
            // Convert to user-friendly error with context and suggestions
            let error_ctx = user_friendly_error(e);
            error_ctx.display();
            std::process::exit(1);
        }
    }
}
