//! Command-line entry point for the suite build driver.
//!
//! Usage: `ascbuild [suite-dir]`, where `suite-dir` defaults to
//! `testsuite`. The launch budget comes from `ASCBUILD_CONCURRENCY` and
//! `ASCBUILD_MINTIME_MS`; see the `throttle` module.

use std::path::PathBuf;
use std::process::ExitCode;

use tracing_subscriber::EnvFilter;

use ascbuild::compile::Compiler;
use ascbuild::driver;
use ascbuild::throttle::ThrottleConfig;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let suite_dir = std::env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("testsuite"));

    let config = ThrottleConfig::from_env();
    match driver::build(&suite_dir, &Compiler::assemblyscript(), config).await {
        Ok(summary) => {
            println!(
                "Tests compiled ({} built, {} already fresh)",
                summary.compiled, summary.fresh
            );
            ExitCode::SUCCESS
        }
        Err(error) => {
            eprintln!("Tests failed to compile:");
            eprintln!("{error}");
            ExitCode::FAILURE
        }
    }
}
