//! E2E test harness entry point
//!
//! Runs the dynamic fields scenario against a live WordPress with the
//! Resolate plugin active. Live runs are opt-in so a plain `cargo test`
//! does not need a browser or a server:
//!
//!   RESOLATE_E2E=1 cargo test -p resolate-e2e --test e2e
//!   cargo test -p resolate-e2e --test e2e -- --run --base-url http://localhost:8889
//!
//! Exit codes: 0 passed (or skipped), 1 scenario failed, 2 harness error.

use clap::Parser;
use tracing_subscriber::EnvFilter;

use resolate_e2e::cli::HarnessArgs;
use resolate_e2e::{E2eConfig, E2eResult, TestRunner};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = HarnessArgs::parse();

    if !args.should_run() {
        println!("resolate-e2e: skipped (set RESOLATE_E2E=1 or pass --run to drive a browser)");
        std::process::exit(0);
    }

    let rt = tokio::runtime::Runtime::new().expect("Failed to create tokio runtime");
    let result = rt.block_on(async_main(args));

    match result {
        Ok(true) => std::process::exit(0),
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(2);
        }
    }
}

async fn async_main(args: HarnessArgs) -> E2eResult<bool> {
    let mut config = E2eConfig::load(&args.config)?;
    args.apply_to(&mut config)?;

    let runner = TestRunner::new(config);
    let report = runner.run().await?;

    if let Some(failed) = report.scenario.failed_step() {
        eprintln!(
            "Step '{}' failed after {} attempt(s): {}",
            failed.step_name,
            failed.attempts,
            failed.error.as_deref().unwrap_or("unknown error")
        );
    } else if let Some(error) = &report.error {
        eprintln!("Post-run check failed: {}", error);
    }

    Ok(report.success)
}
