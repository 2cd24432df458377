//! HeartMuLa Studio release pipeline.
//!
//! This binary validates, bundles, signs and packages the macOS app, exiting
//! non-zero with the failing stage named when any stage fails.

use heartmula_release::cli;
use std::process;

#[tokio::main]
async fn main() {
    let args = cli::Args::parse_args();

    // Initialize logging; RUST_LOG overrides the flag-derived default
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(args.log_filter()))
        .format_timestamp(None)
        .init();

    let exit_code = cli::run(args).await;
    process::exit(exit_code);
}
