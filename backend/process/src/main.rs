use std::{path::PathBuf, process::ExitCode, time::Duration};

use clap::Parser;
use process::models::DEFAULT_ENDPOINT;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    manifest: PathBuf,

    #[arg(long, default_value = DEFAULT_ENDPOINT)]
    endpoint: String,

    #[arg(long, default_value = "mapping.json")]
    output: PathBuf,

    #[arg(long, default_value_t = 10_000)]
    timeout_ms: u64,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    match process::backfill(
        &args.manifest,
        &args.endpoint,
        &args.output,
        Duration::from_millis(args.timeout_ms),
    )
    .await
    {
        Ok(summary) if summary.failed.is_empty() => ExitCode::SUCCESS,
        Ok(_) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("Backfill failed: {e:#}");
            ExitCode::FAILURE
        }
    }
}
