use anyhow::Result;
use clap::Parser;
use console::style;
use tracing::info;

use asset_deployer::config::DEFAULT_REGION;
use asset_deployer::pipeline::read_version;
use asset_deployer::{Credentials, DeployError, S3Client};

#[derive(Parser, Debug)]
#[command(
    name = "s3version",
    version = env!("CARGO_PKG_VERSION"),
    about = "Show the release version deployed to S3 buckets",
    long_about = "Reads version.json from each bucket and prints the recorded release version. \
                  Configure credentials via .env.",
    after_help = "Examples:\n  \
                  s3version mbq-assets-dev\n  \
                  s3version mbq-assets-dev mbq-assets-stg mbq-assets-prd"
)]
struct Cli {
    /// Buckets to inspect
    #[arg(required = true)]
    buckets: Vec<String>,

    /// AWS region (defaults to AWS_REGION or us-east-1)
    #[arg(long)]
    region: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    let log_level = std::env::var("LOG_LEVEL")
        .ok()
        .or_else(|| std::env::var("RUST_LOG").ok())
        .unwrap_or_else(|| "warn".to_string());

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .or_else(|_| tracing_subscriber::EnvFilter::try_new(&log_level))
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();

    let credentials = Credentials::from_env()?;
    let region = cli
        .region
        .or_else(|| std::env::var("AWS_REGION").ok())
        .unwrap_or_else(|| DEFAULT_REGION.to_string());
    info!("Reading version markers in {}", region);

    let client = S3Client::new(&credentials, &region).await;

    let mut failed = 0;
    for bucket in &cli.buckets {
        match read_version(&client, bucket).await {
            Ok(version) => println!("{} {}", style(bucket).bold(), style(version).green()),
            Err(e) => {
                failed += 1;
                let message = match &e {
                    DeployError::Download { .. } => "no version.json".to_string(),
                    other => other.user_message(),
                };
                println!("{} {}", style(bucket).bold(), style(message).red());
            }
        }
    }

    if failed > 0 {
        anyhow::bail!("{} of {} bucket(s) could not be read", failed, cli.buckets.len());
    }
    Ok(())
}
