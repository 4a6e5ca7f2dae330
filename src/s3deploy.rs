use anyhow::{Context, Result};
use clap::Parser;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::info;

use asset_deployer::config::{DEFAULT_REGION, ENVIRONMENT_BUCKETS};
use asset_deployer::pipeline::UPLOAD_CONCURRENCY;
use asset_deployer::s3::helpers::{format_size, parse_redirects, parse_redirects_json};
use asset_deployer::{
    BucketSet, Credentials, DeployError, DeployReport, Deployer, MemoryStore, ObjectStore,
    S3Client, UploadConfig,
};

#[derive(Parser, Debug)]
#[command(
    name = "s3deploy",
    version = env!("CARGO_PKG_VERSION"),
    about = "Upload a static build to one or more S3 buckets",
    long_about = "Uploads every file of a build directory to each target bucket. Files under a directory \
                  named after the release version are cached for ten years, everything else for five \
                  minutes. Versioned files are uploaded before unversioned ones, and bucket redirect \
                  rules are replaced once all uploads succeed. Configure credentials via .env.",
    after_help = "Examples:\n  \
                  s3deploy build --all-environments --prefix omd --release 216\n  \
                  s3deploy build -b dev.mbq.io -b stg.mbq.io -r app=omd/index.html\n  \
                  s3deploy build -b dev.mbq.io --dry-run\n\n\
                  Configuration (.env):\n  \
                  AWS_ACCESS_KEY_ID=...\n  \
                  AWS_SECRET_ACCESS_KEY=...\n  \
                  AWS_REGION=us-east-1"
)]
struct Cli {
    /// Build directory to upload
    #[arg(default_value = "build")]
    local_dir: PathBuf,

    /// Target bucket (repeatable)
    #[arg(long = "bucket", short = 'b', required_unless_present = "all_environments")]
    buckets: Vec<String>,

    /// Upload to the dev, staging and production asset buckets
    #[arg(long, conflicts_with = "buckets")]
    all_environments: bool,

    /// Key prefix, e.g. the application name
    #[arg(long, short = 'p')]
    prefix: Option<String>,

    /// Release version; files under a directory with this name are cached for ten years
    #[arg(long, value_name = "VERSION")]
    release: Option<String>,

    /// Redirect rules as from=to pairs (comma-separated or repeated)
    #[arg(long = "redirect", short = 'r')]
    redirects: Vec<String>,

    /// JSON file with an object of from -> to redirects
    #[arg(long)]
    redirects_file: Option<PathBuf>,

    /// Write version.json with the release version to every bucket
    #[arg(long, requires = "release")]
    write_version_marker: bool,

    /// Maximum number of concurrent uploads (1-25)
    #[arg(
        long,
        short = 'c',
        default_value = "25",
        value_parser = clap::value_parser!(u16).range(1..=UPLOAD_CONCURRENCY as i64)
    )]
    max_concurrent: u16,

    /// AWS region (defaults to AWS_REGION or us-east-1)
    #[arg(long)]
    region: Option<String>,

    /// Abort the deployment after this many seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// Run the whole pipeline against an in-memory store and list what would be uploaded
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file early to get LOG_LEVEL
    dotenv::dotenv().ok();

    // Initialize tracing/logging with support for LOG_LEVEL from .env
    let log_level = std::env::var("LOG_LEVEL")
        .ok()
        .or_else(|| std::env::var("RUST_LOG").ok())
        .unwrap_or_else(|| "info".to_string());

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .or_else(|_| tracing_subscriber::EnvFilter::try_new(&log_level))
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_level(true)
        .init();

    let cli = Cli::parse();

    info!("S3 Deploy Tool v{}", env!("CARGO_PKG_VERSION"));

    match deploy(&cli).await {
        Ok(()) => Ok(()),
        Err(e) => {
            if let Some(deploy_error) = e.downcast_ref::<DeployError>() {
                eprintln!("{} {}", style("✗").red(), style(deploy_error.user_message()).red());
            }
            Err(e)
        }
    }
}

async fn deploy(cli: &Cli) -> Result<()> {
    let buckets = if cli.all_environments {
        BucketSet::all_environments()
    } else {
        BucketSet::new(cli.buckets.iter().cloned())?
    };

    let mut redirects = parse_redirects(&cli.redirects)?;
    if let Some(path) = &cli.redirects_file {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read redirects file {}", path.display()))?;
        redirects.extend(parse_redirects_json(&json)?);
    }

    // A dry run never talks to S3, so it needs no real credentials.
    let credentials = if cli.dry_run {
        Credentials::from_env().unwrap_or_else(|_| Credentials::new("dry-run", "dry-run"))
    } else {
        Credentials::from_env()?
    };

    let mut config = UploadConfig::new(credentials, &cli.local_dir).with_redirects(redirects);
    config.region = cli
        .region
        .clone()
        .or_else(|| std::env::var("AWS_REGION").ok())
        .unwrap_or_else(|| DEFAULT_REGION.to_string());
    config.prefix = cli.prefix.clone();
    config.version = cli.release.clone();
    config.write_version_marker = cli.write_version_marker;
    config.timeout = cli.timeout.map(Duration::from_secs);

    println!(
        "{}",
        style(format!(
            "📦 Target: {} ← {}",
            buckets.iter().collect::<Vec<_>>().join(", "),
            cli.local_dir.display()
        ))
        .cyan()
        .bold()
    );
    if cli.all_environments {
        info!("Environments: {}", ENVIRONMENT_BUCKETS.join(", "));
    }

    let memory = Arc::new(MemoryStore::new());
    let store: Arc<dyn ObjectStore> = if cli.dry_run {
        println!(
            "{}",
            style("🔍 DRY RUN MODE - No files will be uploaded")
                .yellow()
                .bold()
        );
        memory.clone()
    } else {
        Arc::new(S3Client::new(&config.credentials, &config.region).await)
    };

    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} uploads {msg}")
            .context("Invalid progress bar template")?
            .progress_chars("#>-"),
    );

    let deployer = Deployer::new(store)
        .with_upload_concurrency(usize::from(cli.max_concurrent))
        .with_progress(pb.clone());

    let started = Instant::now();
    let result = deployer.upload_to_buckets(&buckets, &config).await;
    pb.finish_and_clear();
    let report = result?;

    if cli.dry_run {
        print_dry_run(&memory, &buckets);
    }
    print_summary(&report, started.elapsed());

    Ok(())
}

/// List every object the dry run would have written, bucket by bucket
fn print_dry_run(store: &MemoryStore, buckets: &BucketSet) {
    for bucket in buckets.iter() {
        println!();
        println!("{}", style(format!("s3://{}", bucket)).bold());
        for key in store.keys(bucket) {
            let Some(object) = store.object(bucket, &key) else {
                continue;
            };
            let cache = object
                .headers
                .get("cache-control")
                .map(String::as_str)
                .unwrap_or("-");
            println!(
                "  {} {} ({}, {})",
                style("WOULD UPLOAD").green().bold(),
                key,
                format_size(object.body.len() as u64),
                style(cache).dim()
            );
        }
        if let Some(website) = store.website(bucket) {
            for rule in &website.routing_rules {
                println!(
                    "  {} {} → https://{}/{}",
                    style("WOULD REDIRECT").yellow().bold(),
                    rule.key_prefix_equals.as_deref().unwrap_or(""),
                    rule.host_name.as_deref().unwrap_or(bucket),
                    rule.replace_key_with.as_deref().unwrap_or("")
                );
            }
        }
    }
}

fn print_summary(report: &DeployReport, duration: Duration) {
    println!("\n{}", style("═".repeat(70)).dim());
    println!(
        "{}",
        style(format!(
            "Summary: {} uploads ({} versioned, {} unversioned files), {} bucket(s) redirected",
            report.uploads.len(),
            report.versioned_files,
            report.unversioned_files,
            report.redirected_buckets.len()
        ))
        .bold()
    );

    let total_bytes = report.total_bytes();
    if total_bytes > 0 {
        println!(
            "{}",
            style(format!(
                "Total uploaded: {} ({} bytes)",
                format_size(total_bytes),
                total_bytes
            ))
            .dim()
        );
    }

    if !report.version_markers.is_empty() {
        println!(
            "{}",
            style(format!(
                "Version marker written to: {}",
                report.version_markers.join(", ")
            ))
            .dim()
        );
    }

    if duration.as_secs() > 0 {
        let speed = total_bytes as f64 / duration.as_secs_f64() / 1024.0 / 1024.0;
        println!(
            "{}",
            style(format!(
                "Time: {:.2}s, Average speed: {:.2} MB/s",
                duration.as_secs_f64(),
                speed
            ))
            .dim()
        );
    }
}
