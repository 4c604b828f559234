// hls-discovery: find the HLS manifest a web page plays
//
// Launches a headless Chromium, opens the page and prints the .m3u8 URL
// seen in its network traffic. Logs go to stderr, the result to stdout.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use hls_discovery::{
    BrowserManager, Config, DiscoveryError, DiscoveryReport, DiscoveryRequest,
    discover_with_manager, load_config_from, load_yaml_config,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "hls-discovery", version, about = "Find the HLS (.m3u8) manifest loaded by a web page")]
struct Cli {
    /// Page to open (absolute http(s) URL)
    url: String,

    /// Seconds to keep watching network traffic
    #[arg(short, long)]
    timeout: Option<u64>,

    /// Seconds between two network log pulls
    #[arg(long)]
    poll_interval: Option<f64>,

    /// YAML config file (defaults to config.yaml in the package root)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print the full report as JSON
    #[arg(long)]
    json: bool,

    /// Show the browser window
    #[arg(long)]
    headed: bool,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("hls_discovery=info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(path) => load_config_from(path)?,
        None => load_yaml_config()?,
    };

    if cli.headed {
        config.browser.headless = false;
    }
    if let Some(timeout) = cli.timeout {
        config.discovery.timeout_secs = timeout;
    }
    if let Some(interval) = cli.poll_interval {
        config.discovery.poll_interval_secs = interval;
    }

    Ok(config)
}

fn print_report(report: &DiscoveryReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }

    match report.result.selected() {
        Some(selected) => {
            println!("{selected}");
            for alternative in report.result.alternatives() {
                println!("  alt: {alternative}");
            }
        }
        None => eprintln!("No .m3u8 manifest found on {}", report.target_url),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    init_tracing();

    let cli = Cli::parse();
    let config = load_config(&cli)?;

    let request = DiscoveryRequest::from_config(cli.url.clone(), &config.discovery);
    let manager = BrowserManager::new(config.browser.clone());

    let outcome = discover_with_manager(&manager, &request, &config.discovery).await;
    manager.shutdown().await?;

    match outcome {
        Ok(report) => {
            print_report(&report, cli.json)?;
            Ok(if report.result.is_found() {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(1)
            })
        }
        Err(e @ DiscoveryError::InvalidInput(_)) => {
            eprintln!("{e}");
            Ok(ExitCode::from(2))
        }
        Err(e @ DiscoveryError::Session(_)) => {
            tracing::error!("Discovery aborted: {}", e);
            if cli.json {
                let failure = serde_json::json!({
                    "target_url": request.target_url,
                    "result": { "status": "not_found" },
                    "error": e.to_string(),
                });
                println!("{}", serde_json::to_string_pretty(&failure)?);
            }
            Ok(ExitCode::from(2))
        }
    }
}
