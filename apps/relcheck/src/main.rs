//! relcheck - content integrity checker for versioned update streams
//!
//! Audits one published release: every manifest against the root index,
//! every file blob against its manifest, and every pack archive against
//! the content it promises to deliver. Exits non-zero when any check
//! fails, so it slots directly into release pipelines.

mod cli;

use crate::cli::Cli;
use clap::Parser;
use relcheck_config::Config;
use relcheck_errors::Error;
use relcheck_net::{latest_version, NetClient, NetConfig};
use relcheck_verify::{Verifier, VerifyConfig};
use std::process;
use std::time::Duration;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.json, cli.debug);

    match run(cli).await {
        // content defects: report already printed, signal via exit code
        Ok(true) => process::exit(1),
        Ok(false) => {}
        // structural errors: could not even produce a report
        Err(e) => {
            error!("application error: {e}");
            eprintln!("Error: {e}");
            process::exit(2);
        }
    }
}

/// Load configuration, resolve the target version, run the verifier,
/// and render the report. Returns whether any check failed.
async fn run(cli: Cli) -> Result<bool, Error> {
    let mut config = Config::load_or_default(cli.config.as_deref()).await?;
    config.merge_env()?;

    // CLI flags take precedence over file and environment
    if let Some(upstream) = cli.upstream {
        config.upstream_url = upstream;
    }
    if let Some(cache) = cli.cache {
        config.paths.cache = cache;
    }

    let client = NetClient::new(NetConfig {
        timeout: Duration::from_secs(config.network.timeout),
        retry_count: config.network.retries,
        retry_delay: Duration::from_secs(config.network.retry_delay),
        ..NetConfig::default()
    })?;

    let version = match cli.version {
        Some(v) => v,
        None => {
            let v = latest_version(&client, &config.upstream_url).await?;
            info!(version = v, "resolved latest published release");
            v
        }
    };

    let mut verify_config = VerifyConfig::new(&config.upstream_url, &config.paths.cache);
    verify_config.patch_command = cli.patch_command;

    let verifier = Verifier::new(verify_config, client);
    let report = verifier.run(version, cli.recursive).await;

    if cli.json {
        println!("{}", report.render_json()?);
    } else {
        print!("{}", report.render_text());
    }

    Ok(report.has_failures())
}

fn init_tracing(json_mode: bool, debug: bool) {
    let debug_enabled = std::env::var("RUST_LOG").is_ok() || debug;

    if json_mode && !debug_enabled {
        // keep stdout parseable, drop console logging entirely
        tracing_subscriber::fmt()
            .with_writer(std::io::sink)
            .with_env_filter("off")
            .init();
        return;
    }

    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(if debug { "debug" } else { "info" })
    });

    // logs go to stderr so the report owns stdout
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .init();
}
