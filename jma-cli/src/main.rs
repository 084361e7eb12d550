use std::time::Duration;

use clap::Parser;
use jma_fetch::{Endpoint, FetcherConfig, HttpGetter};
use tracing::{Level, error, info, warn};
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

mod cli;
mod error;

use cli::{CliArgs, split_header};
use error::AppError;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

/// A fetch target resolved from the command line
struct Target {
    label: String,
    url: String,
    use_cache: bool,
}

fn main() {
    match bootstrap() {
        Ok(0) => {}
        Ok(failed) => {
            eprintln!("{failed} target(s) failed");
            std::process::exit(2);
        }
        Err(e) => {
            eprintln!("Error: {e}");
            error!(error = ?e, "Application failed");
            std::process::exit(1);
        }
    }
}

#[tokio::main]
async fn bootstrap() -> Result<usize, AppError> {
    let args = CliArgs::parse();
    init_logging(args.verbose)?;

    let targets = args
        .targets
        .iter()
        .map(|raw| resolve_target(raw, args.no_cache))
        .collect::<Result<Vec<_>, _>>()?;

    let mut builder = FetcherConfig::builder()
        .with_cache_root(&args.cache_dir)
        .with_dispatch_interval(Duration::from_millis(args.interval_ms))
        .with_connect_timeout(Duration::from_secs(args.connect_timeout))
        .with_retries(args.retries, Duration::from_millis(500));
    if args.timeout > 0 {
        builder = builder.with_request_timeout(Duration::from_secs(args.timeout));
    }
    for header in &args.headers {
        match split_header(header) {
            Some((name, value)) => builder = builder.with_header(name, value),
            None => warn!("Invalid header format: '{header}'. Expected 'Name: Value'"),
        }
    }
    let config = builder.build();

    info!(
        cache_dir = ?config.cache_root,
        interval = ?config.dispatch_interval,
        targets = targets.len(),
        "Starting fetch"
    );

    let getter = HttpGetter::new(config)?;

    let results = futures::future::join_all(
        targets
            .iter()
            .map(|target| getter.get(&target.url, target.use_cache)),
    )
    .await;

    let mut failed = 0;
    for (target, result) in targets.iter().zip(results) {
        match result {
            Ok(body) => {
                if args.print {
                    match serde_json::from_slice::<serde_json::Value>(&body) {
                        Ok(json) => println!("{}", serde_json::to_string_pretty(&json)?),
                        Err(e) => {
                            failed += 1;
                            error!(feed = %target.label, error = %e, "Response is not JSON");
                        }
                    }
                } else {
                    println!("{}\t{} bytes\t{}", target.label, body.len(), target.url);
                }
            }
            Err(e) => {
                failed += 1;
                error!(feed = %target.label, url = %target.url, error = %e, "Fetch failed");
            }
        }
    }

    let stats = getter.stats();
    info!(
        cache_hits = stats.cache_hits,
        network_fetches = stats.network_fetches,
        failures = stats.transport_failures,
        "Done"
    );

    getter.shutdown();
    getter.stopped().await;
    Ok(failed)
}

fn resolve_target(raw: &str, no_cache: bool) -> Result<Target, AppError> {
    if raw.starts_with("http://") || raw.starts_with("https://") {
        return Ok(Target {
            label: raw.to_string(),
            url: raw.to_string(),
            use_cache: !no_cache && !jma_fetch::endpoints::is_volatile(raw),
        });
    }

    let endpoint: Endpoint = raw
        .parse()
        .map_err(|e: jma_fetch::endpoints::ParseEndpointError| AppError::InvalidInput(e.to_string()))?;
    Ok(Target {
        label: endpoint.to_string(),
        url: endpoint.url(),
        use_cache: !no_cache && !endpoint.is_volatile(),
    })
}

fn init_logging(verbose: bool) -> Result<(), AppError> {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env().add_directive(Level::INFO.into())
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .try_init()
        .map_err(|e| AppError::Initialization(e.to_string()))
}
