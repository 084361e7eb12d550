use clap::Parser;
use std::path::PathBuf;

/// Define CLI arguments
#[derive(Parser, Debug)]
#[command(
    version,
    about = "Fetch JMA open-data feeds through a local cache",
    long_about = "Fetches Japan Meteorological Agency open-data JSON feeds.\n\
                  \n\
                  Requests are sent one at a time at a fixed pace, and every response is\n\
                  stored under the cache directory so later runs are served locally.\n\
                  Targets are URLs or named feeds: area, amedas-table, himawari-times,\n\
                  forecast:<office>, overview:<office>, amedas-map:<YYYYMMDDhhmmss>."
)]
pub struct CliArgs {
    /// URLs or named feeds to fetch
    #[arg(required = true, help = "URL(s) or named feeds such as 'area' or 'forecast:130000'")]
    pub targets: Vec<String>,

    /// Cache directory
    #[arg(
        short,
        long,
        default_value = "cache",
        help = "Directory where responses are cached"
    )]
    pub cache_dir: PathBuf,

    /// Always go to the network
    #[arg(long, help = "Ignore existing cache entries (responses are still cached)")]
    pub no_cache: bool,

    /// Print decoded JSON instead of a summary line
    #[arg(short, long, help = "Pretty-print the JSON body of each target")]
    pub print: bool,

    /// Pause between requests in milliseconds
    #[arg(long, default_value = "500", help = "Minimum pause between two requests in milliseconds")]
    pub interval_ms: u64,

    /// Per-request deadline in seconds
    #[arg(long, default_value = "0", help = "Deadline for a single request in seconds (0 = none)")]
    pub timeout: u64,

    /// Connection timeout in seconds
    #[arg(
        long,
        default_value = "10",
        help = "Connection timeout in seconds (time to establish initial connection)"
    )]
    pub connect_timeout: u64,

    /// Retry attempts for failed requests
    #[arg(long, default_value = "0", help = "Retries for connection errors, timeouts and 5xx responses")]
    pub retries: u32,

    /// Custom HTTP headers
    #[arg(short = 'H', long = "header", help = "Extra request header in 'Name: Value' form")]
    pub headers: Vec<String>,

    /// Enable verbose logging
    #[arg(short, long, help = "Enable detailed debug logging")]
    pub verbose: bool,
}

/// Split a `Name: Value` header argument
pub fn split_header(header: &str) -> Option<(&str, &str)> {
    let (name, value) = header.split_once(':')?;
    let name = name.trim();
    (!name.is_empty()).then(|| (name, value.trim()))
}
