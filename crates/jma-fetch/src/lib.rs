//! # jma-fetch
//!
//! Fetch-and-cache layer for the Japan Meteorological Agency open-data
//! JSON feeds.
//!
//! ## Features
//!
//! - One request in flight at a time, dispatched FIFO at a fixed pace
//! - Concurrent requests for the same URL collapse into one fetch
//! - Every successful body is persisted under `{cache_root}/{host}/{path}`
//! - Cache hits never touch the network; `use_cache = false` forces a refetch
//!
//! ```no_run
//! use jma_fetch::{FetcherConfig, HttpGetter, endpoints};
//!
//! # async fn run() -> Result<(), jma_fetch::FetchError> {
//! let getter = HttpGetter::new(FetcherConfig::builder().with_cache_root("cache").build())?;
//! let area = getter.get_json(endpoints::AREA_URL, true).await?;
//! println!("{} centers", area["centers"].as_object().map_or(0, |c| c.len()));
//! getter.shutdown();
//! # Ok(())
//! # }
//! ```

pub mod builder;
pub mod cache;
pub mod config;
pub mod endpoints;
pub mod error;
pub mod getter;
mod stats;
pub mod transport;

pub use builder::FetcherConfigBuilder;
pub use cache::{CacheKey, DiskCache};
pub use config::FetcherConfig;
pub use endpoints::Endpoint;
pub use error::{FetchError, TransportError};
pub use getter::{DispatcherState, HttpGetter};
pub use stats::FetchStats;
pub use transport::{ReqwestTransport, Transport, TransportResponse, create_client};
