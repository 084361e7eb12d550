//! # HttpGetter
//!
//! Serializes outbound GETs through a single paced dispatcher task,
//! collapses concurrent requests for one URL into a single fetch, and
//! persists every successful body to the [`DiskCache`].
//!
//! Callers park on a shared one-shot result per URL. The dispatcher pops
//! one URL at a time (FIFO), fetches it, writes the cache, removes the
//! pending entry and then wakes every waiter.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use bytes::Bytes;
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use tokio::sync::{mpsc, oneshot, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::cache::{CacheKey, DiskCache};
use crate::endpoints;
use crate::stats::{FetchCounters, FetchStats};
use crate::transport::{ReqwestTransport, Transport};
use crate::{FetchError, FetcherConfig, TransportError};

type FetchResult = Result<Bytes, FetchError>;
type SharedFetch = Shared<BoxFuture<'static, FetchResult>>;

/// A URL that is queued or in flight
struct PendingFetch {
    fetch: SharedFetch,
    /// Set once any waiter asked to bypass the cache
    bypass_cache: Arc<AtomicBool>,
}

/// Lifecycle of the background dispatcher
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatcherState {
    /// Waiting for the queue to become non-empty, or pacing between cycles
    Idle,
    /// One request is in flight
    Dispatching,
    /// No further requests will be dispatched
    Stopped,
}

struct QueuedRequest {
    url: Url,
    key: CacheKey,
    bypass_cache: Arc<AtomicBool>,
    tx: oneshot::Sender<FetchResult>,
}

/// State shared between handles and the dispatcher task.
///
/// Does not own the queue sender, so the dispatcher notices when the
/// last `HttpGetter` handle is dropped.
struct Core {
    config: FetcherConfig,
    cache: DiskCache,
    transport: Arc<dyn Transport>,
    pending: Mutex<HashMap<String, PendingFetch>>,
    counters: FetchCounters,
}

struct Handle {
    core: Arc<Core>,
    queue_tx: mpsc::UnboundedSender<QueuedRequest>,
    shutdown: CancellationToken,
    state_rx: watch::Receiver<DispatcherState>,
}

/// Paced, deduplicating fetcher with a per-URL disk cache.
///
/// Cheap to clone; all clones share one queue and one dispatcher.
#[derive(Clone)]
pub struct HttpGetter {
    inner: Arc<Handle>,
}

impl HttpGetter {
    /// Create a getter backed by a `reqwest` client built from `config`.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(config: FetcherConfig) -> Result<Self, FetchError> {
        let transport = ReqwestTransport::from_config(&config)?;
        Ok(Self::with_transport(config, Arc::new(transport)))
    }

    /// Create a getter over an arbitrary transport and spawn its dispatcher.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn with_transport(config: FetcherConfig, transport: Arc<dyn Transport>) -> Self {
        let cache = DiskCache::new(config.cache_root.clone(), config.query_in_cache_key);
        let core = Arc::new(Core {
            config,
            cache,
            transport,
            pending: Mutex::new(HashMap::new()),
            counters: FetchCounters::default(),
        });

        let (queue_tx, queue_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(DispatcherState::Idle);
        let shutdown = CancellationToken::new();

        let dispatcher = Dispatcher {
            core: Arc::clone(&core),
            queue_rx,
            shutdown: shutdown.clone(),
            state_tx,
        };
        tokio::spawn(dispatcher.run());

        Self {
            inner: Arc::new(Handle {
                core,
                queue_tx,
                shutdown,
                state_rx,
            }),
        }
    }

    /// Fetch `url`, from the cache when `use_cache` is set and an entry exists.
    ///
    /// Concurrent calls for the same URL share one network request and
    /// observe the same outcome.
    pub async fn get(&self, url: &str, use_cache: bool) -> Result<Bytes, FetchError> {
        let url = Url::parse(url).map_err(|e| FetchError::InvalidUrl(format!("{url}: {e}")))?;
        self.get_url(&url, use_cache).await
    }

    pub async fn get_url(&self, url: &Url, use_cache: bool) -> Result<Bytes, FetchError> {
        info!(url = %url, use_cache, "get");
        let core = &self.inner.core;
        let key = core.cache.key_for(url)?;

        if use_cache {
            match core.cache.read(&key).await {
                Ok(Some(data)) => {
                    FetchCounters::bump(&core.counters.cache_hits);
                    debug!(url = %url, size = data.len(), "Cache hit");
                    return Ok(data);
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(url = %url, error = %e, "Failed to read cache entry, fetching instead");
                }
            }
        }

        let fetch = self.pending_or_enqueue(url, key, use_cache)?;
        fetch.await
    }

    /// Fetch `url` and decode the body as JSON.
    pub async fn get_json(&self, url: &str, use_cache: bool) -> Result<serde_json::Value, FetchError> {
        self.get_json_as(url, use_cache).await
    }

    /// Fetch `url` and decode the body into `T`.
    ///
    /// A body that downloaded fine but does not decode is a
    /// [`FetchError::Decode`]; the raw bytes stay cached.
    pub async fn get_json_as<T: DeserializeOwned>(
        &self,
        url: &str,
        use_cache: bool,
    ) -> Result<T, FetchError> {
        let data = self.get(url, use_cache).await?;
        serde_json::from_slice(&data).map_err(|e| FetchError::decode(url, e))
    }

    /// Like [`get_json`](Self::get_json), bypassing the cache for feeds
    /// that are republished under the same URL.
    pub async fn get_endpoint_json(&self, url: &str) -> Result<serde_json::Value, FetchError> {
        self.get_json(url, !endpoints::is_volatile(url)).await
    }

    /// Stop dispatching. The request in flight, if any, still completes.
    ///
    /// Requests still queued are not left pending: they resolve with
    /// [`FetchError::Shutdown`], as does any later call that misses the
    /// cache. Cache hits keep working after shutdown.
    pub fn shutdown(&self) {
        if !self.inner.shutdown.is_cancelled() {
            info!("HttpGetter shutdown requested");
        }
        self.inner.shutdown.cancel();
    }

    pub fn state(&self) -> DispatcherState {
        *self.inner.state_rx.borrow()
    }

    /// Wait until the dispatcher has stopped.
    pub async fn stopped(&self) {
        let mut state_rx = self.inner.state_rx.clone();
        // sender gone means the dispatcher task is gone too
        let _ = state_rx
            .wait_for(|state| *state == DispatcherState::Stopped)
            .await;
    }

    pub fn stats(&self) -> FetchStats {
        self.inner.core.counters.snapshot()
    }

    /// Number of URLs currently queued or in flight
    pub fn pending_count(&self) -> usize {
        self.inner.core.pending.lock().len()
    }

    pub fn cache(&self) -> &DiskCache {
        &self.inner.core.cache
    }

    pub fn config(&self) -> &FetcherConfig {
        &self.inner.core.config
    }

    fn pending_or_enqueue(
        &self,
        url: &Url,
        key: CacheKey,
        use_cache: bool,
    ) -> Result<SharedFetch, FetchError> {
        let core = &self.inner.core;
        let mut pending = core.pending.lock();

        if let Some(existing) = pending.get(url.as_str()) {
            FetchCounters::bump(&core.counters.dedup_joins);
            if !use_cache {
                existing.bypass_cache.store(true, Ordering::Release);
            }
            debug!(url = %url, "Joining pending request");
            return Ok(existing.fetch.clone());
        }

        if self.inner.shutdown.is_cancelled() {
            return Err(FetchError::Shutdown);
        }

        let bypass_cache = Arc::new(AtomicBool::new(!use_cache));
        let (tx, rx) = oneshot::channel();
        // The lock is held until the entry is registered, so the dispatcher
        // cannot complete and unregister this URL before it exists.
        self.inner
            .queue_tx
            .send(QueuedRequest {
                url: url.clone(),
                key,
                bypass_cache: Arc::clone(&bypass_cache),
                tx,
            })
            .map_err(|_| FetchError::Shutdown)?;

        let fetch = rx
            .map(|result| result.unwrap_or(Err(FetchError::Shutdown)))
            .boxed()
            .shared();
        pending.insert(
            url.as_str().to_owned(),
            PendingFetch {
                fetch: fetch.clone(),
                bypass_cache,
            },
        );
        debug!(url = %url, queued = pending.len(), "Enqueued request");

        Ok(fetch)
    }
}

struct Dispatcher {
    core: Arc<Core>,
    queue_rx: mpsc::UnboundedReceiver<QueuedRequest>,
    shutdown: CancellationToken,
    state_tx: watch::Sender<DispatcherState>,
}

impl Dispatcher {
    async fn run(mut self) {
        info!(
            interval = ?self.core.config.dispatch_interval,
            cache_root = ?self.core.cache.root(),
            "HttpGetter dispatcher started"
        );

        loop {
            let request = tokio::select! {
                biased;

                _ = self.shutdown.cancelled() => break,

                request = self.queue_rx.recv() => match request {
                    Some(request) => request,
                    // every HttpGetter handle was dropped
                    None => break,
                },
            };

            self.state_tx.send_replace(DispatcherState::Dispatching);
            self.dispatch(request).await;
            self.state_tx.send_replace(DispatcherState::Idle);

            tokio::select! {
                biased;

                _ = self.shutdown.cancelled() => break,

                _ = tokio::time::sleep(self.core.config.dispatch_interval) => {}
            }
        }

        self.drain();
        self.state_tx.send_replace(DispatcherState::Stopped);
        info!("HttpGetter dispatcher stopped");
    }

    async fn dispatch(&self, request: QueuedRequest) {
        let QueuedRequest {
            url,
            key,
            bypass_cache,
            tx,
        } = request;
        debug!(url = %url, "Dispatching request");

        // An earlier fetch of this URL may have filled the cache after the
        // caller's own lookup missed.
        if !bypass_cache.load(Ordering::Acquire) {
            if let Ok(Some(data)) = self.core.cache.read(&key).await {
                FetchCounters::bump(&self.core.counters.cache_hits);
                debug!(url = %url, size = data.len(), "Cache filled while queued");
                self.core.pending.lock().remove(url.as_str());
                let _ = tx.send(Ok(data));
                return;
            }
        }

        let result = match self.fetch_with_retries(&url).await {
            Ok(body) => {
                debug!(url = %url, size = body.len(), "done");
                match self.core.cache.write(&key, &body).await {
                    Ok(path) => info!(path = ?path, "save"),
                    Err(e) => {
                        FetchCounters::bump(&self.core.counters.cache_write_failures);
                        warn!(url = %url, error = %e, "Failed to persist response to cache");
                    }
                }
                Ok(body)
            }
            Err(e) => {
                FetchCounters::bump(&self.core.counters.transport_failures);
                error!(url = %url, error = %e, "Fetch failed");
                Err(FetchError::from(e))
            }
        };

        self.core.pending.lock().remove(url.as_str());
        // every waiter may have given up already
        let _ = tx.send(result);
    }

    async fn fetch_with_retries(&self, url: &Url) -> Result<Bytes, TransportError> {
        let config = &self.core.config;
        let mut attempts = 0;
        loop {
            attempts += 1;
            let err = match self.fetch_once(url).await {
                Ok(body) => return Ok(body),
                Err(e) => e,
            };

            if attempts > config.max_retries || !err.is_retryable() {
                return Err(err);
            }

            let delay = config.backoff(attempts);
            warn!(url = %url, attempt = attempts, delay = ?delay, error = %err, "Retrying request");
            tokio::time::sleep(delay).await;
        }
    }

    async fn fetch_once(&self, url: &Url) -> Result<Bytes, TransportError> {
        FetchCounters::bump(&self.core.counters.network_fetches);

        let fetch = self.core.transport.fetch(url);
        let response = match self.core.config.request_timeout {
            Some(limit) => tokio::time::timeout(limit, fetch)
                .await
                .map_err(|_| TransportError::Timeout(limit))??,
            None => fetch.await?,
        };

        if response.status.is_success() {
            Ok(response.body)
        } else {
            Err(TransportError::Status {
                url: url.to_string(),
                status: response.status,
            })
        }
    }

    /// Fail whatever is still queued once dispatching has ended.
    fn drain(&mut self) {
        self.queue_rx.close();
        let mut dropped = 0;
        while let Ok(request) = self.queue_rx.try_recv() {
            self.core.pending.lock().remove(request.url.as_str());
            let _ = request.tx.send(Err(FetchError::Shutdown));
            dropped += 1;
        }
        if dropped > 0 {
            warn!(count = dropped, "Discarded queued requests on shutdown");
        }
    }
}
