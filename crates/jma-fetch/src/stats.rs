use std::sync::atomic::{AtomicU64, Ordering};

/// Point-in-time counters of an [`HttpGetter`](crate::HttpGetter)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchStats {
    /// Requests answered from the disk cache
    pub cache_hits: u64,
    /// Requests that attached to an already pending fetch
    pub dedup_joins: u64,
    /// Transport invocations, retries included
    pub network_fetches: u64,
    /// Dispatches that ended in a transport error
    pub transport_failures: u64,
    /// Successful fetches whose body could not be persisted
    pub cache_write_failures: u64,
}

#[derive(Debug, Default)]
pub(crate) struct FetchCounters {
    pub cache_hits: AtomicU64,
    pub dedup_joins: AtomicU64,
    pub network_fetches: AtomicU64,
    pub transport_failures: AtomicU64,
    pub cache_write_failures: AtomicU64,
}

impl FetchCounters {
    pub fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> FetchStats {
        FetchStats {
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            dedup_joins: self.dedup_joins.load(Ordering::Relaxed),
            network_fetches: self.network_fetches.load(Ordering::Relaxed),
            transport_failures: self.transport_failures.load(Ordering::Relaxed),
            cache_write_failures: self.cache_write_failures.load(Ordering::Relaxed),
        }
    }
}
