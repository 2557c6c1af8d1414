//! Shared Application State
//!
//! Thread-safe prover handle, proof cache and request counters.

use dashmap::DashMap;
use gindex_proofs::{BlockId, DataSource, PathSpec, ProofArtifact, ProofRequest, Prover, ProverError};
use parking_lot::RwLock;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

/// Shared application state
#[derive(Debug)]
pub struct AppState<S> {
    inner: Arc<AppStateInner<S>>,
}

impl<S> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

#[derive(Debug)]
struct AppStateInner<S> {
    prover: Prover<S>,
    /// Artifacts of finalized blocks, with the tick of their last use
    cache: DashMap<(BlockId, PathSpec), (ProofArtifact, u64)>,
    cache_capacity: usize,
    /// Monotonic counter ordering cache uses
    cache_tick: AtomicU64,
    /// Latest finalized slot seen; only grows
    finalized_slot: AtomicU64,
    proofs_served: AtomicU64,
    proofs_failed: AtomicU64,
    cache_hits: AtomicU64,
    /// Service start time
    start_time: Instant,
    /// Last error message
    last_error: RwLock<Option<String>>,
}

impl<S: DataSource> AppState<S> {
    /// Create new application state caching at most `cache_capacity` proofs
    #[must_use]
    pub fn new(prover: Prover<S>, cache_capacity: usize) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                prover,
                cache: DashMap::new(),
                cache_capacity,
                cache_tick: AtomicU64::new(0),
                finalized_slot: AtomicU64::new(0),
                proofs_served: AtomicU64::new(0),
                proofs_failed: AtomicU64::new(0),
                cache_hits: AtomicU64::new(0),
                start_time: Instant::now(),
                last_error: RwLock::new(None),
            }),
        }
    }

    #[must_use]
    pub fn prover(&self) -> &Prover<S> {
        &self.inner.prover
    }

    /// Prove a request, answering from the cache when the block is final.
    ///
    /// Only immutable block ids strictly below the finalized slot are
    /// cached. Newer blocks can be reorged, as can the child block that
    /// fixes the timestamp of the finalized block itself.
    ///
    /// # Errors
    /// Propagates the prover's error.
    pub async fn prove(&self, request: &ProofRequest) -> Result<ProofArtifact, ProverError> {
        let key = (request.block_id, request.path.clone());
        if let Some(mut entry) = self.inner.cache.get_mut(&key) {
            entry.1 = self.next_tick();
            self.inner.cache_hits.fetch_add(1, Ordering::Relaxed);
            metrics::counter!("proof_cache_hits_total").increment(1);
            return Ok(entry.0.clone());
        }

        let started = Instant::now();
        match self.inner.prover.prove(request).await {
            Ok(artifact) => {
                self.inner.proofs_served.fetch_add(1, Ordering::Relaxed);
                metrics::counter!("proofs_generated_total").increment(1);
                metrics::histogram!("proof_generation_seconds")
                    .record(started.elapsed().as_secs_f64());
                if request.block_id.is_immutable() && self.is_final(artifact.slot).await {
                    self.cache_insert(key, artifact.clone());
                }
                Ok(artifact)
            }
            Err(err) => {
                self.inner.proofs_failed.fetch_add(1, Ordering::Relaxed);
                metrics::counter!("proofs_failed_total").increment(1);
                warn!(error = %err, block_id = %request.block_id, path = %request.path, "Proof request failed");
                self.set_error(Some(err.to_string()));
                Err(err)
            }
        }
    }

    /// Whether `slot` is strictly behind the finalized checkpoint. Asks the
    /// beacon node only when the last known finalized slot is not enough.
    async fn is_final(&self, slot: u64) -> bool {
        if slot < self.inner.finalized_slot.load(Ordering::Relaxed) {
            return true;
        }
        match self.inner.prover.source().block_header(&BlockId::Finalized).await {
            Ok(finalized) => {
                let latest = self
                    .inner
                    .finalized_slot
                    .fetch_max(finalized.header.slot, Ordering::Relaxed)
                    .max(finalized.header.slot);
                debug!(finalized_slot = latest, "Refreshed finalized slot");
                slot < latest
            }
            Err(err) => {
                warn!(error = %err, "Failed to fetch finalized block, not caching");
                false
            }
        }
    }

    fn next_tick(&self) -> u64 {
        self.inner.cache_tick.fetch_add(1, Ordering::Relaxed)
    }

    /// Insert an artifact, evicting the least recently used entry when the
    /// cache is full.
    fn cache_insert(&self, key: (BlockId, PathSpec), artifact: ProofArtifact) {
        if self.inner.cache_capacity == 0 {
            return;
        }
        let cache = &self.inner.cache;
        while cache.len() >= self.inner.cache_capacity {
            let oldest = cache
                .iter()
                .min_by_key(|entry| entry.value().1)
                .map(|entry| entry.key().clone());
            match oldest {
                Some(oldest) => {
                    cache.remove(&oldest);
                    metrics::counter!("proof_cache_evictions_total").increment(1);
                }
                None => break,
            }
        }
        cache.insert(key, (artifact, self.next_tick()));
    }

    /// Get uptime in seconds
    #[must_use]
    pub fn uptime_secs(&self) -> u64 {
        self.inner.start_time.elapsed().as_secs()
    }

    #[must_use]
    pub fn counts(&self) -> RequestCounts {
        RequestCounts {
            served: self.inner.proofs_served.load(Ordering::Relaxed),
            failed: self.inner.proofs_failed.load(Ordering::Relaxed),
            cache_hits: self.inner.cache_hits.load(Ordering::Relaxed),
            cached: self.inner.cache.len(),
        }
    }

    /// Set last error
    pub fn set_error(&self, error: Option<String>) {
        *self.inner.last_error.write() = error;
    }

    /// Get last error
    #[must_use]
    pub fn last_error(&self) -> Option<String> {
        self.inner.last_error.read().clone()
    }
}

/// Proof request counters
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct RequestCounts {
    pub served: u64,
    pub failed: u64,
    pub cache_hits: u64,
    pub cached: usize,
}
