//! The validation context: the shared stores (policy, cache, crypto,
//! transport) plus the per-call query and assertion arenas.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::assertion::AssertionChain;
use crate::cache::SharedCache;
use crate::crypto::CryptoProvider;
use crate::metrics::Metrics;
use crate::policy::Policy;
use crate::query::QueryChain;
use crate::resolver::ResolverTransport;

pub struct Context {
    // shared, process-wide stores
    pub(crate) policy: Arc<Policy>,
    pub(crate) cache: SharedCache,
    pub(crate) crypto: Arc<dyn CryptoProvider>,
    pub(crate) transport: Arc<dyn ResolverTransport>,
    // per-call state
    pub(crate) queries: QueryChain,
    pub(crate) assertions: AssertionChain,
    pub(crate) metrics: Metrics,
    /// How deep in provably-insecure recursion this context is.
    pub(crate) depth: usize,
}

impl Context {
    pub fn new(
        policy: Policy,
        cache: SharedCache,
        crypto: Arc<dyn CryptoProvider>,
        transport: Arc<dyn ResolverTransport>,
    ) -> Self {
        if !policy.root_hints.is_empty() {
            cache.stow_root_hints(policy.root_hints.clone());
        }

        Self {
            policy: Arc::new(policy),
            cache,
            crypto,
            transport,
            queries: QueryChain::new(),
            assertions: AssertionChain::new(),
            metrics: Metrics::new(),
            depth: 0,
        }
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// A fresh context sharing this one's stores, for a subordinate
    /// resolution (the provably-insecure prover).  The caller is
    /// responsible for absorbing its metrics.
    pub(crate) fn subcontext(&self) -> Self {
        Self {
            policy: Arc::clone(&self.policy),
            cache: self.cache.clone(),
            crypto: Arc::clone(&self.crypto),
            transport: Arc::clone(&self.transport),
            queries: QueryChain::new(),
            assertions: AssertionChain::new(),
            metrics: Metrics::new(),
            depth: self.depth + 1,
        }
    }

    /// Reset the per-call state, keeping the shared stores.  Called at
    /// the start of each `resolve_and_check`.
    pub(crate) fn reset(&mut self) {
        self.queries = QueryChain::new();
        self.assertions = AssertionChain::new();
        self.metrics = Metrics::new();
    }

    /// The current time as seconds since the epoch, for signature
    /// validity checks.
    pub(crate) fn now() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| d.as_secs())
    }
}
