//! Metrics from a resolution-and-validation attempt.  The driver
//! builds this structure up per call rather than updating any global
//! collector directly.

#[derive(Debug, Default, Clone)]
pub struct Metrics {
    /// Queries answered out of the record cache.
    pub cache_hits: u64,
    /// Dispatches to a nameserver: questions the cache could not
    /// answer, counted once per round trip.
    pub cache_misses: u64,
    /// Questions answered by some upstream nameserver.
    pub nameserver_hits: u64,
    /// Questions every candidate nameserver failed to answer.
    pub nameserver_misses: u64,
    /// Signature verifications attempted.
    pub verifications: u64,
    /// Signature verifications which did not end in success.
    pub verification_failures: u64,
    /// Nonexistence proofs evaluated.
    pub proofs_checked: u64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cache_hit(&mut self) {
        self.cache_hits += 1;
    }

    pub fn cache_miss(&mut self) {
        self.cache_misses += 1;
    }

    pub fn nameserver_hit(&mut self) {
        self.nameserver_hits += 1;
    }

    pub fn nameserver_miss(&mut self) {
        self.nameserver_misses += 1;
    }

    pub fn verification(&mut self, success: bool) {
        self.verifications += 1;
        if !success {
            self.verification_failures += 1;
        }
    }

    pub fn proof_checked(&mut self) {
        self.proofs_checked += 1;
    }

    /// Fold a subordinate resolution's metrics into this one.
    pub fn absorb(&mut self, other: &Metrics) {
        self.cache_hits += other.cache_hits;
        self.cache_misses += other.cache_misses;
        self.nameserver_hits += other.nameserver_hits;
        self.nameserver_misses += other.nameserver_misses;
        self.verifications += other.verifications;
        self.verification_failures += other.verification_failures;
        self.proofs_checked += other.proofs_checked;
    }
}
