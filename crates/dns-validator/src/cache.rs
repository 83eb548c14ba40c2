//! The record cache feeding both resolution and proof checks.
//!
//! The cache is partitioned: ordinary answers, DNSKEY sets, DS sets,
//! negative answers (keyed by the question they answered), and zone
//! information (NS names with glue addresses), plus the pre-parsed
//! root hints.  Entries are overwritten on stow and live for the
//! lifetime of the cache.

use priority_queue::PriorityQueue;
use std::cmp::Reverse;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use dns_types::protocol::types::*;

use crate::policy::{Nameserver, NameserverList, Policy};
use crate::rrset::RRset;

const MUTEX_POISON_MESSAGE: &str =
    "[INTERNAL ERROR] cache mutex poisoned, cannot recover from this - aborting";

/// A convenience wrapper around a `RecordCache` which lets it be
/// shared between threads.
///
/// Invoking `clone` on a `SharedCache` gives a new instance which
/// refers to the same underlying `RecordCache` object.
#[derive(Debug, Clone)]
pub struct SharedCache {
    cache: Arc<Mutex<RecordCache>>,
}

impl SharedCache {
    pub fn new() -> Self {
        SharedCache {
            cache: Arc::new(Mutex::new(RecordCache::new())),
        }
    }

    pub fn get_cached_rrset(
        &self,
        name: &DomainName,
        rclass: RecordClass,
        rtype: RecordType,
    ) -> Option<RRset> {
        self.cache
            .lock()
            .expect(MUTEX_POISON_MESSAGE)
            .get_cached_rrset(name, rclass, rtype)
    }

    pub fn get_cached_proof(
        &self,
        name: &DomainName,
        rclass: RecordClass,
        rtype: RecordType,
    ) -> Option<(Rcode, Vec<RRset>)> {
        self.cache
            .lock()
            .expect(MUTEX_POISON_MESSAGE)
            .get_cached_proof(name, rclass, rtype)
    }

    pub fn stow_answers(&self, sets: &[RRset]) {
        self.cache
            .lock()
            .expect(MUTEX_POISON_MESSAGE)
            .stow_answers(sets);
    }

    pub fn stow_key_info(&self, sets: &[RRset]) {
        self.cache
            .lock()
            .expect(MUTEX_POISON_MESSAGE)
            .stow_key_info(sets);
    }

    pub fn stow_ds_info(&self, sets: &[RRset]) {
        self.cache
            .lock()
            .expect(MUTEX_POISON_MESSAGE)
            .stow_ds_info(sets);
    }

    pub fn stow_negative_answers(
        &self,
        name: &DomainName,
        rclass: RecordClass,
        rtype: RecordType,
        rcode: Rcode,
        proofs: &[RRset],
    ) {
        self.cache
            .lock()
            .expect(MUTEX_POISON_MESSAGE)
            .stow_negative_answers(name, rclass, rtype, rcode, proofs);
    }

    pub fn stow_zone_info(&self, zone_cut: &DomainName, sets: &[RRset], glue: &[RRset]) {
        self.cache
            .lock()
            .expect(MUTEX_POISON_MESSAGE)
            .stow_zone_info(zone_cut, sets, glue);
    }

    pub fn stow_root_hints(&self, hints: Vec<Nameserver>) {
        self.cache
            .lock()
            .expect(MUTEX_POISON_MESSAGE)
            .stow_root_hints(hints);
    }

    pub fn get_nameservers_for_zone(
        &self,
        name: &DomainName,
        policy: &Policy,
    ) -> Option<(NameserverList, DomainName)> {
        self.cache
            .lock()
            .expect(MUTEX_POISON_MESSAGE)
            .get_nameservers_for_zone(name, policy)
    }

    /// Drop expired entries from every partition.  Returns the number
    /// of RRsets removed.
    pub fn prune(&self) -> usize {
        self.cache.lock().expect(MUTEX_POISON_MESSAGE).prune()
    }
}

impl Default for SharedCache {
    fn default() -> Self {
        Self::new()
    }
}

/// One partition: RRsets keyed by owner and type, with expiry
/// ordering.
#[derive(Debug, Default)]
struct Partition {
    entries: HashMap<(DomainName, RecordType), (RRset, Instant)>,

    /// Entries ordered by expiry, soonest first.
    ///
    /// INVARIANT: the keys in here are exactly the keys in `entries`.
    expiry_priority: PriorityQueue<(DomainName, RecordType), Reverse<Instant>>,
}

impl Partition {
    fn get(&self, name: &DomainName, rtype: RecordType) -> Option<&RRset> {
        let (set, expires) = self.entries.get(&(name.clone(), rtype))?;
        if *expires <= Instant::now() {
            return None;
        }
        Some(set)
    }

    /// Insert an RRset, overwriting any previous entry for its owner
    /// and type.  Sets with a zero TTL are not stowed.
    fn insert(&mut self, set: &RRset) {
        if set.ttl == 0 {
            return;
        }
        let expires = Instant::now() + Duration::from_secs(set.ttl.into());
        let key = (set.name.clone(), set.rtype);
        self.entries.insert(key.clone(), (set.clone(), expires));
        self.expiry_priority.push(key, Reverse(expires));
    }

    fn prune(&mut self) -> usize {
        let now = Instant::now();
        let mut pruned = 0;

        while let Some((key, Reverse(expires))) = self.expiry_priority.pop() {
            if expires > now {
                self.expiry_priority.push(key, Reverse(expires));
                break;
            }
            // the entry may have been overwritten with a later expiry
            if let Some((_, entry_expires)) = self.entries.get(&key) {
                if *entry_expires <= now {
                    self.entries.remove(&key);
                    pruned += 1;
                } else {
                    let later = *entry_expires;
                    self.expiry_priority.push(key, Reverse(later));
                }
            }
        }

        pruned
    }
}

/// The full cache.  You probably want `SharedCache` instead.
#[derive(Debug, Default)]
pub struct RecordCache {
    answers: Partition,
    keys: Partition,
    ds: Partition,
    /// Negative answers keyed by the question they answered: the
    /// response code and the NACK RRsets.  These are kept for the
    /// lifetime of the cache (one session), not TTL-aged.
    proofs: HashMap<(DomainName, RecordType), (Rcode, Vec<RRset>)>,
    /// In-bailiwick NS records keyed by the owner of the delegation,
    /// with glue addresses attached to each nameserver entry.
    zones: HashMap<DomainName, Vec<Nameserver>>,
    root_hints: Option<Vec<Nameserver>>,
}

impl RecordCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_cached_rrset(
        &self,
        name: &DomainName,
        rclass: RecordClass,
        rtype: RecordType,
    ) -> Option<RRset> {
        if rclass != RecordClass::IN {
            return None;
        }
        let partition = match rtype {
            RecordType::DNSKEY => &self.keys,
            RecordType::DS => &self.ds,
            _ => &self.answers,
        };
        partition.get(name, rtype).cloned()
    }

    pub fn get_cached_proof(
        &self,
        name: &DomainName,
        rclass: RecordClass,
        rtype: RecordType,
    ) -> Option<(Rcode, Vec<RRset>)> {
        if rclass != RecordClass::IN {
            return None;
        }
        self.proofs.get(&(name.clone(), rtype)).cloned()
    }

    pub fn stow_answers(&mut self, sets: &[RRset]) {
        for set in sets {
            self.answers.insert(set);
        }
    }

    pub fn stow_key_info(&mut self, sets: &[RRset]) {
        for set in sets {
            if set.rtype == RecordType::DNSKEY {
                self.keys.insert(set);
            }
        }
    }

    pub fn stow_ds_info(&mut self, sets: &[RRset]) {
        for set in sets {
            if set.rtype == RecordType::DS {
                self.ds.insert(set);
            }
        }
    }

    pub fn stow_negative_answers(
        &mut self,
        name: &DomainName,
        rclass: RecordClass,
        rtype: RecordType,
        rcode: Rcode,
        proofs: &[RRset],
    ) {
        if rclass != RecordClass::IN || proofs.is_empty() {
            return;
        }
        self.proofs
            .insert((name.clone(), rtype), (rcode, proofs.to_vec()));
    }

    /// Stow delegation information: NS sets keyed by their owner, glue
    /// A/AAAA sets attached as addresses.
    ///
    /// Anti-pollution: sets whose owner is not subordinate to the
    /// response's zone cut are discarded before stowing.
    pub fn stow_zone_info(&mut self, zone_cut: &DomainName, sets: &[RRset], glue: &[RRset]) {
        for set in sets {
            if set.rtype != RecordType::NS {
                continue;
            }
            if !set.name.is_subdomain_of(zone_cut) {
                tracing::debug!(owner = %set.name, %zone_cut, "discarding out-of-bailiwick NS set");
                continue;
            }

            let mut servers = Vec::with_capacity(set.records.len());
            for record in &set.records {
                let RecordTypeWithData::NS { nsdname } = record else {
                    continue;
                };

                let mut addresses = Vec::new();
                for glue_set in glue {
                    if glue_set.name != *nsdname {
                        continue;
                    }
                    if !glue_set.name.is_subdomain_of(zone_cut) {
                        tracing::debug!(
                            owner = %glue_set.name,
                            %zone_cut,
                            "discarding out-of-bailiwick glue"
                        );
                        continue;
                    }
                    for glue_record in &glue_set.records {
                        match glue_record {
                            RecordTypeWithData::A { address } => {
                                addresses.push(std::net::IpAddr::V4(*address));
                            }
                            RecordTypeWithData::AAAA { address } => {
                                addresses.push(std::net::IpAddr::V6(*address));
                            }
                            _ => (),
                        }
                    }
                }

                servers.push(Nameserver {
                    name: nsdname.clone(),
                    addresses,
                });
            }

            if !servers.is_empty() {
                self.zones.insert(set.name.clone(), servers);
            }
        }
    }

    pub fn stow_root_hints(&mut self, hints: Vec<Nameserver>) {
        self.root_hints = Some(hints);
    }

    /// The NS list for the closest enclosing zone of `name` the cache
    /// knows, plus the zone cut it belongs to.  Falls back to the
    /// process-configured nameservers, else the root hints (from the
    /// cache, else from policy).
    pub fn get_nameservers_for_zone(
        &self,
        name: &DomainName,
        policy: &Policy,
    ) -> Option<(NameserverList, DomainName)> {
        let mut candidate = Some(name.clone());
        while let Some(zone) = candidate {
            if let Some(servers) = self.zones.get(&zone) {
                return Some((
                    NameserverList {
                        zone: zone.clone(),
                        servers: servers.clone(),
                    },
                    zone,
                ));
            }
            candidate = zone.parent();
        }

        if !policy.nameservers.is_empty() {
            let root = DomainName::root_domain();
            return Some((
                NameserverList {
                    zone: root.clone(),
                    servers: policy
                        .nameservers
                        .iter()
                        .map(|addr| Nameserver {
                            name: root.clone(),
                            addresses: vec![addr.ip()],
                        })
                        .collect(),
                },
                root,
            ));
        }

        let hints = self
            .root_hints
            .clone()
            .or_else(|| {
                if policy.root_hints.is_empty() {
                    None
                } else {
                    Some(policy.root_hints.clone())
                }
            })?;

        let root = DomainName::root_domain();
        Some((
            NameserverList {
                zone: root.clone(),
                servers: hints,
            },
            root,
        ))
    }

    pub fn prune(&mut self) -> usize {
        self.answers.prune() + self.keys.prune() + self.ds.prune()
    }
}
