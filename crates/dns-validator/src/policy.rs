//! Validation policy: trust anchors, per-zone security expectations,
//! NSEC3 iteration limits, and the process nameserver / root hint
//! lists.
//!
//! Policy is read-only once the context is created.  Zone lookups are
//! longest-suffix matches over parsed labels; wire names are never
//! compared as substrings, so casing and label boundaries are always
//! respected.

use serde::{Deserialize, Serialize};
use std::net::{IpAddr, SocketAddr};

use dns_types::protocol::types::*;

/// The iteration cap applied to NSEC3 proofs for zones with no
/// `nsec3-max-iter` entry.
pub const DEFAULT_NSEC3_MAX_ITERATIONS: u16 = 150;

/// What policy expects of a zone.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ZoneExpectation {
    /// Answers from this zone must validate.
    Validate,
    /// Skip DNSSEC for this zone; its answers are locally trusted.
    Skip,
    /// Never trust answers from this zone.
    Untrust,
}

/// A configured chain origin: a DNSKEY accepted axiomatically for a
/// zone.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct TrustAnchor {
    pub zone: DomainName,
    /// Always the `DNSKEY` variant.
    pub key: RecordTypeWithData,
}

/// How a DNSKEY RRset relates to the configured trust anchors.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum AnchorMatch {
    /// Some key in the set byte-matches an anchor for its zone.
    Trusted,
    /// No anchor at this zone, but one exists above: keep walking up.
    HopeAbove,
    /// No anchor at or above this zone.
    None,
}

/// One nameserver, with any addresses learned from glue.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Nameserver {
    pub name: DomainName,
    pub addresses: Vec<IpAddr>,
}

/// The nameservers serving some zone.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct NameserverList {
    pub zone: DomainName,
    pub servers: Vec<Nameserver>,
}

impl NameserverList {
    pub fn match_count(&self) -> usize {
        self.zone.label_count()
    }
}

/// The read-only validation policy captured at context creation.
#[derive(Debug, Clone, Default)]
pub struct Policy {
    trust_anchors: Vec<TrustAnchor>,
    expectations: Vec<(DomainName, ZoneExpectation)>,
    nsec3_limits: Vec<(DomainName, u16)>,
    /// Process-wide nameservers, consulted before root hints.
    pub nameservers: Vec<SocketAddr>,
    /// Pre-parsed root NS + address list.
    pub root_hints: Vec<Nameserver>,
}

impl Policy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_trust_anchor(&mut self, anchor: TrustAnchor) {
        self.trust_anchors.push(anchor);
    }

    pub fn add_expectation(&mut self, zone: DomainName, expectation: ZoneExpectation) {
        self.expectations.push((zone, expectation));
    }

    pub fn add_nsec3_limit(&mut self, zone: DomainName, max_iterations: u16) {
        self.nsec3_limits.push((zone, max_iterations));
    }

    pub fn has_trust_anchors(&self) -> bool {
        !self.trust_anchors.is_empty()
    }

    /// The security expectation for a name: the entry for the longest
    /// configured suffix wins, and the default is `Validate`.
    pub fn expectation_for(&self, name: &DomainName) -> ZoneExpectation {
        let mut best: Option<(usize, ZoneExpectation)> = None;
        for (zone, expectation) in &self.expectations {
            if name.is_subdomain_of(zone) {
                let count = zone.label_count();
                if best.map_or(true, |(best_count, _)| count > best_count) {
                    best = Some((count, *expectation));
                }
            }
        }
        best.map_or(ZoneExpectation::Validate, |(_, e)| e)
    }

    /// The NSEC3 iteration cap for a zone: the entry for the longest
    /// configured suffix, else the process default.
    pub fn nsec3_max_iterations(&self, zone: &DomainName) -> u16 {
        let mut best: Option<(usize, u16)> = None;
        for (entry_zone, max) in &self.nsec3_limits {
            if zone.is_subdomain_of(entry_zone) {
                let count = entry_zone.label_count();
                if best.map_or(true, |(best_count, _)| count > best_count) {
                    best = Some((count, *max));
                }
            }
        }
        best.map_or(DEFAULT_NSEC3_MAX_ITERATIONS, |(_, max)| max)
    }

    /// Match a DNSKEY RRset at `zone` against the trust anchors.
    ///
    /// A key matches an anchor iff the zones are equal and the
    /// canonical DNSKEY wire forms are byte-equal.  When nothing
    /// matches at the zone itself, an anchor configured strictly above
    /// the zone means the chain may still reach trust.
    pub fn match_anchor(&self, zone: &DomainName, keys: &[RecordTypeWithData]) -> AnchorMatch {
        for anchor in &self.trust_anchors {
            if anchor.zone == *zone
                && keys
                    .iter()
                    .any(|key| key.rdata_octets() == anchor.key.rdata_octets())
            {
                return AnchorMatch::Trusted;
            }
        }

        let mut candidate = zone.parent();
        while let Some(cur) = candidate {
            if self.trust_anchors.iter().any(|anchor| anchor.zone == cur) {
                return AnchorMatch::HopeAbove;
            }
            candidate = cur.parent();
        }

        AnchorMatch::None
    }
}

/// The serde-facing form of the policy, mirroring the recognised
/// configuration options.  Names are dotted strings and key material
/// is base64, so any serde front-end can load a configuration file;
/// `into_policy` converts and validates.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ValConfig {
    #[serde(default, rename = "trust-anchor")]
    pub trust_anchors: Vec<TrustAnchorConfig>,
    #[serde(default, rename = "zone-security-expectation")]
    pub zone_security_expectations: Vec<ZoneExpectationConfig>,
    #[serde(default, rename = "nsec3-max-iter")]
    pub nsec3_max_iter: Vec<Nsec3LimitConfig>,
    #[serde(default, rename = "nameserver")]
    pub nameservers: Vec<SocketAddr>,
    #[serde(default, rename = "root-hint")]
    pub root_hints: Vec<RootHintConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrustAnchorConfig {
    pub zone: String,
    pub flags: u16,
    pub protocol: u8,
    pub algorithm: u8,
    /// Base64, as in a DNSKEY master-file record.
    pub public_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZoneExpectationConfig {
    pub zone: String,
    pub expectation: ZoneExpectation,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Nsec3LimitConfig {
    pub zone: String,
    pub max_iterations: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RootHintConfig {
    pub name: String,
    pub addresses: Vec<IpAddr>,
}

impl ValConfig {
    /// # Errors
    ///
    /// If a zone name does not parse or key material is not base64.
    pub fn into_policy(self) -> Result<Policy, ConfigError> {
        let mut policy = Policy::new();

        for anchor in self.trust_anchors {
            let zone = parse_zone(&anchor.zone)?;
            let public_key = data_encoding::BASE64
                .decode(anchor.public_key.as_bytes())
                .map_err(|_| ConfigError::BadKeyMaterial { zone: zone.clone() })?;
            policy.add_trust_anchor(TrustAnchor {
                zone,
                key: RecordTypeWithData::DNSKEY {
                    flags: anchor.flags,
                    protocol: anchor.protocol,
                    algorithm: SecurityAlgorithm::from(anchor.algorithm),
                    public_key,
                },
            });
        }

        for entry in self.zone_security_expectations {
            policy.add_expectation(parse_zone(&entry.zone)?, entry.expectation);
        }

        for entry in self.nsec3_max_iter {
            policy.add_nsec3_limit(parse_zone(&entry.zone)?, entry.max_iterations);
        }

        policy.nameservers = self.nameservers;

        for hint in self.root_hints {
            policy.root_hints.push(Nameserver {
                name: parse_zone(&hint.name)?,
                addresses: hint.addresses,
            });
        }

        Ok(policy)
    }
}

fn parse_zone(s: &str) -> Result<DomainName, ConfigError> {
    DomainName::from_dotted_string(s).ok_or_else(|| ConfigError::BadZoneName {
        name: s.to_string(),
    })
}

/// An error converting a `ValConfig` into a `Policy`.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum ConfigError {
    BadZoneName { name: String },
    BadKeyMaterial { zone: DomainName },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            ConfigError::BadZoneName { name } => write!(f, "cannot parse zone name '{name}'"),
            ConfigError::BadKeyMaterial { zone } => {
                write!(f, "trust anchor for '{zone}' has invalid key material")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        None
    }
}
