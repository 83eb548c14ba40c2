//! The proof-of-nonexistence engine.
//!
//! Given the NACK RRsets of a negative answer (already carried
//! through validation), decide whether they authentically prove that
//! the queried name does not exist, that the name exists but the type
//! does not, or that the proof is broken.  Covers both NSEC spans
//! with wildcard closure and NSEC3 closest-provable-encloser walks
//! with opt-out.

use std::cmp::Ordering;

use dns_types::protocol::types::*;

use crate::crypto::{base32hex_encode, nsec3_hash, nsec3_owner_hash, CryptoProvider};
use crate::policy::Policy;
use crate::rrset::{RRset, RrsetKind};
use crate::status::ValStatus;

/// The NSEC3 hash algorithm number for SHA-1, the only one defined
/// (RFC 5155 section 11).
const NSEC3_HASH_SHA1: u8 = 1;

/// Whether `x` lies strictly between `owner` and `next` in the
/// modular ordering of the NSEC3 hash space.  When `next` is not
/// greater than `owner` the span wraps around the end of the zone.
pub fn in_range(owner: &[u8], next: &[u8], x: &[u8]) -> bool {
    if x == next {
        return false;
    }
    if next > owner {
        x > owner && x < next
    } else {
        x < next || x > owner
    }
}

/// The longest label suffix shared by `qname` and `owner`: the
/// "closest encounter" an NSEC span pins down.
fn closest_encounter(qname: &DomainName, owner: &DomainName) -> Option<DomainName> {
    let shared = qname
        .labels
        .iter()
        .rev()
        .zip(owner.labels.iter().rev())
        .take_while(|(q, o)| q == o)
        .count();
    if shared == 0 {
        return None;
    }
    DomainName::from_labels(qname.labels[qname.labels.len() - shared..].to_vec())
}

/// Working state shared by the per-NSEC checks.
#[derive(Debug, Default)]
struct NsecState<'a> {
    /// Some NSEC span covers the query name (or proves the type
    /// absent at it).
    span_checked: bool,
    /// Wildcard absence already follows from a verified signature
    /// with no labels stripped.
    wildcard_checked: bool,
    /// The NSEC which must prove the wildcard absent.
    wildcard_proof: Option<&'a RRset>,
    closest_encounter: Option<DomainName>,
    status: Option<ValStatus>,
}

/// Check one NSEC set against the query (RFC 4035 section 5.4).
fn nsec_proof_chk<'a>(
    set: &'a RRset,
    qname: &DomainName,
    qtype: RecordType,
    soa_name: &DomainName,
    state: &mut NsecState<'a>,
) {
    let Some((next_name, types)) = set.nsec_fields() else {
        state.status = Some(ValStatus::BogusProof);
        return;
    };

    match set.name.cmp_canonical(qname) {
        Ordering::Equal => {
            // the name exists; the type must not
            if types.contains(qtype) {
                tracing::debug!(owner = %set.name, %qtype, "type exists at NSEC owner");
                state.status = Some(ValStatus::BogusProof);
                return;
            }

            state.span_checked = true;
            state.status = Some(ValStatus::NonexistentType);

            // a verified signature with no labels stripped also rules
            // out wildcard expansion
            if set.proven_not_wildcard() {
                state.wildcard_checked = true;
            }
            return;
        }
        Ordering::Greater => {
            tracing::debug!(owner = %set.name, %qname, "NSEC owner after query name");
            state.status = Some(ValStatus::BogusProof);
            return;
        }
        Ordering::Less => (),
    }

    if qname.cmp_canonical(next_name) == Ordering::Greater {
        // qname is past the span end; unless the span wraps around to
        // the zone apex this NSEC only matters as a wildcard proof
        if next_name.cmp_canonical(soa_name) != Ordering::Equal {
            state.wildcard_proof = Some(set);
            return;
        }
    }

    state.span_checked = true;
    // the same NSEC may prove wildcard absence too
    if state.wildcard_proof.is_none() {
        state.wildcard_proof = Some(set);
    }

    if state.closest_encounter.is_none() {
        state.closest_encounter = closest_encounter(qname, &set.name);
    }
}

/// The wildcard-closure obligation: either `*.<closest encounter>`
/// provably lacks the type, or it falls inside the wildcard proof's
/// span.
fn prove_nsec_wildcard(
    qtype: RecordType,
    wildcard_proof: Option<&RRset>,
    closest_encounter: &DomainName,
) -> ValStatus {
    let Some(wildcard_name) = closest_encounter.wildcard() else {
        tracing::debug!(%closest_encounter, "wildcard name exceeds length bounds");
        return ValStatus::BogusProof;
    };

    let Some(proof) = wildcard_proof else {
        tracing::debug!("no NSEC proves the wildcard absent");
        return ValStatus::BogusProof;
    };
    let Some((next_name, types)) = proof.nsec_fields() else {
        return ValStatus::BogusProof;
    };

    if wildcard_name.cmp_canonical(&proof.name) == Ordering::Equal {
        // the wildcard exists: the type must be absent from it
        if types.contains(qtype) {
            tracing::debug!(%wildcard_name, %qtype, "type exists at wildcard");
            return ValStatus::BogusProof;
        }
        ValStatus::DontKnow
    } else if wildcard_name.cmp_canonical(&proof.name) == Ordering::Less
        || next_name.cmp_canonical(&wildcard_name) == Ordering::Less
    {
        tracing::debug!(%wildcard_name, "incorrect span for wildcard proof");
        ValStatus::BogusProof
    } else {
        ValStatus::DontKnow
    }
}

/// Walk the NSEC3 proofs: find the closest provable encloser and the
/// next closer name, check opt-out, then discharge the wildcard
/// closure (RFC 5155 section 8).
fn nsec3_proof_chk(
    policy: &Policy,
    crypto: &dyn CryptoProvider,
    qname: &DomainName,
    qtype: RecordType,
    soa_name: &DomainName,
    proofs: &[&RRset],
) -> ValStatus {
    let max_iterations = policy.nsec3_max_iterations(soa_name);

    let hash_of = |name: &DomainName, set: &RRset| -> Result<Vec<u8>, ValStatus> {
        let fields = set.nsec3_fields().ok_or(ValStatus::BogusProof)?;
        if fields.hash_algorithm != NSEC3_HASH_SHA1 {
            tracing::debug!(algorithm = fields.hash_algorithm, "unknown NSEC3 hash algorithm");
            return Err(ValStatus::BogusProof);
        }
        if fields.iterations > max_iterations {
            tracing::debug!(
                iterations = fields.iterations,
                max_iterations,
                "NSEC3 iteration count over policy limit"
            );
            return Err(ValStatus::BogusProof);
        }
        nsec3_hash(crypto, name, fields.salt, fields.iterations)
            .map_err(|_| ValStatus::BogusProof)
    };

    let mut cpe: Option<DomainName> = None;
    let mut ncn: Option<DomainName> = None;
    let mut opt_out = false;
    let mut nodata_at_qname = false;

    let mut candidate = Some(qname.clone());
    while let Some(cp) = candidate {
        if !cp.is_subdomain_of(soa_name) {
            break;
        }
        if cpe.is_some() {
            break;
        }
        if let (Some(n), Some(c)) = (&ncn, &cpe) {
            if n == c || n.parent().as_ref() == Some(c) {
                break;
            }
        }

        for set in proofs {
            if set.kind != RrsetKind::NackNsec3 {
                continue;
            }
            let Some(owner_hash) = nsec3_owner_hash(&set.name) else {
                return ValStatus::BogusProof;
            };
            let Some(fields) = set.nsec3_fields() else {
                return ValStatus::BogusProof;
            };
            let hash = match hash_of(&cp, set) {
                Ok(hash) => hash,
                Err(status) => return status,
            };

            if hash == owner_hash {
                // this candidate provably exists
                cpe = Some(cp.clone());

                if cp == *qname {
                    // the query name itself exists: the type must not
                    if fields.types.contains(qtype) {
                        tracing::debug!(%qname, %qtype, "NSEC3 hash matches but type is present");
                        return ValStatus::BogusProof;
                    }
                    ncn = Some(cp.clone());
                    nodata_at_qname = true;

                    if set.proven_not_wildcard() {
                        return ValStatus::NonexistentType;
                    }
                }
            }

            if in_range(&owner_hash, fields.next_hashed_owner, &hash) {
                ncn = Some(cp.clone());
                opt_out = fields.opt_out;
            }
        }

        candidate = cp.parent();
    }

    let (Some(ncn), Some(cpe)) = (ncn, cpe) else {
        tracing::debug!("NSEC3 proof landmarks incomplete");
        return ValStatus::IncompleteProof;
    };

    // the next closer name must be exactly one label below the
    // closest provable encloser
    if ncn != cpe && ncn.parent().as_ref() != Some(&cpe) {
        tracing::debug!(%ncn, %cpe, "NCN is not one label below CPE");
        return ValStatus::BogusProof;
    }

    let Some(wildcard_name) = cpe.wildcard() else {
        tracing::debug!(%cpe, "wildcard name exceeds length bounds");
        return ValStatus::BogusProof;
    };

    for set in proofs {
        if set.kind != RrsetKind::NackNsec3 {
            continue;
        }
        let Some(owner_hash) = nsec3_owner_hash(&set.name) else {
            return ValStatus::BogusProof;
        };
        let Some(fields) = set.nsec3_fields() else {
            return ValStatus::BogusProof;
        };
        let hash = match hash_of(&wildcard_name, set) {
            Ok(hash) => hash,
            Err(status) => return status,
        };

        if hash == owner_hash {
            // the wildcard exists: the type must be absent at it
            if fields.types.contains(qtype) {
                tracing::debug!(%wildcard_name, %qtype, "wildcard exists with the queried type");
                return ValStatus::BogusProof;
            }
            return ValStatus::NonexistentType;
        }

        if in_range(&owner_hash, fields.next_hashed_owner, &hash) {
            if nodata_at_qname {
                return ValStatus::NonexistentType;
            }
            if opt_out {
                return ValStatus::NonexistentNameOptout;
            }
            return ValStatus::NonexistentName;
        }
    }

    tracing::debug!(%wildcard_name, "no NSEC3 covers the wildcard");
    ValStatus::BogusProof
}

/// Classify a whole negative answer.
///
/// `proofs` are the NACK RRsets carried by the answer;
/// `soa_provably_insecure` is set when the SOA's own chain ended
/// provably insecure, in which case the response code alone decides
/// between name and type nonexistence.
pub fn prove_nonexistence(
    policy: &Policy,
    crypto: &dyn CryptoProvider,
    qname: &DomainName,
    qtype: RecordType,
    rcode: Rcode,
    proofs: &[&RRset],
    soa_provably_insecure: bool,
) -> ValStatus {
    tracing::debug!(%qname, %qtype, "proving nonexistence");

    let soa_name = proofs
        .iter()
        .find(|set| set.kind == RrsetKind::NackSoa)
        .map(|set| set.name.clone());

    let Some(soa_name) = soa_name else {
        return ValStatus::IncompleteProof;
    };

    if soa_provably_insecure {
        // nothing below this zone is signed; the response code is all
        // the information there is
        return match rcode {
            Rcode::NoError => ValStatus::NonexistentType,
            Rcode::NameError => ValStatus::NonexistentName,
            _ => ValStatus::Error,
        };
    }

    let mut saw_nsec = false;
    let mut saw_nsec3 = false;
    let mut state = NsecState::default();

    for set in proofs {
        if set.kind.is_nack() && set.records.is_empty() {
            return ValStatus::BogusProof;
        }

        match set.kind {
            RrsetKind::NackNsec => {
                saw_nsec = true;
                nsec_proof_chk(set, qname, qtype, &soa_name, &mut state);
                if let Some(status) = state.status {
                    if status != ValStatus::NonexistentType {
                        return status;
                    }
                }
            }
            RrsetKind::NackNsec3 => saw_nsec3 = true,
            _ => (),
        }
    }

    if saw_nsec == saw_nsec3 {
        // mixed NSEC and NSEC3, or no denial records at all
        tracing::debug!(saw_nsec, saw_nsec3, "proof is mixed or missing");
        return ValStatus::BogusProof;
    }

    if saw_nsec {
        if !state.span_checked {
            return ValStatus::IncompleteProof;
        }
        if !state.wildcard_checked {
            let Some(ce) = &state.closest_encounter else {
                return ValStatus::IncompleteProof;
            };
            match prove_nsec_wildcard(qtype, state.wildcard_proof, ce) {
                ValStatus::DontKnow => (),
                status => return status,
            }
        }
        return state.status.unwrap_or(ValStatus::NonexistentName);
    }

    nsec3_proof_chk(policy, crypto, qname, qtype, &soa_name, proofs)
}
