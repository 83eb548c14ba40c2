//! The signature verifier: canonicalise a signed RRset, pick the
//! DNSKEY the RRSIG names, check times and flags, and hand the bytes
//! to the crypto provider.

use dns_types::protocol::types::*;

use crate::crypto::{dnskey_key_tag, ds_digest_input, CryptoError, CryptoProvider};
use crate::rrset::{RRset, Rrsig};
use crate::status::AssertionStatus;

/// Accept signatures this many seconds outside their validity window,
/// with a warning.
pub const SIG_ACCEPT_WINDOW_SECS: u64 = 300;

/// The wildcard depth of a signature over a set: how many labels of
/// the owner name were synthesised.  `None` when the RRSIG's label
/// count exceeds the owner's, which is never valid.
pub fn check_label_count(set: &RRset, sig: &Rrsig) -> Option<usize> {
    let owner_labels = set.name.label_count();
    let sig_labels = usize::from(sig.labels);
    if sig_labels > owner_labels {
        None
    } else {
        Some(owner_labels - sig_labels)
    }
}

/// Build the buffer the signature is computed over (RFC 4034 section
/// 3.1.8.1): the RRSIG RDATA through the signer name, then each record
/// of the set in canonical form and canonical order.
///
/// The owner name is already lowercase; when the signature was made
/// over a wildcard, the owner is reduced back to `*.<suffix>` with the
/// synthesised labels removed.  Every record uses the original TTL
/// from the RRSIG, and RDATA sorts as octet strings (ascending, with a
/// shorter RDATA before a longer one sharing its prefix).
pub fn make_sigfield(set: &RRset, sig: &Rrsig, wildcard: usize) -> Option<Vec<u8>> {
    let owner_wire = if wildcard == 0 {
        set.name.octets.clone()
    } else {
        let mut reduced = set.name.clone();
        for _ in 0..wildcard {
            reduced = reduced.parent()?;
        }
        reduced.wildcard()?.octets
    };

    let mut rdatas: Vec<Vec<u8>> = set
        .records
        .iter()
        .map(RecordTypeWithData::rdata_octets)
        .collect();
    rdatas.sort();

    let mut field = sig.rdata_prefix();
    for rdata in rdatas {
        field.extend_from_slice(&owner_wire);
        field.extend_from_slice(&u16::from(set.rtype).to_be_bytes());
        field.extend_from_slice(&u16::from(set.rclass).to_be_bytes());
        field.extend_from_slice(&sig.original_ttl.to_be_bytes());
        field.extend_from_slice(&(rdata.len() as u16).to_be_bytes());
        field.extend_from_slice(&rdata);
    }

    Some(field)
}

/// Check one signature made by one key over the set.  Returns the
/// per-signature status: `Verified` / `WildcardVerified` on success,
/// or the specific failure.
fn verify_one(
    crypto: &dyn CryptoProvider,
    set: &RRset,
    sig: &Rrsig,
    key: &RecordTypeWithData,
    wildcard: usize,
    now: u64,
) -> AssertionStatus {
    let RecordTypeWithData::DNSKEY {
        flags,
        protocol,
        algorithm,
        public_key,
    } = key
    else {
        return AssertionStatus::InvalidKey;
    };

    // wildcard expansions of DNSKEY and DS sets are never valid
    if wildcard > 0 && (set.rtype == RecordType::DS || set.rtype == RecordType::DNSKEY) {
        return AssertionStatus::InvalidKey;
    }

    if flags & DNSKEY_FLAG_ZONE_KEY == 0 {
        tracing::debug!(owner = %set.name, "DNSKEY is not a zone signing key");
        return AssertionStatus::InvalidKey;
    }

    if *protocol != 3 {
        tracing::debug!(owner = %set.name, protocol, "invalid DNSKEY protocol");
        return AssertionStatus::UnknownDnskeyProtocol;
    }

    if *algorithm != sig.algorithm {
        tracing::debug!(
            key_algorithm = %algorithm,
            sig_algorithm = %sig.algorithm,
            "algorithm mismatch between DNSKEY and RRSIG"
        );
        return AssertionStatus::RrsigAlgorithmMismatch;
    }

    let inception = u64::from(sig.inception);
    let expiration = u64::from(sig.expiration);
    if now < inception {
        if now + SIG_ACCEPT_WINDOW_SECS < inception {
            tracing::debug!(now, inception, "signature not yet valid");
            return AssertionStatus::RrsigNotYetActive;
        }
        tracing::warn!(now, inception, "signature not yet valid, but within acceptable skew");
    }
    if now > expiration {
        if now > expiration + SIG_ACCEPT_WINDOW_SECS {
            tracing::debug!(now, expiration, "signature expired");
            return AssertionStatus::RrsigExpired;
        }
        tracing::warn!(now, expiration, "signature expired, but within acceptable skew");
    }

    let Some(field) = make_sigfield(set, sig, wildcard) else {
        return AssertionStatus::InvalidRrsig;
    };

    match crypto.verify(sig.algorithm, public_key, &field, &sig.signature) {
        Ok(()) => {
            if wildcard > 0 {
                AssertionStatus::WildcardVerified
            } else {
                AssertionStatus::Verified
            }
        }
        Err(CryptoError::AlgorithmNotSupported) => AssertionStatus::AlgorithmNotSupported,
        Err(CryptoError::UnknownAlgorithm) => AssertionStatus::UnknownAlgorithm,
        Err(CryptoError::InvalidKey) => AssertionStatus::InvalidKey,
        Err(CryptoError::BadSignature) => AssertionStatus::NotVerified,
    }
}

/// Fold a per-signature status into the set's accumulated status: any
/// success is kept, and otherwise the first concrete failure sticks.
fn accumulate(saved: &mut Option<AssertionStatus>, new: AssertionStatus) {
    match saved {
        Some(status) if status.is_verified() => (),
        _ if new.is_verified() => *saved = Some(new),
        Some(_) => (),
        None => *saved = Some(new),
    }
}

/// Verify a whole assertion's RRset against its trust parent.
///
/// For a DNSKEY set the keys come from the set itself and success
/// additionally requires a parent DS record matching the signing key
/// (`VerifiedLink`).  For every other set the keys come from the trust
/// parent's DNSKEY set.
///
/// On success the set's `verified_wildcard` is recorded for the proof
/// engine's wildcard-closure checks.
pub fn verify_assertion(
    crypto: &dyn CryptoProvider,
    set: &mut RRset,
    trust_set: Option<&RRset>,
    now: u64,
) -> AssertionStatus {
    if set.sigs.is_empty() {
        return AssertionStatus::RrsigMissing;
    }

    let is_key_set = set.rtype == RecordType::DNSKEY;
    let mut saved: Option<AssertionStatus> = None;

    let sigs = set.sigs.clone();
    for sig in &sigs {
        let Some(wildcard) = check_label_count(set, sig) else {
            accumulate(&mut saved, AssertionStatus::WrongLabelCount);
            continue;
        };

        let keys: Vec<RecordTypeWithData> = if is_key_set {
            set.records.clone()
        } else if let Some(trust) = trust_set {
            trust.records.clone()
        } else {
            accumulate(&mut saved, AssertionStatus::DnskeyNoMatch);
            continue;
        };

        let mut sig_status = AssertionStatus::DnskeyNoMatch;
        let mut signing_key = None;
        for key in &keys {
            let Some(tag) = dnskey_key_tag(key) else {
                accumulate(&mut saved, AssertionStatus::InvalidKey);
                continue;
            };
            if tag != sig.key_tag {
                continue;
            }

            sig_status = verify_one(crypto, set, sig, key, wildcard, now);
            if sig_status.is_verified() {
                signing_key = Some(key.clone());
                break;
            }
            // there may be several keys with this tag; remember the
            // failure but keep trying the rest
        }

        if sig_status.is_verified() {
            set.verified_wildcard = Some(wildcard);
        }

        // a verified (or unknown-algorithm) DNSKEY set must also be
        // linked to the parent zone through a DS digest match; the
        // link is created even for an unknown algorithm since that may
        // be the provably insecure case
        if is_key_set
            && (sig_status.is_verified() || sig_status == AssertionStatus::UnknownAlgorithm)
        {
            let Some(key) = signing_key.or_else(|| keys.first().cloned()) else {
                accumulate(&mut saved, sig_status);
                continue;
            };
            match check_ds_link(crypto, set, trust_set, &key) {
                DsLink::Matched => {
                    if sig_status.is_verified() {
                        return AssertionStatus::VerifiedLink;
                    }
                    return AssertionStatus::UnknownAlgorithmLink;
                }
                DsLink::NoMatch => (),
            }
        }

        accumulate(&mut saved, sig_status);
    }

    // a DNSKEY set which never reached a DS match is a bad delegation
    if is_key_set {
        return AssertionStatus::BadDelegation;
    }

    saved.unwrap_or(AssertionStatus::NotVerified)
}

enum DsLink {
    Matched,
    NoMatch,
}

/// Walk the trust parent's DS records looking for one whose digest
/// matches the signing DNSKEY (RFC 4034 section 5.2).
fn check_ds_link(
    crypto: &dyn CryptoProvider,
    set: &RRset,
    trust_set: Option<&RRset>,
    key: &RecordTypeWithData,
) -> DsLink {
    let Some(trust) = trust_set else {
        return DsLink::NoMatch;
    };
    let Some(key_tag) = dnskey_key_tag(key) else {
        return DsLink::NoMatch;
    };
    let RecordTypeWithData::DNSKEY {
        algorithm: key_algorithm,
        ..
    } = key
    else {
        return DsLink::NoMatch;
    };

    for record in &trust.records {
        let RecordTypeWithData::DS {
            key_tag: ds_tag,
            algorithm: ds_algorithm,
            digest_type,
            digest,
        } = record
        else {
            continue;
        };

        if *ds_tag != key_tag || ds_algorithm != key_algorithm {
            continue;
        }

        let input = ds_digest_input(&set.name, &key.rdata_octets());
        match crypto.digest(*digest_type, &input) {
            Ok(computed) if computed == *digest => {
                tracing::debug!(owner = %set.name, key_tag, "DS matches signing key");
                return DsLink::Matched;
            }
            Ok(_) => (),
            Err(_) => {
                tracing::debug!(
                    owner = %set.name,
                    digest_type = u8::from(*digest_type),
                    "cannot compute DS digest"
                );
            }
        }
    }

    DsLink::NoMatch
}
