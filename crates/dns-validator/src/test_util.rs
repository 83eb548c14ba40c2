//! Shared fixtures for the validator's tests: record constructors
//! for the DNSSEC types, a deterministic crypto provider, and signed
//! RRset builders.

use dns_types::protocol::types::test_util::*;
use dns_types::protocol::types::*;

use crate::crypto::{
    base32hex_encode, dnskey_key_tag, ds_digest_input, nsec3_hash, CryptoError, CryptoProvider,
};
use crate::rrset::{group_rrsets, FromSection, RRset, Rrsig, RrsetKind};
use crate::verify::make_sigfield;

/// A long-lived validity window for fixture signatures.
pub const FIXTURE_INCEPTION: u32 = 1_600_000_000;
pub const FIXTURE_EXPIRATION: u32 = 4_000_000_000;

/// A deterministic stand-in for the crypto provider: a signature is
/// valid iff it equals `MockCrypto::sign` of the message, and digests
/// are the identity function.  Fixtures can therefore construct
/// "valid" DS digests and NSEC3 hashes without any real cryptography.
#[derive(Debug, Clone, Copy, Default)]
pub struct MockCrypto;

impl MockCrypto {
    pub fn sign(message: &[u8]) -> Vec<u8> {
        let mut signature = b"sig:".to_vec();
        signature.extend(message.iter().map(|b| b ^ 0xa5));
        signature
    }
}

impl CryptoProvider for MockCrypto {
    fn verify(
        &self,
        algorithm: SecurityAlgorithm,
        _public_key: &[u8],
        message: &[u8],
        signature: &[u8],
    ) -> Result<(), CryptoError> {
        if algorithm.is_unknown() {
            return Err(CryptoError::UnknownAlgorithm);
        }
        if signature == MockCrypto::sign(message) {
            Ok(())
        } else {
            Err(CryptoError::BadSignature)
        }
    }

    fn digest(&self, algorithm: DigestAlgorithm, data: &[u8]) -> Result<Vec<u8>, CryptoError> {
        if algorithm.is_unknown() {
            return Err(CryptoError::UnknownAlgorithm);
        }
        Ok(data.to_vec())
    }
}

/// Group records into a single RRset (there must be exactly one).
pub fn rrset_from(records: &[ResourceRecord], from_section: FromSection) -> RRset {
    let mut sets = group_rrsets(records, from_section);
    assert_eq!(1, sets.len(), "expected records to form a single RRset");
    sets.remove(0)
}

pub fn dnskey_record(name: &str, public_key: &[u8]) -> ResourceRecord {
    ResourceRecord {
        name: domain(name),
        rtype_with_data: RecordTypeWithData::DNSKEY {
            flags: DNSKEY_FLAG_ZONE_KEY,
            protocol: 3,
            algorithm: SecurityAlgorithm::RsaSha1,
            public_key: public_key.to_vec(),
        },
        rclass: RecordClass::IN,
        ttl: 300,
    }
}

pub fn ds_record(name: &str, key_tag: u16, digest: Vec<u8>) -> ResourceRecord {
    ResourceRecord {
        name: domain(name),
        rtype_with_data: RecordTypeWithData::DS {
            key_tag,
            algorithm: SecurityAlgorithm::RsaSha1,
            digest_type: DigestAlgorithm::Sha1,
            digest,
        },
        rclass: RecordClass::IN,
        ttl: 300,
    }
}

pub fn nsec_record(name: &str, next_name: &str, types: &[RecordType]) -> ResourceRecord {
    ResourceRecord {
        name: domain(name),
        rtype_with_data: RecordTypeWithData::NSEC {
            next_name: domain(next_name),
            types: TypeBitmap::from_types(types),
        },
        rclass: RecordClass::IN,
        ttl: 300,
    }
}

pub fn rrsig_record(
    name: &str,
    type_covered: RecordType,
    labels: u8,
    signer: &str,
) -> ResourceRecord {
    ResourceRecord {
        name: domain(name),
        rtype_with_data: RecordTypeWithData::RRSIG {
            type_covered,
            algorithm: SecurityAlgorithm::RsaSha1,
            labels,
            original_ttl: 300,
            expiration: FIXTURE_EXPIRATION,
            inception: FIXTURE_INCEPTION,
            key_tag: 12345,
            signer: domain(signer),
            signature: vec![1, 2, 3, 4],
        },
        rclass: RecordClass::IN,
        ttl: 300,
    }
}

/// An unsigned RRSIG skeleton over a set, with the right label count
/// and a key tag matching `zone_keys`'s first key.
pub fn mock_rrsig(set: &RRset, signer: &str) -> Rrsig {
    Rrsig {
        type_covered: set.rtype,
        algorithm: SecurityAlgorithm::RsaSha1,
        labels: set.name.label_count() as u8,
        original_ttl: set.ttl,
        expiration: FIXTURE_EXPIRATION,
        inception: FIXTURE_INCEPTION,
        key_tag: 0,
        signer: domain(signer),
        signature: Vec::new(),
    }
}

/// The standard fixture key set for a zone.
pub fn zone_keys(zone: &str) -> RRset {
    rrset_from(
        &[dnskey_record(zone, format!("key material for {zone}").as_bytes())],
        FromSection::Answer,
    )
}

/// Sign `set` with the first key of `keys` under `MockCrypto`.
pub fn sign_rrset(set: &mut RRset, keys: &RRset, signer: &str) {
    let mut sig = mock_rrsig(set, signer);
    sig.key_tag = dnskey_key_tag(&keys.records[0]).unwrap();
    sig.signature = MockCrypto::sign(&make_sigfield(set, &sig, 0).unwrap());
    set.sigs.push(sig);
}

/// An A RRset for `name`, signed by the fixture keys of `zone`.
/// Returns the set and the zone's key set.
pub fn signed_a_rrset(name: &str, zone: &str) -> (RRset, RRset) {
    let mut set = rrset_from(
        &[a_record(name, std::net::Ipv4Addr::new(192, 0, 2, 1))],
        FromSection::Answer,
    );
    let keys = zone_keys(zone);
    sign_rrset(&mut set, &keys, zone);
    (set, keys)
}

/// A self-signed DNSKEY RRset for `zone` plus a matching DS set (as
/// the parent would publish it).  The DS digest uses `MockCrypto`'s
/// identity digest.
pub fn signed_dnskey_rrset(zone: &str) -> (RRset, RRset) {
    let mut keys = zone_keys(zone);
    let self_keys = keys.clone();
    sign_rrset(&mut keys, &self_keys, zone);

    let key_tag = dnskey_key_tag(&keys.records[0]).unwrap();
    let digest = ds_digest_input(&keys.name, &keys.records[0].rdata_octets());
    let mut ds = rrset_from(&[ds_record(zone, key_tag, digest)], FromSection::Answer);
    ds.kind = RrsetKind::Straight;

    (keys, ds)
}

/// An NSEC3 RRset whose owner hash matches `name` (hashed with empty
/// salt under `MockCrypto`), covering up to `next_hashed`.
pub fn nack_nsec3_for(
    crypto: &MockCrypto,
    zone: &str,
    name: &DomainName,
    next_hashed: &[u8],
    opt_out: bool,
    iterations: u16,
    types: &[RecordType],
) -> RRset {
    let hash = nsec3_hash(crypto, name, &[], iterations).unwrap();
    let owner = format!("{}.{}", base32hex_encode(&hash), zone);

    let record = ResourceRecord {
        name: domain(&owner),
        rtype_with_data: RecordTypeWithData::NSEC3 {
            hash_algorithm: 1,
            flags: if opt_out { NSEC3_FLAG_OPT_OUT } else { 0 },
            iterations,
            salt: Vec::new(),
            next_hashed_owner: next_hashed.to_vec(),
            types: TypeBitmap::from_types(types),
        },
        rclass: RecordClass::IN,
        ttl: 300,
    };

    let mut set = rrset_from(&[record], FromSection::Authority);
    set.kind = RrsetKind::NackNsec3;
    set
}

