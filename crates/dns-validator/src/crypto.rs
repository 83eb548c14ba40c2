//! The cryptographic seam.
//!
//! Signature primitives and digests are external collaborators: the
//! verifier and the proof engine call through `CryptoProvider`, and
//! the default `RingCrypto` implementation supplies the subset `ring`
//! can do (RSA/SHA-1 verification, SHA-1 and SHA-256 digests).
//! RSA-MD5 and DSA have no `ring` primitive and report
//! `AlgorithmNotSupported`; an embedder with different needs supplies
//! its own provider.

use ring::signature::{RsaPublicKeyComponents, RSA_PKCS1_1024_8192_SHA1_FOR_LEGACY_USE_ONLY};

use dns_types::protocol::types::*;

/// Why a cryptographic operation could not succeed.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum CryptoError {
    /// The algorithm is known but this provider has no primitive for
    /// it.
    AlgorithmNotSupported,
    /// The algorithm number is not one this library knows at all.
    UnknownAlgorithm,
    /// The key material could not be parsed.
    InvalidKey,
    /// The signature did not verify.
    BadSignature,
}

impl std::fmt::Display for CryptoError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            CryptoError::AlgorithmNotSupported => write!(f, "algorithm not supported"),
            CryptoError::UnknownAlgorithm => write!(f, "unknown algorithm"),
            CryptoError::InvalidKey => write!(f, "invalid key material"),
            CryptoError::BadSignature => write!(f, "signature does not verify"),
        }
    }
}

impl std::error::Error for CryptoError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        None
    }
}

/// The contract the verifier and proof engine need from a crypto
/// implementation.
pub trait CryptoProvider: Send + Sync {
    /// Verify `signature` over `message` with the DNSKEY public key
    /// material (RFC 3110 format for the RSA algorithms).
    ///
    /// # Errors
    ///
    /// See `CryptoError`.
    fn verify(
        &self,
        algorithm: SecurityAlgorithm,
        public_key: &[u8],
        message: &[u8],
        signature: &[u8],
    ) -> Result<(), CryptoError>;

    /// Digest `data` with the given algorithm.
    ///
    /// # Errors
    ///
    /// See `CryptoError`.
    fn digest(&self, algorithm: DigestAlgorithm, data: &[u8]) -> Result<Vec<u8>, CryptoError>;
}

/// The default provider, backed by `ring`.
#[derive(Debug, Clone, Copy, Default)]
pub struct RingCrypto;

impl CryptoProvider for RingCrypto {
    fn verify(
        &self,
        algorithm: SecurityAlgorithm,
        public_key: &[u8],
        message: &[u8],
        signature: &[u8],
    ) -> Result<(), CryptoError> {
        match algorithm {
            SecurityAlgorithm::RsaSha1 | SecurityAlgorithm::RsaSha1Nsec3Sha1 => {
                let (e, n) = parse_rfc3110_key(public_key).ok_or(CryptoError::InvalidKey)?;
                RsaPublicKeyComponents { n, e }
                    .verify(
                        &RSA_PKCS1_1024_8192_SHA1_FOR_LEGACY_USE_ONLY,
                        message,
                        signature,
                    )
                    .map_err(|_| CryptoError::BadSignature)
            }
            SecurityAlgorithm::RsaMd5
            | SecurityAlgorithm::DsaSha1
            | SecurityAlgorithm::DsaNsec3Sha1 => Err(CryptoError::AlgorithmNotSupported),
            SecurityAlgorithm::Unknown(_) => Err(CryptoError::UnknownAlgorithm),
        }
    }

    fn digest(&self, algorithm: DigestAlgorithm, data: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let ring_algorithm = match algorithm {
            DigestAlgorithm::Sha1 => &ring::digest::SHA1_FOR_LEGACY_USE_ONLY,
            DigestAlgorithm::Sha256 => &ring::digest::SHA256,
            DigestAlgorithm::Unknown(_) => return Err(CryptoError::UnknownAlgorithm),
        };
        Ok(ring::digest::digest(ring_algorithm, data).as_ref().to_vec())
    }
}

/// Split an RFC 3110 RSA public key into its exponent and modulus.
///
/// The key starts with a one-octet exponent length; a zero there means
/// the length is instead in the following two octets.
pub fn parse_rfc3110_key(octets: &[u8]) -> Option<(&[u8], &[u8])> {
    let (exponent_len, rest) = match octets.split_first()? {
        (0, rest) if rest.len() >= 2 => {
            (usize::from(u16::from_be_bytes([rest[0], rest[1]])), &rest[2..])
        }
        (0, _) => return None,
        (len, rest) => (usize::from(*len), rest),
    };

    if exponent_len == 0 || rest.len() <= exponent_len {
        return None;
    }

    Some((&rest[..exponent_len], &rest[exponent_len..]))
}

/// The key tag of a DNSKEY RDATA, per RFC 4034 appendix B.
pub fn key_tag(rdata: &[u8]) -> u16 {
    let mut acc: u32 = 0;
    for (i, octet) in rdata.iter().enumerate() {
        if i & 1 == 0 {
            acc += u32::from(*octet) << 8;
        } else {
            acc += u32::from(*octet);
        }
    }
    acc += (acc >> 16) & 0xFFFF;
    (acc & 0xFFFF) as u16
}

/// The key tag of a typed DNSKEY record; `None` for other records.
pub fn dnskey_key_tag(record: &RecordTypeWithData) -> Option<u16> {
    if record.rtype() == RecordType::DNSKEY {
        Some(key_tag(&record.rdata_octets()))
    } else {
        None
    }
}

/// The input a DS digest is computed over: the canonical owner name
/// followed by the DNSKEY RDATA (RFC 4034 section 5.1.4).
pub fn ds_digest_input(owner: &DomainName, dnskey_rdata: &[u8]) -> Vec<u8> {
    let mut input = Vec::with_capacity(owner.octets.len() + dnskey_rdata.len());
    input.extend_from_slice(&owner.octets);
    input.extend_from_slice(dnskey_rdata);
    input
}

/// The iterated NSEC3 hash of RFC 5155 section 5:
/// `IH(salt, x, 0) = H(x || salt)` and
/// `IH(salt, x, k) = H(IH(salt, x, k-1) || salt)`.
///
/// # Errors
///
/// If the provider cannot compute SHA-1.
pub fn nsec3_hash(
    crypto: &dyn CryptoProvider,
    name: &DomainName,
    salt: &[u8],
    iterations: u16,
) -> Result<Vec<u8>, CryptoError> {
    let mut input = Vec::with_capacity(name.octets.len() + salt.len());
    input.extend_from_slice(&name.octets);
    input.extend_from_slice(salt);
    let mut hash = crypto.digest(DigestAlgorithm::Sha1, &input)?;

    for _ in 0..iterations {
        input.clear();
        input.extend_from_slice(&hash);
        input.extend_from_slice(salt);
        hash = crypto.digest(DigestAlgorithm::Sha1, &input)?;
    }

    Ok(hash)
}

/// Encode an NSEC3 hash the way it appears as an owner label:
/// base32hex without padding, lowercase (RFC 5155 section 3.3).
pub fn base32hex_encode(hash: &[u8]) -> String {
    data_encoding::BASE32HEX_NOPAD
        .encode(hash)
        .to_ascii_lowercase()
}

/// Decode the hash from an NSEC3 record's owner name (its first
/// label).
pub fn nsec3_owner_hash(owner: &DomainName) -> Option<Vec<u8>> {
    let label = owner.labels.first()?;
    if label.is_empty() {
        return None;
    }
    data_encoding::BASE32HEX_NOPAD
        .decode(&label.to_ascii_uppercase())
        .ok()
}

#[cfg(test)]
mod tests {
    use dns_types::protocol::types::test_util::*;

    use super::*;
    use crate::test_util::*;

    #[test]
    fn rfc3110_short_exponent() {
        let key = [3, 1, 0, 1, 0xab, 0xcd, 0xef];
        let (e, n) = parse_rfc3110_key(&key).unwrap();
        assert_eq!(&[1, 0, 1], e);
        assert_eq!(&[0xab, 0xcd, 0xef], n);
    }

    #[test]
    fn rfc3110_long_exponent() {
        let mut key = vec![0, 1, 4];
        key.extend_from_slice(&[1; 260]);
        key.extend_from_slice(&[0xab, 0xcd]);
        let (e, n) = parse_rfc3110_key(&key).unwrap();
        assert_eq!(260, e.len());
        assert_eq!(&[0xab, 0xcd], n);
    }

    #[test]
    fn rfc3110_rejects_empty_modulus() {
        assert_eq!(None, parse_rfc3110_key(&[2, 1, 1]));
        assert_eq!(None, parse_rfc3110_key(&[]));
        assert_eq!(None, parse_rfc3110_key(&[0, 0]));
    }

    #[test]
    fn key_tag_is_deterministic_and_wraps() {
        assert_eq!(0, key_tag(&[]));
        assert_eq!(key_tag(&[1, 2, 3]), key_tag(&[1, 2, 3]));

        // accumulation of large octets must fold the carry back in
        let tag = key_tag(&[0xff; 1024]);
        assert!(tag > 0);
    }

    #[test]
    fn nsec3_hash_iterates() {
        let crypto = MockCrypto;
        let name = domain("example.test.");
        let salt = [0xaa, 0xbb];

        let h0 = nsec3_hash(&crypto, &name, &salt, 0).unwrap();
        let h1 = nsec3_hash(&crypto, &name, &salt, 1).unwrap();
        let h2 = nsec3_hash(&crypto, &name, &salt, 2).unwrap();

        assert_ne!(h0, h1);
        assert_ne!(h1, h2);

        // one more iteration is one more application of H(x || salt)
        let mut input = h1.clone();
        input.extend_from_slice(&salt);
        assert_eq!(h2, crypto.digest(DigestAlgorithm::Sha1, &input).unwrap());
    }

    #[test]
    fn base32hex_owner_roundtrip() {
        let hash = vec![0x01, 0x23, 0x45, 0x67, 0x89, 0xab, 0xcd, 0xef, 0x00, 0xff];
        let label = base32hex_encode(&hash);
        let owner =
            DomainName::from_dotted_string(&format!("{label}.example.test.")).unwrap();
        assert_eq!(Some(hash), nsec3_owner_hash(&owner));
    }

    #[test]
    fn ring_rejects_unsupported_algorithms() {
        let crypto = RingCrypto;
        assert_eq!(
            Err(CryptoError::AlgorithmNotSupported),
            crypto.verify(SecurityAlgorithm::RsaMd5, &[1, 1, 1], b"m", b"s")
        );
        assert_eq!(
            Err(CryptoError::AlgorithmNotSupported),
            crypto.verify(SecurityAlgorithm::DsaSha1, &[1, 1, 1], b"m", b"s")
        );
        assert_eq!(
            Err(CryptoError::UnknownAlgorithm),
            crypto.verify(SecurityAlgorithm::from(250), &[1, 1, 1], b"m", b"s")
        );
    }

    #[test]
    fn ring_digests_have_expected_lengths() {
        let crypto = RingCrypto;
        assert_eq!(
            20,
            crypto.digest(DigestAlgorithm::Sha1, b"data").unwrap().len()
        );
        assert_eq!(
            32,
            crypto
                .digest(DigestAlgorithm::Sha256, b"data")
                .unwrap()
                .len()
        );
        assert_eq!(
            Err(CryptoError::UnknownAlgorithm),
            crypto.digest(DigestAlgorithm::from(200), b"data")
        );
    }
}
