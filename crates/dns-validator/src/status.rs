//! The two status vocabularies of the validator: per-assertion
//! statuses used while the authentication chain is under
//! construction, and the user-visible statuses attached to each
//! result.

use std::fmt;

/// Why a subordinate query failed.  These surface as
/// `AssertionStatus::DnsError` on the assertion waiting for that
/// query, and as `ValStatus::DnsError` when the top query itself
/// fails.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum DnsErrorKind {
    /// The response carried no usable records.
    NoAnswer,
    /// The response did not answer the question asked.
    WrongAnswer,
    /// Two RRsets in one response contradict each other (mixed answer
    /// kinds, or disagreeing zone cuts).
    ConflictingAnswers,
    /// A referral or alias loop was detected.
    ReferralError,
    /// A delegation's nameserver addresses could not be fetched.
    MissingGlue,
    /// The transport could not produce a response.
    Transport,
    /// An internal invariant was violated.
    Internal,
}

impl fmt::Display for DnsErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            DnsErrorKind::NoAnswer => write!(f, "no answer"),
            DnsErrorKind::WrongAnswer => write!(f, "wrong answer"),
            DnsErrorKind::ConflictingAnswers => write!(f, "conflicting answers"),
            DnsErrorKind::ReferralError => write!(f, "referral loop"),
            DnsErrorKind::MissingGlue => write!(f, "missing glue"),
            DnsErrorKind::Transport => write!(f, "transport failure"),
            DnsErrorKind::Internal => write!(f, "internal error"),
        }
    }
}

/// The state of a single assertion in the authentication chain.
///
/// An assertion starts at `Init`, moves through the `WaitFor*` states
/// while its pending queries are outstanding, and ends in one of the
/// terminal states: a success (`Verified`, `VerifiedLink`,
/// `TrustKey`, ...), a verification failure (`NotVerified`,
/// `RrsigExpired`, ...), or a structural error (`DataMissing`,
/// `DnsError`, ...).
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum AssertionStatus {
    Init,
    /// The RRset arrived without signatures; an RRSIG query is
    /// outstanding.
    WaitForRrsig,
    /// Waiting for the signer's DNSKEY (or DS, for a DNSKEY set) to
    /// arrive.
    WaitForTrust,
    /// Both data and keys are present; verification can run.
    CanVerify,
    /// At least one signature verified.
    Verified,
    /// At least one signature verified, via wildcard expansion.
    WildcardVerified,
    /// A DNSKEY set verified and its key matches a DS in the parent.
    VerifiedLink,
    /// A DNSKEY which made a signature (per-key bookkeeping).
    SigningKey,
    /// The DNSKEY set matches a configured trust anchor.
    TrustKey,
    /// Policy says this zone is trusted without validation.
    TrustZone,
    /// Policy says this zone must not be trusted at all.
    UntrustedZone,
    /// The answer was produced locally, not validated.
    LocalAnswer,
    /// The parent zone authentically denies a DS for this zone.
    ProvablyInsecure,
    /// The trust query came back as a proof of nonexistence.
    NegativeProof,
    /// Validation was switched off for this call.
    DontValidate,
    /// The RRset consists only of RRSIG records.
    BareRrsig,
    DataMissing,
    RrsigMissing,
    DsMissing,
    DnskeyMissing,
    /// No DNSKEY matched the RRSIG's key tag and algorithm.
    DnskeyNoMatch,
    InvalidKey,
    InvalidRrsig,
    /// Signatures were present but none verified.
    NotVerified,
    RrsigExpired,
    RrsigNotYetActive,
    RrsigAlgorithmMismatch,
    UnknownAlgorithm,
    AlgorithmNotSupported,
    /// The RRSIG's label count exceeds the owner name's.
    WrongLabelCount,
    /// A DNSKEY set verified but no parent DS matches any of its keys.
    BadDelegation,
    /// No trust anchor is configured at or above the signer.
    NoTrustAnchor,
    UnknownDnskeyProtocol,
    /// A DS matched a key whose algorithm is unknown; the link exists
    /// but cannot be checked.
    UnknownAlgorithmLink,
    /// The pending query failed.
    DnsError(DnsErrorKind),
}

impl AssertionStatus {
    /// Still waiting on a pending query or an unverified state.
    pub fn is_pending(&self) -> bool {
        matches!(
            self,
            AssertionStatus::Init
                | AssertionStatus::WaitForRrsig
                | AssertionStatus::WaitForTrust
                | AssertionStatus::CanVerify
        )
    }

    /// A signature check succeeded on this assertion.
    pub fn is_verified(&self) -> bool {
        matches!(
            self,
            AssertionStatus::Verified
                | AssertionStatus::WildcardVerified
                | AssertionStatus::VerifiedLink
        )
    }

    /// A terminal state that ends the chain walk in a trusted answer.
    pub fn is_trusted_terminal(&self) -> bool {
        matches!(
            self,
            AssertionStatus::TrustKey
                | AssertionStatus::TrustZone
                | AssertionStatus::ProvablyInsecure
        )
    }

    /// A verification failure: the data may still be provably
    /// insecure, so one failure does not immediately condemn the
    /// chain.
    pub fn is_verification_failure(&self) -> bool {
        matches!(
            self,
            AssertionStatus::DnskeyNoMatch
                | AssertionStatus::InvalidKey
                | AssertionStatus::InvalidRrsig
                | AssertionStatus::NotVerified
                | AssertionStatus::RrsigExpired
                | AssertionStatus::RrsigNotYetActive
                | AssertionStatus::RrsigAlgorithmMismatch
                | AssertionStatus::UnknownAlgorithm
                | AssertionStatus::AlgorithmNotSupported
                | AssertionStatus::WrongLabelCount
                | AssertionStatus::BadDelegation
                | AssertionStatus::UnknownDnskeyProtocol
                | AssertionStatus::RrsigMissing
                | AssertionStatus::DsMissing
                | AssertionStatus::DnskeyMissing
        )
    }

    /// A structural error: no amount of extra data makes this chain
    /// verifiable.
    pub fn is_structural_error(&self) -> bool {
        matches!(
            self,
            AssertionStatus::DataMissing
                | AssertionStatus::UntrustedZone
                | AssertionStatus::DnsError(_)
        )
    }
}

impl fmt::Display for AssertionStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            AssertionStatus::DnsError(kind) => write!(f, "dns error ({kind})"),
            other => write!(f, "{other:?}"),
        }
    }
}

/// The user-visible validation status of one result.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum ValStatus {
    /// Not yet determined; never returned from a finished call.
    DontKnow,
    /// The chain verified up to a configured trust anchor.
    Success,
    /// Authenticated proof that the name does not exist.
    NonexistentName,
    /// Authenticated proof of nonexistence via an opt-out NSEC3 span;
    /// trusted, but weaker than `NonexistentName`.
    NonexistentNameOptout,
    /// Authenticated proof that the name exists but the type does not.
    NonexistentType,
    /// The parent zone authentically denies a DS: DNSSEC does not
    /// cover this data.
    ProvablyInsecure,
    /// Data accepted without validation (local policy, or validation
    /// disabled).
    LocalAnswer,
    /// The answer was a bare RRSIG set.
    BareRrsig,
    /// Every signature verified but no configured trust anchor covers
    /// the chain.
    VerifiedChain,
    /// The chain of trust loops through its own DS proof.
    IndeterminateDs,
    /// A negative proof appeared where the chain has no parent to
    /// validate it against.
    IndeterminateProof,
    /// A proof of nonexistence is present but wrong.
    BogusProof,
    /// A proof of nonexistence is missing one of its obligations.
    IncompleteProof,
    /// Validation failed and the failure could not be shown to be
    /// provably insecure.
    BogusUnprovable,
    /// Validation failed in a way that may still prove insecure.
    BogusProvable,
    /// Validation failed outright.
    Error,
    /// The query itself failed.
    DnsError(DnsErrorKind),
}

impl ValStatus {
    pub fn is_bogus(&self) -> bool {
        matches!(
            self,
            ValStatus::BogusProof | ValStatus::BogusUnprovable | ValStatus::BogusProvable
        )
    }
}

impl fmt::Display for ValStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ValStatus::DnsError(kind) => write!(f, "dns error ({kind})"),
            other => write!(f, "{other:?}"),
        }
    }
}

/// Whether the status represents an answer whose authenticity was
/// cryptographically established.
pub fn is_authentic(status: ValStatus) -> bool {
    matches!(
        status,
        ValStatus::Success
            | ValStatus::NonexistentName
            | ValStatus::NonexistentNameOptout
            | ValStatus::NonexistentType
    )
}

/// Whether the status represents an answer the caller may act on:
/// authentic answers, local answers, and provably insecure data.
pub fn is_trusted(status: ValStatus) -> bool {
    is_authentic(status)
        || matches!(status, ValStatus::LocalAnswer | ValStatus::ProvablyInsecure)
}
