//! A DNSSEC validating resolver core: drive iterative resolution for
//! a question, build authentication chains from the answer up to a
//! configured trust anchor, verify signatures, prove nonexistence
//! where the answer is negative, and classify every outcome.
//!
//! The entry point is [`resolve_and_check`]: one call yields a full
//! validated [`ResultChain`], not a single record.  Wire transport
//! and cryptographic primitives are contracts
//! ([`resolver::ResolverTransport`], [`crypto::CryptoProvider`]) with
//! tokio- and ring-backed defaults.

#![warn(clippy::pedantic)]
// Sometimes a redundant else is clearer
#![allow(clippy::redundant_else)]
// Don't care enough to fix
#![allow(clippy::match_same_arms)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::similar_names)]
#![allow(clippy::struct_excessive_bools)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::wildcard_imports)]

pub mod assertion;
pub mod cache;
pub mod context;
pub mod crypto;
pub mod digest;
pub mod insecure;
pub mod metrics;
pub mod net;
pub mod policy;
pub mod proof;
pub mod query;
pub mod resolver;
pub mod rrset;
pub mod status;
pub mod validate;
pub mod verify;

#[cfg(test)]
pub mod test_util;

use std::time::Duration;
use tokio::time::timeout;
use tracing::Instrument;

use dns_types::protocol::types::{DomainName, RecordClass, RecordType};

pub use self::context::Context;
pub use self::resolver::ResolutionError;
pub use self::status::{is_authentic, is_trusted, ValStatus};
pub use self::validate::ResultChain;

/// How long one `resolve_and_check` call may run, across every
/// subordinate query it spawns.
pub const RESOLUTION_TIMEOUT: Duration = Duration::from_secs(60);

/// Flags modifying a `resolve_and_check` call.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct ValidationFlags {
    /// Short-circuit all validation: return whatever the cache and
    /// resolver produce, with status `LocalAnswer`.
    pub dont_validate: bool,
}

/// Resolve a question and validate the answer.
///
/// This drives iterative resolution and validation in lockstep until
/// the top query reaches a terminal state, then returns one result
/// per top-level RRset, each carrying the chain of trust that
/// produced it.  The result chain is self-contained: dropping it
/// frees everything, independent of the context.
///
/// This has a 60s timeout.
///
/// # Errors
///
/// See `ResolutionError`.  Failures of subordinate queries are not
/// errors at this level; they surface as `ValStatus::DnsError`
/// results.
pub async fn resolve_and_check(
    ctx: &mut Context,
    name: &DomainName,
    rclass: RecordClass,
    rtype: RecordType,
    flags: ValidationFlags,
) -> Result<ResultChain, ResolutionError> {
    ctx.reset();

    if let Ok(res) = timeout(
        RESOLUTION_TIMEOUT,
        resolver::resolve_and_check_internal(ctx, name, rclass, rtype, flags.dont_validate, false)
            .instrument(tracing::error_span!("resolve_and_check", %name, %rtype)),
    )
    .await
    {
        res
    } else {
        tracing::debug!(%name, %rtype, "timed out");
        Err(ResolutionError::Timeout)
    }
}
