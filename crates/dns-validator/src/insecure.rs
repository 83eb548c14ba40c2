//! The provably-insecure prover: when validation hits a wall, check
//! whether some parent zone authentically denies a DS for the chain,
//! which establishes that DNSSEC simply does not cover this data.

use dns_types::protocol::types::*;

use crate::context::Context;
use crate::query::{AssertionId, QueryId};
use crate::resolver::resolve_and_check_internal;
use crate::rrset::RrsetKind;
use crate::status::{AssertionStatus, ValStatus};

/// The deepest the prover will recurse through subordinate
/// resolutions.
const PROVER_DEPTH_LIMIT: usize = 8;

/// Starting from the failing RRset's owner, walk upward through the
/// name hierarchy; at each candidate zone cut, resolve a DS query
/// without re-entering the prover.  An authenticated denial of the DS
/// (`NONEXISTENT_TYPE`, or `NONEXISTENT_NAME_OPTOUT` for an opted-out
/// span) proves the chain insecure.
///
/// The search stops at the root, when resolution fails, or when it
/// would re-enter the query that invoked the prover in the first
/// place.
pub(crate) async fn verify_provably_insecure(
    ctx: &mut Context,
    top_q: QueryId,
    failing: AssertionId,
) -> bool {
    let owner = ctx.assertions.get(failing).rrset.name.clone();
    let zone_cut = ctx.assertions.get(failing).rrset.zone_cut.clone();
    let rclass = ctx.assertions.get(failing).rrset.rclass;

    if ctx.depth >= PROVER_DEPTH_LIMIT {
        tracing::debug!(%owner, "prover recursion limit reached");
        return false;
    }

    // break out of a possible loop: we got an SOA from the same zone
    // while querying for its DS
    {
        let top = ctx.queries.get(top_q);
        let failing_node = ctx.assertions.get(failing);
        if top.rtype == RecordType::DS
            && top.name == owner
            && failing_node.status == AssertionStatus::RrsigMissing
            && failing_node.rrset.kind == RrsetKind::NackSoa
        {
            tracing::debug!(zone = %owner, "cannot show that zone is provably insecure");
            return false;
        }
    }

    let original_query = (ctx.queries.get(top_q).name.clone(), ctx.queries.get(top_q).rtype);

    // prefer the known zone cut as the starting point; the owner
    // itself may sit well below any delegation
    let mut candidate = Some(zone_cut.unwrap_or(owner.clone()));

    while let Some(cut) = candidate {
        if cut.is_root() {
            break;
        }
        if (cut.clone(), RecordType::DS) == original_query {
            tracing::debug!(zone = %cut, "prover would re-enter the original query");
            break;
        }

        tracing::debug!(zone = %cut, "checking whether zone is provably insecure");

        let mut sub = ctx.subcontext();
        let outcome =
            resolve_and_check_internal(&mut sub, &cut, rclass, RecordType::DS, false, true).await;
        ctx.metrics.absorb(sub.metrics());

        let Ok(chain) = outcome else {
            tracing::debug!(zone = %cut, "DS resolution failed");
            break;
        };
        if chain.results.is_empty() {
            break;
        }

        match chain.status() {
            ValStatus::NonexistentType | ValStatus::NonexistentNameOptout => {
                tracing::debug!(zone = %cut, original = %owner, "zone is provably insecure");
                ctx.assertions.get_mut(failing).status = AssertionStatus::ProvablyInsecure;
                return true;
            }
            ValStatus::Success => {
                // a DS exists: the zone is signed, so the failure was
                // genuine
                tracing::debug!(zone = %cut, "zone has a DS; not provably insecure");
                return false;
            }
            ValStatus::NonexistentName => {
                // the candidate is not a delegation point at all; try
                // the next zone cut up
                candidate = cut.parent();
            }
            status => {
                tracing::debug!(zone = %cut, %status, "zone is not provably insecure");
                return false;
            }
        }
    }

    tracing::debug!(%owner, "zone is not provably insecure");
    false
}
