//! Verify & validate: walk every authentication chain bottom-up,
//! advancing assertions whose pending queries have completed, verify
//! where keys and signatures are both present, and classify the
//! outcome of each chain into a user-visible result.

use std::collections::HashSet;

use dns_types::protocol::types::*;

use crate::assertion::build_pending_query;
use crate::context::Context;
use crate::insecure::verify_provably_insecure;
use crate::proof::prove_nonexistence;
use crate::query::{AssertionId, QueryId, QueryState};
use crate::resolver::merge_glue_in_referral;
use crate::rrset::{RRset, RrsetKind};
use crate::status::{AssertionStatus, ValStatus};
use crate::verify::verify_assertion;

/// One link of a validated chain of trust, as returned to the caller:
/// a snapshot of the assertion's RRset and its final status.
#[derive(Debug, Clone)]
pub struct ChainLink {
    pub rrset: RRset,
    pub status: AssertionStatus,
}

/// One user-visible validation outcome: the status, whether the data
/// may be acted on, and the chain of trust that produced it (the
/// answer first, the trust anchor end last).
#[derive(Debug, Clone)]
pub struct ValidatedResult {
    pub status: ValStatus,
    pub trusted: bool,
    pub chain: Vec<ChainLink>,
}

/// The full outcome of a `resolve_and_check` call: one result per
/// distinct top-level RRset in the answer.
#[derive(Debug, Clone, Default)]
pub struct ResultChain {
    pub results: Vec<ValidatedResult>,
}

impl ResultChain {
    /// The RRsets which directly answer the question, from results
    /// whose status is trusted.
    pub fn trusted_answers(&self) -> Vec<&RRset> {
        self.results
            .iter()
            .filter(|res| res.trusted)
            .filter_map(|res| res.chain.first())
            .filter(|link| {
                matches!(link.rrset.kind, RrsetKind::Straight | RrsetKind::Cname)
            })
            .map(|link| &link.rrset)
            .collect()
    }

    /// The single status summarising this chain: the first result's,
    /// since proof fix-up gives every member of a negative answer the
    /// same status.
    pub fn status(&self) -> ValStatus {
        self.results
            .first()
            .map_or(ValStatus::DontKnow, |res| res.status)
    }
}

/// A result under construction, pointing into the assertion arena.
#[derive(Debug)]
pub(crate) struct InterimResult {
    pub trust_head: AssertionId,
    pub status: ValStatus,
    pub trusted: bool,
}

/// Advance one assertion whose pending query may have completed.
fn try_verify_assertion(ctx: &mut Context, id: AssertionId, now: u64) {
    let Some(pc) = ctx.assertions.get(id).pending_query else {
        return;
    };

    if ctx.queries.get(pc).state == QueryState::WaitForGlue {
        merge_glue_in_referral(&mut ctx.queries, &ctx.assertions, pc);
    }

    if let QueryState::Error(_) = ctx.queries.get(pc).state {
        let pending_type = ctx.queries.get(pc).rtype;
        let assertion = ctx.assertions.get_mut(id);
        assertion.status = match assertion.status {
            AssertionStatus::WaitForRrsig => AssertionStatus::RrsigMissing,
            AssertionStatus::WaitForTrust => {
                // we were waiting for either a DNSKEY or a DS
                if pending_type == RecordType::DS {
                    AssertionStatus::DsMissing
                } else {
                    AssertionStatus::DnskeyMissing
                }
            }
            other => other,
        };
        return;
    }

    if ctx.queries.get(pc).state != QueryState::Answered {
        return;
    }

    match ctx.assertions.get(id).status {
        AssertionStatus::WaitForRrsig => {
            // the pending answer should hold a bare RRSIG covering our
            // type
            let rtype = ctx.assertions.get(id).rrset.rtype;
            let mut matched = None;

            if let Some(pending_head) = ctx.queries.get(pc).assertion {
                for sibling in ctx.assertions.siblings(pending_head) {
                    let pending = ctx.assertions.get(sibling);
                    if pending.status != AssertionStatus::BareRrsig {
                        continue;
                    }
                    let sigs: Vec<_> = pending
                        .rrset
                        .sigs
                        .iter()
                        .filter(|sig| sig.type_covered == rtype)
                        .cloned()
                        .collect();
                    if !sigs.is_empty() {
                        matched = Some(sigs);
                        break;
                    }
                }
            }

            if let Some(sigs) = matched {
                let assertion = ctx.assertions.get_mut(id);
                assertion.rrset.sigs = sigs;
                assertion.status = AssertionStatus::WaitForTrust;
                assertion.pending_query = None;
                // create a pending query for the trust portion
                let policy = std::sync::Arc::clone(&ctx.policy);
                build_pending_query(&mut ctx.assertions, &mut ctx.queries, &policy, id);
            } else {
                ctx.assertions.get_mut(id).status = AssertionStatus::RrsigMissing;
            }
        }
        AssertionStatus::WaitForTrust => {
            let Some(pending_head) = ctx.queries.get(pc).assertion else {
                return;
            };
            {
                let assertion = ctx.assertions.get_mut(id);
                assertion.trust = Some(pending_head);
                assertion.pending_query = None;
            }

            if ctx.assertions.get(pending_head).rrset.kind.is_nack() {
                // a proof of nonexistence should follow
                ctx.assertions.get_mut(id).status = AssertionStatus::NegativeProof;
            } else {
                ctx.assertions.get_mut(id).status = AssertionStatus::CanVerify;
            }
        }
        _ => (),
    }

    if ctx.assertions.get(id).status == AssertionStatus::CanVerify {
        tracing::debug!("verifying next assertion");
        let trust_set = ctx
            .assertions
            .get(id)
            .trust
            .map(|t| ctx.assertions.get(t).rrset.clone());
        let crypto = std::sync::Arc::clone(&ctx.crypto);
        let assertion = ctx.assertions.get_mut(id);
        let status = verify_assertion(crypto.as_ref(), &mut assertion.rrset, trust_set.as_ref(), now);
        assertion.status = status;
        ctx.metrics.verification(status.is_verified());
        tracing::debug!(owner = %ctx.assertions.get(id).rrset.name, %status, "verification outcome");
    }
}

/// When a negative proof sits on a DNSKEY's trust query, find the SOA
/// among the trust siblings and check whether it came from the parent
/// zone (a different owner than the DNSKEY itself).
fn find_parent_soa(ctx: &Context, dnskey_id: AssertionId) -> Option<(AssertionId, bool)> {
    let trust = ctx.assertions.get(dnskey_id).trust?;
    let owner = &ctx.assertions.get(dnskey_id).rrset.name;

    for sibling in ctx.assertions.siblings(trust) {
        let set = &ctx.assertions.get(sibling).rrset;
        if set.rtype == RecordType::SOA {
            return Some((sibling, set.name != *owner));
        }
    }
    None
}

/// Try and verify each assertion reachable from the top query's
/// answer, updating `results` as outcomes become available.  Returns
/// `true` when every chain has reached a terminal status.
pub(crate) async fn verify_and_validate(
    ctx: &mut Context,
    top_q: QueryId,
    results: &mut Vec<InterimResult>,
    dont_validate: bool,
    no_prover: bool,
    now: u64,
) -> bool {
    let Some(top_head) = ctx.queries.get(top_q).assertion else {
        // nothing to do yet
        return false;
    };

    let mut done = true;

    for as_more in ctx.assertions.siblings(top_head) {
        let res_index = if let Some(i) = results.iter().position(|r| r.trust_head == as_more) {
            if results[i].status != ValStatus::DontKnow {
                // we've already dealt with this one
                continue;
            }
            i
        } else {
            results.push(InterimResult {
                trust_head: as_more,
                status: ValStatus::DontKnow,
                trusted: false,
            });
            results.len() - 1
        };

        let mut thisdone = true;
        let mut visited = HashSet::new();
        let mut cursor = Some(as_more);
        let mut last_failure: Option<AssertionId> = None;

        while let Some(next_as) = cursor {
            if !visited.insert(next_as) {
                // walked into our own chain: a trust loop
                results[res_index].status = ValStatus::IndeterminateDs;
                break;
            }

            if ctx.assertions.get(next_as).status.is_pending()
                && !dont_validate
            {
                try_verify_assertion(ctx, next_as, now);
            }

            // break out of a cycle where a DNSKEY's proof is signed by
            // the very key under consideration
            {
                let node = ctx.assertions.get(next_as);
                if node.rrset.rtype == RecordType::DNSKEY {
                    if let Some(trust) = node.trust {
                        if ctx.assertions.get(trust).trust == Some(next_as) {
                            results[res_index].status = ValStatus::IndeterminateDs;
                            break;
                        }
                    }
                }
            }

            let status = ctx.assertions.get(next_as).status;

            if status.is_pending() {
                // still need more data to validate this assertion
                done = false;
                thisdone = false;
                cursor = ctx.assertions.get(next_as).trust;
                continue;
            }

            match status {
                AssertionStatus::DontValidate | AssertionStatus::LocalAnswer => {
                    results[res_index].status = ValStatus::LocalAnswer;
                    results[res_index].trusted = true;
                    break;
                }
                AssertionStatus::TrustZone => {
                    // policy trusts the zone without any validation:
                    // the answer is local-grade, not authentic
                    results[res_index].status = ValStatus::LocalAnswer;
                    results[res_index].trusted = true;
                    break;
                }
                AssertionStatus::TrustKey | AssertionStatus::ProvablyInsecure => {
                    results[res_index].trusted = true;
                    break;
                }
                AssertionStatus::NegativeProof => {
                    // the trust point has a proof of nonexistence
                    let Some(_) = ctx.assertions.get(next_as).trust else {
                        results[res_index].status = ValStatus::IndeterminateProof;
                        break;
                    };

                    if ctx.assertions.get(next_as).rrset.rtype == RecordType::DNSKEY {
                        match find_parent_soa(ctx, next_as) {
                            Some((soa_id, true)) => {
                                // the parent denied our DS
                                if !no_prover
                                    && verify_provably_insecure(ctx, top_q, soa_id).await
                                {
                                    results[res_index].status = ValStatus::ProvablyInsecure;
                                    results[res_index].trusted = true;
                                }
                                break;
                            }
                            _ => {
                                // the DS denial came from the child
                                // zone itself; retrying from the root
                                // risks an infinite referral loop, so
                                // the gap is reported instead
                                results[res_index].status = ValStatus::IndeterminateProof;
                                break;
                            }
                        }
                    } else {
                        if !no_prover && verify_provably_insecure(ctx, top_q, next_as).await {
                            results[res_index].status = ValStatus::ProvablyInsecure;
                            results[res_index].trusted = true;
                        }
                        break;
                    }
                }
                AssertionStatus::BareRrsig => {
                    results[res_index].status = ValStatus::BareRrsig;
                    break;
                }
                AssertionStatus::NoTrustAnchor => {
                    // verified all the way up, but nothing ties the
                    // top to configured trust
                    results[res_index].status = ValStatus::VerifiedChain;
                    break;
                }
                AssertionStatus::DnsError(_)
                | AssertionStatus::DataMissing
                | AssertionStatus::UntrustedZone => {
                    if status.is_structural_error()
                        && !no_prover
                        && matches!(status, AssertionStatus::DnsError(_))
                        && verify_provably_insecure(ctx, top_q, next_as).await
                    {
                        results[res_index].status = ValStatus::ProvablyInsecure;
                        results[res_index].trusted = true;
                    } else {
                        results[res_index].status = ValStatus::Error;
                    }
                    break;
                }
                AssertionStatus::UnknownAlgorithm
                | AssertionStatus::UnknownAlgorithmLink
                | AssertionStatus::AlgorithmNotSupported => {
                    // the failure may yet prove insecure during fix-up
                    results[res_index].status = ValStatus::BogusProvable;
                    last_failure = Some(next_as);
                    cursor = ctx.assertions.get(next_as).trust;
                    continue;
                }
                failure if failure.is_verification_failure() => {
                    if results[res_index].status == ValStatus::BogusUnprovable {
                        // double failures are errors
                        if !no_prover && verify_provably_insecure(ctx, top_q, next_as).await {
                            results[res_index].status = ValStatus::ProvablyInsecure;
                            results[res_index].trusted = true;
                        } else {
                            results[res_index].status = ValStatus::Error;
                        }
                        break;
                    }
                    results[res_index].status = ValStatus::BogusUnprovable;
                    last_failure = Some(next_as);
                    cursor = ctx.assertions.get(next_as).trust;
                    continue;
                }
                verified if verified.is_verified() => {
                    if results[res_index].status == ValStatus::DontKnow {
                        results[res_index].status = ValStatus::VerifiedChain;
                    }
                    cursor = ctx.assertions.get(next_as).trust;
                    continue;
                }
                _ => {
                    cursor = ctx.assertions.get(next_as).trust;
                    continue;
                }
            }
        }

        // a chain which ended in a verification failure may still be
        // under a zone DNSSEC provably does not cover
        if thisdone && !no_prover && !dont_validate {
            if let (Some(failing), true) = (last_failure, results[res_index].status.is_bogus()) {
                if verify_provably_insecure(ctx, top_q, failing).await {
                    results[res_index].status = ValStatus::ProvablyInsecure;
                    results[res_index].trusted = true;
                }
            }
        }

        if !thisdone {
            // more work required; anything recorded so far is interim
            results[res_index].status = ValStatus::DontKnow;
        }
    }

    done
}

/// Final fix-up of the validation results: resolve interim statuses,
/// promote unknown-algorithm chains to provably insecure, and run the
/// proof engine over negative answers.
pub(crate) fn fix_validation_results(
    ctx: &mut Context,
    top_q: QueryId,
    results: &mut [InterimResult],
) {
    let mut partially_wrong = false;
    let mut negative_proof = false;

    for res in results.iter_mut() {
        // algorithms used for signing the DNSKEY record which are not
        // understood leave the zone below effectively unsigned
        if res.status == ValStatus::BogusProvable {
            let mut cursor = Some(res.trust_head);
            let mut visited = HashSet::new();
            while let Some(id) = cursor {
                if !visited.insert(id) {
                    break;
                }
                let node = ctx.assertions.get(id);
                if node.rrset.rtype == RecordType::DNSKEY
                    && matches!(
                        node.status,
                        AssertionStatus::UnknownAlgorithm
                            | AssertionStatus::UnknownAlgorithmLink
                    )
                {
                    res.status = ValStatus::ProvablyInsecure;
                    res.trusted = true;
                    break;
                }
                cursor = node.trust;
            }
        }

        if res.status == ValStatus::DontKnow && res.trusted {
            res.status = ValStatus::Success;
        }
        if res.status == ValStatus::VerifiedChain && res.trusted {
            res.status = ValStatus::Success;
        }
        res.trusted = crate::status::is_trusted(res.status);

        tracing::debug!(status = %res.status, "validation result");

        if res.status != ValStatus::Success && res.status != ValStatus::ProvablyInsecure {
            partially_wrong = true;
        }

        if ctx.assertions.get(res.trust_head).rrset.kind.is_nack() {
            negative_proof = true;
        }
    }

    // nonexistence semantics only attach when the answer set is a
    // negative proof; a positive answer travelling with NACK material
    // (a wildcard expansion) keeps its own status
    let has_positive_answer = results.iter().any(|res| {
        matches!(
            ctx.assertions.get(res.trust_head).rrset.kind,
            RrsetKind::Straight | RrsetKind::Cname
        )
    });

    if !negative_proof || has_positive_answer {
        return;
    }

    // if we asked for a DS and the SOA has the same owner, the child
    // zone answered a question only the parent can answer
    let mut asked_the_child = false;
    if ctx.queries.get(top_q).rtype == RecordType::DS {
        for res in results.iter() {
            let set = &ctx.assertions.get(res.trust_head).rrset;
            if set.rtype == RecordType::SOA {
                if set.name == ctx.queries.get(top_q).name {
                    asked_the_child = true;
                }
                break;
            }
        }
    }

    if asked_the_child || partially_wrong {
        // all answers are related in the proof: one bad member makes
        // the whole proof bogus
        tracing::debug!(asked_the_child, partially_wrong, "bogus proof");
        for res in results.iter_mut() {
            res.status = ValStatus::BogusProof;
        }
        return;
    }

    let qname = ctx.queries.get(top_q).name.clone();
    let qtype = ctx.queries.get(top_q).rtype;
    let rcode = ctx.queries.get(top_q).response_rcode.unwrap_or(Rcode::NoError);

    let soa_provably_insecure = results.iter().any(|res| {
        res.status == ValStatus::ProvablyInsecure
            && ctx.assertions.get(res.trust_head).rrset.kind == RrsetKind::NackSoa
    });

    let proof_sets: Vec<RRset> = results
        .iter()
        .filter(|res| ctx.assertions.get(res.trust_head).rrset.kind.is_nack())
        .map(|res| ctx.assertions.get(res.trust_head).rrset.clone())
        .collect();
    let proof_refs: Vec<&RRset> = proof_sets.iter().collect();

    ctx.metrics.proof_checked();
    let status = prove_nonexistence(
        &ctx.policy,
        ctx.crypto.as_ref(),
        &qname,
        qtype,
        rcode,
        &proof_refs,
        soa_provably_insecure,
    );

    // the proof is a property of the whole answer: every member gets
    // its status
    for res in results.iter_mut() {
        res.status = status;
        res.trusted = crate::status::is_trusted(status);
    }
}

/// Clone the chains of trust out of the arena into the caller-owned
/// result chain.
pub(crate) fn finalize_results(ctx: &Context, results: Vec<InterimResult>) -> ResultChain {
    let mut out = ResultChain::default();

    for res in results {
        let mut chain = Vec::new();
        let mut visited = HashSet::new();
        let mut cursor = Some(res.trust_head);
        while let Some(id) = cursor {
            if !visited.insert(id) {
                break;
            }
            let node = ctx.assertions.get(id);
            chain.push(ChainLink {
                rrset: node.rrset.clone(),
                status: node.status,
            });
            cursor = node.trust;
        }

        out.results.push(ValidatedResult {
            status: res.status,
            trusted: res.trusted,
            chain,
        });
    }

    out
}
