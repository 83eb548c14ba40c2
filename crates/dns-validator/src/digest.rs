//! The response digester: turn a received message into classified
//! RRsets, follow referrals and alias chains, keep the zone cut
//! honest, and stow everything the response taught us into the cache.

use dns_types::protocol::types::*;

use crate::cache::SharedCache;
use crate::policy::Policy;
use crate::query::{QueryChain, QueryId, QueryState};
use crate::rrset::{group_rrsets, FromSection, RRset};
use crate::status::DnsErrorKind;

/// A response reduced to what assimilation needs: the alias chain
/// (most recent name first), the classified RRsets, and the response
/// code.
#[derive(Debug, Clone)]
pub struct DigestedResponse {
    pub qnames: Vec<DomainName>,
    pub rrsets: Vec<RRset>,
    pub rcode: Rcode,
}

impl DigestedResponse {
    /// The minimal response `ask_cache` synthesizes from a cache hit:
    /// a single RRset and a qname chain of one.
    pub fn synthetic(qname: DomainName, set: RRset) -> Self {
        Self {
            qnames: vec![qname],
            rrsets: vec![set],
            rcode: Rcode::NoError,
        }
    }
}

/// What digesting did with the response.
#[derive(Debug)]
pub enum DigestOutcome {
    /// The response answers the query (positively or negatively);
    /// assimilate it.
    Answer(DigestedResponse),
    /// The query was re-queued (referral followed, alias chased, or
    /// glue requested) or moved to an error state; there is nothing to
    /// assimilate yet.
    Requeued,
}

/// Digest one received message for the given query.
///
/// This updates the query's state, referral block, and zone cut, may
/// add subordinate queries (glue fetches, parallel DNSSEC metadata
/// fetches), and stows everything cacheable.
pub fn digest_response(
    queries: &mut QueryChain,
    id: QueryId,
    cache: &SharedCache,
    policy: &Policy,
    response: &Message,
) -> DigestOutcome {
    let (qname, qtype_record, rclass) = {
        let query = queries.get(id);
        (query.name.clone(), query.rtype, query.rclass)
    };
    let qtype = QueryType::Record(qtype_record);

    let mut answers = group_rrsets(&response.answers, FromSection::Answer);
    let mut authority = group_rrsets(&response.authority, FromSection::Authority);
    let additional = group_rrsets(&response.additional, FromSection::Additional);

    if answers.is_empty() && authority.is_empty() && additional.is_empty() {
        tracing::debug!(%qname, "response carries no records");
        queries.get_mut(id).state = QueryState::Error(DnsErrorKind::NoAnswer);
        return DigestOutcome::Requeued;
    }

    // the alias chain so far, most recent name first
    let mut qnames: Vec<DomainName> = queries
        .get(id)
        .referral
        .as_ref()
        .map(|r| r.qnames.clone())
        .unwrap_or_default();
    if qnames.is_empty() {
        qnames.push(qname.clone());
    }

    // walk CNAMEs (and DNAMEs) in the answer, extending the chain
    let mut alias_error = false;
    let mut progressed = true;
    while progressed {
        progressed = false;
        let head = qnames[0].clone();

        for set in &answers {
            match set.records.first() {
                Some(RecordTypeWithData::CNAME { cname })
                    if set.name == head
                        && qtype_record != RecordType::CNAME
                        && qtype_record != RecordType::RRSIG =>
                {
                    if qnames.contains(cname) {
                        alias_error = true;
                    } else {
                        let zone_cut = queries.get(id).zone_cut.clone();
                        if !queries
                            .get_mut(id)
                            .referral_mut()
                            .register(cname, qtype_record, zone_cut.as_ref())
                        {
                            tracing::debug!(target = %cname, "alias chased twice");
                            alias_error = true;
                        } else {
                            tracing::trace!(%head, target = %cname, "following CNAME");
                            qnames.insert(0, cname.clone());
                            progressed = true;
                        }
                    }
                }
                Some(RecordTypeWithData::DNAME { target })
                    if qtype_record != RecordType::DNAME
                        && head != set.name
                        && head.is_subdomain_of(&set.name) =>
                {
                    match synthesize_dname(&head, &set.name, target) {
                        Some(synthesized) if !qnames.contains(&synthesized) => {
                            let zone_cut = queries.get(id).zone_cut.clone();
                            if !queries.get_mut(id).referral_mut().register(
                                &synthesized,
                                qtype_record,
                                zone_cut.as_ref(),
                            ) {
                                alias_error = true;
                            } else {
                                tracing::trace!(%head, target = %synthesized, "following DNAME");
                                qnames.insert(0, synthesized);
                                progressed = true;
                            }
                        }
                        Some(_) => alias_error = true,
                        None => {
                            tracing::debug!(owner = %set.name, "DNAME synthesis exceeds name length");
                            alias_error = true;
                        }
                    }
                }
                _ => (),
            }
            if progressed || alias_error {
                break;
            }
        }

        if alias_error {
            queries.get_mut(id).state = QueryState::Error(DnsErrorKind::ReferralError);
            return DigestOutcome::Requeued;
        }
    }

    // classify the response as a whole
    let final_name = qnames[0].clone();
    let has_answer_for_final = answers
        .iter()
        .any(|set| set.name == final_name && set.rtype.matches(&qtype));
    let authority_has_ns = authority.iter().any(|set| set.rtype == RecordType::NS);
    let authority_has_negative = authority.iter().any(|set| {
        matches!(
            set.rtype,
            RecordType::SOA | RecordType::NSEC | RecordType::NSEC3
        )
    });

    // compute and check the zone cut
    let zone_cut = match compute_zone_cut(queries.get(id).zone_cut.as_ref(), &answers, &authority) {
        Ok(cut) => cut,
        Err(()) => {
            tracing::debug!(%qname, "conflicting zone cuts in one response");
            queries.get_mut(id).state = QueryState::Error(DnsErrorKind::ConflictingAnswers);
            return DigestOutcome::Requeued;
        }
    };
    if let Some(cut) = &zone_cut {
        queries.get_mut(id).zone_cut = Some(cut.clone());
        // retroactively apply to every set assembled from this message
        for set in answers.iter_mut().chain(authority.iter_mut()) {
            set.zone_cut = Some(cut.clone());
        }
    }

    // set the authoritative flag now the chain head is final
    for set in answers.iter_mut().chain(authority.iter_mut()) {
        set.authoritative = response.header.is_authoritative && set.name == final_name;
    }

    // referral: no answers, a delegation in authority, no negative
    // material
    if response.answers.is_empty() && authority_has_ns && !authority_has_negative {
        return follow_referral(queries, id, cache, policy, qnames, &authority, &additional);
    }

    // stow what the response taught us
    stow_learned(cache, &qname, qtype_record, rclass, response.header.rcode, &answers, &authority, &additional, zone_cut.as_ref());

    // alias chain with no final answer: re-queue for the new name
    if !response.answers.is_empty() && !has_answer_for_final && qnames.len() > 1 {
        let query = queries.get_mut(id);
        let referral = query.referral_mut();
        for set in answers {
            if !referral.answers.iter().any(|existing| {
                existing.rtype == set.rtype && existing.name == set.name
            }) {
                referral.answers.push(set);
            }
        }
        referral.qnames.clone_from(&qnames);
        query.name = final_name;
        query.state = QueryState::Init;
        query.nameservers = None;
        tracing::debug!(name = %query.name, "re-queueing query for alias target");
        return DigestOutcome::Requeued;
    }

    // a full answer (positive or negative): merge in anything
    // accumulated while chasing aliases
    let mut rrsets = queries
        .get_mut(id)
        .referral
        .take()
        .map(|r| r.answers)
        .unwrap_or_default();
    rrsets.extend(answers);
    for set in authority {
        if matches!(
            set.rtype,
            RecordType::SOA | RecordType::NSEC | RecordType::NSEC3
        ) {
            rrsets.push(set);
        }
    }

    DigestOutcome::Answer(DigestedResponse {
        qnames,
        rrsets,
        rcode: response.header.rcode,
    })
}

/// DNAME synthesis (RFC 6672 section 2.2): the labels of `head` below
/// the DNAME owner, prepended to the DNAME target.
fn synthesize_dname(
    head: &DomainName,
    owner: &DomainName,
    target: &DomainName,
) -> Option<DomainName> {
    let prefix_len = head.labels.len().checked_sub(owner.labels.len())?;
    let mut labels = head.labels[..prefix_len].to_vec();
    labels.extend(target.labels.iter().cloned());
    DomainName::from_labels(labels)
}

/// The zone cut named by this response: a SOA owner in authority wins,
/// else the most specific NS owner.  Two disagreeing SOAs, or NS
/// owners which are not in an ancestor line, are a conflict.
fn compute_zone_cut(
    current: Option<&DomainName>,
    answers: &[RRset],
    authority: &[RRset],
) -> Result<Option<DomainName>, ()> {
    let mut soa_owner: Option<DomainName> = None;
    for set in authority.iter().chain(answers.iter()) {
        if set.rtype == RecordType::SOA {
            match &soa_owner {
                Some(existing) if *existing != set.name => return Err(()),
                _ => soa_owner = Some(set.name.clone()),
            }
        }
    }

    let mut ns_owner: Option<DomainName> = None;
    for set in authority {
        if set.rtype == RecordType::NS {
            match &ns_owner {
                Some(existing) if *existing != set.name => {
                    // keep the more specific owner if one encloses the
                    // other; anything else is a conflict
                    if set.name.is_subdomain_of(existing) {
                        ns_owner = Some(set.name.clone());
                    } else if !existing.is_subdomain_of(&set.name) {
                        return Err(());
                    }
                }
                Some(_) => (),
                None => ns_owner = Some(set.name.clone()),
            }
        }
    }

    let new_cut = soa_owner.or(ns_owner);
    match (current, new_cut) {
        (_, None) => Ok(current.cloned()),
        (None, Some(cut)) => Ok(Some(cut)),
        (Some(old), Some(cut)) => {
            // only a more specific zone cut replaces the current one
            if cut.is_subdomain_of(old) {
                Ok(Some(cut))
            } else {
                Ok(Some(old.clone()))
            }
        }
    }
}

/// Route the response's sets into the cache partitions.
#[allow(clippy::too_many_arguments)]
fn stow_learned(
    cache: &SharedCache,
    qname: &DomainName,
    qtype: RecordType,
    rclass: RecordClass,
    rcode: Rcode,
    answers: &[RRset],
    authority: &[RRset],
    additional: &[RRset],
    zone_cut: Option<&DomainName>,
) {
    let mut plain = Vec::new();
    let mut keys = Vec::new();
    let mut ds = Vec::new();
    let mut proofs = Vec::new();

    for set in answers {
        match set.rtype {
            RecordType::DNSKEY => keys.push(set.clone()),
            RecordType::DS => ds.push(set.clone()),
            _ => plain.push(set.clone()),
        }
    }
    for set in authority {
        match set.rtype {
            RecordType::SOA | RecordType::NSEC | RecordType::NSEC3 => proofs.push(set.clone()),
            _ => (),
        }
    }

    cache.stow_answers(&plain);
    cache.stow_key_info(&keys);
    cache.stow_ds_info(&ds);
    if answers.is_empty() && !proofs.is_empty() {
        cache.stow_negative_answers(qname, rclass, qtype, rcode, &proofs);
    }

    if let Some(cut) = zone_cut {
        let ns_sets: Vec<RRset> = authority
            .iter()
            .filter(|set| set.rtype == RecordType::NS)
            .cloned()
            .collect();
        cache.stow_zone_info(cut, &ns_sets, additional);
    }
}

/// Handle a delegation: register it with the referral monitor, find
/// addresses for the new nameservers (requesting glue if the response
/// had none), and put the query back to `Init`.
fn follow_referral(
    queries: &mut QueryChain,
    id: QueryId,
    cache: &SharedCache,
    policy: &Policy,
    qnames: Vec<DomainName>,
    authority: &[RRset],
    additional: &[RRset],
) -> DigestOutcome {
    let (qname, qtype, rclass) = {
        let query = queries.get(id);
        (query.name.clone(), query.rtype, query.rclass)
    };

    // the delegation owner is the referral zone
    let Some(ns_set) = authority.iter().find(|set| set.rtype == RecordType::NS) else {
        queries.get_mut(id).state = QueryState::Error(DnsErrorKind::ReferralError);
        return DigestOutcome::Requeued;
    };
    let referral_zone = ns_set.name.clone();

    tracing::debug!(%qname, zone = %referral_zone, "following referral");

    {
        let query = queries.get_mut(id);
        let referral = query.referral_mut();
        referral.qnames = qnames;
        if !referral.register(&qname, qtype, Some(&referral_zone)) {
            tracing::debug!(%qname, zone = %referral_zone, "referral seen twice");
            query.state = QueryState::Error(DnsErrorKind::ReferralError);
            return DigestOutcome::Requeued;
        }
    }

    cache.stow_zone_info(&referral_zone, std::slice::from_ref(ns_set), additional);

    // fetch DNSSEC metadata for the new zone in parallel, if policy
    // expects it to validate
    if policy.expectation_for(&referral_zone) == crate::policy::ZoneExpectation::Validate {
        queries.add(&referral_zone, rclass, RecordType::DNSKEY);
        queries.add(&referral_zone, rclass, RecordType::DS);
    }

    // use the freshly stowed NS set (with glue) if it is usable
    if let Some((list, _)) = cache.get_nameservers_for_zone(&qname, policy) {
        if list.servers.iter().any(|s| !s.addresses.is_empty()) {
            let query = queries.get_mut(id);
            query.zone_cut = Some(referral_zone);
            query.nameservers = Some(list);
            query.state = QueryState::Init;
            return DigestOutcome::Requeued;
        }
    }

    // glueless delegation: fetch an address for the first nameserver
    let Some(RecordTypeWithData::NS { nsdname }) = ns_set.records.first() else {
        queries.get_mut(id).state = QueryState::Error(DnsErrorKind::MissingGlue);
        return DigestOutcome::Requeued;
    };
    let glue_id = queries.add(nsdname, rclass, RecordType::A);
    queries.get_mut(glue_id).glue_request = true;

    let query = queries.get_mut(id);
    query.zone_cut = Some(referral_zone);
    query.referral_mut().glue_query = Some(glue_id);
    query.state = QueryState::WaitForGlue;
    tracing::debug!(nameserver = %nsdname, "delegation came without glue");

    DigestOutcome::Requeued
}
