//! The authentication chain: one assertion per RRset, linked to the
//! sibling sets that arrived in the same response and to the pending
//! query whose answer each set is waiting for.
//!
//! Assertions live in an arena; `trust` and `rrset_next` are indices,
//! which keeps the cycle-prone dependency graph free of owning
//! pointers (malformed data can make the chain of trust loop, and the
//! validator must detect that rather than leak or crash).

use dns_types::protocol::types::*;

use crate::digest::DigestedResponse;
use crate::policy::{AnchorMatch, Policy, ZoneExpectation};
use crate::query::{AssertionId, QueryChain, QueryId, QueryState};
use crate::rrset::{fails_to_answer_query, AnswerKindOutcome, RRset, RrsetKind};
use crate::status::{AssertionStatus, DnsErrorKind};

/// One node of the authentication chain.
#[derive(Debug)]
pub struct Assertion {
    pub rrset: RRset,
    /// The query whose answer this assertion needs next (its RRSIG,
    /// the signer's DNSKEY, or the signer's DS); `None` when
    /// self-sufficient.
    pub pending_query: Option<QueryId>,
    pub status: AssertionStatus,
    /// The parent in the chain of trust: the assertion holding the
    /// keys that sign this one.
    pub trust: Option<AssertionId>,
    /// The next sibling RRset from the same response.
    pub rrset_next: Option<AssertionId>,
}

/// The arena of assertions for one `resolve_and_check` call.
#[derive(Debug, Default)]
pub struct AssertionChain {
    nodes: Vec<Assertion>,
}

impl AssertionChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: AssertionId) -> &Assertion {
        &self.nodes[id]
    }

    pub fn get_mut(&mut self, id: AssertionId) -> &mut Assertion {
        &mut self.nodes[id]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Add one assertion per RRset, linking them as siblings.
    /// Returns the head, or `None` for an empty set.
    pub fn add_rrsets(&mut self, rrsets: Vec<RRset>) -> Option<AssertionId> {
        let mut head = None;
        let mut prev: Option<AssertionId> = None;

        for rrset in rrsets {
            self.nodes.push(Assertion {
                rrset,
                pending_query: None,
                status: AssertionStatus::Init,
                trust: None,
                rrset_next: None,
            });
            let id = self.nodes.len() - 1;

            if let Some(prev_id) = prev {
                self.nodes[prev_id].rrset_next = Some(id);
            } else {
                head = Some(id);
            }
            prev = Some(id);
        }

        head
    }

    /// The assertion and its siblings, head first.
    pub fn siblings(&self, head: AssertionId) -> Vec<AssertionId> {
        let mut ids = Vec::new();
        let mut cursor = Some(head);
        while let Some(id) = cursor {
            ids.push(id);
            cursor = self.nodes[id].rrset_next;
        }
        ids
    }
}

/// Read a digested response and create assertions for it, setting the
/// state of each based on what data is available and what must be
/// fetched before validation can proceed.
pub fn assimilate_answers(
    chain: &mut AssertionChain,
    queries: &mut QueryChain,
    policy: &Policy,
    response: DigestedResponse,
    query_id: QueryId,
    dont_validate: bool,
) {
    if queries.get(query_id).assertion.is_some() {
        // we already had an assertion for this query
        return;
    }

    let qtype = QueryType::Record(queries.get(query_id).rtype);
    let qclass = QueryClass::Record(queries.get(query_id).rclass);
    let glue_request = queries.get(query_id).glue_request;

    if response.rrsets.is_empty() {
        queries.get_mut(query_id).state = QueryState::Error(DnsErrorKind::NoAnswer);
        return;
    }

    let Some(head) = chain.add_rrsets(response.rrsets) else {
        queries.get_mut(query_id).state = QueryState::Error(DnsErrorKind::NoAnswer);
        return;
    };
    queries.get_mut(query_id).assertion = Some(head);

    let mut saw_bare_rrsig = false;
    let mut saw_other = false;

    for id in chain.siblings(head) {
        let assertion = chain.get_mut(id);

        let outcome = assertion
            .rrset
            .set_answer_kind(&response.qnames[0], qtype);
        if outcome == AnswerKindOutcome::WrongAnswer {
            assertion.status = AssertionStatus::DnsError(DnsErrorKind::WrongAnswer);
            continue;
        }

        if let Some(status) =
            fails_to_answer_query(&assertion.rrset, &response.qnames, qtype, qclass)
        {
            assertion.status = status;
            continue;
        }

        // bare RRSIGs only ever travel alone
        match assertion.rrset.kind {
            RrsetKind::BareRrsig => saw_bare_rrsig = true,
            _ => saw_other = true,
        }
        if saw_bare_rrsig && saw_other {
            tracing::debug!("bare RRSIG mixed with other answer kinds");
            queries.get_mut(query_id).state =
                QueryState::Error(DnsErrorKind::ConflictingAnswers);
        }

        if dont_validate {
            chain.get_mut(id).status = AssertionStatus::DontValidate;
        } else if !glue_request {
            build_pending_query(chain, queries, policy, id);
        }
    }
}

/// Work out what an assertion needs next, setting its status and
/// possibly adding one query to the chain.
pub fn build_pending_query(
    chain: &mut AssertionChain,
    queries: &mut QueryChain,
    policy: &Policy,
    id: AssertionId,
) {
    let assertion = chain.get_mut(id);
    let rclass = assertion.rrset.rclass;

    if assertion.rrset.kind == RrsetKind::BareRrsig {
        assertion.status = AssertionStatus::BareRrsig;
        return;
    }

    if assertion.rrset.records.is_empty() {
        assertion.status = AssertionStatus::DataMissing;
        return;
    }

    // local policy may settle this zone without DNSSEC
    match policy.expectation_for(&assertion.rrset.name) {
        ZoneExpectation::Untrust => {
            tracing::debug!(owner = %assertion.rrset.name, "zone is locally untrusted");
            assertion.status = AssertionStatus::UntrustedZone;
            return;
        }
        ZoneExpectation::Skip => {
            tracing::debug!(owner = %assertion.rrset.name, "skipping DNSSEC for zone");
            assertion.status = AssertionStatus::TrustZone;
            return;
        }
        ZoneExpectation::Validate => (),
    }

    if assertion.rrset.sigs.is_empty() {
        assertion.status = AssertionStatus::WaitForRrsig;
        let owner = assertion.rrset.name.clone();
        let pending = queries.add(&owner, rclass, RecordType::RRSIG);
        chain.get_mut(id).pending_query = Some(pending);
        return;
    }

    // the signer name in the RRSIG identifies whose DNSKEY made it
    let signer = assertion.rrset.sigs[0].signer.clone();

    if assertion.rrset.rtype == RecordType::DNSKEY {
        match policy.match_anchor(&signer, &assertion.rrset.records) {
            AnchorMatch::Trusted => {
                tracing::debug!(zone = %signer, "key set matches a trust anchor");
                assertion.status = AssertionStatus::TrustKey;
            }
            AnchorMatch::HopeAbove => {
                assertion.status = AssertionStatus::WaitForTrust;
                let pending = queries.add(&signer, rclass, RecordType::DS);
                chain.get_mut(id).pending_query = Some(pending);
            }
            AnchorMatch::None => {
                tracing::debug!(
                    zone = %signer,
                    "no trust anchor at or above the chain of trust"
                );
                assertion.status = AssertionStatus::NoTrustAnchor;
            }
        }
    } else {
        assertion.status = AssertionStatus::WaitForTrust;
        let pending = queries.add(&signer, rclass, RecordType::DNSKEY);
        chain.get_mut(id).pending_query = Some(pending);
    }
}

#[cfg(test)]
mod tests {
    use dns_types::protocol::types::test_util::*;
    use std::net::Ipv4Addr;

    use super::*;
    use crate::policy::TrustAnchor;
    use crate::rrset::FromSection;
    use crate::test_util::*;

    fn assimilate_one(
        policy: &Policy,
        qname: &str,
        qtype: RecordType,
        rrsets: Vec<RRset>,
    ) -> (AssertionChain, QueryChain, QueryId) {
        let mut chain = AssertionChain::new();
        let mut queries = QueryChain::new();
        let id = queries.add(&domain(qname), RecordClass::IN, qtype);
        queries.get_mut(id).state = QueryState::Answered;

        let response = DigestedResponse {
            qnames: vec![domain(qname)],
            rrsets,
            rcode: Rcode::NoError,
        };
        assimilate_answers(&mut chain, &mut queries, policy, response, id, false);
        (chain, queries, id)
    }

    #[test]
    fn assimilate_links_query_and_siblings() {
        let rrsets = vec![
            rrset_from(
                &[a_record("www.example.test.", Ipv4Addr::new(1, 1, 1, 1))],
                FromSection::Answer,
            ),
            rrset_from(&[soa_record("example.test.")], FromSection::Authority),
        ];
        let (chain, queries, id) =
            assimilate_one(&Policy::new(), "www.example.test.", RecordType::A, rrsets);

        let head = queries.get(id).assertion.unwrap();
        assert_eq!(2, chain.siblings(head).len());
    }

    #[test]
    fn unsigned_rrset_waits_for_rrsig() {
        let rrsets = vec![rrset_from(
            &[a_record("www.example.test.", Ipv4Addr::new(1, 1, 1, 1))],
            FromSection::Answer,
        )];
        let (chain, queries, id) =
            assimilate_one(&Policy::new(), "www.example.test.", RecordType::A, rrsets);

        let head = queries.get(id).assertion.unwrap();
        let assertion = chain.get(head);
        assert_eq!(AssertionStatus::WaitForRrsig, assertion.status);

        let pending = assertion.pending_query.unwrap();
        let pending_query = queries.get(pending);
        assert_eq!(domain("www.example.test."), pending_query.name);
        assert_eq!(RecordType::RRSIG, pending_query.rtype);
    }

    #[test]
    fn signed_rrset_waits_for_signer_dnskey() {
        let (set, _) = signed_a_rrset("www.example.test.", "example.test.");
        let (chain, queries, id) =
            assimilate_one(&Policy::new(), "www.example.test.", RecordType::A, vec![set]);

        let head = queries.get(id).assertion.unwrap();
        let assertion = chain.get(head);
        assert_eq!(AssertionStatus::WaitForTrust, assertion.status);

        let pending = assertion.pending_query.unwrap();
        let pending_query = queries.get(pending);
        assert_eq!(domain("example.test."), pending_query.name);
        assert_eq!(RecordType::DNSKEY, pending_query.rtype);
    }

    #[test]
    fn dnskey_matching_anchor_is_trust_key() {
        let (keys, _) = signed_dnskey_rrset("example.test.");

        let mut policy = Policy::new();
        policy.add_trust_anchor(TrustAnchor {
            zone: domain("example.test."),
            key: keys.records[0].clone(),
        });

        let (chain, queries, id) = assimilate_one(
            &policy,
            "example.test.",
            RecordType::DNSKEY,
            vec![keys],
        );

        let head = queries.get(id).assertion.unwrap();
        assert_eq!(AssertionStatus::TrustKey, chain.get(head).status);
        assert_eq!(None, chain.get(head).pending_query);
    }

    #[test]
    fn dnskey_with_anchor_above_waits_for_ds() {
        let (keys, _) = signed_dnskey_rrset("example.test.");

        let mut policy = Policy::new();
        policy.add_trust_anchor(TrustAnchor {
            zone: domain("test."),
            key: dnskey_record("test.", b"anchor key").rtype_with_data,
        });

        let (chain, queries, id) = assimilate_one(
            &policy,
            "example.test.",
            RecordType::DNSKEY,
            vec![keys],
        );

        let head = queries.get(id).assertion.unwrap();
        let assertion = chain.get(head);
        assert_eq!(AssertionStatus::WaitForTrust, assertion.status);

        let pending = assertion.pending_query.unwrap();
        assert_eq!(RecordType::DS, queries.get(pending).rtype);
        assert_eq!(domain("example.test."), queries.get(pending).name);
    }

    #[test]
    fn dnskey_with_no_anchor_anywhere() {
        let (keys, _) = signed_dnskey_rrset("example.test.");
        let (chain, queries, id) = assimilate_one(
            &Policy::new(),
            "example.test.",
            RecordType::DNSKEY,
            vec![keys],
        );

        let head = queries.get(id).assertion.unwrap();
        assert_eq!(AssertionStatus::NoTrustAnchor, chain.get(head).status);
    }

    #[test]
    fn skip_zone_is_trust_zone() {
        let mut policy = Policy::new();
        policy.add_expectation(domain("example.test."), ZoneExpectation::Skip);

        let rrsets = vec![rrset_from(
            &[a_record("www.example.test.", Ipv4Addr::new(1, 1, 1, 1))],
            FromSection::Answer,
        )];
        let (chain, queries, id) =
            assimilate_one(&policy, "www.example.test.", RecordType::A, rrsets);

        let head = queries.get(id).assertion.unwrap();
        assert_eq!(AssertionStatus::TrustZone, chain.get(head).status);
    }

    #[test]
    fn untrusted_zone_is_flagged() {
        let mut policy = Policy::new();
        policy.add_expectation(domain("example.test."), ZoneExpectation::Untrust);

        let rrsets = vec![rrset_from(
            &[a_record("www.example.test.", Ipv4Addr::new(1, 1, 1, 1))],
            FromSection::Answer,
        )];
        let (chain, queries, id) =
            assimilate_one(&policy, "www.example.test.", RecordType::A, rrsets);

        let head = queries.get(id).assertion.unwrap();
        assert_eq!(AssertionStatus::UntrustedZone, chain.get(head).status);
    }

    #[test]
    fn bare_rrsig_mixed_with_data_conflicts() {
        let bare = rrset_from(
            &[rrsig_record(
                "www.example.test.",
                RecordType::TXT,
                3,
                "example.test.",
            )],
            FromSection::Answer,
        );
        let data = rrset_from(
            &[a_record("www.example.test.", Ipv4Addr::new(1, 1, 1, 1))],
            FromSection::Answer,
        );

        let (_, queries, id) = assimilate_one(
            &Policy::new(),
            "www.example.test.",
            RecordType::A,
            vec![bare, data],
        );

        assert_eq!(
            QueryState::Error(DnsErrorKind::ConflictingAnswers),
            queries.get(id).state
        );
    }

    #[test]
    fn straight_with_nack_is_permitted() {
        // a wildcard NODATA response carries both answer data and
        // proof material
        let (set, _) = signed_a_rrset("www.example.test.", "example.test.");
        let soa = rrset_from(&[soa_record("example.test.")], FromSection::Authority);

        let (_, queries, id) = assimilate_one(
            &Policy::new(),
            "www.example.test.",
            RecordType::A,
            vec![set, soa],
        );

        assert_eq!(QueryState::Answered, queries.get(id).state);
    }

    #[test]
    fn dont_validate_short_circuits() {
        let mut chain = AssertionChain::new();
        let mut queries = QueryChain::new();
        let id = queries.add(&domain("www.example.test."), RecordClass::IN, RecordType::A);

        let response = DigestedResponse {
            qnames: vec![domain("www.example.test.")],
            rrsets: vec![rrset_from(
                &[a_record("www.example.test.", Ipv4Addr::new(1, 1, 1, 1))],
                FromSection::Answer,
            )],
            rcode: Rcode::NoError,
        };
        assimilate_answers(&mut chain, &mut queries, &Policy::new(), response, id, true);

        let head = queries.get(id).assertion.unwrap();
        assert_eq!(AssertionStatus::DontValidate, chain.get(head).status);
        assert_eq!(1, queries.len());
    }

    #[test]
    fn glue_requests_are_not_validated() {
        let mut chain = AssertionChain::new();
        let mut queries = QueryChain::new();
        let id = queries.add(&domain("ns1.example.test."), RecordClass::IN, RecordType::A);
        queries.get_mut(id).glue_request = true;

        let response = DigestedResponse {
            qnames: vec![domain("ns1.example.test.")],
            rrsets: vec![rrset_from(
                &[a_record("ns1.example.test.", Ipv4Addr::new(10, 0, 0, 1))],
                FromSection::Answer,
            )],
            rcode: Rcode::NoError,
        };
        assimilate_answers(&mut chain, &mut queries, &Policy::new(), response, id, false);

        let head = queries.get(id).assertion.unwrap();
        assert_eq!(AssertionStatus::Init, chain.get(head).status);
        // no RRSIG query was created
        assert_eq!(1, queries.len());
    }
}
