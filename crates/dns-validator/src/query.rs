//! The query chain: every question the resolver currently has in
//! flight, including the subordinate questions validation creates for
//! missing RRSIGs, DNSKEYs, and DS records.
//!
//! Queries live in an arena and refer to each other by index, so the
//! dependency graph between queries, assertions, and referral glue
//! never needs owning pointers.

use rand::Rng;
use std::collections::HashSet;
use std::net::SocketAddr;

use dns_types::protocol::types::*;

use crate::policy::NameserverList;
use crate::rrset::RRset;
use crate::status::DnsErrorKind;

/// Index of a query in its chain.
pub type QueryId = usize;

/// Index of an assertion in the authentication chain arena.
pub type AssertionId = usize;

/// Where a query is in its lifecycle.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum QueryState {
    /// Not yet dispatched (or re-queued after a referral).
    Init,
    /// Sent; awaiting a response.
    Sent,
    /// Blocked on a glue fetch for a delegation.
    WaitForGlue,
    /// A response has been digested and assimilated.
    Answered,
    /// The query failed.
    Error(DnsErrorKind),
}

impl QueryState {
    pub fn is_error(&self) -> bool {
        matches!(self, QueryState::Error(_))
    }

    pub fn is_finished(&self) -> bool {
        matches!(self, QueryState::Answered | QueryState::Error(_))
    }
}

/// An in-flight delegation or alias chase.
#[derive(Debug, Default)]
pub struct ReferralBlock {
    /// Answer RRsets accumulated while walking aliases; merged into
    /// the final response when it arrives.
    pub answers: Vec<RRset>,
    /// The alias chain, most recent name first.
    pub qnames: Vec<DomainName>,
    /// Every `(name, type, zone cut)` this referral has chased.
    /// Registering the same triple twice is a loop.
    registered: HashSet<(DomainName, RecordType, Option<DomainName>)>,
    /// The subordinate query fetching nameserver addresses, when the
    /// delegation came without glue.
    pub glue_query: Option<QueryId>,
}

impl ReferralBlock {
    /// Record that this referral is now chasing `(name, rtype)` in
    /// `zone_cut`.  Returns `false` when that exact request was
    /// already made, which means the servers have sent us in a loop.
    pub fn register(
        &mut self,
        name: &DomainName,
        rtype: RecordType,
        zone_cut: Option<&DomainName>,
    ) -> bool {
        self.registered
            .insert((name.clone(), rtype, zone_cut.cloned()))
    }
}

/// One outstanding question.
#[derive(Debug)]
pub struct QueryNode {
    pub name: DomainName,
    pub rtype: RecordType,
    pub rclass: RecordClass,
    pub state: QueryState,
    /// Owner of the closest known enclosing zone.
    pub zone_cut: Option<DomainName>,
    pub nameservers: Option<NameserverList>,
    /// The server which produced the accepted response.
    pub respondent: Option<SocketAddr>,
    pub referral: Option<ReferralBlock>,
    /// Head of the assertions created from this query's answer.
    pub assertion: Option<AssertionId>,
    /// Set on subordinate queries fetching delegation glue: their
    /// answers are not validated.
    pub glue_request: bool,
    /// The response code of the digested answer, kept for negative
    /// proof classification.
    pub response_rcode: Option<Rcode>,
    pub transaction_id: u16,
}

impl QueryNode {
    pub fn referral_mut(&mut self) -> &mut ReferralBlock {
        self.referral.get_or_insert_with(ReferralBlock::default)
    }
}

/// The arena of queries for one `resolve_and_check` call.
#[derive(Debug, Default)]
pub struct QueryChain {
    nodes: Vec<QueryNode>,
}

impl QueryChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a query for `(name, class, type)`, or return the existing
    /// one: asking the same question twice within a call would create
    /// cycles between assertions and their pending queries.
    pub fn add(&mut self, name: &DomainName, rclass: RecordClass, rtype: RecordType) -> QueryId {
        if let Some(id) = self.find(name, rclass, rtype) {
            return id;
        }

        tracing::debug!(%name, %rtype, "adding query to chain");
        self.nodes.push(QueryNode {
            name: name.clone(),
            rtype,
            rclass,
            state: QueryState::Init,
            zone_cut: None,
            nameservers: None,
            respondent: None,
            referral: None,
            assertion: None,
            glue_request: false,
            response_rcode: None,
            transaction_id: rand::thread_rng().gen(),
        });
        self.nodes.len() - 1
    }

    pub fn find(
        &self,
        name: &DomainName,
        rclass: RecordClass,
        rtype: RecordType,
    ) -> Option<QueryId> {
        self.nodes
            .iter()
            .position(|q| q.rtype == rtype && q.rclass == rclass && q.name == *name)
    }

    pub fn get(&self, id: QueryId) -> &QueryNode {
        &self.nodes[id]
    }

    pub fn get_mut(&mut self, id: QueryId) -> &mut QueryNode {
        &mut self.nodes[id]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn ids(&self) -> std::ops::Range<QueryId> {
        0..self.nodes.len()
    }
}

#[cfg(test)]
mod tests {
    use dns_types::protocol::types::test_util::*;

    use super::*;

    #[test]
    fn add_deduplicates_questions() {
        let mut chain = QueryChain::new();
        let a = chain.add(&domain("example.test."), RecordClass::IN, RecordType::A);
        let b = chain.add(&domain("example.test."), RecordClass::IN, RecordType::A);
        let c = chain.add(
            &domain("example.test."),
            RecordClass::IN,
            RecordType::DNSKEY,
        );

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(2, chain.len());
    }

    #[test]
    fn referral_registration_detects_loops() {
        let mut referral = ReferralBlock::default();
        let zone = domain("test.");

        assert!(referral.register(&domain("www.example.test."), RecordType::A, Some(&zone)));
        assert!(!referral.register(&domain("www.example.test."), RecordType::A, Some(&zone)));

        // a different zone cut is a different chase, not a loop
        assert!(referral.register(
            &domain("www.example.test."),
            RecordType::A,
            Some(&domain("example.test."))
        ));
    }
}
