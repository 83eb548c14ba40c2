//! The resolver driver: probe the cache for every pending question,
//! dispatch what remains to nameservers, digest and assimilate what
//! comes back, and alternate with the validator until the top query
//! reaches a terminal state.

use async_recursion::async_recursion;
use async_trait::async_trait;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::{TcpStream, UdpSocket};
use tokio::time::timeout;

use dns_types::protocol::types::*;

use crate::assertion::assimilate_answers;
use crate::context::Context;
use crate::digest::{digest_response, DigestOutcome, DigestedResponse};
use crate::net::{send_tcp_bytes, send_udp_bytes};
use crate::policy::{NameserverList, ZoneExpectation};
use crate::query::{AssertionId, QueryChain, QueryId, QueryState};
use crate::status::{DnsErrorKind, ValStatus};
use crate::validate::{
    fix_validation_results, finalize_results, verify_and_validate, ChainLink, InterimResult,
    ResultChain, ValidatedResult,
};

/// The EDNS(0) payload size advertised on queries.
pub const EDNS_PAYLOAD_SIZE: u16 = 4096;

/// The nameserver port.
pub const DNS_PORT: u16 = 53;

/// An error that can occur when trying to resolve and validate a
/// question.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub enum ResolutionError {
    /// Resolution timed out and was aborted.
    Timeout,
}

impl std::fmt::Display for ResolutionError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            ResolutionError::Timeout => write!(f, "timed out"),
        }
    }
}

impl std::error::Error for ResolutionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        None
    }
}

/// An error from the wire-level transport.
#[derive(Debug)]
pub enum TransportError {
    /// The request could not be serialised.
    Serialise(dns_types::protocol::serialise::Error),
    /// No response arrived in time.
    Timeout,
    /// The network operation failed.
    IO(std::io::Error),
    /// A response arrived but did not parse, or did not match the
    /// request.
    BadResponse,
}

impl std::fmt::Display for TransportError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            TransportError::Serialise(error) => write!(f, "cannot serialise request: {error}"),
            TransportError::Timeout => write!(f, "request timed out"),
            TransportError::IO(error) => write!(f, "network error: {error}"),
            TransportError::BadResponse => write!(f, "response invalid or mismatched"),
        }
    }
}

impl std::error::Error for TransportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TransportError::IO(error) => Some(error),
            _ => None,
        }
    }
}

/// The wire-level send/receive contract.  Retry policy, socket
/// selection, and anything beyond a single exchange belongs to the
/// implementation.
#[async_trait]
pub trait ResolverTransport: Send + Sync {
    /// Send `request` to `address` and return the response.
    async fn exchange(
        &self,
        address: SocketAddr,
        request: &Message,
    ) -> Result<Message, TransportError>;
}

/// The default transport: UDP first, falling back to TCP when the
/// response is truncated or UDP fails outright.
#[derive(Debug, Clone)]
pub struct TokioTransport {
    pub timeout: Duration,
}

impl Default for TokioTransport {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5),
        }
    }
}

impl TokioTransport {
    async fn exchange_udp(
        &self,
        address: SocketAddr,
        serialised: &mut [u8],
    ) -> Result<Message, TransportError> {
        let attempt = async {
            let sock = UdpSocket::bind("0.0.0.0:0").await.map_err(TransportError::IO)?;
            sock.connect(address).await.map_err(TransportError::IO)?;
            send_udp_bytes(&sock, serialised)
                .await
                .map_err(TransportError::IO)?;

            let mut buf = vec![0u8; usize::from(EDNS_PAYLOAD_SIZE)];
            let len = sock.recv(&mut buf).await.map_err(TransportError::IO)?;
            Message::from_octets(&buf[..len]).map_err(|_| TransportError::BadResponse)
        };

        match timeout(self.timeout, attempt).await {
            Ok(result) => result,
            Err(_) => Err(TransportError::Timeout),
        }
    }

    async fn exchange_tcp(
        &self,
        address: SocketAddr,
        serialised: &mut [u8],
    ) -> Result<Message, TransportError> {
        let attempt = async {
            let mut stream = TcpStream::connect(address)
                .await
                .map_err(TransportError::IO)?;
            send_tcp_bytes(&mut stream, serialised)
                .await
                .map_err(TransportError::IO)?;
            read_tcp_message(&mut stream).await
        };

        match timeout(self.timeout, attempt).await {
            Ok(result) => result,
            Err(_) => Err(TransportError::Timeout),
        }
    }
}

/// Read one DNS message from a TCP stream: a big-endian u16 length
/// prefix, then exactly that many octets of message.  A short read or
/// a message that does not parse is a `TransportError` like any other
/// exchange failure.
async fn read_tcp_message(stream: &mut TcpStream) -> Result<Message, TransportError> {
    use tokio::io::AsyncReadExt;

    let expected = usize::from(stream.read_u16().await.map_err(TransportError::IO)?);
    let mut bytes = vec![0u8; expected];
    stream
        .read_exact(&mut bytes)
        .await
        .map_err(TransportError::IO)?;

    Message::from_octets(&bytes).map_err(|_| TransportError::BadResponse)
}

#[async_trait]
impl ResolverTransport for TokioTransport {
    async fn exchange(
        &self,
        address: SocketAddr,
        request: &Message,
    ) -> Result<Message, TransportError> {
        let serialised = request.to_octets().map_err(TransportError::Serialise)?;

        let mut udp_request = serialised.to_vec();
        match self.exchange_udp(address, &mut udp_request).await {
            Ok(response) if !response.header.is_truncated => return Ok(response),
            Ok(_) => tracing::trace!(%address, "truncated UDP response, retrying over TCP"),
            Err(error) => tracing::trace!(%address, %error, "UDP exchange failed, retrying over TCP"),
        }

        let mut tcp_request = serialised.to_vec();
        self.exchange_tcp(address, &mut tcp_request).await
    }
}

/// Very basic validation that a nameserver response matches the
/// request: ID, opcode, and question must agree, it must actually be
/// a response, and the response code must be usable.
pub fn response_matches_request(request: &Message, response: &Message) -> bool {
    if request.header.id != response.header.id {
        return false;
    }
    if !response.header.is_response {
        return false;
    }
    if request.header.opcode != response.header.opcode {
        return false;
    }
    if !(response.header.rcode == Rcode::NoError || response.header.rcode == Rcode::NameError) {
        return false;
    }
    if request.questions != response.questions {
        return false;
    }

    true
}

/// Merge a completed glue fetch back into the referral that was
/// waiting on it, making the blocked query runnable again.
pub(crate) fn merge_glue_in_referral(
    queries: &mut QueryChain,
    assertions: &crate::assertion::AssertionChain,
    id: QueryId,
) {
    if queries.get(id).state != QueryState::WaitForGlue {
        return;
    }
    let Some(glue_id) = queries.get(id).referral.as_ref().and_then(|r| r.glue_query) else {
        return;
    };

    match queries.get(glue_id).state {
        QueryState::Answered => {
            let glue_name = queries.get(glue_id).name.clone();
            let mut addresses = Vec::new();

            if let Some(head) = queries.get(glue_id).assertion {
                let mut walk: Option<AssertionId> = Some(head);
                while let Some(aid) = walk {
                    let set = &assertions.get(aid).rrset;
                    if set.name == glue_name {
                        for record in &set.records {
                            match record {
                                RecordTypeWithData::A { address } => {
                                    addresses.push(std::net::IpAddr::V4(*address));
                                }
                                RecordTypeWithData::AAAA { address } => {
                                    addresses.push(std::net::IpAddr::V6(*address));
                                }
                                _ => (),
                            }
                        }
                    }
                    walk = assertions.get(aid).rrset_next;
                }
            }

            if addresses.is_empty() {
                tracing::debug!(nameserver = %glue_name, "glue fetch produced no addresses");
                queries.get_mut(id).state = QueryState::Error(DnsErrorKind::MissingGlue);
                return;
            }

            let zone = queries
                .get(id)
                .zone_cut
                .clone()
                .unwrap_or_else(DomainName::root_domain);
            let query = queries.get_mut(id);
            query.nameservers = Some(NameserverList {
                zone: zone.clone(),
                servers: vec![crate::policy::Nameserver {
                    name: glue_name,
                    addresses,
                }],
            });
            if let Some(referral) = &mut query.referral {
                referral.glue_query = None;
            }
            query.state = QueryState::Init;
            tracing::debug!(zone = %zone, "merged glue into referral");
        }
        QueryState::Error(_) => {
            queries.get_mut(id).state = QueryState::Error(DnsErrorKind::MissingGlue);
        }
        _ => (),
    }
}

/// Scan all `INIT` queries for cache hits; for each, synthesize a
/// minimal response and assimilate it.  Repeats until a pass adds no
/// new queries, since new assertions can themselves add queries for
/// their RRSIG, DNSKEY, and DS needs.
pub(crate) fn ask_cache(ctx: &mut Context, dont_validate: bool) {
    let mut progressed = true;
    while progressed {
        progressed = false;

        for id in ctx.queries.ids() {
            if ctx.queries.get(id).state != QueryState::Init {
                continue;
            }

            let (name, rclass, rtype) = {
                let query = ctx.queries.get(id);
                (query.name.clone(), query.rclass, query.rtype)
            };
            tracing::debug!(%name, %rtype, "looking in the cache");

            if let Some(set) = ctx.cache.get_cached_rrset(&name, rclass, rtype) {
                tracing::debug!(%name, %rtype, "found cached data");
                ctx.metrics.cache_hit();
                ctx.queries.get_mut(id).state = QueryState::Answered;
                ctx.queries.get_mut(id).response_rcode = Some(Rcode::NoError);

                let response = DigestedResponse::synthetic(name, set);
                let policy = std::sync::Arc::clone(&ctx.policy);
                assimilate_answers(
                    &mut ctx.assertions,
                    &mut ctx.queries,
                    &policy,
                    response,
                    id,
                    dont_validate,
                );
                progressed = true;
            } else if let Some((rcode, proofs)) = ctx.cache.get_cached_proof(&name, rclass, rtype)
            {
                tracing::debug!(%name, %rtype, "found cached negative answer");
                ctx.metrics.cache_hit();
                ctx.queries.get_mut(id).state = QueryState::Answered;
                ctx.queries.get_mut(id).response_rcode = Some(rcode);

                let response = DigestedResponse {
                    qnames: vec![name],
                    rrsets: proofs,
                    rcode,
                };
                let policy = std::sync::Arc::clone(&ctx.policy);
                assimilate_answers(
                    &mut ctx.assertions,
                    &mut ctx.queries,
                    &policy,
                    response,
                    id,
                    dont_validate,
                );
                progressed = true;
            }
        }
    }
}

/// Pick the addresses to try for a query, most preferred first.
fn candidate_addresses(list: &NameserverList) -> Vec<SocketAddr> {
    let mut addresses = Vec::new();
    for server in &list.servers {
        for ip in &server.addresses {
            addresses.push(SocketAddr::new(*ip, DNS_PORT));
        }
    }
    addresses
}

/// Dispatch every `INIT` query to a nameserver and digest whatever
/// comes back.  With `block` set this keeps going until at least one
/// query completes (or nothing can make progress).
pub(crate) async fn ask_resolver(ctx: &mut Context, block: bool, dont_validate: bool) {
    loop {
        let mut answered = false;
        let mut dispatched = false;

        for id in ctx.queries.ids() {
            if ctx.queries.get(id).state != QueryState::Init {
                continue;
            }
            dispatched = true;

            // choose a nameserver list: closest cached zone cut, else
            // the configured list, else root hints
            if ctx.queries.get(id).nameservers.is_none() {
                let name = ctx.queries.get(id).name.clone();
                match ctx.cache.get_nameservers_for_zone(&name, &ctx.policy) {
                    Some((list, cut)) => {
                        let query = ctx.queries.get_mut(id);
                        query.nameservers = Some(list);
                        if query.zone_cut.is_none() {
                            query.zone_cut = Some(cut);
                        }
                    }
                    None => {
                        tracing::warn!(%name, "no nameservers to ask");
                        ctx.queries.get_mut(id).state =
                            QueryState::Error(DnsErrorKind::Transport);
                        continue;
                    }
                }
            }

            let (name, rclass, rtype, transaction_id, zone_cut, list) = {
                let query = ctx.queries.get(id);
                (
                    query.name.clone(),
                    query.rclass,
                    query.rtype,
                    query.transaction_id,
                    query.zone_cut.clone(),
                    query.nameservers.clone().unwrap_or(NameserverList {
                        zone: DomainName::root_domain(),
                        servers: Vec::new(),
                    }),
                )
            };

            // a cached delegation may be glueless: fetch an address
            // for its first nameserver before dispatching
            if candidate_addresses(&list).is_empty() {
                let Some(first) = list.servers.first().map(|s| s.name.clone()) else {
                    ctx.queries.get_mut(id).state = QueryState::Error(DnsErrorKind::MissingGlue);
                    continue;
                };
                tracing::debug!(nameserver = %first, "nameserver list has no addresses");
                let glue_id = ctx.queries.add(&first, rclass, RecordType::A);
                ctx.queries.get_mut(glue_id).glue_request = true;
                let query = ctx.queries.get_mut(id);
                query.referral_mut().glue_query = Some(glue_id);
                query.state = QueryState::WaitForGlue;
                continue;
            }

            // set the DNSSEC-OK and checking-disabled flags iff the
            // zone is not already locally trusted
            let test_name = zone_cut.as_ref().unwrap_or(&name);
            let use_dnssec = !dont_validate
                && ctx.policy.expectation_for(test_name) == ZoneExpectation::Validate;

            let mut request = Message::from_question(
                transaction_id,
                Question {
                    name: name.clone(),
                    qtype: QueryType::Record(rtype),
                    qclass: QueryClass::Record(rclass),
                },
            );
            if use_dnssec {
                tracing::debug!(%name, "setting DNSSEC-OK and CD, using EDNS0");
                request.header.checking_disabled = true;
                request
                    .additional
                    .push(ResourceRecord::edns_opt(EDNS_PAYLOAD_SIZE, true));
            } else {
                tracing::debug!(%name, "not requesting DNSSEC");
            }

            tracing::debug!(%name, %rtype, "sending query");
            ctx.metrics.cache_miss();
            ctx.queries.get_mut(id).state = QueryState::Sent;

            let mut response = None;
            for address in candidate_addresses(&list) {
                match ctx.transport.exchange(address, &request).await {
                    Ok(message) if response_matches_request(&request, &message) => {
                        response = Some((address, message));
                        break;
                    }
                    Ok(_) => {
                        tracing::debug!(%address, "response does not match request");
                    }
                    Err(error) => {
                        tracing::debug!(%address, %error, "exchange failed");
                    }
                }
            }

            let Some((address, message)) = response else {
                ctx.metrics.nameserver_miss();
                ctx.queries.get_mut(id).state = QueryState::Error(DnsErrorKind::Transport);
                continue;
            };
            ctx.metrics.nameserver_hit();
            ctx.queries.get_mut(id).respondent = Some(address);

            match digest_response(&mut ctx.queries, id, &ctx.cache, &ctx.policy, &message) {
                DigestOutcome::Answer(digested) => {
                    tracing::debug!(%name, %rtype, "found data");
                    ctx.queries.get_mut(id).state = QueryState::Answered;
                    ctx.queries.get_mut(id).response_rcode = Some(digested.rcode);

                    let policy = std::sync::Arc::clone(&ctx.policy);
                    assimilate_answers(
                        &mut ctx.assertions,
                        &mut ctx.queries,
                        &policy,
                        digested,
                        id,
                        dont_validate,
                    );
                    answered = true;
                }
                DigestOutcome::Requeued => {
                    // a referral was followed, an alias chased, or an
                    // error recorded; if glue arrived already, unblock
                    if ctx.queries.get(id).state == QueryState::WaitForGlue {
                        if let Some(glue_id) =
                            ctx.queries.get(id).referral.as_ref().and_then(|r| r.glue_query)
                        {
                            if ctx.queries.get(glue_id).state.is_finished() {
                                merge_glue_in_referral(&mut ctx.queries, &ctx.assertions, id);
                            }
                        }
                    }
                }
            }

            if answered && block {
                break;
            }
        }

        if !block || answered || !dispatched {
            break;
        }
    }
}

/// Look inside the cache, ask the resolver for missing data, then try
/// and validate whatever is possible.  Returns when there is some
/// useful answer (an error condition is a useful answer).
#[async_recursion]
pub(crate) async fn resolve_and_check_internal(
    ctx: &mut Context,
    name: &DomainName,
    rclass: RecordClass,
    rtype: RecordType,
    dont_validate: bool,
    no_prover: bool,
) -> Result<ResultChain, ResolutionError> {
    tracing::debug!(%name, %rtype, "resolve and check");

    let now = Context::now();
    let top_q = ctx.queries.add(name, rclass, rtype);
    let mut results: Vec<InterimResult> = Vec::new();
    let mut done = false;

    while !done {
        // keep track of where we were, so a pass which advances
        // nothing ends the loop rather than spinning
        let snapshot: Vec<QueryState> =
            ctx.queries.ids().map(|id| ctx.queries.get(id).state).collect();

        // data might already be present in the cache
        ask_cache(ctx, dont_validate);

        // send un-sent queries
        ask_resolver(ctx, true, dont_validate).await;

        if ctx.queries.get(top_q).state == QueryState::WaitForGlue {
            merge_glue_in_referral(&mut ctx.queries, &ctx.assertions, top_q);
        }

        // no point going ahead if the original query had error
        // conditions
        if let QueryState::Error(kind) = ctx.queries.get(top_q).state {
            tracing::debug!(%name, %kind, "top query ended in error");
            let chain = ctx
                .queries
                .get(top_q)
                .assertion
                .map(|head| {
                    let node = ctx.assertions.get(head);
                    vec![ChainLink {
                        rrset: node.rrset.clone(),
                        status: node.status,
                    }]
                })
                .unwrap_or_default();

            return Ok(ResultChain {
                results: vec![ValidatedResult {
                    status: ValStatus::DnsError(kind),
                    trusted: false,
                    chain,
                }],
            });
        }

        done = verify_and_validate(ctx, top_q, &mut results, dont_validate, no_prover, now).await;

        if !done {
            let unchanged = ctx.queries.len() == snapshot.len()
                && ctx
                    .queries
                    .ids()
                    .all(|id| ctx.queries.get(id).state == snapshot[id]);
            if unchanged {
                tracing::debug!(%name, "no query advanced this pass");
                return Ok(ResultChain {
                    results: vec![ValidatedResult {
                        status: ValStatus::DnsError(DnsErrorKind::NoAnswer),
                        trusted: false,
                        chain: Vec::new(),
                    }],
                });
            }
        }
    }

    if !dont_validate {
        fix_validation_results(ctx, top_q, &mut results);
    }

    Ok(finalize_results(ctx, results))
}
