//! End-to-end scenarios: a canned-response transport and a
//! deterministic crypto provider drive the full
//! resolve-and-validate engine, and the tests assert the exact
//! user-visible statuses each situation must produce.

use async_trait::async_trait;
use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;

use dns_types::protocol::types::test_util::*;
use dns_types::protocol::types::*;

use dns_validator::cache::SharedCache;
use dns_validator::crypto::{
    base32hex_encode, ds_digest_input, key_tag, nsec3_hash, CryptoError, CryptoProvider,
};
use dns_validator::policy::{Policy, TrustAnchor, ZoneExpectation};
use dns_validator::resolver::{ResolverTransport, TransportError};
use dns_validator::rrset::{group_rrsets, FromSection, Rrsig};
use dns_validator::status::AssertionStatus;
use dns_validator::verify::make_sigfield;
use dns_validator::{
    is_authentic, is_trusted, resolve_and_check, Context, ValStatus, ValidationFlags,
};

/// A deterministic stand-in for the crypto provider: a signature is
/// valid iff it equals `sign` of the message, and digests are the
/// identity function.
#[derive(Debug, Clone, Copy)]
struct MockCrypto;

fn sign(message: &[u8]) -> Vec<u8> {
    let mut signature = b"sig:".to_vec();
    signature.extend(message.iter().map(|b| b ^ 0xa5));
    signature
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
        if signature == sign(message) {
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

/// One canned answer, filled into a response echoing the request.
#[derive(Debug, Clone, Default)]
struct Canned {
    rcode_name_error: bool,
    authoritative: bool,
    answers: Vec<ResourceRecord>,
    authority: Vec<ResourceRecord>,
    additional: Vec<ResourceRecord>,
}

/// A transport which answers from a table keyed by server address and
/// question; unknown questions get an empty NOERROR response.
#[derive(Debug, Default)]
struct MockTransport {
    responses: HashMap<(IpAddr, DomainName, RecordType), Canned>,
}

/// The address every single-server test points its policy at.
const DEFAULT_SERVER: Ipv4Addr = Ipv4Addr::new(127, 0, 0, 1);

impl MockTransport {
    fn insert(&mut self, name: &str, rtype: RecordType, canned: Canned) {
        self.insert_at(IpAddr::V4(DEFAULT_SERVER), name, rtype, canned);
    }

    fn insert_at(&mut self, address: IpAddr, name: &str, rtype: RecordType, canned: Canned) {
        self.responses.insert((address, domain(name), rtype), canned);
    }
}

#[async_trait]
impl ResolverTransport for MockTransport {
    async fn exchange(
        &self,
        address: SocketAddr,
        request: &Message,
    ) -> Result<Message, TransportError> {
        let question = &request.questions[0];
        let QueryType::Record(rtype) = question.qtype else {
            return Err(TransportError::BadResponse);
        };

        let mut response = request.make_response();
        if let Some(canned) = self
            .responses
            .get(&(address.ip(), question.name.clone(), rtype))
        {
            response.header.rcode = if canned.rcode_name_error {
                Rcode::NameError
            } else {
                Rcode::NoError
            };
            response.header.is_authoritative = canned.authoritative;
            response.answers.clone_from(&canned.answers);
            response.authority.clone_from(&canned.authority);
            response.additional.clone_from(&canned.additional);
        }
        Ok(response)
    }
}

const FIXTURE_INCEPTION: u32 = 1_600_000_000;
const FIXTURE_EXPIRATION: u32 = 4_000_000_000;

/// A zone with one fixture key, able to sign record sets the way
/// `MockCrypto` expects.
struct TestZone {
    name: DomainName,
    key_rr: ResourceRecord,
}

impl TestZone {
    fn new(name: &str) -> Self {
        Self {
            name: domain(name),
            key_rr: ResourceRecord {
                name: domain(name),
                rtype_with_data: RecordTypeWithData::DNSKEY {
                    flags: DNSKEY_FLAG_ZONE_KEY,
                    protocol: 3,
                    algorithm: SecurityAlgorithm::RsaSha1,
                    public_key: format!("key material for {name}").into_bytes(),
                },
                rclass: RecordClass::IN,
                ttl: 300,
            },
        }
    }

    fn key_tag(&self) -> u16 {
        key_tag(&self.key_rr.rtype_with_data.rdata_octets())
    }

    fn trust_anchor(&self) -> TrustAnchor {
        TrustAnchor {
            zone: self.name.clone(),
            key: self.key_rr.rtype_with_data.clone(),
        }
    }

    /// An RRSIG record over `records`, which must form one RRset.
    /// `stripped_labels` > 0 signs the set as a wildcard expansion.
    fn sign(&self, records: &[ResourceRecord], stripped_labels: usize) -> ResourceRecord {
        let sets = group_rrsets(records, FromSection::Answer);
        assert_eq!(1, sets.len(), "sign expects a single RRset");
        let set = &sets[0];

        let mut rrsig = Rrsig {
            type_covered: set.rtype,
            algorithm: SecurityAlgorithm::RsaSha1,
            labels: (set.name.label_count() - stripped_labels) as u8,
            original_ttl: set.ttl,
            expiration: FIXTURE_EXPIRATION,
            inception: FIXTURE_INCEPTION,
            key_tag: self.key_tag(),
            signer: self.name.clone(),
            signature: Vec::new(),
        };
        rrsig.signature = sign(&make_sigfield(set, &rrsig, stripped_labels).unwrap());

        ResourceRecord {
            name: set.name.clone(),
            rtype_with_data: RecordTypeWithData::RRSIG {
                type_covered: rrsig.type_covered,
                algorithm: rrsig.algorithm,
                labels: rrsig.labels,
                original_ttl: rrsig.original_ttl,
                expiration: rrsig.expiration,
                inception: rrsig.inception,
                key_tag: rrsig.key_tag,
                signer: rrsig.signer,
                signature: rrsig.signature,
            },
            rclass: RecordClass::IN,
            ttl: set.ttl,
        }
    }

    /// The zone's DNSKEY RRset with its self-signature.
    fn dnskey_answer(&self) -> Vec<ResourceRecord> {
        let sig = self.sign(std::slice::from_ref(&self.key_rr), 0);
        vec![self.key_rr.clone(), sig]
    }

    /// The DS record the parent publishes for this zone, using the
    /// identity digest.
    fn ds_record(&self) -> ResourceRecord {
        ResourceRecord {
            name: self.name.clone(),
            rtype_with_data: RecordTypeWithData::DS {
                key_tag: self.key_tag(),
                algorithm: SecurityAlgorithm::RsaSha1,
                digest_type: DigestAlgorithm::Sha1,
                digest: ds_digest_input(&self.name, &self.key_rr.rtype_with_data.rdata_octets()),
            },
            rclass: RecordClass::IN,
            ttl: 300,
        }
    }
}

/// A two-zone chain: the child's DNSKEY set links to the parent
/// through a DS, and the parent's keys match the trust anchor.  This
/// is the deepest shape the scenarios need, and exercises
/// `VerifiedLink`.
#[tokio::test]
async fn two_zone_chain_links_through_ds() {
    let parent = TestZone::new("test.");
    let child = TestZone::new("example.test.");

    let mut policy = base_policy();
    policy.add_trust_anchor(parent.trust_anchor());

    let a = a_record("www.example.test.", Ipv4Addr::new(192, 0, 2, 1));
    let a_sig = child.sign(std::slice::from_ref(&a), 0);

    let child_ds = child.ds_record();
    let child_ds_sig = parent.sign(std::slice::from_ref(&child_ds), 0);

    let mut transport = MockTransport::default();
    transport.insert(
        "www.example.test.",
        RecordType::A,
        Canned {
            authoritative: true,
            answers: vec![a, a_sig],
            ..Default::default()
        },
    );
    transport.insert(
        "example.test.",
        RecordType::DNSKEY,
        Canned {
            authoritative: true,
            answers: child.dnskey_answer(),
            ..Default::default()
        },
    );
    transport.insert(
        "example.test.",
        RecordType::DS,
        Canned {
            authoritative: true,
            answers: vec![child_ds, child_ds_sig],
            ..Default::default()
        },
    );
    transport.insert(
        "test.",
        RecordType::DNSKEY,
        Canned {
            authoritative: true,
            answers: parent.dnskey_answer(),
            ..Default::default()
        },
    );

    let mut ctx = make_context(policy, transport);
    let chain = resolve_and_check(
        &mut ctx,
        &domain("www.example.test."),
        RecordClass::IN,
        RecordType::A,
        ValidationFlags::default(),
    )
    .await
    .unwrap();

    assert_eq!(ValStatus::Success, chain.status());
    let result = &chain.results[0];
    assert_eq!(AssertionStatus::Verified, result.chain[0].status);
    assert_eq!(AssertionStatus::VerifiedLink, result.chain[1].status);
    assert_eq!(RecordType::DS, result.chain[2].rrset.rtype);
}

fn nsec_rr(name: &str, next_name: &str, types: &[RecordType]) -> ResourceRecord {
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

fn txt_rr(name: &str, text: &str) -> ResourceRecord {
    ResourceRecord {
        name: domain(name),
        rtype_with_data: RecordTypeWithData::TXT {
            octets: text.as_bytes().to_vec(),
        },
        rclass: RecordClass::IN,
        ttl: 300,
    }
}

/// An NSEC3 record for `zone` whose owner is the hash of `matching`
/// (empty salt, identity digest), with an arbitrary next hash.
fn nsec3_matching_rr(zone: &str, matching: &str, types: &[RecordType]) -> ResourceRecord {
    let hash = nsec3_hash(&MockCrypto, &domain(matching), &[], 1).unwrap();
    nsec3_rr_raw(zone, &hash, &[1u8; 20], false, types)
}

/// An NSEC3 record for `zone` whose span covers the hash of
/// `covered`.
fn nsec3_covering_rr(zone: &str, covered: &str, opt_out: bool) -> ResourceRecord {
    let hash = nsec3_hash(&MockCrypto, &domain(covered), &[], 1).unwrap();
    // the identity digest starts every hash with a label length
    // octet, so nudging the first octet gives a well-ordered span
    let mut owner_hash = hash.clone();
    owner_hash[0] -= 1;
    let mut next_hash = hash;
    next_hash[0] += 1;
    nsec3_rr_raw(zone, &owner_hash, &next_hash, opt_out, &[RecordType::A])
}

fn nsec3_rr_raw(
    zone: &str,
    owner_hash: &[u8],
    next_hashed: &[u8],
    opt_out: bool,
    types: &[RecordType],
) -> ResourceRecord {
    let owner = format!("{}.{}", base32hex_encode(owner_hash), zone);
    ResourceRecord {
        name: domain(&owner),
        rtype_with_data: RecordTypeWithData::NSEC3 {
            hash_algorithm: 1,
            flags: if opt_out { NSEC3_FLAG_OPT_OUT } else { 0 },
            iterations: 1,
            salt: Vec::new(),
            next_hashed_owner: next_hashed.to_vec(),
            types: TypeBitmap::from_types(types),
        },
        rclass: RecordClass::IN,
        ttl: 300,
    }
}

fn make_context(policy: Policy, transport: MockTransport) -> Context {
    Context::new(
        policy,
        SharedCache::new(),
        Arc::new(MockCrypto),
        Arc::new(transport),
    )
}

fn base_policy() -> Policy {
    let mut policy = Policy::new();
    policy.nameservers.push("127.0.0.1:53".parse().unwrap());
    policy
}

#[tokio::test]
async fn signed_soa_with_anchor_is_success() {
    let zone = TestZone::new("example.test.");

    let mut policy = base_policy();
    policy.add_trust_anchor(zone.trust_anchor());

    let soa = soa_record("example.test.");
    let soa_sig = zone.sign(std::slice::from_ref(&soa), 0);

    let mut transport = MockTransport::default();
    transport.insert(
        "example.test.",
        RecordType::SOA,
        Canned {
            authoritative: true,
            answers: vec![soa, soa_sig],
            ..Default::default()
        },
    );
    transport.insert(
        "example.test.",
        RecordType::DNSKEY,
        Canned {
            authoritative: true,
            answers: zone.dnskey_answer(),
            ..Default::default()
        },
    );

    let mut ctx = make_context(policy, transport);
    let chain = resolve_and_check(
        &mut ctx,
        &domain("example.test."),
        RecordClass::IN,
        RecordType::SOA,
        ValidationFlags::default(),
    )
    .await
    .unwrap();

    assert_eq!(ValStatus::Success, chain.status());
    assert!(is_authentic(chain.status()));
    assert!(is_trusted(chain.status()));

    let result = &chain.results[0];
    assert!(result.trusted);
    assert_eq!(2, result.chain.len());
    assert_eq!(RecordType::SOA, result.chain[0].rrset.rtype);
    assert_eq!(AssertionStatus::Verified, result.chain[0].status);
    assert_eq!(RecordType::DNSKEY, result.chain[1].rrset.rtype);
    assert_eq!(AssertionStatus::TrustKey, result.chain[1].status);
}

#[tokio::test]
async fn nsec_nxdomain_is_nonexistent_name() {
    let zone = TestZone::new("example.test.");

    let mut policy = base_policy();
    policy.add_trust_anchor(zone.trust_anchor());

    let soa = soa_record("example.test.");
    let span = nsec_rr("mango.example.test.", "pear.example.test.", &[RecordType::A]);
    let wildcard = nsec_rr(
        "example.test.",
        "mango.example.test.",
        &[RecordType::SOA, RecordType::NS],
    );

    let mut transport = MockTransport::default();
    transport.insert(
        "missing.example.test.",
        RecordType::A,
        Canned {
            rcode_name_error: true,
            authoritative: true,
            authority: vec![
                zone.sign(std::slice::from_ref(&soa), 0),
                soa,
                zone.sign(std::slice::from_ref(&span), 0),
                span.clone(),
                zone.sign(std::slice::from_ref(&wildcard), 0),
                wildcard,
            ],
            ..Default::default()
        },
    );
    transport.insert(
        "example.test.",
        RecordType::DNSKEY,
        Canned {
            authoritative: true,
            answers: zone.dnskey_answer(),
            ..Default::default()
        },
    );

    let mut ctx = make_context(policy, transport);
    let chain = resolve_and_check(
        &mut ctx,
        &domain("missing.example.test."),
        RecordClass::IN,
        RecordType::A,
        ValidationFlags::default(),
    )
    .await
    .unwrap();

    assert_eq!(ValStatus::NonexistentName, chain.status());
    assert!(is_authentic(chain.status()));
    for result in &chain.results {
        assert_eq!(ValStatus::NonexistentName, result.status);
        assert!(result.trusted);
    }
}

#[tokio::test]
async fn unsigned_child_with_parent_ds_denial_is_provably_insecure() {
    let parent = TestZone::new("example.test.");

    let mut policy = base_policy();
    policy.add_trust_anchor(parent.trust_anchor());

    let mut transport = MockTransport::default();

    // the unsigned child answers the A question, with its delegation
    // in authority so the zone cut is known
    transport.insert(
        "foo.bar.example.test.",
        RecordType::A,
        Canned {
            authoritative: true,
            answers: vec![a_record("foo.bar.example.test.", Ipv4Addr::new(192, 0, 2, 7))],
            authority: vec![ns_record("bar.example.test.", "ns1.bar.example.test.")],
            additional: vec![a_record("ns1.bar.example.test.", Ipv4Addr::new(10, 0, 0, 2))],
            ..Default::default()
        },
    );

    // once the child delegation is cached, later questions in its
    // bailiwick go to the child's own server
    let child_server = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2));

    // the child has no signatures at all
    let child_soa = soa_record("bar.example.test.");
    for name in ["foo.bar.example.test.", "bar.example.test."] {
        transport.insert_at(
            child_server,
            name,
            RecordType::RRSIG,
            Canned {
                authoritative: true,
                authority: vec![child_soa.clone()],
                ..Default::default()
            },
        );
    }

    // the signed parent proves there is no DS for the child (the
    // child's server forwards the parent's authenticated denial)
    let parent_soa = soa_record("example.test.");
    let ds_denial = nsec_rr(
        "bar.example.test.",
        "zzz.example.test.",
        &[RecordType::NS, RecordType::NSEC],
    );
    transport.insert_at(
        child_server,
        "bar.example.test.",
        RecordType::DS,
        Canned {
            authoritative: true,
            authority: vec![
                parent.sign(std::slice::from_ref(&parent_soa), 0),
                parent_soa,
                parent.sign(std::slice::from_ref(&ds_denial), 0),
                ds_denial,
            ],
            ..Default::default()
        },
    );
    transport.insert(
        "example.test.",
        RecordType::DNSKEY,
        Canned {
            authoritative: true,
            answers: parent.dnskey_answer(),
            ..Default::default()
        },
    );

    let mut ctx = make_context(policy, transport);
    let chain = resolve_and_check(
        &mut ctx,
        &domain("foo.bar.example.test."),
        RecordClass::IN,
        RecordType::A,
        ValidationFlags::default(),
    )
    .await
    .unwrap();

    assert_eq!(ValStatus::ProvablyInsecure, chain.status());
    assert!(is_trusted(chain.status()));
    assert!(!is_authentic(chain.status()));
    assert!(chain.results[0].trusted);
}

#[tokio::test]
async fn wildcard_answer_is_success_with_wildcard_verified() {
    let zone = TestZone::new("example.test.");

    let mut policy = base_policy();
    policy.add_trust_anchor(zone.trust_anchor());

    // the zone holds *.example.test TXT "hi"; the response expands it
    // for the queried name and proves no exact match exists
    let txt = txt_rr("wild.example.test.", "hi");
    let txt_sig = zone.sign(std::slice::from_ref(&txt), 1);
    let no_exact = nsec_rr(
        "example.test.",
        "zzz.example.test.",
        &[RecordType::SOA, RecordType::NS],
    );

    let mut transport = MockTransport::default();
    transport.insert(
        "wild.example.test.",
        RecordType::TXT,
        Canned {
            authoritative: true,
            answers: vec![txt, txt_sig],
            authority: vec![zone.sign(std::slice::from_ref(&no_exact), 0), no_exact],
            ..Default::default()
        },
    );
    transport.insert(
        "example.test.",
        RecordType::DNSKEY,
        Canned {
            authoritative: true,
            answers: zone.dnskey_answer(),
            ..Default::default()
        },
    );

    let mut ctx = make_context(policy, transport);
    let chain = resolve_and_check(
        &mut ctx,
        &domain("wild.example.test."),
        RecordClass::IN,
        RecordType::TXT,
        ValidationFlags::default(),
    )
    .await
    .unwrap();

    let txt_result = chain
        .results
        .iter()
        .find(|res| res.chain[0].rrset.rtype == RecordType::TXT)
        .expect("no result for the TXT set");

    assert_eq!(ValStatus::Success, txt_result.status);
    assert!(txt_result.trusted);
    assert_eq!(AssertionStatus::WildcardVerified, txt_result.chain[0].status);
}

#[tokio::test]
async fn nsec3_optout_span_is_nonexistent_name_optout() {
    let zone = TestZone::new("insecure-zone.test.");

    let mut policy = base_policy();
    policy.add_trust_anchor(zone.trust_anchor());

    let soa = soa_record("insecure-zone.test.");
    // closest provable encloser: the zone apex matches directly
    let cpe = nsec3_matching_rr(
        "insecure-zone.test.",
        "insecure-zone.test.",
        &[RecordType::SOA, RecordType::NS],
    );
    // the next closer name falls in an opt-out span
    let ncn = nsec3_covering_rr("insecure-zone.test.", "opted-out.insecure-zone.test.", true);
    // and the wildcard is covered too
    let wildcard = nsec3_covering_rr("insecure-zone.test.", "*.insecure-zone.test.", false);

    let mut transport = MockTransport::default();
    transport.insert(
        "opted-out.insecure-zone.test.",
        RecordType::A,
        Canned {
            rcode_name_error: true,
            authoritative: true,
            authority: vec![
                zone.sign(std::slice::from_ref(&soa), 0),
                soa,
                zone.sign(std::slice::from_ref(&cpe), 0),
                cpe,
                zone.sign(std::slice::from_ref(&ncn), 0),
                ncn,
                zone.sign(std::slice::from_ref(&wildcard), 0),
                wildcard,
            ],
            ..Default::default()
        },
    );
    transport.insert(
        "insecure-zone.test.",
        RecordType::DNSKEY,
        Canned {
            authoritative: true,
            answers: zone.dnskey_answer(),
            ..Default::default()
        },
    );

    let mut ctx = make_context(policy, transport);
    let chain = resolve_and_check(
        &mut ctx,
        &domain("opted-out.insecure-zone.test."),
        RecordClass::IN,
        RecordType::A,
        ValidationFlags::default(),
    )
    .await
    .unwrap();

    assert_eq!(ValStatus::NonexistentNameOptout, chain.status());
    assert!(is_authentic(chain.status()));
    assert!(is_trusted(chain.status()));
}

#[tokio::test]
async fn expired_rrsig_is_bogus() {
    let zone = TestZone::new("example.test.");

    let mut policy = base_policy();
    policy.add_trust_anchor(zone.trust_anchor());

    let a = a_record("www.example.test.", Ipv4Addr::new(192, 0, 2, 1));
    let mut expired_sig = zone.sign(std::slice::from_ref(&a), 0);
    if let RecordTypeWithData::RRSIG {
        expiration,
        signature,
        ..
    } = &mut expired_sig.rtype_with_data
    {
        // long past, well outside the acceptance window; the
        // signature bytes no longer matter
        *expiration = FIXTURE_INCEPTION;
        signature.clear();
    }

    let mut transport = MockTransport::default();
    transport.insert(
        "www.example.test.",
        RecordType::A,
        Canned {
            authoritative: true,
            answers: vec![a, expired_sig],
            ..Default::default()
        },
    );
    transport.insert(
        "example.test.",
        RecordType::DNSKEY,
        Canned {
            authoritative: true,
            answers: zone.dnskey_answer(),
            ..Default::default()
        },
    );

    let mut ctx = make_context(policy, transport);
    let chain = resolve_and_check(
        &mut ctx,
        &domain("www.example.test."),
        RecordClass::IN,
        RecordType::A,
        ValidationFlags::default(),
    )
    .await
    .unwrap();

    assert_eq!(ValStatus::BogusUnprovable, chain.status());
    assert!(!is_trusted(chain.status()));
    assert_eq!(
        AssertionStatus::RrsigExpired,
        chain.results[0].chain[0].status
    );
}

#[tokio::test]
async fn dont_validate_returns_local_answer() {
    let mut transport = MockTransport::default();
    transport.insert(
        "www.example.test.",
        RecordType::A,
        Canned {
            authoritative: true,
            answers: vec![a_record("www.example.test.", Ipv4Addr::new(192, 0, 2, 1))],
            ..Default::default()
        },
    );

    let mut ctx = make_context(base_policy(), transport);
    let chain = resolve_and_check(
        &mut ctx,
        &domain("www.example.test."),
        RecordClass::IN,
        RecordType::A,
        ValidationFlags {
            dont_validate: true,
        },
    )
    .await
    .unwrap();

    assert_eq!(ValStatus::LocalAnswer, chain.status());
    assert!(is_trusted(chain.status()));
    assert!(!is_authentic(chain.status()));
    // no DNSSEC queries were spawned
    assert_eq!(0, ctx.metrics().verifications);
}

#[tokio::test]
async fn skip_policy_walks_referrals_to_local_answer() {
    let root_server: IpAddr = "198.41.0.4".parse().unwrap();
    let child_server = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1));

    let mut policy = Policy::new();
    policy.add_expectation(DomainName::root_domain(), ZoneExpectation::Skip);
    policy.root_hints.push(dns_validator::policy::Nameserver {
        name: domain("a.root-servers.test."),
        addresses: vec![root_server],
    });

    let mut transport = MockTransport::default();
    // the root refers to child.test., with glue
    transport.insert_at(
        root_server,
        "www.child.test.",
        RecordType::A,
        Canned {
            authority: vec![ns_record("child.test.", "ns1.child.test.")],
            additional: vec![a_record("ns1.child.test.", Ipv4Addr::new(10, 0, 0, 1))],
            ..Default::default()
        },
    );
    // the child answers the re-dispatched question
    transport.insert_at(
        child_server,
        "www.child.test.",
        RecordType::A,
        Canned {
            authoritative: true,
            answers: vec![a_record("www.child.test.", Ipv4Addr::new(192, 0, 2, 9))],
            ..Default::default()
        },
    );

    let mut ctx = make_context(policy, transport);
    let chain = resolve_and_check(
        &mut ctx,
        &domain("www.child.test."),
        RecordClass::IN,
        RecordType::A,
        ValidationFlags::default(),
    )
    .await
    .unwrap();

    assert_eq!(ValStatus::LocalAnswer, chain.status());
    assert!(is_trusted(chain.status()));
    assert!(chain.results[0].trusted);
}

#[tokio::test]
async fn repeated_question_hits_the_cache() {
    let zone = TestZone::new("example.test.");

    let mut policy = base_policy();
    policy.add_trust_anchor(zone.trust_anchor());

    let soa = soa_record("example.test.");
    let soa_sig = zone.sign(std::slice::from_ref(&soa), 0);

    let mut transport = MockTransport::default();
    transport.insert(
        "example.test.",
        RecordType::SOA,
        Canned {
            authoritative: true,
            answers: vec![soa, soa_sig],
            ..Default::default()
        },
    );
    transport.insert(
        "example.test.",
        RecordType::DNSKEY,
        Canned {
            authoritative: true,
            answers: zone.dnskey_answer(),
            ..Default::default()
        },
    );

    let mut ctx = make_context(policy, transport);

    let first = resolve_and_check(
        &mut ctx,
        &domain("example.test."),
        RecordClass::IN,
        RecordType::SOA,
        ValidationFlags::default(),
    )
    .await
    .unwrap();
    assert_eq!(ValStatus::Success, first.status());
    // both the SOA and the DNSKEY question went upstream
    assert_eq!(2, ctx.metrics().cache_misses);
    assert_eq!(0, ctx.metrics().cache_hits);

    let second = resolve_and_check(
        &mut ctx,
        &domain("example.test."),
        RecordClass::IN,
        RecordType::SOA,
        ValidationFlags::default(),
    )
    .await
    .unwrap();
    assert_eq!(ValStatus::Success, second.status());

    // metrics are per call: the second run is fed entirely from the
    // cache, and nothing goes upstream
    assert_eq!(0, ctx.metrics().cache_misses);
    assert_eq!(2, ctx.metrics().cache_hits);
}
