//! The logical RRset: the unit the authentication chain, the
//! verifier, and the proof engine all operate on.
//!
//! Wire records arrive as individual `ResourceRecord`s; here they are
//! grouped by owner and type, their covering RRSIGs attached, and the
//! whole set classified by what role it plays in the response.

use dns_types::protocol::types::*;

use crate::status::{AssertionStatus, DnsErrorKind};

/// Which section of the response an RRset was assembled from.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum FromSection {
    Answer,
    Authority,
    Additional,
}

/// What role an RRset plays in answering the question.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum RrsetKind {
    /// Directly answers the question.
    Straight,
    /// An alias on the way to the answer.
    Cname,
    /// Signatures with no data under them.
    BareRrsig,
    /// Part of an NSEC proof of nonexistence.
    NackNsec,
    /// Part of an NSEC3 proof of nonexistence.
    NackNsec3,
    /// The SOA accompanying a negative answer.
    NackSoa,
    /// Not yet classified.
    Unset,
}

impl RrsetKind {
    pub fn is_nack(&self) -> bool {
        matches!(
            self,
            RrsetKind::NackNsec | RrsetKind::NackNsec3 | RrsetKind::NackSoa
        )
    }
}

/// A typed view of one RRSIG record, as the verifier consumes it.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Rrsig {
    pub type_covered: RecordType,
    pub algorithm: SecurityAlgorithm,
    pub labels: u8,
    pub original_ttl: u32,
    pub expiration: u32,
    pub inception: u32,
    pub key_tag: u16,
    pub signer: DomainName,
    pub signature: Vec<u8>,
}

impl Rrsig {
    pub fn from_rdata(rdata: &RecordTypeWithData) -> Option<Self> {
        if let RecordTypeWithData::RRSIG {
            type_covered,
            algorithm,
            labels,
            original_ttl,
            expiration,
            inception,
            key_tag,
            signer,
            signature,
        } = rdata
        {
            Some(Self {
                type_covered: *type_covered,
                algorithm: *algorithm,
                labels: *labels,
                original_ttl: *original_ttl,
                expiration: *expiration,
                inception: *inception,
                key_tag: *key_tag,
                signer: signer.clone(),
                signature: signature.clone(),
            })
        } else {
            None
        }
    }

    /// The RDATA of this signature with the signature octets removed:
    /// the prefix that is hashed together with the signed records (RFC
    /// 4034 section 3.1.8.1).
    pub fn rdata_prefix(&self) -> Vec<u8> {
        let unsigned = RecordTypeWithData::RRSIG {
            type_covered: self.type_covered,
            algorithm: self.algorithm,
            labels: self.labels,
            original_ttl: self.original_ttl,
            expiration: self.expiration,
            inception: self.inception,
            key_tag: self.key_tag,
            signer: self.signer.clone(),
            signature: Vec::new(),
        };
        unsigned.rdata_octets()
    }
}

/// A logical group of records with the same owner, class, and type,
/// together with the RRSIGs claiming to cover it and the metadata the
/// validator tracks about it.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct RRset {
    pub name: DomainName,
    pub rtype: RecordType,
    pub rclass: RecordClass,
    pub ttl: u32,
    /// The RDATA of each record, in arrival order.
    pub records: Vec<RecordTypeWithData>,
    /// Signatures claiming to cover this set.
    pub sigs: Vec<Rrsig>,
    pub kind: RrsetKind,
    pub from_section: FromSection,
    /// Set iff the header had AA and this set's owner is the current
    /// query name.
    pub authoritative: bool,
    /// Owner of the enclosing zone's SOA/NS, when known.
    pub zone_cut: Option<DomainName>,
    /// The wildcard depth of the signature that verified this set: 0
    /// for a direct signature, n > 0 when the record was synthesised
    /// from a wildcard n labels up.  `None` until verification
    /// succeeds.
    pub verified_wildcard: Option<usize>,
}

impl RRset {
    pub fn new(name: DomainName, rtype: RecordType, rclass: RecordClass) -> Self {
        Self {
            name,
            rtype,
            rclass,
            ttl: 0,
            records: Vec::new(),
            sigs: Vec::new(),
            kind: RrsetKind::Unset,
            from_section: FromSection::Answer,
            authoritative: false,
            zone_cut: None,
            verified_wildcard: None,
        }
    }

    /// The NSEC next-owner and type bitmap, when this is an NSEC set.
    pub fn nsec_fields(&self) -> Option<(&DomainName, &TypeBitmap)> {
        for record in &self.records {
            if let RecordTypeWithData::NSEC { next_name, types } = record {
                return Some((next_name, types));
            }
        }
        None
    }

    /// The NSEC3 parameters, when this is an NSEC3 set.
    pub fn nsec3_fields(&self) -> Option<Nsec3Fields<'_>> {
        for record in &self.records {
            if let RecordTypeWithData::NSEC3 {
                hash_algorithm,
                flags,
                iterations,
                salt,
                next_hashed_owner,
                types,
            } = record
            {
                return Some(Nsec3Fields {
                    hash_algorithm: *hash_algorithm,
                    opt_out: flags & NSEC3_FLAG_OPT_OUT != 0,
                    iterations: *iterations,
                    salt,
                    next_hashed_owner,
                    types,
                });
            }
        }
        None
    }

    /// Whether this set proves (directly or by wildcard) that its
    /// signature covers the full owner name: true when some verified
    /// signature had no labels stripped.
    pub fn proven_not_wildcard(&self) -> bool {
        self.verified_wildcard == Some(0)
    }
}

/// A borrowed view of an NSEC3 record's fields.
#[derive(Debug, Clone)]
pub struct Nsec3Fields<'a> {
    pub hash_algorithm: u8,
    pub opt_out: bool,
    pub iterations: u16,
    pub salt: &'a [u8],
    pub next_hashed_owner: &'a [u8],
    pub types: &'a TypeBitmap,
}

/// Group the records of one section into RRsets.
///
/// RRSIGs do not form sets of their own: each is attached to the set
/// of its owner and covered type.  An RRSIG whose covered set is not
/// in the section yields a bare-RRSIG set (no data, signatures only).
pub fn group_rrsets(records: &[ResourceRecord], from_section: FromSection) -> Vec<RRset> {
    fn find_or_insert(
        sets: &mut Vec<RRset>,
        from_section: FromSection,
        name: &DomainName,
        rtype: RecordType,
        rclass: RecordClass,
    ) -> usize {
        if let Some(i) = sets
            .iter()
            .position(|s| s.rtype == rtype && s.rclass == rclass && s.name == *name)
        {
            i
        } else {
            let mut set = RRset::new(name.clone(), rtype, rclass);
            set.from_section = from_section;
            sets.push(set);
            sets.len() - 1
        }
    }

    let mut sets = Vec::<RRset>::new();

    for rr in records {
        match &rr.rtype_with_data {
            RecordTypeWithData::OPT { .. } => (),
            RecordTypeWithData::RRSIG { type_covered, .. } => {
                let i = find_or_insert(&mut sets, from_section, &rr.name, *type_covered, rr.rclass);
                if let Some(sig) = Rrsig::from_rdata(&rr.rtype_with_data) {
                    sets[i].sigs.push(sig);
                }
            }
            rdata => {
                let i = find_or_insert(&mut sets, from_section, &rr.name, rdata.rtype(), rr.rclass);
                let set = &mut sets[i];
                if set.records.is_empty() || rr.ttl < set.ttl {
                    set.ttl = rr.ttl;
                }
                set.records.push(rdata.clone());
            }
        }
    }

    sets
}

impl RRset {
    /// Classify this set's role in a response to the given question.
    ///
    /// NSEC, NSEC3, SOA, and CNAME sets are negative-answer or alias
    /// material unless they were explicitly asked for.  Referrals
    /// never reach this point; they are consumed while digesting the
    /// response.
    pub fn set_answer_kind(&mut self, qname: &DomainName, qtype: QueryType) -> AnswerKindOutcome {
        if self.records.is_empty() && !self.sigs.is_empty() {
            self.kind = RrsetKind::BareRrsig;
            return AnswerKindOutcome::Ok;
        }

        let asked_for = |rtype: RecordType| {
            self.name == *qname && (qtype == QueryType::Wildcard || qtype == QueryType::Record(rtype))
        };

        self.kind = match self.rtype {
            RecordType::NSEC => {
                if asked_for(RecordType::NSEC) {
                    RrsetKind::Straight
                } else {
                    RrsetKind::NackNsec
                }
            }
            RecordType::NSEC3 => {
                if asked_for(RecordType::NSEC3) {
                    RrsetKind::Straight
                } else {
                    RrsetKind::NackNsec3
                }
            }
            RecordType::SOA => {
                if asked_for(RecordType::SOA) {
                    RrsetKind::Straight
                } else {
                    RrsetKind::NackSoa
                }
            }
            RecordType::CNAME => {
                if asked_for(RecordType::CNAME) {
                    RrsetKind::Straight
                } else {
                    RrsetKind::Cname
                }
            }
            rtype => {
                if self.name == *qname
                    && (qtype == QueryType::Wildcard || qtype == QueryType::Record(rtype))
                {
                    RrsetKind::Straight
                } else {
                    self.kind = RrsetKind::Unset;
                    return AnswerKindOutcome::WrongAnswer;
                }
            }
        };

        AnswerKindOutcome::Ok
    }
}

/// The result of answer-kind classification.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum AnswerKindOutcome {
    Ok,
    /// The set neither answers the question nor plays a recognised
    /// auxiliary role.
    WrongAnswer,
}

/// Where an RRset's owner sits in the chain of query names built up by
/// following aliases.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
enum QnamePosition {
    /// The current (most recent) query name.
    Top,
    /// An earlier name in the alias chain.
    Mid,
    NotInChain,
}

fn qname_position(qnames: &[DomainName], name: &DomainName) -> QnamePosition {
    match qnames.iter().position(|q| q == name) {
        Some(0) => QnamePosition::Top,
        Some(_) => QnamePosition::Mid,
        None => QnamePosition::NotInChain,
    }
}

/// Sanity-check a classified RRset against the question and the alias
/// chain (`qnames`, most recent name first).  A straight answer must
/// sit at the head of the chain, an alias in the middle or head, and
/// negative-proof material must not pretend to be mid-chain.
///
/// Returns the error to record on the corresponding assertion, or
/// `None` if the set is consistent.
pub fn fails_to_answer_query(
    set: &RRset,
    qnames: &[DomainName],
    qtype: QueryType,
    qclass: QueryClass,
) -> Option<AssertionStatus> {
    // an empty set (bare RRSIGs) answers nothing, and that is fine
    if set.records.is_empty() {
        return None;
    }

    let name_position = qname_position(qnames, &set.name);
    let type_match = qtype == QueryType::Wildcard || qtype == QueryType::Record(set.rtype);
    let class_match = qclass == QueryClass::Wildcard || qclass == QueryClass::Record(set.rclass);

    let inconsistent = !class_match
        || (!type_match && set.kind == RrsetKind::Straight)
        || (type_match && set.kind != RrsetKind::Straight)
        || (name_position != QnamePosition::Top
            && type_match
            && set.kind == RrsetKind::Straight)
        || (name_position == QnamePosition::NotInChain
            && !type_match
            && set.kind == RrsetKind::Cname)
        || (name_position == QnamePosition::Mid && !type_match && set.kind.is_nack());

    if inconsistent {
        Some(AssertionStatus::DnsError(DnsErrorKind::WrongAnswer))
    } else {
        None
    }
}
