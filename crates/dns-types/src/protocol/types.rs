use std::cmp::Ordering;
use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};

/// Maximum encoded length of a domain name, including both length and
/// label octets.
pub const DOMAINNAME_MAX_LEN: usize = 255;

/// Maximum length of a single label.
pub const LABEL_MAX_LEN: usize = 63;

/// Query / response bit of the header.
pub const HEADER_MASK_QR: u8 = 0b1000_0000;

/// Opcode field of the header.
pub const HEADER_MASK_OPCODE: u8 = 0b0111_1000;

/// Offset of the opcode field.
pub const HEADER_OFFSET_OPCODE: usize = 3;

/// Authoritative-answer bit of the header.
pub const HEADER_MASK_AA: u8 = 0b0000_0100;

/// Truncation bit of the header.
pub const HEADER_MASK_TC: u8 = 0b0000_0010;

/// Recursion-desired bit of the header.
pub const HEADER_MASK_RD: u8 = 0b0000_0001;

/// Recursion-available bit of the header.
pub const HEADER_MASK_RA: u8 = 0b1000_0000;

/// Authentic-data bit of the header (RFC 4035 section 3.1.6).
pub const HEADER_MASK_AD: u8 = 0b0010_0000;

/// Checking-disabled bit of the header (RFC 4035 section 3.1.6).
pub const HEADER_MASK_CD: u8 = 0b0001_0000;

/// Response code field of the header.
pub const HEADER_MASK_RCODE: u8 = 0b0000_1111;

/// Offset of the response code field.
pub const HEADER_OFFSET_RCODE: usize = 0;

/// The DNSSEC-OK bit in the TTL field of an OPT pseudo-record (RFC
/// 4035 section 4.1).
pub const EDNS_MASK_DNSSEC_OK: u32 = 0x0000_8000;

/// Basic DNS message format, used for both queries and responses.
///
/// ```text
///     +---------------------+
///     |        Header       |
///     +---------------------+
///     |       Question      | the question for the name server
///     +---------------------+
///     |        Answer       | RRs answering the question
///     +---------------------+
///     |      Authority      | RRs pointing toward an authority
///     +---------------------+
///     |      Additional     | RRs holding additional information
///     +---------------------+
/// ```
///
/// See section 4.1 of RFC 1035.
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[cfg_attr(any(feature = "test-util", test), derive(arbitrary::Arbitrary))]
pub struct Message {
    pub header: Header,
    pub questions: Vec<Question>,
    pub answers: Vec<ResourceRecord>,
    pub authority: Vec<ResourceRecord>,
    pub additional: Vec<ResourceRecord>,
}

impl Message {
    pub fn make_response(&self) -> Self {
        Self {
            header: Header {
                id: self.header.id,
                is_response: true,
                opcode: self.header.opcode,
                is_authoritative: false,
                is_truncated: false,
                recursion_desired: self.header.recursion_desired,
                recursion_available: true,
                authentic_data: false,
                checking_disabled: self.header.checking_disabled,
                rcode: Rcode::NoError,
            },
            questions: self.questions.clone(),
            answers: Vec::new(),
            authority: Vec::new(),
            additional: Vec::new(),
        }
    }

    pub fn from_question(id: u16, question: Question) -> Self {
        Self {
            header: Header {
                id,
                is_response: false,
                opcode: Opcode::Standard,
                is_authoritative: false,
                is_truncated: false,
                recursion_desired: false,
                recursion_available: false,
                authentic_data: false,
                checking_disabled: false,
                rcode: Rcode::NoError,
            },
            questions: vec![question],
            answers: Vec::new(),
            authority: Vec::new(),
            additional: Vec::new(),
        }
    }

    /// Whether some OPT pseudo-record in the additional section has the
    /// DNSSEC-OK bit set.
    pub fn is_dnssec_ok(&self) -> bool {
        self.additional.iter().any(|rr| {
            matches!(rr.rtype_with_data, RecordTypeWithData::OPT { .. })
                && rr.ttl & EDNS_MASK_DNSSEC_OK != 0
        })
    }
}

/// Common header type for all messages.
///
/// ```text
///                                     1  1  1  1  1  1
///       0  1  2  3  4  5  6  7  8  9  0  1  2  3  4  5
///     +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
///     |                      ID                       |
///     +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
///     |QR|   Opcode  |AA|TC|RD|RA| Z|AD|CD|   RCODE   |
///     +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
///     |                    QDCOUNT                    |
///     +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
///     |                    ANCOUNT                    |
///     +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
///     |                    NSCOUNT                    |
///     +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
///     |                    ARCOUNT                    |
///     +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
/// ```
///
/// See section 4.1.1 of RFC 1035, and section 3.1.6 of RFC 4035 for
/// the AD and CD bits.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[cfg_attr(any(feature = "test-util", test), derive(arbitrary::Arbitrary))]
pub struct Header {
    /// A 16 bit identifier assigned by the program that generates any
    /// kind of query.  This identifier is copied the corresponding
    /// reply and can be used by the requester to match up replies to
    /// outstanding queries.
    pub id: u16,

    /// A one bit field that specifies whether this message is a query
    /// (0), or a response (1).
    pub is_response: bool,

    /// A four bit field that specifies kind of query in this message.
    /// This value is set by the originator of a query and copied into
    /// the response.
    pub opcode: Opcode,

    /// Authoritative Answer - this bit is valid in responses, and
    /// specifies that the responding name server is an authority for
    /// the domain name in question section.
    ///
    /// Note that the contents of the answer section may have multiple
    /// owner names because of aliases.  The AA bit corresponds to the
    /// name which matches the query name, or the first owner name in
    /// the answer section.
    pub is_authoritative: bool,

    /// TrunCation - specifies that this message was truncated due to
    /// length greater than that permitted on the transmission
    /// channel.
    pub is_truncated: bool,

    /// Recursion Desired - this bit may be set in a query and is
    /// copied into the response.  If RD is set, it directs the name
    /// server to pursue the query recursively.
    pub recursion_desired: bool,

    /// Recursion Available - this bit is set or cleared in a response,
    /// and denotes whether recursive query support is available in
    /// the name server.
    pub recursion_available: bool,

    /// Authentic Data - set in a response to signal that the server
    /// considers all the data in the answer and authority sections
    /// authentic.  A validating resolver never believes this bit; it
    /// performs its own checks.
    pub authentic_data: bool,

    /// Checking Disabled - set in a query to signal that the sender
    /// performs its own signature checking, so the upstream server
    /// should hand back data it would otherwise withhold as bogus.
    pub checking_disabled: bool,

    /// Response code - this 4 bit field is set as part of responses.
    pub rcode: Rcode,
}

/// A `Header` as it appears on the network.  This type is used for
/// serialisation and deserialisation only: including the count fields
/// in the normal `Header` type would require ensuring those values
/// are correct.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[cfg_attr(any(feature = "test-util", test), derive(arbitrary::Arbitrary))]
pub struct WireHeader {
    /// The header that will be persisted to / is taken from the
    /// `Message`.
    pub header: Header,

    /// an unsigned 16 bit integer specifying the number of entries in
    /// the question section.
    pub qdcount: u16,

    /// an unsigned 16 bit integer specifying the number of resource
    /// records in the answer section.
    pub ancount: u16,

    /// an unsigned 16 bit integer specifying the number of name
    /// server resource records in the authority records section.
    pub nscount: u16,

    /// an unsigned 16 bit integer specifying the number of
    /// resource records in the additional records section.
    pub arcount: u16,
}

/// The question section has a list of questions (usually 1 but
/// possibly more) being asked.  This is the structure for a single
/// question.
///
/// See section 4.1.2 of RFC 1035.
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[cfg_attr(any(feature = "test-util", test), derive(arbitrary::Arbitrary))]
pub struct Question {
    /// a domain name represented as a sequence of labels, where each
    /// label consists of a length octet followed by that number of
    /// octets.
    pub name: DomainName,

    /// a two octet code which specifies the type of the query.
    pub qtype: QueryType,

    /// a two octet code that specifies the class of the query.  For
    /// example, the QCLASS field is IN for the Internet.
    pub qclass: QueryClass,
}

impl Question {
    pub fn is_unknown(&self) -> bool {
        self.qtype.is_unknown() || self.qclass.is_unknown()
    }
}

impl fmt::Display for Question {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{} {} {}",
            self.name.to_dotted_string(),
            self.qclass,
            self.qtype
        )
    }
}

/// The answer, authority, and additional sections are all the same
/// format: a variable number of resource records.  This is the
/// structure for a single resource record.
///
/// See section 4.1.3 of RFC 1035.
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[cfg_attr(any(feature = "test-util", test), derive(arbitrary::Arbitrary))]
pub struct ResourceRecord {
    /// a domain name to which this resource record pertains.
    pub name: DomainName,

    /// A combination of the RTYPE and RDATA fields
    pub rtype_with_data: RecordTypeWithData,

    /// two octets which specify the class of the data in the RDATA
    /// field.
    pub rclass: RecordClass,

    /// a 32 bit unsigned integer that specifies the time interval (in
    /// seconds) that the resource record may be cached before it
    /// should be discarded.
    pub ttl: u32,
}

impl ResourceRecord {
    pub fn is_unknown(&self) -> bool {
        self.rtype_with_data.is_unknown() || self.rclass.is_unknown()
    }

    pub fn matches(&self, question: &Question) -> bool {
        self.rtype_with_data.matches(&question.qtype) && self.rclass.matches(&question.qclass)
    }

    /// An EDNS(0) OPT pseudo-record.  The requestor's maximum payload
    /// size travels in the CLASS field and the DNSSEC-OK flag in the
    /// TTL field (RFC 6891 section 6.1.2, RFC 4035 section 4.1).
    pub fn edns_opt(payload_size: u16, dnssec_ok: bool) -> Self {
        Self {
            name: DomainName::root_domain(),
            rtype_with_data: RecordTypeWithData::OPT { octets: Vec::new() },
            rclass: RecordClass::from(payload_size),
            ttl: if dnssec_ok { EDNS_MASK_DNSSEC_OK } else { 0 },
        }
    }
}

/// The opt-out flag of an NSEC3 record (RFC 5155 section 3.1.2.1).
pub const NSEC3_FLAG_OPT_OUT: u8 = 0b0000_0001;

/// The zone-key flag of a DNSKEY record (RFC 4034 section 2.1.1).
pub const DNSKEY_FLAG_ZONE_KEY: u16 = 0x0100;

/// A record type with its associated, deserialised, data.
///
/// The DNSSEC records (DS, RRSIG, NSEC, DNSKEY, NSEC3) follow RFC 4034
/// and RFC 5155.  Domain names inside their RDATA are never compressed
/// on the wire.
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum RecordTypeWithData {
    /// ```text
    ///     +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
    ///     |                    ADDRESS                    |
    ///     +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
    /// ```
    ///
    /// Where `ADDRESS` is a 32 bit Internet address.
    A { address: Ipv4Addr },

    /// Where `NSDNAME` is a domain name which specifies a host which
    /// should be authoritative for the specified class and domain.
    NS { nsdname: DomainName },

    /// Where `CNAME` is a domain name which specifies the canonical
    /// or primary name for the owner.  The owner name is an alias.
    CNAME { cname: DomainName },

    /// The start of a zone of authority: the primary nameserver, the
    /// responsible mailbox, and the counters that drive zone
    /// maintenance.  See section 3.3.13 of RFC 1035.
    SOA {
        mname: DomainName,
        rname: DomainName,
        serial: u32,
        refresh: u32,
        retry: u32,
        expire: u32,
        minimum: u32,
    },

    /// Where `PTRDNAME` is a domain name which points to some
    /// location in the domain name space.
    PTR { ptrdname: DomainName },

    /// Where `PREFERENCE` orders records at the same owner (lower is
    /// preferred) and `EXCHANGE` is a host willing to act as a mail
    /// exchange for the owner name.
    MX {
        preference: u16,
        exchange: DomainName,
    },

    /// Where `TXT-DATA` is one or more character strings.
    TXT { octets: Vec<u8> },

    /// ```text
    ///     +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
    ///     |                    ADDRESS                    |
    ///     +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
    /// ```
    ///
    /// Where `ADDRESS` is a 128 bit Internet address.
    AAAA { address: Ipv6Addr },

    /// Non-terminal name redirection: every descendant of the owner is
    /// an alias for the corresponding descendant of `TARGET`.  See RFC
    /// 6672.
    DNAME { target: DomainName },

    /// EDNS(0) option pseudo-record.  Individual options are not
    /// interpreted; the fixed fields this application needs (payload
    /// size, extended flags) live in the enclosing record's CLASS and
    /// TTL fields.
    OPT { octets: Vec<u8> },

    /// Delegation signer: a digest of a DNSKEY at the child zone apex,
    /// published in the parent zone.
    ///
    /// ```text
    ///                                     1  1  1  1  1  1
    ///       0  1  2  3  4  5  6  7  8  9  0  1  2  3  4  5
    ///     +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
    ///     |            KEY TAG            |
    ///     +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
    ///     |   ALGORITHM   |  DIGEST TYPE  |
    ///     +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
    ///     /                    DIGEST                     /
    ///     +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
    /// ```
    ///
    /// See section 5.1 of RFC 4034.
    DS {
        key_tag: u16,
        algorithm: SecurityAlgorithm,
        digest_type: DigestAlgorithm,
        digest: Vec<u8>,
    },

    /// A signature over an RRset.
    ///
    /// ```text
    ///                                     1  1  1  1  1  1
    ///       0  1  2  3  4  5  6  7  8  9  0  1  2  3  4  5
    ///     +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
    ///     |         TYPE COVERED          |
    ///     +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
    ///     |   ALGORITHM   |    LABELS     |
    ///     +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
    ///     |                 ORIGINAL TTL                  |
    ///     +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
    ///     |             SIGNATURE EXPIRATION              |
    ///     +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
    ///     |             SIGNATURE INCEPTION               |
    ///     +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
    ///     |            KEY TAG            |
    ///     +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
    ///     /                 SIGNER'S NAME                 /
    ///     +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
    ///     /                   SIGNATURE                   /
    ///     +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
    /// ```
    ///
    /// The `LABELS` field counts the labels of the original owner
    /// name, which is smaller than the expanded owner's label count
    /// when the record was synthesised from a wildcard.  See section
    /// 3.1 of RFC 4034.
    RRSIG {
        type_covered: RecordType,
        algorithm: SecurityAlgorithm,
        labels: u8,
        original_ttl: u32,
        expiration: u32,
        inception: u32,
        key_tag: u16,
        signer: DomainName,
        signature: Vec<u8>,
    },

    /// Authenticated denial of existence: the next owner name in
    /// canonical zone order, and the types present at this owner.  See
    /// section 4 of RFC 4034.
    NSEC {
        next_name: DomainName,
        types: TypeBitmap,
    },

    /// A public key for the zone.  `FLAGS` must have the zone-key bit
    /// set and `PROTOCOL` must be 3 for the key to be usable in
    /// validation.  See section 2 of RFC 4034.
    DNSKEY {
        flags: u16,
        protocol: u8,
        algorithm: SecurityAlgorithm,
        public_key: Vec<u8>,
    },

    /// Hashed authenticated denial of existence.  The owner name of an
    /// NSEC3 record is the base32hex hash of some name in the zone;
    /// `NEXT HASHED OWNER` is the following hash in hash order.  See
    /// section 3 of RFC 5155.
    NSEC3 {
        hash_algorithm: u8,
        flags: u8,
        iterations: u16,
        salt: Vec<u8>,
        next_hashed_owner: Vec<u8>,
        types: TypeBitmap,
    },

    /// Any other record.
    Unknown {
        tag: RecordTypeUnknown,
        octets: Vec<u8>,
    },
}

impl RecordTypeWithData {
    pub fn is_unknown(&self) -> bool {
        self.rtype().is_unknown()
    }

    pub fn matches(&self, qtype: &QueryType) -> bool {
        self.rtype().matches(qtype)
    }

    pub fn rtype(&self) -> RecordType {
        match self {
            RecordTypeWithData::A { .. } => RecordType::A,
            RecordTypeWithData::NS { .. } => RecordType::NS,
            RecordTypeWithData::CNAME { .. } => RecordType::CNAME,
            RecordTypeWithData::SOA { .. } => RecordType::SOA,
            RecordTypeWithData::PTR { .. } => RecordType::PTR,
            RecordTypeWithData::MX { .. } => RecordType::MX,
            RecordTypeWithData::TXT { .. } => RecordType::TXT,
            RecordTypeWithData::AAAA { .. } => RecordType::AAAA,
            RecordTypeWithData::DNAME { .. } => RecordType::DNAME,
            RecordTypeWithData::OPT { .. } => RecordType::OPT,
            RecordTypeWithData::DS { .. } => RecordType::DS,
            RecordTypeWithData::RRSIG { .. } => RecordType::RRSIG,
            RecordTypeWithData::NSEC { .. } => RecordType::NSEC,
            RecordTypeWithData::DNSKEY { .. } => RecordType::DNSKEY,
            RecordTypeWithData::NSEC3 { .. } => RecordType::NSEC3,
            RecordTypeWithData::Unknown { tag, .. } => RecordType::Unknown(*tag),
        }
    }
}

#[cfg(any(feature = "test-util", test))]
impl<'a> arbitrary::Arbitrary<'a> for RecordTypeWithData {
    // this is pretty verbose but it feels like a better way to
    // guarantee the max size of the `Vec<u8>`s than adding a wrapper
    // type
    fn arbitrary(u: &mut arbitrary::Unstructured<'a>) -> arbitrary::Result<Self> {
        let len = u.int_in_range(0..=128)?;
        let octets = Vec::from(u.bytes(len)?);

        let rtype_with_data = match u.arbitrary::<RecordType>()? {
            RecordType::A => RecordTypeWithData::A {
                address: u.arbitrary()?,
            },
            RecordType::NS => RecordTypeWithData::NS {
                nsdname: u.arbitrary()?,
            },
            RecordType::CNAME => RecordTypeWithData::CNAME {
                cname: u.arbitrary()?,
            },
            RecordType::SOA => RecordTypeWithData::SOA {
                mname: u.arbitrary()?,
                rname: u.arbitrary()?,
                serial: u.arbitrary()?,
                refresh: u.arbitrary()?,
                retry: u.arbitrary()?,
                expire: u.arbitrary()?,
                minimum: u.arbitrary()?,
            },
            RecordType::PTR => RecordTypeWithData::PTR {
                ptrdname: u.arbitrary()?,
            },
            RecordType::MX => RecordTypeWithData::MX {
                preference: u.arbitrary()?,
                exchange: u.arbitrary()?,
            },
            RecordType::TXT => RecordTypeWithData::TXT { octets },
            RecordType::AAAA => RecordTypeWithData::AAAA {
                address: u.arbitrary()?,
            },
            RecordType::DNAME => RecordTypeWithData::DNAME {
                target: u.arbitrary()?,
            },
            RecordType::OPT => RecordTypeWithData::OPT { octets },
            RecordType::DS => RecordTypeWithData::DS {
                key_tag: u.arbitrary()?,
                algorithm: u.arbitrary()?,
                digest_type: u.arbitrary()?,
                digest: octets,
            },
            RecordType::RRSIG => RecordTypeWithData::RRSIG {
                type_covered: u.arbitrary()?,
                algorithm: u.arbitrary()?,
                labels: u.arbitrary()?,
                original_ttl: u.arbitrary()?,
                expiration: u.arbitrary()?,
                inception: u.arbitrary()?,
                key_tag: u.arbitrary()?,
                signer: u.arbitrary()?,
                signature: octets,
            },
            RecordType::NSEC => RecordTypeWithData::NSEC {
                next_name: u.arbitrary()?,
                types: u.arbitrary()?,
            },
            RecordType::DNSKEY => RecordTypeWithData::DNSKEY {
                flags: u.arbitrary()?,
                protocol: u.arbitrary()?,
                algorithm: u.arbitrary()?,
                public_key: octets,
            },
            RecordType::NSEC3 => RecordTypeWithData::NSEC3 {
                hash_algorithm: u.arbitrary()?,
                flags: u.arbitrary()?,
                iterations: u.arbitrary()?,
                salt: {
                    let salt_len = u.int_in_range(0..=8)?;
                    Vec::from(u.bytes(salt_len)?)
                },
                next_hashed_owner: Vec::from(u.bytes(20)?),
                types: u.arbitrary()?,
            },
            RecordType::Unknown(tag) => RecordTypeWithData::Unknown { tag, octets },
        };
        Ok(rtype_with_data)
    }
}

/// The types present at some owner name, encoded as the window block /
/// bitmap sequence of RFC 4034 section 4.1.2.  Used by NSEC and NSEC3
/// records.
///
/// Each window covers 256 type values; a window's bitmap holds one bit
/// per type, most significant bit first, with trailing zero octets
/// trimmed.
#[derive(Debug, Clone, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct TypeBitmap {
    /// INVARIANT: windows are sorted by window number, each bitmap is
    /// 1 to 32 octets long with no trailing zero octet.
    windows: Vec<(u8, Vec<u8>)>,
}

impl TypeBitmap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a bitmap holding exactly the given types.
    #[allow(clippy::missing_panics_doc)]
    pub fn from_types(types: &[RecordType]) -> Self {
        let mut values: Vec<u16> = types.iter().map(|t| u16::from(*t)).collect();
        values.sort_unstable();
        values.dedup();

        let mut windows = Vec::<(u8, Vec<u8>)>::new();
        for value in values {
            let [window, low] = value.to_be_bytes();
            let octet = usize::from(low / 8);
            let bit = 0x80 >> (low % 8);

            if windows.last().map(|(w, _)| *w) != Some(window) {
                windows.push((window, Vec::new()));
            }
            // safe: a window was pushed just above if none matched
            let bitmap = &mut windows.last_mut().unwrap().1;
            if bitmap.len() <= octet {
                bitmap.resize(octet + 1, 0);
            }
            bitmap[octet] |= bit;
        }

        Self { windows }
    }

    /// Whether the bit for the given type is set.
    pub fn contains(&self, rtype: RecordType) -> bool {
        let [window, low] = u16::from(rtype).to_be_bytes();
        let octet = usize::from(low / 8);
        let bit = 0x80 >> (low % 8);

        for (w, bitmap) in &self.windows {
            if *w == window {
                return bitmap.get(octet).is_some_and(|o| o & bit != 0);
            }
        }
        false
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }

    #[allow(clippy::cast_possible_truncation)]
    pub fn to_octets(&self) -> Vec<u8> {
        let mut octets = Vec::new();
        for (window, bitmap) in &self.windows {
            octets.push(*window);
            // bitmap length is at most 32 by the invariant
            octets.push(bitmap.len() as u8);
            octets.extend_from_slice(bitmap);
        }
        octets
    }

    /// Parse a window block sequence occupying the whole given slice.
    ///
    /// Returns `None` if a block is truncated or its length field is
    /// outside the range 1 to 32.
    pub fn from_octets(octets: &[u8]) -> Option<Self> {
        let mut windows = Vec::new();
        let mut position = 0;
        while position < octets.len() {
            if position + 2 > octets.len() {
                return None;
            }
            let window = octets[position];
            let len = usize::from(octets[position + 1]);
            if len == 0 || len > 32 || position + 2 + len > octets.len() {
                return None;
            }
            windows.push((window, octets[position + 2..position + 2 + len].to_vec()));
            position += 2 + len;
        }
        Some(Self { windows })
    }
}

#[cfg(any(feature = "test-util", test))]
impl<'a> arbitrary::Arbitrary<'a> for TypeBitmap {
    fn arbitrary(u: &mut arbitrary::Unstructured<'a>) -> arbitrary::Result<Self> {
        let num_types = u.int_in_range::<usize>(0..=8)?;
        let mut types = Vec::with_capacity(num_types);
        for _ in 0..num_types {
            types.push(u.arbitrary::<RecordType>()?);
        }
        Ok(Self::from_types(&types))
    }
}

/// What sort of query this is.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum Opcode {
    Standard,
    Inverse,
    Status,
    Reserved(OpcodeReserved),
}

/// A struct with a private constructor, to ensure invalid `Opcode`s
/// cannot be created.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct OpcodeReserved(u8);

impl Opcode {
    pub fn is_reserved(&self) -> bool {
        matches!(self, Opcode::Reserved(_))
    }
}

impl From<u8> for Opcode {
    fn from(octet: u8) -> Self {
        match octet & 0b0000_1111 {
            0 => Opcode::Standard,
            1 => Opcode::Inverse,
            2 => Opcode::Status,
            other => Opcode::Reserved(OpcodeReserved(other)),
        }
    }
}

impl From<Opcode> for u8 {
    fn from(value: Opcode) -> Self {
        match value {
            Opcode::Standard => 0,
            Opcode::Inverse => 1,
            Opcode::Status => 2,
            Opcode::Reserved(OpcodeReserved(octet)) => octet,
        }
    }
}

#[cfg(any(feature = "test-util", test))]
impl<'a> arbitrary::Arbitrary<'a> for Opcode {
    fn arbitrary(u: &mut arbitrary::Unstructured<'a>) -> arbitrary::Result<Self> {
        Ok(Self::from(u.arbitrary::<u8>()?))
    }
}

/// What sort of response this is.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum Rcode {
    NoError,
    FormatError,
    ServerFailure,
    NameError,
    NotImplemented,
    Refused,
    Reserved(RcodeReserved),
}

/// A struct with a private constructor, to ensure invalid `Rcode`s
/// cannot be created.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct RcodeReserved(u8);

impl Rcode {
    pub fn is_reserved(&self) -> bool {
        matches!(self, Rcode::Reserved(_))
    }
}

impl From<u8> for Rcode {
    fn from(octet: u8) -> Self {
        match octet & 0b0000_1111 {
            0 => Rcode::NoError,
            1 => Rcode::FormatError,
            2 => Rcode::ServerFailure,
            3 => Rcode::NameError,
            4 => Rcode::NotImplemented,
            5 => Rcode::Refused,
            other => Rcode::Reserved(RcodeReserved(other)),
        }
    }
}

impl From<Rcode> for u8 {
    fn from(value: Rcode) -> Self {
        match value {
            Rcode::NoError => 0,
            Rcode::FormatError => 1,
            Rcode::ServerFailure => 2,
            Rcode::NameError => 3,
            Rcode::NotImplemented => 4,
            Rcode::Refused => 5,
            Rcode::Reserved(RcodeReserved(octet)) => octet,
        }
    }
}

#[cfg(any(feature = "test-util", test))]
impl<'a> arbitrary::Arbitrary<'a> for Rcode {
    fn arbitrary(u: &mut arbitrary::Unstructured<'a>) -> arbitrary::Result<Self> {
        Ok(Self::from(u.arbitrary::<u8>()?))
    }
}

/// A domain name is a sequence of labels, where each label is a length
/// octet followed by that number of octets.  Names are lowercased on
/// construction, so the `octets` field is always the canonical wire
/// form of RFC 4034 section 6.2.
///
/// A label must be 63 octets or shorter.  A name must be 255 octets
/// or shorter in total, including both length and label octets.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct DomainName {
    pub octets: Vec<u8>,
    pub labels: Vec<Vec<u8>>,
}

impl DomainName {
    pub fn root_domain() -> Self {
        DomainName {
            octets: vec![0],
            labels: vec![vec![]],
        }
    }

    pub fn is_root(&self) -> bool {
        self.octets.len() == 1 && self.labels.len() == 1
    }

    pub fn is_subdomain_of(&self, other: &DomainName) -> bool {
        self.labels.ends_with(&other.labels)
    }

    /// The number of labels, excluding the root.
    ///
    /// This is the quantity the LABELS field of an RRSIG record counts
    /// (RFC 4034 section 3.1.3).
    pub fn label_count(&self) -> usize {
        self.labels.len() - 1
    }

    pub fn is_wildcard(&self) -> bool {
        self.labels.first().map(Vec::as_slice) == Some(b"*")
    }

    /// The name with its leading label removed; `None` for the root.
    pub fn parent(&self) -> Option<Self> {
        if self.is_root() {
            None
        } else {
            Some(Self {
                octets: self.octets[1 + self.labels[0].len()..].to_vec(),
                labels: self.labels[1..].to_vec(),
            })
        }
    }

    /// The name with the `*` label prepended, or `None` if that would
    /// exceed the name length limit.
    pub fn wildcard(&self) -> Option<Self> {
        let mut labels = Vec::with_capacity(self.labels.len() + 1);
        labels.push(b"*".to_vec());
        labels.extend(self.labels.iter().cloned());
        Self::from_labels(labels)
    }

    /// Compare two names in the canonical DNS ordering of RFC 4034
    /// section 6.1: labels are compared right to left, each label as
    /// an octet string, with an absent label (the ancestor) sorting
    /// first.  Names are already lowercase so a plain octet comparison
    /// is case-insensitive.
    pub fn cmp_canonical(&self, other: &Self) -> Ordering {
        let mut xs = self.labels.iter().rev();
        let mut ys = other.labels.iter().rev();
        loop {
            match (xs.next(), ys.next()) {
                (None, None) => return Ordering::Equal,
                (None, Some(_)) => return Ordering::Less,
                (Some(_), None) => return Ordering::Greater,
                (Some(x), Some(y)) => match x.cmp(y) {
                    Ordering::Equal => (),
                    ord => return ord,
                },
            }
        }
    }

    pub fn to_dotted_string(&self) -> String {
        if self.octets == vec![0] {
            return ".".to_string();
        }

        let mut out = String::with_capacity(self.octets.len());
        let mut first = true;
        for label in &self.labels {
            if first {
                first = false;
            } else {
                out.push('.');
            }
            for octet in label {
                out.push(*octet as char);
            }
        }

        out
    }

    pub fn from_dotted_string(s: &str) -> Option<Self> {
        if s == "." {
            return Some(Self::root_domain());
        }

        let chunks = s.split('.').collect::<Vec<_>>();
        let mut labels = Vec::with_capacity(chunks.len());

        for (i, label) in chunks.iter().enumerate() {
            if label.is_empty() && i != chunks.len() - 1 {
                return None;
            }

            labels.push(label.as_bytes().into());
        }

        Self::from_labels(labels)
    }

    pub fn from_labels(mixed_case_labels: Vec<Vec<u8>>) -> Option<Self> {
        if mixed_case_labels.is_empty() {
            return None;
        }

        let mut labels = Vec::<Vec<u8>>::with_capacity(mixed_case_labels.len());
        let mut octets = Vec::<u8>::with_capacity(255);
        let mut blank_label = false;

        for mc_label in &mixed_case_labels {
            if blank_label {
                return None;
            }

            blank_label = mc_label.is_empty();

            match mc_label.len().try_into() {
                Ok(n) if n <= 63 => {
                    octets.push(n);
                    let mut label = Vec::<u8>::with_capacity(mc_label.len());
                    for octet in mc_label {
                        if !octet.is_ascii() {
                            return None;
                        }

                        let octet = octet.to_ascii_lowercase();
                        label.push(octet);
                        octets.push(octet);
                    }
                    labels.push(label);
                }
                _ => return None,
            }
        }

        if blank_label && octets.len() <= DOMAINNAME_MAX_LEN {
            Some(Self { octets, labels })
        } else {
            None
        }
    }
}

impl fmt::Debug for DomainName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DomainName")
            .field("to_dotted_string()", &self.to_dotted_string())
            .finish()
    }
}

impl fmt::Display for DomainName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_dotted_string())
    }
}

#[cfg(any(feature = "test-util", test))]
impl<'a> arbitrary::Arbitrary<'a> for DomainName {
    fn arbitrary(u: &mut arbitrary::Unstructured<'a>) -> arbitrary::Result<Self> {
        let num_labels = u.int_in_range::<usize>(0..=10)?;
        let mut octets = Vec::new();
        let mut labels = Vec::new();
        for _ in 0..num_labels {
            let label_len = u.int_in_range::<u8>(1..=20)?;
            let mut label = Vec::new();
            octets.push(label_len);
            let bs = u.bytes(label_len.into())?;
            for b in bs {
                let ascii_byte = if b.is_ascii() { *b } else { *b % 128 };
                let octet = if ascii_byte == b'.'
                    || ascii_byte == b'*'
                    || ascii_byte == b'@'
                    || ascii_byte == b'#'
                    || (ascii_byte as char).is_whitespace()
                {
                    b'x'
                } else {
                    ascii_byte.to_ascii_lowercase()
                };
                label.push(octet);
                octets.push(octet);
            }
            labels.push(label);
        }
        octets.push(0);
        labels.push(Vec::new());
        Ok(Self { octets, labels })
    }
}

/// Query types are a superset of record types.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum QueryType {
    Record(RecordType),
    Wildcard,
}

impl QueryType {
    pub fn is_unknown(&self) -> bool {
        match self {
            QueryType::Record(rtype) => rtype.is_unknown(),
            QueryType::Wildcard => false,
        }
    }
}

impl From<u16> for QueryType {
    fn from(value: u16) -> Self {
        match value {
            255 => QueryType::Wildcard,
            _ => QueryType::Record(RecordType::from(value)),
        }
    }
}

impl From<QueryType> for u16 {
    fn from(value: QueryType) -> Self {
        match value {
            QueryType::Wildcard => 255,
            QueryType::Record(rtype) => rtype.into(),
        }
    }
}

impl fmt::Display for QueryType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            QueryType::Record(rtype) => rtype.fmt(f),
            QueryType::Wildcard => write!(f, "ANY"),
        }
    }
}

#[cfg(any(feature = "test-util", test))]
impl<'a> arbitrary::Arbitrary<'a> for QueryType {
    fn arbitrary(u: &mut arbitrary::Unstructured<'a>) -> arbitrary::Result<Self> {
        Ok(Self::from(u.arbitrary::<u16>()?))
    }
}

/// Query classes are a superset of record classes.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum QueryClass {
    Record(RecordClass),
    Wildcard,
}

impl QueryClass {
    pub fn is_unknown(&self) -> bool {
        match self {
            QueryClass::Record(rclass) => rclass.is_unknown(),
            QueryClass::Wildcard => false,
        }
    }
}

impl From<u16> for QueryClass {
    fn from(value: u16) -> Self {
        match value {
            255 => QueryClass::Wildcard,
            _ => QueryClass::Record(RecordClass::from(value)),
        }
    }
}

impl From<QueryClass> for u16 {
    fn from(value: QueryClass) -> Self {
        match value {
            QueryClass::Wildcard => 255,
            QueryClass::Record(rclass) => rclass.into(),
        }
    }
}

impl fmt::Display for QueryClass {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            QueryClass::Record(rclass) => rclass.fmt(f),
            QueryClass::Wildcard => write!(f, "ANY"),
        }
    }
}

#[cfg(any(feature = "test-util", test))]
impl<'a> arbitrary::Arbitrary<'a> for QueryClass {
    fn arbitrary(u: &mut arbitrary::Unstructured<'a>) -> arbitrary::Result<Self> {
        Ok(Self::from(u.arbitrary::<u16>()?))
    }
}

/// Record types are used by resource records and by queries.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum RecordType {
    A,
    NS,
    CNAME,
    SOA,
    PTR,
    MX,
    TXT,
    AAAA,
    DNAME,
    OPT,
    DS,
    RRSIG,
    NSEC,
    DNSKEY,
    NSEC3,
    Unknown(RecordTypeUnknown),
}

/// A struct with a private constructor, to ensure invalid `RecordType`s
/// cannot be created.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct RecordTypeUnknown(u16);

impl RecordType {
    pub fn is_unknown(&self) -> bool {
        matches!(self, RecordType::Unknown(_))
    }

    pub fn matches(&self, qtype: &QueryType) -> bool {
        match qtype {
            QueryType::Wildcard => true,
            QueryType::Record(rtype) => rtype == self,
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RecordType::A => write!(f, "A"),
            RecordType::NS => write!(f, "NS"),
            RecordType::CNAME => write!(f, "CNAME"),
            RecordType::SOA => write!(f, "SOA"),
            RecordType::PTR => write!(f, "PTR"),
            RecordType::MX => write!(f, "MX"),
            RecordType::TXT => write!(f, "TXT"),
            RecordType::AAAA => write!(f, "AAAA"),
            RecordType::DNAME => write!(f, "DNAME"),
            RecordType::OPT => write!(f, "OPT"),
            RecordType::DS => write!(f, "DS"),
            RecordType::RRSIG => write!(f, "RRSIG"),
            RecordType::NSEC => write!(f, "NSEC"),
            RecordType::DNSKEY => write!(f, "DNSKEY"),
            RecordType::NSEC3 => write!(f, "NSEC3"),
            RecordType::Unknown(RecordTypeUnknown(n)) => write!(f, "{n}"),
        }
    }
}

impl From<u16> for RecordType {
    fn from(value: u16) -> Self {
        match value {
            1 => RecordType::A,
            2 => RecordType::NS,
            5 => RecordType::CNAME,
            6 => RecordType::SOA,
            12 => RecordType::PTR,
            15 => RecordType::MX,
            16 => RecordType::TXT,
            28 => RecordType::AAAA,
            39 => RecordType::DNAME,
            41 => RecordType::OPT,
            43 => RecordType::DS,
            46 => RecordType::RRSIG,
            47 => RecordType::NSEC,
            48 => RecordType::DNSKEY,
            50 => RecordType::NSEC3,
            _ => RecordType::Unknown(RecordTypeUnknown(value)),
        }
    }
}

impl From<RecordType> for u16 {
    fn from(value: RecordType) -> Self {
        match value {
            RecordType::A => 1,
            RecordType::NS => 2,
            RecordType::CNAME => 5,
            RecordType::SOA => 6,
            RecordType::PTR => 12,
            RecordType::MX => 15,
            RecordType::TXT => 16,
            RecordType::AAAA => 28,
            RecordType::DNAME => 39,
            RecordType::OPT => 41,
            RecordType::DS => 43,
            RecordType::RRSIG => 46,
            RecordType::NSEC => 47,
            RecordType::DNSKEY => 48,
            RecordType::NSEC3 => 50,
            RecordType::Unknown(RecordTypeUnknown(value)) => value,
        }
    }
}

#[cfg(any(feature = "test-util", test))]
impl<'a> arbitrary::Arbitrary<'a> for RecordType {
    fn arbitrary(u: &mut arbitrary::Unstructured<'a>) -> arbitrary::Result<Self> {
        Ok(Self::from(u.arbitrary::<u16>()?))
    }
}

/// Record classes are used by resource records and by queries.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum RecordClass {
    IN,
    Unknown(RecordClassUnknown),
}

/// A struct with a private constructor, to ensure invalid
/// `RecordClass`es cannot be created.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct RecordClassUnknown(u16);

impl RecordClass {
    pub fn is_unknown(&self) -> bool {
        matches!(self, RecordClass::Unknown(_))
    }

    pub fn matches(&self, qclass: &QueryClass) -> bool {
        match qclass {
            QueryClass::Wildcard => true,
            QueryClass::Record(rclass) => rclass == self,
        }
    }
}

impl From<u16> for RecordClass {
    fn from(value: u16) -> Self {
        match value {
            1 => RecordClass::IN,
            _ => RecordClass::Unknown(RecordClassUnknown(value)),
        }
    }
}

impl From<RecordClass> for u16 {
    fn from(value: RecordClass) -> Self {
        match value {
            RecordClass::IN => 1,
            RecordClass::Unknown(RecordClassUnknown(value)) => value,
        }
    }
}

impl fmt::Display for RecordClass {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RecordClass::IN => write!(f, "IN"),
            RecordClass::Unknown(RecordClassUnknown(n)) => write!(f, "{n}"),
        }
    }
}

#[cfg(any(feature = "test-util", test))]
impl<'a> arbitrary::Arbitrary<'a> for RecordClass {
    fn arbitrary(u: &mut arbitrary::Unstructured<'a>) -> arbitrary::Result<Self> {
        Ok(Self::from(u.arbitrary::<u16>()?))
    }
}

/// The signing algorithms of RFC 4034 appendix A.1 and their NSEC3
/// aliases from RFC 5155 section 11.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum SecurityAlgorithm {
    RsaMd5,
    DsaSha1,
    RsaSha1,
    DsaNsec3Sha1,
    RsaSha1Nsec3Sha1,
    Unknown(SecurityAlgorithmUnknown),
}

/// A struct with a private constructor, to ensure invalid
/// `SecurityAlgorithm`s cannot be created.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct SecurityAlgorithmUnknown(u8);

impl SecurityAlgorithm {
    pub fn is_unknown(&self) -> bool {
        matches!(self, SecurityAlgorithm::Unknown(_))
    }
}

impl From<u8> for SecurityAlgorithm {
    fn from(value: u8) -> Self {
        match value {
            1 => SecurityAlgorithm::RsaMd5,
            3 => SecurityAlgorithm::DsaSha1,
            5 => SecurityAlgorithm::RsaSha1,
            6 => SecurityAlgorithm::DsaNsec3Sha1,
            7 => SecurityAlgorithm::RsaSha1Nsec3Sha1,
            _ => SecurityAlgorithm::Unknown(SecurityAlgorithmUnknown(value)),
        }
    }
}

impl From<SecurityAlgorithm> for u8 {
    fn from(value: SecurityAlgorithm) -> Self {
        match value {
            SecurityAlgorithm::RsaMd5 => 1,
            SecurityAlgorithm::DsaSha1 => 3,
            SecurityAlgorithm::RsaSha1 => 5,
            SecurityAlgorithm::DsaNsec3Sha1 => 6,
            SecurityAlgorithm::RsaSha1Nsec3Sha1 => 7,
            SecurityAlgorithm::Unknown(SecurityAlgorithmUnknown(value)) => value,
        }
    }
}

impl fmt::Display for SecurityAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SecurityAlgorithm::RsaMd5 => write!(f, "RSAMD5"),
            SecurityAlgorithm::DsaSha1 => write!(f, "DSA"),
            SecurityAlgorithm::RsaSha1 => write!(f, "RSASHA1"),
            SecurityAlgorithm::DsaNsec3Sha1 => write!(f, "DSA-NSEC3-SHA1"),
            SecurityAlgorithm::RsaSha1Nsec3Sha1 => write!(f, "RSASHA1-NSEC3-SHA1"),
            SecurityAlgorithm::Unknown(SecurityAlgorithmUnknown(n)) => write!(f, "{n}"),
        }
    }
}

#[cfg(any(feature = "test-util", test))]
impl<'a> arbitrary::Arbitrary<'a> for SecurityAlgorithm {
    fn arbitrary(u: &mut arbitrary::Unstructured<'a>) -> arbitrary::Result<Self> {
        Ok(Self::from(u.arbitrary::<u8>()?))
    }
}

/// The DS digest algorithms of RFC 4034 appendix A.2 and RFC 4509.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum DigestAlgorithm {
    Sha1,
    Sha256,
    Unknown(DigestAlgorithmUnknown),
}

/// A struct with a private constructor, to ensure invalid
/// `DigestAlgorithm`s cannot be created.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct DigestAlgorithmUnknown(u8);

impl DigestAlgorithm {
    pub fn is_unknown(&self) -> bool {
        matches!(self, DigestAlgorithm::Unknown(_))
    }
}

impl From<u8> for DigestAlgorithm {
    fn from(value: u8) -> Self {
        match value {
            1 => DigestAlgorithm::Sha1,
            2 => DigestAlgorithm::Sha256,
            _ => DigestAlgorithm::Unknown(DigestAlgorithmUnknown(value)),
        }
    }
}

impl From<DigestAlgorithm> for u8 {
    fn from(value: DigestAlgorithm) -> Self {
        match value {
            DigestAlgorithm::Sha1 => 1,
            DigestAlgorithm::Sha256 => 2,
            DigestAlgorithm::Unknown(DigestAlgorithmUnknown(value)) => value,
        }
    }
}

#[cfg(any(feature = "test-util", test))]
impl<'a> arbitrary::Arbitrary<'a> for DigestAlgorithm {
    fn arbitrary(u: &mut arbitrary::Unstructured<'a>) -> arbitrary::Result<Self> {
        Ok(Self::from(u.arbitrary::<u8>()?))
    }
}


#[cfg(any(feature = "test-util", test))]
pub mod test_util {
    use super::*;

    use arbitrary::{Arbitrary, Unstructured};
    use fake::{Fake, Faker};

    pub fn arbitrary_resourcerecord() -> ResourceRecord {
        for size in [128, 256, 512, 1024, 2048, 4096] {
            let mut buf = Vec::new();
            for _ in 0..size {
                buf.push(Faker.fake());
            }

            if let Ok(rr) = ResourceRecord::arbitrary(&mut Unstructured::new(&buf)) {
                return rr;
            }
        }

        panic!("could not generate arbitrary value!");
    }

    pub fn arbitrary_domainname() -> DomainName {
        for size in [128, 256, 512] {
            let mut buf = Vec::new();
            for _ in 0..size {
                buf.push(Faker.fake());
            }

            if let Ok(name) = DomainName::arbitrary(&mut Unstructured::new(&buf)) {
                return name;
            }
        }

        panic!("could not generate arbitrary value!");
    }

    pub fn domain(name: &str) -> DomainName {
        DomainName::from_dotted_string(name).unwrap()
    }

    pub fn a_record(name: &str, address: Ipv4Addr) -> ResourceRecord {
        ResourceRecord {
            name: domain(name),
            rtype_with_data: RecordTypeWithData::A { address },
            rclass: RecordClass::IN,
            ttl: 300,
        }
    }

    pub fn aaaa_record(name: &str, address: Ipv6Addr) -> ResourceRecord {
        ResourceRecord {
            name: domain(name),
            rtype_with_data: RecordTypeWithData::AAAA { address },
            rclass: RecordClass::IN,
            ttl: 300,
        }
    }

    pub fn cname_record(name: &str, target_name: &str) -> ResourceRecord {
        ResourceRecord {
            name: domain(name),
            rtype_with_data: RecordTypeWithData::CNAME {
                cname: domain(target_name),
            },
            rclass: RecordClass::IN,
            ttl: 300,
        }
    }

    pub fn ns_record(superdomain_name: &str, nameserver_name: &str) -> ResourceRecord {
        ResourceRecord {
            name: domain(superdomain_name),
            rtype_with_data: RecordTypeWithData::NS {
                nsdname: domain(nameserver_name),
            },
            rclass: RecordClass::IN,
            ttl: 300,
        }
    }

    pub fn soa_record(apex: &str) -> ResourceRecord {
        ResourceRecord {
            name: domain(apex),
            rtype_with_data: RecordTypeWithData::SOA {
                mname: domain(&format!("ns1.{apex}")),
                rname: domain(&format!("hostmaster.{apex}")),
                serial: 1,
                refresh: 10800,
                retry: 3600,
                expire: 604_800,
                minimum: 300,
            },
            rclass: RecordClass::IN,
            ttl: 300,
        }
    }

    pub fn unknown_record(name: &str, octets: &[u8]) -> ResourceRecord {
        ResourceRecord {
            name: domain(name),
            rtype_with_data: RecordTypeWithData::Unknown {
                tag: RecordTypeUnknown(100),
                octets: octets.into(),
            },
            rclass: RecordClass::IN,
            ttl: 300,
        }
    }
}
