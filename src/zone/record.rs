use crate::shared::dns::Name;
use crate::zone::rtype::RRType;
use std::time::SystemTime;

/// The resource data carried by a [`Record`]. One variant per supported
/// [`RRType`] (with the exception of the raw opaque bytes used for rarely
/// touched DNSSEC pseudo-types we relay but never synthesize).
#[derive(Debug, Clone, PartialEq)]
pub enum RData {
    A { address: [u8; 4] },
    AAAA { address: [u8; 16] },
    NS { name: Name },
    CName { name: Name },
    DName { target: Name },
    Soa {
        primary_ns: Name,
        responsible: Name,
        serial: u32,
        refresh: u32,
        retry: u32,
        expire: u32,
        minimum: u32,
    },
    Ptr { name: Name },
    HInfo { cpu: String, os: String },
    Mx { preference: u16, exchange: Name },
    Txt { strings: Vec<String> },
    Srv { priority: u16, weight: u16, port: u16, target: Name },
    Svcb { priority: u16, target: Name, params: Vec<(u16, Vec<u8>)> },
    Https { priority: u16, target: Name, params: Vec<(u16, Vec<u8>)> },
    Ds { key_tag: u16, algorithm: u8, digest_type: u8, digest: Vec<u8> },
    DnsKey { flags: u16, protocol: u8, algorithm: u8, public_key: Vec<u8> },
    RrSig {
        type_covered: RRType,
        algorithm: u8,
        labels: u8,
        original_ttl: u32,
        expiration: u32,
        inception: u32,
        key_tag: u16,
        signer_name: Name,
        signature: Vec<u8>,
    },
    Nsec { next_owner: Name, types: Vec<RRType> },
    Nsec3 {
        hash_algorithm: u8,
        flags: u8,
        iterations: u16,
        salt: Vec<u8>,
        next_hashed_owner: Vec<u8>,
        types: Vec<RRType>,
    },
    Nsec3Param { hash_algorithm: u8, flags: u8, iterations: u16, salt: Vec<u8> },
    Fwd { forwarder: String, priority: u16, dnssec_validation: bool },
}

impl RData {
    pub fn rtype(&self) -> RRType {
        match self {
            RData::A { .. } => RRType::A,
            RData::AAAA { .. } => RRType::AAAA,
            RData::NS { .. } => RRType::NS,
            RData::CName { .. } => RRType::CNAME,
            RData::DName { .. } => RRType::DNAME,
            RData::Soa { .. } => RRType::SOA,
            RData::Ptr { .. } => RRType::PTR,
            RData::HInfo { .. } => RRType::HINFO,
            RData::Mx { .. } => RRType::MX,
            RData::Txt { .. } => RRType::TXT,
            RData::Srv { .. } => RRType::SRV,
            RData::Svcb { .. } => RRType::SVCB,
            RData::Https { .. } => RRType::HTTPS,
            RData::Ds { .. } => RRType::DS,
            RData::DnsKey { .. } => RRType::DNSKEY,
            RData::RrSig { .. } => RRType::RRSIG,
            RData::Nsec { .. } => RRType::NSEC,
            RData::Nsec3 { .. } => RRType::NSEC3,
            RData::Nsec3Param { .. } => RRType::NSEC3PARAM,
            RData::Fwd { .. } => RRType::FWD,
        }
    }
}

/// Serial numbering scheme for a Primary zone's SOA.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SerialScheme {
    Monotonic,
    /// `YYYYMMDDnn`, the `nn` sequence bumped for same-day updates.
    DateEncoded,
}

/// Per-record tagged metadata, keyed by the record's type so unrelated
/// types never carry each other's fields in one generic attribute bag.
#[derive(Debug, Clone)]
pub enum Tag {
    Generic(GenericInfo),
    Ns(NsInfo),
    Soa(SoaInfo),
    Svcb(SvcbInfo),
}

#[derive(Debug, Clone, Default)]
pub struct GenericInfo {
    pub disabled: bool,
    pub comments: Option<String>,
}

/// Attached to NS records. Glue is stored here rather than as independent
/// queryable A/AAAA records.
#[derive(Debug, Clone, Default)]
pub struct NsInfo {
    pub generic: GenericInfo,
    pub glue: Vec<Record>,
}

#[derive(Debug, Clone)]
pub struct SoaInfo {
    pub generic: GenericInfo,
    pub serial_scheme: SerialScheme,
}

impl Default for SoaInfo {
    fn default() -> Self {
        SoaInfo { generic: GenericInfo::default(), serial_scheme: SerialScheme::Monotonic }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SvcbInfo {
    pub generic: GenericInfo,
    pub auto_hint: bool,
    pub last_used: Option<SystemTime>,
}

impl Tag {
    pub fn generic(&self) -> &GenericInfo {
        match self {
            Tag::Generic(g) => g,
            Tag::Ns(n) => &n.generic,
            Tag::Soa(s) => &s.generic,
            Tag::Svcb(s) => &s.generic,
        }
    }

    pub fn is_disabled(&self) -> bool {
        self.generic().disabled
    }

    pub fn glue(&self) -> &[Record] {
        match self {
            Tag::Ns(n) => &n.glue,
            _ => &[],
        }
    }
}

/// A DNS resource record: `(name, type, class, ttl, rdata, tag)`.
/// Class is always IN in this core.
#[derive(Debug, Clone)]
pub struct Record {
    pub name: Name,
    pub ttl: u32,
    pub rdata: RData,
    pub tag: Tag,
}

impl Record {
    pub fn new(name: Name, ttl: u32, rdata: RData) -> Self {
        let tag = match &rdata {
            RData::NS { .. } => Tag::Ns(NsInfo::default()),
            RData::Soa { .. } => Tag::Soa(SoaInfo::default()),
            RData::Svcb { .. } | RData::Https { .. } => Tag::Svcb(SvcbInfo::default()),
            _ => Tag::Generic(GenericInfo::default()),
        };
        Record { name, ttl, rdata, tag }
    }

    pub fn rtype(&self) -> RRType {
        self.rdata.rtype()
    }

    pub fn is_disabled(&self) -> bool {
        self.tag.is_disabled()
    }

    /// Reports whether `other` carries identical owner/type/rdata, the
    /// uniqueness key within an [`RRSet`] (rdata values are unique).
    pub fn same_data(&self, other: &Record) -> bool {
        self.name == other.name && self.rdata == other.rdata
    }
}

/// A set of records sharing `(name, type)`. TTLs are aligned on
/// publication; a transfer-in may re-align a mismatched TTL across the set.
#[derive(Debug, Clone, Default)]
pub struct RRSet {
    records: Vec<Record>,
}

impl RRSet {
    pub fn new() -> Self {
        RRSet { records: vec![] }
    }

    pub fn from_records(records: Vec<Record>) -> Self {
        RRSet { records }
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn active_records(&self) -> impl Iterator<Item = &Record> {
        self.records.iter().filter(|r| !r.is_disabled())
    }

    pub fn rtype(&self) -> Option<RRType> {
        self.records.first().map(|r| r.rtype())
    }

    /// Inserts or replaces a record with identical rdata. Re-aligns the TTL
    /// of every sibling record in the set to the incoming TTL, matching the
    /// "TTLs must be identical on publication" invariant.
    pub fn upsert(&mut self, record: Record) {
        if let Some(existing) = self.records.iter_mut().find(|r| r.same_data(&record)) {
            *existing = record;
        } else {
            self.records.push(record);
        }
        let ttl = self.records.last().map(|r| r.ttl).unwrap_or(0);
        for r in &mut self.records {
            r.ttl = ttl;
        }
    }

    pub fn remove_matching(&mut self, record: &Record) -> bool {
        let before = self.records.len();
        self.records.retain(|r| !r.same_data(record));
        self.records.len() != before
    }

    pub fn set_all(&mut self, records: Vec<Record>) {
        self.records = records;
    }
}
