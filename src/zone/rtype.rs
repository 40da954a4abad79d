/// Resource record types understood by the zone management core. This is
/// richer than [`crate::shared::dns::RecordType`] (the wire layer's type
/// set): it adds the types needed for delegation, aliasing and DNSSEC that
/// the wire codec does not carry, plus the synthetic [`RRType::FWD`]
/// pseudo-type used internally by forwarder zones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RRType {
    A,
    AAAA,
    NS,
    CNAME,
    DNAME,
    SOA,
    PTR,
    HINFO,
    MX,
    TXT,
    SRV,
    SVCB,
    HTTPS,
    DS,
    DNSKEY,
    RRSIG,
    NSEC,
    NSEC3,
    NSEC3PARAM,
    /// Synthetic, zone-management-only type: a forwarder target attached
    /// to a [`crate::zone::apex::ApexZoneType::Forwarder`] apex or one of
    /// its subdomains. Never appears on the wire.
    FWD,
}

impl RRType {
    /// Types that participate in DNSSEC authenticated denial-of-existence
    /// and signing bookkeeping but are never themselves queried directly
    /// by clients asking for "the" record at a name.
    pub fn is_dnssec_meta(&self) -> bool {
        matches!(
            self,
            RRType::RRSIG | RRType::NSEC | RRType::NSEC3 | RRType::NSEC3PARAM | RRType::DNSKEY
        )
    }

    /// Reports whether the type can carry in-bailiwick glue (A/AAAA),
    /// i.e. whether it is itself a name-server referencing type.
    pub fn is_address(&self) -> bool {
        matches!(self, RRType::A | RRType::AAAA)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RRType::A => "A",
            RRType::AAAA => "AAAA",
            RRType::NS => "NS",
            RRType::CNAME => "CNAME",
            RRType::DNAME => "DNAME",
            RRType::SOA => "SOA",
            RRType::PTR => "PTR",
            RRType::HINFO => "HINFO",
            RRType::MX => "MX",
            RRType::TXT => "TXT",
            RRType::SRV => "SRV",
            RRType::SVCB => "SVCB",
            RRType::HTTPS => "HTTPS",
            RRType::DS => "DS",
            RRType::DNSKEY => "DNSKEY",
            RRType::RRSIG => "RRSIG",
            RRType::NSEC => "NSEC",
            RRType::NSEC3 => "NSEC3",
            RRType::NSEC3PARAM => "NSEC3PARAM",
            RRType::FWD => "FWD",
        }
    }
}

impl std::fmt::Display for RRType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
