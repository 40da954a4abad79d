//! Conversions between this core's in-memory [`crate::zone::record::Record`]
//! model and the wire-level `shared::dns` types, plus the response builder
//! that turns a [`crate::zone::query::QueryResponse`] into an outgoing
//! [`dns::Message`]. The wire codec itself (the byte-level parser/encoder)
//! stays entirely in `shared::dns`; this module only bridges the two record
//! models for the subset of types the wire layer already understands
//! (`A`/`NS`/`CNAME`/`SOA`/`PTR`/`HINFO`/`MX`/`TXT`). Newer types this core
//! introduces for DNSSEC, aliasing and forwarding (`AAAA`, `DNAME`, `SRV`,
//! `SVCB`, `HTTPS`, `DS`, `DNSKEY`, `RRSIG`, `NSEC`, `NSEC3`, `NSEC3PARAM`,
//! `FWD`) have no wire representation in `shared::dns` yet and are skipped
//! when assembling sections, consistent with that layer being out of this
//! core's scope.

use crate::shared::dns;
use crate::zone::query::QueryResponse;
use crate::zone::record::{RData, Record};
use crate::zone::rtype::RRType;

/// Converts a wire [`dns::RecordType`] to this core's richer [`RRType`].
/// Returns `None` for wire types this core has no matching variant for
/// (`WKS` and the historical/experimental types `shared::dns` never
/// constructs records for).
pub fn rtype_from_wire(rtype: dns::RecordType) -> Option<RRType> {
    use dns::RecordType as W;
    Some(match rtype {
        W::A => RRType::A,
        W::NS => RRType::NS,
        W::CNAME => RRType::CNAME,
        W::SOA => RRType::SOA,
        W::PTR => RRType::PTR,
        W::HINFO => RRType::HINFO,
        W::MX => RRType::MX,
        W::TXT => RRType::TXT,
        _ => return None,
    })
}

/// Converts a [`Record`] to its wire [`dns::Record`] counterpart, if the
/// wire layer carries that type. Disabled records are never converted —
/// callers must filter with [`Record::is_disabled`]/`RRSet::active_records`
/// before calling this.
pub fn record_to_wire(record: &Record) -> Option<dns::Record> {
    let node = record.name.clone();
    let class = dns::Class::IN;
    let ttl = record.ttl;
    Some(match &record.rdata {
        RData::A { address } => dns::Record::A { node, class, ttl, data_len: 4, address: *address },
        RData::NS { name } => dns::Record::NS { node, class, ttl, data_len: 0, name: name.clone() },
        RData::CName { name } => dns::Record::CNAME { node, class, ttl, data_len: 0, name: name.clone() },
        RData::Soa { primary_ns, responsible, serial, refresh, retry, expire, minimum } => dns::Record::SOA {
            node,
            class,
            ttl,
            data_len: 0,
            ns_name: primary_ns.clone(),
            ml_name: responsible.clone(),
            serial: *serial,
            refresh: *refresh,
            retry: *retry,
            expire: *expire,
            minimum: *minimum,
        },
        RData::Ptr { name } => dns::Record::PTR { node, class, ttl, data_len: 0, name: name.clone() },
        RData::HInfo { cpu, os } => {
            dns::Record::HINFO { node, class, ttl, data_len: 0, cpu: cpu.clone(), os: os.clone() }
        }
        RData::Mx { preference, exchange } => {
            dns::Record::MX { node, class, ttl, data_len: 0, priority: *preference, name: exchange.clone() }
        }
        RData::Txt { strings } => dns::Record::TXT { node, class, ttl, data_len: 0, txts: strings.clone() },
        // AAAA, DNAME, SRV, SVCB, HTTPS, DS, DNSKEY, RRSIG, NSEC, NSEC3,
        // NSEC3PARAM, FWD: no wire counterpart yet.
        _ => return None,
    })
}

/// Converts a batch of zone records to wire records, silently dropping any
/// the wire layer can't carry (logged once by the caller if it cares —
/// the zone core itself never blocks on logging, per the log sink design).
fn to_wire_batch(records: &[Record]) -> Vec<dns::Record> {
    records.iter().filter_map(record_to_wire).collect()
}

/// The outcome of [`build_response`]: the finished `answers`/`authorities`/
/// `additionals` sections plus the response code and authoritative bit to
/// stamp into the header, left for the caller to fold into a full
/// [`dns::Message`] alongside the original question.
pub struct WireResponse {
    pub resp_code: dns::RespCode,
    pub authoritative: bool,
    pub answers: Vec<dns::Record>,
    pub authorities: Vec<dns::Record>,
    pub additionals: Vec<dns::Record>,
}

/// Builds the wire sections for `response`. AA is set whenever the core
/// produced an authoritative outcome (answer, referral, NODATA, NXDOMAIN);
/// it is left unset for `Forward`/`NotAuthoritative`, which the caller
/// handles by recursing or refusing rather than answering itself.
pub fn build_response(response: &QueryResponse) -> WireResponse {
    match response {
        QueryResponse::Answer { records, additionals, nsec, .. } => WireResponse {
            resp_code: dns::RespCode::NoError,
            authoritative: true,
            answers: to_wire_batch(records),
            authorities: to_wire_batch(nsec),
            additionals: to_wire_batch(additionals),
        },
        QueryResponse::Referral { ns_records, glue, .. } => WireResponse {
            resp_code: dns::RespCode::NoError,
            authoritative: false,
            answers: vec![],
            authorities: to_wire_batch(ns_records),
            additionals: to_wire_batch(glue),
        },
        QueryResponse::NoData { soa, nsec } => WireResponse {
            resp_code: dns::RespCode::NoError,
            authoritative: true,
            answers: vec![],
            authorities: to_wire_batch(&soa.iter().cloned().chain(nsec.iter().cloned()).collect::<Vec<_>>()),
            additionals: vec![],
        },
        QueryResponse::NxDomain { soa, nsec } => WireResponse {
            resp_code: dns::RespCode::NxDomain,
            authoritative: true,
            answers: vec![],
            authorities: to_wire_batch(&soa.iter().cloned().chain(nsec.iter().cloned()).collect::<Vec<_>>()),
            additionals: vec![],
        },
        QueryResponse::Forward { .. } => WireResponse {
            resp_code: dns::RespCode::NoError,
            authoritative: false,
            answers: vec![],
            authorities: vec![],
            additionals: vec![],
        },
        QueryResponse::NotAuthoritative => WireResponse {
            resp_code: dns::RespCode::Refused,
            authoritative: false,
            answers: vec![],
            authorities: vec![],
            additionals: vec![],
        },
    }
}

/// Assembles the full outgoing [`dns::Message`] for `request`, applying the
/// flag semantics: AA per [`build_response`], TC always unset (this core
/// never truncates — that is the transport layer's job when a reply
/// exceeds the datagram size), RA mirrors `recursion_allowed`, AD is never
/// set by this core.
pub fn to_message(request: &dns::Message, response: &QueryResponse, recursion_allowed: bool) -> dns::Message {
    let wire = build_response(response);
    let header = dns::Header {
        query_resp: true,
        auth_answer: wire.authoritative,
        truncated: false,
        recursion_available: recursion_allowed,
        z: 0,
        resp_code: wire.resp_code,
        questions_count: request.header.questions_count,
        answers_count: wire.answers.len() as u16,
        authorities_count: wire.authorities.len() as u16,
        additionals_count: wire.additionals.len() as u16,
        ..request.header.clone()
    };
    dns::Message {
        header,
        questions: request.questions.clone(),
        answers: wire.answers,
        authorities: wire.authorities,
        additionals: wire.additionals,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::dns::Name;

    #[test]
    fn a_record_round_trips_through_wire() {
        let rec = Record::new(Name::from_string("www.example.com.").unwrap(), 300, RData::A { address: [1, 2, 3, 4] });
        let wire = record_to_wire(&rec).unwrap();
        assert_eq!(wire.record_type(), dns::RecordType::A);
        assert_eq!(wire.a_data(), &[1, 2, 3, 4]);
    }

    #[test]
    fn unsupported_type_has_no_wire_form() {
        let rec = Record::new(
            Name::from_string("www.example.com.").unwrap(),
            300,
            RData::AAAA { address: [0; 16] },
        );
        assert!(record_to_wire(&rec).is_none());
    }

    #[test]
    fn nxdomain_sets_resp_code_and_drops_answers() {
        let resp = QueryResponse::NxDomain { soa: None, nsec: vec![] };
        let wire = build_response(&resp);
        assert!(matches!(wire.resp_code, dns::RespCode::NxDomain));
        assert!(wire.answers.is_empty());
    }

    #[test]
    fn not_authoritative_refuses() {
        let wire = build_response(&QueryResponse::NotAuthoritative);
        assert!(matches!(wire.resp_code, dns::RespCode::Refused));
        assert!(!wire.authoritative);
    }
}
