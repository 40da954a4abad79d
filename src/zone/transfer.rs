use crate::shared::dns::Name;
use crate::zone::apex::ApexZone;
use crate::zone::errors::{ZoneError, ZoneResult};
use crate::zone::journal::{Journal, JournalEntry};
use crate::zone::record::{RData, Record};
use crate::zone::rtype::RRType;
use std::net::SocketAddr;

/// External collaborator that performs the actual network leg of a zone
/// refresh. Pulling bytes off a socket and framing them into a
/// [`TransferMessage`] is wire-layer work outside this crate's scope (see
/// the DNS datagram boundary in `zone::dnssec`'s [`crate::zone::dnssec::ZoneSigner`]);
/// the refresh scheduler only needs something that, given a zone and its
/// configured primaries, comes back with a reply to apply.
pub trait TransferClient: Send + Sync {
    /// Attempts an IXFR (if `current_serial` is `Some`) or AXFR (if `None`)
    /// against one of `primaries` for `zone`.
    fn fetch(&self, zone: &Name, primaries: &[SocketAddr], current_serial: Option<u32>) -> ZoneResult<TransferMessage>;
}

/// Default [`TransferClient`] for deployments that wire in no outbound
/// transport: every attempt reports `OperationNotSupported`, so a
/// Secondary/Stub zone's refresh timer runs (and its state machine still
/// ages through Failed/Expired) but never actually fetches data until a
/// real client is plugged in by the host process.
pub struct UnimplementedTransferClient;

impl TransferClient for UnimplementedTransferClient {
    fn fetch(&self, _zone: &Name, _primaries: &[SocketAddr], _current_serial: Option<u32>) -> ZoneResult<TransferMessage> {
        Err(ZoneError::OperationNotSupported("no transfer client configured".into()))
    }
}

/// The records of one zone-transfer reply, framed between the zone's SOA
/// at both ends.
#[derive(Debug, Clone)]
pub struct TransferMessage {
    pub records: Vec<Record>,
}

/// Produces a full AXFR reply: SOA, then every active record in the zone
/// (including subdomain nodes under this apex), then SOA again.
pub fn produce_axfr(apex: &ApexZone, subdomain_records: Vec<Record>) -> ZoneResult<TransferMessage> {
    let soa = apex.soa().ok_or_else(|| ZoneError::InvalidZoneTransfer("zone has no SOA".into()))?;

    let mut records = vec![soa.clone()];
    for (rtype, set) in apex.root.get_all() {
        if rtype == RRType::SOA {
            continue;
        }
        records.extend(set.active_records().cloned());
    }
    records.extend(subdomain_records);
    records.push(soa);
    Ok(TransferMessage { records })
}

/// The outcome of an IXFR request: either a walkable diff, or a signal
/// that the requester is too far behind and must fall back to AXFR.
pub enum IxfrOutcome {
    UpToDate(TransferMessage),
    Diff(TransferMessage),
    FallBackToAxfr,
}

/// Produces an IXFR reply for a client presenting `client_serial`: a
/// single current SOA if already caught up, a condensed diff if the
/// journal covers the gap, or a signal to fall back to AXFR.
pub fn produce_ixfr(apex: &ApexZone, journal: &Journal, client_serial: u32) -> ZoneResult<IxfrOutcome> {
    let soa = apex.soa().ok_or_else(|| ZoneError::InvalidZoneTransfer("zone has no SOA".into()))?;
    let current_serial = apex.serial().unwrap_or(0);

    if client_serial == current_serial {
        return Ok(IxfrOutcome::UpToDate(TransferMessage { records: vec![soa] }));
    }

    let Some(entries) = journal.entries_since(client_serial) else {
        return Ok(IxfrOutcome::FallBackToAxfr);
    };
    if entries.is_empty() {
        return Ok(IxfrOutcome::FallBackToAxfr);
    }

    // The per-increment walk is condensed into a single diff before
    // being handed to the client, regardless of how many journal entries
    // it spanned.
    condense_incremental_zone_transfer(apex, &entries).map(IxfrOutcome::Diff)
}

/// Condenses a contiguous run of journal entries into the single diff an
/// IXFR client is handed regardless of how many increments the walk
/// spanned. Cancellation across the run is done by
/// [`Journal::condense`]; this function only reframes the result into the
/// wire layout `[newestSOA, firstDeletedSOA, deletions…, deletedGlue…,
/// lastAddedSOA, additions…, addedGlue…, newestSOA]`, separating glue
/// (A/AAAA owned below the apex — or, for the root zone, every A/AAAA)
/// from the ordinary deletion/addition batches.
pub fn condense_incremental_zone_transfer(apex: &ApexZone, entries: &[JournalEntry]) -> ZoneResult<TransferMessage> {
    if entries.is_empty() {
        return Err(ZoneError::InvalidZoneTransfer("nothing to condense".into()));
    }
    let soa = apex.soa().ok_or_else(|| ZoneError::InvalidZoneTransfer("zone has no SOA".into()))?;
    let condensed = Journal::condense(entries);

    let apex_name = apex.name();
    let is_glue = |r: &Record| r.rtype().is_address() && (apex_name.is_root() || r.name != apex_name);

    let (deleted_glue, deletions): (Vec<Record>, Vec<Record>) = condensed.removed.into_iter().partition(&is_glue);
    let (added_glue, additions): (Vec<Record>, Vec<Record>) = condensed.added.into_iter().partition(&is_glue);

    let newest_soa = soa_at_serial(&soa, condensed.to_serial);
    let first_deleted_soa = soa_at_serial(&soa, condensed.from_serial);
    let last_added_soa = newest_soa.clone();

    let mut records = vec![newest_soa.clone(), first_deleted_soa];
    records.extend(deletions);
    records.extend(deleted_glue);
    records.push(last_added_soa);
    records.extend(additions);
    records.extend(added_glue);
    records.push(newest_soa);

    Ok(TransferMessage { records })
}

fn soa_at_serial(soa: &Record, serial: u32) -> Record {
    let mut soa = soa.clone();
    if let RData::Soa { serial: s, .. } = &mut soa.rdata {
        *s = serial;
    }
    soa
}

/// Applies a full AXFR reply to a Secondary/Stub zone: validates SOA
/// framing and replaces the zone contents wholesale.
pub fn sync_zone_transfer(message: &TransferMessage) -> ZoneResult<(Record, Vec<Record>)> {
    let first =
        message.records.first().ok_or_else(|| ZoneError::InvalidZoneTransfer("empty transfer".into()))?;
    let last =
        message.records.last().ok_or_else(|| ZoneError::InvalidZoneTransfer("empty transfer".into()))?;
    if first.rtype() != RRType::SOA || last.rtype() != RRType::SOA {
        return Err(ZoneError::InvalidZoneTransfer("transfer not framed by SOA".into()));
    }
    if !first.same_data(last) {
        return Err(ZoneError::InvalidZoneTransfer("framing SOA mismatch".into()));
    }
    let body = message.records[1..message.records.len() - 1].to_vec();
    Ok((first.clone(), body))
}

/// Applies an IXFR diff to a Secondary/Stub zone, returning the ordered
/// list of `(from_serial, removed, to_serial, added)` batches to apply in
/// sequence — the serials let the caller enforce that each sequence's
/// deleted-SOA serial equals the zone's current serial before it lands.
/// Validates that every inner SOA pair is well-formed before returning
/// anything, so a malformed diff is rejected atomically rather than
/// partially applied.
pub fn sync_incremental_zone_transfer(
    message: &TransferMessage,
) -> ZoneResult<Vec<(u32, Vec<Record>, u32, Vec<Record>)>> {
    let records = &message.records;
    if records.len() < 2 || records[0].rtype() != RRType::SOA || records.last().unwrap().rtype() != RRType::SOA {
        return Err(ZoneError::InvalidZoneTransfer("transfer not framed by SOA".into()));
    }
    if records.len() == 2 {
        // Up-to-date reply: a single repeated SOA, nothing to apply.
        return Ok(vec![]);
    }

    let mut batches = Vec::new();
    let mut i = 1;
    while i < records.len() - 1 {
        if records[i].rtype() != RRType::SOA {
            return Err(ZoneError::InvalidZoneTransfer("expected SOA starting increment".into()));
        }
        let from_serial = serial_of(&records[i])?;
        let mut removed = Vec::new();
        i += 1;
        while i < records.len() - 1 && records[i].rtype() != RRType::SOA {
            removed.push(records[i].clone());
            i += 1;
        }
        if i >= records.len() - 1 || records[i].rtype() != RRType::SOA {
            return Err(ZoneError::InvalidZoneTransfer("increment missing second SOA".into()));
        }
        let to_serial = serial_of(&records[i])?;
        let mut added = Vec::new();
        i += 1;
        while i < records.len() - 1 && records[i].rtype() != RRType::SOA {
            added.push(records[i].clone());
            i += 1;
        }
        batches.push((from_serial, removed, to_serial, added));
    }
    Ok(batches)
}

fn serial_of(record: &Record) -> ZoneResult<u32> {
    match record.rdata {
        RData::Soa { serial, .. } => Ok(serial),
        _ => Err(ZoneError::InvalidZoneTransfer("expected a SOA record".into())),
    }
}
