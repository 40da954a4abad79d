//! Administrative entry point over the [`ZoneTree`]: creates, converts and
//! deletes apex zones, mutates their records, drives DNSSEC signing, and
//! owns the debounced zone-file save timer. Query resolution itself stays
//! in `zone::query`; this module only assembles the pieces that function
//! needs (the tree, the apex index, the NSEC3 parameter table) and exposes
//! them behind one administrative surface.

use crate::shared::dns::Name;
use crate::zone::apex::{ApexVariant, ApexZone, ApexZoneBehavior, ApexZoneInfo, ApexZoneType, DnssecStatus};
use crate::zone::dnssec::{self, Nsec3Params, ZoneSigner};
use crate::zone::errors::{ensure_in_bailiwick, invalid_record, ZoneError, ZoneResult};
use crate::zone::journal::{Journal, JournalEntry};
use crate::zone::log_sink;
use crate::zone::query::{self, QueryRequest, QueryResponse};
use crate::zone::record::{GenericInfo, NsInfo, RData, Record, RRSet, SerialScheme, SoaInfo, Tag};
use crate::zone::refresh::{self, RefreshState, RefreshTimers};
use crate::zone::rtype::RRType;
use crate::zone::transfer::{self, TransferClient};
use crate::zone::tree::{ApexMarker, ZoneTree};
use crate::zone::zonefile;
use std::cmp::Reverse;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, RwLock};
use std::thread;
use std::time::{Duration, SystemTime};

#[derive(Default)]
struct SaveState {
    pending: HashSet<Name>,
    timer_armed: bool,
}

struct Inner {
    tree: ZoneTree,
    apexes: RwLock<BTreeMap<String, Arc<ApexZone>>>,
    config_root: PathBuf,
    save: Mutex<SaveState>,
    save_interval: Duration,
    signer: Arc<dyn ZoneSigner>,
    nsec3_params: RwLock<HashMap<Name, Nsec3Params>>,
    server_domain: RwLock<Name>,
    transfer_client: Arc<dyn TransferClient>,
}

/// Owns every apex zone this process serves and every piece of state a
/// zone needs beyond the tree: the sorted admin index, the debounced save
/// timer, and the signer/NSEC3 parameters DNSSEC operations drive.
/// Cheaply `Clone`-able (an `Arc` around the shared state), matching how
/// the handler and background workers each keep their own handle.
#[derive(Clone)]
pub struct ZoneManager {
    inner: Arc<Inner>,
}

fn key(name: &Name) -> String {
    name.as_ref().to_ascii_lowercase()
}

impl ZoneManager {
    pub fn new(
        config_root: impl Into<PathBuf>,
        signer: Arc<dyn ZoneSigner>,
        server_domain: Name,
        save_interval: Duration,
        transfer_client: Arc<dyn TransferClient>,
    ) -> Self {
        ZoneManager {
            inner: Arc::new(Inner {
                tree: ZoneTree::new(),
                apexes: RwLock::new(BTreeMap::new()),
                config_root: config_root.into(),
                save: Mutex::new(SaveState::default()),
                save_interval,
                signer,
                nsec3_params: RwLock::new(HashMap::new()),
                server_domain: RwLock::new(server_domain),
                transfer_client,
            }),
        }
    }

    pub fn server_domain(&self) -> Name {
        self.inner.server_domain.read().unwrap().clone()
    }

    /// Names this process never persists to disk (RFC 6761 `localhost.`
    /// and its reverse counterparts), regardless of how they were created.
    fn internal_zone_names() -> &'static [&'static str] {
        &[
            "localhost.",
            "127.in-addr.arpa.",
            "0.in-addr.arpa.",
            "255.in-addr.arpa.",
            "1.0.0.127.in-addr.arpa.",
            "0.0.0.0.0.0.0.0.0.0.0.0.0.0.0.0.0.0.0.0.0.0.0.0.0.0.0.0.0.0.0.0.ip6.arpa.",
        ]
    }

    pub fn is_internal(&self, name: &Name) -> bool {
        Self::internal_zone_names().contains(&name.as_ref())
    }

    /// Materializes the internal zones at startup if they aren't already
    /// present. Idempotent: calling it again after an admin deleted one of
    /// these zones on purpose simply re-creates it.
    pub fn ensure_internal_zones(&self) {
        for raw in Self::internal_zone_names() {
            let name = Name::from_string(raw).expect("internal zone name is well-formed");
            if self.lookup_apex(&name).is_none() {
                let _ = self.create_primary(name, SerialScheme::Monotonic, 86400);
            }
        }
    }

    pub fn lookup_apex(&self, name: &Name) -> Option<Arc<ApexZone>> {
        self.inner.apexes.read().unwrap().get(&key(name)).cloned()
    }

    fn require_apex(&self, name: &Name) -> ZoneResult<Arc<ApexZone>> {
        self.lookup_apex(name).ok_or_else(|| ZoneError::ZoneNotFound(name.clone()))
    }

    fn reject_if_exists(&self, name: &Name) -> ZoneResult<()> {
        if self.inner.apexes.read().unwrap().contains_key(&key(name)) {
            return Err(ZoneError::ZoneAlreadyExists(name.clone()));
        }
        Ok(())
    }

    fn insert_apex(&self, apex: Arc<ApexZone>) {
        self.inner.apexes.write().unwrap().insert(key(&apex.name()), apex);
    }

    fn require_primary(&self, apex: &ApexZone) -> ZoneResult<()> {
        if apex.zone_type() != ApexZoneType::Primary {
            Err(ZoneError::OperationNotSupported(format!(
                "operation requires a Primary zone, got {}",
                apex.zone_type()
            )))
        } else {
            Ok(())
        }
    }

    // ---- listing -----------------------------------------------------

    pub fn get_all_zones(&self) -> Vec<ApexZoneInfo> {
        self.inner.apexes.read().unwrap().values().map(|a| a.info()).collect()
    }

    /// Offset/limit slice over the sorted (lowercase name) admin index.
    pub fn get_zones_page(&self, offset: usize, limit: usize) -> Vec<ApexZoneInfo> {
        self.inner.apexes.read().unwrap().values().skip(offset).take(limit).map(|a| a.info()).collect()
    }

    // ---- query ---------------------------------------------------------

    pub fn query(&self, request: &QueryRequest) -> QueryResponse {
        let apexes = &self.inner.apexes;
        let nsec3 = &self.inner.nsec3_params;
        query::query(
            &self.inner.tree,
            |n| apexes.read().unwrap().get(&key(n)).cloned(),
            request,
            &|n: &Name| nsec3.read().unwrap().get(n).cloned(),
        )
    }

    // ---- creation --------------------------------------------------

    pub fn create_primary(&self, name: Name, serial_scheme: SerialScheme, default_ttl: u32) -> ZoneResult<()> {
        self.reject_if_exists(&name)?;
        let root = self.inner.tree.get_or_add(&name, |n| {
            n.set_apex_marker(Some(ApexMarker { zone_type: ApexZoneType::Primary, disabled: false }));
        });
        let server_domain = self.server_domain();
        root.upsert_record(Self::fresh_soa(&name, &server_domain, serial_scheme, default_ttl));
        root.upsert_record(Record::new(name.clone(), default_ttl, RData::NS { name: server_domain }));
        self.insert_apex(Arc::new(ApexZone::new(root, ApexZoneType::Primary, ApexVariant::primary())));
        self.schedule_save(&name);
        Ok(())
    }

    pub fn create_secondary(&self, name: Name, primaries: Vec<SocketAddr>) -> ZoneResult<()> {
        self.reject_if_exists(&name)?;
        let root = self.inner.tree.get_or_add(&name, |n| {
            n.set_apex_marker(Some(ApexMarker { zone_type: ApexZoneType::Secondary, disabled: false }));
        });
        let variant = ApexVariant::Secondary {
            primaries,
            refresh: Mutex::new(RefreshState::Idle),
            journal: Journal::new(),
            last_success: Mutex::new(None),
        };
        self.insert_apex(Arc::new(ApexZone::new(root, ApexZoneType::Secondary, variant)));
        self.spawn_refresh_timer(name);
        Ok(())
    }

    pub fn create_stub(&self, name: Name, primaries: Vec<SocketAddr>) -> ZoneResult<()> {
        self.reject_if_exists(&name)?;
        let root = self.inner.tree.get_or_add(&name, |n| {
            n.set_apex_marker(Some(ApexMarker { zone_type: ApexZoneType::Stub, disabled: false }));
        });
        let variant = ApexVariant::Stub { primaries, refresh: Mutex::new(RefreshState::Idle), last_success: Mutex::new(None) };
        self.insert_apex(Arc::new(ApexZone::new(root, ApexZoneType::Stub, variant)));
        self.spawn_refresh_timer(name);
        Ok(())
    }

    pub fn create_forwarder(&self, name: Name, forwarders: Vec<Record>) -> ZoneResult<()> {
        self.reject_if_exists(&name)?;
        for fwd in &forwarders {
            // FWD records hold the forwarding targets; NS is accepted too
            // for delegation-style forwarding (spec.md §4.2), where this
            // apex both delegates via NS and forwards everything else.
            if fwd.rtype() != RRType::FWD && fwd.rtype() != RRType::NS {
                return Err(invalid_record(&name, fwd.rtype(), "forwarder zones only accept FWD or NS records"));
            }
        }
        let root = self.inner.tree.get_or_add(&name, |n| {
            n.set_apex_marker(Some(ApexMarker { zone_type: ApexZoneType::Forwarder, disabled: false }));
        });
        for fwd in forwarders {
            root.upsert_record(fwd);
        }
        self.insert_apex(Arc::new(ApexZone::new(root, ApexZoneType::Forwarder, ApexVariant::Forwarder)));
        self.schedule_save(&name);
        Ok(())
    }

    pub fn clone_zone(&self, source: &Name, dest: Name) -> ZoneResult<()> {
        let src = self.require_apex(source)?;
        self.reject_if_exists(&dest)?;

        let root = self.inner.tree.get_or_add(&dest, |n| {
            n.set_apex_marker(Some(ApexMarker { zone_type: src.zone_type(), disabled: false }));
        });
        for mut record in self.subtree_records(&src) {
            record.name = rewrite_suffix(&record.name, source, &dest);
            self.inner.tree.get_or_add(&record.name, |_| {}).upsert_record(record);
        }

        let zone_type = src.zone_type();
        let variant = match zone_type {
            ApexZoneType::Primary => ApexVariant::primary(),
            ApexZoneType::Secondary => ApexVariant::Secondary {
                primaries: src.primaries().to_vec(),
                refresh: Mutex::new(RefreshState::Idle),
                journal: Journal::new(),
                last_success: Mutex::new(None),
            },
            ApexZoneType::Stub => ApexVariant::Stub {
                primaries: src.primaries().to_vec(),
                refresh: Mutex::new(RefreshState::Idle),
                last_success: Mutex::new(None),
            },
            ApexZoneType::Forwarder => ApexVariant::Forwarder,
        };
        self.insert_apex(Arc::new(ApexZone::new(root, zone_type, variant)));
        if matches!(zone_type, ApexZoneType::Secondary | ApexZoneType::Stub) {
            self.spawn_refresh_timer(dest.clone());
        }
        self.schedule_save(&dest);
        Ok(())
    }

    pub fn delete_zone(&self, name: &Name) -> ZoneResult<()> {
        self.require_apex(name)?;
        let mut nodes = self.inner.tree.subtree_nodes(name);
        nodes.sort_by_key(|n| Reverse(n.name.label_count()));
        for node in &nodes {
            for (rtype, _) in node.get_all() {
                node.delete_all_of_type(rtype);
            }
            if node.name == *name {
                node.set_apex_marker(None);
            }
        }
        self.inner.apexes.write().unwrap().remove(&key(name));
        for node in &nodes {
            if node.name != *name {
                self.inner.tree.try_remove(&node.name);
            }
        }
        self.inner.tree.garbage_collect(name);
        if !self.is_internal(name) {
            let _ = std::fs::remove_file(self.zone_file_path(name));
        }
        Ok(())
    }

    // ---- zone conversion ---------------------------------------------

    /// Applies one of the conversions enumerated for the zone manager:
    /// Primary -> Forwarder (only from Unsigned), Secondary -> Primary,
    /// Secondary -> Forwarder, Forwarder -> Primary. Every other pair is
    /// rejected. If persisting the converted zone fails, the conversion is
    /// rolled back by reloading the snapshot taken before any mutation.
    pub fn convert_zone_type(&self, name: &Name, target: ApexZoneType) -> ZoneResult<()> {
        let original = self.require_apex(name)?;
        let current = original.zone_type();
        if current == target {
            return Ok(());
        }

        let snapshot = zonefile::write(&original.info(), &self.subtree_records(&original));

        let variant = match (current, target) {
            (ApexZoneType::Primary, ApexZoneType::Forwarder) => {
                if original.info().dnssec_status != DnssecStatus::Unsigned {
                    return Err(ZoneError::ConversionRejected("cannot convert a signed zone to Forwarder".into()));
                }
                original.root.delete_all_of_type(RRType::SOA);
                original.root.delete_all_of_type(RRType::NS);
                ApexVariant::Forwarder
            }
            (ApexZoneType::Secondary, ApexZoneType::Primary) => {
                self.strip_dnssec(&original);
                if let Some(mut soa) = original.soa() {
                    soa.tag = Tag::Soa(SoaInfo::default());
                    original.set_soa(soa);
                }
                ApexVariant::primary()
            }
            (ApexZoneType::Secondary, ApexZoneType::Forwarder) => {
                original.root.delete_all_of_type(RRType::SOA);
                original.root.delete_all_of_type(RRType::NS);
                self.strip_dnssec(&original);
                ApexVariant::Forwarder
            }
            (ApexZoneType::Forwarder, ApexZoneType::Primary) => {
                original.root.delete_all_of_type(RRType::FWD);
                let server_domain = self.server_domain();
                original.root.upsert_record(Self::fresh_soa(name, &server_domain, SerialScheme::Monotonic, 3600));
                original.root.upsert_record(Record::new(name.clone(), 3600, RData::NS { name: server_domain }));
                ApexVariant::primary()
            }
            _ => {
                return Err(ZoneError::ConversionRejected(format!("cannot convert {} to {}", current, target)));
            }
        };

        let new_apex = Arc::new(ApexZone::new(original.root.clone(), target, variant));
        original.root.set_apex_marker(Some(ApexMarker { zone_type: target, disabled: original.info().disabled }));
        self.insert_apex(new_apex.clone());

        if let Err(save_err) = self.write_zone_file(&new_apex) {
            log_sink::write_exception(&save_err);
            self.restore_from_snapshot(name, &original, &snapshot);
            return Err(save_err);
        }
        Ok(())
    }

    fn restore_from_snapshot(&self, name: &Name, original: &Arc<ApexZone>, snapshot: &[u8]) {
        let Ok((_, records)) = zonefile::read(snapshot) else {
            log_sink::write_message(&format!("rollback of zone {} failed: snapshot would not re-parse", name));
            return;
        };
        for node in self.inner.tree.subtree_nodes(name) {
            if node.is_apex() && node.name != *name {
                continue;
            }
            for (rtype, _) in node.get_all() {
                node.delete_all_of_type(rtype);
            }
        }
        for record in records {
            let node = self.inner.tree.get_or_add(&record.name, |_| {});
            node.upsert_record(record);
        }
        original.root.set_apex_marker(Some(ApexMarker { zone_type: original.zone_type(), disabled: original.info().disabled }));
        self.insert_apex(original.clone());
    }

    fn strip_dnssec(&self, apex: &ApexZone) {
        for node in self.inner.tree.subtree_nodes(&apex.name()) {
            if node.is_apex() && node.name != apex.name() {
                continue;
            }
            for rtype in [RRType::DS, RRType::DNSKEY, RRType::RRSIG, RRType::NSEC, RRType::NSEC3, RRType::NSEC3PARAM] {
                node.delete_all_of_type(rtype);
            }
        }
        apex.update_dnssec_status(DnssecStatus::Unsigned);
        self.inner.nsec3_params.write().unwrap().remove(&apex.name());
    }

    // ---- record mutation -----------------------------------------------

    pub fn import_records(&self, name: &Name, records: Vec<Record>) -> ZoneResult<()> {
        let apex = self.require_apex(name)?;
        for record in &records {
            ensure_in_bailiwick(&record.name, name)?;
        }
        for node in self.inner.tree.subtree_nodes(name) {
            if node.is_apex() && node.name != *name {
                continue;
            }
            for (rtype, _) in node.get_all() {
                node.delete_all_of_type(rtype);
            }
        }
        for record in records {
            let node = self.inner.tree.get_or_add(&record.name, |_| {});
            node.upsert_record(record);
        }
        self.reattach_glue(&apex);
        apex.touch();
        self.schedule_save(name);
        Ok(())
    }

    pub fn set_records(&self, zone: &Name, owner: &Name, rtype: RRType, records: Vec<Record>) -> ZoneResult<()> {
        let apex = self.require_apex(zone)?;
        self.require_primary(&apex)?;
        ensure_in_bailiwick(owner, zone)?;
        for r in &records {
            if &r.name != owner || r.rtype() != rtype {
                return Err(invalid_record(owner, rtype, "record owner/type mismatch with target RRSet"));
            }
        }
        let node = self.inner.tree.get_or_add(owner, |_| {});
        let removed = node.get(rtype).map(|s| s.records().to_vec()).unwrap_or_default();
        node.set_rrset(rtype, RRSet::from_records(records.clone()));
        self.reattach_glue(&apex);
        self.record_mutation(&apex, removed, records);
        Ok(())
    }

    pub fn add_record(&self, zone: &Name, record: Record) -> ZoneResult<()> {
        let apex = self.require_apex(zone)?;
        self.require_primary(&apex)?;
        ensure_in_bailiwick(&record.name, zone)?;
        let node = self.inner.tree.get_or_add(&record.name, |_| {});
        node.upsert_record(record.clone());
        self.reattach_glue(&apex);
        self.record_mutation(&apex, vec![], vec![record]);
        Ok(())
    }

    pub fn update_record(&self, zone: &Name, old: &Record, new: Record) -> ZoneResult<()> {
        let apex = self.require_apex(zone)?;
        self.require_primary(&apex)?;
        ensure_in_bailiwick(&new.name, zone)?;
        self.inner.tree.get_or_add(&old.name, |_| {}).delete_record(old);
        self.inner.tree.get_or_add(&new.name, |_| {}).upsert_record(new.clone());
        self.reattach_glue(&apex);
        self.record_mutation(&apex, vec![old.clone()], vec![new]);
        Ok(())
    }

    pub fn delete_record(&self, zone: &Name, record: &Record) -> ZoneResult<()> {
        let apex = self.require_apex(zone)?;
        self.require_primary(&apex)?;
        let node = self.inner.tree.get_or_add(&record.name, |_| {});
        if node.delete_record(record) {
            self.inner.tree.garbage_collect(&record.name);
            self.reattach_glue(&apex);
            self.record_mutation(&apex, vec![record.clone()], vec![]);
        }
        Ok(())
    }

    pub fn delete_records(&self, zone: &Name, owner: &Name, rtype: RRType) -> ZoneResult<()> {
        let apex = self.require_apex(zone)?;
        self.require_primary(&apex)?;
        ensure_in_bailiwick(owner, zone)?;
        let node = self.inner.tree.get_or_add(owner, |_| {});
        let removed = node.get(rtype).map(|s| s.records().to_vec()).unwrap_or_default();
        node.delete_all_of_type(rtype);
        self.inner.tree.garbage_collect(owner);
        self.reattach_glue(&apex);
        self.record_mutation(&apex, removed, vec![]);
        Ok(())
    }

    /// Bumps the zone's SOA serial and appends the change to its journal
    /// (a no-op if nothing actually changed), then schedules a save. Only
    /// Primary zones reach here (every mutation entry point above checks
    /// [`require_primary`] first), so a journal is always present.
    fn record_mutation(&self, apex: &Arc<ApexZone>, removed: Vec<Record>, added: Vec<Record>) {
        if removed.is_empty() && added.is_empty() {
            return;
        }
        if let (Some(journal), Some(soa)) = (apex.journal(), apex.soa()) {
            if let RData::Soa { serial, .. } = soa.rdata {
                let scheme = match &soa.tag {
                    Tag::Soa(info) => info.serial_scheme,
                    _ => SerialScheme::Monotonic,
                };
                let next = bump_serial(serial, scheme);
                let mut new_soa = soa.clone();
                if let RData::Soa { serial: s, .. } = &mut new_soa.rdata {
                    *s = next;
                }
                apex.set_soa(new_soa);
                journal.append(JournalEntry { from_serial: serial, to_serial: next, removed, added });
            }
        }
        self.schedule_save(&apex.name());
    }

    // ---- zone transfer production ---------------------------------------

    /// Every record owned by `apex` below its own apex node: delegation NS
    /// (with glue), ordinary subdomain RRSets, and nested Apex roots are
    /// excluded (they are Primary in their own right and produce their own
    /// transfers). Kept separate from [`Self::subtree_records`], which also
    /// includes the apex's own root records — `produce_axfr` already walks
    /// those directly off the `ApexZone`.
    fn subdomain_records(&self, apex: &ApexZone) -> Vec<Record> {
        let mut out = Vec::new();
        for node in self.inner.tree.subtree_nodes(&apex.name()) {
            if node.is_apex() {
                continue;
            }
            for (_, set) in node.get_all() {
                out.extend(set.active_records().cloned());
            }
        }
        out
    }

    /// Produces a full AXFR reply for `name`: only a Primary zone can serve
    /// as an AXFR source (Secondary/Stub zones forward to their upstream).
    pub fn query_zone_transfer_records(&self, name: &Name) -> ZoneResult<transfer::TransferMessage> {
        let apex = self.require_apex(name)?;
        self.require_primary(&apex)?;
        transfer::produce_axfr(&apex, self.subdomain_records(&apex))
    }

    /// Produces an IXFR reply for a client presenting `client_serial`
    /// against `name`'s journal, falling back to AXFR framing when the
    /// journal can't walk the client back to the current serial.
    pub fn query_incremental_zone_transfer_records(
        &self,
        name: &Name,
        client_serial: u32,
    ) -> ZoneResult<transfer::IxfrOutcome> {
        let apex = self.require_apex(name)?;
        self.require_primary(&apex)?;
        let journal = apex
            .journal()
            .ok_or_else(|| ZoneError::OperationNotSupported("zone has no journal".into()))?;
        transfer::produce_ixfr(&apex, journal, client_serial)
    }

    // ---- zone transfer application -------------------------------------

    fn require_transferable(&self, name: &Name) -> ZoneResult<Arc<ApexZone>> {
        let apex = self.require_apex(name)?;
        if !matches!(apex.zone_type(), ApexZoneType::Secondary | ApexZoneType::Stub) {
            return Err(ZoneError::OperationNotSupported(format!(
                "zone transfer application requires a Secondary or Stub zone, got {}",
                apex.zone_type()
            )));
        }
        Ok(apex)
    }

    /// Applies a full AXFR reply to a Secondary/Stub zone: validates SOA
    /// framing, replaces the zone's contents wholesale, re-attaches glue
    /// onto NS records by matching name, and preserves the disabled flag
    /// and other tag metadata of any record whose owner/type/rdata is
    /// unchanged by the transfer.
    pub fn sync_zone_transfer_records(&self, name: &Name, message: &transfer::TransferMessage) -> ZoneResult<()> {
        let apex = self.require_transferable(name)?;
        let (soa, body) = transfer::sync_zone_transfer(message)?;
        if soa.name != *name {
            return Err(ZoneError::InvalidZoneTransfer(format!(
                "SOA owner {} does not match zone {}",
                soa.name, name
            )));
        }

        let old_records = self.subtree_records(&apex);
        for node in self.inner.tree.subtree_nodes(name) {
            if node.is_apex() && node.name != *name {
                continue;
            }
            for (rtype, _) in node.get_all() {
                node.delete_all_of_type(rtype);
            }
        }

        let mut soa = soa;
        soa.tag = Self::preserved_tag(&old_records, &soa);
        apex.root.upsert_record(soa);
        for mut record in body {
            record.tag = Self::preserved_tag(&old_records, &record);
            self.inner.tree.get_or_add(&record.name, |_| {}).upsert_record(record);
        }
        self.reattach_glue(&apex);

        apex.set_refresh_state(RefreshState::Idle);
        apex.record_refresh_success(SystemTime::now());
        apex.touch();
        self.schedule_save(name);
        Ok(())
    }

    /// Applies an IXFR diff to a Secondary zone. Each sequence's
    /// deleted-SOA serial must equal the zone's current serial before it
    /// is applied; sequences are applied strictly in order, so a
    /// malformed gap fails with [`ZoneError::InvalidZoneTransfer`] rather
    /// than landing partially. Every applied sequence is appended to this
    /// zone's own journal so a downstream slave of this server can IXFR
    /// from it too.
    pub fn sync_incremental_zone_transfer_records(&self, name: &Name, message: &transfer::TransferMessage) -> ZoneResult<()> {
        let apex = self.require_transferable(name)?;
        let batches = transfer::sync_incremental_zone_transfer(message)?;
        if batches.is_empty() {
            apex.set_refresh_state(RefreshState::Idle);
            apex.record_refresh_success(SystemTime::now());
            return Ok(());
        }

        for (from_serial, removed, to_serial, added) in &batches {
            let current = apex.serial().unwrap_or(0);
            if *from_serial != current {
                return Err(ZoneError::InvalidZoneTransfer(format!(
                    "IXFR sequence deleted-SOA serial {} does not match current serial {}",
                    from_serial, current
                )));
            }
            for record in removed {
                let node = self.inner.tree.get_or_add(&record.name, |_| {});
                node.delete_record(record);
                self.inner.tree.garbage_collect(&record.name);
            }
            for record in added {
                self.inner.tree.get_or_add(&record.name, |_| {}).upsert_record(record.clone());
            }
            self.reattach_glue(&apex);

            if let Some(mut soa) = apex.soa() {
                if let RData::Soa { serial, .. } = &mut soa.rdata {
                    *serial = *to_serial;
                }
                apex.set_soa(soa);
            }
            if let Some(journal) = apex.journal() {
                journal.append(JournalEntry {
                    from_serial: *from_serial,
                    to_serial: *to_serial,
                    removed: removed.clone(),
                    added: added.clone(),
                });
            }
        }

        apex.set_refresh_state(RefreshState::Idle);
        apex.record_refresh_success(SystemTime::now());
        self.schedule_save(name);
        Ok(())
    }

    /// Looks up `incoming`'s owner/rdata among `old_records` and carries
    /// its tag forward (disabled flag, comments, glue) instead of
    /// resetting to a fresh default tag — ensures admin-set metadata
    /// survives a transfer that happens to re-deliver the same data.
    fn preserved_tag(old_records: &[Record], incoming: &Record) -> Tag {
        old_records
            .iter()
            .find(|r| r.same_data(incoming))
            .map(|r| r.tag.clone())
            .unwrap_or_else(|| incoming.tag.clone())
    }

    /// Re-attaches in-bailiwick A/AAAA glue onto every NS record under
    /// `apex`, matching by name. A wire transfer carries glue inline as
    /// ordinary additional records rather than as the first-class
    /// attachment this tree stores it as, so every sync needs to re-pair
    /// them after records land.
    fn reattach_glue(&self, apex: &ApexZone) {
        for node in self.inner.tree.subtree_nodes(&apex.name()) {
            if node.is_apex() && node.name != apex.name() {
                continue;
            }
            let Some(ns_set) = node.get(RRType::NS) else { continue };
            if ns_set.is_empty() {
                continue;
            }
            let mut records = ns_set.records().to_vec();
            for ns in &mut records {
                let RData::NS { name: target } = &ns.rdata else { continue };
                let glue = self
                    .inner
                    .tree
                    .lookup(target)
                    .map(|n| {
                        let mut g = Vec::new();
                        for rtype in [RRType::A, RRType::AAAA] {
                            if let Some(s) = n.get(rtype) {
                                g.extend(s.records().iter().cloned());
                            }
                        }
                        g
                    })
                    .unwrap_or_default();
                match &mut ns.tag {
                    Tag::Ns(info) => info.glue = glue,
                    other => *other = Tag::Ns(NsInfo { glue, ..NsInfo::default() }),
                }
            }
            node.set_rrset(RRType::NS, RRSet::from_records(records));
        }
    }

    // ---- refresh scheduler -----------------------------------------------

    /// Default SOA timers used while a Secondary/Stub zone has no SOA yet
    /// (before its first successful transfer lands).
    const DEFAULT_REFRESH_TIMERS: (u32, u32, u32) = (3600, 900, 604800);

    /// Spawns the dedicated per-zone refresh timer for a Secondary/Stub
    /// zone (analogous to [`Self::schedule_save`]'s debounce timer): sleeps
    /// for the interval `RefreshTimers` prescribes for the zone's current
    /// state, attempts one transfer via the configured `TransferClient`,
    /// applies it, and advances `RefreshState` with `on_transfer_result`.
    /// Exits as soon as the zone is no longer found (deleted or converted
    /// away from Secondary/Stub).
    fn spawn_refresh_timer(&self, name: Name) {
        let inner = self.inner.clone();
        thread::spawn(move || loop {
            let mgr = ZoneManager { inner: inner.clone() };
            let Some(apex) = mgr.lookup_apex(&name) else { return };
            let Some(state) = apex.refresh_state() else { return };
            let timers = mgr.refresh_timers_for(&apex);
            thread::sleep(timers.next_interval(&state));
            if mgr.lookup_apex(&name).is_none() {
                return;
            }
            mgr.attempt_refresh(&name);
        });
    }

    /// The SOA-derived timers governing a Secondary/Stub zone's refresh
    /// cadence, falling back to conservative defaults before its first
    /// successful transfer has ever landed (no SOA to read yet).
    fn refresh_timers_for(&self, apex: &ApexZone) -> RefreshTimers {
        let (refresh, retry, expire) = apex
            .soa()
            .and_then(|r| match r.rdata {
                RData::Soa { refresh, retry, expire, .. } => Some((refresh, retry, expire)),
                _ => None,
            })
            .unwrap_or(Self::DEFAULT_REFRESH_TIMERS);
        RefreshTimers::from_soa(refresh, retry, expire)
    }

    /// Performs one refresh attempt against `name`'s configured primaries
    /// through the manager's [`TransferClient`], applies the result, and
    /// advances the zone's [`RefreshState`] accordingly. Returns whether
    /// the attempt succeeded. Pulled out of [`Self::spawn_refresh_timer`]'s
    /// loop so the state-machine wiring is directly testable without
    /// waiting on a real timer.
    fn attempt_refresh(&self, name: &Name) -> bool {
        let Some(apex) = self.lookup_apex(name) else { return false };
        if !matches!(apex.zone_type(), ApexZoneType::Secondary | ApexZoneType::Stub) {
            return false;
        }
        let prior_state = apex.refresh_state().unwrap_or(RefreshState::Idle);
        apex.set_refresh_state(RefreshState::Refreshing);

        let current_serial = apex.serial();
        let success = match self.inner.transfer_client.fetch(name, apex.primaries(), current_serial) {
            Ok(message) if current_serial.is_some() => self
                .sync_incremental_zone_transfer_records(name, &message)
                .or_else(|_| self.sync_zone_transfer_records(name, &message))
                .is_ok(),
            Ok(message) => self.sync_zone_transfer_records(name, &message).is_ok(),
            Err(_) => false,
        };

        if !success {
            let timers = self.refresh_timers_for(&apex);
            let now = SystemTime::now();
            let last_success = apex.last_refresh_success();
            let new_state = refresh::on_transfer_result(&prior_state, false, now, last_success, timers.expire);
            apex.set_refresh_state(new_state);
        }
        success
    }

    // ---- DNSSEC --------------------------------------------------------

    pub fn sign_zone(&self, name: &Name, use_nsec3: bool, algorithm: u8, nsec3_params: Option<Nsec3Params>) -> ZoneResult<()> {
        let apex = self.require_apex(name)?;
        self.require_primary(&apex)?;
        if apex.info().dnssec_status != DnssecStatus::Unsigned {
            return Err(ZoneError::OperationNotSupported("zone is already signed".into()));
        }

        let ksk = self.inner.signer.generate_key(name, algorithm, true)?;
        let zsk = self.inner.signer.generate_key(name, algorithm, false)?;
        apex.root.upsert_record(ksk);
        apex.root.upsert_record(zsk.clone());

        let owners = apex.owners_with_types();
        let status = if use_nsec3 {
            let params = nsec3_params.unwrap_or(Nsec3Params { hash_algorithm: 1, flags: 0, iterations: 0, salt: vec![] });
            for record in dnssec::build_nsec3_chain(&owners, &params) {
                self.inner.tree.get_or_add(&record.name, |_| {}).upsert_record(record);
            }
            self.inner.nsec3_params.write().unwrap().insert(name.clone(), params);
            DnssecStatus::SignedWithNsec3
        } else {
            let mut owners = owners;
            owners.sort_by(|(a, _), (b, _)| a.cmp_canonical(b));
            for record in dnssec::build_nsec_chain(&owners) {
                self.inner.tree.get_or_add(&record.name, |_| {}).upsert_record(record);
            }
            DnssecStatus::SignedWithNsec
        };

        self.sign_all_rrsets(&apex, &zsk)?;
        apex.update_dnssec_status(status);
        self.schedule_save(name);
        Ok(())
    }

    fn sign_all_rrsets(&self, apex: &ApexZone, zsk: &Record) -> ZoneResult<()> {
        let key_tag = dnssec::key_tag(zsk);
        for node in self.inner.tree.subtree_nodes(&apex.name()) {
            if node.is_apex() && node.name != apex.name() {
                continue;
            }
            for (rtype, set) in node.get_all() {
                if rtype.is_dnssec_meta() {
                    continue;
                }
                let records = set.records().to_vec();
                if records.is_empty() {
                    continue;
                }
                let rrsig = self.inner.signer.sign_rrset(&apex.name(), &node.name, &records, key_tag)?;
                node.upsert_record(rrsig);
            }
        }
        Ok(())
    }

    pub fn unsign_zone(&self, name: &Name) -> ZoneResult<()> {
        let apex = self.require_apex(name)?;
        self.require_primary(&apex)?;
        self.strip_dnssec(&apex);
        self.schedule_save(name);
        Ok(())
    }

    pub fn convert_to_nsec(&self, name: &Name) -> ZoneResult<()> {
        let apex = self.require_apex(name)?;
        self.require_primary(&apex)?;
        if apex.info().dnssec_status == DnssecStatus::Unsigned {
            return Err(ZoneError::OperationNotSupported("zone is not signed".into()));
        }
        self.remove_chain(&apex, RRType::NSEC3);
        let mut owners = apex.owners_with_types();
        owners.sort_by(|(a, _), (b, _)| a.cmp_canonical(b));
        for record in dnssec::build_nsec_chain(&owners) {
            self.inner.tree.get_or_add(&record.name, |_| {}).upsert_record(record);
        }
        self.inner.nsec3_params.write().unwrap().remove(name);
        apex.update_dnssec_status(DnssecStatus::SignedWithNsec);
        self.schedule_save(name);
        Ok(())
    }

    pub fn convert_to_nsec3(&self, name: &Name, params: Nsec3Params) -> ZoneResult<()> {
        let apex = self.require_apex(name)?;
        self.require_primary(&apex)?;
        if apex.info().dnssec_status == DnssecStatus::Unsigned {
            return Err(ZoneError::OperationNotSupported("zone is not signed".into()));
        }
        self.remove_chain(&apex, RRType::NSEC);
        for record in dnssec::build_nsec3_chain(&apex.owners_with_types(), &params) {
            self.inner.tree.get_or_add(&record.name, |_| {}).upsert_record(record);
        }
        self.inner.nsec3_params.write().unwrap().insert(name.clone(), params);
        apex.update_dnssec_status(DnssecStatus::SignedWithNsec3);
        self.schedule_save(name);
        Ok(())
    }

    fn remove_chain(&self, apex: &ApexZone, rtype: RRType) {
        for node in self.inner.tree.subtree_nodes(&apex.name()) {
            if node.is_apex() && node.name != apex.name() {
                continue;
            }
            node.delete_all_of_type(rtype);
        }
    }

    pub fn generate_dnskey(&self, name: &Name, algorithm: u8, is_ksk: bool) -> ZoneResult<Record> {
        let apex = self.require_apex(name)?;
        self.require_primary(&apex)?;
        let key = self.inner.signer.generate_key(name, algorithm, is_ksk)?;
        apex.root.upsert_record(key.clone());
        self.schedule_save(name);
        Ok(key)
    }

    pub fn update_dnskey(&self, name: &Name, old: &Record, algorithm: u8, is_ksk: bool) -> ZoneResult<Record> {
        let apex = self.require_apex(name)?;
        self.require_primary(&apex)?;
        apex.root.delete_record(old);
        let key = self.inner.signer.generate_key(name, algorithm, is_ksk)?;
        apex.root.upsert_record(key.clone());
        self.schedule_save(name);
        Ok(key)
    }

    pub fn delete_dnskey(&self, name: &Name, key: &Record) -> ZoneResult<()> {
        let apex = self.require_apex(name)?;
        self.require_primary(&apex)?;
        apex.root.delete_record(key);
        self.schedule_save(name);
        Ok(())
    }

    /// Publishes the replacement key before retiring the old one, so a
    /// validator mid-rollover always sees at least one continuously valid
    /// key in the DNSKEY RRSet.
    pub fn rollover_dnskey(&self, name: &Name, old: &Record, algorithm: u8, is_ksk: bool) -> ZoneResult<Record> {
        let apex = self.require_apex(name)?;
        self.require_primary(&apex)?;
        let new_key = self.inner.signer.generate_key(name, algorithm, is_ksk)?;
        apex.root.upsert_record(new_key.clone());
        apex.root.delete_record(old);
        self.schedule_save(name);
        Ok(new_key)
    }

    pub fn retire_dnskey(&self, name: &Name, key: &Record) -> ZoneResult<()> {
        self.delete_dnskey(name, key)
    }

    // ---- persistence ----------------------------------------------------

    fn zone_file_path(&self, name: &Name) -> PathBuf {
        self.inner.config_root.join("zones").join(format!("{}zone", key(name)))
    }

    /// Every record reachable from `apex`'s root without crossing into a
    /// nested (delegated) apex — the full set a zone-file snapshot or a
    /// rollback needs, including disabled records and SOA/NS.
    fn subtree_records(&self, apex: &ApexZone) -> Vec<Record> {
        let mut out = Vec::new();
        for node in self.inner.tree.subtree_nodes(&apex.name()) {
            if node.is_apex() && node.name != apex.name() {
                continue;
            }
            for (_, set) in node.get_all() {
                out.extend(set.records().iter().cloned());
            }
        }
        out
    }

    fn write_zone_file(&self, apex: &ApexZone) -> ZoneResult<()> {
        if self.is_internal(&apex.name()) {
            return Ok(());
        }
        let bytes = zonefile::write(&apex.info(), &self.subtree_records(apex));
        let path = self.zone_file_path(&apex.name());
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ZoneError::IoFailure(e.to_string()))?;
        }
        std::fs::write(&path, bytes).map_err(|e| ZoneError::IoFailure(e.to_string()))
    }

    /// Records `name` in the pending set and arms the debounced save timer
    /// if it isn't already running. Internal zones are never scheduled.
    fn schedule_save(&self, name: &Name) {
        if self.is_internal(name) {
            return;
        }
        let mut state = self.inner.save.lock().unwrap();
        state.pending.insert(name.clone());
        if state.timer_armed {
            return;
        }
        state.timer_armed = true;
        drop(state);
        let inner = self.inner.clone();
        thread::spawn(move || {
            thread::sleep(inner.save_interval);
            Self::flush_pending(&inner);
        });
    }

    /// Serializes every pending zone in one critical section. Zones that
    /// fail to save are re-queued and the timer rearmed for the next tick.
    fn flush_pending(inner: &Arc<Inner>) {
        let pending: Vec<Name> = {
            let mut state = inner.save.lock().unwrap();
            state.timer_armed = false;
            state.pending.drain().collect()
        };
        let mgr = ZoneManager { inner: inner.clone() };
        let mut failed = Vec::new();
        for name in pending {
            let Some(apex) = mgr.lookup_apex(&name) else { continue };
            if let Err(err) = mgr.write_zone_file(&apex) {
                log_sink::write_exception(&err);
                failed.push(name);
            }
        }
        if failed.is_empty() {
            return;
        }
        let mut state = inner.save.lock().unwrap();
        state.pending.extend(failed);
        if state.timer_armed {
            return;
        }
        state.timer_armed = true;
        drop(state);
        let inner = inner.clone();
        thread::spawn(move || {
            thread::sleep(inner.save_interval);
            Self::flush_pending(&inner);
        });
    }

    /// Flushes the pending set synchronously, bypassing the debounce
    /// timer. Intended for orderly shutdown.
    pub fn dispose(&self) {
        Self::flush_pending(&self.inner);
    }

    // ---- server-domain propagation ---------------------------------------

    /// Propagates a server-domain rename into every Primary zone's SOA
    /// `PrimaryNS` and matching NS record. Runs on a background thread so
    /// admin calls that trigger it never block on the zone count.
    pub fn update_server_domain(&self, new_domain: Name) {
        let inner = self.inner.clone();
        thread::spawn(move || {
            let old_domain = inner.server_domain.read().unwrap().clone();
            *inner.server_domain.write().unwrap() = new_domain.clone();
            let mgr = ZoneManager { inner: inner.clone() };
            let names: Vec<Name> = inner
                .apexes
                .read()
                .unwrap()
                .values()
                .filter(|a| a.zone_type() == ApexZoneType::Primary)
                .map(|a| a.name())
                .collect();
            for name in names {
                let Some(apex) = mgr.lookup_apex(&name) else { continue };
                if let Some(mut soa) = apex.soa() {
                    if let RData::Soa { primary_ns, .. } = &mut soa.rdata {
                        *primary_ns = new_domain.clone();
                    }
                    apex.set_soa(soa);
                }
                // `upsert` only replaces a record with matching rdata, and the
                // old NS's rdata is the old domain, so it would otherwise be
                // left behind as a second NS record pointing nowhere useful.
                apex.root.delete_record(&Record::new(name.clone(), 3600, RData::NS { name: old_domain.clone() }));
                apex.root.upsert_record(Record::new(name.clone(), 3600, RData::NS { name: new_domain.clone() }));
                mgr.schedule_save(&name);
            }
        });
    }

    fn fresh_soa(zone: &Name, server_domain: &Name, scheme: SerialScheme, ttl: u32) -> Record {
        let mut responsible_labels = vec!["hostmaster"];
        responsible_labels.extend(server_domain.labels());
        let responsible = Name::from_labels(&responsible_labels);
        let serial = match scheme {
            SerialScheme::Monotonic => 1,
            SerialScheme::DateEncoded => date_encoded_serial(0),
        };
        let mut record = Record::new(
            zone.clone(),
            ttl,
            RData::Soa {
                primary_ns: server_domain.clone(),
                responsible,
                serial,
                refresh: 3600,
                retry: 900,
                expire: 604800,
                minimum: ttl,
            },
        );
        record.tag = Tag::Soa(SoaInfo { generic: GenericInfo::default(), serial_scheme: scheme });
        record
    }
}

/// Replaces the trailing `old_zone`-length suffix of `name` with
/// `new_zone`'s labels, keeping whatever sits above it intact — used to
/// rewrite owner names when cloning a zone under a new apex.
fn rewrite_suffix(name: &Name, old_zone: &Name, new_zone: &Name) -> Name {
    let labels = name.labels();
    let prefix_len = labels.len().saturating_sub(old_zone.label_count());
    let mut new_labels: Vec<&str> = labels[..prefix_len].to_vec();
    new_labels.extend(new_zone.labels());
    Name::from_labels(&new_labels)
}

fn today_yyyymmdd() -> u32 {
    chrono::Local::now().format("%Y%m%d").to_string().parse().unwrap_or(19_700_101)
}

fn date_encoded_serial(seq: u32) -> u32 {
    today_yyyymmdd() * 100 + seq.min(99)
}

/// Bumps a SOA serial per its scheme: a plain increment for `Monotonic`,
/// or the next same-day sequence number (rolling to a fresh `YYYYMMDD00`
/// the first time a day changes) for `DateEncoded`.
fn bump_serial(current: u32, scheme: SerialScheme) -> u32 {
    match scheme {
        SerialScheme::Monotonic => current.wrapping_add(1),
        SerialScheme::DateEncoded => {
            let today = today_yyyymmdd();
            let (day, seq) = (current / 100, current % 100);
            if day == today {
                today * 100 + (seq + 1).min(99)
            } else {
                today * 100
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    struct FakeSigner;

    impl ZoneSigner for FakeSigner {
        fn generate_key(&self, zone: &Name, algorithm: u8, is_ksk: bool) -> ZoneResult<Record> {
            let flags = if is_ksk { 257 } else { 256 };
            Ok(Record::new(zone.clone(), 3600, RData::DnsKey { flags, protocol: 3, algorithm, public_key: vec![1, 2, 3] }))
        }

        fn sign_rrset(&self, _zone: &Name, owner: &Name, rrset: &[Record], key_tag: u16) -> ZoneResult<Record> {
            let type_covered = rrset.first().map(|r| r.rtype()).unwrap_or(RRType::A);
            Ok(Record::new(
                owner.clone(),
                3600,
                RData::RrSig {
                    type_covered,
                    algorithm: 8,
                    labels: owner.label_count() as u8,
                    original_ttl: 3600,
                    expiration: 2_000_000_000,
                    inception: 1_000_000_000,
                    key_tag,
                    signer_name: owner.clone(),
                    signature: vec![9, 9, 9],
                },
            ))
        }

        fn make_ds(&self, zone: &Name, _dnskey: &Record, digest_type: u8) -> ZoneResult<Record> {
            Ok(Record::new(zone.clone(), 3600, RData::Ds { key_tag: 1, algorithm: 8, digest_type, digest: vec![0; 20] }))
        }
    }

    fn temp_root() -> PathBuf {
        let mut dir = std::env::temp_dir();
        dir.push(format!("zoneauth-manager-test-{}", rand::random::<u64>()));
        dir
    }

    fn manager() -> ZoneManager {
        manager_with_transfer_client(Arc::new(transfer::UnimplementedTransferClient))
    }

    fn manager_with_transfer_client(transfer_client: Arc<dyn TransferClient>) -> ZoneManager {
        ZoneManager::new(
            temp_root(),
            Arc::new(FakeSigner),
            Name::from_string("ns.example.net.").unwrap(),
            Duration::from_millis(30),
            transfer_client,
        )
    }

    struct AlwaysFailingTransferClient;

    impl TransferClient for AlwaysFailingTransferClient {
        fn fetch(&self, _zone: &Name, _primaries: &[SocketAddr], _current_serial: Option<u32>) -> ZoneResult<transfer::TransferMessage> {
            Err(ZoneError::OperationNotSupported("test client never succeeds".into()))
        }
    }

    struct FixedReplyTransferClient(Vec<Record>);

    impl TransferClient for FixedReplyTransferClient {
        fn fetch(&self, _zone: &Name, _primaries: &[SocketAddr], _current_serial: Option<u32>) -> ZoneResult<transfer::TransferMessage> {
            Ok(transfer::TransferMessage { records: self.0.clone() })
        }
    }

    fn name(s: &str) -> Name {
        Name::from_string(s).unwrap()
    }

    #[test]
    fn create_primary_then_query_answers() {
        let mgr = manager();
        let zone = name("example.com.");
        mgr.create_primary(zone.clone(), SerialScheme::Monotonic, 3600).unwrap();
        mgr.add_record(&zone, Record::new(zone.clone(), 3600, RData::A { address: [192, 0, 2, 1] })).unwrap();

        let resp = mgr.query(&QueryRequest { name: zone, rtype: RRType::A, dnssec_ok: false });
        match resp {
            QueryResponse::Answer { records, .. } => assert_eq!(records.len(), 1),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn add_record_bumps_serial_and_journals() {
        let mgr = manager();
        let zone = name("example.com.");
        mgr.create_primary(zone.clone(), SerialScheme::Monotonic, 3600).unwrap();
        let apex = mgr.lookup_apex(&zone).unwrap();
        let before = apex.serial().unwrap();

        mgr.add_record(&zone, Record::new(zone.clone(), 3600, RData::A { address: [192, 0, 2, 1] })).unwrap();

        let after = apex.serial().unwrap();
        assert_eq!(after, before + 1);
        assert_eq!(apex.journal().unwrap().latest_serial(), Some(after));
    }

    #[test]
    fn double_create_is_rejected() {
        let mgr = manager();
        let zone = name("example.com.");
        mgr.create_primary(zone.clone(), SerialScheme::Monotonic, 3600).unwrap();
        assert!(matches!(
            mgr.create_primary(zone, SerialScheme::Monotonic, 3600),
            Err(ZoneError::ZoneAlreadyExists(_))
        ));
    }

    #[test]
    fn primary_to_forwarder_strips_soa_and_ns() {
        let mgr = manager();
        let zone = name("example.com.");
        mgr.create_primary(zone.clone(), SerialScheme::Monotonic, 3600).unwrap();
        mgr.convert_zone_type(&zone, ApexZoneType::Forwarder).unwrap();

        let apex = mgr.lookup_apex(&zone).unwrap();
        assert_eq!(apex.zone_type(), ApexZoneType::Forwarder);
        assert!(apex.soa().is_none());
    }

    #[test]
    fn signed_primary_rejects_forwarder_conversion() {
        let mgr = manager();
        let zone = name("example.com.");
        mgr.create_primary(zone.clone(), SerialScheme::Monotonic, 3600).unwrap();
        mgr.sign_zone(&zone, false, 8, None).unwrap();
        assert!(mgr.convert_zone_type(&zone, ApexZoneType::Forwarder).is_err());
    }

    #[test]
    fn sign_zone_builds_nsec_chain_and_rrsigs() {
        let mgr = manager();
        let zone = name("example.com.");
        mgr.create_primary(zone.clone(), SerialScheme::Monotonic, 3600).unwrap();
        mgr.add_record(&zone, Record::new(zone.clone(), 3600, RData::A { address: [192, 0, 2, 1] })).unwrap();
        mgr.sign_zone(&zone, false, 8, None).unwrap();

        let apex = mgr.lookup_apex(&zone).unwrap();
        assert_eq!(apex.info().dnssec_status, DnssecStatus::SignedWithNsec);
        assert!(apex.root.get(RRType::NSEC).is_some());
        assert!(apex.root.get(RRType::RRSIG).is_some());
    }

    #[test]
    fn sign_zone_nsec_chain_is_canonically_sorted() {
        let mgr = manager();
        let zone = name("example.com.");
        mgr.create_primary(zone.clone(), SerialScheme::Monotonic, 3600).unwrap();
        // Inserted out of canonical order on purpose: owners_with_types walks
        // a HashMap-backed child set, so nothing upstream of sign_zone
        // guarantees this order — the sort inside sign_zone must fix it.
        for label in ["z", "m", "a"] {
            mgr.add_record(
                &zone,
                Record::new(name(&format!("{}.example.com.", label)), 3600, RData::A { address: [192, 0, 2, 1] }),
            )
            .unwrap();
        }
        mgr.sign_zone(&zone, false, 8, None).unwrap();

        let apex = mgr.lookup_apex(&zone).unwrap();
        // Canonical order is example.com., a, m, z — the apex (shorter,
        // shared-prefix name) sorts first, then subdomains in label order.
        let a_nsec = mgr.inner.tree.lookup(&name("a.example.com.")).unwrap().get(RRType::NSEC).unwrap();
        match &a_nsec.records()[0].rdata {
            RData::Nsec { next_owner, .. } => assert_eq!(next_owner, &name("m.example.com.")),
            _ => panic!("expected NSEC"),
        }
        let apex_nsec = apex.root.get(RRType::NSEC).unwrap();
        match &apex_nsec.records()[0].rdata {
            RData::Nsec { next_owner, .. } => assert_eq!(next_owner, &name("a.example.com.")),
            _ => panic!("expected NSEC"),
        }
    }

    #[test]
    fn delete_zone_removes_apex_and_answers_not_authoritative() {
        let mgr = manager();
        let zone = name("example.com.");
        mgr.create_primary(zone.clone(), SerialScheme::Monotonic, 3600).unwrap();
        mgr.delete_zone(&zone).unwrap();

        assert!(mgr.lookup_apex(&zone).is_none());
        let resp = mgr.query(&QueryRequest { name: zone, rtype: RRType::A, dnssec_ok: false });
        assert!(matches!(resp, QueryResponse::NotAuthoritative));
    }

    #[test]
    fn pagination_slices_sorted_index() {
        let mgr = manager();
        for label in ["a", "b", "c"] {
            mgr.create_primary(name(&format!("{}.example.com.", label)), SerialScheme::Monotonic, 3600).unwrap();
        }
        assert_eq!(mgr.get_zones_page(1, 1).len(), 1);
        assert_eq!(mgr.get_all_zones().len(), 3);
    }

    #[test]
    fn internal_zones_are_never_saved_to_disk() {
        let mgr = manager();
        mgr.ensure_internal_zones();
        mgr.dispose();
        assert!(!mgr.zone_file_path(&name("localhost.")).exists());
    }

    #[test]
    fn update_server_domain_replaces_old_apex_ns_instead_of_appending() {
        let mgr = manager();
        let zone = name("example.com.");
        mgr.create_primary(zone.clone(), SerialScheme::Monotonic, 3600).unwrap();
        let old_domain = mgr.server_domain();

        mgr.update_server_domain(name("new-ns.example.net."));
        thread::sleep(Duration::from_millis(200));

        let apex = mgr.lookup_apex(&zone).unwrap();
        let ns_records = apex.root.get(RRType::NS).unwrap().records().to_vec();
        assert_eq!(ns_records.len(), 1, "old NS must be replaced, not appended to");
        assert_eq!(ns_records[0].rdata, RData::NS { name: name("new-ns.example.net.") });
        assert!(!ns_records.iter().any(|r| r.rdata == RData::NS { name: old_domain.clone() }));
        let _ = fs::remove_dir_all(&mgr.inner.config_root);
    }

    #[test]
    fn debounced_save_writes_zone_file_after_interval() {
        let mgr = manager();
        let zone = name("example.com.");
        mgr.create_primary(zone.clone(), SerialScheme::Monotonic, 3600).unwrap();

        thread::sleep(Duration::from_millis(200));

        let path = mgr.zone_file_path(&zone);
        assert!(path.exists());
        let _ = fs::remove_dir_all(&mgr.inner.config_root);
    }

    fn soa_record(zone: &Name, serial: u32) -> Record {
        let mut responsible = vec!["hostmaster"];
        responsible.extend(zone.labels());
        Record::new(
            zone.clone(),
            3600,
            RData::Soa {
                primary_ns: zone.clone(),
                responsible: Name::from_labels(&responsible),
                serial,
                refresh: 3600,
                retry: 900,
                expire: 604800,
                minimum: 3600,
            },
        )
    }

    #[test]
    fn axfr_sync_replaces_secondary_contents_and_attaches_glue() {
        let mgr = manager();
        let zone = name("example.com.");
        mgr.create_secondary(zone.clone(), vec![]).unwrap();

        let ns = Record::new(zone.clone(), 3600, RData::NS { name: name("ns1.example.com.") });
        let glue = Record::new(name("ns1.example.com."), 3600, RData::A { address: [192, 0, 2, 53] });
        let message = transfer::TransferMessage { records: vec![soa_record(&zone, 5), ns, glue, soa_record(&zone, 5)] };
        mgr.sync_zone_transfer_records(&zone, &message).unwrap();

        let apex = mgr.lookup_apex(&zone).unwrap();
        assert_eq!(apex.serial(), Some(5));
        let ns_set = apex.root.get(RRType::NS).unwrap();
        assert_eq!(ns_set.records()[0].tag.glue().len(), 1);
    }

    #[test]
    fn axfr_sync_rejects_zone_owner_mismatch() {
        let mgr = manager();
        let zone = name("example.com.");
        mgr.create_secondary(zone.clone(), vec![]).unwrap();
        let other = soa_record(&name("example.net."), 5);
        let message = transfer::TransferMessage { records: vec![other.clone(), other] };
        assert!(matches!(
            mgr.sync_zone_transfer_records(&zone, &message),
            Err(ZoneError::InvalidZoneTransfer(_))
        ));
    }

    #[test]
    fn axfr_sync_rejects_on_primary_zone() {
        let mgr = manager();
        let zone = name("example.com.");
        mgr.create_primary(zone.clone(), SerialScheme::Monotonic, 3600).unwrap();
        let soa = mgr.lookup_apex(&zone).unwrap().soa().unwrap();
        let message = transfer::TransferMessage { records: vec![soa.clone(), soa] };
        assert!(matches!(
            mgr.sync_zone_transfer_records(&zone, &message),
            Err(ZoneError::OperationNotSupported(_))
        ));
    }

    #[test]
    fn ixfr_sync_applies_sequence_and_journals_it() {
        let mgr = manager();
        let zone = name("example.com.");
        mgr.create_secondary(zone.clone(), vec![]).unwrap();
        let bootstrap =
            transfer::TransferMessage { records: vec![soa_record(&zone, 10), soa_record(&zone, 10)] };
        mgr.sync_zone_transfer_records(&zone, &bootstrap).unwrap();

        let www = Record::new(name("www.example.com."), 300, RData::A { address: [192, 0, 2, 9] });
        let message = transfer::TransferMessage {
            records: vec![soa_record(&zone, 11), soa_record(&zone, 10), soa_record(&zone, 11), www, soa_record(&zone, 11)],
        };
        mgr.sync_incremental_zone_transfer_records(&zone, &message).unwrap();

        let apex = mgr.lookup_apex(&zone).unwrap();
        assert_eq!(apex.serial(), Some(11));
        assert_eq!(apex.journal().unwrap().latest_serial(), Some(11));
        let resp = mgr.query(&QueryRequest { name: name("www.example.com."), rtype: RRType::A, dnssec_ok: false });
        assert!(matches!(resp, QueryResponse::Answer { .. }));
    }

    #[test]
    fn ixfr_sync_rejects_serial_gap() {
        let mgr = manager();
        let zone = name("example.com.");
        mgr.create_secondary(zone.clone(), vec![]).unwrap();
        let bootstrap =
            transfer::TransferMessage { records: vec![soa_record(&zone, 10), soa_record(&zone, 10)] };
        mgr.sync_zone_transfer_records(&zone, &bootstrap).unwrap();

        // Claims to start from serial 50, but the zone is at 10.
        let message =
            transfer::TransferMessage { records: vec![soa_record(&zone, 51), soa_record(&zone, 50), soa_record(&zone, 51), soa_record(&zone, 51)] };
        assert!(matches!(
            mgr.sync_incremental_zone_transfer_records(&zone, &message),
            Err(ZoneError::InvalidZoneTransfer(_))
        ));
    }

    #[test]
    fn failed_refresh_attempt_moves_secondary_to_failed_then_expired() {
        let mgr = manager_with_transfer_client(Arc::new(AlwaysFailingTransferClient));
        let zone = name("example.com.");
        mgr.create_secondary(zone.clone(), vec![]).unwrap();
        let apex = mgr.lookup_apex(&zone).unwrap();

        assert!(!mgr.attempt_refresh(&zone));
        assert!(matches!(apex.refresh_state(), Some(RefreshState::Failed { attempts: 1, .. })));

        // No prior successful transfer: `last_success` is `None`, so
        // `on_transfer_result` never sees an elapsed expire window and the
        // zone stays Failed across repeated attempts rather than Expired.
        assert!(!mgr.attempt_refresh(&zone));
        assert!(matches!(apex.refresh_state(), Some(RefreshState::Failed { attempts: 2, .. })));
    }

    #[test]
    fn failed_refresh_after_past_success_expires_once_expire_elapses() {
        let mgr = manager_with_transfer_client(Arc::new(AlwaysFailingTransferClient));
        let zone = name("example.com.");
        mgr.create_secondary(zone.clone(), vec![]).unwrap();
        let apex = mgr.lookup_apex(&zone).unwrap();
        // Seed a SOA with a zero-second expire and a past success timestamp
        // so the very first failed attempt crosses the expire threshold.
        let mut soa = soa_record(&zone, 1);
        if let RData::Soa { expire, .. } = &mut soa.rdata {
            *expire = 0;
        }
        apex.set_soa(soa);
        apex.record_refresh_success(SystemTime::now() - Duration::from_secs(10));

        assert!(!mgr.attempt_refresh(&zone));
        assert!(matches!(apex.refresh_state(), Some(RefreshState::Expired)));
    }

    #[test]
    fn successful_refresh_attempt_bootstraps_secondary_zone() {
        let www = Record::new(name("www.example.com."), 300, RData::A { address: [192, 0, 2, 1] });
        let soa = soa_record(&name("example.com."), 7);
        let client = FixedReplyTransferClient(vec![soa.clone(), www, soa]);
        let mgr = manager_with_transfer_client(Arc::new(client));
        let zone = name("example.com.");
        mgr.create_secondary(zone.clone(), vec![]).unwrap();

        assert!(mgr.attempt_refresh(&zone));
        let apex = mgr.lookup_apex(&zone).unwrap();
        assert_eq!(apex.serial(), Some(7));
        assert!(matches!(apex.refresh_state(), Some(RefreshState::Idle)));
        assert!(apex.last_refresh_success().is_some());
    }

    #[test]
    fn produce_axfr_frames_primary_contents_with_delegation_glue() {
        let mgr = manager();
        let zone = name("example.com.");
        mgr.create_primary(zone.clone(), SerialScheme::Monotonic, 3600).unwrap();
        mgr.add_record(&zone, Record::new(name("www.example.com."), 3600, RData::A { address: [192, 0, 2, 1] })).unwrap();
        mgr.add_record(
            &zone,
            Record::new(name("sub.example.com."), 3600, RData::NS { name: name("ns1.sub.example.com.") }),
        )
        .unwrap();
        mgr.add_record(
            &zone,
            Record::new(name("ns1.sub.example.com."), 3600, RData::A { address: [198, 51, 100, 1] }),
        )
        .unwrap();

        let msg = mgr.query_zone_transfer_records(&zone).unwrap();
        assert_eq!(msg.records.first().unwrap().rtype(), RRType::SOA);
        assert_eq!(msg.records.last().unwrap().rtype(), RRType::SOA);
        assert!(msg.records.iter().any(|r| r.name == name("www.example.com.") && r.rtype() == RRType::A));
        assert!(msg.records.iter().any(|r| r.name == name("sub.example.com.") && r.rtype() == RRType::NS));
    }

    /// Administering a delegation directly on a Primary zone (spec
    /// scenario S3: `add_record` an NS plus its glue A, the normal way an
    /// operator manages a zone) must tag-attach the glue onto the NS
    /// record, and a referral for a name under that delegation must carry
    /// the glue in its additional section.
    #[test]
    fn add_record_attaches_glue_and_referral_carries_it() {
        let mgr = manager();
        let zone = name("example.com.");
        mgr.create_primary(zone.clone(), SerialScheme::Monotonic, 3600).unwrap();
        mgr.add_record(
            &zone,
            Record::new(name("sub.example.com."), 3600, RData::NS { name: name("ns1.sub.example.com.") }),
        )
        .unwrap();
        mgr.add_record(
            &zone,
            Record::new(name("ns1.sub.example.com."), 3600, RData::A { address: [198, 51, 100, 1] }),
        )
        .unwrap();

        let apex = mgr.lookup_apex(&zone).unwrap();
        let ns_set = apex.root.get(RRType::NS);
        assert!(ns_set.is_none(), "NS for the delegation lives at the sub node, not the apex");
        let node = mgr.inner.tree.lookup(&name("sub.example.com.")).unwrap();
        let ns_record = node.get(RRType::NS).unwrap().records().to_vec();
        assert_eq!(ns_record.len(), 1);
        assert_eq!(ns_record[0].tag.glue().len(), 1);
        assert_eq!(ns_record[0].tag.glue()[0].rdata, RData::A { address: [198, 51, 100, 1] });

        let resp = mgr.query(&QueryRequest {
            name: name("host.sub.example.com."),
            rtype: RRType::A,
            dnssec_ok: false,
        });
        match resp {
            QueryResponse::Referral { glue, .. } => {
                assert_eq!(glue.len(), 1);
                assert_eq!(glue[0].rdata, RData::A { address: [198, 51, 100, 1] });
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn produce_axfr_rejects_non_primary_zone() {
        let mgr = manager();
        let zone = name("example.com.");
        mgr.create_secondary(zone.clone(), vec![]).unwrap();
        assert!(matches!(
            mgr.query_zone_transfer_records(&zone),
            Err(ZoneError::OperationNotSupported(_))
        ));
    }

    #[test]
    fn produce_ixfr_walks_journal_and_falls_back_when_unknown() {
        let mgr = manager();
        let zone = name("example.com.");
        mgr.create_primary(zone.clone(), SerialScheme::Monotonic, 3600).unwrap();
        let apex = mgr.lookup_apex(&zone).unwrap();
        let current = apex.serial().unwrap();
        mgr.add_record(&zone, Record::new(name("www.example.com."), 3600, RData::A { address: [192, 0, 2, 1] })).unwrap();

        let outcome = mgr.query_incremental_zone_transfer_records(&zone, current).unwrap();
        assert!(matches!(outcome, transfer::IxfrOutcome::Diff(_)));

        let fallback = mgr.query_incremental_zone_transfer_records(&zone, 99_999).unwrap();
        assert!(matches!(fallback, transfer::IxfrOutcome::FallBackToAxfr));
    }

    #[test]
    fn clone_zone_rewrites_owner_suffix() {
        let mgr = manager();
        let source = name("example.com.");
        mgr.create_primary(source.clone(), SerialScheme::Monotonic, 3600).unwrap();
        mgr.add_record(&source, Record::new(name("www.example.com."), 300, RData::A { address: [192, 0, 2, 9] })).unwrap();

        let dest = name("example.org.");
        mgr.clone_zone(&source, dest.clone()).unwrap();

        let resp = mgr.query(&QueryRequest { name: name("www.example.org."), rtype: RRType::A, dnssec_ok: false });
        assert!(matches!(resp, QueryResponse::Answer { .. }));
    }
}
