use crate::zone::journal::Journal;
use crate::zone::record::{RData, Record, RRSet};
use crate::zone::refresh::RefreshState;
use crate::zone::rtype::RRType;
use crate::zone::tree::ZoneNode;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, RwLock};
use std::time::SystemTime;

/// The four apex variants a zone can be hosted as.
/// Deliberately a flat tagged union (no trait objects/inheritance chain)
/// so the zone manager can exhaustively match conversion rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApexZoneType {
    Primary,
    Secondary,
    Stub,
    Forwarder,
}

impl ApexZoneType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApexZoneType::Primary => "Primary",
            ApexZoneType::Secondary => "Secondary",
            ApexZoneType::Stub => "Stub",
            ApexZoneType::Forwarder => "Forwarder",
        }
    }
}

impl std::fmt::Display for ApexZoneType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// DNSSEC signing status tracked per apex.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DnssecStatus {
    Unsigned,
    SignedWithNsec,
    SignedWithNsec3,
}

/// Variant-specific state that doesn't belong on every apex: upstream
/// primaries and refresh machinery for Secondary/Stub, forwarder targets
/// for Forwarder. Primary carries nothing extra beyond the shared fields.
pub enum ApexVariant {
    /// `journal` backs IXFR production and is appended to on every
    /// authoritative write.
    Primary { journal: Journal },
    /// `journal` here records whatever the upstream IXFR supplied on each
    /// successful incremental sync, so this zone can itself serve as an
    /// IXFR source to a downstream slave. `last_success` backs the refresh
    /// timer's `on_transfer_result` calls: the SOA `expire` timer counts
    /// down from the last time a transfer actually landed, not from now.
    Secondary { primaries: Vec<SocketAddr>, refresh: Mutex<RefreshState>, journal: Journal, last_success: Mutex<Option<SystemTime>> },
    Stub { primaries: Vec<SocketAddr>, refresh: Mutex<RefreshState>, last_success: Mutex<Option<SystemTime>> },
    Forwarder,
}

impl ApexVariant {
    pub fn primary() -> Self {
        ApexVariant::Primary { journal: Journal::new() }
    }

    pub fn zone_type(&self) -> ApexZoneType {
        match self {
            ApexVariant::Primary { .. } => ApexZoneType::Primary,
            ApexVariant::Secondary { .. } => ApexZoneType::Secondary,
            ApexVariant::Stub { .. } => ApexZoneType::Stub,
            ApexVariant::Forwarder => ApexZoneType::Forwarder,
        }
    }
}

/// Administrative metadata about an apex zone, returned by listing and
/// status operations (`GetAllZones`/`GetZonesPage`).
#[derive(Debug, Clone)]
pub struct ApexZoneInfo {
    pub name: crate::shared::dns::Name,
    pub zone_type: ApexZoneType,
    pub disabled: bool,
    pub dnssec_status: DnssecStatus,
    pub created_at: SystemTime,
    pub last_modified: SystemTime,
}

/// Shared operations every apex variant supports, regardless of how it
/// sources its records.
pub trait ApexZoneBehavior {
    fn query_records(&self, name: &crate::shared::dns::Name, rtype: RRType) -> Vec<Record>;
    fn get_records(&self, name: &crate::shared::dns::Name) -> Vec<Record>;
    fn update_dnssec_status(&self, status: DnssecStatus);
    fn contains_name_server_records(&self) -> bool;
}

/// An authoritative (or forwarding) zone rooted at a [`ZoneNode`]. Owned by
/// the zone manager's name-indexed registry; the tree node it wraps only
/// carries a lightweight [`crate::zone::tree::ApexMarker`], so this is the
/// single strong owner of the full apex state.
pub struct ApexZone {
    pub root: Arc<ZoneNode>,
    info: RwLock<ApexZoneInfo>,
    pub variant: ApexVariant,
}

impl ApexZone {
    pub fn new(root: Arc<ZoneNode>, zone_type: ApexZoneType, variant: ApexVariant) -> Self {
        ApexZone {
            info: RwLock::new(ApexZoneInfo {
                name: root.name.clone(),
                zone_type,
                disabled: false,
                dnssec_status: DnssecStatus::Unsigned,
                created_at: SystemTime::now(),
                last_modified: SystemTime::now(),
            }),
            root,
            variant,
        }
    }

    pub fn info(&self) -> ApexZoneInfo {
        self.info.read().unwrap().clone()
    }

    pub fn name(&self) -> crate::shared::dns::Name {
        self.root.name.clone()
    }

    pub fn zone_type(&self) -> ApexZoneType {
        self.variant.zone_type()
    }

    pub fn set_disabled(&self, disabled: bool) {
        let mut info = self.info.write().unwrap();
        info.disabled = disabled;
        info.last_modified = SystemTime::now();
    }

    pub fn touch(&self) {
        self.info.write().unwrap().last_modified = SystemTime::now();
    }

    pub fn soa(&self) -> Option<Record> {
        self.root
            .get(RRType::SOA)
            .and_then(|set| set.records().first().cloned())
    }

    pub fn serial(&self) -> Option<u32> {
        self.soa().and_then(|r| match r.rdata {
            RData::Soa { serial, .. } => Some(serial),
            _ => None,
        })
    }

    /// Reports whether this apex is usable for query answering right now:
    /// not administratively disabled, and (for Secondary/Stub) not expired.
    pub fn is_servable(&self) -> bool {
        let info = self.info.read().unwrap();
        if info.disabled {
            return false;
        }
        match &self.variant {
            ApexVariant::Secondary { refresh, .. } | ApexVariant::Stub { refresh, .. } => {
                !matches!(*refresh.lock().unwrap(), RefreshState::Expired)
            }
            _ => true,
        }
    }

    pub fn refresh_state(&self) -> Option<RefreshState> {
        match &self.variant {
            ApexVariant::Secondary { refresh, .. } | ApexVariant::Stub { refresh, .. } => {
                Some(refresh.lock().unwrap().clone())
            }
            _ => None,
        }
    }

    pub fn set_refresh_state(&self, new_state: RefreshState) {
        match &self.variant {
            ApexVariant::Secondary { refresh, .. } | ApexVariant::Stub { refresh, .. } => {
                *refresh.lock().unwrap() = new_state;
            }
            _ => {}
        }
    }

    /// The timestamp of the last transfer that actually landed, if any.
    /// Feeds `on_transfer_result`'s `expire` check: the clock runs from
    /// the last good data, not from the last attempt.
    pub fn last_refresh_success(&self) -> Option<SystemTime> {
        match &self.variant {
            ApexVariant::Secondary { last_success, .. } | ApexVariant::Stub { last_success, .. } => {
                *last_success.lock().unwrap()
            }
            _ => None,
        }
    }

    pub fn record_refresh_success(&self, at: SystemTime) {
        if let ApexVariant::Secondary { last_success, .. } | ApexVariant::Stub { last_success, .. } = &self.variant {
            *last_success.lock().unwrap() = Some(at);
        }
    }

    pub fn journal(&self) -> Option<&Journal> {
        match &self.variant {
            ApexVariant::Primary { journal } | ApexVariant::Secondary { journal, .. } => Some(journal),
            _ => None,
        }
    }

    pub fn primaries(&self) -> &[SocketAddr] {
        match &self.variant {
            ApexVariant::Secondary { primaries, .. } | ApexVariant::Stub { primaries, .. } => primaries,
            _ => &[],
        }
    }

    /// Forwarder targets attached to this apex's root node, if it is a
    /// Forwarder zone (`RRType::FWD` records).
    pub fn forwarders(&self) -> Vec<Record> {
        match self.variant {
            ApexVariant::Forwarder => self
                .root
                .get(RRType::FWD)
                .map(|set| set.active_records().cloned().collect())
                .unwrap_or_default(),
            _ => vec![],
        }
    }

    /// Replaces the whole SOA RRSet in a single swap, bumping the serial
    /// via `bump` (supplied by the caller, which knows the serial scheme).
    pub fn set_soa(&self, record: Record) {
        self.root.set_rrset(RRType::SOA, RRSet::from_records(vec![record]));
        self.touch();
    }

    /// Walks the whole subtree owned by this apex (not crossing into a
    /// nested/delegated apex) collecting every record of `rtype`. Used to
    /// gather an apex's NSEC/NSEC3 chain for proof-of-non-existence lookups
    /// without a separate cached chain structure: the
    /// chain *is* the set of NSEC/NSEC3 records already stored in the tree.
    pub fn collect_chain(&self, rtype: RRType) -> Vec<Record> {
        let mut out = Vec::new();
        let mut stack = vec![self.root.clone()];
        while let Some(node) = stack.pop() {
            if let Some(set) = node.get(rtype) {
                out.extend(set.records().iter().cloned());
            }
            for child in node.children() {
                if child.is_apex() {
                    continue;
                }
                stack.push(child);
            }
        }
        out
    }

    /// Every `(owner, types)` pair present in this apex's subtree, the raw
    /// material the DNSSEC chain builders in `zone::dnssec` consume.
    pub fn owners_with_types(&self) -> Vec<(crate::shared::dns::Name, Vec<RRType>)> {
        let mut out = Vec::new();
        let mut stack = vec![self.root.clone()];
        while let Some(node) = stack.pop() {
            if node.has_any_records() {
                let types: Vec<RRType> = node
                    .get_all()
                    .into_iter()
                    .map(|(t, _)| t)
                    .filter(|t| !t.is_dnssec_meta())
                    .collect();
                if !types.is_empty() {
                    out.push((node.name.clone(), types));
                }
            }
            for child in node.children() {
                if child.is_apex() {
                    continue;
                }
                stack.push(child);
            }
        }
        out
    }
}

impl ApexZoneBehavior for ApexZone {
    fn query_records(&self, name: &crate::shared::dns::Name, rtype: RRType) -> Vec<Record> {
        if !self.is_servable() {
            return vec![];
        }
        if matches!(self.variant, ApexVariant::Forwarder) {
            return self.forwarders();
        }
        if name != &self.root.name {
            return vec![];
        }
        self.root
            .get(rtype)
            .map(|set| set.active_records().cloned().collect())
            .unwrap_or_default()
    }

    fn get_records(&self, name: &crate::shared::dns::Name) -> Vec<Record> {
        if name != &self.root.name {
            return vec![];
        }
        self.root
            .get_all()
            .into_iter()
            .flat_map(|(_, set)| set.records().to_vec())
            .collect()
    }

    fn update_dnssec_status(&self, status: DnssecStatus) {
        self.info.write().unwrap().dnssec_status = status;
    }

    fn contains_name_server_records(&self) -> bool {
        self.root.get(RRType::NS).map(|s| !s.is_empty()).unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::dns::Name;
    use crate::zone::tree::ZoneTree;

    fn apex(zone_type: ApexZoneType) -> ApexZone {
        let tree = ZoneTree::new();
        let root = tree.get_or_add(&Name::from_string("example.com.").unwrap(), |_| {});
        let variant = match zone_type {
            ApexZoneType::Primary => ApexVariant::primary(),
            ApexZoneType::Forwarder => ApexVariant::Forwarder,
            ApexZoneType::Secondary => ApexVariant::Secondary {
                primaries: vec![],
                refresh: Mutex::new(RefreshState::Idle),
                journal: Journal::new(),
                last_success: Mutex::new(None),
            },
            ApexZoneType::Stub => ApexVariant::Stub {
                primaries: vec![],
                refresh: Mutex::new(RefreshState::Idle),
                last_success: Mutex::new(None),
            },
        };
        ApexZone::new(root, zone_type, variant)
    }

    #[test]
    fn disabled_zone_answers_nothing() {
        let z = apex(ApexZoneType::Primary);
        z.root.upsert_record(Record::new(z.name(), 3600, RData::A { address: [1, 2, 3, 4] }));
        z.set_disabled(true);
        assert!(z.query_records(&z.name(), RRType::A).is_empty());
    }

    #[test]
    fn expired_secondary_stops_answering() {
        let z = apex(ApexZoneType::Secondary);
        z.root.upsert_record(Record::new(z.name(), 3600, RData::A { address: [1, 2, 3, 4] }));
        assert!(!z.query_records(&z.name(), RRType::A).is_empty());
        z.set_refresh_state(RefreshState::Expired);
        assert!(z.query_records(&z.name(), RRType::A).is_empty());
    }

    #[test]
    fn forwarder_returns_forwarder_targets_regardless_of_question() {
        let z = apex(ApexZoneType::Forwarder);
        z.root.upsert_record(Record::new(
            z.name(),
            0,
            RData::Fwd { forwarder: "203.0.113.1".into(), priority: 10, dnssec_validation: false },
        ));
        let answers = z.query_records(&z.name(), RRType::A);
        assert_eq!(answers.len(), 1);
    }
}
