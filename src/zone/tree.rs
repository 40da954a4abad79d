use crate::shared::dns::Name;
use crate::zone::apex::ApexZoneType;
use crate::zone::record::{Record, RRSet};
use crate::zone::rtype::RRType;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// A marker left on a tree node that is the root of an [`crate::zone::apex::ApexZone`].
/// Kept deliberately thin: the node only needs to know it *is* an apex and of
/// which variant to make tree-local routing decisions (referral vs. answer);
/// the full apex state (journal, refresh FSM, keys...) lives in the
/// [`crate::zone::apex::ApexZone`] object owned by the zone manager's index
/// and reached by name — a weak relation, avoiding cycles between nodes
/// and apex objects.
#[derive(Debug, Clone, Copy)]
pub struct ApexMarker {
    pub zone_type: ApexZoneType,
    pub disabled: bool,
}

/// A single node of the [`ZoneTree`], addressed by a [`Name`]. Owns a
/// `type -> RRSet` mapping and tracks its children for descent and
/// NXDOMAIN/NODATA discrimination.
pub struct ZoneNode {
    pub name: Name,
    rrsets: RwLock<HashMap<RRType, Arc<RRSet>>>,
    children: RwLock<HashMap<String, Arc<ZoneNode>>>,
    apex: RwLock<Option<ApexMarker>>,
}

impl ZoneNode {
    fn new(name: Name) -> Self {
        ZoneNode {
            name,
            rrsets: RwLock::new(HashMap::new()),
            children: RwLock::new(HashMap::new()),
            apex: RwLock::new(None),
        }
    }

    pub fn is_apex(&self) -> bool {
        self.apex.read().unwrap().is_some()
    }

    pub fn apex_marker(&self) -> Option<ApexMarker> {
        *self.apex.read().unwrap()
    }

    pub fn set_apex_marker(&self, marker: Option<ApexMarker>) {
        *self.apex.write().unwrap() = marker;
    }

    /// Reports whether this node carries an NS RRSet while not itself
    /// being an apex root — the delegation signal.
    pub fn is_delegation_point(&self) -> bool {
        !self.is_apex() && self.rrsets.read().unwrap().contains_key(&RRType::NS)
    }

    pub fn has_children(&self) -> bool {
        !self.children.read().unwrap().is_empty()
    }

    pub fn child_names(&self) -> Vec<String> {
        self.children.read().unwrap().keys().cloned().collect()
    }

    /// A snapshot of the immediate children, for callers (DNSSEC chain
    /// building, zone conversion) that need to walk the subtree owned by
    /// this node rather than just test for presence.
    pub fn children(&self) -> Vec<Arc<ZoneNode>> {
        self.children.read().unwrap().values().cloned().collect()
    }

    pub fn get(&self, rtype: RRType) -> Option<Arc<RRSet>> {
        self.rrsets.read().unwrap().get(&rtype).cloned()
    }

    pub fn get_all(&self) -> Vec<(RRType, Arc<RRSet>)> {
        self.rrsets
            .read()
            .unwrap()
            .iter()
            .map(|(t, s)| (*t, s.clone()))
            .collect()
    }

    pub fn has_any_records(&self) -> bool {
        !self.rrsets.read().unwrap().is_empty()
    }

    /// Replaces the RRSet for `rtype` with `set` in a single atomic swap
    /// (copy-on-write: a per-RRSet atomic reference swap).
    pub fn set_rrset(&self, rtype: RRType, set: RRSet) {
        self.rrsets.write().unwrap().insert(rtype, Arc::new(set));
    }

    pub fn remove_rrset(&self, rtype: RRType) {
        self.rrsets.write().unwrap().remove(&rtype);
    }

    /// Mutates the RRSet for `rtype` via `f`, creating an empty one first
    /// if absent, then swaps the new value in.
    pub fn upsert_record(&self, record: Record) {
        let rtype = record.rtype();
        let mut sets = self.rrsets.write().unwrap();
        let mut set = sets.get(&rtype).map(|s| (**s).clone()).unwrap_or_default();
        set.upsert(record);
        sets.insert(rtype, Arc::new(set));
    }

    pub fn delete_record(&self, record: &Record) -> bool {
        let rtype = record.rtype();
        let mut sets = self.rrsets.write().unwrap();
        let removed = if let Some(existing) = sets.get(&rtype) {
            let mut set = (**existing).clone();
            let removed = set.remove_matching(record);
            if set.is_empty() {
                sets.remove(&rtype);
            } else {
                sets.insert(rtype, Arc::new(set));
            }
            removed
        } else {
            false
        };
        removed
    }

    pub fn delete_all_of_type(&self, rtype: RRType) -> bool {
        self.rrsets.write().unwrap().remove(&rtype).is_some()
    }
}

/// Result of [`ZoneTree::find_zone`], the primary tree lookup operation.
pub struct FindZoneResult {
    /// The exact node for the queried name, if one exists.
    pub matched: Option<Arc<ZoneNode>>,
    /// The deepest existing non-apex ancestor of the queried name.
    pub closest_subdomain: Option<Arc<ZoneNode>>,
    /// The deepest NS-cut node on the path below the apex, if descent
    /// crossed a delegation.
    pub delegation: Option<Arc<ZoneNode>>,
    /// The deepest enclosing apex reached while descending.
    pub apex_name: Option<Name>,
    /// True iff the closest encloser has any children below the queried
    /// name — distinguishes NXDOMAIN from NODATA.
    pub has_subdomains: bool,
    /// The wildcard sibling node used to synthesize an answer, if any.
    pub wildcard: Option<Arc<ZoneNode>>,
}

impl FindZoneResult {
    pub fn apex_is_stub_or_equivalent(&self) -> bool {
        self.apex_name.is_some() && self.matched.is_none() && self.delegation.is_none()
    }
}

/// A case-insensitive, label-indexed trie over the whole namespace served
/// by this process. One tree holds every apex zone and every subdomain
/// node; apex roots are marked in place (see [`ApexMarker`]).
pub struct ZoneTree {
    root: Arc<ZoneNode>,
}

impl Default for ZoneTree {
    fn default() -> Self {
        Self::new()
    }
}

impl ZoneTree {
    pub fn new() -> Self {
        ZoneTree { root: Arc::new(ZoneNode::new(Name::root())) }
    }

    pub fn root(&self) -> Arc<ZoneNode> {
        self.root.clone()
    }

    /// Atomically materializes the node for `name`, creating any missing
    /// ancestor nodes along the way. `factory` is invoked with the freshly
    /// created node so callers can set its apex marker or leave it plain
    /// (used by [`crate::zone::manager::ZoneManager`] to pick the subdomain
    /// class based on the owning apex variant).
    pub fn get_or_add(&self, name: &Name, factory: impl Fn(&ZoneNode)) -> Arc<ZoneNode> {
        let labels = name.labels_reversed();
        let mut node = self.root.clone();
        let mut path = Name::root();
        for label in labels {
            let lower = label.to_ascii_lowercase();
            path = Name::from_labels(
                &{
                    let mut v = path.labels();
                    v.push(label);
                    v
                },
            );
            let existing = node.children.read().unwrap().get(&lower).cloned();
            node = match existing {
                Some(child) => child,
                None => {
                    let child = Arc::new(ZoneNode::new(path.clone()));
                    factory(&child);
                    node.children.write().unwrap().insert(lower, child.clone());
                    child
                }
            };
        }
        node
    }

    /// Removes the node for `name`. The caller must ensure the node is
    /// empty of records, children and apex marker before calling.
    pub fn try_remove(&self, name: &Name) -> bool {
        let Some(parent_name) = name.parent() else { return false };
        let Some(parent) = self.lookup(&parent_name) else { return false };
        let leaf_label = name.labels().first().map(|s| s.to_ascii_lowercase());
        let Some(label) = leaf_label else { return false };
        let mut children = parent.children.write().unwrap();
        if let Some(node) = children.get(&label) {
            if node.has_any_records() || node.has_children() || node.is_apex() {
                return false;
            }
            children.remove(&label);
            return true;
        }
        false
    }

    /// Garbage-collects an empty subdomain node and any now-empty
    /// ancestors, stopping at the first apex root or non-empty ancestor.
    pub fn garbage_collect(&self, name: &Name) {
        let mut current = name.clone();
        loop {
            if !self.try_remove(&current) {
                return;
            }
            match current.parent() {
                Some(parent) if !parent.is_root() => current = parent,
                _ => return,
            }
        }
    }

    /// Plain lookup with no wildcard/delegation bookkeeping.
    pub fn lookup(&self, name: &Name) -> Option<Arc<ZoneNode>> {
        let labels = name.labels_reversed();
        let mut node = self.root.clone();
        for label in labels {
            let lower = label.to_ascii_lowercase();
            let child = node.children.read().unwrap().get(&lower).cloned();
            node = child?;
        }
        Some(node)
    }

    /// Immediate children of `name`'s node only, for admin enumeration.
    pub fn list_subdomains(&self, name: &Name) -> Vec<Arc<ZoneNode>> {
        match self.lookup(name) {
            Some(node) => node.children.read().unwrap().values().cloned().collect(),
            None => vec![],
        }
    }

    /// Every node in the subtree rooted at `name`, not crossing into a
    /// nested (delegated) apex. Used by the zone manager to walk all
    /// subdomain nodes belonging to one apex zone: DNSSEC chain
    /// maintenance, zone-type conversion and AXFR record collection all
    /// need this rather than a single-level child listing.
    pub fn subtree_nodes(&self, name: &Name) -> Vec<Arc<ZoneNode>> {
        let mut out = Vec::new();
        let Some(root) = self.lookup(name) else { return out };
        let mut stack = vec![root];
        while let Some(node) = stack.pop() {
            for child in node.children() {
                if child.is_apex() {
                    out.push(child);
                    continue;
                }
                stack.push(child);
            }
            out.push(node);
        }
        out
    }

    /// The primary query-resolution tree walk.
    pub fn find_zone(&self, name: &Name) -> FindZoneResult {
        let labels = name.labels_reversed();
        let mut node = self.root.clone();
        let mut apex_name = node.apex_marker().map(|_| node.name.clone());
        let mut delegation: Option<Arc<ZoneNode>> = None;
        let mut closest = node.clone();
        let mut matched = true;

        for label in &labels {
            let lower = label.to_ascii_lowercase();
            let child = node.children.read().unwrap().get(&lower).cloned();
            match child {
                Some(c) => {
                    node = c;
                    closest = node.clone();
                    if node.is_apex() {
                        // A hosted apex reached below another apex already on
                        // this path is a zone cut too: the parent zone still
                        // delegates here, it just happens that we also serve
                        // the child ourselves. DS queries need this recorded
                        // so they can shift to the parent side (spec.md §4.3
                        // item 4); non-DS queries at or below this name keep
                        // resolving against the child apex as usual, since
                        // `query()` only acts on this for an exact-name DS hit.
                        if apex_name.is_some() {
                            delegation = Some(node.clone());
                        }
                        apex_name = Some(node.name.clone());
                    } else if node.is_delegation_point() {
                        delegation = Some(node.clone());
                    }
                }
                None => {
                    matched = false;
                    break;
                }
            }
        }

        let matched_node = if matched { Some(node.clone()) } else { None };
        let closest_subdomain = if closest.is_apex() { None } else { Some(closest.clone()) };

        let mut wildcard = None;
        let mut has_subdomains = false;
        if !matched {
            // `closest` is the last node we successfully descended into —
            // the closest encloser. Its "*" child, if any, is the
            // wildcard sibling (RFC 4592).
            wildcard = closest.children.read().unwrap().get("*").cloned();
            has_subdomains = closest.has_children();
        } else if let Some(m) = &matched_node {
            has_subdomains = m.has_children();
        }

        // Tie-break (an open question in the delegation/wildcard precedence
        // rules): delegation wins over a same-level wildcard when its label
        // count exceeds the apex's.
        if wildcard.is_some() && delegation.is_some() {
            let deleg = delegation.as_ref().unwrap();
            if deleg.name.label_count() > apex_name.as_ref().map(|n| n.label_count()).unwrap_or(0) {
                wildcard = None;
            }
        }

        FindZoneResult { matched: matched_node, closest_subdomain, delegation, apex_name, has_subdomains, wildcard }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::zone::record::RData;

    fn name(s: &str) -> Name {
        Name::from_string(s).unwrap()
    }

    #[test]
    fn get_or_add_materializes_ancestors() {
        let tree = ZoneTree::new();
        let node = tree.get_or_add(&name("www.example.com."), |_| {});
        assert_eq!(node.name, name("www.example.com."));
        assert!(tree.lookup(&name("example.com.")).is_some());
        assert!(tree.lookup(&name("com.")).is_some());
    }

    #[test]
    fn find_zone_reports_apex_and_nxdomain_vs_nodata() {
        let tree = ZoneTree::new();
        let apex = tree.get_or_add(&name("example.com."), |n| {
            n.set_apex_marker(Some(ApexMarker { zone_type: ApexZoneType::Primary, disabled: false }));
        });
        apex.upsert_record(Record::new(name("example.com."), 3600, RData::A { address: [192, 0, 2, 1] }));
        tree.get_or_add(&name("www.example.com."), |_| {});

        let r = tree.find_zone(&name("example.com."));
        assert!(r.matched.is_some());
        assert_eq!(r.apex_name, Some(name("example.com.")));

        // "sub.example.com." doesn't exist but has a child -> NODATA territory.
        tree.get_or_add(&name("deep.sub.example.com."), |_| {});
        let r2 = tree.find_zone(&name("sub.example.com."));
        assert!(r2.matched.is_none());
        assert!(r2.has_subdomains);

        // "nothing.example.com." doesn't exist and has no children -> NXDOMAIN territory.
        let r3 = tree.find_zone(&name("nothing.example.com."));
        assert!(r3.matched.is_none());
        assert!(!r3.has_subdomains);
    }

    #[test]
    fn wildcard_sibling_is_found_at_closest_encloser() {
        let tree = ZoneTree::new();
        tree.get_or_add(&name("example.com."), |n| {
            n.set_apex_marker(Some(ApexMarker { zone_type: ApexZoneType::Primary, disabled: false }));
        });
        let wc = tree.get_or_add(&name("*.x.example.com."), |_| {});
        wc.upsert_record(Record::new(name("*.x.example.com."), 3600, RData::A { address: [192, 0, 2, 5] }));

        let r = tree.find_zone(&name("foo.x.example.com."));
        assert!(r.matched.is_none());
        assert!(r.wildcard.is_some());
    }

    #[test]
    fn subtree_nodes_stops_at_nested_apex() {
        let tree = ZoneTree::new();
        tree.get_or_add(&name("example.com."), |n| {
            n.set_apex_marker(Some(ApexMarker { zone_type: ApexZoneType::Primary, disabled: false }));
        });
        tree.get_or_add(&name("www.example.com."), |_| {});
        tree.get_or_add(&name("sub.example.com."), |n| {
            n.set_apex_marker(Some(ApexMarker { zone_type: ApexZoneType::Primary, disabled: false }));
        });
        tree.get_or_add(&name("host.sub.example.com."), |_| {});

        let nodes = tree.subtree_nodes(&name("example.com."));
        let names: Vec<String> = nodes.iter().map(|n| n.name.as_ref().to_string()).collect();
        assert!(names.contains(&"www.example.com.".to_string()));
        assert!(names.contains(&"sub.example.com.".to_string()));
        assert!(!names.contains(&"host.sub.example.com.".to_string()));
    }

    #[test]
    fn garbage_collect_removes_empty_ancestors() {
        let tree = ZoneTree::new();
        tree.get_or_add(&name("example.com."), |n| {
            n.set_apex_marker(Some(ApexMarker { zone_type: ApexZoneType::Primary, disabled: false }));
        });
        tree.get_or_add(&name("a.b.example.com."), |_| {});
        tree.garbage_collect(&name("a.b.example.com."));
        assert!(tree.lookup(&name("a.b.example.com.")).is_none());
        assert!(tree.lookup(&name("b.example.com.")).is_none());
        assert!(tree.lookup(&name("example.com.")).is_some());
    }
}
