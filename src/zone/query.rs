use crate::shared::dns::Name;
use crate::zone::apex::{ApexZone, ApexZoneBehavior, ApexZoneType, DnssecStatus};
use crate::zone::dnssec::{self, Nsec3Params};
use crate::zone::record::{RData, Record};
use crate::zone::rtype::RRType;
use crate::zone::tree::{FindZoneResult, ZoneTree};
use std::sync::Arc;

/// Bounds CNAME/DNAME chase loops so a cyclic alias chain can never spin
/// the query engine forever.
pub const MAX_CNAME_HOPS: usize = 8;

pub struct QueryRequest {
    pub name: Name,
    pub rtype: RRType,
    /// Whether the requester wants DNSSEC data (the wire `DO` bit). The
    /// effective `dnssecOk` is this AND the apex being signed — the second
    /// half of that conjunction is applied inside [`query`].
    pub dnssec_ok: bool,
}

/// NSEC3 hashing parameters an apex signed with NSEC3 was set up with.
/// Supplied by the caller (the zone manager knows which apex uses which
/// salt/iteration count); `query` itself never invents parameters.
pub type Nsec3Lookup<'a> = dyn Fn(&Name) -> Option<Nsec3Params> + 'a;

/// Attaches the NSEC(3) proof of non-existence appropriate to `apex`'s
/// signing status. A no-op (empty vec) for an unsigned apex or an
/// unsatisfied `dnssec_ok`.
fn proof_of_nonexistence(
    apex: &ApexZone,
    dnssec_ok: bool,
    nsec3_params: &Nsec3Lookup,
    name: &Name,
    wildcard: bool,
) -> Vec<Record> {
    if !dnssec_ok {
        return vec![];
    }
    match apex.info().dnssec_status {
        DnssecStatus::Unsigned => vec![],
        DnssecStatus::SignedWithNsec => {
            let chain = apex.collect_chain(RRType::NSEC);
            let proof = if wildcard {
                dnssec::find_nsec_wildcard_nonexistence(&chain, name)
            } else {
                dnssec::find_nsec_proof_of_nonexistence(&chain, name)
            };
            proof.into_iter().collect()
        }
        DnssecStatus::SignedWithNsec3 => {
            let Some(params) = nsec3_params(&apex.name()) else { return vec![] };
            let chain = apex.collect_chain(RRType::NSEC3);
            let proof = if wildcard {
                dnssec::find_nsec3_wildcard_nonexistence(&chain, name, &params)
            } else {
                dnssec::find_nsec3_proof_of_nonexistence(&chain, name, &params)
            };
            proof.into_iter().collect()
        }
    }
}

/// The outcome of [`query`], one variant per answer shape.
#[derive(Debug)]
pub enum QueryResponse {
    /// A direct or alias-chased answer. `records` includes any CNAME/DNAME
    /// hops followed by the final matching RRSet, in resolution order.
    /// `nsec` carries the wildcard-non-existence proof when the answer
    /// was synthesized from a wildcard; empty otherwise.
    Answer { owner: Name, records: Vec<Record>, additionals: Vec<Record>, nsec: Vec<Record> },
    /// A referral to a delegated subzone: NS records at the cut plus any
    /// in-bailiwick glue.
    Referral { delegation: Name, ns_records: Vec<Record>, glue: Vec<Record> },
    /// The owner name exists but has no data of the requested type.
    NoData { soa: Option<Record>, nsec: Vec<Record> },
    /// Neither the owner name nor a wildcard covering it exists.
    NxDomain { soa: Option<Record>, nsec: Vec<Record> },
    /// This apex is a forwarder; the caller should re-issue the query to
    /// one of these targets.
    Forward { targets: Vec<Record> },
    /// No apex in this tree is authoritative for the name at all: the
    /// caller may recurse if `recursion_allowed`, otherwise refuse.
    NotAuthoritative,
}

/// Resolves `request` against `tree`/`lookup_apex`. `lookup_apex` resolves
/// an apex name to its [`ApexZone`] (owned by the zone manager's index,
/// not the tree).
pub fn query(
    tree: &ZoneTree,
    lookup_apex: impl Fn(&Name) -> Option<Arc<ApexZone>>,
    request: &QueryRequest,
    nsec3_params: &Nsec3Lookup,
) -> QueryResponse {
    let mut current_name = request.name.clone();
    let mut chain: Vec<Record> = Vec::new();

    for _ in 0..=MAX_CNAME_HOPS {
        let find = tree.find_zone(&current_name);
        let Some(apex_name) = &find.apex_name else {
            return if chain.is_empty() { QueryResponse::NotAuthoritative } else { end_chain(chain, current_name) };
        };
        let Some(apex) = lookup_apex(apex_name) else {
            return if chain.is_empty() { QueryResponse::NotAuthoritative } else { end_chain(chain, current_name) };
        };
        if !apex.is_servable() {
            return if chain.is_empty() { QueryResponse::NotAuthoritative } else { end_chain(chain, current_name) };
        }

        if let Some(dname) = find_dname_ancestor(tree, apex_name, &current_name) {
            chain.push(dname.clone());
            let synthesized = synthesize_dname_cname(&dname, &current_name);
            chain.push(synthesized.clone());
            current_name = match &synthesized.rdata {
                RData::CName { name } => name.clone(),
                _ => unreachable!(),
            };
            continue;
        }

        // Referral takes priority over the direct match when the
        // delegation sits strictly between the apex and the queried
        // name (the name itself equals or is below the cut).
        //
        // A plain delegation (no zone hosted for the child here) always
        // refers, DS included: there is no child-side apex to answer from.
        // A delegation that is *also* a locally hosted apex (nested Primary/
        // Secondary/Stub zones) only refers for a DS query landing exactly
        // on the cut name — every other query there targets the child-side
        // apex directly, per spec.md §4.3 item 4 / §4.2's "all other queries
        // target the child-side apex when the name equals a zone cut".
        if let Some(deleg) = &find.delegation {
            let refer = if deleg.is_apex() {
                request.rtype == RRType::DS && deleg.name == current_name
            } else {
                true
            };
            if refer {
                let ns_records: Vec<Record> =
                    deleg.get(RRType::NS).map(|s| s.active_records().cloned().collect()).unwrap_or_default();
                let glue = collect_glue(tree, deleg);
                return QueryResponse::Referral { delegation: deleg.name.clone(), ns_records, glue };
            }
        }

        // A Stub zone holds only NS (and glue) and is always answered with
        // a referral built from its own apex — spec.md §4.3 item 3.b. This
        // only applies once the name neither matched a node nor crossed a
        // delegation below the apex, the same condition
        // `FindZoneResult::apex_is_stub_or_equivalent` names.
        if find.apex_is_stub_or_equivalent() && apex.zone_type() == ApexZoneType::Stub {
            let ns_records: Vec<Record> =
                apex.root.get(RRType::NS).map(|s| s.active_records().cloned().collect()).unwrap_or_default();
            let glue = collect_glue(tree, &apex.root);
            return QueryResponse::Referral { delegation: apex_name.clone(), ns_records, glue };
        }

        if let Some(node) = &find.matched {
            if let Some(cname_set) = node.get(RRType::CNAME) {
                if request.rtype != RRType::CNAME {
                    if let Some(rec) = cname_set.active_records().next() {
                        chain.push(rec.clone());
                        current_name = match &rec.rdata {
                            RData::CName { name } => name.clone(),
                            _ => unreachable!(),
                        };
                        continue;
                    }
                }
            }
            let answers: Vec<Record> =
                node.get(request.rtype).map(|s| s.active_records().cloned().collect()).unwrap_or_default();
            if answers.is_empty() {
                if let Some(forward) = forward_response(&apex) {
                    return forward;
                }
                let soa = apex.soa();
                let nsec = proof_of_nonexistence(&apex, request.dnssec_ok, nsec3_params, &current_name, false);
                return QueryResponse::NoData { soa, nsec };
            }
            chain.extend(answers.clone());
            let additionals = collect_additionals(tree, &lookup_apex, apex_name, &answers);
            return QueryResponse::Answer { owner: current_name.clone(), records: chain, additionals, nsec: vec![] };
        }

        if let Some(wc) = &find.wildcard {
            let owner = wc.name.rewrite_wildcard_owner(&current_name);
            let answers: Vec<Record> = wc
                .get(request.rtype)
                .map(|s| s.active_records().map(|r| rewrite_owner(r, &owner)).collect())
                .unwrap_or_default();
            if answers.is_empty() {
                if let Some(forward) = forward_response(&apex) {
                    return forward;
                }
                let soa = apex.soa();
                let nsec = proof_of_nonexistence(&apex, request.dnssec_ok, nsec3_params, &current_name, true);
                return QueryResponse::NoData { soa, nsec };
            }
            chain.extend(answers.clone());
            let additionals = collect_additionals(tree, &lookup_apex, apex_name, &answers);
            let nsec = proof_of_nonexistence(&apex, request.dnssec_ok, nsec3_params, &current_name, true);
            return QueryResponse::Answer { owner, records: chain, additionals, nsec };
        }

        if let Some(forward) = forward_response(&apex) {
            return forward;
        }
        let soa = apex.soa();
        let nsec = proof_of_nonexistence(&apex, request.dnssec_ok, nsec3_params, &current_name, false);
        return QueryResponse::NxDomain { soa, nsec };
    }

    end_chain(chain, current_name)
}

/// `Some` when `apex` is a Forwarder, the fallback answer for any query the
/// delegation/matched/wildcard checks above didn't resolve (spec.md §4.3
/// steps 3.d and 4's "fall through to FWD" bullet) — never checked ahead of
/// those, so an actual NS delegation or in-zone record still wins.
fn forward_response(apex: &ApexZone) -> Option<QueryResponse> {
    if apex.zone_type() == ApexZoneType::Forwarder {
        Some(QueryResponse::Forward { targets: apex.forwarders() })
    } else {
        None
    }
}

fn end_chain(chain: Vec<Record>, owner: Name) -> QueryResponse {
    QueryResponse::Answer { owner, records: chain, additionals: vec![], nsec: vec![] }
}

fn rewrite_owner(record: &Record, owner: &Name) -> Record {
    let mut r = record.clone();
    r.name = owner.clone();
    r
}

fn find_dname_ancestor(tree: &ZoneTree, apex_name: &Name, name: &Name) -> Option<Record> {
    let mut current = name.parent();
    while let Some(n) = current {
        if n.label_count() < apex_name.label_count() {
            break;
        }
        if let Some(node) = tree.lookup(&n) {
            if let Some(set) = node.get(RRType::DNAME) {
                if let Some(r) = set.active_records().next() {
                    return Some(r.clone());
                }
            }
        }
        if n == *apex_name {
            break;
        }
        current = n.parent();
    }
    None
}

/// Synthesizes the CNAME a DNAME at `dname.name` produces for `query_name`
/// (RFC 6672 §3): replace the owner's labels with the DNAME target,
/// keeping the labels below it intact.
fn synthesize_dname_cname(dname: &Record, query_name: &Name) -> Record {
    let target = match &dname.rdata {
        RData::DName { target } => target.clone(),
        _ => unreachable!(),
    };
    let owner_labels = dname.name.label_count();
    let query_labels = query_name.labels();
    let prefix = &query_labels[..query_labels.len() - owner_labels];
    let mut new_labels: Vec<&str> = prefix.to_vec();
    new_labels.extend(target.labels());
    let new_name = Name::from_labels(&new_labels);
    Record::new(query_name.clone(), dname.ttl, RData::CName { name: new_name })
}

/// Glue for the NS RRSet at `delegation`: the tagged attachment on each NS
/// record when present (the normal case once a zone has been transferred
/// in, or had [`crate::zone::manager::ZoneManager::add_record`] re-attach
/// it), falling back to an in-tree A/AAAA lookup under the target name for
/// an NS record that hasn't had its tag populated yet — the same fallback
/// [`collect_additionals`] uses for NS/MX/SRV/SVCB/HTTPS answers.
fn collect_glue(tree: &ZoneTree, delegation: &crate::zone::tree::ZoneNode) -> Vec<Record> {
    let Some(set) = delegation.get(RRType::NS) else { return vec![] };
    let mut glue = Vec::new();
    for r in set.records() {
        let tagged = r.tag.glue();
        if !tagged.is_empty() {
            glue.extend(tagged.iter().cloned());
            continue;
        }
        let RData::NS { name: target } = &r.rdata else { continue };
        if let Some(node) = tree.lookup(target) {
            for rtype in [RRType::A, RRType::AAAA] {
                if let Some(s) = node.get(rtype) {
                    glue.extend(s.active_records().cloned());
                }
            }
        }
    }
    glue
}

/// Gathers additional-section glue for NS/MX/SRV/SVCB/HTTPS answers: any
/// in-bailiwick A/AAAA records for the names those records reference.
fn collect_additionals(
    tree: &ZoneTree,
    lookup_apex: &impl Fn(&Name) -> Option<Arc<ApexZone>>,
    apex_name: &Name,
    answers: &[Record],
) -> Vec<Record> {
    let mut targets: Vec<Name> = Vec::new();
    for r in answers {
        match &r.rdata {
            RData::NS { name } => targets.push(name.clone()),
            RData::Mx { exchange, .. } => targets.push(exchange.clone()),
            RData::Srv { target, .. } => targets.push(target.clone()),
            RData::Svcb { target, .. } | RData::Https { target, .. } => targets.push(target.clone()),
            _ => {}
        }
    }

    let mut additionals = Vec::new();
    for t in targets {
        if !t.is_in_zone(apex_name) {
            continue;
        }
        let find = tree.find_zone(&t);
        if let (Some(node), Some(this_apex)) = (find.matched, find.apex_name) {
            if lookup_apex(&this_apex).is_some() {
                for rtype in [RRType::A, RRType::AAAA] {
                    if let Some(set) = node.get(rtype) {
                        additionals.extend(set.active_records().cloned());
                    }
                }
            }
        }
    }
    additionals
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::dns::Name;
    use crate::zone::apex::{ApexVariant, ApexZoneType};
    use std::collections::HashMap;

    fn build() -> (ZoneTree, HashMap<String, Arc<ApexZone>>) {
        let tree = ZoneTree::new();
        let apex_name = Name::from_string("example.com.").unwrap();
        let root = tree.get_or_add(&apex_name, |n| {
            n.set_apex_marker(Some(crate::zone::tree::ApexMarker {
                zone_type: ApexZoneType::Primary,
                disabled: false,
            }));
        });
        root.upsert_record(Record::new(
            apex_name.clone(),
            3600,
            RData::Soa {
                primary_ns: Name::from_string("ns1.example.com.").unwrap(),
                responsible: Name::from_string("hostmaster.example.com.").unwrap(),
                serial: 1,
                refresh: 3600,
                retry: 900,
                expire: 604800,
                minimum: 3600,
            },
        ));
        let apex = Arc::new(ApexZone::new(root, ApexZoneType::Primary, ApexVariant::primary()));

        let www = tree.get_or_add(&Name::from_string("www.example.com.").unwrap(), |_| {});
        www.upsert_record(Record::new(
            Name::from_string("www.example.com.").unwrap(),
            300,
            RData::A { address: [192, 0, 2, 10] },
        ));

        let alias = tree.get_or_add(&Name::from_string("alias.example.com.").unwrap(), |_| {});
        alias.upsert_record(Record::new(
            Name::from_string("alias.example.com.").unwrap(),
            300,
            RData::CName { name: Name::from_string("www.example.com.").unwrap() },
        ));

        let sub_cut = tree.get_or_add(&Name::from_string("sub.example.com.").unwrap(), |_| {});
        sub_cut.upsert_record(Record::new(
            Name::from_string("sub.example.com.").unwrap(),
            3600,
            RData::NS { name: Name::from_string("ns1.sub.example.com.").unwrap() },
        ));

        let wc = tree.get_or_add(&Name::from_string("*.wild.example.com.").unwrap(), |_| {});
        wc.upsert_record(Record::new(
            Name::from_string("*.wild.example.com.").unwrap(),
            300,
            RData::A { address: [192, 0, 2, 20] },
        ));

        let mut apexes = HashMap::new();
        apexes.insert("example.com.".to_string(), apex);
        (tree, apexes)
    }

    fn lookup<'a>(apexes: &'a HashMap<String, Arc<ApexZone>>) -> impl Fn(&Name) -> Option<Arc<ApexZone>> + 'a {
        move |n: &Name| apexes.get(n.as_ref()).cloned()
    }

    fn no_nsec3(_: &Name) -> Option<Nsec3Params> {
        None
    }

    #[test]
    fn direct_answer() {
        let (tree, apexes) = build();
        let resp = query(
            &tree,
            lookup(&apexes),
            &QueryRequest {
                name: Name::from_string("www.example.com.").unwrap(),
                rtype: RRType::A,
                dnssec_ok: false,
            },
            &no_nsec3,
        );
        match resp {
            QueryResponse::Answer { records, .. } => assert_eq!(records.len(), 1),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn cname_is_chased() {
        let (tree, apexes) = build();
        let resp = query(
            &tree,
            lookup(&apexes),
            &QueryRequest {
                name: Name::from_string("alias.example.com.").unwrap(),
                rtype: RRType::A,
                dnssec_ok: false,
            },
            &no_nsec3,
        );
        match resp {
            QueryResponse::Answer { records, .. } => assert_eq!(records.len(), 2),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn delegation_is_referred() {
        let (tree, apexes) = build();
        let resp = query(
            &tree,
            lookup(&apexes),
            &QueryRequest {
                name: Name::from_string("host.sub.example.com.").unwrap(),
                rtype: RRType::A,
                dnssec_ok: false,
            },
            &no_nsec3,
        );
        assert!(matches!(resp, QueryResponse::Referral { .. }));
    }

    /// When the delegated child is *also* a locally hosted apex (two nested
    /// Primary zones), a DS query for the exact cut name shifts to the
    /// parent-side referral (spec.md §4.3 item 4), while every other query
    /// type at that same name still resolves directly against the child.
    #[test]
    fn ds_query_at_nested_apex_cut_gets_parent_referral() {
        let (tree, mut apexes) = build();
        let cut = Name::from_string("sub.example.com.").unwrap();

        // `build()` already created this node (as `sub_cut`'s plain NS
        // delegation), so `get_or_add`'s factory won't fire a second time —
        // set the apex marker directly on the existing node instead.
        let child_root = tree.get_or_add(&cut, |_| {});
        child_root.set_apex_marker(Some(crate::zone::tree::ApexMarker {
            zone_type: ApexZoneType::Primary,
            disabled: false,
        }));
        child_root.upsert_record(Record::new(
            cut.clone(),
            3600,
            RData::Soa {
                primary_ns: Name::from_string("ns1.sub.example.com.").unwrap(),
                responsible: Name::from_string("hostmaster.sub.example.com.").unwrap(),
                serial: 1,
                refresh: 3600,
                retry: 900,
                expire: 604800,
                minimum: 3600,
            },
        ));
        let child_apex = Arc::new(ApexZone::new(child_root, ApexZoneType::Primary, ApexVariant::primary()));
        apexes.insert("sub.example.com.".to_string(), child_apex);

        let ds_resp = query(
            &tree,
            lookup(&apexes),
            &QueryRequest { name: cut.clone(), rtype: RRType::DS, dnssec_ok: false },
            &no_nsec3,
        );
        match ds_resp {
            QueryResponse::Referral { delegation, ns_records, .. } => {
                assert_eq!(delegation, cut);
                assert_eq!(ns_records.len(), 1);
            }
            other => panic!("unexpected {:?}", other),
        }

        let soa_resp = query(
            &tree,
            lookup(&apexes),
            &QueryRequest { name: cut.clone(), rtype: RRType::SOA, dnssec_ok: false },
            &no_nsec3,
        );
        match soa_resp {
            QueryResponse::Answer { owner, .. } => assert_eq!(owner, cut),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn wildcard_is_synthesized() {
        let (tree, apexes) = build();
        let resp = query(
            &tree,
            lookup(&apexes),
            &QueryRequest {
                name: Name::from_string("anything.wild.example.com.").unwrap(),
                rtype: RRType::A,
                dnssec_ok: false,
            },
            &no_nsec3,
        );
        match resp {
            QueryResponse::Answer { owner, records, .. } => {
                assert_eq!(owner, Name::from_string("anything.wild.example.com.").unwrap());
                assert_eq!(records.len(), 1);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn unknown_name_is_nxdomain() {
        let (tree, apexes) = build();
        let resp = query(
            &tree,
            lookup(&apexes),
            &QueryRequest {
                name: Name::from_string("nope.example.com.").unwrap(),
                rtype: RRType::A,
                dnssec_ok: false,
            },
            &no_nsec3,
        );
        assert!(matches!(resp, QueryResponse::NxDomain { .. }));
    }

    #[test]
    fn outside_any_zone_is_not_authoritative() {
        let (tree, apexes) = build();
        let resp = query(
            &tree,
            lookup(&apexes),
            &QueryRequest { name: Name::from_string("example.net.").unwrap(), rtype: RRType::A, dnssec_ok: false },
            &no_nsec3,
        );
        assert!(matches!(resp, QueryResponse::NotAuthoritative));
    }

    #[test]
    fn signed_wildcard_answer_carries_nsec_proof() {
        let (tree, apexes) = build();
        let apex = apexes.get("example.com.").unwrap();
        apex.update_dnssec_status(DnssecStatus::SignedWithNsec);
        let owners = apex.owners_with_types();
        let chain = dnssec::build_nsec_chain(&owners);
        for rec in chain {
            apex.root.upsert_record(rec);
        }

        let resp = query(
            &tree,
            lookup(&apexes),
            &QueryRequest {
                name: Name::from_string("anything.wild.example.com.").unwrap(),
                rtype: RRType::A,
                dnssec_ok: true,
            },
            &no_nsec3,
        );
        match resp {
            QueryResponse::Answer { nsec, .. } => assert!(!nsec.is_empty()),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn unsigned_apex_never_attaches_nsec() {
        let (tree, apexes) = build();
        let resp = query(
            &tree,
            lookup(&apexes),
            &QueryRequest {
                name: Name::from_string("nope.example.com.").unwrap(),
                rtype: RRType::A,
                dnssec_ok: true,
            },
            &no_nsec3,
        );
        match resp {
            QueryResponse::NxDomain { nsec, .. } => assert!(nsec.is_empty()),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn stub_apex_always_refers() {
        let tree = ZoneTree::new();
        let apex_name = Name::from_string("example.com.").unwrap();
        let root = tree.get_or_add(&apex_name, |n| {
            n.set_apex_marker(Some(crate::zone::tree::ApexMarker {
                zone_type: ApexZoneType::Stub,
                disabled: false,
            }));
        });
        root.upsert_record(Record::new(
            apex_name.clone(),
            3600,
            RData::NS { name: Name::from_string("ns1.example.com.").unwrap() },
        ));
        let apex = Arc::new(ApexZone::new(
            root,
            ApexZoneType::Stub,
            ApexVariant::Stub {
                primaries: vec![],
                refresh: std::sync::Mutex::new(crate::zone::refresh::RefreshState::Idle),
                last_success: std::sync::Mutex::new(None),
            },
        ));
        let mut apexes = HashMap::new();
        apexes.insert("example.com.".to_string(), apex);

        let resp = query(
            &tree,
            lookup(&apexes),
            &QueryRequest {
                name: Name::from_string("host.example.com.").unwrap(),
                rtype: RRType::A,
                dnssec_ok: false,
            },
            &no_nsec3,
        );
        match resp {
            QueryResponse::Referral { delegation, ns_records, .. } => {
                assert_eq!(delegation, apex_name);
                assert_eq!(ns_records.len(), 1);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    /// A Forwarder zone with a delegation-style NS answers names under that
    /// NS with a referral, not a forward, and only falls through to FWD
    /// once the NS/in-zone checks come up empty (spec.md §4.2/§4.3).
    #[test]
    fn forwarder_tries_ns_before_falling_through_to_fwd() {
        let tree = ZoneTree::new();
        let apex_name = Name::from_string("example.com.").unwrap();
        let root = tree.get_or_add(&apex_name, |n| {
            n.set_apex_marker(Some(crate::zone::tree::ApexMarker {
                zone_type: ApexZoneType::Forwarder,
                disabled: false,
            }));
        });
        root.upsert_record(Record::new(
            apex_name.clone(),
            3600,
            RData::Fwd { forwarder: "203.0.113.1".into(), priority: 10, dnssec_validation: false },
        ));
        let deleg = tree.get_or_add(&Name::from_string("sub.example.com.").unwrap(), |_| {});
        deleg.upsert_record(Record::new(
            Name::from_string("sub.example.com.").unwrap(),
            3600,
            RData::NS { name: Name::from_string("ns1.sub.example.com.").unwrap() },
        ));
        let apex = Arc::new(ApexZone::new(root, ApexZoneType::Forwarder, ApexVariant::Forwarder));
        let mut apexes = HashMap::new();
        apexes.insert("example.com.".to_string(), apex);

        let referred = query(
            &tree,
            lookup(&apexes),
            &QueryRequest {
                name: Name::from_string("host.sub.example.com.").unwrap(),
                rtype: RRType::A,
                dnssec_ok: false,
            },
            &no_nsec3,
        );
        assert!(matches!(referred, QueryResponse::Referral { .. }));

        let forwarded = query(
            &tree,
            lookup(&apexes),
            &QueryRequest {
                name: Name::from_string("nothing.example.com.").unwrap(),
                rtype: RRType::A,
                dnssec_ok: false,
            },
            &no_nsec3,
        );
        match forwarded {
            QueryResponse::Forward { targets } => assert_eq!(targets.len(), 1),
            other => panic!("unexpected {:?}", other),
        }
    }
}
