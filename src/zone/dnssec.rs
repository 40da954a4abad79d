use crate::shared::dns::Name;
use crate::zone::apex::DnssecStatus;
use crate::zone::errors::{ZoneError, ZoneResult};
use crate::zone::record::{RData, Record};
use crate::zone::rtype::RRType;

/// External collaborator that performs the actual cryptography. The zone
/// core never implements signing math itself — signer internals are an
/// external concern; it only drives the NSEC/NSEC3
/// chain and asks a [`ZoneSigner`] to produce/refresh RRSIGs and keys.
pub trait ZoneSigner: Send + Sync {
    /// Generates a DNSKEY for the given algorithm and returns its owned
    /// record plus the matching private material's opaque handle.
    fn generate_key(&self, zone: &Name, algorithm: u8, is_ksk: bool) -> ZoneResult<Record>;

    /// Signs `rrset` (all sharing one owner/type), returning the RRSIG.
    fn sign_rrset(&self, zone: &Name, owner: &Name, rrset: &[Record], key_tag: u16) -> ZoneResult<Record>;

    /// Produces the DS record for a DNSKEY, for parent-side publication.
    fn make_ds(&self, zone: &Name, dnskey: &Record, digest_type: u8) -> ZoneResult<Record>;
}

/// Default [`ZoneSigner`] for deployments that plug in no real key
/// material: every operation reports `OperationNotSupported`. Unsigned
/// zones are entirely unaffected; `sign_zone` and the key-management
/// operations simply fail until a real signer is wired in by the host
/// process.
pub struct UnimplementedSigner;

impl ZoneSigner for UnimplementedSigner {
    fn generate_key(&self, _zone: &Name, _algorithm: u8, _is_ksk: bool) -> ZoneResult<Record> {
        Err(ZoneError::OperationNotSupported("no signer configured".into()))
    }

    fn sign_rrset(&self, _zone: &Name, _owner: &Name, _rrset: &[Record], _key_tag: u16) -> ZoneResult<Record> {
        Err(ZoneError::OperationNotSupported("no signer configured".into()))
    }

    fn make_ds(&self, _zone: &Name, _dnskey: &Record, _digest_type: u8) -> ZoneResult<Record> {
        Err(ZoneError::OperationNotSupported("no signer configured".into()))
    }
}

/// An NSEC3 hashing/salting profile, independent of the
/// signer: hashing the owner-name chain is pure computation, not key
/// material, so it does not need to go through [`ZoneSigner`].
#[derive(Debug, Clone)]
pub struct Nsec3Params {
    pub hash_algorithm: u8,
    pub flags: u8,
    pub iterations: u16,
    pub salt: Vec<u8>,
}

/// Builds the NSEC chain for a sorted list of owner names present at an
/// apex: each owner's NSEC points to the next name in canonical order and
/// lists the types present at that owner (RFC 4034 §4).
pub fn build_nsec_chain(owners: &[(Name, Vec<RRType>)]) -> Vec<Record> {
    if owners.is_empty() {
        return vec![];
    }
    let mut records = Vec::with_capacity(owners.len());
    for i in 0..owners.len() {
        let (owner, types) = &owners[i];
        let (next_owner, _) = &owners[(i + 1) % owners.len()];
        let mut types = types.clone();
        types.push(RRType::NSEC);
        types.push(RRType::RRSIG);
        types.sort();
        types.dedup();
        records.push(Record::new(owner.clone(), 0, RData::Nsec { next_owner: next_owner.clone(), types }));
    }
    records
}

/// Finds the NSEC record whose owner canonically precedes `name` and
/// whose `next_owner` canonically follows it — the proof that `name`
/// (and everything between the two owners) does not exist.
pub fn find_nsec_proof_of_nonexistence(chain: &[Record], name: &Name) -> Option<Record> {
    chain.iter().find(|r| match &r.rdata {
        RData::Nsec { next_owner, .. } => {
            if r.name.cmp_canonical(next_owner) == std::cmp::Ordering::Less {
                r.name.cmp_canonical(name) == std::cmp::Ordering::Less
                    && name.cmp_canonical(next_owner) == std::cmp::Ordering::Less
            } else {
                // Chain wrap-around record (last owner -> first owner).
                r.name.cmp_canonical(name) == std::cmp::Ordering::Less
                    || name.cmp_canonical(next_owner) == std::cmp::Ordering::Less
            }
        }
        _ => false,
    }).cloned()
}

/// Finds the NSEC proof covering `name`'s wildcard source (`*.<parent>`),
/// used to prove a wildcard that would otherwise match does not exist.
pub fn find_nsec_wildcard_nonexistence(chain: &[Record], name: &Name) -> Option<Record> {
    let source = name.wildcard_source()?;
    find_nsec_proof_of_nonexistence(chain, &source)
}

/// RFC 5155 §5 iterated-hash owner-name digest: `H(name || salt)` folded
/// through `iterations` extra rounds of `H(prev || salt)`. Pure computation
/// over the owner name, independent of any signing key, which is why it
/// stays out of the [`ZoneSigner`] boundary.
pub fn hash_owner(name: &Name, params: &Nsec3Params) -> Vec<u8> {
    use sha1::{Digest, Sha1};
    let wire = canonical_wire(name);
    let mut hasher = Sha1::new();
    hasher.update(&wire);
    hasher.update(&params.salt);
    let mut digest = hasher.finalize().to_vec();
    for _ in 0..params.iterations {
        let mut hasher = Sha1::new();
        hasher.update(&digest);
        hasher.update(&params.salt);
        digest = hasher.finalize().to_vec();
    }
    digest
}

/// Lowercased, length-prefixed-label wire encoding of `name`, the
/// canonical form NSEC3 hashing is defined over (RFC 5155 §6).
fn canonical_wire(name: &Name) -> Vec<u8> {
    let mut out = Vec::new();
    for label in name.labels() {
        let lower = label.to_ascii_lowercase();
        out.push(lower.len() as u8);
        out.extend(lower.as_bytes());
    }
    out.push(0);
    out
}

/// Builds the NSEC3 chain for a zone's owners (RFC 5155 §7.1):
/// each owner is hashed, the hashes sorted, and each NSEC3 record's
/// `next_hashed_owner` points to the next hash in the closed, sorted ring.
pub fn build_nsec3_chain(owners: &[(Name, Vec<RRType>)], params: &Nsec3Params) -> Vec<Record> {
    if owners.is_empty() {
        return vec![];
    }
    let mut hashed: Vec<(Vec<u8>, Name, Vec<RRType>)> =
        owners.iter().map(|(n, t)| (hash_owner(n, params), n.clone(), t.clone())).collect();
    hashed.sort_by(|a, b| a.0.cmp(&b.0));
    hashed.dedup_by(|a, b| a.0 == b.0);

    let mut records = Vec::with_capacity(hashed.len());
    for i in 0..hashed.len() {
        let (_, owner, types) = &hashed[i];
        let (next_hash, _, _) = &hashed[(i + 1) % hashed.len()];
        let mut types = types.clone();
        types.push(RRType::NSEC3);
        types.push(RRType::RRSIG);
        types.sort();
        types.dedup();
        records.push(Record::new(
            owner.clone(),
            0,
            RData::Nsec3 {
                hash_algorithm: params.hash_algorithm,
                flags: params.flags,
                iterations: params.iterations,
                salt: params.salt.clone(),
                next_hashed_owner: next_hash.clone(),
                types,
            },
        ));
    }
    records
}

/// Finds the NSEC3 record whose hashed-owner interval covers `name`'s
/// hash — the proof that no owner hashing between the two endpoints
/// exists, per RFC 5155 §8.
pub fn find_nsec3_proof_of_nonexistence(chain: &[Record], name: &Name, params: &Nsec3Params) -> Option<Record> {
    let target = hash_owner(name, params);
    let mut hashed: Vec<(Vec<u8>, &Record)> =
        chain.iter().map(|r| (hash_owner(&r.name, params), r)).collect();
    hashed.sort_by(|a, b| a.0.cmp(&b.0));

    hashed.into_iter().find(|(h, r)| match &r.rdata {
        RData::Nsec3 { next_hashed_owner, .. } => {
            if h < next_hashed_owner {
                h < &target && &target < next_hashed_owner
            } else {
                // Chain wrap-around record (last hash -> first hash).
                h < &target || &target < next_hashed_owner
            }
        }
        _ => false,
    }).map(|(_, r)| r.clone())
}

/// NSEC3 counterpart of [`find_nsec_wildcard_nonexistence`].
pub fn find_nsec3_wildcard_nonexistence(chain: &[Record], name: &Name, params: &Nsec3Params) -> Option<Record> {
    let source = name.wildcard_source()?;
    find_nsec3_proof_of_nonexistence(chain, &source, params)
}

/// Converts an apex's denial-of-existence mechanism, returning the new
/// status. The NSEC3 hashing itself is out of scope here (delegated to
/// whatever hash table the caller maintains) — this only validates the
/// requested transition.
pub fn convert_status(current: DnssecStatus, target: DnssecStatus) -> ZoneResult<DnssecStatus> {
    use DnssecStatus::*;
    match (current, target) {
        (Unsigned, Unsigned) | (SignedWithNsec, SignedWithNsec) | (SignedWithNsec3, SignedWithNsec3) => {
            Ok(current)
        }
        (Unsigned, _) | (_, Unsigned) | (SignedWithNsec, SignedWithNsec3) | (SignedWithNsec3, SignedWithNsec) => {
            Ok(target)
        }
    }
}

/// RFC 4034 Appendix B key tag checksum, computed over a DNSKEY's public
/// wire fields. Independent of the signer: this is a deterministic
/// checksum, not cryptography, so it lives alongside the other pure
/// computations in this module rather than on [`ZoneSigner`].
pub fn key_tag(key: &Record) -> u16 {
    let RData::DnsKey { flags, protocol, algorithm, public_key } = &key.rdata else {
        return 0;
    };
    let mut wire = Vec::with_capacity(4 + public_key.len());
    wire.extend_from_slice(&flags.to_be_bytes());
    wire.push(*protocol);
    wire.push(*algorithm);
    wire.extend_from_slice(public_key);

    let mut sum: u32 = 0;
    for (i, byte) in wire.iter().enumerate() {
        if i % 2 == 0 {
            sum += (*byte as u32) << 8;
        } else {
            sum += *byte as u32;
        }
    }
    sum += (sum >> 16) & 0xFFFF;
    (sum & 0xFFFF) as u16
}

/// Exports the DS records a parent zone would need to publish for this
/// apex's key-signing keys.
pub fn export_trust_anchors(dnskeys: &[Record], signer: &dyn ZoneSigner, zone: &Name) -> ZoneResult<Vec<Record>> {
    let mut ds = Vec::new();
    for key in dnskeys {
        if let RData::DnsKey { flags, .. } = &key.rdata {
            if flags & 0x0001 != 0 {
                ds.push(signer.make_ds(zone, key, 2)?);
            }
        } else {
            return Err(ZoneError::InvalidRecord("export_trust_anchors given a non-DNSKEY record".into()));
        }
    }
    Ok(ds)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(s: &str) -> Name {
        Name::from_string(s).unwrap()
    }

    #[test]
    fn nsec_chain_wraps_around() {
        let owners = vec![
            (name("a.example.com."), vec![RRType::A]),
            (name("b.example.com."), vec![RRType::A]),
            (name("c.example.com."), vec![RRType::A]),
        ];
        let chain = build_nsec_chain(&owners);
        assert_eq!(chain.len(), 3);
        match &chain[2].rdata {
            RData::Nsec { next_owner, .. } => assert_eq!(next_owner, &name("a.example.com.")),
            _ => panic!("expected NSEC"),
        }
    }

    #[test]
    fn proof_covers_gap_between_owners() {
        let owners = vec![
            (name("a.example.com."), vec![RRType::A]),
            (name("c.example.com."), vec![RRType::A]),
        ];
        let chain = build_nsec_chain(&owners);
        let proof = find_nsec_proof_of_nonexistence(&chain, &name("b.example.com."));
        assert!(proof.is_some());
        assert_eq!(proof.unwrap().name, name("a.example.com."));
    }

    fn params() -> Nsec3Params {
        Nsec3Params { hash_algorithm: 1, flags: 0, iterations: 0, salt: vec![] }
    }

    #[test]
    fn nsec3_hash_is_deterministic() {
        let p = params();
        assert_eq!(hash_owner(&name("www.example.com."), &p), hash_owner(&name("WWW.Example.COM."), &p));
    }

    #[test]
    fn key_tag_is_stable_for_same_key() {
        let key = Record::new(
            name("example.com."),
            3600,
            RData::DnsKey { flags: 256, protocol: 3, algorithm: 8, public_key: vec![1, 2, 3, 4] },
        );
        assert_eq!(key_tag(&key), key_tag(&key));
    }

    #[test]
    fn key_tag_is_zero_for_non_dnskey_record() {
        let record = Record::new(name("example.com."), 3600, RData::A { address: [1, 2, 3, 4] });
        assert_eq!(key_tag(&record), 0);
    }

    #[test]
    fn nsec3_chain_covers_nonexistent_name() {
        let owners = vec![
            (name("a.example.com."), vec![RRType::A]),
            (name("b.example.com."), vec![RRType::A]),
            (name("c.example.com."), vec![RRType::A]),
        ];
        let p = params();
        let chain = build_nsec3_chain(&owners, &p);
        assert_eq!(chain.len(), 3);
        let proof = find_nsec3_proof_of_nonexistence(&chain, &name("zzz.example.com."), &p);
        assert!(proof.is_some());
    }
}
