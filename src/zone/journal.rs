use crate::zone::record::Record;
use std::sync::RwLock;

/// A single increment of an IXFR-able change set: the SOA serial the zone
/// moved *from*, the records removed, the records added, and the SOA
/// serial it moved *to*. Mirrors the wire framing of an IXFR increment
/// (old SOA, deletions, additions, new SOA) so production is a straight
/// walk over stored entries.
#[derive(Debug, Clone)]
pub struct JournalEntry {
    pub from_serial: u32,
    pub to_serial: u32,
    pub removed: Vec<Record>,
    pub added: Vec<Record>,
}

/// The ordered, monotone-by-serial change log backing IXFR for a single
/// apex zone. Entries are appended only; never reordered or mutated in
/// place, so concurrent readers (a transfer in progress) never observe a
/// torn entry.
#[derive(Default)]
pub struct Journal {
    entries: RwLock<Vec<JournalEntry>>,
}

impl Journal {
    pub fn new() -> Self {
        Journal { entries: RwLock::new(Vec::new()) }
    }

    /// Appends an entry. Returns `false` without appending if `entry`
    /// would break the monotone-by-serial invariant (its `from_serial`
    /// must equal the current head's `to_serial`, or the journal must be
    /// empty).
    pub fn append(&self, entry: JournalEntry) -> bool {
        let mut entries = self.entries.write().unwrap();
        if let Some(last) = entries.last() {
            if last.to_serial != entry.from_serial {
                return false;
            }
        }
        entries.push(entry);
        true
    }

    /// Entries needed to walk a client from `from_serial` to the journal's
    /// current head, in order. `None` if `from_serial` predates the
    /// journal's earliest retained entry (caller should fall back to AXFR).
    pub fn entries_since(&self, from_serial: u32) -> Option<Vec<JournalEntry>> {
        let entries = self.entries.read().unwrap();
        if entries.is_empty() {
            return Some(vec![]);
        }
        let start = entries.iter().position(|e| e.from_serial == from_serial)?;
        Some(entries[start..].to_vec())
    }

    pub fn latest_serial(&self) -> Option<u32> {
        self.entries.read().unwrap().last().map(|e| e.to_serial)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().unwrap().is_empty()
    }

    /// Drops every entry whose `to_serial` is older than `keep_from`,
    /// bounding journal growth: journals are not retained forever.
    pub fn trim_before(&self, keep_from: u32) {
        let mut entries = self.entries.write().unwrap();
        entries.retain(|e| e.to_serial >= keep_from);
    }

    /// Condenses a contiguous run of entries into a single equivalent
    /// entry: a name/type pair added then later removed (or vice versa)
    /// within the run cancels out.
    pub fn condense(entries: &[JournalEntry]) -> JournalEntry {
        let from_serial = entries.first().map(|e| e.from_serial).unwrap_or(0);
        let to_serial = entries.last().map(|e| e.to_serial).unwrap_or(from_serial);

        let mut removed: Vec<Record> = Vec::new();
        let mut added: Vec<Record> = Vec::new();
        for entry in entries {
            for r in &entry.removed {
                if let Some(pos) = added.iter().position(|a: &Record| a.same_data(r)) {
                    added.remove(pos);
                } else {
                    removed.push(r.clone());
                }
            }
            for r in &entry.added {
                if let Some(pos) = removed.iter().position(|d: &Record| d.same_data(r)) {
                    removed.remove(pos);
                } else {
                    added.push(r.clone());
                }
            }
        }
        JournalEntry { from_serial, to_serial, removed, added }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::dns::Name;
    use crate::zone::record::RData;

    fn a(owner: &str, octet: u8) -> Record {
        Record::new(Name::from_string(owner).unwrap(), 300, RData::A { address: [192, 0, 2, octet] })
    }

    #[test]
    fn append_rejects_non_contiguous_serial() {
        let j = Journal::new();
        assert!(j.append(JournalEntry { from_serial: 1, to_serial: 2, removed: vec![], added: vec![] }));
        assert!(!j.append(JournalEntry { from_serial: 5, to_serial: 6, removed: vec![], added: vec![] }));
        assert!(j.append(JournalEntry { from_serial: 2, to_serial: 3, removed: vec![], added: vec![] }));
        assert_eq!(j.latest_serial(), Some(3));
    }

    #[test]
    fn entries_since_unknown_serial_returns_none() {
        let j = Journal::new();
        j.append(JournalEntry { from_serial: 1, to_serial: 2, removed: vec![], added: vec![] });
        assert!(j.entries_since(99).is_none());
        assert_eq!(j.entries_since(1).unwrap().len(), 1);
    }

    #[test]
    fn condense_cancels_add_then_remove() {
        let rec = a("www.example.com.", 1);
        let entries = vec![
            JournalEntry { from_serial: 1, to_serial: 2, removed: vec![], added: vec![rec.clone()] },
            JournalEntry { from_serial: 2, to_serial: 3, removed: vec![rec.clone()], added: vec![] },
        ];
        let condensed = Journal::condense(&entries);
        assert!(condensed.added.is_empty());
        assert!(condensed.removed.is_empty());
        assert_eq!(condensed.from_serial, 1);
        assert_eq!(condensed.to_serial, 3);
    }
}
