use crate::errors::StoreError;
use crate::model::{normalize_callsign, Band, ModeBit, StationRecord};
use crate::store::StationStore;
use log::{debug, trace};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    Changed { old: u8, new: u8 },
    Unchanged,
    /// Not on the roster. Feeds never create stations.
    UnknownCallsign,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    Created,
    Duplicate,
}

/// Per-station, per-band mode masks on top of a `StationStore`.
pub struct Ledger<S: StationStore> {
    store: S,
}

impl<S: StationStore> Ledger<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// OR `mode` into the (callsign, band) mask. Reads once, and writes once
    /// only when the mask actually changes.
    pub fn merge(&mut self, callsign: &str, band: Band, mode: ModeBit) -> Result<MergeOutcome, StoreError> {
        let call = normalize_callsign(callsign);
        let Some(old) = self.store.get_cell(&call, band)? else {
            debug!("merge: {} not on roster, ignored", call);
            return Ok(MergeOutcome::UnknownCallsign);
        };
        let new = old | mode.mask();
        if new == old {
            trace!("merge: {} {} {} already set", call, band, mode);
            return Ok(MergeOutcome::Unchanged);
        }
        self.store.set_cell(&call, band, new)?;
        debug!("merge: {} {} {:04b} -> {:04b}", call, band, old, new);
        Ok(MergeOutcome::Changed { old, new })
    }

    pub fn lookup(&self, callsign: &str, band: Band) -> Result<Option<u8>, StoreError> {
        self.store.get_cell(&normalize_callsign(callsign), band)
    }

    pub fn add(&mut self, callsign: &str) -> Result<AddOutcome, StoreError> {
        let call = normalize_callsign(callsign);
        if call.is_empty() {
            return Err(StoreError::EmptyCallsign);
        }
        if self.store.get_or_create(&call)? {
            Ok(AddOutcome::Created)
        } else {
            Ok(AddOutcome::Duplicate)
        }
    }

    /// Zero every mask. Callers confirm with the operator first.
    pub fn clear_all(&mut self) -> Result<(), StoreError> {
        self.store.clear_all()
    }

    /// Add each roster call not already present; returns how many were new.
    pub fn seed<'a, I>(&mut self, roster: I) -> Result<usize, StoreError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut created = 0;
        for call in roster {
            if normalize_callsign(call).is_empty() {
                continue;
            }
            if self.add(call)? == AddOutcome::Created {
                created += 1;
            }
        }
        Ok(created)
    }

    pub fn records(&self) -> Result<Vec<StationRecord>, StoreError> {
        self.store.list_all()
    }

    pub fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.store.list_all()?.is_empty())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::store::MemoryStore;

    /// Counts writes so tests can assert that no-op merges stay off the store.
    #[derive(Default)]
    pub(crate) struct CountingStore {
        pub(crate) inner: MemoryStore,
        pub(crate) writes: usize,
        pub(crate) fail_writes: bool,
        pub(crate) fail_list: bool,
    }

    impl StationStore for CountingStore {
        fn contains(&self, c: &str) -> Result<bool, StoreError> { self.inner.contains(c) }
        fn get_or_create(&mut self, c: &str) -> Result<bool, StoreError> { self.inner.get_or_create(c) }
        fn get_cell(&self, c: &str, b: Band) -> Result<Option<u8>, StoreError> { self.inner.get_cell(c, b) }
        fn set_cell(&mut self, c: &str, b: Band, v: u8) -> Result<(), StoreError> {
            if self.fail_writes {
                return Err(StoreError::Csv("disk full".into()));
            }
            self.writes += 1;
            self.inner.set_cell(c, b, v)
        }
        fn list_all(&self) -> Result<Vec<StationRecord>, StoreError> {
            if self.fail_list {
                return Err(StoreError::Csv("unreadable".into()));
            }
            self.inner.list_all()
        }
        fn clear_all(&mut self) -> Result<(), StoreError> { self.inner.clear_all() }
    }

    fn ledger_with(calls: &[&str]) -> Ledger<CountingStore> {
        let mut l = Ledger::new(CountingStore::default());
        l.seed(calls.iter().copied()).unwrap();
        l
    }

    #[test]
    fn merge_unknown_callsign_is_noop() {
        let mut l = ledger_with(&["W1XYZ"]);
        assert_eq!(l.merge("K1ABC", Band::B40, ModeBit::Ft8).unwrap(), MergeOutcome::UnknownCallsign);
        assert_eq!(l.lookup("K1ABC", Band::B40).unwrap(), None);
        assert_eq!(l.records().unwrap().len(), 1);
        assert_eq!(l.records().unwrap()[0].masks, [0; 8]);
        assert_eq!(l.store.writes, 0);
    }

    #[test]
    fn merge_sets_mode_bit() {
        let mut l = ledger_with(&["W1XYZ"]);
        assert_eq!(
            l.merge("w1xyz", Band::B40, ModeBit::Ft8).unwrap(),
            MergeOutcome::Changed { old: 0, new: 0b0100 }
        );
        assert_eq!(l.lookup("W1XYZ", Band::B40).unwrap(), Some(4));
        assert_eq!(l.lookup("W1XYZ", Band::B20).unwrap(), Some(0));
    }

    #[test]
    fn repeated_merge_is_idempotent_and_skips_write() {
        let mut l = ledger_with(&["W1XYZ"]);
        l.merge("W1XYZ", Band::B40, ModeBit::Ft8).unwrap();
        assert_eq!(l.store.writes, 1);
        assert_eq!(l.merge("W1XYZ", Band::B40, ModeBit::Ft8).unwrap(), MergeOutcome::Unchanged);
        assert_eq!(l.store.writes, 1);
        assert_eq!(
            l.merge("W1XYZ", Band::B40, ModeBit::Ft4).unwrap(),
            MergeOutcome::Changed { old: 0b0100, new: 0b1100 }
        );
    }

    #[test]
    fn failed_write_leaves_mask_untouched() {
        let mut l = ledger_with(&["W1XYZ"]);
        l.store.fail_writes = true;
        assert!(l.merge("W1XYZ", Band::B20, ModeBit::Cw).is_err());
        assert_eq!(l.lookup("W1XYZ", Band::B20).unwrap(), Some(0));
    }

    #[test]
    fn add_and_duplicate() {
        let mut l = ledger_with(&[]);
        assert_eq!(l.add(" dl0wwa ").unwrap(), AddOutcome::Created);
        assert_eq!(l.add("DL0WWA").unwrap(), AddOutcome::Duplicate);
        assert_eq!(l.lookup("DL0WWA", Band::B10).unwrap(), Some(0));
        assert!(l.add("   ").is_err());
    }

    #[test]
    fn clear_all_resets_every_mask() {
        let mut l = ledger_with(&["W1XYZ", "K1ABC"]);
        l.merge("W1XYZ", Band::B20, ModeBit::Cw).unwrap();
        l.merge("K1ABC", Band::B80, ModeBit::Phone).unwrap();
        l.clear_all().unwrap();
        assert!(l.records().unwrap().iter().all(|r| r.masks == [0; 8]));
        assert_eq!(l.records().unwrap().len(), 2);
    }

    #[test]
    fn seed_counts_only_new() {
        let mut l = ledger_with(&["W1XYZ"]);
        assert_eq!(l.seed(["W1XYZ", "K1ABC", "", "k1abc"]).unwrap(), 1);
    }
}
