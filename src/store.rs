use crate::errors::StoreError;
use crate::model::{normalize_callsign, Band, StationRecord, MASK_LIMIT};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Key-addressed station table. Implementations are synchronous; the ledger
/// is the only writer for a given backing store.
pub trait StationStore {
    fn contains(&self, callsign: &str) -> Result<bool, StoreError>;
    /// Returns true when the record was created.
    fn get_or_create(&mut self, callsign: &str) -> Result<bool, StoreError>;
    fn get_cell(&self, callsign: &str, band: Band) -> Result<Option<u8>, StoreError>;
    fn set_cell(&mut self, callsign: &str, band: Band, value: u8) -> Result<(), StoreError>;
    fn list_all(&self) -> Result<Vec<StationRecord>, StoreError>;
    fn clear_all(&mut self) -> Result<(), StoreError>;
}

fn check_mask(callsign: &str, value: u8) -> Result<(), StoreError> {
    if value > MASK_LIMIT {
        return Err(StoreError::InvalidMask(value, callsign.to_string()));
    }
    Ok(())
}

#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    rows: BTreeMap<String, [u8; 8]>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StationStore for MemoryStore {
    fn contains(&self, callsign: &str) -> Result<bool, StoreError> {
        Ok(self.rows.contains_key(callsign))
    }

    fn get_or_create(&mut self, callsign: &str) -> Result<bool, StoreError> {
        if self.rows.contains_key(callsign) {
            return Ok(false);
        }
        self.rows.insert(callsign.to_string(), [0; 8]);
        Ok(true)
    }

    fn get_cell(&self, callsign: &str, band: Band) -> Result<Option<u8>, StoreError> {
        Ok(self.rows.get(callsign).map(|m| m[band.index()]))
    }

    fn set_cell(&mut self, callsign: &str, band: Band, value: u8) -> Result<(), StoreError> {
        check_mask(callsign, value)?;
        let masks = self
            .rows
            .get_mut(callsign)
            .ok_or_else(|| StoreError::UnknownCallsign(callsign.to_string()))?;
        masks[band.index()] = value;
        Ok(())
    }

    fn list_all(&self) -> Result<Vec<StationRecord>, StoreError> {
        Ok(self
            .rows
            .iter()
            .map(|(c, m)| StationRecord { callsign: c.clone(), masks: *m })
            .collect())
    }

    fn clear_all(&mut self) -> Result<(), StoreError> {
        for masks in self.rows.values_mut() {
            *masks = [0; 8];
        }
        Ok(())
    }
}

/// One CSV row; column names match the band labels.
#[derive(Debug, Serialize, Deserialize)]
struct StationRow {
    callsign: String,
    #[serde(rename = "10")]
    b10: u8,
    #[serde(rename = "12")]
    b12: u8,
    #[serde(rename = "15")]
    b15: u8,
    #[serde(rename = "17")]
    b17: u8,
    #[serde(rename = "20")]
    b20: u8,
    #[serde(rename = "30")]
    b30: u8,
    #[serde(rename = "40")]
    b40: u8,
    #[serde(rename = "80")]
    b80: u8,
}

impl StationRow {
    fn from_masks(callsign: &str, m: &[u8; 8]) -> Self {
        Self {
            callsign: callsign.to_string(),
            b10: m[0],
            b12: m[1],
            b15: m[2],
            b17: m[3],
            b20: m[4],
            b30: m[5],
            b40: m[6],
            b80: m[7],
        }
    }

    fn masks(&self) -> [u8; 8] {
        [self.b10, self.b12, self.b15, self.b17, self.b20, self.b30, self.b40, self.b80]
    }
}

/// Flat file store: the whole table lives in memory and is rewritten on
/// every mutation. A failed write leaves the in-memory view untouched.
#[derive(Debug)]
pub struct CsvStore {
    path: PathBuf,
    mem: MemoryStore,
}

impl CsvStore {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let mut mem = MemoryStore::new();
        if path.exists() {
            let mut rdr = csv::Reader::from_path(path)?;
            for row in rdr.deserialize::<StationRow>() {
                let row = row?;
                let masks = row.masks();
                for v in masks {
                    check_mask(&row.callsign, v)?;
                }
                let call = normalize_callsign(&row.callsign);
                match mem.rows.get_mut(&call) {
                    Some(existing) => {
                        warn!("{}: duplicate row for {}, merging", path.display(), call);
                        for (cell, v) in existing.iter_mut().zip(masks) {
                            *cell |= v;
                        }
                    }
                    None => {
                        mem.rows.insert(call, masks);
                    }
                }
            }
            info!("Loaded {} stations from {}", mem.rows.len(), path.display());
        } else {
            debug!("store {} does not exist yet", path.display());
        }
        Ok(Self { path: path.to_path_buf(), mem })
    }

    fn write_snapshot(&self, rows: &BTreeMap<String, [u8; 8]>) -> Result<(), StoreError> {
        let tmp = self.path.with_extension("csv.tmp");
        {
            let mut wtr = csv::Writer::from_path(&tmp)?;
            for (call, masks) in rows {
                wtr.serialize(StationRow::from_masks(call, masks))?;
            }
            if rows.is_empty() {
                let mut header = vec!["callsign"];
                header.extend(Band::ALL.iter().map(|b| b.label()));
                wtr.write_record(&header)?;
            }
            wtr.flush().map_err(|e| StoreError::Io {
                path: tmp.display().to_string(),
                source: e,
            })?;
        }
        std::fs::rename(&tmp, &self.path).map_err(|e| StoreError::Io {
            path: self.path.display().to_string(),
            source: e,
        })
    }

    /// Apply `f` to a copy, persist it, then adopt it.
    fn commit<T>(
        &mut self,
        f: impl FnOnce(&mut MemoryStore) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut next = self.mem.clone();
        let out = f(&mut next)?;
        self.write_snapshot(&next.rows)?;
        self.mem = next;
        Ok(out)
    }
}

impl StationStore for CsvStore {
    fn contains(&self, callsign: &str) -> Result<bool, StoreError> {
        self.mem.contains(callsign)
    }

    fn get_or_create(&mut self, callsign: &str) -> Result<bool, StoreError> {
        if self.mem.contains(callsign)? {
            return Ok(false);
        }
        self.commit(|m| m.get_or_create(callsign))
    }

    fn get_cell(&self, callsign: &str, band: Band) -> Result<Option<u8>, StoreError> {
        self.mem.get_cell(callsign, band)
    }

    fn set_cell(&mut self, callsign: &str, band: Band, value: u8) -> Result<(), StoreError> {
        self.commit(|m| m.set_cell(callsign, band, value))
    }

    fn list_all(&self) -> Result<Vec<StationRecord>, StoreError> {
        self.mem.list_all()
    }

    fn clear_all(&mut self) -> Result<(), StoreError> {
        self.commit(|m| m.clear_all())
    }
}
