use crate::errors::AppError;
use crate::model::Band;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BandRange {
    pub band: Band,
    pub low_hz: u64,
    pub high_hz: u64,
}

/// Frequency → band table. Ranges are inclusive and must not overlap, so
/// classification never needs tie-breaking at the edges.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BandPlan {
    ranges: Vec<BandRange>,
}

const fn range(band: Band, low_hz: u64, high_hz: u64) -> BandRange {
    BandRange { band, low_hz, high_hz }
}

/// Rough amateur band edges (IARU region 2).
pub const DEFAULT_RANGES: [BandRange; 8] = [
    range(Band::B10, 28_000_000, 29_700_000),
    range(Band::B12, 24_890_000, 24_990_000),
    range(Band::B15, 21_000_000, 21_450_000),
    range(Band::B17, 18_068_000, 18_168_000),
    range(Band::B20, 14_000_000, 14_350_000),
    range(Band::B30, 10_100_000, 10_150_000),
    range(Band::B40, 7_000_000, 7_300_000),
    range(Band::B80, 3_500_000, 4_000_000),
];

impl Default for BandPlan {
    fn default() -> Self {
        Self { ranges: DEFAULT_RANGES.to_vec() }
    }
}

impl BandPlan {
    pub fn new(mut ranges: Vec<BandRange>) -> Result<Self, AppError> {
        ranges.sort_by_key(|r| r.low_hz);
        for r in &ranges {
            if r.low_hz > r.high_hz {
                return Err(AppError::Config(format!(
                    "band {}: low {} above high {}",
                    r.band, r.low_hz, r.high_hz
                )));
            }
        }
        for pair in ranges.windows(2) {
            if pair[1].low_hz <= pair[0].high_hz {
                return Err(AppError::Config(format!(
                    "bands {} and {} overlap",
                    pair[0].band, pair[1].band
                )));
            }
        }
        for (i, r) in ranges.iter().enumerate() {
            if ranges[i + 1..].iter().any(|o| o.band == r.band) {
                return Err(AppError::Config(format!("band {} listed twice", r.band)));
            }
        }
        Ok(Self { ranges })
    }

    pub fn classify(&self, frequency_hz: u64) -> Option<Band> {
        self.ranges
            .iter()
            .find(|r| frequency_hz >= r.low_hz && frequency_hz <= r.high_hz)
            .map(|r| r.band)
    }
}

/// MHz (as printed by clusters) to whole Hz.
pub fn mhz_to_hz(mhz: f64) -> Option<u64> {
    if !mhz.is_finite() || mhz < 0.0 {
        return None;
    }
    Some((mhz * 1_000_000.0).round() as u64)
}
