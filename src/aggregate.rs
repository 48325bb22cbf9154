use crate::model::{AggregateCounts, ModeBit, StationRecord};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreWeights {
    pub cw: u32,
    pub phone: u32,
    pub digital_a: u32,
    pub digital_b: u32,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self { cw: 10, phone: 5, digital_a: 2, digital_b: 2 }
    }
}

/// Full scan over every station and band. Pure; callers run it after each
/// ledger change and whenever a fresh total is wanted.
pub fn recompute(records: &[StationRecord], weights: &ScoreWeights) -> AggregateCounts {
    let mut c = AggregateCounts::default();
    for rec in records {
        for mask in rec.masks {
            for mode in ModeBit::ALL {
                if mask & mode.mask() == 0 {
                    continue;
                }
                match mode {
                    ModeBit::Cw => c.cw += 1,
                    ModeBit::Phone => c.phone += 1,
                    ModeBit::Ft8 => c.digital_a += 1,
                    ModeBit::Ft4 => c.digital_b += 1,
                }
            }
        }
    }
    // weights come from user config; clamp instead of overflowing
    c.total = [
        (weights.cw, c.cw),
        (weights.phone, c.phone),
        (weights.digital_a, c.digital_a),
        (weights.digital_b, c.digital_b),
    ]
    .iter()
    .fold(0u32, |acc, &(w, n)| acc.saturating_add(w.saturating_mul(n)));
    c
}
