use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The eight tracked HF bands, labelled by wavelength in metres.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Band {
    #[serde(rename = "10")]
    B10,
    #[serde(rename = "12")]
    B12,
    #[serde(rename = "15")]
    B15,
    #[serde(rename = "17")]
    B17,
    #[serde(rename = "20")]
    B20,
    #[serde(rename = "30")]
    B30,
    #[serde(rename = "40")]
    B40,
    #[serde(rename = "80")]
    B80,
}

impl Band {
    /// Column order used by stores and exports.
    pub const ALL: [Band; 8] = [
        Band::B10, Band::B12, Band::B15, Band::B17,
        Band::B20, Band::B30, Band::B40, Band::B80,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Band::B10 => "10",
            Band::B12 => "12",
            Band::B15 => "15",
            Band::B17 => "17",
            Band::B20 => "20",
            Band::B30 => "30",
            Band::B40 => "40",
            Band::B80 => "80",
        }
    }

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Band {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Band {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().trim_end_matches('m');
        Band::ALL
            .iter()
            .copied()
            .find(|b| b.label() == s)
            .ok_or_else(|| format!("unknown band '{}'", s))
    }
}

/// Bit position of each mode inside a band mask.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ModeBit {
    Cw = 0,
    Phone = 1,
    Ft8 = 2,
    Ft4 = 3,
}

impl ModeBit {
    pub const ALL: [ModeBit; 4] = [ModeBit::Cw, ModeBit::Phone, ModeBit::Ft8, ModeBit::Ft4];

    #[inline]
    pub fn mask(self) -> u8 {
        1u8 << (self as u8)
    }

    /// Only the two digital modes the logging program reports are tracked
    /// from the datagram feed.
    pub fn from_digital_token(token: &str) -> Option<ModeBit> {
        match token {
            "FT8" => Some(ModeBit::Ft8),
            "FT4" => Some(ModeBit::Ft4),
            _ => None,
        }
    }
}

impl fmt::Display for ModeBit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ModeBit::Cw => "CW",
            ModeBit::Phone => "PH",
            ModeBit::Ft8 => "FT8",
            ModeBit::Ft4 => "FT4",
        })
    }
}

pub const MASK_LIMIT: u8 = 0x0f;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StationRecord {
    pub callsign: String,
    pub masks: [u8; 8],
}

impl StationRecord {
    pub fn new(callsign: impl Into<String>) -> Self {
        Self { callsign: callsign.into(), masks: [0; 8] }
    }
}

/// Uppercased, trimmed form used as the ledger key.
pub fn normalize_callsign(call: &str) -> String {
    call.trim().to_ascii_uppercase()
}

#[derive(Clone, Debug, PartialEq)]
pub struct ContactEvent {
    pub callsign: String,
    pub band: Band,
    pub mode: ModeBit,
    pub frequency_hz: u64,
    pub grid: String,
    pub time_off: Option<chrono::DateTime<chrono::FixedOffset>>,
    pub operator: Option<String>,
    pub my_call: Option<String>,
    pub my_grid: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SpotEvent {
    pub spotter: String,
    pub callsign: String,
    pub frequency_mhz: f64,
    pub band: Band,
    pub mode: Option<String>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AggregateCounts {
    pub cw: u32,
    pub phone: u32,
    pub digital_a: u32,
    pub digital_b: u32,
    pub total: u32,
}
