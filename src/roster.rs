use crate::errors::AppError;
use std::path::Path;

/// Special-event stations seeded into an empty store.
pub const DEFAULT_ROSTER: &[&str] = &[
    "3B8WWA", "3Z6I", "4M5A", "4M5DX", "4U1A", "8A1A", "9M2WWA", "9M8WWA", "A43WWA", "AT2WWA",
    "AT3WWA", "AT4WWA", "AT6WWA", "AT7WWA", "BA3RA", "BA7CK", "BG0DXC", "BH9CA", "BI4SSB", "BY1RX",
    "BY2WL", "BY5HB", "BY6SX", "BY8MA", "CQ7WWA", "CR2WWA", "CR5WWA", "CR6WWA", "D4W", "DA0WWA",
    "DL0WWA", "DU0WWA", "E2WWA", "E7W", "EG1WWA", "EG2WWA", "EG3WWA", "EG4WWA", "EG5WWA", "EG6WWA",
    "EG7WWA", "EG9WWA", "EM0WWA", "GB0WWA", "GB1WWA", "GB2WWA", "GB4WWA", "GB5WWA", "GB6WWA",
    "GB8WWA", "GB9WWA", "HB9WWA", "HI3WWA", "HI6WWA", "HI7WWA", "HI8WWA", "HZ1WWA", "II0WWA",
    "II1WWA", "II2WWA", "II3WWA", "II4WWA", "II5WWA", "II6WWA", "II7WWA", "II8WWA", "II9WWA",
    "IR0WWA", "IR1WWA", "LR1WWA", "N0W", "N1W", "N4W", "N6W", "N8W", "N9W", "OL6WWA", "OP0WWA",
    "PA26WWA", "PC26WWA", "PD26WWA", "PE26WWA", "PF26WWA", "RW1F", "S53WWA", "SB9WWA", "SC9WWA",
    "SD9WWA", "SN0WWA", "SN1WWA", "SN2WWA", "SN3WWA", "SN4WWA", "SN6WWA", "SO3WWA", "SX0W",
    "TK4TH", "TM18WWA", "TM1WWA", "TM29WWA", "TM7WWA", "TM9WWA", "UP7WWA", "VB2WWA", "VC1WWA",
    "VE9WWA", "W4I", "YI1RN", "YL73R", "YO0WWA", "YU45MJA", "Z30WWA",
];

/// One callsign per line; blank lines and `#` comments are skipped.
pub fn parse_roster(text: &str) -> Vec<String> {
    text.lines()
        .map(|l| l.split('#').next().unwrap_or("").trim())
        .filter(|l| !l.is_empty())
        .map(|l| l.to_ascii_uppercase())
        .collect()
}

pub fn load_roster(path: &Path) -> Result<Vec<String>, AppError> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| AppError::IO(format!("read roster {}: {}", path.display(), e)))?;
    Ok(parse_roster(&text))
}
