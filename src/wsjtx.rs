// WSJT-X UDP message decoding. Only "QSO Logged" (type 5) is handled.
use crate::band::BandPlan;
use crate::model::{normalize_callsign, ContactEvent, ModeBit};
use chrono::{DateTime, FixedOffset, Local, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use log::{debug, trace};
use std::fmt;
use thiserror::Error;

pub const MAGIC: u32 = 0xadbc_cbda;
pub const QSO_LOGGED: u32 = 5;

/// Qt writes a null QByteArray as a length of 0xffffffff.
const NULL_LENGTH: u32 = u32::MAX;

/// Julian day number of 0001-01-01 minus one (chrono counts CE days from 1).
const JULIAN_DAY_CE_OFFSET: i64 = 1_721_425;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WireError {
    #[error("truncated reading {field}: need {need} bytes, have {have}")]
    Truncated { field: &'static str, need: usize, have: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IgnoreReason {
    NotThisProtocol,
    UnsupportedType(u32),
    UntrackedMode(String),
    UnmappedFrequency(u64),
}

impl fmt::Display for IgnoreReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IgnoreReason::NotThisProtocol => write!(f, "not this protocol"),
            IgnoreReason::UnsupportedType(t) => write!(f, "unsupported type {}", t),
            IgnoreReason::UntrackedMode(m) => write!(f, "not a tracked digital mode: {}", m),
            IgnoreReason::UnmappedFrequency(hz) => write!(f, "unmapped frequency {} Hz", hz),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Event(ContactEvent),
    Ignored(IgnoreReason),
    Malformed(String),
}

/// Big-endian cursor over one datagram.
struct WireReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> WireReader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    #[inline]
    fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn take(&mut self, n: usize, field: &'static str) -> Result<&'a [u8], WireError> {
        if n > self.remaining() {
            return Err(WireError::Truncated { field, need: n, have: self.remaining() });
        }
        let s = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(s)
    }

    fn array<const N: usize>(&mut self, field: &'static str) -> Result<[u8; N], WireError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N, field)?);
        Ok(out)
    }

    fn u8(&mut self, field: &'static str) -> Result<u8, WireError> {
        Ok(self.array::<1>(field)?[0])
    }

    fn u32(&mut self, field: &'static str) -> Result<u32, WireError> {
        Ok(u32::from_be_bytes(self.array(field)?))
    }

    fn i32(&mut self, field: &'static str) -> Result<i32, WireError> {
        Ok(i32::from_be_bytes(self.array(field)?))
    }

    fn u64(&mut self, field: &'static str) -> Result<u64, WireError> {
        Ok(u64::from_be_bytes(self.array(field)?))
    }

    fn i64(&mut self, field: &'static str) -> Result<i64, WireError> {
        Ok(i64::from_be_bytes(self.array(field)?))
    }

    /// Length-prefixed UTF-8 (a serialized QByteArray).
    fn utf8(&mut self, field: &'static str) -> Result<String, WireError> {
        let len = self.u32(field)?;
        if len == NULL_LENGTH {
            return Ok(String::new());
        }
        let bytes = self.take(len as usize, field)?;
        Ok(String::from_utf8_lossy(bytes).into_owned())
    }

    /// Length-prefixed UTF-16BE (a serialized QString). The length is in
    /// bytes; a stray odd byte is skipped.
    fn utf16(&mut self, field: &'static str) -> Result<String, WireError> {
        let len = self.u32(field)?;
        if len == NULL_LENGTH {
            return Ok(String::new());
        }
        let bytes = self.take(len as usize, field)?;
        let units = bytes.chunks_exact(2).map(|p| u16::from_be_bytes([p[0], p[1]]));
        Ok(char::decode_utf16(units)
            .map(|c| c.unwrap_or(char::REPLACEMENT_CHARACTER))
            .collect())
    }

    /// QDateTime: julian day, msecs since midnight, time spec, then an
    /// offset (spec 2) or a QTimeZone id written as a QString (spec 3).
    fn datetime(&mut self, field: &'static str) -> Result<Option<DateTime<FixedOffset>>, WireError> {
        let jd = self.i64(field)?;
        let ms = self.u32(field)?;
        let spec = self.u8(field)?;
        let zone = match spec {
            0 => Zone::Local,
            1 => Zone::Utc,
            2 => Zone::Offset(self.i32(field)?),
            3 => Zone::Named(self.utf16(field)?),
            _ => Zone::Unknown,
        };
        Ok(qt_datetime(jd, ms, &zone))
    }
}

enum Zone {
    Local,
    Utc,
    Offset(i32),
    Named(String),
    Unknown,
}

fn qt_datetime(jd: i64, ms: u32, zone: &Zone) -> Option<DateTime<FixedOffset>> {
    let days = i32::try_from(jd.checked_sub(JULIAN_DAY_CE_OFFSET)?).ok()?;
    let date = NaiveDate::from_num_days_from_ce_opt(days)?;
    let time = NaiveTime::from_num_seconds_from_midnight_opt(ms / 1000, (ms % 1000) * 1_000_000)?;
    let naive = date.and_time(time);
    match zone {
        Zone::Utc => Some(Utc.from_utc_datetime(&naive).fixed_offset()),
        Zone::Local => Local.from_local_datetime(&naive).single().map(|dt| dt.fixed_offset()),
        Zone::Offset(secs) => FixedOffset::east_opt(*secs)?
            .from_local_datetime(&naive)
            .single(),
        Zone::Named(id) => {
            let tz = id.parse::<Tz>().ok()?;
            tz.from_local_datetime(&naive).single().map(|dt| dt.fixed_offset())
        }
        Zone::Unknown => None,
    }
}

/// Fields newer WSJT-X builds append after `name`.
#[derive(Default)]
struct Tail {
    operator: Option<String>,
    my_call: Option<String>,
    my_grid: Option<String>,
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() { None } else { Some(s.trim().to_string()) }
}

/// Best-effort: stops at the first field that is missing or short.
fn drain_tail(r: &mut WireReader<'_>, tail: &mut Tail) -> Result<(), WireError> {
    if r.remaining() == 0 {
        return Ok(());
    }
    let _time_on = r.datetime("time on")?;
    tail.operator = non_empty(r.utf8("operator call")?);
    tail.my_call = non_empty(r.utf8("my call")?);
    tail.my_grid = non_empty(r.utf8("my grid")?);
    let _exch_sent = r.utf8("exchange sent")?;
    let _exch_rcvd = r.utf8("exchange received")?;
    let _prop_mode = r.utf8("propagation mode")?;
    if r.remaining() > 0 {
        trace!("wsjtx: {} unknown trailing bytes", r.remaining());
    }
    Ok(())
}

/// Decode one datagram. Never panics and never returns an error: anything
/// that is not a usable QSO Logged message comes back as Ignored/Malformed.
pub fn decode(datagram: &[u8], plan: &BandPlan) -> Outcome {
    let mut r = WireReader::new(datagram);

    match r.u32("magic") {
        Ok(MAGIC) => {}
        _ => {
            let head = &datagram[..datagram.len().min(16)];
            trace!("not WSJT-X, first bytes {:02x?}", head);
            return Outcome::Ignored(IgnoreReason::NotThisProtocol);
        }
    }

    match decode_body(&mut r, plan) {
        Ok(outcome) => outcome,
        Err(e) => Outcome::Malformed(e.to_string()),
    }
}

fn decode_body(r: &mut WireReader<'_>, plan: &BandPlan) -> Result<Outcome, WireError> {
    let schema = r.u32("schema")?;
    let msg_type = r.u32("message type")?;
    let id = r.utf8("client id")?;

    if msg_type != QSO_LOGGED {
        trace!("wsjtx: id={} schema={} unhandled type {}", id, schema, msg_type);
        return Ok(Outcome::Ignored(IgnoreReason::UnsupportedType(msg_type)));
    }

    let time_off = r.datetime("time off")?;
    let dx_call = r.utf8("dx call")?;
    let dx_grid = r.utf8("dx grid")?;
    let frequency_hz = r.u64("frequency")?;
    let mode = r.utf8("mode")?;
    let rpt_sent = r.utf8("report sent")?;
    let rpt_rcvd = r.utf8("report received")?;
    let tx_power = r.utf8("tx power")?;
    let comments = r.utf8("comments")?;
    let name = r.utf8("name")?;

    let mut tail = Tail::default();
    if let Err(e) = drain_tail(r, &mut tail) {
        trace!("wsjtx: optional tail cut short: {}", e);
    }

    let callsign = normalize_callsign(&dx_call);
    if callsign.is_empty() {
        return Ok(Outcome::Malformed("empty dx call".into()));
    }

    let mode_up = mode.trim().to_ascii_uppercase();
    let Some(mode_bit) = ModeBit::from_digital_token(&mode_up) else {
        return Ok(Outcome::Ignored(IgnoreReason::UntrackedMode(mode_up)));
    };

    let Some(band) = plan.classify(frequency_hz) else {
        debug!(
            "QSO_LOGGED (ignored band) call={} freq={} mode={}",
            callsign, frequency_hz, mode_up
        );
        return Ok(Outcome::Ignored(IgnoreReason::UnmappedFrequency(frequency_hz)));
    };

    debug!(
        "QSO_LOGGED id={} call={} band={} mode={} freq={} grid={} rptS={} rptR={} pwr={} name={} comments={}",
        id, callsign, band, mode_bit, frequency_hz, dx_grid, rpt_sent, rpt_rcvd, tx_power, name, comments
    );

    Ok(Outcome::Event(ContactEvent {
        callsign,
        band,
        mode: mode_bit,
        frequency_hz,
        grid: dx_grid.trim().to_string(),
        time_off,
        operator: tail.operator,
        my_call: tail.my_call,
        my_grid: tail.my_grid,
    }))
}

/// Running tally of decode outcomes for one listener.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DecodeStats {
    pub events: u64,
    pub ignored: u64,
    pub malformed: u64,
}

impl DecodeStats {
    pub fn record(&mut self, outcome: &Outcome) {
        match outcome {
            Outcome::Event(_) => self.events += 1,
            Outcome::Ignored(_) => self.ignored += 1,
            Outcome::Malformed(_) => self.malformed += 1,
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::model::Band;
    use chrono::{Datelike, Timelike};

    pub(crate) struct Datagram(pub Vec<u8>);

    impl Datagram {
        pub(crate) fn header(msg_type: u32) -> Self {
            let mut d = Datagram(Vec::new());
            d.u32(MAGIC).u32(3).u32(msg_type).str("WSJT-X");
            d
        }
        pub(crate) fn u8(&mut self, v: u8) -> &mut Self { self.0.push(v); self }
        pub(crate) fn u32(&mut self, v: u32) -> &mut Self { self.0.extend_from_slice(&v.to_be_bytes()); self }
        pub(crate) fn u64(&mut self, v: u64) -> &mut Self { self.0.extend_from_slice(&v.to_be_bytes()); self }
        pub(crate) fn i64(&mut self, v: i64) -> &mut Self { self.0.extend_from_slice(&v.to_be_bytes()); self }
        pub(crate) fn qstring(&mut self, s: &str) -> &mut Self {
            let units: Vec<u16> = s.encode_utf16().collect();
            self.u32(units.len() as u32 * 2);
            for u in units {
                self.0.extend_from_slice(&u.to_be_bytes());
            }
            self
        }
        pub(crate) fn str(&mut self, s: &str) -> &mut Self {
            self.u32(s.len() as u32);
            self.0.extend_from_slice(s.as_bytes());
            self
        }
        /// 2025-06-01 12:34:56 UTC
        pub(crate) fn utc_time(&mut self) -> &mut Self {
            self.i64(2_460_828).u32(45_296_000).u8(1)
        }
    }

    /// Mandatory QSO Logged prefix, without the optional tail.
    pub(crate) fn qso_logged(call: &str, freq_hz: u64, mode: &str) -> Datagram {
        let mut d = Datagram::header(QSO_LOGGED);
        d.utc_time()
            .str(call)
            .str("FN42")
            .u64(freq_hz)
            .str(mode)
            .str("-10")
            .str("-12")
            .str("100")
            .str("tnx")
            .str("Bob");
        d
    }

    fn expect_event(o: Outcome) -> ContactEvent {
        match o {
            Outcome::Event(e) => e,
            other => panic!("expected event, got {:?}", other),
        }
    }

    #[test]
    fn ft8_on_twenty_metres() {
        let d = qso_logged("w1xyz", 14_074_000, "FT8");
        let e = expect_event(decode(&d.0, &BandPlan::default()));
        assert_eq!(e.callsign, "W1XYZ");
        assert_eq!(e.band, Band::B20);
        assert_eq!(e.mode, ModeBit::Ft8);
        assert_eq!(e.grid, "FN42");
        assert_eq!(e.operator, None);
        let t = e.time_off.unwrap();
        assert_eq!((t.year(), t.month(), t.day()), (2025, 6, 1));
        assert_eq!((t.hour(), t.minute(), t.second()), (12, 34, 56));
    }

    #[test]
    fn mode_is_trimmed_and_uppercased() {
        let d = qso_logged("K1ABC", 7_047_500, " ft4 ");
        let e = expect_event(decode(&d.0, &BandPlan::default()));
        assert_eq!(e.mode, ModeBit::Ft4);
        assert_eq!(e.band, Band::B40);
    }

    #[test]
    fn wrong_magic_is_ignored_without_parsing() {
        let mut bytes = vec![0xde, 0xad, 0xbe, 0xef];
        bytes.extend_from_slice(&[0xff; 64]);
        assert_eq!(
            decode(&bytes, &BandPlan::default()),
            Outcome::Ignored(IgnoreReason::NotThisProtocol)
        );
        assert_eq!(
            decode(&[0xad, 0xbc], &BandPlan::default()),
            Outcome::Ignored(IgnoreReason::NotThisProtocol)
        );
        assert_eq!(decode(&[], &BandPlan::default()), Outcome::Ignored(IgnoreReason::NotThisProtocol));
    }

    #[test]
    fn other_message_types_are_unsupported() {
        let mut d = Datagram::header(2);
        d.u8(1).u32(0);
        assert_eq!(
            decode(&d.0, &BandPlan::default()),
            Outcome::Ignored(IgnoreReason::UnsupportedType(2))
        );
    }

    #[test]
    fn untracked_modes_and_bands_are_ignored() {
        let plan = BandPlan::default();
        let d = qso_logged("K1ABC", 14_025_000, "CW");
        assert_eq!(decode(&d.0, &plan), Outcome::Ignored(IgnoreReason::UntrackedMode("CW".into())));

        let d = qso_logged("K1ABC", 50_313_000, "FT8");
        assert_eq!(decode(&d.0, &plan), Outcome::Ignored(IgnoreReason::UnmappedFrequency(50_313_000)));
    }

    #[test]
    fn any_truncation_of_mandatory_prefix_is_malformed() {
        let plan = BandPlan::default();
        let full = qso_logged("W1XYZ", 14_074_000, "FT8").0;
        for cut in 4..full.len() {
            match decode(&full[..cut], &plan) {
                Outcome::Malformed(_) => {}
                other => panic!("cut at {} gave {:?}", cut, other),
            }
        }
        assert!(matches!(decode(&full, &plan), Outcome::Event(_)));
    }

    #[test]
    fn declared_length_past_end_is_malformed() {
        let mut d = Datagram::header(QSO_LOGGED);
        d.utc_time().u32(200).0.extend_from_slice(b"W1XYZ");
        assert!(matches!(decode(&d.0, &BandPlan::default()), Outcome::Malformed(_)));
    }

    #[test]
    fn null_strings_decode_as_empty() {
        let mut d = Datagram::header(QSO_LOGGED);
        d.utc_time()
            .str("W1XYZ")
            .u32(NULL_LENGTH)
            .u64(14_074_000)
            .str("FT8");
        for _ in 0..5 {
            d.u32(NULL_LENGTH);
        }
        let e = expect_event(decode(&d.0, &BandPlan::default()));
        assert_eq!(e.grid, "");
    }

    #[test]
    fn full_tail_is_read() {
        let mut d = qso_logged("W1XYZ", 21_074_000, "FT8");
        d.utc_time()
            .str("N0OP")
            .str("n0me")
            .str("EM12")
            .str("")
            .str("")
            .str("");
        let e = expect_event(decode(&d.0, &BandPlan::default()));
        assert_eq!(e.band, Band::B15);
        assert_eq!(e.operator.as_deref(), Some("N0OP"));
        assert_eq!(e.my_call.as_deref(), Some("n0me"));
        assert_eq!(e.my_grid.as_deref(), Some("EM12"));
    }

    #[test]
    fn partial_tail_does_not_fail_decode() {
        let mut d = qso_logged("W1XYZ", 14_074_000, "FT8");
        d.utc_time().str("N0OP").u32(40).0.extend_from_slice(b"sh");
        let e = expect_event(decode(&d.0, &BandPlan::default()));
        assert_eq!(e.operator.as_deref(), Some("N0OP"));
        assert_eq!(e.my_call, None);

        let mut d = qso_logged("W1XYZ", 14_074_000, "FT8");
        d.u8(0x7f);
        assert!(matches!(decode(&d.0, &BandPlan::default()), Outcome::Event(_)));
    }

    #[test]
    fn garbage_after_magic_never_panics() {
        let plan = BandPlan::default();
        for seed in 0u32..256 {
            let mut d = Datagram(Vec::new());
            d.u32(MAGIC);
            let mut x = seed.wrapping_mul(2_654_435_761);
            for _ in 0..(seed % 97) {
                x ^= x << 13;
                x ^= x >> 17;
                x ^= x << 5;
                d.u8(x as u8);
            }
            let _ = decode(&d.0, &plan);
        }
    }

    #[test]
    fn unusual_timestamps_become_none() {
        let mut d = Datagram::header(QSO_LOGGED);
        d.i64(i64::MIN).u32(0).u8(1);
        d.str("W1XYZ").str("").u64(14_074_000).str("FT8");
        for _ in 0..5 {
            d.str("");
        }
        let e = expect_event(decode(&d.0, &BandPlan::default()));
        assert_eq!(e.time_off, None);
    }

    #[test]
    fn offset_time_spec_reads_extra_field() {
        let mut d = Datagram::header(QSO_LOGGED);
        d.i64(2_460_828).u32(0).u8(2).u32(3600);
        d.str("W1XYZ").str("").u64(14_074_000).str("FT8");
        for _ in 0..5 {
            d.str("");
        }
        let e = expect_event(decode(&d.0, &BandPlan::default()));
        assert_eq!(e.time_off.unwrap().offset().local_minus_utc(), 3600);
    }

    #[test]
    fn zone_time_spec_reads_utf16_zone_id() {
        let mut d = Datagram::header(QSO_LOGGED);
        d.i64(2_460_828).u32(0).u8(3).qstring("Europe/Berlin");
        d.str("W1XYZ").str("JO62").u64(14_074_000).str("FT8");
        for _ in 0..5 {
            d.str("");
        }
        let e = expect_event(decode(&d.0, &BandPlan::default()));
        assert_eq!(e.callsign, "W1XYZ");
        assert_eq!(e.grid, "JO62");
        assert_eq!(e.time_off.unwrap().offset().local_minus_utc(), 7200);

        let mut d = Datagram::header(QSO_LOGGED);
        d.i64(2_460_828).u32(0).u8(3).qstring("Mars/Olympus");
        d.str("W1XYZ").str("").u64(14_074_000).str("FT8");
        for _ in 0..5 {
            d.str("");
        }
        let e = expect_event(decode(&d.0, &BandPlan::default()));
        assert_eq!(e.time_off, None);
    }

    #[test]
    fn stats_count_each_outcome() {
        let plan = BandPlan::default();
        let mut stats = DecodeStats::default();
        stats.record(&decode(&qso_logged("W1XYZ", 14_074_000, "FT8").0, &plan));
        stats.record(&decode(&[1, 2, 3, 4], &plan));
        stats.record(&decode(&MAGIC.to_be_bytes(), &plan));
        assert_eq!(stats, DecodeStats { events: 1, ignored: 1, malformed: 1 });
    }
}
