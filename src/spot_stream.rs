use crate::band::{mhz_to_hz, BandPlan};
use crate::errors::StoreError;
use crate::ledger::Ledger;
use crate::model::{normalize_callsign, ModeBit, SpotEvent};
use crate::store::StationStore;
use log::{debug, info, trace, warn};
use regex::Regex;

pub const DEFAULT_LOGIN_PROMPT: &str = "Please enter your call";

/// Longest partial line kept while waiting for its `\n`.
pub const MAX_PENDING_BYTES: usize = 4096;

#[inline]
fn strip_bom(s: &str) -> &str {
    s.strip_prefix('\u{FEFF}').unwrap_or(s)
}

/// Reassembles `\n`-terminated lines from arbitrary read boundaries.
#[derive(Debug, Default)]
pub struct LineFramer {
    buf: Vec<u8>,
}

impl LineFramer {
    pub fn extend(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// Remove and return every complete line; the partial tail stays.
    pub fn drain_lines(&mut self) -> Vec<String> {
        let mut lines = Vec::new();
        while let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
            let mut line: Vec<u8> = self.buf.drain(..=pos).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            lines.push(String::from_utf8_lossy(&line).into_owned());
        }
        lines
    }

    fn find(&self, needle: &[u8]) -> Option<usize> {
        if needle.is_empty() {
            return None;
        }
        self.buf.windows(needle.len()).position(|w| w == needle)
    }

    /// Drop everything up to and including the first `needle`.
    pub fn consume_through(&mut self, needle: &[u8]) -> bool {
        match self.find(needle) {
            Some(pos) => {
                self.buf.drain(..pos + needle.len());
                true
            }
            None => false,
        }
    }

    /// Drop the rest of the current line, or everything if no `\n` is buffered.
    pub fn discard_line(&mut self) {
        match self.buf.iter().position(|&b| b == b'\n') {
            Some(pos) => {
                self.buf.drain(..=pos);
            }
            None => self.buf.clear(),
        }
    }

    /// Keep at most the last `n` bytes.
    pub fn keep_tail(&mut self, n: usize) {
        if self.buf.len() > n {
            let cut = self.buf.len() - n;
            self.buf.drain(..cut);
        }
    }

    pub fn buffered(&self) -> &[u8] {
        &self.buf
    }

    pub fn clear(&mut self) {
        self.buf.clear();
    }
}

/// Matches `DX de <source>: <freq> <call> [<mode>]`.
pub struct SpotParser {
    re: Regex,
    plan: BandPlan,
}

impl SpotParser {
    pub fn new(plan: BandPlan) -> Self {
        let re = Regex::new(r"^DX de (\S+?):\s*(\d+(?:\.\d*)?)\s+(\S+)(?:\s+(\S+))?")
            .expect("spot pattern is a valid regex");
        Self { re, plan }
    }

    pub fn parse_line(&self, line: &str) -> Option<SpotEvent> {
        let s = strip_bom(line).trim();
        let caps = self.re.captures(s)?;

        let raw_freq = &caps[2];
        let mut mhz = match raw_freq.parse::<f64>() {
            Ok(v) => v,
            Err(_) => {
                debug!("spot: bad frequency '{}'", raw_freq);
                return None;
            }
        };
        // clusters print kHz
        if mhz > 1000.0 {
            mhz /= 1000.0;
        }
        let Some(band) = mhz_to_hz(mhz).and_then(|hz| self.plan.classify(hz)) else {
            trace!("spot: {} MHz outside tracked bands", mhz);
            return None;
        };

        Some(SpotEvent {
            spotter: caps[1].to_string(),
            callsign: normalize_callsign(&caps[3]),
            frequency_mhz: mhz,
            band,
            mode: caps.get(4).map(|m| m.as_str().to_string()),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    AwaitingLogin,
    Streaming,
}

#[derive(Debug, Default)]
pub struct ReadOutcome {
    /// Bytes to write back to the server (the credential line).
    pub reply: Option<Vec<u8>>,
    pub spots: Vec<SpotEvent>,
}

/// Spot-feed session without any IO. The socket task feeds it events and
/// writes back whatever `ReadOutcome::reply` asks for.
pub struct SpotSession {
    state: SessionState,
    paused: bool,
    login_sent: bool,
    credential: String,
    prompt: String,
    framer: LineFramer,
    parser: SpotParser,
}

impl SpotSession {
    pub fn new(credential: &str, prompt: &str, parser: SpotParser) -> Self {
        Self {
            state: SessionState::Disconnected,
            paused: false,
            login_sent: false,
            credential: credential.trim().to_string(),
            prompt: prompt.to_string(),
            framer: LineFramer::default(),
            parser,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn set_paused(&mut self, paused: bool) {
        if paused != self.paused {
            info!("spot feed {}", if paused { "paused" } else { "resumed" });
        }
        self.paused = paused;
    }

    pub fn start(&mut self) {
        if self.state != SessionState::Disconnected {
            warn!("spot session start ignored in state {:?}", self.state);
            return;
        }
        self.login_sent = false;
        self.framer.clear();
        self.state = SessionState::Connecting;
    }

    pub fn connected(&mut self) {
        if self.state == SessionState::Connecting {
            self.state = SessionState::AwaitingLogin;
        }
    }

    pub fn on_bytes(&mut self, data: &[u8]) -> ReadOutcome {
        let mut out = ReadOutcome::default();
        self.framer.extend(data);

        if self.state == SessionState::AwaitingLogin
            && !self.login_sent
            && self.framer.consume_through(self.prompt.as_bytes())
        {
            let mut line = self.credential.clone().into_bytes();
            line.extend_from_slice(b"\r\n");
            out.reply = Some(line);
            self.login_sent = true;
            self.state = SessionState::Streaming;
            // the server waits for the credential, so nothing useful follows the prompt
            self.framer.discard_line();
            debug!("spot feed: login prompt seen, sending credential");
        }

        // Paused drops everything, including any partial line. Before login
        // a prompt-sized tail survives so a split prompt still matches.
        if self.paused {
            trace!("spot feed paused: discarding {} bytes", self.framer.buffered().len());
            self.trim_pending();
            return out;
        }

        for line in self.framer.drain_lines() {
            match self.parser.parse_line(&line) {
                Some(spot) => out.spots.push(spot),
                None => trace!("spot feed: skipped line {:?}", line),
            }
        }
        if self.framer.buffered().len() > MAX_PENDING_BYTES {
            debug!("spot feed: dropping {} bytes without a line end", self.framer.buffered().len());
            self.trim_pending();
        }
        out
    }

    fn trim_pending(&mut self) {
        if self.state == SessionState::AwaitingLogin && !self.login_sent {
            self.framer.keep_tail(self.prompt.len().saturating_sub(1));
        } else {
            self.framer.clear();
        }
    }

    /// Socket error or EOF. Returns the warning to surface.
    pub fn disconnected(&mut self, reason: &str) -> String {
        let prev = self.state;
        self.state = SessionState::Disconnected;
        self.framer.clear();
        format!("Spot feed disconnected ({:?}): {}", prev, reason)
    }
}

/// Spot worth showing the operator: the station is on the roster and CW on
/// this band is still open.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub callsign: String,
    pub frequency_mhz: f64,
}

pub fn candidate_for<S: StationStore>(
    ledger: &Ledger<S>,
    spot: &SpotEvent,
) -> Result<Option<Candidate>, StoreError> {
    let Some(mask) = ledger.lookup(&spot.callsign, spot.band)? else {
        return Ok(None);
    };
    let cw_mode = match spot.mode.as_deref() {
        None | Some("CW") => true,
        Some(_) => false,
    };
    if !cw_mode || mask & ModeBit::Cw.mask() != 0 {
        trace!("spot {} {} observed, not a candidate", spot.callsign, spot.band);
        return Ok(None);
    }
    Ok(Some(Candidate {
        callsign: spot.callsign.clone(),
        frequency_mhz: spot.frequency_mhz,
    }))
}
