use crate::aggregate::{recompute, ScoreWeights};
use crate::errors::StoreError;
use crate::ledger::{Ledger, MergeOutcome};
use crate::model::{AggregateCounts, ContactEvent, SpotEvent};
use crate::spot_stream::candidate_for;
use crate::store::StationStore;
use log::{debug, info, warn};
use tokio::sync::mpsc::Receiver;

/// Everything the feed tasks hand to the tracker loop.
#[derive(Debug, Clone)]
pub enum FeedEvent {
    Contact(ContactEvent),
    Spot(SpotEvent),
    Status(String),
}

/// Outbound notifications (a UI, or just the log).
pub trait Notifier {
    fn on_ledger_changed(&mut self);
    fn on_candidate_spot(&mut self, callsign: &str, frequency_mhz: f64);
    fn on_status_message(&mut self, text: &str);
    fn on_aggregate_updated(&mut self, counts: &AggregateCounts);
}

pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn on_ledger_changed(&mut self) {
        debug!("ledger changed");
    }

    fn on_candidate_spot(&mut self, callsign: &str, frequency_mhz: f64) {
        info!("CW candidate: {} on {:.3} MHz", callsign, frequency_mhz);
    }

    fn on_status_message(&mut self, text: &str) {
        warn!("{}", text);
    }

    fn on_aggregate_updated(&mut self, c: &AggregateCounts) {
        info!(
            "CW: {}  PH: {}  FT8: {}  FT4: {}  Total: {}",
            c.cw, c.phone, c.digital_a, c.digital_b, c.total
        );
    }
}

/// Sole owner of the ledger. Each event is handled to completion before the
/// next one is taken, so merge and recompute are never interleaved.
pub struct Tracker<S: StationStore, N: Notifier> {
    ledger: Ledger<S>,
    notifier: N,
    weights: ScoreWeights,
    counts: AggregateCounts,
}

impl<S: StationStore, N: Notifier> Tracker<S, N> {
    pub fn new(ledger: Ledger<S>, notifier: N, weights: ScoreWeights) -> Self {
        Self { ledger, notifier, weights, counts: AggregateCounts::default() }
    }

    pub fn counts(&self) -> AggregateCounts {
        self.counts
    }

    /// On-demand full rescan.
    pub fn refresh(&mut self) -> Result<AggregateCounts, StoreError> {
        let records = self.ledger.records()?;
        self.counts = recompute(&records, &self.weights);
        self.notifier.on_aggregate_updated(&self.counts);
        Ok(self.counts)
    }

    pub fn handle(&mut self, event: FeedEvent) {
        match event {
            FeedEvent::Contact(c) => match self.apply_contact(&c) {
                Ok(MergeOutcome::Changed { .. }) => {
                    if let Err(e) = self.refresh() {
                        self.notifier.on_status_message(&format!(
                            "Logged {} but totals could not be recomputed: {}",
                            c.callsign, e
                        ));
                    }
                }
                Ok(_) => {}
                Err(e) => self
                    .notifier
                    .on_status_message(&format!("Update failed for {}: {}", c.callsign, e)),
            },
            FeedEvent::Spot(s) => match candidate_for(&self.ledger, &s) {
                Ok(Some(c)) => self.notifier.on_candidate_spot(&c.callsign, c.frequency_mhz),
                Ok(None) => {}
                Err(e) => self
                    .notifier
                    .on_status_message(&format!("Lookup failed for {}: {}", s.callsign, e)),
            },
            FeedEvent::Status(text) => self.notifier.on_status_message(&text),
        }
    }

    fn apply_contact(&mut self, c: &ContactEvent) -> Result<MergeOutcome, StoreError> {
        let outcome = self.ledger.merge(&c.callsign, c.band, c.mode)?;
        match outcome {
            MergeOutcome::Changed { old, new } => {
                info!(
                    "Logged {} {} {} ({:04b} -> {:04b})",
                    c.callsign, c.band, c.mode, old, new
                );
                self.notifier.on_ledger_changed();
            }
            MergeOutcome::Unchanged => debug!("{} {} {} already worked", c.callsign, c.band, c.mode),
            MergeOutcome::UnknownCallsign => debug!("{} not on roster", c.callsign),
        }
        Ok(outcome)
    }

    /// Drain the feed channel until every sender is gone.
    pub async fn run(mut self, mut rx: Receiver<FeedEvent>) -> Self {
        while let Some(event) = rx.recv().await {
            self.handle(event);
        }
        info!("tracker: all feeds closed");
        self
    }
}
