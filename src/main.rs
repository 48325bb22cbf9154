mod aggregate;
mod band;
mod cli;
mod config;
mod contact_feed;
mod errors;
mod ledger;
mod model;
mod roster;
mod spot_feed;
mod spot_stream;
mod store;
mod tracker;
mod wsjtx;

use anyhow::Context;
use env_logger::Env;
use log::{info, warn};
use tokio::sync::{mpsc, watch};

use crate::ledger::Ledger;
use crate::spot_stream::{SpotParser, SpotSession};
use crate::store::CsvStore;
use crate::tracker::{FeedEvent, LogNotifier, Tracker};

fn setup_logging(level: &str) {
    let env = Env::default().filter_or("RUST_LOG", match level {
        "essential" => "info",
        "debug" => "debug",
        "trace" => "trace",
        "warn" => "warn",
        "error" => "error",
        _ => "info",
    });
    env_logger::Builder::from_env(env).init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let args = cli::parse_cli();
    setup_logging(&args.log_level);

    let cfg = config::TrackerConfig::from_cli(&args).context("loading configuration")?;

    let store = CsvStore::open(&cfg.store_path)
        .with_context(|| format!("opening {}", cfg.store_path.display()))?;
    let mut ledger = Ledger::new(store);

    if ledger.is_empty()? {
        let roster = match &cfg.roster_path {
            Some(p) => roster::load_roster(p)?,
            None => roster::DEFAULT_ROSTER.iter().map(|c| c.to_string()).collect(),
        };
        let n = ledger.seed(roster.iter().map(String::as_str))?;
        info!("Inserted {} calls", n);
    } else {
        info!("Data already exists, skipping insert.");
    }

    if args.clear_all {
        if args.yes {
            ledger.clear_all().context("clearing band values")?;
            info!("All values cleared");
        } else {
            warn!("--clear-all ignored without --yes");
        }
    }

    let mut tracker = Tracker::new(ledger, LogNotifier, cfg.weights);
    tracker.refresh()?;

    let (tx, rx) = mpsc::channel::<FeedEvent>(1024);

    // A feed that cannot start is reported and skipped; the other keeps going.
    match contact_feed::bind_localhost(cfg.udp_port).await {
        Ok(sock) => {
            let plan = cfg.band_plan.clone();
            let tx = tx.clone();
            tokio::spawn(async move {
                if let Err(e) = contact_feed::listen(sock, plan, tx).await {
                    warn!("contact feed stopped: {}", e);
                }
            });
        }
        Err(e) => tracker.handle(FeedEvent::Status(e.to_string())),
    }

    let (pause_tx, pause_rx) = watch::channel(cfg.start_paused);
    if cfg.spots_enabled {
        #[cfg(unix)]
        tokio::spawn(async move {
            if let Err(e) = spot_feed::pause_on_signal(pause_tx).await {
                warn!("pause toggle unavailable: {}", e);
            }
        });
        #[cfg(not(unix))]
        drop(pause_tx);

        let session = SpotSession::new(
            &cfg.login,
            &cfg.login_prompt,
            SpotParser::new(cfg.band_plan.clone()),
        );
        let tx = tx.clone();
        let (host, port) = (cfg.cluster_host.clone(), cfg.cluster_port);
        tokio::spawn(async move {
            if let Err(e) = spot_feed::run(host, port, session, pause_rx, tx).await {
                warn!("spot feed stopped: {}", e);
            }
        });
    }
    drop(tx);

    tokio::select! {
        t = tracker.run(rx) => {
            info!("Done. Total {}", t.counts().total);
        },
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted");
        },
    }
    Ok(())
}
