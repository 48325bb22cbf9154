use crate::errors::AppError;
use crate::spot_stream::SpotSession;
use crate::tracker::FeedEvent;
use log::{debug, info};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc::Sender;
use tokio::sync::watch;

/// Drive one spot-feed connection until it drops. There is no reconnect:
/// the caller decides whether to start a new one.
pub async fn run(
    host: String,
    port: u16,
    mut session: SpotSession,
    paused: watch::Receiver<bool>,
    tx: Sender<FeedEvent>,
) -> Result<(), AppError> {
    session.start();
    info!("Connecting to spot feed {}:{}", host, port);

    let stream = match TcpStream::connect((host.as_str(), port)).await {
        Ok(s) => s,
        Err(e) => {
            let warning = session.disconnected(&format!("connect {}:{}: {}", host, port, e));
            let _ = tx.send(FeedEvent::Status(warning.clone())).await;
            return Err(AppError::IO(warning));
        }
    };
    session.connected();
    info!("Spot feed connected to {}:{} ({:?})", host, port, session.state());

    let (mut read, mut write) = stream.into_split();
    let mut buf = Vec::with_capacity(4096);

    loop {
        buf.clear();
        tokio::select! { biased;
            _ = tx.closed() => {
                debug!("spot feed: tracker closed");
                session.disconnected("tracker closed");
                return Ok(());
            },
            r = read.read_buf(&mut buf) => {
                let len = match r {
                    Ok(0) => {
                        let warning = session.disconnected("closed by server");
                        let _ = tx.send(FeedEvent::Status(warning)).await;
                        return Ok(());
                    }
                    Ok(len) => len,
                    Err(e) => {
                        let warning = session.disconnected(&e.to_string());
                        let _ = tx.send(FeedEvent::Status(warning.clone())).await;
                        return Err(AppError::IO(warning));
                    }
                };

                session.set_paused(*paused.borrow());
                let out = session.on_bytes(&buf[..len]);

                if let Some(reply) = out.reply {
                    if let Err(e) = write.write_all(&reply).await {
                        let warning = session.disconnected(&format!("login write: {}", e));
                        let _ = tx.send(FeedEvent::Status(warning.clone())).await;
                        return Err(AppError::IO(warning));
                    }
                    info!("Spot feed login sent");
                }

                for spot in out.spots {
                    if tx.send(FeedEvent::Spot(spot)).await.is_err() {
                        session.disconnected("tracker closed");
                        return Ok(());
                    }
                }
            },
        }
    }
}

/// Flip the shared pause flag and return the new value.
pub fn toggle_pause(flag: &watch::Sender<bool>) -> bool {
    flag.send_modify(|p| *p = !*p);
    *flag.borrow()
}

/// Toggle pause on every SIGUSR1 until the spot feed drops its receiver.
#[cfg(unix)]
pub async fn pause_on_signal(flag: watch::Sender<bool>) -> Result<(), AppError> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut usr1 = signal(SignalKind::user_defined1())?;
    loop {
        tokio::select! {
            _ = flag.closed() => return Ok(()),
            r = usr1.recv() => {
                if r.is_none() {
                    return Ok(());
                }
                let paused = toggle_pause(&flag);
                info!("SIGUSR1: spot feed {}", if paused { "paused" } else { "resumed" });
            },
        }
    }
}
