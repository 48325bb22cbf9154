use crate::band::BandPlan;
use crate::errors::AppError;
use crate::tracker::FeedEvent;
use crate::wsjtx::{decode, DecodeStats, Outcome};
use log::{debug, info, trace, warn};
use std::net::{Ipv4Addr, SocketAddr};
use tokio::net::UdpSocket;
use tokio::sync::mpsc::Sender;

const MAX_DATAGRAM: usize = 65_536;

/// Bind to 127.0.0.1 only; the logging program runs on the same host.
pub async fn bind_localhost(port: u16) -> Result<UdpSocket, AppError> {
    let addr = SocketAddr::from((Ipv4Addr::LOCALHOST, port));
    let sock = UdpSocket::bind(addr)
        .await
        .map_err(|e| AppError::IO(format!("UDP bind failed on {}: {}", addr, e)))?;
    info!("UDP listening on {}", sock.local_addr()?);
    Ok(sock)
}

/// Decode datagrams until the socket fails or the tracker goes away.
pub async fn listen(
    sock: UdpSocket,
    plan: BandPlan,
    tx: Sender<FeedEvent>,
) -> Result<DecodeStats, AppError> {
    let mut buf = Vec::with_capacity(MAX_DATAGRAM);
    let mut stats = DecodeStats::default();

    loop {
        buf.clear();
        tokio::select! { biased;
            _ = tx.closed() => {
                debug!("contact feed: tracker closed");
                return Ok(stats);
            },
            r = sock.recv_buf_from(&mut buf) => {
                let (len, from) = match r {
                    Ok(v) => v,
                    Err(e) => {
                        let msg = format!("UDP receive failed: {}", e);
                        let _ = tx.send(FeedEvent::Status(msg.clone())).await;
                        return Err(AppError::IO(msg));
                    }
                };
                let outcome = decode(&buf[..len], &plan);
                stats.record(&outcome);
                match outcome {
                    Outcome::Event(ev) => {
                        if tx.send(FeedEvent::Contact(ev)).await.is_err() {
                            warn!("contact feed: downstream closed; stopping");
                            return Ok(stats);
                        }
                    }
                    Outcome::Ignored(reason) => trace!("datagram from {} ignored: {}", from, reason),
                    Outcome::Malformed(reason) => debug!("datagram from {} malformed: {}", from, reason),
                }
                trace!(
                    "contact feed: {} events, {} ignored, {} malformed",
                    stats.events, stats.ignored, stats.malformed
                );
            },
        }
    }
}
