//! The two TCP endpoints: event fan-out and settings control.
//!
//! Both bind fixed local addresses and run for the process lifetime.
//! The publisher has no buffering beyond the fan-out channel — a slow
//! subscriber lags and misses messages, an absent one misses
//! everything.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc, Mutex};
use tracing::{debug, error, info, warn};

use crate::events::SemanticEvent;
use crate::settings::Settings;

use super::handle_request;

/// Fan-out depth per subscriber before it starts lagging.
const FANOUT_CAPACITY: usize = 64;

/// Run the publish endpoint: serialize every semantic event to a JSON
/// line and fan it out to all connected subscribers.
pub async fn run_publisher(
    addr: String,
    mut events: mpsc::UnboundedReceiver<SemanticEvent>,
) -> Result<()> {
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding publish endpoint {}", addr))?;
    info!(%addr, "publish endpoint listening");

    let (fan, _) = broadcast::channel::<String>(FANOUT_CAPACITY);

    // Serializer: dispatcher output -> broadcast lines.
    let fan_in = fan.clone();
    tokio::spawn(async move {
        while let Some(ev) = events.recv().await {
            match serde_json::to_string(&ev) {
                // No subscribers is fine; send only fails then.
                Ok(line) => {
                    let _ = fan_in.send(line);
                }
                Err(e) => error!(error = %e, "event serialization failed"),
            }
        }
    });

    loop {
        let (mut stream, peer) = listener.accept().await?;
        let mut sub = fan.subscribe();
        tokio::spawn(async move {
            debug!(%peer, "subscriber connected");
            loop {
                match sub.recv().await {
                    Ok(line) => {
                        if stream.write_all(line.as_bytes()).await.is_err()
                            || stream.write_all(b"\n").await.is_err()
                        {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        warn!(%peer, missed, "slow subscriber dropped messages");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            debug!(%peer, "subscriber disconnected");
        });
    }
}

/// Run the control endpoint: one JSON request line in, one reply line
/// out, strictly in order. At most one request is in flight per
/// connection, which is what keeps settings updates serialized.
pub async fn run_control(addr: String, settings: Arc<Settings>) -> Result<()> {
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding control endpoint {}", addr))?;
    info!(%addr, "control endpoint listening");

    // One request in flight across all clients, like the reply socket
    // this channel models.
    let gate = Arc::new(Mutex::new(()));

    loop {
        let (stream, peer) = listener.accept().await?;
        let settings = settings.clone();
        let gate = gate.clone();
        tokio::spawn(async move {
            debug!(%peer, "control client connected");
            let (read, mut write) = stream.into_split();
            let mut lines = BufReader::new(read).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        let reply = {
                            let _serial = gate.lock().await;
                            handle_request(&line, &settings)
                        };
                        if write.write_all(reply.as_bytes()).await.is_err()
                            || write.write_all(b"\n").await.is_err()
                        {
                            break;
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        warn!(%peer, error = %e, "control read failed");
                        break;
                    }
                }
            }
            debug!(%peer, "control client disconnected");
        });
    }
}
