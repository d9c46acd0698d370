use std::rc::Rc;

use futures::StreamExt;
use gloo_net::websocket::{Message, futures::WebSocket};
use gloo_timers::future::TimeoutFuture;
use wasm_bindgen_futures::spawn_local;

use super::types::DashboardSnapshot;

const INITIAL_BACKOFF_MS: u32 = 500;
const MAX_BACKOFF_MS: u32 = 15_000;
const MAX_ATTEMPTS: u32 = 20;

/// Connection state surfaced by the status badge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamStatus {
    Idle,
    Connecting,
    Connected,
    Reconnecting { attempt: u32 },
    Failed,
}

#[derive(Debug)]
pub enum SnapshotStreamError {
    Open(String),
    Deserialize(String),
}

pub type SnapshotCallback = Rc<dyn Fn(DashboardSnapshot)>;
pub type StatusCallback = Rc<dyn Fn(StreamStatus)>;

/// Delay before reconnect attempt `attempt` (1-based), doubling up to a cap.
pub fn backoff_ms(attempt: u32) -> u32 {
    let shift = attempt.saturating_sub(1).min(16);
    INITIAL_BACKOFF_MS
        .saturating_mul(1 << shift)
        .min(MAX_BACKOFF_MS)
}

/// Keep a snapshot stream open, reconnecting with backoff whenever it drops.
pub fn connect_with_retry(url: String, on_snapshot: SnapshotCallback, on_status: StatusCallback) {
    spawn_local(async move {
        let mut attempt = 0u32;
        loop {
            on_status(if attempt == 0 {
                StreamStatus::Connecting
            } else {
                StreamStatus::Reconnecting { attempt }
            });

            match stream_once(&url, &on_snapshot, &on_status).await {
                Ok(()) => log::info!("snapshot stream closed by server"),
                Err(err) => log::warn!("snapshot stream error: {err:?}"),
            }

            attempt = attempt.saturating_add(1);
            if attempt > MAX_ATTEMPTS {
                on_status(StreamStatus::Failed);
                break;
            }
            TimeoutFuture::new(backoff_ms(attempt)).await;
        }
    });
}

async fn stream_once(
    url: &str,
    on_snapshot: &SnapshotCallback,
    on_status: &StatusCallback,
) -> Result<(), SnapshotStreamError> {
    let ws = WebSocket::open(url).map_err(|err| SnapshotStreamError::Open(err.to_string()))?;
    let (_, mut read) = ws.split();
    let mut announced = false;

    while let Some(message) = read.next().await {
        let bytes = match message {
            Ok(Message::Text(text)) => text.into_bytes(),
            Ok(Message::Bytes(bytes)) => bytes,
            Err(err) => return Err(SnapshotStreamError::Open(err.to_string())),
        };
        if !announced {
            on_status(StreamStatus::Connected);
            announced = true;
        }
        match decode(&bytes) {
            Ok(snapshot) => on_snapshot(snapshot),
            Err(err) => log::warn!("dropping malformed snapshot: {err:?}"),
        }
    }
    Ok(())
}

fn decode(bytes: &[u8]) -> Result<DashboardSnapshot, SnapshotStreamError> {
    serde_json::from_slice(bytes).map_err(|err| SnapshotStreamError::Deserialize(err.to_string()))
}
