use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use bytes::Bytes;
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use tokio::sync::watch;
use tracing::{error, info, trace, warn};

use murmur_types::events::{EventKind, LiveEvent, MessagePayload};

use crate::hub::Hub;

/// Heartbeat interval: server sends a Ping every 15 seconds.
/// If 2 consecutive Pongs are missed (~30s), the connection is dropped.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

/// A write that cannot complete in this long means the peer stopped reading.
const WRITE_TIMEOUT: Duration = Duration::from_secs(10);

/// How much of a rejected frame ends up in the log.
const LOGGED_FRAME_CHARS: usize = 200;

/// Where chat messages arriving over a live connection get persisted.
/// Called on the blocking pool.
pub trait MessageRecorder: Send + Sync + 'static {
    /// Returns whether exactly one message was stored.
    fn record(&self, username: &str, body: &str) -> anyhow::Result<bool>;
}

/// Drive one authenticated WebSocket until either side goes away.
/// `username` is the session identity captured when the socket was upgraded.
pub async fn handle_connection(
    socket: WebSocket,
    hub: Hub,
    recorder: Arc<dyn MessageRecorder>,
    username: String,
) {
    let (mut sender, receiver) = socket.split();

    let (conn_id, mut events) = hub.connect().await;
    info!("{} connected to gateway ({})", username, conn_id);

    let pong_received = Arc::new(AtomicBool::new(true));
    let pong_flag_send = pong_received.clone();
    let pong_flag_recv = pong_received.clone();

    // Forward hub events -> client, with heartbeat
    let mut send_task = tokio::spawn(async move {
        let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
        heartbeat.tick().await;
        let mut missed_heartbeats: u8 = 0;

        loop {
            tokio::select! {
                event = events.recv() => {
                    // None once the hub has dropped this connection
                    let Some(event) = event else { break };

                    let text = match event.to_json() {
                        Ok(text) => text,
                        Err(e) => {
                            error!("Failed to encode live event: {}", e);
                            continue;
                        }
                    };
                    if !write(&mut sender, Message::Text(text.into())).await {
                        break;
                    }
                }
                _ = heartbeat.tick() => {
                    if pong_flag_send.swap(false, Ordering::Acquire) {
                        missed_heartbeats = 0;
                    } else {
                        missed_heartbeats += 1;
                        if missed_heartbeats >= 2 {
                            warn!("Heartbeat timeout (missed {} pongs), dropping connection", missed_heartbeats);
                            break;
                        }
                    }
                    if !write(&mut sender, Message::Ping(Bytes::new())).await {
                        break;
                    }
                }
            }
        }
    });

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut recv_task = tokio::spawn(read_frames(
        receiver,
        shutdown_rx,
        hub.clone(),
        recorder,
        username.clone(),
        pong_flag_recv,
    ));

    // Wait for either task to finish. The reader is asked to stop rather
    // than aborted, so a frame it is already handling still goes out.
    tokio::select! {
        _ = &mut send_task => {
            let _ = shutdown_tx.send(true);
            let _ = recv_task.await;
        }
        _ = &mut recv_task => send_task.abort(),
    }

    hub.disconnect(conn_id).await;
    info!("{} disconnected from gateway ({})", username, conn_id);
}

/// Write one message, giving up on a peer that stops reading.
async fn write<S>(sender: &mut S, msg: Message) -> bool
where
    S: Sink<Message> + Unpin,
{
    matches!(tokio::time::timeout(WRITE_TIMEOUT, sender.send(msg)).await, Ok(Ok(())))
}

/// Read frames from the client, one at a time in arrival order, until the
/// stream ends or `shutdown` flips. Shutdown is only observed between
/// frames.
async fn read_frames<S, E>(
    mut frames: S,
    mut shutdown: watch::Receiver<bool>,
    hub: Hub,
    recorder: Arc<dyn MessageRecorder>,
    username: String,
    pong_received: Arc<AtomicBool>,
) where
    S: Stream<Item = Result<Message, E>> + Unpin,
{
    loop {
        let next = tokio::select! {
            next = frames.next() => next,
            _ = shutdown.changed() => break,
        };

        match next {
            Some(Ok(Message::Text(text))) => {
                handle_frame(&hub, &recorder, &username, text.as_str()).await;
            }
            Some(Ok(Message::Pong(_))) => {
                pong_received.store(true, Ordering::Release);
            }
            Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
            Some(Ok(_)) => {}
        }
    }
}

/// Decode one text frame from `username` and relay it. Chat messages are
/// stored before they are broadcast; a message that cannot be stored is
/// dropped. Returns how many connections the frame reached, or `None` if it
/// was dropped.
pub async fn handle_frame(
    hub: &Hub,
    recorder: &Arc<dyn MessageRecorder>,
    username: &str,
    text: &str,
) -> Option<usize> {
    let event: LiveEvent = match serde_json::from_str(text) {
        Ok(event) => event,
        Err(e) => {
            let raw: String = text.chars().take(LOGGED_FRAME_CHARS).collect();
            warn!("{} bad frame: {} -- raw: {}", username, e, raw);
            return None;
        }
    };

    match event.event {
        EventKind::IncomingMessage => {
            let payload = match MessagePayload::from_event(&event) {
                Ok(payload) => payload,
                Err(e) => {
                    warn!("{} sent a message without a text body: {}", username, e);
                    return None;
                }
            };

            let recorder = recorder.clone();
            let sender = username.to_string();
            let stored =
                tokio::task::spawn_blocking(move || recorder.record(&sender, &payload.body)).await;

            match stored {
                Ok(Ok(true)) => {}
                Ok(Ok(false)) => {
                    warn!("Message from {} was not stored, dropping", username);
                    return None;
                }
                Ok(Err(e)) => {
                    error!("Failed to store message from {}: {}", username, e);
                    return None;
                }
                Err(e) => {
                    error!("spawn_blocking join error: {}", e);
                    return None;
                }
            }
        }
        EventKind::Typing => {
            trace!("{} is typing", username);
        }
    }

    Some(hub.broadcast(event).await)
}
