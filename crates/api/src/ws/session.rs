//! Reader and writer halves of one duplex session.
//!
//! The writer drains the session's egress buffer onto the transport and
//! pings on an interval. The reader enforces the idle deadline and answers
//! control frames. Whichever half stops first tears the whole session down.

use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::ws::{Message, Utf8Bytes};
use futures::{Sink, SinkExt, Stream, StreamExt};
use synchub_core::frames::{ClientFrame, ServerFrame};
use synchub_db::Store;
use tokio::sync::mpsc;
use tokio::time::{timeout, Instant};
use tokio_util::sync::CancellationToken;

use crate::ws::registry::{SessionHandle, SessionRegistry};

/// Deadlines and intervals of a session.
#[derive(Debug, Clone, Copy)]
pub struct SessionTiming {
    /// Idle time after which the reader gives up.
    pub read_deadline: Duration,
    /// Bound on a single transport write.
    pub write_deadline: Duration,
    /// Interval between transport-level pings. Shorter than `read_deadline`.
    pub ping_interval: Duration,
    /// Minimum gap between `last_seen` writes driven by inbound frames.
    /// Kept under the online window so a quiet but live device stays online.
    pub touch_interval: Duration,
}

impl Default for SessionTiming {
    fn default() -> Self {
        Self {
            read_deadline: Duration::from_secs(60),
            write_deadline: Duration::from_secs(10),
            ping_interval: Duration::from_secs(54),
            touch_interval: Duration::from_secs(30),
        }
    }
}

/// Shared collaborators of every session.
#[derive(Clone)]
pub struct SessionContext {
    pub registry: Arc<SessionRegistry>,
    pub store: Arc<dyn Store>,
    pub timing: SessionTiming,
}

/// Drive a registered session until either half stops, then tear it down.
///
/// `handle` must already be installed in the registry.
pub async fn run<T, E>(
    transport: T,
    handle: SessionHandle,
    egress: mpsc::Receiver<Utf8Bytes>,
    ctx: SessionContext,
) where
    T: Stream<Item = Result<Message, E>> + Sink<Message> + Send + 'static,
    <T as Sink<Message>>::Error: Display + Send,
    E: Display,
{
    let (sink, stream) = transport.split();
    let closed = handle.close_signal();
    let timing = ctx.timing;

    let mut writer = tokio::spawn(write_loop(sink, egress, closed.clone(), timing));
    let reader = read_loop(stream, &handle, closed.clone(), timing, ctx.store.as_ref());
    tokio::pin!(reader);

    let writer_done = tokio::select! {
        _ = &mut reader => false,
        _ = &mut writer => true,
    };

    // Deregister before the transport is closed.
    ctx.registry
        .drop_if_current(handle.device_id, handle.session_id)
        .await;
    closed.cancel();
    if !writer_done {
        let _ = writer.await;
    }

    touch_last_seen(ctx.store.as_ref(), &handle).await;

    let duration_secs = (chrono::Utc::now() - handle.connected_at).num_seconds();
    tracing::info!(
        user_id = %handle.user_id,
        device_id = %handle.device_id,
        session_id = %handle.session_id,
        duration_secs,
        "Session closed",
    );
}

/// Drain `egress` onto `sink` until the session is closed.
async fn write_loop<W>(
    mut sink: W,
    mut egress: mpsc::Receiver<Utf8Bytes>,
    closed: CancellationToken,
    timing: SessionTiming,
) where
    W: Sink<Message> + Unpin,
    W::Error: Display,
{
    let mut ticker =
        tokio::time::interval_at(Instant::now() + timing.ping_interval, timing.ping_interval);

    loop {
        let message = tokio::select! {
            biased;
            _ = closed.cancelled() => break,
            frame = egress.recv() => match frame {
                Some(text) => Message::Text(text),
                None => break,
            },
            _ = ticker.tick() => Message::Ping(Bytes::new()),
        };

        match timeout(timing.write_deadline, sink.send(message)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::debug!(error = %e, "Session write failed");
                return;
            }
            Err(_) => {
                tracing::debug!("Session write timed out");
                return;
            }
        }
    }

    let _ = timeout(timing.write_deadline, sink.send(Message::Close(None))).await;
}

/// Read frames until the transport closes, errors, or stays idle past
/// `read_deadline`. Any frame extends the deadline and, at most once per
/// `touch_interval`, refreshes the device's `last_seen`.
async fn read_loop<R, E>(
    mut stream: R,
    handle: &SessionHandle,
    closed: CancellationToken,
    timing: SessionTiming,
    store: &dyn Store,
) where
    R: Stream<Item = Result<Message, E>> + Unpin,
    E: Display,
{
    let mut last_touch = Instant::now();

    loop {
        let next = tokio::select! {
            _ = closed.cancelled() => return,
            next = timeout(timing.read_deadline, stream.next()) => next,
        };

        let message = match next {
            Err(_) => {
                tracing::debug!(device_id = %handle.device_id, "Session idle timeout");
                return;
            }
            Ok(None) => return,
            Ok(Some(Err(e))) => {
                tracing::debug!(device_id = %handle.device_id, error = %e, "Session read failed");
                return;
            }
            Ok(Some(Ok(message))) => message,
        };

        if last_touch.elapsed() >= timing.touch_interval {
            touch_last_seen(store, handle).await;
            last_touch = Instant::now();
        }

        match message {
            Message::Text(text) => handle_text(handle, text.as_str()),
            Message::Close(_) => return,
            Message::Ping(_) | Message::Pong(_) | Message::Binary(_) => {}
        }
    }
}

async fn touch_last_seen(store: &dyn Store, handle: &SessionHandle) {
    if let Err(e) = store.touch_device(&handle.user_id, handle.device_id).await {
        tracing::warn!(
            device_id = %handle.device_id,
            error = %e,
            "Failed to update last_seen",
        );
    }
}

/// Dispatch one client text frame. Replies are dropped if the buffer is full.
fn handle_text(handle: &SessionHandle, text: &str) {
    let reply = match ClientFrame::decode(text) {
        Some(ClientFrame::Ping) => ServerFrame::Pong,
        Some(ClientFrame::SyncRequest { request_id }) => ServerFrame::SyncAck { request_id },
        Some(ClientFrame::Pong) | Some(ClientFrame::Unknown) | None => return,
    };

    match reply.encode() {
        Ok(json) => {
            if let Err(e) = handle.try_enqueue(json.into()) {
                tracing::debug!(device_id = %handle.device_id, reason = ?e, "Dropped control reply");
            }
        }
        Err(e) => tracing::warn!(error = %e, "Failed to encode control reply"),
    }
}

#[cfg(test)]
mod tests {
    use futures::channel::mpsc as fmpsc;
    use synchub_db::models::device::NewDevice;
    use synchub_db::MemoryStore;
    use uuid::Uuid;

    use super::*;

    fn text(s: &str) -> Result<Message, std::convert::Infallible> {
        Ok(Message::Text(s.to_string().into()))
    }

    #[tokio::test]
    async fn reader_answers_ping_and_sync_request() {
        let (handle, mut rx) = SessionHandle::new(Uuid::new_v4(), "u1".into());
        let inbound = futures::stream::iter(vec![
            text(r#"{"type":"ping"}"#),
            text(r#"{"type":"telemetry"}"#),
            text("not json"),
            text(r#"{"type":"sync_request","request_id":"r1"}"#),
        ]);

        let timing = SessionTiming {
            read_deadline: Duration::from_secs(1),
            ..SessionTiming::default()
        };
        read_loop(inbound, &handle, CancellationToken::new(), timing, &MemoryStore::default()).await;

        assert_eq!(rx.recv().await.unwrap().as_str(), r#"{"type":"pong"}"#);
        let ack: serde_json::Value = serde_json::from_str(rx.recv().await.unwrap().as_str()).unwrap();
        assert_eq!(ack["type"], "sync_ack");
        assert_eq!(ack["request_id"], "r1");
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn reader_stops_after_idle_deadline() {
        let (handle, _rx) = SessionHandle::new(Uuid::new_v4(), "u1".into());
        let inbound = futures::stream::pending::<Result<Message, std::convert::Infallible>>();

        let timing = SessionTiming {
            read_deadline: Duration::from_millis(50),
            ..SessionTiming::default()
        };
        let store = MemoryStore::default();

        let result = timeout(
            Duration::from_secs(1),
            read_loop(inbound, &handle, CancellationToken::new(), timing, &store),
        )
        .await;

        assert!(result.is_ok());
    }

    async fn store_with_device(handle: &SessionHandle) -> MemoryStore {
        let store = MemoryStore::default();
        store
            .register_device(NewDevice {
                id: handle.device_id,
                user_id: handle.user_id.clone(),
                name: "Phone".into(),
                device_type: "mobile".into(),
                platform: "android".into(),
                capabilities: vec![],
            })
            .await
            .unwrap();
        store
    }

    async fn last_seen(store: &MemoryStore, handle: &SessionHandle) -> chrono::DateTime<chrono::Utc> {
        store
            .get_device(&handle.user_id, handle.device_id)
            .await
            .unwrap()
            .unwrap()
            .last_seen
    }

    #[tokio::test]
    async fn inbound_frames_refresh_last_seen() {
        let (handle, _rx) = SessionHandle::new(Uuid::new_v4(), "u1".into());
        let store = store_with_device(&handle).await;
        let before = last_seen(&store, &handle).await;
        tokio::time::sleep(Duration::from_millis(20)).await;

        let timing = SessionTiming {
            touch_interval: Duration::ZERO,
            ..SessionTiming::default()
        };
        let inbound = futures::stream::iter(vec![text(r#"{"type":"pong"}"#)]);
        read_loop(inbound, &handle, CancellationToken::new(), timing, &store).await;

        assert!(last_seen(&store, &handle).await > before);
    }

    #[tokio::test]
    async fn last_seen_writes_are_throttled() {
        let (handle, _rx) = SessionHandle::new(Uuid::new_v4(), "u1".into());
        let store = store_with_device(&handle).await;
        let before = last_seen(&store, &handle).await;
        tokio::time::sleep(Duration::from_millis(20)).await;

        let inbound = futures::stream::iter(vec![
            text(r#"{"type":"ping"}"#),
            text(r#"{"type":"ping"}"#),
        ]);
        read_loop(inbound, &handle, CancellationToken::new(), SessionTiming::default(), &store)
            .await;

        assert_eq!(last_seen(&store, &handle).await, before);
    }

    #[tokio::test]
    async fn writer_drains_then_sends_close_on_cancel() {
        let (sink, mut sent) = fmpsc::unbounded::<Message>();
        let (tx, rx) = mpsc::channel(8);
        let closed = CancellationToken::new();
        tx.send(Utf8Bytes::from_static("one")).await.unwrap();
        tx.send(Utf8Bytes::from_static("two")).await.unwrap();

        let task = tokio::spawn(write_loop(sink, rx, closed.clone(), SessionTiming::default()));
        assert_eq!(sent.next().await, Some(Message::Text(Utf8Bytes::from_static("one"))));
        assert_eq!(sent.next().await, Some(Message::Text(Utf8Bytes::from_static("two"))));

        closed.cancel();
        task.await.unwrap();
        assert_eq!(sent.next().await, Some(Message::Close(None)));
    }

    #[tokio::test]
    async fn writer_pings_on_interval() {
        let (sink, mut sent) = fmpsc::unbounded::<Message>();
        let (_tx, rx) = mpsc::channel(8);
        let timing = SessionTiming {
            ping_interval: Duration::from_millis(20),
            ..SessionTiming::default()
        };

        let task = tokio::spawn(write_loop(sink, rx, CancellationToken::new(), timing));
        let first = timeout(Duration::from_secs(1), sent.next()).await.unwrap();
        assert!(matches!(first, Some(Message::Ping(_))));
        task.abort();
    }
}
