//! Connection handle and its read/write loops

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use super::config::ConnectionConfig;
use super::frame::{Frame, FrameType};
use super::handler::ConnectionHandler;
use super::state::{ConnectionId, ConnectionPhase};
use super::transport::{FrameSink, FrameSource};
use crate::error::{ConnectionError, TransportError};
use crate::stats::{ConnectionCounters, ConnectionStats};

/// Handle to a live duplex connection
///
/// Cloning is cheap; every clone refers to the same connection. The
/// connection runs two tasks: a read loop delivering frames to the handler,
/// and a write loop draining the outbound queue and sending keepalive pings.
/// Either loop failing, or any call to [`close`](Self::close), shuts both
/// down; the write loop then releases the transport and runs the handler's
/// `on_close` once.
#[derive(Clone)]
pub struct Connection {
    inner: Arc<Inner>,
}

struct Inner {
    id: ConnectionId,
    outbound: mpsc::Sender<Bytes>,
    closing: AtomicBool,
    shutdown: watch::Sender<bool>,
    phase: watch::Sender<ConnectionPhase>,
    counters: ConnectionCounters,
}

impl Connection {
    /// Start the read and write loops over an established transport
    ///
    /// Must be called from within a tokio runtime.
    pub fn open<R, W>(
        id: ConnectionId,
        source: R,
        sink: W,
        handler: Arc<dyn ConnectionHandler>,
        config: &ConnectionConfig,
    ) -> Self
    where
        R: FrameSource,
        W: FrameSink,
    {
        let (outbound_tx, outbound_rx) = mpsc::channel(config.outbound_capacity.max(1));
        let (shutdown, _) = watch::channel(false);
        let (phase, _) = watch::channel(ConnectionPhase::Open);

        let conn = Self {
            inner: Arc::new(Inner {
                id,
                outbound: outbound_tx,
                closing: AtomicBool::new(false),
                shutdown,
                phase,
                counters: ConnectionCounters::new(),
            }),
        };

        let read_task = tokio::spawn(read_loop(conn.clone(), source, Arc::clone(&handler)));
        tokio::spawn(write_loop(
            conn.clone(),
            sink,
            outbound_rx,
            read_task,
            handler,
            config.clone(),
        ));

        conn.advance(ConnectionPhase::Active);
        tracing::debug!(connection = %conn.id(), "Connection opened");
        conn
    }

    /// Connection identifier
    pub fn id(&self) -> &ConnectionId {
        &self.inner.id
    }

    /// Queue a text message for the peer
    ///
    /// Waits while the outbound queue is full. Messages are written in the
    /// order they were queued.
    pub async fn write(&self, payload: impl Into<Bytes>) -> Result<(), ConnectionError> {
        if self.is_closed() {
            return Err(ConnectionError::Closed);
        }
        self.inner
            .outbound
            .send(payload.into())
            .await
            .map_err(|_| ConnectionError::Closed)
    }

    /// Queue a text message without waiting
    pub fn try_write(&self, payload: impl Into<Bytes>) -> Result<(), ConnectionError> {
        if self.is_closed() {
            return Err(ConnectionError::Closed);
        }
        self.inner
            .outbound
            .try_send(payload.into())
            .map_err(|e| match e {
                mpsc::error::TrySendError::Full(_) => ConnectionError::QueueFull,
                mpsc::error::TrySendError::Closed(_) => ConnectionError::Closed,
            })
    }

    /// Request shutdown
    ///
    /// Idempotent and non-blocking; safe to call from any task, including
    /// the connection's own handler.
    pub fn close(&self) {
        if !self.inner.closing.swap(true, Ordering::AcqRel) {
            tracing::debug!(connection = %self.id(), "Connection closing");
            self.inner.shutdown.send_replace(true);
        }
    }

    /// Whether shutdown has been requested or has completed
    pub fn is_closed(&self) -> bool {
        self.inner.closing.load(Ordering::Acquire)
    }

    /// Current lifecycle phase
    pub fn phase(&self) -> ConnectionPhase {
        *self.inner.phase.borrow()
    }

    /// Wait until the transport is released and `on_close` has returned
    pub async fn closed(&self) {
        let mut phase = self.inner.phase.subscribe();
        let _ = phase.wait_for(|p| *p == ConnectionPhase::Closed).await;
    }

    /// Statistics snapshot
    pub fn stats(&self) -> ConnectionStats {
        self.inner.counters.snapshot()
    }

    /// Move the phase forward; never backward
    fn advance(&self, next: ConnectionPhase) {
        self.inner.phase.send_if_modified(|phase| {
            if *phase < next {
                *phase = next;
                true
            } else {
                false
            }
        });
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.inner.id)
            .field("phase", &self.phase())
            .finish()
    }
}

async fn read_loop<R: FrameSource>(conn: Connection, mut source: R, handler: Arc<dyn ConnectionHandler>) {
    let mut shutdown = conn.inner.shutdown.subscribe();

    loop {
        let result = tokio::select! {
            biased;
            _ = shutdown_requested(&mut shutdown) => break,
            result = source.read_frame() => result,
        };

        match result {
            Ok(frame) => {
                conn.inner.counters.frame_read();
                let peer_closing = frame.frame_type == FrameType::Close;
                handler.on_read(&conn, frame).await;

                if peer_closing {
                    tracing::debug!(connection = %conn.id(), "Peer sent close");
                    conn.close();
                    break;
                }
            }
            Err(e) => {
                // Peers disconnecting is routine, so this stays at debug
                tracing::debug!(connection = %conn.id(), error = %e, "Read failed");
                conn.close();
                break;
            }
        }
    }
}

async fn write_loop<W: FrameSink>(
    conn: Connection,
    mut sink: W,
    mut outbound: mpsc::Receiver<Bytes>,
    read_task: JoinHandle<()>,
    handler: Arc<dyn ConnectionHandler>,
    config: ConnectionConfig,
) {
    let mut shutdown = conn.inner.shutdown.subscribe();
    let mut keepalive = tokio::time::interval_at(
        Instant::now() + config.ping_interval,
        config.ping_interval,
    );
    keepalive.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = shutdown_requested(&mut shutdown) => break,
            payload = outbound.recv() => {
                let Some(payload) = payload else { break };
                let len = payload.len();

                if let Err(e) = write_with_deadline(&mut sink, Frame::text(payload), config.write_timeout).await {
                    tracing::warn!(connection = %conn.id(), error = %e, "Write failed");
                    break;
                }
                conn.inner.counters.message_written(len);
            }
            _ = keepalive.tick() => {
                if let Err(e) = write_with_deadline(&mut sink, Frame::ping(), config.write_timeout).await {
                    tracing::warn!(connection = %conn.id(), error = %e, "Keepalive failed");
                    break;
                }
                conn.inner.counters.ping_sent();
            }
        }
    }

    conn.close();
    conn.advance(ConnectionPhase::Closing);

    // Reject queued and future writes
    outbound.close();

    match tokio::time::timeout(config.write_timeout, sink.close()).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::debug!(connection = %conn.id(), error = %e, "Transport close failed"),
        Err(_) => tracing::debug!(connection = %conn.id(), "Transport close timed out"),
    }
    drop(sink);

    if let Err(e) = read_task.await {
        tracing::warn!(connection = %conn.id(), error = %e, "Read loop panicked");
    }

    handler.on_close(&conn).await;
    conn.advance(ConnectionPhase::Closed);

    let stats = conn.stats();
    tracing::debug!(
        connection = %conn.id(),
        messages = stats.messages_written,
        bytes = stats.bytes_written,
        duration_ms = stats.duration.as_millis() as u64,
        "Connection closed"
    );
}

/// Resolve once shutdown has been signalled
async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|closing| *closing).await;
}

async fn write_with_deadline<W: FrameSink>(
    sink: &mut W,
    frame: Frame,
    deadline: Duration,
) -> Result<(), TransportError> {
    match tokio::time::timeout(deadline, sink.write_frame(frame)).await {
        Ok(result) => result,
        Err(_) => Err(TransportError::Timeout(deadline)),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use async_trait::async_trait;

    use super::*;
    use crate::connection::handler::NoopHandler;
    use crate::connection::transport::{channel_transport, Peer};

    /// Records reads and counts closes
    #[derive(Default)]
    struct Recorder {
        reads: tokio::sync::Mutex<Vec<Frame>>,
        closes: AtomicUsize,
    }

    #[async_trait]
    impl ConnectionHandler for Recorder {
        async fn on_read(&self, _conn: &Connection, frame: Frame) {
            self.reads.lock().await.push(frame);
        }

        async fn on_close(&self, _conn: &Connection) {
            self.closes.fetch_add(1, Ordering::SeqCst);
        }
    }

    /// Sink that never completes a write
    struct StalledSink;

    #[async_trait]
    impl FrameSink for StalledSink {
        async fn write_frame(&mut self, _frame: Frame) -> Result<(), TransportError> {
            std::future::pending().await
        }

        async fn close(&mut self) -> Result<(), TransportError> {
            Ok(())
        }
    }

    fn fast_config() -> ConnectionConfig {
        ConnectionConfig::default()
            .write_timeout(Duration::from_millis(50))
            .ping_interval(Duration::from_secs(30))
    }

    fn open_with(handler: Arc<dyn ConnectionHandler>, config: &ConnectionConfig) -> (Connection, Peer) {
        let (source, sink, peer) = channel_transport(64);
        let conn = Connection::open(ConnectionId::new("test"), source, sink, handler, config);
        (conn, peer)
    }

    async fn settle(conn: &Connection) {
        tokio::time::timeout(Duration::from_secs(2), conn.closed())
            .await
            .expect("connection did not close");
    }

    #[tokio::test]
    async fn test_writes_arrive_in_order() {
        let (conn, mut peer) = open_with(Arc::new(NoopHandler), &fast_config());
        assert_eq!(conn.phase(), ConnectionPhase::Active);

        for i in 0..20 {
            conn.write(format!("msg-{}", i)).await.unwrap();
        }
        for i in 0..20 {
            let frame = peer.recv_data().await.unwrap();
            assert_eq!(frame, Frame::text(format!("msg-{}", i)));
        }

        let stats = conn.stats();
        assert_eq!(stats.messages_written, 20);
    }

    #[tokio::test]
    async fn test_reads_reach_handler() {
        let recorder = Arc::new(Recorder::default());
        let (conn, peer) = open_with(recorder.clone(), &fast_config());

        peer.send(Frame::text("hello")).await.unwrap();
        peer.send(Frame::binary(vec![1u8, 2])).await.unwrap();

        tokio::time::timeout(Duration::from_secs(2), async {
            while recorder.reads.lock().await.len() < 2 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();

        let reads = recorder.reads.lock().await;
        assert_eq!(reads[0], Frame::text("hello"));
        assert_eq!(reads[1].frame_type, FrameType::Binary);
        assert!(!conn.is_closed());
    }

    #[tokio::test]
    async fn test_concurrent_close_runs_handler_once() {
        let recorder = Arc::new(Recorder::default());
        let (conn, _peer) = open_with(recorder.clone(), &fast_config());

        let mut tasks = Vec::new();
        for _ in 0..8 {
            let conn = conn.clone();
            tasks.push(tokio::spawn(async move { conn.close() }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        settle(&conn).await;
        conn.close();

        assert_eq!(recorder.closes.load(Ordering::SeqCst), 1);
        assert_eq!(conn.phase(), ConnectionPhase::Closed);
    }

    #[tokio::test]
    async fn test_peer_hang_up_closes() {
        let recorder = Arc::new(Recorder::default());
        let (conn, mut peer) = open_with(recorder.clone(), &fast_config());

        peer.hang_up();
        settle(&conn).await;

        assert!(conn.is_closed());
        assert_eq!(recorder.closes.load(Ordering::SeqCst), 1);
        assert_eq!(conn.write("late").await, Err(ConnectionError::Closed));
        assert_eq!(conn.try_write("late"), Err(ConnectionError::Closed));
    }

    #[tokio::test]
    async fn test_peer_close_frame_closes() {
        let recorder = Arc::new(Recorder::default());
        let (conn, peer) = open_with(recorder.clone(), &fast_config());

        peer.send(Frame::close()).await.unwrap();
        settle(&conn).await;

        assert_eq!(recorder.reads.lock().await.len(), 1);
        assert_eq!(recorder.closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_write_failure_closes() {
        let recorder = Arc::new(Recorder::default());
        let (conn, peer) = open_with(recorder.clone(), &fast_config());

        drop(peer);
        // The read side sees the hang-up too; either loop may notice first
        let _ = conn.write("into the void").await;
        settle(&conn).await;

        assert_eq!(recorder.closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_write_deadline_closes() {
        let recorder = Arc::new(Recorder::default());
        let (source, _sink, _peer) = channel_transport(8);
        let conn = Connection::open(
            ConnectionId::new("stalled"),
            source,
            StalledSink,
            recorder.clone(),
            &fast_config(),
        );

        conn.write("stuck").await.unwrap();
        settle(&conn).await;

        assert_eq!(recorder.closes.load(Ordering::SeqCst), 1);
        assert_eq!(conn.stats().messages_written, 0);
    }

    #[tokio::test]
    async fn test_keepalive_ping() {
        let config = ConnectionConfig::default()
            .write_timeout(Duration::from_millis(20))
            .ping_interval(Duration::from_millis(40));
        let (conn, mut peer) = open_with(Arc::new(NoopHandler), &config);

        let frame = tokio::time::timeout(Duration::from_secs(2), peer.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(frame.frame_type, FrameType::Ping);
        assert!(conn.stats().pings_sent >= 1);
    }

    #[tokio::test]
    async fn test_try_write_queue_full() {
        let config = ConnectionConfig::default()
            .outbound_capacity(1)
            .write_timeout(Duration::from_secs(5))
            .ping_interval(Duration::from_secs(30));
        let (source, _sink, _peer) = channel_transport(8);
        let conn = Connection::open(
            ConnectionId::new("full"),
            source,
            StalledSink,
            Arc::new(NoopHandler),
            &config,
        );

        // First message is taken by the write loop, which then stalls
        conn.try_write("one").unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        conn.try_write("two").unwrap();

        assert_eq!(conn.try_write("three"), Err(ConnectionError::QueueFull));
        conn.close();
    }

    #[tokio::test]
    async fn test_close_from_handler() {
        struct CloseOnRead;

        #[async_trait]
        impl ConnectionHandler for CloseOnRead {
            async fn on_read(&self, conn: &Connection, _frame: Frame) {
                conn.close();
            }
        }

        let (conn, peer) = open_with(Arc::new(CloseOnRead), &fast_config());
        peer.send(Frame::text("bye")).await.unwrap();

        settle(&conn).await;
        assert!(conn.is_closed());
    }

    #[tokio::test]
    async fn test_close_releases_transport() {
        let (conn, mut peer) = open_with(Arc::new(NoopHandler), &fast_config());

        conn.close();
        settle(&conn).await;

        assert_eq!(peer.recv().await.map(|f| f.frame_type), Some(FrameType::Close));
        assert_eq!(peer.recv().await, None);
    }
}
