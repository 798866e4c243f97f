use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, RwLock,
};
use std::time::{Duration, Instant};

use tokio::{
    sync::{mpsc, mpsc::error::TrySendError, Mutex},
    task::JoinHandle,
};
use tracing::debug;

use crate::{config::EngineConfig, errors::Error, packet::Packet, sid::Sid};

/// Why a session reached its terminal state.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// No pong arrived within the timeout after a server ping
    PingTimeout,
    /// The client sent a close packet or closed the WebSocket
    ClientClose,
    /// The WebSocket read side failed
    ReadError,
    /// The WebSocket write side failed
    WriteError,
    /// The application disconnected the socket
    ServerDisconnect,
    /// The server is shutting down
    ServerShutdown,
}

impl std::fmt::Display for CloseReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        use CloseReason::*;
        let str = match self {
            PingTimeout => "ping timeout",
            ClientClose => "client closed",
            ReadError => "read error",
            WriteError => "write error",
            ServerDisconnect => "server disconnect",
            ServerShutdown => "server shutdown",
        };
        f.write_str(str)
    }
}

pub(crate) type CloseFn = Box<dyn Fn(Sid, CloseReason) + Send + Sync>;

/// A [`Session`] is one Engine.IO connection: a bounded outbound queue drained
/// by a writer task, a heartbeat job verifying the client is still there, and
/// a single-shot close latch.
///
/// [`send`](Session::send) never blocks: a full queue fails with
/// [`Error::SlowClient`] and a closed session with [`Error::SessionClosed`].
pub struct Session {
    /// The session id
    pub id: Sid,

    /// Producer side of the outbound queue
    tx: mpsc::Sender<Packet>,
    /// Consumer side, locked by the writer task for the connection lifetime
    pub(crate) internal_rx: Mutex<mpsc::Receiver<Packet>>,

    /// Wakes the heartbeat job when a pong arrives
    pub(crate) pong_tx: mpsc::Sender<()>,
    /// Locked by the heartbeat job for the connection lifetime
    pong_rx: Mutex<mpsc::Receiver<()>>,

    /// Handle to the heartbeat job so it can be stopped on close
    heartbeat_handle: Mutex<Option<JoinHandle<()>>>,

    closed: AtomicBool,
    last_activity: RwLock<Instant>,

    /// Deregisters the session from the engine, called exactly once
    close_fn: CloseFn,
}

impl Session {
    pub(crate) fn new(sid: Sid, config: &EngineConfig, close_fn: CloseFn) -> Self {
        let (tx, internal_rx) = mpsc::channel(config.max_buffer_size);
        let (pong_tx, pong_rx) = mpsc::channel(1);

        Self {
            id: sid,
            tx,
            internal_rx: Mutex::new(internal_rx),
            pong_tx,
            pong_rx: Mutex::new(pong_rx),
            heartbeat_handle: Mutex::new(None),
            closed: AtomicBool::new(false),
            last_activity: RwLock::new(Instant::now()),
            close_fn,
        }
    }

    /// Enqueues a packet for delivery without blocking.
    pub fn send(&self, packet: Packet) -> Result<(), Error> {
        if self.is_closed() {
            return Err(Error::SessionClosed);
        }
        debug!("[sid={}] sending packet: {:?}", self.id, packet);
        self.tx.try_send(packet).map_err(|e| match e {
            TrySendError::Full(_) => Error::SlowClient,
            TrySendError::Closed(_) => Error::SessionClosed,
        })
    }

    /// Enqueues an upper layer message for delivery.
    pub fn emit(&self, msg: String) -> Result<(), Error> {
        self.send(Packet::Message(msg))
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Closes the session. Idempotent: only the first call stops the
    /// heartbeat, hands the writer its close frame and deregisters the
    /// session; later calls return immediately.
    pub fn close(&self, reason: CloseReason) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        debug!("[sid={}] closing session: {}", self.id, reason);
        self.abort_heartbeat();
        if let Err(TrySendError::Full(packet)) = self.tx.try_send(Packet::Close) {
            // the queue is full, the writer is still draining; hand the close
            // frame over asynchronously so it still terminates the connection
            let tx = self.tx.clone();
            tokio::spawn(async move {
                tx.send(packet).await.ok();
            });
        }
        (self.close_fn)(self.id, reason);
    }

    /// Timestamp of the last inbound frame.
    pub fn last_activity(&self) -> Instant {
        *self.last_activity.read().unwrap()
    }

    pub(crate) fn mark_activity(&self) {
        *self.last_activity.write().unwrap() = Instant::now();
    }

    /// Spawns the heartbeat job, keeping its handle for teardown.
    pub(crate) fn spawn_heartbeat(self: Arc<Self>, interval: Duration, timeout: Duration) {
        let session = self.clone();
        let handle = tokio::spawn(async move {
            if let Err(e) = session.heartbeat_job(interval, timeout).await {
                debug!("[sid={}] heartbeat expired: {:?}", session.id, e);
                session.close(CloseReason::PingTimeout);
            }
        });
        self.heartbeat_handle
            .try_lock()
            .expect("heartbeat handle locked only at spawn and close")
            .replace(handle);
    }

    /// Sends a ping every `interval` and expects a pong within `timeout`,
    /// starting the next interval from the pong.
    async fn heartbeat_job(&self, interval: Duration, timeout: Duration) -> Result<(), Error> {
        let mut pong_rx = self
            .pong_rx
            .try_lock()
            .expect("pong receiver locked only by the heartbeat job");
        debug!("[sid={}] heartbeat job started", self.id);
        loop {
            tokio::time::sleep(interval).await;
            // some clients pong early, consume it so the next wait is fresh
            pong_rx.try_recv().ok();
            self.send(Packet::Ping)
                .map_err(|_| Error::HeartbeatTimeout)?;
            tokio::time::timeout(timeout, pong_rx.recv())
                .await
                .map_err(|_| Error::HeartbeatTimeout)?
                .ok_or(Error::HeartbeatTimeout)?;
        }
    }

    fn abort_heartbeat(&self) {
        if let Ok(Some(handle)) = self.heartbeat_handle.try_lock().map(|mut h| h.take()) {
            handle.abort();
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl Session {
    /// Test constructor: the returned receiver observes everything the
    /// session would have written to its WebSocket.
    #[doc(hidden)]
    pub fn new_dummy(
        close_fn: Box<dyn Fn(Sid, CloseReason) + Send + Sync>,
    ) -> (Arc<Session>, mpsc::Receiver<Packet>) {
        let (tx, rx) = mpsc::channel(256);
        let (_, unused_rx) = mpsc::channel(1);
        let (pong_tx, pong_rx) = mpsc::channel(1);

        let session = Arc::new(Session {
            id: Sid::new(),
            tx,
            internal_rx: Mutex::new(unused_rx),
            pong_tx,
            pong_rx: Mutex::new(pong_rx),
            heartbeat_handle: Mutex::new(None),
            closed: AtomicBool::new(false),
            last_activity: RwLock::new(Instant::now()),
            close_fn,
        });
        (session, rx)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[tokio::test]
    async fn send_after_close() {
        let (session, _rx) = Session::new_dummy(Box::new(|_, _| {}));
        session.close(CloseReason::ServerDisconnect);
        assert!(matches!(
            session.emit("hello".to_string()),
            Err(Error::SessionClosed)
        ));
    }

    #[tokio::test]
    async fn slow_client() {
        let config = EngineConfig {
            max_buffer_size: 2,
            ..Default::default()
        };
        let session = Session::new(Sid::new(), &config, Box::new(|_, _| {}));
        session.emit("1".to_string()).unwrap();
        session.emit("2".to_string()).unwrap();
        assert!(matches!(
            session.emit("3".to_string()),
            Err(Error::SlowClient)
        ));
    }

    #[tokio::test]
    async fn idempotent_close() {
        let closed = Arc::new(AtomicUsize::new(0));
        let counter = closed.clone();
        let (session, mut rx) = Session::new_dummy(Box::new(move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        for _ in 0..5 {
            session.close(CloseReason::ClientClose);
        }
        assert_eq!(closed.load(Ordering::SeqCst), 1);

        // at most one close frame went out
        assert_eq!(rx.recv().await, Some(Packet::Close));
        assert!(rx.try_recv().is_err());
    }
}
