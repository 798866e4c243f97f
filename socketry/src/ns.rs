use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use serde::Serialize;
use tracing::debug;

use crate::{
    adapter::{Adapter, MemoryAdapter},
    config::Config,
    errors::BroadcastError,
    handler::ConnectHandler,
    operators::{BroadcastOperator, RoomParam},
    packet::{Packet, PacketData},
    socket::Socket,
};
use socketry_engine::{CloseReason, Session, Sid};

/// A named logical channel multiplexed over every connection. Owns the
/// socket directory for the channel and its [`Adapter`].
///
/// Namespaces are created on first reference and never destroyed; the
/// default namespace `/` exists from server start.
pub struct Namespace<A: Adapter = MemoryAdapter> {
    /// The namespace path, always starting with `/`.
    pub path: Cow<'static, str>,
    pub(crate) adapter: A,
    connect_handler: RwLock<Option<Arc<dyn ConnectHandler<A>>>>,
    sockets: RwLock<HashMap<Sid, Arc<Socket<A>>>>,
}

impl<A: Adapter> Namespace<A> {
    pub(crate) fn new(path: Cow<'static, str>) -> Arc<Self> {
        Arc::new_cyclic(|ns| Self {
            path,
            adapter: A::new(ns.clone()),
            connect_handler: RwLock::new(None),
            sockets: RwLock::new(HashMap::new()),
        })
    }

    /// Sets the handler called for every socket admitted to this namespace.
    pub fn on_connect<C: ConnectHandler<A>>(&self, handler: C) {
        self.connect_handler.write().unwrap().replace(Arc::new(handler));
    }

    /// Admits a session: builds its socket, registers it, auto-joins the
    /// room named after the socket id and sends the connect acknowledgement.
    pub(crate) fn connect(self: &Arc<Self>, session: Arc<Session>, config: Arc<Config>) {
        let socket = Arc::new(Socket::new(self.clone(), session, config));
        self.sockets.write().unwrap().insert(socket.id, socket.clone());

        // the self room makes direct messages a plain broadcast
        socket.join(socket.id);

        if let Err(e) = socket.send(Packet::connect(self.path.clone(), socket.id)) {
            debug!(
                "[sid={}] error sending connect packet: {}, disconnecting",
                socket.id, e
            );
            socket.disconnect();
            return;
        }

        if let Some(handler) = self.connect_handler.read().unwrap().clone() {
            handler.call(socket);
        }
    }

    /// Routes an inbound packet to the target socket.
    pub(crate) fn recv(&self, sid: Sid, data: PacketData) {
        match self.get_socket(sid) {
            Some(socket) => socket.recv(data),
            None => debug!("[sid={sid}] no socket in namespace {}", self.path),
        }
    }

    /// Drops the socket from the directory and scrubs it from the adapter.
    pub(crate) fn remove_socket(&self, sid: Sid) {
        self.sockets.write().unwrap().remove(&sid);
        self.adapter.remove_all(sid);
    }

    /// Whether a socket with this id is connected to the namespace.
    pub fn has(&self, sid: Sid) -> bool {
        self.sockets.read().unwrap().contains_key(&sid)
    }

    pub fn get_socket(&self, sid: Sid) -> Option<Arc<Socket<A>>> {
        self.sockets.read().unwrap().get(&sid).cloned()
    }

    /// Every socket currently connected to the namespace.
    pub fn sockets(&self) -> Vec<Arc<Socket<A>>> {
        self.sockets.read().unwrap().values().cloned().collect()
    }

    /// Selects rooms to broadcast to.
    pub fn to(self: &Arc<Self>, rooms: impl RoomParam) -> BroadcastOperator<A> {
        BroadcastOperator::new(self.clone()).to(rooms)
    }

    /// Broadcasts an event to every socket in the namespace.
    pub fn emit(
        self: &Arc<Self>,
        event: impl Into<Cow<'static, str>>,
        data: impl Serialize,
    ) -> Result<(), BroadcastError> {
        BroadcastOperator::new(self.clone()).emit(event, data)
    }

    /// Closes every session in the namespace, then the adapter.
    pub(crate) fn close(&self) {
        debug!("closing namespace {}", self.path);
        for socket in self.sockets() {
            socket.session().close(CloseReason::ServerShutdown);
        }
        self.adapter.close();
    }
}

impl<A: Adapter> std::fmt::Debug for Namespace<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Namespace")
            .field("path", &self.path)
            .field("sockets", &self.sockets.read().unwrap().len())
            .finish()
    }
}

#[cfg(test)]
impl Namespace<MemoryAdapter> {
    pub(crate) fn new_dummy() -> Arc<Self> {
        Namespace::new(Cow::Borrowed("/"))
    }

    /// Builds a socket over a dummy session and registers it. The returned
    /// receiver observes everything the socket would have written to its
    /// WebSocket.
    pub(crate) fn add_dummy_socket(
        self: &Arc<Self>,
    ) -> (
        Arc<Socket<MemoryAdapter>>,
        tokio::sync::mpsc::Receiver<socketry_engine::packet::Packet>,
    ) {
        let (session, rx) = Session::new_dummy(Box::new(|_, _| {}));
        let socket = Arc::new(Socket::new(
            self.clone(),
            session,
            Arc::new(Config::default()),
        ));
        self.sockets.write().unwrap().insert(socket.id, socket.clone());
        (socket, rx)
    }
}
