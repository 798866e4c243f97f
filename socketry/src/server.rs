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
    ns::Namespace,
    operators::{BroadcastOperator, RoomParam},
    packet::{Packet, PacketData},
    service::SocketryService,
};
use socketry_engine::{handler::SessionHandler, CloseReason, Session};

/// The top level server: owns the namespace directory and feeds engine
/// sessions into it.
///
/// Construction yields the hyper service to mount and the server handle to
/// keep:
///
/// ```no_run
/// # use std::sync::Arc;
/// # use socketry::Server;
/// let (svc, server): (_, Arc<Server>) = Server::new();
/// // mount `svc`, configure namespaces through `server`
/// ```
pub struct Server<A: Adapter = MemoryAdapter> {
    config: Arc<Config>,
    namespaces: RwLock<HashMap<Cow<'static, str>, Arc<Namespace<A>>>>,
}

impl<A: Adapter> Server<A> {
    /// Creates a server with the default [`Config`]. The default namespace
    /// `/` exists from the start.
    pub fn new() -> (SocketryService<A>, Arc<Self>) {
        Self::with_config(Config::default())
    }

    pub fn with_config(config: Config) -> (SocketryService<A>, Arc<Self>) {
        let engine_config = config.engine.clone();
        let server = Arc::new(Self {
            config: Arc::new(config),
            namespaces: RwLock::new(HashMap::new()),
        });
        server.of("/");
        let svc = SocketryService::with_config(server.clone(), engine_config);
        (svc, server)
    }

    /// Returns the namespace at `path`, creating it on first reference.
    /// Namespaces are never destroyed.
    pub fn of(&self, path: impl Into<Cow<'static, str>>) -> Arc<Namespace<A>> {
        let mut path = path.into();
        if path.is_empty() {
            path = Cow::Borrowed("/");
        }
        if let Some(ns) = self.namespaces.read().unwrap().get(&path) {
            return ns.clone();
        }
        let mut namespaces = self.namespaces.write().unwrap();
        // someone else may have won the race between the two locks
        if let Some(ns) = namespaces.get(&path) {
            return ns.clone();
        }
        debug!("creating namespace {}", path);
        let ns = Namespace::new(path.clone());
        namespaces.insert(path, ns.clone());
        ns
    }

    /// Looks a namespace up without creating it.
    pub fn get_ns(&self, path: &str) -> Option<Arc<Namespace<A>>> {
        self.namespaces.read().unwrap().get(path).cloned()
    }

    /// Registers the connect handler of the default namespace.
    pub fn on_connect<C: ConnectHandler<A>>(&self, handler: C) {
        self.of("/").on_connect(handler);
    }

    /// Selects rooms to broadcast to in the default namespace.
    pub fn to(&self, rooms: impl RoomParam) -> BroadcastOperator<A> {
        self.of("/").to(rooms)
    }

    /// Broadcasts an event to every socket of the default namespace.
    pub fn emit(
        &self,
        event: impl Into<Cow<'static, str>>,
        data: impl Serialize,
    ) -> Result<(), BroadcastError> {
        self.of("/").emit(event, data)
    }

    /// Closes every session with reason `"server shutdown"`, then every
    /// namespace's adapter.
    pub fn close(&self) {
        debug!("closing server");
        let namespaces: Vec<_> = self.namespaces.read().unwrap().values().cloned().collect();
        for ns in namespaces {
            ns.close();
        }
    }
}

/// Engine events feed the namespace layer: new sessions land in the default
/// namespace, inbound connect packets open further namespaces, everything
/// else is routed to the target socket.
impl<A: Adapter> SessionHandler for Server<A> {
    fn on_connect(&self, session: Arc<Session>) {
        debug!("[sid={}] engine session connected", session.id);
        self.of("/").connect(session, self.config.clone());
    }

    fn on_disconnect(&self, session: Arc<Session>, reason: CloseReason) {
        debug!("[sid={}] engine session disconnected: {}", session.id, reason);
        let namespaces: Vec<_> = self.namespaces.read().unwrap().values().cloned().collect();
        for ns in namespaces {
            if let Some(socket) = ns.get_socket(session.id) {
                socket.close(reason);
            }
        }
    }

    fn on_message(&self, msg: String, session: Arc<Session>) {
        let packet = match Packet::try_from(msg.as_str()) {
            Ok(packet) => packet,
            Err(e) => {
                // protocol noise must not kill the session
                debug!("[sid={}] dropping malformed packet: {}", session.id, e);
                return;
            }
        };
        match packet.inner {
            // a connect for a namespace the session already joined is the
            // client echoing the handshake; nothing to do
            PacketData::Connect(_) => {
                let ns = self.of(packet.ns);
                if !ns.has(session.id) {
                    ns.connect(session, self.config.clone());
                }
            }
            inner => match self.get_ns(&packet.ns) {
                Some(ns) => ns.recv(session.id, inner),
                None => debug!(
                    "[sid={}] packet for unknown namespace {}",
                    session.id, packet.ns
                ),
            },
        }
    }
}

impl<A: Adapter> std::fmt::Debug for Server<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("config", &self.config)
            .field("namespaces", &self.namespaces.read().unwrap().len())
            .finish()
    }
}
