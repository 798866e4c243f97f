//! A [`Socket`] is the per-connection Socket.IO state within one namespace:
//! its event handler table, ack correlation state, joined rooms and
//! per-socket key/value store.

use std::borrow::Cow;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use dashmap::DashMap;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::oneshot;
use tracing::debug;

use crate::{
    ack::AckResponse,
    adapter::{Adapter, MemoryAdapter, Room},
    config::Config,
    errors::SendError,
    handler::{AckSender, DisconnectHandler, EventHandler},
    ns::Namespace,
    operators::{BroadcastOperator, RoomParam},
    packet::{Packet, PacketData},
};
use socketry_engine::{CloseReason, Session, Sid};

/// A client connected to one namespace.
///
/// The socket id equals the underlying session id. Sockets are handed to
/// application code as `Arc<Socket>` through the connect handler and every
/// event callback.
pub struct Socket<A: Adapter = MemoryAdapter> {
    /// The socket id, equal to its session id.
    pub id: Sid,

    pub(crate) ns: Arc<Namespace<A>>,
    session: Arc<Session>,
    config: Arc<Config>,

    handlers: RwLock<HashMap<Cow<'static, str>, Vec<Arc<dyn EventHandler<A>>>>>,
    disconnect_handlers: RwLock<Vec<Arc<dyn DisconnectHandler<A>>>>,

    ack_counter: AtomicI64,
    pending_acks: Mutex<HashMap<i64, oneshot::Sender<Value>>>,

    joined_rooms: RwLock<HashSet<Room>>,
    data: DashMap<String, Value>,
}

impl<A: Adapter> Socket<A> {
    pub(crate) fn new(ns: Arc<Namespace<A>>, session: Arc<Session>, config: Arc<Config>) -> Self {
        Self {
            id: session.id,
            ns,
            session,
            config,
            handlers: RwLock::new(HashMap::new()),
            disconnect_handlers: RwLock::new(Vec::new()),
            ack_counter: AtomicI64::new(0),
            pending_acks: Mutex::new(HashMap::new()),
            joined_rooms: RwLock::new(HashSet::new()),
            data: DashMap::new(),
        }
    }

    /// Registers a handler for `event`. Multiple handlers may be registered
    /// for the same event; they are dispatched in registration order, each
    /// in its own task.
    pub fn on<H: EventHandler<A>>(&self, event: impl Into<Cow<'static, str>>, handler: H) {
        self.handlers
            .write()
            .unwrap()
            .entry(event.into())
            .or_default()
            .push(Arc::new(handler));
    }

    /// Removes every handler registered for `event`.
    pub fn off(&self, event: &str) {
        self.handlers.write().unwrap().remove(event);
    }

    /// Appends a listener invoked when the socket leaves its namespace.
    pub fn on_disconnect<H: DisconnectHandler<A>>(&self, handler: H) {
        self.disconnect_handlers.write().unwrap().push(Arc::new(handler));
    }

    /// Emits an event to the client. Array-like data counts as multiple
    /// arguments; wrap an array in another array to send it as the first
    /// argument.
    pub fn emit(
        &self,
        event: impl Into<Cow<'static, str>>,
        data: impl Serialize,
    ) -> Result<(), SendError> {
        let data = serde_json::to_value(data)?;
        self.send(Packet::event(self.ns_path(), event.into(), data))
    }

    /// Emits an event carrying a freshly allocated ack id and returns the
    /// future resolving with the client's reply.
    ///
    /// The future yields [`AckError::Timeout`](crate::AckError::Timeout)
    /// after the configured ack timeout; a reply to an id that already
    /// resolved is dropped.
    pub fn emit_with_ack(
        &self,
        event: impl Into<Cow<'static, str>>,
        data: impl Serialize,
    ) -> Result<AckResponse, SendError> {
        let data = serde_json::to_value(data)?;
        let ack_id = self.ack_counter.fetch_add(1, Ordering::SeqCst);
        let mut packet = Packet::event(self.ns_path(), event.into(), data);
        packet.inner.set_ack_id(ack_id);

        let (tx, rx) = oneshot::channel();
        self.pending_acks.lock().unwrap().insert(ack_id, tx);
        if let Err(e) = self.send(packet) {
            self.pending_acks.lock().unwrap().remove(&ack_id);
            return Err(e);
        }
        Ok(AckResponse::new(rx, self.config.ack_timeout))
    }

    /// Joins the given room(s), creating them as needed.
    pub fn join(&self, rooms: impl RoomParam) {
        for room in rooms.into_room_iter() {
            self.joined_rooms.write().unwrap().insert(room.clone());
            self.ns.adapter.add(self.id, room);
        }
    }

    /// Leaves the given room(s).
    pub fn leave(&self, rooms: impl RoomParam) {
        for room in rooms.into_room_iter() {
            self.joined_rooms.write().unwrap().remove(&room);
            self.ns.adapter.remove(self.id, &room);
        }
    }

    /// Snapshot of the rooms this socket has joined.
    pub fn rooms(&self) -> Vec<Room> {
        self.joined_rooms.read().unwrap().iter().cloned().collect()
    }

    /// Stores a value in the per-socket key/value store.
    pub fn set(&self, key: impl Into<String>, value: impl Serialize) -> Result<(), serde_json::Error> {
        self.data.insert(key.into(), serde_json::to_value(value)?);
        Ok(())
    }

    /// Reads a value from the per-socket key/value store.
    pub fn get(&self, key: &str) -> Option<Value> {
        self.data.get(key).map(|value| value.value().clone())
    }

    /// Selects rooms to broadcast to within this socket's namespace.
    pub fn to(&self, rooms: impl RoomParam) -> BroadcastOperator<A> {
        BroadcastOperator::new(self.ns.clone()).to(rooms)
    }

    /// Excludes socket ids from a namespace-wide broadcast.
    pub fn except(&self, sids: impl IntoIterator<Item = Sid>) -> BroadcastOperator<A> {
        BroadcastOperator::new(self.ns.clone()).except(sids)
    }

    /// Everyone in the namespace except this socket.
    pub fn broadcast(&self) -> BroadcastOperator<A> {
        BroadcastOperator::new(self.ns.clone()).except([self.id])
    }

    /// Closes the underlying session with reason `"server disconnect"`.
    pub fn disconnect(&self) {
        self.session.close(CloseReason::ServerDisconnect);
    }

    /// Whether the underlying session is still open.
    pub fn connected(&self) -> bool {
        !self.session.is_closed()
    }

    /// The namespace this socket belongs to.
    pub fn ns(&self) -> &Arc<Namespace<A>> {
        &self.ns
    }

    pub(crate) fn ns_path(&self) -> Cow<'static, str> {
        self.ns.path.clone()
    }

    pub(crate) fn session(&self) -> &Arc<Session> {
        &self.session
    }

    pub(crate) fn send(&self, packet: Packet) -> Result<(), SendError> {
        let data: String = packet.try_into()?;
        self.send_raw(data)
    }

    /// Enqueues an already encoded packet, wrapped in an engine message.
    pub(crate) fn send_raw(&self, data: String) -> Result<(), SendError> {
        self.session.emit(data)?;
        Ok(())
    }

    /// Dispatches an inbound packet that was routed to this socket.
    pub(crate) fn recv(self: &Arc<Self>, packet: PacketData) {
        match packet {
            PacketData::Event(event, args, ack_id) => self.recv_event(event, args, ack_id),
            PacketData::EventAck(data, ack_id) => self.recv_ack(data, ack_id),
            PacketData::Disconnect => self.disconnect(),
            // the server is the side that sends these
            PacketData::Connect(_) | PacketData::ConnectError => (),
            PacketData::BinaryEvent | PacketData::BinaryAck => {
                debug!("[sid={}] binary packets are not supported, dropping", self.id);
            }
        }
    }

    fn recv_event(self: &Arc<Self>, event: Cow<'static, str>, args: Value, ack_id: Option<i64>) {
        let args = match args {
            Value::Array(args) => args,
            args => vec![args],
        };
        let ack = ack_id.map(|ack_id| AckSender::new(self.clone(), ack_id));
        let handlers: Vec<_> = self
            .handlers
            .read()
            .unwrap()
            .get(event.as_ref())
            .cloned()
            .unwrap_or_default();
        debug!(
            "[sid={}] dispatching {:?} to {} handlers",
            self.id,
            event,
            handlers.len()
        );
        for handler in handlers {
            let socket = self.clone();
            let args = args.clone();
            let ack = ack.clone();
            tokio::spawn(async move { handler.call(socket, args, ack) });
        }
    }

    fn recv_ack(&self, data: Value, ack_id: i64) {
        // removing first makes a duplicate ack id a no-op
        let Some(tx) = self.pending_acks.lock().unwrap().remove(&ack_id) else {
            debug!("[sid={}] ack {} has no pending entry, dropping", self.id, ack_id);
            return;
        };
        tx.send(data).ok();
    }

    /// Tears the socket down after its session has closed: leave every
    /// room, notify the disconnect listeners, deregister from the
    /// namespace.
    pub(crate) fn close(self: Arc<Self>, reason: CloseReason) {
        debug!("[sid={}] socket closed: {}", self.id, reason);
        for room in self.rooms() {
            self.leave(room);
        }
        let handlers: Vec<_> = self.disconnect_handlers.read().unwrap().clone();
        for handler in handlers {
            let socket = self.clone();
            tokio::spawn(async move { handler.call(socket, reason) });
        }
        self.ns.remove_socket(self.id);
    }
}

impl<A: Adapter> std::fmt::Debug for Socket<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Socket")
            .field("id", &self.id)
            .field("ns", &self.ns.path)
            .field("connected", &self.connected())
            .finish()
    }
}
