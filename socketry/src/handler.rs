//! Handler traits for the three callback points of a socket's life:
//! admission to a namespace, named events and disconnection.
//!
//! All three have blanket impls for plain closures, so registration sites
//! stay free of boilerplate:
//!
//! ```no_run
//! # use std::sync::Arc;
//! # use serde_json::Value;
//! # use socketry::{handler::AckSender, socket::Socket, CloseReason, Server};
//! let (_, server) = Server::new();
//! server.on_connect(|socket: Arc<Socket>| {
//!     socket.on("ping", |socket: Arc<Socket>, _: Vec<Value>, ack: Option<AckSender>| {
//!         if let Some(ack) = ack {
//!             ack.send("pong").ok();
//!         }
//!     });
//!     socket.on_disconnect(|socket: Arc<Socket>, reason: CloseReason| {
//!         println!("socket {} left: {}", socket.id, reason);
//!     });
//! });
//! ```

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use crate::{
    adapter::{Adapter, MemoryAdapter},
    errors::SendError,
    packet::Packet,
    socket::Socket,
};
use socketry_engine::CloseReason;

/// Called when a socket is admitted to a namespace.
pub trait ConnectHandler<A: Adapter>: Send + Sync + 'static {
    fn call(&self, socket: Arc<Socket<A>>);
}

impl<A: Adapter, F> ConnectHandler<A> for F
where
    F: Fn(Arc<Socket<A>>) + Send + Sync + 'static,
{
    fn call(&self, socket: Arc<Socket<A>>) {
        self(socket)
    }
}

/// Called for a named event, with the decoded argument list.
///
/// When the inbound packet carried an ack id, `ack` holds a one-shot
/// [`AckSender`] answering it; otherwise it is `None`. Handlers registered
/// for the same event run in registration order, each in its own task.
pub trait EventHandler<A: Adapter>: Send + Sync + 'static {
    fn call(&self, socket: Arc<Socket<A>>, args: Vec<Value>, ack: Option<AckSender<A>>);
}

impl<A: Adapter, F> EventHandler<A> for F
where
    F: Fn(Arc<Socket<A>>, Vec<Value>, Option<AckSender<A>>) + Send + Sync + 'static,
{
    fn call(&self, socket: Arc<Socket<A>>, args: Vec<Value>, ack: Option<AckSender<A>>) {
        self(socket, args, ack)
    }
}

/// Called when the socket leaves its namespace, with the close reason.
pub trait DisconnectHandler<A: Adapter>: Send + Sync + 'static {
    fn call(&self, socket: Arc<Socket<A>>, reason: CloseReason);
}

impl<A: Adapter, F> DisconnectHandler<A> for F
where
    F: Fn(Arc<Socket<A>>, CloseReason) + Send + Sync + 'static,
{
    fn call(&self, socket: Arc<Socket<A>>, reason: CloseReason) {
        self(socket, reason)
    }
}

/// Answers an event that asked for an acknowledgement.
///
/// Sending replies to the client with an ACK packet carrying the same id.
/// The client ignores duplicate ack ids, so sending more than once is
/// harmless but pointless.
pub struct AckSender<A: Adapter = MemoryAdapter> {
    socket: Arc<Socket<A>>,
    ack_id: i64,
}

impl<A: Adapter> AckSender<A> {
    pub(crate) fn new(socket: Arc<Socket<A>>, ack_id: i64) -> Self {
        Self { socket, ack_id }
    }

    /// Sends the acknowledgement. Non-array data is wrapped into a one
    /// element argument array on the wire.
    pub fn send(&self, data: impl Serialize) -> Result<(), SendError> {
        let data = serde_json::to_value(data)?;
        let packet = Packet::ack(self.socket.ns_path(), data, self.ack_id);
        self.socket.send(packet)
    }
}

impl<A: Adapter> Clone for AckSender<A> {
    fn clone(&self) -> Self {
        Self {
            socket: self.socket.clone(),
            ack_id: self.ack_id,
        }
    }
}

impl<A: Adapter> std::fmt::Debug for AckSender<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AckSender")
            .field("sid", &self.socket.id)
            .field("ack_id", &self.ack_id)
            .finish()
    }
}
