//! A Socket.IO v4 compatible realtime pub/sub server over WebSocket.
//!
//! Clients connect over the Engine.IO v4 session protocol (provided by the
//! `socketry-engine` crate), multiplex logical channels (namespaces) over a
//! single connection, join named rooms and exchange named events with
//! optional acknowledgements. Broadcasts fan an encoded packet out to the
//! sockets selected by a room union minus an exclusion set.
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use serde_json::Value;
//! use socketry::{handler::AckSender, socket::Socket, Server};
//!
//! let (svc, server) = Server::new();
//! server.on_connect(|socket: Arc<Socket>| {
//!     socket.on("join", |socket: Arc<Socket>, args: Vec<Value>, _: Option<AckSender>| {
//!         if let Some(room) = args.first().and_then(Value::as_str) {
//!             socket.join(room.to_string());
//!         }
//!     });
//!     socket.on("chat", |socket: Arc<Socket>, args: Vec<Value>, _: Option<AckSender>| {
//!         let msg = args.first().cloned().unwrap_or(Value::Null);
//!         socket.to("room1").except([socket.id]).emit("chat", msg).ok();
//!     });
//! });
//! // mount `svc` on a hyper server with `.with_upgrades()`
//! ```

pub mod ack;
pub mod adapter;
pub mod config;
pub mod errors;
pub mod handler;
pub mod ns;
pub mod operators;
pub mod packet;
pub mod service;
pub mod socket;

mod server;

pub use config::Config;
pub use errors::{AckError, BroadcastError, SendError};
pub use server::Server;
pub use service::SocketryService;
pub use socketry_engine::{CloseReason, Sid};
