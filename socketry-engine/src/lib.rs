//! The Engine.IO v4 session layer of the socketry server, over WebSocket only.
//!
//! This crate owns the lower half of the protocol stack: the packet framing
//! (one ASCII type digit plus an opaque payload), the session state machine
//! with its server-originated heartbeat, and the hyper [`EngineService`](service::EngineService)
//! that upgrades HTTP requests into sessions.
//!
//! Upper layers plug in through the [`SessionHandler`](handler::SessionHandler)
//! trait and receive messages, connects and disconnects for every session.

pub mod config;
pub mod errors;
pub mod handler;
pub mod packet;
pub mod service;
pub mod session;
pub mod sid;

mod engine;
mod ws;

pub use engine::Engine;
pub use session::{CloseReason, Session};
pub use sid::Sid;
