use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::errors::Error;
use crate::sid::Sid;

/// An Engine.IO packet: one ASCII type digit followed by an opaque payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Packet {
    /// Handshake packet carrying the session parameters. Server to client only.
    Open(OpenPacket),
    /// Terminates the session.
    Close,
    /// Liveness probe. The server schedules these; clients may also probe.
    Ping,
    /// Reply to a [`Packet::Ping`].
    Pong,
    /// An upper layer message, opaque to this crate.
    Message(String),
    /// Transport upgrade marker. Recognized but unused: WebSocket is the only
    /// transport and there is nothing to upgrade to.
    Upgrade,
    /// Filler packet from the upgrade dance. Recognized but unused.
    Noop,
}

/// Serialize a [`Packet`] to its wire form.
impl TryInto<String> for Packet {
    type Error = Error;
    fn try_into(self) -> Result<String, Self::Error> {
        let res = match self {
            Packet::Open(open) => "0".to_string() + &serde_json::to_string(&open)?,
            Packet::Close => "1".to_string(),
            Packet::Ping => "2".to_string(),
            Packet::Pong => "3".to_string(),
            Packet::Message(msg) => "4".to_string() + &msg,
            Packet::Upgrade => "5".to_string(),
            Packet::Noop => "6".to_string(),
        };
        Ok(res)
    }
}

/// Deserialize a [`Packet`] from its wire form. The type byte must be in
/// `'0'..='6'`; everything after it is the payload.
impl TryFrom<&str> for Packet {
    type Error = Error;
    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let mut chars = value.chars();
        let packet_type = chars.next().ok_or(Error::InvalidPacket)?;
        let packet_data = chars.as_str();
        let res = match packet_type {
            '0' => Packet::Open(serde_json::from_str(packet_data)?),
            '1' => Packet::Close,
            '2' => Packet::Ping,
            '3' => Packet::Pong,
            '4' => Packet::Message(packet_data.to_string()),
            '5' => Packet::Upgrade,
            '6' => Packet::Noop,
            _ => return Err(Error::InvalidPacket),
        };
        Ok(res)
    }
}

impl TryFrom<String> for Packet {
    type Error = Error;
    fn try_from(value: String) -> Result<Self, Self::Error> {
        Packet::try_from(value.as_str())
    }
}

/// The handshake payload of an [`Packet::Open`], advertised to the client as
/// JSON. The upgrade list is always empty: WebSocket is the only transport.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OpenPacket {
    sid: Sid,
    upgrades: Vec<String>,
    ping_interval: u64,
    ping_timeout: u64,
    max_payload: u64,
}

impl OpenPacket {
    pub fn new(sid: Sid, config: &EngineConfig) -> Self {
        OpenPacket {
            sid,
            upgrades: vec![],
            ping_interval: config.ping_interval.as_millis() as u64,
            ping_timeout: config.ping_timeout.as_millis() as u64,
            max_payload: config.max_payload,
        }
    }
}
