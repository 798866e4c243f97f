use std::borrow::Cow;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::Error;
use socketry_engine::Sid;

/// A Socket.IO packet: a type digit, an optional `/namespace,` prefix, an
/// optional decimal ack id and an optional JSON payload.
///
/// The namespace prefix is omitted on the wire when the namespace is `/`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub inner: PacketData,
    pub ns: Cow<'static, str>,
}

impl Packet {
    /// The connect acknowledgement sent when a socket is admitted to a
    /// namespace, carrying its id.
    pub fn connect(ns: impl Into<Cow<'static, str>>, sid: Sid) -> Self {
        let val = serde_json::to_value(ConnectPacket { sid }).unwrap();
        Self {
            inner: PacketData::Connect(Some(val)),
            ns: ns.into(),
        }
    }

    pub fn disconnect(ns: impl Into<Cow<'static, str>>) -> Self {
        Self {
            inner: PacketData::Disconnect,
            ns: ns.into(),
        }
    }

    pub fn event(
        ns: impl Into<Cow<'static, str>>,
        e: impl Into<Cow<'static, str>>,
        data: Value,
    ) -> Self {
        Self {
            inner: PacketData::Event(e.into(), data, None),
            ns: ns.into(),
        }
    }

    pub fn ack(ns: impl Into<Cow<'static, str>>, data: Value, ack_id: i64) -> Self {
        Self {
            inner: PacketData::EventAck(data, ack_id),
            ns: ns.into(),
        }
    }

    pub fn invalid_namespace(ns: impl Into<Cow<'static, str>>) -> Self {
        Self {
            inner: PacketData::ConnectError,
            ns: ns.into(),
        }
    }
}

/// | Type          | ID  | Usage                                             |
/// |---------------|-----|---------------------------------------------------|
/// | CONNECT       | 0   | Connection to a namespace                         |
/// | DISCONNECT    | 1   | Disconnection from a namespace                    |
/// | EVENT         | 2   | A named event with a JSON argument list           |
/// | ACK           | 3   | Acknowledges an event that carried an ack id      |
/// | CONNECT_ERROR | 4   | Refused connection to a namespace                 |
/// | BINARY_EVENT  | 5   | Recognized but not processed                      |
/// | BINARY_ACK    | 6   | Recognized but not processed                      |
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PacketData {
    /// Sent by the server with the socket id; sent by clients to open a
    /// namespace, optionally with an auth payload.
    Connect(Option<Value>),
    Disconnect,
    /// Event name, argument array (without the name) and optional ack id.
    Event(Cow<'static, str>, Value, Option<i64>),
    /// Ack payload and the id it correlates with.
    EventAck(Value, i64),
    ConnectError,
    /// Binary attachments are out of scope; only the type byte is recognized.
    BinaryEvent,
    BinaryAck,
}

impl PacketData {
    fn index(&self) -> char {
        match self {
            PacketData::Connect(_) => '0',
            PacketData::Disconnect => '1',
            PacketData::Event(_, _, _) => '2',
            PacketData::EventAck(_, _) => '3',
            PacketData::ConnectError => '4',
            PacketData::BinaryEvent => '5',
            PacketData::BinaryAck => '6',
        }
    }

    /// Sets the ack id on packets that support one.
    pub(crate) fn set_ack_id(&mut self, ack_id: i64) {
        if let PacketData::Event(_, _, ack) = self {
            *ack = Some(ack_id);
        }
    }
}

/// Serialize a [`Packet`] to its wire form.
impl TryInto<String> for Packet {
    type Error = serde_json::Error;

    fn try_into(self) -> Result<String, Self::Error> {
        use PacketData::*;

        // pre-serialize the payload so the buffer can be sized upfront
        let data = match &self.inner {
            Connect(Some(data)) => Some(serde_json::to_string(data)?),
            Event(e, data, _) => {
                // the wire payload is ["event", ...args]
                let packet = match data {
                    Value::Array(args) if !args.is_empty() => {
                        let mut packet = Vec::with_capacity(args.len() + 1);
                        packet.push(Value::String(e.to_string()));
                        packet.extend(args.iter().cloned());
                        serde_json::to_string(&packet)
                    }
                    Value::Array(_) => serde_json::to_string(&[e]),
                    data => serde_json::to_string(&(e, data)),
                }?;
                Some(packet)
            }
            EventAck(data, _) => {
                // ack payloads are always an array
                let packet = match data {
                    Value::Array(_) => serde_json::to_string(data),
                    Value::Null => Ok("[]".to_string()),
                    data => serde_json::to_string(&[data]),
                }?;
                Some(packet)
            }
            _ => None,
        };

        let capacity = 24 + self.ns.len() + data.as_ref().map_or(0, String::len);
        let mut res = String::with_capacity(capacity);
        res.push(self.inner.index());

        if !self.ns.is_empty() && self.ns != "/" {
            if !self.ns.starts_with('/') {
                res.push('/');
            }
            res.push_str(&self.ns);
            res.push(',');
        }

        match self.inner {
            Connect(Some(_)) => res.push_str(&data.unwrap()),
            Connect(None) | Disconnect | BinaryEvent | BinaryAck => (),
            Event(_, _, ack) => {
                if let Some(ack) = ack {
                    res.push_str(&ack.to_string());
                }
                res.push_str(&data.unwrap());
            }
            EventAck(_, ack) => {
                res.push_str(&ack.to_string());
                res.push_str(&data.unwrap());
            }
            ConnectError => res.push_str("{\"message\":\"Invalid namespace\"}"),
        }
        Ok(res)
    }
}

/// Deserialize a [`Packet`] from its wire form, consuming the input left to
/// right: type digit, then `/namespace,` if present, then a decimal digit run
/// forming the ack id, then the JSON payload.
impl TryFrom<&str> for Packet {
    type Error = Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        // separators are all ASCII, the cursor can walk bytes
        let chars = value.as_bytes();
        let index = *chars.first().ok_or(Error::InvalidPacketType)?;
        if !(b'0'..=b'6').contains(&index) {
            return Err(Error::InvalidPacketType);
        }

        // binary packets carry an attachment count before the namespace;
        // they are recognized by type byte only and never processed
        if index == b'5' || index == b'6' {
            let inner = if index == b'5' {
                PacketData::BinaryEvent
            } else {
                PacketData::BinaryAck
            };
            return Ok(Self {
                inner,
                ns: Cow::Borrowed("/"),
            });
        }

        let mut i = 1;
        let ns: Cow<'static, str> = if chars.get(i) == Some(&b'/') {
            let start = i;
            loop {
                match chars.get(i) {
                    Some(b',') => {
                        let ns = value[start..i].to_string();
                        i += 1;
                        break Cow::Owned(ns);
                    }
                    // some clients omit the comma when the namespace ends
                    // the packet, e.g. `1/custom`
                    None => break Cow::Owned(value[start..i].to_string()),
                    Some(_) => i += 1,
                }
            }
        } else {
            Cow::Borrowed("/")
        };

        let start = i;
        while chars.get(i).is_some_and(u8::is_ascii_digit) {
            i += 1;
        }
        let ack: Option<i64> = if i > start {
            value[start..i].parse().ok()
        } else {
            None
        };

        let data = &value[i..];
        let inner = match index {
            b'0' => PacketData::Connect(if data.is_empty() {
                None
            } else {
                Some(serde_json::from_str(data)?)
            }),
            b'1' => PacketData::Disconnect,
            b'2' => {
                let (event, args) = deserialize_event(data)?;
                PacketData::Event(event.into(), args, ack)
            }
            b'3' => {
                let payload = if data.is_empty() {
                    Value::Array(vec![])
                } else {
                    serde_json::from_str(data)?
                };
                PacketData::EventAck(payload, ack.ok_or(Error::InvalidPacketType)?)
            }
            b'4' => PacketData::ConnectError,
            _ => unreachable!("type byte checked above"),
        };

        Ok(Self { inner, ns })
    }
}

impl TryFrom<String> for Packet {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Packet::try_from(value.as_str())
    }
}

/// An event payload is a JSON array whose first element is the event name.
fn deserialize_event(data: &str) -> Result<(String, Value), Error> {
    let Value::Array(packet) = serde_json::from_str::<Value>(data)? else {
        return Err(Error::InvalidEventName);
    };
    let event = packet
        .first()
        .and_then(Value::as_str)
        .ok_or(Error::InvalidEventName)?
        .to_string();
    let args = Value::from_iter(packet.into_iter().skip(1));
    Ok((event, args))
}

/// Payload of the connect acknowledgement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectPacket {
    pub sid: Sid,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn packet_encode_connect() {
        let sid = Sid::new();
        let packet: String = Packet::connect("/", sid).try_into().unwrap();
        assert_eq!(packet, format!("0{{\"sid\":\"{sid}\"}}"));

        let packet: String = Packet::connect("/admin", sid).try_into().unwrap();
        assert_eq!(packet, format!("0/admin,{{\"sid\":\"{sid}\"}}"));
    }

    #[test]
    fn packet_decode_connect() {
        let sid = Sid::new();
        let packet = Packet::try_from(format!("0{{\"sid\":\"{sid}\"}}")).unwrap();
        assert_eq!(packet, Packet::connect("/", sid));

        let packet = Packet::try_from(format!("0/admin,{{\"sid\":\"{sid}\"}}")).unwrap();
        assert_eq!(packet, Packet::connect("/admin", sid));

        // a client connect may carry no payload at all
        let packet = Packet::try_from("0").unwrap();
        assert!(matches!(packet.inner, PacketData::Connect(None)));
        assert_eq!(packet.ns, "/");

        let packet = Packet::try_from("0/admin,").unwrap();
        assert!(matches!(packet.inner, PacketData::Connect(None)));
        assert_eq!(packet.ns, "/admin");
    }

    #[test]
    fn packet_roundtrip_disconnect() {
        let packet: String = Packet::disconnect("/").try_into().unwrap();
        assert_eq!(packet, "1");
        assert_eq!(Packet::try_from("1").unwrap(), Packet::disconnect("/"));

        let packet: String = Packet::disconnect("/admin").try_into().unwrap();
        assert_eq!(packet, "1/admin,");
        assert_eq!(
            Packet::try_from("1/admin,").unwrap(),
            Packet::disconnect("/admin")
        );

        // namespace without the trailing comma
        assert_eq!(
            Packet::try_from("1/admin").unwrap(),
            Packet::disconnect("/admin")
        );
    }

    #[test]
    fn packet_encode_event() {
        let packet: String = Packet::event("/", "chat", json!(["hi"])).try_into().unwrap();
        assert_eq!(packet, "2[\"chat\",\"hi\"]");

        // a bare value counts as a single argument
        let packet: String = Packet::event("/", "chat", json!({"data": 1}))
            .try_into()
            .unwrap();
        assert_eq!(packet, "2[\"chat\",{\"data\":1}]");

        // empty argument list
        let packet: String = Packet::event("/", "chat", json!([])).try_into().unwrap();
        assert_eq!(packet, "2[\"chat\"]");

        // with an ack id
        let mut packet = Packet::event("/", "chat", json!(["hi"]));
        packet.inner.set_ack_id(7);
        let packet: String = packet.try_into().unwrap();
        assert_eq!(packet, "27[\"chat\",\"hi\"]");

        // with a namespace and an ack id
        let mut packet = Packet::event("/admin", "chat", json!(["hi"]));
        packet.inner.set_ack_id(7);
        let packet: String = packet.try_into().unwrap();
        assert_eq!(packet, "2/admin,7[\"chat\",\"hi\"]");
    }

    #[test]
    fn packet_decode_event() {
        let packet = Packet::try_from("2[\"chat\",\"hi\"]").unwrap();
        assert_eq!(packet, Packet::event("/", "chat", json!(["hi"])));

        // the digit run before the payload is the ack id
        let packet = Packet::try_from("27[\"chat\",\"hi\"]").unwrap();
        let mut expected = Packet::event("/", "chat", json!(["hi"]));
        expected.inner.set_ack_id(7);
        assert_eq!(packet, expected);

        let packet = Packet::try_from("2/admin,7[\"chat\",\"hi\"]").unwrap();
        let mut expected = Packet::event("/admin", "chat", json!(["hi"]));
        expected.inner.set_ack_id(7);
        assert_eq!(packet, expected);

        // digits after the namespace always bind to the ack id first
        let packet = Packet::try_from("2/admin,42[\"n\",3]").unwrap();
        let mut expected = Packet::event("/admin", "n", json!([3]));
        expected.inner.set_ack_id(42);
        assert_eq!(packet, expected);
    }

    #[test]
    fn packet_decode_event_invalid() {
        // event payload must be an array with a string head
        assert!(matches!(
            Packet::try_from("2{\"not\":\"array\"}"),
            Err(Error::InvalidEventName)
        ));
        assert!(matches!(
            Packet::try_from("2[42]"),
            Err(Error::InvalidEventName)
        ));
        assert!(matches!(
            Packet::try_from("2not-json"),
            Err(Error::InvalidJson(_))
        ));
    }

    #[test]
    fn packet_roundtrip_ack() {
        let packet: String = Packet::ack("/", json!("ok"), 7).try_into().unwrap();
        assert_eq!(packet, "37[\"ok\"]");
        assert_eq!(
            Packet::try_from("37[\"ok\"]").unwrap(),
            Packet::ack("/", json!(["ok"]), 7)
        );

        let packet: String = Packet::ack("/admin", json!(["data"]), 54).try_into().unwrap();
        assert_eq!(packet, "3/admin,54[\"data\"]");
        assert_eq!(
            Packet::try_from("3/admin,54[\"data\"]").unwrap(),
            Packet::ack("/admin", json!(["data"]), 54)
        );

        // a null payload collapses to an empty array
        let packet: String = Packet::ack("/", Value::Null, 1).try_into().unwrap();
        assert_eq!(packet, "31[]");

        // large ack ids survive
        let id = (1i64 << 31) - 1;
        let packet: String = Packet::ack("/", json!("x"), id).try_into().unwrap();
        assert_eq!(Packet::try_from(packet).unwrap(), Packet::ack("/", json!(["x"]), id));
    }

    #[test]
    fn packet_decode_ack_requires_id() {
        assert!(matches!(
            Packet::try_from("3[\"ok\"]"),
            Err(Error::InvalidPacketType)
        ));
    }

    #[test]
    fn packet_encode_connect_error() {
        let packet: String = Packet::invalid_namespace("/").try_into().unwrap();
        assert_eq!(packet, "4{\"message\":\"Invalid namespace\"}");

        let packet: String = Packet::invalid_namespace("/admin").try_into().unwrap();
        assert_eq!(packet, "4/admin,{\"message\":\"Invalid namespace\"}");
    }

    #[test]
    fn packet_decode_binary_types() {
        // only the type byte is recognized
        assert!(matches!(
            Packet::try_from("51-[\"event\",{\"_placeholder\":true,\"num\":0}]")
                .unwrap()
                .inner,
            PacketData::BinaryEvent
        ));
        assert!(matches!(
            Packet::try_from("61-54[{\"_placeholder\":true,\"num\":0}]")
                .unwrap()
                .inner,
            PacketData::BinaryAck
        ));
    }

    #[test]
    fn packet_decode_invalid_type() {
        assert!(matches!(
            Packet::try_from(""),
            Err(Error::InvalidPacketType)
        ));
        assert!(matches!(
            Packet::try_from("9"),
            Err(Error::InvalidPacketType)
        ));
        assert!(matches!(
            Packet::try_from("x"),
            Err(Error::InvalidPacketType)
        ));
    }
}
