use std::{
    fmt::{Debug, Display, Formatter},
    str::FromStr,
};

use base64::Engine;
use rand::Rng;

/// A 128 bit session id, rendered as a 22 char unpadded base64url string.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Sid([u8; 22]);

impl Sid {
    /// Generates a new random session id from 16 random bytes.
    pub fn new() -> Self {
        let mut random = [0u8; 16];
        let mut id = [0u8; 22];

        rand::thread_rng().fill(&mut random);

        base64::prelude::BASE64_URL_SAFE_NO_PAD
            .encode_slice(random, &mut id)
            .unwrap();

        Sid(id)
    }

    fn as_str(&self) -> &str {
        // SAFETY: the buffer only ever holds base64url chars
        unsafe { std::str::from_utf8_unchecked(&self.0) }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SidDecodeError {
    #[error("invalid sid length")]
    InvalidLength,
    #[error("invalid url base64 string")]
    InvalidBase64String,
}

impl FromStr for Sid {
    type Err = SidDecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        use SidDecodeError::*;

        if s.len() != 22 {
            return Err(InvalidLength);
        }

        let mut id = [0u8; 22];
        for (i, byte) in s.as_bytes().iter().enumerate() {
            if byte.is_ascii_alphanumeric() || *byte == b'_' || *byte == b'-' {
                id[i] = *byte;
            } else {
                return Err(InvalidBase64String);
            }
        }
        Ok(Sid(id))
    }
}

impl Default for Sid {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for Sid {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Debug for Sid {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl serde::Serialize for Sid {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

struct SidVisitor;
impl serde::de::Visitor<'_> for SidVisitor {
    type Value = Sid;

    fn expecting(&self, formatter: &mut Formatter) -> std::fmt::Result {
        formatter.write_str("a valid sid")
    }

    fn visit_str<E: serde::de::Error>(self, v: &str) -> Result<Self::Value, E> {
        Sid::from_str(v).map_err(serde::de::Error::custom)
    }
}
impl<'de> serde::Deserialize<'de> for Sid {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_str(SidVisitor)
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::Sid;

    #[test]
    fn sid_roundtrip() {
        let id = Sid::new();
        assert_eq!(id.to_string().len(), 22);
        let id2 = Sid::from_str(&id.to_string()).unwrap();
        assert_eq!(id, id2);
    }

    #[test]
    fn sid_from_str_invalid() {
        let err = Sid::from_str("too-short").unwrap_err();
        assert_eq!(err.to_string(), "invalid sid length");
        let err = Sid::from_str("aaaaaaaaaaaaaaaaaaaa{}").unwrap_err();
        assert_eq!(err.to_string(), "invalid url base64 string");
    }

    #[test]
    fn sid_serde() {
        let id = Sid::new();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{id}\""));
        let back: Sid = serde_json::from_str(&json).unwrap();
        assert_eq!(id, back);
    }
}
