use tokio_tungstenite::tungstenite;

/// Error type for the engine layer.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("error serializing handshake packet: {0:?}")]
    Serialize(#[from] serde_json::Error),

    /// The frame did not carry a valid packet. Decode failures are local:
    /// the session drops the frame and keeps running.
    #[error("invalid packet")]
    InvalidPacket,

    /// A send was attempted on a closed session.
    #[error("session closed")]
    SessionClosed,

    /// The outbound queue is full. The send fails immediately, the session
    /// itself keeps running.
    #[error("outbound queue full")]
    SlowClient,

    #[error("heartbeat timeout")]
    HeartbeatTimeout,

    #[error("ws transport error: {0:?}")]
    WsTransport(#[from] tungstenite::Error),

    #[error("http error: {0:?}")]
    Http(#[from] http::Error),

    #[error("upgrade error")]
    Upgrade,
}
