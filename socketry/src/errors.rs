/// Protocol level errors raised while decoding or routing packets.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("invalid packet type")]
    InvalidPacketType,

    /// An event payload whose first element is not a string name.
    #[error("invalid event name")]
    InvalidEventName,

    #[error("invalid json payload: {0:?}")]
    InvalidJson(#[from] serde_json::Error),
}

/// Error returned when emitting to a single socket.
#[derive(thiserror::Error, Debug)]
pub enum SendError {
    #[error("error serializing json packet: {0:?}")]
    Serialize(#[from] serde_json::Error),

    /// The session refused the packet: the queue is full or the session is
    /// closed.
    #[error("session error: {0}")]
    Session(#[from] socketry_engine::errors::Error),
}

/// Error returned when broadcasting to a set of sockets. Per socket enqueue
/// failures are not reported here: they are handled by that session's own
/// close path.
#[derive(thiserror::Error, Debug)]
pub enum BroadcastError {
    #[error("error serializing json packet: {0:?}")]
    Serialize(#[from] serde_json::Error),

    #[error("adapter error: {0}")]
    Adapter(#[from] AdapterError),
}

/// Opaque error raised by an [`Adapter`](crate::adapter::Adapter)
/// implementation, e.g. a network failure in a cross process adapter.
#[derive(thiserror::Error, Debug)]
#[error(transparent)]
pub struct AdapterError(pub Box<dyn std::error::Error + Send + Sync>);

/// Error yielded while waiting for an acknowledgement.
#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum AckError {
    /// No ack arrived within the configured timeout.
    #[error("ack timeout")]
    Timeout,

    /// The socket went away before the ack arrived.
    #[error("socket closed before the ack arrived")]
    Closed,
}
