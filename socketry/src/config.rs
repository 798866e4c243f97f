use std::time::Duration;

use socketry_engine::config::EngineConfig;

/// Socket.IO server configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// How long an [`emit_with_ack`](crate::socket::Socket::emit_with_ack)
    /// future waits for the client before yielding a timeout.
    /// Defaults to 5 seconds.
    pub ack_timeout: Duration,

    /// The underlying engine configuration (mount path, heartbeat, payload
    /// and queue limits).
    pub engine: EngineConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ack_timeout: Duration::from_secs(5),
            engine: EngineConfig::default(),
        }
    }
}

impl Config {
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }
}

pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    /// The path the websocket endpoint is mounted on.
    /// Defaults to "/socket.io/".
    pub fn req_path(mut self, req_path: impl Into<String>) -> Self {
        self.config.engine.req_path = req_path.into();
        self
    }

    /// The interval at which the server sends a ping packet to the client.
    /// Defaults to 25 seconds.
    pub fn ping_interval(mut self, ping_interval: Duration) -> Self {
        self.config.engine.ping_interval = ping_interval;
        self
    }

    /// How long the server waits for a pong after sending a ping before
    /// closing the session. Defaults to 20 seconds.
    pub fn ping_timeout(mut self, ping_timeout: Duration) -> Self {
        self.config.engine.ping_timeout = ping_timeout;
        self
    }

    /// The maximum payload size advertised in the handshake.
    /// Defaults to 1MB.
    pub fn max_payload(mut self, max_payload: u64) -> Self {
        self.config.engine.max_payload = max_payload;
        self
    }

    /// The capacity of the per session outbound queue.
    /// Defaults to 256 packets.
    pub fn max_buffer_size(mut self, max_buffer_size: usize) -> Self {
        self.config.engine.max_buffer_size = max_buffer_size;
        self
    }

    /// How long an acknowledgement future waits for the client.
    /// Defaults to 5 seconds.
    pub fn ack_timeout(mut self, ack_timeout: Duration) -> Self {
        self.config.ack_timeout = ack_timeout;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
