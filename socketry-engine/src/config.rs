use std::time::Duration;

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// The path the websocket endpoint is mounted on.
    /// Defaults to "/socket.io/".
    pub req_path: String,

    /// The interval at which the server sends a ping packet to the client.
    /// Defaults to 25 seconds.
    pub ping_interval: Duration,

    /// How long the server waits for a pong after sending a ping before
    /// closing the session. Defaults to 20 seconds.
    pub ping_timeout: Duration,

    /// The maximum payload size advertised in the handshake.
    /// Defaults to 1MB.
    pub max_payload: u64,

    /// The capacity of the per session outbound queue. A send against a full
    /// queue fails immediately instead of blocking.
    /// Defaults to 256 packets.
    pub max_buffer_size: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            req_path: "/socket.io/".to_string(),
            ping_interval: Duration::from_millis(25000),
            ping_timeout: Duration::from_millis(20000),
            max_payload: 1_000_000,
            max_buffer_size: 256,
        }
    }
}

impl EngineConfig {
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder::new()
    }
}

pub struct EngineConfigBuilder {
    config: EngineConfig,
}

impl EngineConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: EngineConfig::default(),
        }
    }

    /// The path the websocket endpoint is mounted on.
    /// Defaults to "/socket.io/".
    pub fn req_path(mut self, req_path: impl Into<String>) -> Self {
        self.config.req_path = req_path.into();
        self
    }

    /// The interval at which the server sends a ping packet to the client.
    /// Defaults to 25 seconds.
    pub fn ping_interval(mut self, ping_interval: Duration) -> Self {
        self.config.ping_interval = ping_interval;
        self
    }

    /// How long the server waits for a pong after sending a ping before
    /// closing the session. Defaults to 20 seconds.
    pub fn ping_timeout(mut self, ping_timeout: Duration) -> Self {
        self.config.ping_timeout = ping_timeout;
        self
    }

    /// The maximum payload size advertised in the handshake.
    /// Defaults to 1MB.
    pub fn max_payload(mut self, max_payload: u64) -> Self {
        self.config.max_payload = max_payload;
        self
    }

    /// The capacity of the per session outbound queue.
    /// Defaults to 256 packets.
    pub fn max_buffer_size(mut self, max_buffer_size: usize) -> Self {
        self.config.max_buffer_size = max_buffer_size;
        self
    }

    pub fn build(self) -> EngineConfig {
        self.config
    }
}

impl Default for EngineConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
