//! Client configuration.
//!
//! The [`ClientConfig`] holds the settings shared by every socket of a [`Manager`](crate::Manager).
//! It can be built field by field or with the [`ClientConfigBuilder`]:
//! ```
//! # use std::time::Duration;
//! # use sioclient::ClientConfig;
//! let config = ClientConfig::builder()
//!     .reconnection_attempts(5)
//!     .reconnection_delay(Duration::from_millis(500))
//!     .build();
//! assert_eq!(config.reconnection_attempts, Some(5));
//! ```
use std::{borrow::Cow, time::Duration};

use http::HeaderMap;
use serde_json::Value;

/// The socket.io protocol version.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub enum ProtocolVersion {
    /// The socket.io protocol v4, spoken over engine.io v3.
    /// The root namespace is implicitly connected and the namespace query is sent in the
    /// CONNECT packet.
    #[default]
    V4 = 4,
    /// The socket.io protocol v5, spoken over engine.io v4.
    /// Every namespace, root included, is explicitly connected with an optional auth payload.
    V5 = 5,
}

impl ProtocolVersion {
    /// The engine.io protocol version this socket.io version is spoken over.
    pub fn engineio(self) -> sioclient_engineio::ProtocolVersion {
        match self {
            ProtocolVersion::V4 => sioclient_engineio::ProtocolVersion::V3,
            ProtocolVersion::V5 => sioclient_engineio::ProtocolVersion::V4,
        }
    }
}

/// Configuration of a [`Manager`](crate::Manager) and its sockets.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// The path of the engine.io endpoint.
    ///
    /// Defaults to "/socket.io".
    pub path: Cow<'static, str>,

    /// The socket.io protocol version.
    ///
    /// Defaults to [`ProtocolVersion::V4`].
    pub protocol: ProtocolVersion,

    /// Whether the manager reconnects after a transport failure.
    ///
    /// Defaults to true.
    pub reconnection: bool,

    /// The maximum number of consecutive reconnection attempts, `None` for no limit.
    ///
    /// Defaults to `None`.
    pub reconnection_attempts: Option<u32>,

    /// The initial delay before a reconnection attempt. It doubles after each attempt.
    ///
    /// Defaults to 1 second.
    pub reconnection_delay: Duration,

    /// The maximum delay between two reconnection attempts.
    ///
    /// Defaults to 5 seconds.
    pub reconnection_delay_max: Duration,

    /// The randomization applied to the reconnection delay, between 0 and 1.
    ///
    /// Defaults to 0.5.
    pub randomization_factor: f64,

    /// The maximum time to open the transport, `None` to wait forever.
    ///
    /// Defaults to 20 seconds.
    pub timeout: Option<Duration>,

    /// Whether sockets connect as soon as they are created.
    ///
    /// Defaults to true.
    pub auto_connect: bool,

    /// Whether a new manager is created for each socket instead of reusing the manager of the
    /// endpoint.
    ///
    /// Defaults to false.
    pub force_new: bool,

    /// Headers sent with the transport handshake request.
    pub headers: HeaderMap,

    /// Query appended to the transport url.
    pub query: Option<String>,

    /// Auth payload sent with the CONNECT packet of every namespace (protocol v5 only).
    pub auth: Option<Value>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            path: "/socket.io".into(),
            protocol: ProtocolVersion::V4,
            reconnection: true,
            reconnection_attempts: None,
            reconnection_delay: Duration::from_secs(1),
            reconnection_delay_max: Duration::from_secs(5),
            randomization_factor: 0.5,
            timeout: Some(Duration::from_secs(20)),
            auto_connect: true,
            force_new: false,
            headers: HeaderMap::new(),
            query: None,
            auth: None,
        }
    }
}

impl ClientConfig {
    /// Create a new builder with a default config
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::new()
    }
}

/// Builder for [`ClientConfig`]
#[derive(Debug, Clone, Default)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    /// Create a new builder with a default config
    pub fn new() -> Self {
        Self::default()
    }

    /// The path of the engine.io endpoint.
    ///
    /// Defaults to "/socket.io".
    #[inline]
    pub fn path(mut self, path: impl Into<Cow<'static, str>>) -> Self {
        self.config.path = path.into();
        self
    }

    /// The socket.io protocol version.
    ///
    /// Defaults to [`ProtocolVersion::V4`].
    #[inline]
    pub fn protocol(mut self, protocol: ProtocolVersion) -> Self {
        self.config.protocol = protocol;
        self
    }

    /// Whether the manager reconnects after a transport failure.
    ///
    /// Defaults to true.
    #[inline]
    pub fn reconnection(mut self, reconnection: bool) -> Self {
        self.config.reconnection = reconnection;
        self
    }

    /// The maximum number of consecutive reconnection attempts.
    ///
    /// Defaults to no limit.
    #[inline]
    pub fn reconnection_attempts(mut self, attempts: u32) -> Self {
        self.config.reconnection_attempts = Some(attempts);
        self
    }

    /// The initial delay before a reconnection attempt.
    ///
    /// Defaults to 1 second.
    #[inline]
    pub fn reconnection_delay(mut self, delay: Duration) -> Self {
        self.config.reconnection_delay = delay;
        self
    }

    /// The maximum delay between two reconnection attempts.
    ///
    /// Defaults to 5 seconds.
    #[inline]
    pub fn reconnection_delay_max(mut self, delay: Duration) -> Self {
        self.config.reconnection_delay_max = delay;
        self
    }

    /// The randomization applied to the reconnection delay. It is clamped between 0 and 1.
    ///
    /// Defaults to 0.5.
    #[inline]
    pub fn randomization_factor(mut self, factor: f64) -> Self {
        self.config.randomization_factor = factor;
        self
    }

    /// The maximum time to open the transport, `None` to wait forever.
    ///
    /// Defaults to 20 seconds.
    #[inline]
    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Whether sockets connect as soon as they are created.
    ///
    /// Defaults to true.
    #[inline]
    pub fn auto_connect(mut self, auto_connect: bool) -> Self {
        self.config.auto_connect = auto_connect;
        self
    }

    /// Whether a new manager is created for each socket.
    ///
    /// Defaults to false.
    #[inline]
    pub fn force_new(mut self, force_new: bool) -> Self {
        self.config.force_new = force_new;
        self
    }

    /// Headers sent with the transport handshake request.
    #[inline]
    pub fn headers(mut self, headers: HeaderMap) -> Self {
        self.config.headers = headers;
        self
    }

    /// Query appended to the transport url.
    #[inline]
    pub fn query(mut self, query: impl Into<String>) -> Self {
        self.config.query = Some(query.into());
        self
    }

    /// Auth payload sent with the CONNECT packets (protocol v5 only).
    #[inline]
    pub fn auth(mut self, auth: Value) -> Self {
        self.config.auth = Some(auth);
        self
    }

    /// Build the config
    pub fn build(self) -> ClientConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn protocol_engineio_versions() {
        assert_eq!(
            ProtocolVersion::V4.engineio(),
            sioclient_engineio::ProtocolVersion::V3
        );
        assert_eq!(
            ProtocolVersion::V5.engineio(),
            sioclient_engineio::ProtocolVersion::V4
        );
    }

    #[test]
    fn builder_overrides_defaults() {
        let config = ClientConfigBuilder::new()
            .path("/custom")
            .protocol(ProtocolVersion::V5)
            .reconnection(false)
            .timeout(None)
            .query("token=1")
            .build();
        assert_eq!(config.path, "/custom");
        assert_eq!(config.protocol, ProtocolVersion::V5);
        assert!(!config.reconnection);
        assert_eq!(config.timeout, None);
        assert_eq!(config.query.as_deref(), Some("token=1"));
        assert_eq!(config.reconnection_delay, Duration::from_secs(1));
        assert!(config.auto_connect);
    }
}
