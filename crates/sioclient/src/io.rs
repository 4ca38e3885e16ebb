//! The [`IoClient`] is the entry point of the crate: it hands out sockets and keeps one
//! [`Manager`] per endpoint so that the namespaces of one endpoint share a single transport.
use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use http::HeaderMap;
use serde_json::Value;
use sioclient_engineio::{ConnectRequest, Connector, WsConnector};
use tokio_util::sync::CancellationToken;

use crate::{config::ClientConfig, errors::Error, manager::Manager, socket::Socket};

/// The options of a socket requested with [`IoClient::socket`].
#[derive(Debug, Clone)]
pub struct SocketOptions {
    /// The endpoint of the server, such as `http://localhost:3000`
    pub uri: String,
    /// The namespace. Defaults to the root namespace `/`.
    pub namespace: String,
    /// Headers added to the ones of the client config for the transport handshake
    pub headers: HeaderMap,
    /// Query appended to the transport url, and sent with the namespace CONNECT packet under
    /// protocol v4
    pub query: Option<String>,
    /// Auth payload sent with the CONNECT packet (protocol v5 only)
    pub auth: Option<Value>,
    /// Cancelling this token destroys the manager of the socket
    pub cancel: Option<CancellationToken>,
}

impl SocketOptions {
    /// Options for the root namespace of `uri`
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            namespace: "/".into(),
            headers: HeaderMap::new(),
            query: None,
            auth: None,
            cancel: None,
        }
    }

    /// Set the namespace
    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// Set the handshake headers
    pub fn headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    /// Set the query
    pub fn query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }

    /// Set the auth payload
    pub fn auth(mut self, auth: Value) -> Self {
        self.auth = Some(auth);
        self
    }

    /// Set the cancellation token
    pub fn cancel(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }
}

struct Inner {
    connector: Arc<dyn Connector>,
    config: ClientConfig,
    managers: Mutex<HashMap<String, Manager>>,
}

/// A socket.io client. It is cheaply clonable.
///
/// #### Example
/// ```no_run
/// # use serde_json::json;
/// # use sioclient::{IoClient, SocketOptions};
/// # async fn doc() -> Result<(), sioclient::Error> {
/// let client = IoClient::new();
/// let chat = client.socket(SocketOptions::new("http://localhost:3000").namespace("/chat"))?;
/// let news = client.socket(SocketOptions::new("http://localhost:3000").namespace("/news"))?;
/// // Both namespaces share the same transport
/// assert_eq!(chat.manager().connection_count(), news.manager().connection_count());
/// chat.emit("hello", [json!("world")]).ok();
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct IoClient(Arc<Inner>);

impl std::fmt::Debug for IoClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IoClient")
            .field("config", &self.0.config)
            .finish()
    }
}

impl Default for IoClient {
    fn default() -> Self {
        Self::new()
    }
}

impl IoClient {
    /// Create a client with the default config and the websocket transport
    pub fn new() -> Self {
        Self::with_config(ClientConfig::default())
    }

    /// Create a client with a custom config and the websocket transport
    pub fn with_config(config: ClientConfig) -> Self {
        Self::with_connector(config, WsConnector::default())
    }

    /// Create a client with a custom config and a custom [`Connector`]
    pub fn with_connector(config: ClientConfig, connector: impl Connector) -> Self {
        Self(Arc::new(Inner {
            connector: Arc::new(connector),
            config,
            managers: Mutex::new(HashMap::new()),
        }))
    }

    /// The config of the managers created by this client
    pub fn config(&self) -> &ClientConfig {
        &self.0.config
    }

    /// Get a socket for a namespace of an endpoint.
    ///
    /// The manager of the endpoint is reused if it exists and is not destroyed, unless
    /// [`ClientConfig::force_new`] is set. Requesting the same namespace twice returns the same
    /// socket.
    ///
    /// # Errors
    /// [`Error::Transport`] if the uri is not a valid http(s) or ws(s) endpoint.
    ///
    /// # Panics
    /// If called outside of a tokio runtime.
    pub fn socket(&self, opts: SocketOptions) -> Result<Socket, Error> {
        let mut config = self.0.config.clone();
        config.headers.extend(opts.headers);
        if let Some(query) = &opts.query {
            config.query = Some(match config.query.take() {
                Some(base) => format!("{base}&{query}"),
                None => query.clone(),
            });
        }
        let key = ConnectRequest::new(
            &opts.uri,
            &config.path,
            config.protocol.engineio(),
            config.query.as_deref(),
            HeaderMap::new(),
        )?
        .url;

        if config.force_new {
            let manager = self.new_manager(&opts.uri, config, opts.cancel)?;
            return Ok(manager.socket_with(&opts.namespace, opts.auth, opts.query));
        }

        let mut managers = self.0.managers.lock().unwrap_or_else(|e| e.into_inner());
        managers.retain(|_, m| !m.is_destroyed());
        // The manager may be released by its last socket until the new one is registered
        if let Some(manager) = managers.get(&key) {
            let socket =
                manager.try_socket_with(&opts.namespace, opts.auth.clone(), opts.query.clone());
            if let Some(socket) = socket {
                tracing::debug!(%key, "reusing manager");
                if let Some(token) = opts.cancel {
                    watch_cancellation(manager, token);
                }
                return Ok(socket);
            }
        }
        let manager = self.new_manager(&opts.uri, config, opts.cancel)?;
        managers.insert(key, manager.clone());
        Ok(manager.socket_with(&opts.namespace, opts.auth, opts.query))
    }

    fn new_manager(
        &self,
        uri: &str,
        config: ClientConfig,
        cancel: Option<CancellationToken>,
    ) -> Result<Manager, Error> {
        tracing::debug!(uri, "creating manager");
        let manager = Manager::with_shared_connector(uri, config, self.0.connector.clone())?;
        if let Some(token) = cancel {
            watch_cancellation(&manager, token);
        }
        Ok(manager)
    }
}

/// Cancel the manager once `token` is cancelled, unless it is destroyed first.
fn watch_cancellation(manager: &Manager, token: CancellationToken) {
    let shutdown = manager.shutdown_token();
    let manager = manager.clone();
    tokio::spawn(async move {
        tokio::select! {
            _ = token.cancelled() => manager.cancel(),
            _ = shutdown.cancelled() => (),
        }
    });
}
