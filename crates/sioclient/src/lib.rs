#![warn(
    clippy::all,
    clippy::todo,
    clippy::empty_enum,
    clippy::mem_forget,
    clippy::unused_self,
    clippy::filter_map_next,
    clippy::needless_continue,
    clippy::needless_borrow,
    clippy::match_wildcard_for_single_variants,
    clippy::if_let_mutex,
    clippy::imprecise_flops,
    clippy::suboptimal_flops,
    clippy::lossy_float_literal,
    clippy::rest_pat_in_fully_bound_structs,
    clippy::fn_params_excessive_bools,
    clippy::exit,
    clippy::inefficient_to_string,
    clippy::linkedlist,
    clippy::macro_use_imports,
    clippy::option_option,
    clippy::verbose_file_reads,
    clippy::unnested_or_patterns,
    rust_2018_idioms,
    future_incompatible,
    nonstandard_style,
    missing_docs
)]
//! A socket.io client multiplexing namespaces over a single engine.io websocket connection,
//! with automatic reconnection, acknowledgements and buffering across disconnections.
//!
//! ## Overview
//! * An [`IoClient`] hands out [`Socket`]s and keeps one [`Manager`] per endpoint.
//! * A [`Manager`] owns the transport: it opens it, reconnects it with an exponential backoff
//!   and routes incoming packets to the socket of their namespace.
//! * A [`Socket`] is a channel scoped to a namespace. Events emitted before the namespace is
//!   connected are buffered and sent in order once connected.
//!
//! Every state mutation of a manager and of its sockets runs on a serialized [`EventLoop`],
//! listeners are therefore called one at a time, in the order of the transport frames.
//!
//! ## Example
//! ```no_run
//! use serde_json::json;
//! use sioclient::{IoClient, SocketOptions};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), sioclient::Error> {
//!     let client = IoClient::new();
//!     let socket = client.socket(SocketOptions::new("http://localhost:3000").namespace("/chat"))?;
//!
//!     socket.on("connect", |_| println!("connected"));
//!     socket.on("*", |args| println!("event {:?}", args.args));
//!     socket.emit_with_ack("hello", [json!("world")], |ack| println!("ack {:?}", ack.args))
//!         .ok();
//!
//!     tokio::time::sleep(std::time::Duration::from_secs(60)).await;
//!     socket.close();
//!     Ok(())
//! }
//! ```
//!
//! ## Events
//! Sockets receive the application events of their namespace, plus the lifecycle events:
//! `connecting`, `connect`, `disconnect`, `connect_error`, `connect_timeout`, `error`, `reconnect`,
//! `reconnect_attempt`, `reconnecting`, `reconnect_error` and `reconnect_failed`.
//! The wildcard event `*` receives every application event, with its name as first argument.

pub mod ack;
pub mod config;
pub mod emitter;
pub mod event_loop;
pub mod manager;
pub mod socket;

mod backoff;
mod errors;
mod io;

pub use ack::{AckFuture, AckSender};
pub use config::{ClientConfig, ClientConfigBuilder, ProtocolVersion};
pub use emitter::{Emitter, EventArgs, ListenerId, WILDCARD};
pub use errors::{AckError, Error, ParseError, SendError, TransportError};
pub use event_loop::{EventLoop, LoopClosed, LoopHandle};
pub use io::{IoClient, SocketOptions};
pub use manager::{ConnectionState, Manager};
pub use socket::{DisconnectReason, Socket};

pub use sioclient_core::{Str, packet::Payload};
pub use sioclient_engineio::{Connection, ConnectRequest, Connector, Message};
