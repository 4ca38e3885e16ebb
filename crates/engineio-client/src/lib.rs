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
//! Engine.IO client transport for the sioclient crate.
//!
//! It only implements the websocket transport. The socket.io layer talks to it through the
//! [`Connector`] trait so that another transport (or a mock in tests) can be plugged in.

pub mod errors;
pub mod packet;
pub mod protocol;
pub mod transport;

pub use errors::TransportError;
pub use protocol::ProtocolVersion;
pub use transport::{ConnectRequest, Connection, Connector, Message, ws::WsConnector};
