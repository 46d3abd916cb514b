//! Async client engine for STOMP 1.0-1.2 message brokers.
//!
//! The crate is layered bottom-up:
//!
//! - [`frame`], [`escape`] and [`parser`]: the frame model, header value
//!   escaping and the incremental frame parser.
//! - [`codec`]: a tokio-util `Decoder`/`Encoder` pair over the parser.
//! - [`connection`]: the CONNECT/CONNECTED handshake and heartbeat
//!   negotiation.
//! - [`receipt`] and [`subscription`]: per-client tables correlating
//!   RECEIPTs with confirmed sends and MESSAGEs with handlers.
//! - [`Client`]: the facade tying them together around a background read
//!   loop.

pub mod client;
pub mod codec;
pub mod config;
pub mod connection;
pub mod error;
pub mod escape;
pub mod frame;
pub mod message;
pub mod parser;
pub mod reader;
pub mod receipt;
pub mod subscription;
pub mod transport;
pub mod writer;

pub use client::{Client, Delivery};
pub use codec::{FrameError, StompCodec, StompItem};
pub use config::{ConfigError, ConnectOptions, HeartbeatPolicy, Scheme};
pub use connection::{SessionInfo, negotiate_heartbeats, parse_heartbeat_header};
pub use error::{ConnError, ServerError};
pub use frame::{Command, Frame};
pub use message::Message;
pub use subscription::{AckMode, Handler};
pub use transport::Transport;
