//! Front-end protocol spoken with the Entry Point.
//!
//! This module defines the messages exchanged between front ends (web UI, CLI, NETCONF,
//! TR-069, SNMP agents) and the Entry Point, how they are encoded as markup text, and how
//! they travel over loopback UDP.
//!
//! # Overview
//!
//! A [`Message`] is a [`Header`] plus a [`Body`]. The body is one of fifteen request or
//! reply shapes; the message type is implied by the body variant. Variable-length values
//! (parameter values) are not owned by the message but carved out of a caller supplied
//! buffer through the message's [`MemoryPool`], so a decoded reply never allocates for
//! them.
//!
//! # Key Components
//!
//! - [`Message`]: header, body and the pool backing the body's values.
//! - [`decode_message`] / [`encode_message`]: conversion to and from the wire text.
//! - [`Connection`]: UDP socket bound on loopback with transaction matching.
//! - [`Client`]: request/response round trips over a [`Connection`].
//!
//! # Wire Format
//!
//! Every message is a single document rooted at `<EP_ApiMsg>`:
//!
//! - `<hdr>` carries caller id, transaction id, reply routing, result code, more flag,
//!   message type and database type.
//! - `<body>` carries one element named after the message type. Lists are wrapped in a
//!   container whose `arraySize` attribute must equal the number of items.
//!
//! Requests are sent prefixed with 8 zeroed flag bytes and terminated by a NUL byte.
//! Replies carry no flags.
//!
//! # Errors
//!
//! Every fallible operation returns [`FrontApiError`], whose [`FrontApiError::code`]
//! gives the numeric result code front ends report.
mod client;
mod decode;
mod encode;
mod error;
mod message;
mod pool;
mod transport;
mod xml;

pub use client::Client;
pub use decode::{decode_header, decode_message};
pub use encode::{encode_message, encode_to_string};
pub use error::{FrontApiError, code, fault};
pub use message::*;
pub use pool::{MIN_POOL_SIZE, MemoryPool};
pub use transport::{
    Connection, ConnectionConfig, DEFAULT_TIMEOUT, ENTRY_POINT_ADDR, ENTRY_POINT_PORT,
    FLAGS_LEN, PACKET_BUF_SIZE, Packet, TransportError,
};
