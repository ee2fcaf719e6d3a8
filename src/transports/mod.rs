//! Concrete [`Transport`](crate::Transport) implementations.
//!
//! | Feature                | Transport                                      |
//! |------------------------|------------------------------------------------|
//! | always                 | [`ChannelTransport`] (in-process loopback)     |
//! | `transport-websocket`  | [`WebSocketTransport`], [`WebSocketListener`]  |

pub mod channel;

#[cfg(feature = "transport-websocket")]
pub mod websocket;

pub use channel::ChannelTransport;

#[cfg(feature = "transport-websocket")]
pub use websocket::{WebSocketListener, WebSocketTransport};
