//! Protocol layer for Twitch-style IRC chat.
//!
//! This crate tokenises raw inbound frames into [`RawMessage`]s, classifies
//! them into typed [`ServerMessage`] events, and builds the outbound wire
//! lines the chat service accepts. Parsing is deliberately permissive: a
//! malformed tag or an unrecognised command never fails the pipeline, it
//! degrades to defaults or to a [`ServerMessage::Raw`] passthrough.

mod command;
pub use command::*;

mod message;
pub use message::*;

mod event;
pub use event::*;

pub mod wire;
