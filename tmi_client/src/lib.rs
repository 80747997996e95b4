//! A rate-limited client engine for Twitch-style IRC chat.
//!
//! The engine owns one inbound pipeline (tokenise, classify, route to the
//! application's handlers) and two independent outbound dispatch queues
//! (chat messages and channel joins), each drained by a background drip
//! task under a token-bucket policy. Flooding the remote service causes a
//! disconnect, so all user-generated traffic passes through a queue; only
//! keepalive replies and channel parts bypass it.
//!
//! Opening and reading the duplex byte stream is the embedding
//! application's concern; see [`Transport`].

mod error;
pub use error::*;

mod transport;
pub use transport::*;

mod bucket;
pub use bucket::*;

mod router;
pub use router::*;

mod config;
pub use config::*;

mod session;
pub use session::*;

pub use tmi_proto as proto;
