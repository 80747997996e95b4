use serde::Deserialize;

use crate::{ClientError, ThrottleSettings};

/// The service enforces 20 outbound messages (and 20 joins) per 30-second
/// window for regular users; exceeding it drops the connection.
const RATE_WINDOW_SECS: u32 = 30;
const DEFAULT_LIMIT: u32 = 20;

/// Connection options for a [`ChatSession`](crate::ChatSession).
#[derive(Debug, Clone, Deserialize)]
pub struct Options {
    /// Login name, sent in the NICK registration line
    pub nick: String,
    /// OAuth token, sent in the PASS registration line (without the
    /// `oauth:` prefix)
    pub token: String,
    /// Chat messages allowed per 30-second window
    #[serde(default = "default_limit")]
    pub chat_limit: u32,
    /// Channel joins allowed per 30-second window
    #[serde(default = "default_limit")]
    pub join_limit: u32,
}

fn default_limit() -> u32 {
    DEFAULT_LIMIT
}

impl Options {
    pub fn new(nick: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            nick: nick.into(),
            token: token.into(),
            chat_limit: DEFAULT_LIMIT,
            join_limit: DEFAULT_LIMIT,
        }
    }

    /// Check that the required credentials are present.
    pub fn validate(&self) -> Result<(), ClientError> {
        if self.nick.is_empty() {
            return Err(ClientError::MissingCredential("nick"));
        }
        if self.token.is_empty() {
            return Err(ClientError::MissingCredential("token"));
        }
        Ok(())
    }

    pub fn chat_throttle(&self) -> ThrottleSettings {
        throttle(self.chat_limit)
    }

    pub fn join_throttle(&self) -> ThrottleSettings {
        throttle(self.join_limit)
    }
}

fn throttle(limit: u32) -> ThrottleSettings {
    let num = if limit == 0 { DEFAULT_LIMIT } else { limit };
    ThrottleSettings {
        num,
        time: RATE_WINDOW_SECS,
        burst: 1,
    }
}
