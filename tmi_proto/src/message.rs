use std::collections::HashMap;

use crate::Command;

/// The source prefix of an inbound frame.
///
/// A host-only prefix (e.g. `tmi.twitch.tv`) leaves `nick` and `user` empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Prefix {
    pub nick: String,
    pub user: String,
    pub host: String,
}

/// A tokenised, but not yet classified, inbound frame.
#[derive(Debug, Clone)]
pub struct RawMessage {
    /// The original line as received, retained for diagnostics
    pub raw: String,
    /// Message tags; keys are unique, values may be empty
    pub tags: HashMap<String, String>,
    /// The source prefix, if the frame carried one in a recognised shape
    pub prefix: Option<Prefix>,
    /// The command, or [`Command::Unknown`]
    pub command: Command,
    /// Remaining space-separated pieces, verbatim (a trailing-text
    /// parameter keeps its leading `:` at this stage)
    pub params: Vec<String>,
}

impl RawMessage {
    /// Tokenise one raw line into tags, prefix, command and parameters.
    ///
    /// Never fails: malformed tag entries are dropped, an unrecognised
    /// prefix shape is logged and left unset, and an unrecognised command
    /// becomes [`Command::Unknown`].
    pub fn parse(line: &str) -> Self {
        let mut msg = Self {
            raw: line.to_string(),
            tags: HashMap::new(),
            prefix: None,
            command: Command::Unknown,
            params: Vec::new(),
        };

        let mut pieces = line.split(' ').peekable();

        if let Some(tags) = pieces.peek().and_then(|p| p.strip_prefix('@')) {
            for entry in tags.split(';') {
                // Entries without a '=' are malformed and silently dropped
                if let Some((key, value)) = entry.split_once('=') {
                    msg.tags.insert(key.to_string(), value.to_string());
                }
            }
            pieces.next();
        }

        if let Some(prefix) = pieces.peek().and_then(|p| p.strip_prefix(':')) {
            let parts: Vec<&str> = prefix.split(|c| c == '!' || c == '@').collect();
            match parts.as_slice() {
                [host] => {
                    msg.prefix = Some(Prefix {
                        host: host.to_string(),
                        ..Prefix::default()
                    });
                }
                [nick, user, host] => {
                    msg.prefix = Some(Prefix {
                        nick: nick.to_string(),
                        user: user.to_string(),
                        host: host.to_string(),
                    });
                }
                _ => {
                    tracing::warn!("unexpected prefix shape: {}", prefix);
                }
            }
            pieces.next();
        }

        if let Some(piece) = pieces.next() {
            msg.command = Command::parse(piece);
        }

        msg.params = pieces.map(str::to_string).collect();

        msg
    }

    /// The value of a string tag; missing tags yield the empty string.
    pub fn tag_str(&self, key: &str) -> String {
        self.tags.get(key).cloned().unwrap_or_default()
    }

    /// The value of an unsigned integer tag; missing or unparseable values
    /// yield zero.
    pub fn tag_u32(&self, key: &str) -> u32 {
        self.tags.get(key).and_then(|v| v.parse().ok()).unwrap_or(0)
    }

    /// The value of a signed integer tag; missing or unparseable values
    /// yield zero.
    pub fn tag_i32(&self, key: &str) -> i32 {
        self.tags.get(key).and_then(|v| v.parse().ok()).unwrap_or(0)
    }

    /// The value of a boolean tag: `"1"` is true, anything else (including
    /// an absent tag) is false.
    pub fn tag_bool(&self, key: &str) -> bool {
        self.tags.get(key).map(|v| v == "1").unwrap_or(false)
    }
}
