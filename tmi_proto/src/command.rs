use std::str::FromStr;

use strum::EnumString;

/// The commands recognised by the engine.
///
/// Lookup is exact and case-sensitive; anything else maps to [`Unknown`],
/// and frames carrying an unknown command are still delivered to the
/// application as raw events.
///
/// [`Unknown`]: Command::Unknown
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString)]
#[strum(serialize_all = "UPPERCASE")]
pub enum Command {
    ClearChat,
    ClearMsg,
    GlobalUserState,
    HostTarget,
    Join,
    Notice,
    Part,
    Ping,
    Privmsg,
    Reconnect,
    RoomState,
    UserNotice,
    UserState,
    /// Anything not in the table above.
    #[strum(disabled)]
    Unknown,
}

impl Command {
    /// Look up a wire command name.
    pub fn parse(name: &str) -> Self {
        Self::from_str(name).unwrap_or(Self::Unknown)
    }
}
