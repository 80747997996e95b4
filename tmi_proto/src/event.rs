use crate::{Command, RawMessage};

/// First parameter with a leading `#` stripped; anything else is no channel.
fn channel(raw: &RawMessage) -> String {
    raw.params
        .first()
        .and_then(|p| p.strip_prefix('#'))
        .map(str::to_string)
        .unwrap_or_default()
}

/// Parameters from index 1 onward joined with a single space, with one
/// leading `:` stripped.
fn trailing(raw: &RawMessage) -> String {
    if raw.params.len() < 2 {
        return String::new();
    }
    let joined = raw.params[1..].join(" ");
    match joined.strip_prefix(':') {
        Some(stripped) => stripped.to_string(),
        None => joined,
    }
}

/// A user was timed out or banned, or the channel's chat was cleared.
#[derive(Debug, Clone)]
pub struct ClearChat {
    pub raw: RawMessage,
    /// Timeout length in seconds; zero for a permanent ban or a full clear
    pub ban_duration: u32,
    pub channel: String,
    /// The affected user, when one is named
    pub user: String,
}

impl ClearChat {
    fn from_raw(raw: RawMessage) -> Self {
        let user = raw
            .params
            .get(1)
            .and_then(|p| p.strip_prefix(':'))
            .map(str::to_string)
            .unwrap_or_default();
        Self {
            ban_duration: raw.tag_u32("ban-duration"),
            channel: channel(&raw),
            user,
            raw,
        }
    }
}

/// A single message was deleted from chat.
#[derive(Debug, Clone)]
pub struct ClearMsg {
    pub raw: RawMessage,
    pub channel: String,
    pub login: String,
    pub message: String,
    pub target_msg_id: String,
}

impl ClearMsg {
    fn from_raw(raw: RawMessage) -> Self {
        Self {
            channel: channel(&raw),
            login: raw.tag_str("login"),
            message: trailing(&raw),
            target_msg_id: raw.tag_str("target-msg-id"),
            raw,
        }
    }
}

/// Global state for the authenticated user, sent after login.
#[derive(Debug, Clone)]
pub struct GlobalUserState {
    pub raw: RawMessage,
    pub badge_info: String,
    pub badges: String,
    pub color: String,
    pub display_name: String,
    pub emote_sets: String,
    pub turbo: String,
    pub user_id: String,
    pub user_type: String,
}

impl GlobalUserState {
    fn from_raw(raw: RawMessage) -> Self {
        Self {
            badge_info: raw.tag_str("badge-info"),
            badges: raw.tag_str("badges"),
            color: raw.tag_str("color"),
            display_name: raw.tag_str("display-name"),
            emote_sets: raw.tag_str("emote-sets"),
            turbo: raw.tag_str("turbo"),
            user_id: raw.tag_str("user-id"),
            user_type: raw.tag_str("user-type"),
            raw,
        }
    }
}

/// A channel started or stopped hosting another channel.
#[derive(Debug, Clone)]
pub struct HostTarget {
    pub raw: RawMessage,
    pub channel: String,
    pub target_channel: String,
    pub viewer_count: u32,
}

impl HostTarget {
    fn from_raw(raw: RawMessage) -> Self {
        let target_channel = raw
            .params
            .get(1)
            .map(|p| p.strip_prefix(':').unwrap_or(p).to_string())
            .unwrap_or_default();
        let viewer_count = raw
            .params
            .get(2)
            .and_then(|p| p.parse().ok())
            .unwrap_or(0);
        Self {
            channel: channel(&raw),
            target_channel,
            viewer_count,
            raw,
        }
    }
}

/// A user joined a channel.
#[derive(Debug, Clone)]
pub struct Join {
    pub raw: RawMessage,
    pub channel: String,
}

impl Join {
    fn from_raw(raw: RawMessage) -> Self {
        Self {
            channel: channel(&raw),
            raw,
        }
    }
}

/// A service notice for a channel.
#[derive(Debug, Clone)]
pub struct Notice {
    pub raw: RawMessage,
    pub channel: String,
    pub message: String,
    pub msg_id: String,
}

impl Notice {
    fn from_raw(raw: RawMessage) -> Self {
        Self {
            channel: channel(&raw),
            message: trailing(&raw),
            msg_id: raw.tag_str("msg-id"),
            raw,
        }
    }
}

/// A user left a channel.
#[derive(Debug, Clone)]
pub struct Part {
    pub raw: RawMessage,
    pub channel: String,
}

impl Part {
    fn from_raw(raw: RawMessage) -> Self {
        Self {
            channel: channel(&raw),
            raw,
        }
    }
}

/// A keepalive probe from the server. Each entry in `servers` must be
/// answered with a PONG reply.
#[derive(Debug, Clone)]
pub struct Ping {
    pub raw: RawMessage,
    /// The server parameters, verbatim (including any leading `:`)
    pub servers: Vec<String>,
}

impl Ping {
    fn from_raw(raw: RawMessage) -> Self {
        Self {
            servers: raw.params.clone(),
            raw,
        }
    }
}

/// A chat message in a channel.
///
/// Tag-derived fields are kept as strings; the tag set evolves and the
/// engine makes no attempt to interpret badge or emote payloads.
#[derive(Debug, Clone)]
pub struct Privmsg {
    pub raw: RawMessage,
    pub badge_info: String,
    pub badges: String,
    pub bits: String,
    pub channel: String,
    pub color: String,
    pub display_name: String,
    pub emotes: String,
    pub id: String,
    pub message: String,
    pub moderator: String,
    pub room_id: String,
    pub subscriber: String,
    pub tmi_sent_ts: String,
    pub turbo: String,
    pub user_id: String,
    pub user_type: String,
}

impl Privmsg {
    fn from_raw(raw: RawMessage) -> Self {
        Self {
            badge_info: raw.tag_str("badge-info"),
            badges: raw.tag_str("badges"),
            bits: raw.tag_str("bits"),
            channel: channel(&raw),
            color: raw.tag_str("color"),
            display_name: raw.tag_str("display-name"),
            emotes: raw.tag_str("emotes"),
            id: raw.tag_str("id"),
            message: trailing(&raw),
            moderator: raw.tag_str("mod"),
            room_id: raw.tag_str("room-id"),
            subscriber: raw.tag_str("subscriber"),
            tmi_sent_ts: raw.tag_str("tmi-sent-ts"),
            turbo: raw.tag_str("turbo"),
            user_id: raw.tag_str("user-id"),
            user_type: raw.tag_str("user-type"),
            raw,
        }
    }
}

/// The server is about to terminate the connection for maintenance.
#[derive(Debug, Clone)]
pub struct Reconnect {
    pub raw: RawMessage,
}

impl Reconnect {
    fn from_raw(raw: RawMessage) -> Self {
        Self { raw }
    }
}

/// Channel mode settings, sent on join and on change.
#[derive(Debug, Clone)]
pub struct RoomState {
    pub raw: RawMessage,
    pub channel: String,
    pub emote_only: bool,
    /// Minimum follow age in minutes; zero means any follower, negative
    /// means the restriction is off
    pub followers_only: i32,
    pub r9k: bool,
    /// Seconds users must wait between messages
    pub slow: u32,
    pub subs_only: bool,
}

impl RoomState {
    fn from_raw(raw: RawMessage) -> Self {
        Self {
            channel: channel(&raw),
            emote_only: raw.tag_bool("emote-only"),
            followers_only: raw.tag_i32("followers-only"),
            r9k: raw.tag_bool("r9k"),
            slow: raw.tag_u32("slow"),
            subs_only: raw.tag_bool("subs-only"),
            raw,
        }
    }
}

/// A privileged event in a channel: subscription, raid, ritual and similar.
#[derive(Debug, Clone)]
pub struct UserNotice {
    pub raw: RawMessage,
    pub badge_info: String,
    pub badges: String,
    pub channel: String,
    pub color: String,
    pub display_name: String,
    pub emotes: String,
    pub id: String,
    pub login: String,
    pub message: String,
    pub moderator: String,
    pub msg_id: String,
    pub room_id: String,
    pub subscriber: bool,
    pub system_msg: String,
    pub tmi_sent_ts: String,
    pub turbo: String,
    pub user_id: String,
    pub user_type: String,
}

impl UserNotice {
    fn from_raw(raw: RawMessage) -> Self {
        Self {
            badge_info: raw.tag_str("badge-info"),
            badges: raw.tag_str("badges"),
            channel: channel(&raw),
            color: raw.tag_str("color"),
            display_name: raw.tag_str("display-name"),
            emotes: raw.tag_str("emotes"),
            id: raw.tag_str("id"),
            login: raw.tag_str("login"),
            message: trailing(&raw),
            moderator: raw.tag_str("mod"),
            msg_id: raw.tag_str("msg-id"),
            room_id: raw.tag_str("room-id"),
            subscriber: raw.tag_bool("subscriber"),
            system_msg: raw.tag_str("system-msg"),
            tmi_sent_ts: raw.tag_str("tmi-sent-ts"),
            turbo: raw.tag_str("turbo"),
            user_id: raw.tag_str("user-id"),
            user_type: raw.tag_str("user-type"),
            raw,
        }
    }
}

/// The authenticated user's state within one channel.
#[derive(Debug, Clone)]
pub struct UserState {
    pub raw: RawMessage,
    pub badge_info: String,
    pub badges: String,
    pub channel: String,
    pub color: String,
    pub display_name: String,
    pub emote_sets: String,
    pub moderator: String,
    pub subscriber: bool,
    pub turbo: String,
    pub user_type: String,
}

impl UserState {
    fn from_raw(raw: RawMessage) -> Self {
        Self {
            badge_info: raw.tag_str("badge-info"),
            badges: raw.tag_str("badges"),
            channel: channel(&raw),
            color: raw.tag_str("color"),
            display_name: raw.tag_str("display-name"),
            emote_sets: raw.tag_str("emote-sets"),
            moderator: raw.tag_str("mod"),
            subscriber: raw.tag_bool("subscriber"),
            turbo: raw.tag_str("turbo"),
            user_type: raw.tag_str("user-type"),
            raw,
        }
    }
}

/// A classified inbound message, one variant per recognised command.
#[derive(Debug, Clone)]
pub enum ServerMessage {
    ClearChat(ClearChat),
    ClearMsg(ClearMsg),
    GlobalUserState(GlobalUserState),
    HostTarget(HostTarget),
    Join(Join),
    Notice(Notice),
    Part(Part),
    Ping(Ping),
    Privmsg(Privmsg),
    Reconnect(Reconnect),
    RoomState(RoomState),
    UserNotice(UserNotice),
    UserState(UserState),
    /// Any frame whose command the table does not recognise. Nothing
    /// received is ever dropped.
    Raw(RawMessage),
}

/// Discriminant for [`ServerMessage`], used to key handler registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
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
    Raw,
}

impl ServerMessage {
    /// Classify a tokenised frame into its typed event.
    pub fn from_raw(raw: RawMessage) -> Self {
        match raw.command {
            Command::ClearChat => Self::ClearChat(ClearChat::from_raw(raw)),
            Command::ClearMsg => Self::ClearMsg(ClearMsg::from_raw(raw)),
            Command::GlobalUserState => Self::GlobalUserState(GlobalUserState::from_raw(raw)),
            Command::HostTarget => Self::HostTarget(HostTarget::from_raw(raw)),
            Command::Join => Self::Join(Join::from_raw(raw)),
            Command::Notice => Self::Notice(Notice::from_raw(raw)),
            Command::Part => Self::Part(Part::from_raw(raw)),
            Command::Ping => Self::Ping(Ping::from_raw(raw)),
            Command::Privmsg => Self::Privmsg(Privmsg::from_raw(raw)),
            Command::Reconnect => Self::Reconnect(Reconnect::from_raw(raw)),
            Command::RoomState => Self::RoomState(RoomState::from_raw(raw)),
            Command::UserNotice => Self::UserNotice(UserNotice::from_raw(raw)),
            Command::UserState => Self::UserState(UserState::from_raw(raw)),
            Command::Unknown => Self::Raw(raw),
        }
    }

    pub fn kind(&self) -> MessageKind {
        match self {
            Self::ClearChat(_) => MessageKind::ClearChat,
            Self::ClearMsg(_) => MessageKind::ClearMsg,
            Self::GlobalUserState(_) => MessageKind::GlobalUserState,
            Self::HostTarget(_) => MessageKind::HostTarget,
            Self::Join(_) => MessageKind::Join,
            Self::Notice(_) => MessageKind::Notice,
            Self::Part(_) => MessageKind::Part,
            Self::Ping(_) => MessageKind::Ping,
            Self::Privmsg(_) => MessageKind::Privmsg,
            Self::Reconnect(_) => MessageKind::Reconnect,
            Self::RoomState(_) => MessageKind::RoomState,
            Self::UserNotice(_) => MessageKind::UserNotice,
            Self::UserState(_) => MessageKind::UserState,
            Self::Raw(_) => MessageKind::Raw,
        }
    }

    /// The tokenised frame this event was produced from.
    pub fn raw(&self) -> &RawMessage {
        match self {
            Self::ClearChat(m) => &m.raw,
            Self::ClearMsg(m) => &m.raw,
            Self::GlobalUserState(m) => &m.raw,
            Self::HostTarget(m) => &m.raw,
            Self::Join(m) => &m.raw,
            Self::Notice(m) => &m.raw,
            Self::Part(m) => &m.raw,
            Self::Ping(m) => &m.raw,
            Self::Privmsg(m) => &m.raw,
            Self::Reconnect(m) => &m.raw,
            Self::RoomState(m) => &m.raw,
            Self::UserNotice(m) => &m.raw,
            Self::UserState(m) => &m.raw,
            Self::Raw(raw) => raw,
        }
    }
}

/// Implemented by every typed event so handlers can be registered by the
/// event's concrete kind.
pub trait MessageEvent: Sized {
    const KIND: MessageKind;

    /// Borrow the typed event out of a [`ServerMessage`] of the right kind.
    fn from_message(msg: &ServerMessage) -> Option<&Self>;
}

macro_rules! message_event {
    ($ty:ident) => {
        impl MessageEvent for $ty {
            const KIND: MessageKind = MessageKind::$ty;

            fn from_message(msg: &ServerMessage) -> Option<&Self> {
                match msg {
                    ServerMessage::$ty(event) => Some(event),
                    _ => None,
                }
            }
        }
    };
}

message_event!(ClearChat);
message_event!(ClearMsg);
message_event!(GlobalUserState);
message_event!(HostTarget);
message_event!(Join);
message_event!(Notice);
message_event!(Part);
message_event!(Ping);
message_event!(Privmsg);
message_event!(Reconnect);
message_event!(RoomState);
message_event!(UserNotice);
message_event!(UserState);

impl MessageEvent for RawMessage {
    const KIND: MessageKind = MessageKind::Raw;

    fn from_message(msg: &ServerMessage) -> Option<&Self> {
        match msg {
            ServerMessage::Raw(raw) => Some(raw),
            _ => None,
        }
    }
}
