//! Builders for the outbound wire lines the chat service accepts.
//!
//! Every line is CRLF-terminated. No length validation is performed here.

/// Capability request sent once at connect time.
pub const CAP_REQ: &str = "CAP REQ :twitch.tv/tags twitch.tv/commands twitch.tv/membership\r\n";

pub fn pass(token: &str) -> String {
    format!("PASS oauth:{}\r\n", token)
}

pub fn nick(name: &str) -> String {
    format!("NICK {}\r\n", name)
}

pub fn join(channel: &str) -> String {
    format!("JOIN #{}\r\n", channel)
}

pub fn part(channel: &str) -> String {
    format!("PART #{}\r\n", channel)
}

pub fn pong(server: &str) -> String {
    format!("PONG {}\r\n", server)
}

pub fn privmsg(channel: &str, text: &str) -> String {
    format!("PRIVMSG #{} :{}\r\n", channel, text)
}
