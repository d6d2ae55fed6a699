use std::fmt;

use serde::Deserialize;

/// Telegram user id (numeric).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct UserId(pub i64);

/// Telegram chat id (numeric).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ChatId(pub i64);

/// Telegram message id (numeric).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MessageId(pub i32);

/// Author of an inbound message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Sender {
    pub id: UserId,
    pub username: Option<String>,
}

impl Sender {
    pub fn new(id: i64, username: Option<&str>) -> Self {
        Self {
            id: UserId(id),
            username: username.map(|s| s.to_string()),
        }
    }
}

impl fmt::Display for Sender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.username {
            Some(name) => write!(f, "@{name} ({})", self.id.0),
            None => write!(f, "{}", self.id.0),
        }
    }
}

/// A configured sender identifier: numeric id or username.
///
/// Used for both the allowed-senders list and the admin set.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum SenderRef {
    Id(i64),
    Username(String),
}

impl SenderRef {
    /// Parse `123`, `-100123`, `@name` or `name`. Returns `None` for blank input.
    pub fn parse(raw: &str) -> Option<Self> {
        let s = raw.trim();
        let s = s.strip_prefix('@').unwrap_or(s);
        if s.is_empty() {
            return None;
        }

        let digits = s.strip_prefix('-').unwrap_or(s);
        if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(id) = s.parse::<i64>() {
                return Some(Self::Id(id));
            }
        }

        Some(Self::Username(s.to_string()))
    }

    pub fn matches(&self, sender: &Sender) -> bool {
        match self {
            Self::Id(id) => sender.id.0 == *id,
            Self::Username(name) => sender
                .username
                .as_deref()
                .map(|u| u.eq_ignore_ascii_case(name))
                .unwrap_or(false),
        }
    }
}

impl fmt::Display for SenderRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id(id) => write!(f, "{id}"),
            Self::Username(name) => write!(f, "@{name}"),
        }
    }
}

/// One source session. Created by configuration, immutable afterwards.
///
/// `api_id`/`api_hash` are the user-client credential pair of the accounts
/// file. The Bot API transport does not use them; they are kept so one file
/// serves both kinds of client, and `api_id` is validated on load.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct Account {
    pub session: String,
    #[serde(default)]
    pub api_id: String,
    #[serde(default)]
    pub api_hash: String,
    /// Credential used by the Bot API transport.
    #[serde(default)]
    pub bot_token: Option<String>,
}

/// An inbound message event from one source account.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InboundMessage {
    /// `session` of the account that received the message.
    pub account: String,
    pub chat_id: ChatId,
    pub message_id: MessageId,
    pub sender: Option<Sender>,
    pub is_private: bool,
    /// Text or media caption; `None` for media without caption.
    pub text: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sender_ref_parses_ids_and_usernames() {
        assert_eq!(SenderRef::parse("12345"), Some(SenderRef::Id(12345)));
        assert_eq!(SenderRef::parse(" -100777 "), Some(SenderRef::Id(-100777)));
        assert_eq!(
            SenderRef::parse("@SpamBot"),
            Some(SenderRef::Username("SpamBot".to_string()))
        );
        assert_eq!(
            SenderRef::parse("alice"),
            Some(SenderRef::Username("alice".to_string()))
        );
        assert_eq!(SenderRef::parse("  "), None);
        assert_eq!(SenderRef::parse("@"), None);
    }

    #[test]
    fn username_match_is_case_insensitive() {
        let s = Sender::new(7, Some("Alice"));
        assert!(SenderRef::Username("alice".into()).matches(&s));
        assert!(SenderRef::Id(7).matches(&s));
        assert!(!SenderRef::Id(8).matches(&s));
        assert!(!SenderRef::Username("bob".into()).matches(&Sender::new(7, None)));
    }
}
