use teloxide::{
    types::{Me, Message},
    ApiError, RequestError,
};

use fwd_core::{
    domain::{ChatId, InboundMessage, MessageId, Sender, UserId},
    errors::Error,
    ports::AccountIdentity,
};

pub fn tg_chat(chat_id: ChatId) -> teloxide::types::ChatId {
    teloxide::types::ChatId(chat_id.0)
}

pub fn tg_msg_id(message_id: MessageId) -> teloxide::types::MessageId {
    teloxide::types::MessageId(message_id.0)
}

/// Convert a Bot API message into the core event type.
///
/// Captions stand in for text; media without caption yields `text: None`.
pub fn to_inbound(account: &str, msg: &Message) -> InboundMessage {
    InboundMessage {
        account: account.to_string(),
        chat_id: ChatId(msg.chat.id.0),
        message_id: MessageId(msg.id.0),
        sender: msg.from.as_ref().map(|u| Sender {
            id: UserId(u.id.0 as i64),
            username: u.username.clone(),
        }),
        is_private: msg.chat.is_private(),
        text: msg.text().or_else(|| msg.caption()).map(|s| s.to_string()),
    }
}

pub fn identity_from_me(me: &Me) -> AccountIdentity {
    AccountIdentity {
        id: UserId(me.id.0 as i64),
        username: me.username.clone(),
        first_name: me.first_name.clone(),
    }
}

/// Classify a failure while opening a session.
pub fn connect_error(account: &str, e: RequestError) -> Error {
    match e {
        // teloxide reports both "Unauthorized" and "Not Found" as InvalidToken.
        RequestError::Api(ApiError::InvalidToken) => Error::CredentialsRejected {
            account: account.to_string(),
        },
        other => Error::Connection {
            account: account.to_string(),
            reason: other.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn message(value: serde_json::Value) -> Message {
        serde_json::from_value(value).expect("deserialize message")
    }

    #[test]
    fn private_text_message() {
        let msg = message(json!({
            "message_id": 17,
            "date": 1,
            "chat": { "id": 1001, "type": "private", "first_name": "Alice" },
            "from": {
                "id": 1001,
                "is_bot": false,
                "first_name": "Alice",
                "username": "alice"
            },
            "text": "hello there"
        }));

        let inbound = to_inbound("session_account1", &msg);
        assert_eq!(inbound.account, "session_account1");
        assert_eq!(inbound.chat_id, ChatId(1001));
        assert_eq!(inbound.message_id, MessageId(17));
        assert_eq!(inbound.sender, Some(Sender::new(1001, Some("alice"))));
        assert!(inbound.is_private);
        assert_eq!(inbound.text.as_deref(), Some("hello there"));
    }

    #[test]
    fn caption_stands_in_for_text() {
        let msg = message(json!({
            "message_id": 2,
            "date": 1,
            "chat": { "id": 5, "type": "private", "first_name": "Bob" },
            "from": { "id": 5, "is_bot": false, "first_name": "Bob" },
            "photo": [{
                "file_id": "p",
                "file_unique_id": "pu",
                "width": 10,
                "height": 10
            }],
            "caption": "look at this"
        }));

        let inbound = to_inbound("a", &msg);
        assert_eq!(inbound.text.as_deref(), Some("look at this"));
        assert_eq!(inbound.sender, Some(Sender::new(5, None)));
    }

    #[test]
    fn media_without_caption_has_no_text() {
        let msg = message(json!({
            "message_id": 3,
            "date": 1,
            "chat": { "id": 5, "type": "private", "first_name": "Bob" },
            "from": { "id": 5, "is_bot": false, "first_name": "Bob" },
            "location": { "latitude": 48.8566, "longitude": 2.3522 }
        }));

        assert_eq!(to_inbound("a", &msg).text, None);
    }

    #[test]
    fn group_message_is_not_private() {
        let msg = message(json!({
            "message_id": 4,
            "date": 1,
            "chat": { "id": -100123, "type": "supergroup", "title": "Team" },
            "from": { "id": 9, "is_bot": false, "first_name": "Eve" },
            "text": "hi all"
        }));

        let inbound = to_inbound("a", &msg);
        assert!(!inbound.is_private);
        assert_eq!(inbound.chat_id, ChatId(-100123));
    }

    #[test]
    fn rejected_token_is_credentials_error() {
        let err = connect_error("acc", RequestError::Api(ApiError::InvalidToken));
        assert!(matches!(err, Error::CredentialsRejected { ref account } if account == "acc"));

        let err = connect_error("acc", RequestError::Api(ApiError::BotBlocked));
        assert!(matches!(err, Error::Connection { .. }));
    }

    #[test]
    fn ids_convert_to_teloxide() {
        assert_eq!(tg_chat(ChatId(-5)), teloxide::types::ChatId(-5));
        assert_eq!(tg_msg_id(MessageId(9)), teloxide::types::MessageId(9));
    }
}
