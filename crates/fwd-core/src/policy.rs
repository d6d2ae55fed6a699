//! Admission policy: decides whether an inbound message is relayed.

use crate::{
    domain::InboundMessage,
    filter::{FilterMode, FilterState, Gate},
};

/// Which source restriction is in effect.
///
/// `AllPrivate` (no allowed senders configured) only admits private chats.
/// `SpecificSenders` admits listed senders from any chat.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DispatchPath {
    AllPrivate,
    SpecificSenders,
}

pub fn should_forward(msg: &InboundMessage, filter: &FilterState, gate: &Gate) -> bool {
    if !gate.enabled {
        return false;
    }

    match filter.dispatch_path() {
        DispatchPath::AllPrivate => {
            if !msg.is_private {
                return false;
            }
        }
        DispatchPath::SpecificSenders => {
            let Some(sender) = &msg.sender else {
                return false;
            };
            if !filter.allowed_senders.iter().any(|r| r.matches(sender)) {
                return false;
            }
        }
    }

    match msg.text.as_deref() {
        // Media without text always passes the keyword filter.
        None => true,
        Some(text) => keyword_verdict(text, filter),
    }
}

/// Keyword half of the policy, for a message that has text.
pub fn keyword_verdict(text: &str, filter: &FilterState) -> bool {
    let text = text.to_lowercase();
    let contains = |k: &String| text.contains(&k.to_lowercase());

    match filter.mode {
        FilterMode::None => true,
        FilterMode::Whitelist => filter.whitelist_keywords.iter().any(contains),
        FilterMode::Blacklist => !filter.blacklist_keywords.iter().any(contains),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ChatId, MessageId, Sender, SenderRef};

    fn msg(text: Option<&str>) -> InboundMessage {
        InboundMessage {
            account: "acc1".to_string(),
            chat_id: ChatId(42),
            message_id: MessageId(1),
            sender: Some(Sender::new(42, Some("someone"))),
            is_private: true,
            text: text.map(|s| s.to_string()),
        }
    }

    fn state(mode: FilterMode, white: &[&str], black: &[&str]) -> FilterState {
        let mut st = FilterState::default();
        st.set_mode(mode);
        for k in white {
            st.add_whitelist_keyword(k);
        }
        for k in black {
            st.add_blacklist_keyword(k);
        }
        st
    }

    const ON: Gate = Gate { enabled: true };
    const OFF: Gate = Gate { enabled: false };

    #[test]
    fn mode_none_forwards_text_and_media() {
        let st = state(FilterMode::None, &[], &[]);
        assert!(should_forward(&msg(Some("anything")), &st, &ON));
        assert!(should_forward(&msg(None), &st, &ON));
    }

    #[test]
    fn empty_whitelist_blocks_all_text() {
        let st = state(FilterMode::Whitelist, &[], &[]);
        assert!(!should_forward(&msg(Some("hello")), &st, &ON));
        assert!(!should_forward(&msg(Some("")), &st, &ON));
    }

    #[test]
    fn empty_blacklist_passes_all_text() {
        let st = state(FilterMode::Blacklist, &[], &[]);
        assert!(should_forward(&msg(Some("hello")), &st, &ON));
    }

    #[test]
    fn keyword_match_is_case_insensitive() {
        let st = state(FilterMode::Whitelist, &["Bot"], &[]);
        assert!(should_forward(&msg(Some("this is a bot message")), &st, &ON));

        let st = state(FilterMode::Whitelist, &["urgent"], &[]);
        assert!(should_forward(&msg(Some("URGENT: call now")), &st, &ON));
        assert!(!should_forward(&msg(Some("call later")), &st, &ON));
    }

    #[test]
    fn blacklist_hit_blocks() {
        let st = state(FilterMode::Blacklist, &[], &["spam"]);
        assert!(!should_forward(&msg(Some("buy spam now")), &st, &ON));
        assert!(should_forward(&msg(Some("buy eggs now")), &st, &ON));
    }

    #[test]
    fn inactive_list_is_inert() {
        let st = state(FilterMode::Blacklist, &["needed"], &[]);
        assert!(should_forward(&msg(Some("nothing relevant")), &st, &ON));
    }

    #[test]
    fn media_passes_keyword_filter() {
        let st = state(FilterMode::Whitelist, &[], &[]);
        assert!(should_forward(&msg(None), &st, &ON));
    }

    #[test]
    fn closed_gate_blocks_everything() {
        for st in [
            state(FilterMode::None, &[], &[]),
            state(FilterMode::Whitelist, &["a"], &[]),
            state(FilterMode::Blacklist, &[], &[]),
        ] {
            assert!(!should_forward(&msg(Some("a")), &st, &OFF));
            assert!(!should_forward(&msg(None), &st, &OFF));
        }
    }

    #[test]
    fn all_private_path_requires_private_chat() {
        let st = state(FilterMode::None, &[], &[]);
        let mut m = msg(Some("group chatter"));
        m.is_private = false;
        assert!(!should_forward(&m, &st, &ON));
    }

    #[test]
    fn specific_senders_path_checks_sender_not_privacy() {
        let mut st = state(FilterMode::None, &[], &[]);
        st.set_allowed_senders(vec![SenderRef::Username("SomeOne".into())]);

        let mut m = msg(Some("from a group"));
        m.is_private = false;
        assert!(should_forward(&m, &st, &ON));

        m.sender = Some(Sender::new(99, Some("stranger")));
        assert!(!should_forward(&m, &st, &ON));

        m.sender = None;
        assert!(!should_forward(&m, &st, &ON));
    }

    #[test]
    fn decision_is_deterministic() {
        let st = state(FilterMode::Whitelist, &["x"], &["y"]);
        let m = msg(Some("xy"));
        let first = should_forward(&m, &st, &ON);
        for _ in 0..10 {
            assert_eq!(should_forward(&m, &st, &ON), first);
        }
    }
}
