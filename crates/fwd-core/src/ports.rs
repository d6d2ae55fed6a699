use async_trait::async_trait;

use crate::{
    domain::{Account, ChatId, InboundMessage, UserId},
    Result,
};

/// Who a connected account is logged in as.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AccountIdentity {
    pub id: UserId,
    pub username: Option<String>,
    pub first_name: String,
}

/// Hexagonal port for the chat-protocol client library.
///
/// `connect` failures are fatal to the current supervisor iteration.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn connect(&self, account: &Account) -> Result<Box<dyn Connection>>;
}

/// One live source-account session.
#[async_trait]
pub trait Connection: Send + Sync {
    fn account(&self) -> &Account;

    async fn identity(&self) -> Result<AccountIdentity>;

    /// Wait for the next inbound message. An error means the event stream is
    /// gone and the connection cannot be used again.
    async fn next_event(&mut self) -> Result<InboundMessage>;

    /// Relay `msg` to `destination`. Failures only affect this message.
    async fn relay(&self, destination: ChatId, msg: &InboundMessage) -> Result<()>;

    /// Send a plain-text reply into `chat`.
    async fn reply(&self, chat: ChatId, text: &str) -> Result<()>;
}
