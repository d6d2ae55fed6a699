//! Telegram adapter (teloxide).
//!
//! This crate implements the `fwd-core` Transport/Connection ports over the
//! Telegram Bot API. Each account is one bot token, long-polled on its own.

use std::{collections::VecDeque, time::Duration};

use async_trait::async_trait;

use teloxide::{
    prelude::*,
    types::{AllowedUpdate, UpdateKind},
    ApiError, RequestError,
};

use tokio::time::sleep;

pub mod convert;

use fwd_core::{
    domain::{Account, ChatId, InboundMessage},
    errors::Error,
    ports::{AccountIdentity, Connection, Transport},
    Result,
};

use crate::convert::{connect_error, identity_from_me, tg_chat, tg_msg_id, to_inbound};

/// Long-poll timeout sent to `getUpdates`, in seconds.
const POLL_TIMEOUT_SECS: u32 = 30;
/// HTTP client timeout; must outlast the long poll.
const CLIENT_TIMEOUT: Duration = Duration::from_secs(45);
const POLL_ERROR_BACKOFF: Duration = Duration::from_secs(5);
/// Consecutive polling failures before the stream is declared dead.
const MAX_POLL_FAILURES: u32 = 12;

/// Opens one long-polling bot session per account.
#[derive(Clone, Debug, Default)]
pub struct TelegramTransport;

impl TelegramTransport {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Transport for TelegramTransport {
    async fn connect(&self, account: &Account) -> Result<Box<dyn Connection>> {
        let token = account
            .bot_token
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| Error::Connection {
                account: account.session.clone(),
                reason: "no bot_token configured".to_string(),
            })?;

        let client = teloxide::net::default_reqwest_settings()
            .timeout(CLIENT_TIMEOUT)
            .build()
            .map_err(|e| Error::Connection {
                account: account.session.clone(),
                reason: format!("http client: {e}"),
            })?;
        let bot = Bot::with_client(token, client);

        let me = bot
            .get_me()
            .await
            .map_err(|e| connect_error(&account.session, e))?;
        let identity = identity_from_me(&me);

        // Long polling does not work while a webhook is set.
        bot.delete_webhook()
            .await
            .map_err(|e| connect_error(&account.session, e))?;

        tracing::info!(
            account = %account.session,
            username = ?identity.username,
            "telegram session connected"
        );

        Ok(Box::new(TelegramConnection {
            account: account.clone(),
            bot,
            identity,
            offset: 0,
            pending: VecDeque::new(),
        }))
    }
}

pub struct TelegramConnection {
    account: Account,
    bot: Bot,
    identity: AccountIdentity,
    offset: i32,
    pending: VecDeque<Message>,
}

impl TelegramConnection {
    fn disconnected(&self, reason: impl Into<String>) -> Error {
        Error::Disconnected {
            account: self.account.session.clone(),
            reason: reason.into(),
        }
    }

    async fn with_retry<T, Fut>(&self, mut op: impl FnMut() -> Fut) -> Result<T>
    where
        Fut: std::future::IntoFuture<Output = std::result::Result<T, RequestError>>,
        Fut::IntoFuture: Send,
    {
        const MAX_RETRIES: usize = 1;
        let mut attempts = 0usize;
        loop {
            match op().await {
                Ok(v) => return Ok(v),
                Err(e) => match e {
                    RequestError::RetryAfter(wait) if attempts < MAX_RETRIES => {
                        attempts += 1;
                        sleep(wait.duration()).await;
                        continue;
                    }
                    other => return Err(Error::Relay(format!("telegram error: {other}"))),
                },
            }
        }
    }
}

#[async_trait]
impl Connection for TelegramConnection {
    fn account(&self) -> &Account {
        &self.account
    }

    async fn identity(&self) -> Result<AccountIdentity> {
        Ok(self.identity.clone())
    }

    async fn next_event(&mut self) -> Result<InboundMessage> {
        let mut failures = 0u32;
        loop {
            if let Some(msg) = self.pending.pop_front() {
                return Ok(to_inbound(&self.account.session, &msg));
            }

            let result = self
                .bot
                .get_updates()
                .offset(self.offset)
                .timeout(POLL_TIMEOUT_SECS)
                .allowed_updates(vec![AllowedUpdate::Message])
                .await;

            match result {
                Ok(updates) => {
                    failures = 0;
                    for update in updates {
                        self.offset = update.id.as_offset();
                        if let UpdateKind::Message(msg) = update.kind {
                            self.pending.push_back(msg);
                        }
                    }
                }
                Err(RequestError::Api(ApiError::TerminatedByOtherGetUpdates)) => {
                    return Err(
                        self.disconnected("another instance is polling with this token")
                    );
                }
                Err(RequestError::Api(ApiError::InvalidToken)) => {
                    return Err(self.disconnected("bot token revoked"));
                }
                Err(RequestError::RetryAfter(wait)) => {
                    sleep(wait.duration()).await;
                }
                Err(e) => {
                    failures += 1;
                    if failures >= MAX_POLL_FAILURES {
                        return Err(self.disconnected(format!("polling failed: {e}")));
                    }
                    tracing::warn!(
                        account = %self.account.session,
                        attempt = failures,
                        "telegram polling error: {e}"
                    );
                    sleep(POLL_ERROR_BACKOFF).await;
                }
            }
        }
    }

    async fn relay(&self, destination: ChatId, msg: &InboundMessage) -> Result<()> {
        self.with_retry(|| {
            self.bot.forward_message(
                tg_chat(destination),
                tg_chat(msg.chat_id),
                tg_msg_id(msg.message_id),
            )
        })
        .await?;
        Ok(())
    }

    async fn reply(&self, chat: ChatId, text: &str) -> Result<()> {
        self.with_retry(|| self.bot.send_message(tg_chat(chat), text.to_string()))
            .await?;
        Ok(())
    }
}
