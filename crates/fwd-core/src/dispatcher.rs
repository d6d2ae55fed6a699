//! Per-account forwarding loop.

use std::sync::Arc;

use crate::{
    command,
    control::{ControlHandler, ControlOutcome},
    domain::{ChatId, InboundMessage},
    filter::ForwardingContext,
    ports::Connection,
    Result,
};

/// What happened to one inbound message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Disposition {
    Forwarded,
    Filtered,
    RelayFailed(String),
    Control(ControlOutcome),
}

pub struct ForwardingDispatcher {
    destination: ChatId,
    ctx: Arc<ForwardingContext>,
    control: Arc<ControlHandler>,
}

impl ForwardingDispatcher {
    pub fn new(
        destination: ChatId,
        ctx: Arc<ForwardingContext>,
        control: Arc<ControlHandler>,
    ) -> Self {
        Self {
            destination,
            ctx,
            control,
        }
    }

    /// Listen until the connection's event stream fails.
    pub async fn run(&self, mut conn: Box<dyn Connection>) -> Result<()> {
        let account = conn.account().session.clone();
        tracing::info!(account = %account, "dispatcher listening");

        loop {
            let msg = conn.next_event().await?;
            self.dispatch(conn.as_ref(), &msg).await;
        }
    }

    /// Route a single message: control command, relay, or drop.
    pub async fn dispatch(&self, conn: &dyn Connection, msg: &InboundMessage) -> Disposition {
        let sender = msg.sender.as_ref();
        let sender_label = sender
            .map(|s| s.to_string())
            .unwrap_or_else(|| "unknown".to_string());

        if let Some(text) = msg.text.as_deref() {
            if self.control.is_admin(sender) && command::is_control_directed(text) {
                let outcome = self.control.handle(&msg.account, sender, text).await;
                if let ControlOutcome::Reply(reply) = &outcome {
                    if let Err(e) = conn.reply(msg.chat_id, reply).await {
                        tracing::warn!(
                            account = %msg.account,
                            chat = msg.chat_id.0,
                            "control reply failed: {e}"
                        );
                    }
                }
                return Disposition::Control(outcome);
            }
        }

        if !self.ctx.admits(msg).await {
            tracing::info!(
                account = %msg.account,
                sender = %sender_label,
                "message filtered"
            );
            return Disposition::Filtered;
        }

        match conn.relay(self.destination, msg).await {
            Ok(()) => {
                tracing::info!(
                    account = %msg.account,
                    sender = %sender_label,
                    "message forwarded"
                );
                Disposition::Forwarded
            }
            Err(e) => {
                tracing::warn!(
                    account = %msg.account,
                    sender = %sender_label,
                    "relay failed: {e}"
                );
                Disposition::RelayFailed(e.to_string())
            }
        }
    }
}
