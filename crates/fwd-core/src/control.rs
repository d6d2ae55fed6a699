//! Control channel: authorizes admins and applies their commands to the
//! shared forwarding context.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use crate::{
    audit::{AuditEvent, AuditLogger},
    command::{self, Command, HELP_TEXT},
    domain::{Sender, SenderRef},
    filter::{join_or_empty, ForwardingContext},
};

/// Senders allowed to issue control commands. Fixed for the process lifetime.
#[derive(Clone, Debug, Default)]
pub struct AdminSet {
    admins: Vec<SenderRef>,
}

impl AdminSet {
    pub fn new(admins: Vec<SenderRef>) -> Self {
        Self { admins }
    }

    pub fn contains(&self, sender: Option<&Sender>) -> bool {
        let Some(sender) = sender else {
            return false;
        };
        self.admins.iter().any(|a| a.matches(sender))
    }

    pub fn len(&self) -> usize {
        self.admins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.admins.is_empty()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HandlerState {
    Armed,
    Disposed,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ControlOutcome {
    /// Sender is not an admin. Nothing was changed.
    Unauthorized,
    /// Text to send back to the command sender.
    Reply(String),
    /// Handler is disposed; the message was dropped.
    Ignored,
}

pub struct ControlHandler {
    ctx: Arc<ForwardingContext>,
    admins: Arc<AdminSet>,
    audit: Option<Arc<AuditLogger>>,
    disposed: AtomicBool,
}

impl ControlHandler {
    pub fn new(
        ctx: Arc<ForwardingContext>,
        admins: Arc<AdminSet>,
        audit: Option<Arc<AuditLogger>>,
    ) -> Self {
        Self {
            ctx,
            admins,
            audit,
            disposed: AtomicBool::new(false),
        }
    }

    pub fn state(&self) -> HandlerState {
        if self.disposed.load(Ordering::SeqCst) {
            HandlerState::Disposed
        } else {
            HandlerState::Armed
        }
    }

    /// Terminal: a disposed handler ignores every later message.
    pub fn dispose(&self) {
        self.disposed.store(true, Ordering::SeqCst);
    }

    pub fn is_admin(&self, sender: Option<&Sender>) -> bool {
        self.admins.contains(sender)
    }

    pub async fn handle(
        &self,
        account: &str,
        sender: Option<&Sender>,
        text: &str,
    ) -> ControlOutcome {
        if self.state() == HandlerState::Disposed {
            return ControlOutcome::Ignored;
        }

        let text = text.trim();
        if !self.admins.contains(sender) {
            tracing::warn!(
                account,
                sender = %display_sender(sender),
                "unauthorized control command"
            );
            self.audit(AuditEvent::unauthorized(sender, text).with_account(account));
            return ControlOutcome::Unauthorized;
        }

        let reply = match command::parse(text) {
            Ok(cmd) => self.execute(cmd).await,
            Err(e) => {
                tracing::info!(account, "rejected control command: {e}");
                format!("Error: {e}\nSend 'help' for the list of commands.")
            }
        };

        tracing::info!(
            account,
            sender = %display_sender(sender),
            command = text,
            "control command handled"
        );
        self.audit(AuditEvent::command(sender, text, &reply).with_account(account));
        ControlOutcome::Reply(reply)
    }

    async fn execute(&self, cmd: Command) -> String {
        match cmd {
            Command::Pause => {
                if self.ctx.set_enabled(false).await {
                    "Forwarding paused.".to_string()
                } else {
                    "Forwarding is already paused.".to_string()
                }
            }
            Command::Resume => {
                if self.ctx.set_enabled(true).await {
                    "Forwarding is already running.".to_string()
                } else {
                    "Forwarding resumed.".to_string()
                }
            }
            Command::Status => {
                let (filter, gate) = self.ctx.snapshot().await;
                let state = if gate.enabled { "running" } else { "paused" };
                format!("Forwarding: {state}\n{}", filter.summary())
            }
            Command::Help => HELP_TEXT.to_string(),
            Command::SetMode(mode) => {
                self.ctx.update(|f| f.set_mode(mode)).await;
                format!("Filter mode set to {mode}.")
            }
            Command::AddWhite(keywords) => {
                let list = self
                    .ctx
                    .update(|f| {
                        for k in &keywords {
                            f.add_whitelist_keyword(k);
                        }
                        f.whitelist_keywords.clone()
                    })
                    .await;
                format!("Whitelist: {}", join_or_empty(&list))
            }
            Command::DelWhite(keywords) => {
                let list = self
                    .ctx
                    .update(|f| {
                        for k in &keywords {
                            f.remove_whitelist_keyword(k);
                        }
                        f.whitelist_keywords.clone()
                    })
                    .await;
                format!("Whitelist: {}", join_or_empty(&list))
            }
            Command::AddBlack(keywords) => {
                let list = self
                    .ctx
                    .update(|f| {
                        for k in &keywords {
                            f.add_blacklist_keyword(k);
                        }
                        f.blacklist_keywords.clone()
                    })
                    .await;
                format!("Blacklist: {}", join_or_empty(&list))
            }
            Command::DelBlack(keywords) => {
                let list = self
                    .ctx
                    .update(|f| {
                        for k in &keywords {
                            f.remove_blacklist_keyword(k);
                        }
                        f.blacklist_keywords.clone()
                    })
                    .await;
                format!("Blacklist: {}", join_or_empty(&list))
            }
            Command::SetSenders(senders) => {
                let list = self
                    .ctx
                    .update(|f| {
                        f.set_allowed_senders(senders);
                        f.allowed_senders
                            .iter()
                            .map(|s| s.to_string())
                            .collect::<Vec<_>>()
                    })
                    .await;
                format!("Allowed senders: {}", list.join(", "))
            }
            Command::ClearSenders => {
                self.ctx.update(|f| f.set_allowed_senders(Vec::new())).await;
                "Sender restriction cleared. Forwarding from all private chats.".to_string()
            }
        }
    }

    fn audit(&self, event: AuditEvent) {
        if let Some(audit) = &self.audit {
            audit.record(event);
        }
    }
}

fn display_sender(sender: Option<&Sender>) -> String {
    sender
        .map(|s| s.to_string())
        .unwrap_or_else(|| "unknown".to_string())
}
