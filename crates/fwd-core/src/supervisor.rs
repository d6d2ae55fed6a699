//! Keeps every source-account connection alive.
//!
//! One iteration connects all accounts (any failure aborts the iteration),
//! then runs one dispatcher task per connection. When the group fails, the
//! supervisor waits a fixed delay and starts over from the top. There is no
//! retry limit.

use std::{sync::Arc, time::Duration};

use tokio::{task::JoinSet, time::sleep};
use tokio_util::sync::CancellationToken;

use crate::{
    audit::{AuditEvent, AuditLogger},
    control::{AdminSet, ControlHandler},
    dispatcher::ForwardingDispatcher,
    domain::{Account, ChatId},
    errors::Error,
    filter::ForwardingContext,
    ports::{AccountIdentity, Transport},
    Result,
};

pub const DEFAULT_RESTART_DELAY: Duration = Duration::from_secs(60);

pub struct Supervisor {
    transport: Arc<dyn Transport>,
    accounts: Vec<Account>,
    destination: ChatId,
    ctx: Arc<ForwardingContext>,
    admins: Arc<AdminSet>,
    audit: Option<Arc<AuditLogger>>,
    restart_delay: Duration,
}

/// Disposes the iteration's control handler however the iteration ends,
/// including when its future is dropped on cancellation.
struct DisposeOnDrop(Arc<ControlHandler>);

impl Drop for DisposeOnDrop {
    fn drop(&mut self) {
        self.0.dispose();
    }
}

impl Supervisor {
    pub fn new(
        transport: Arc<dyn Transport>,
        accounts: Vec<Account>,
        destination: ChatId,
        ctx: Arc<ForwardingContext>,
        admins: Arc<AdminSet>,
    ) -> Self {
        Self {
            transport,
            accounts,
            destination,
            ctx,
            admins,
            audit: None,
            restart_delay: DEFAULT_RESTART_DELAY,
        }
    }

    pub fn with_restart_delay(mut self, delay: Duration) -> Self {
        self.restart_delay = delay;
        self
    }

    pub fn with_audit(mut self, audit: Arc<AuditLogger>) -> Self {
        self.audit = Some(audit);
        self
    }

    pub fn context(&self) -> Arc<ForwardingContext> {
        self.ctx.clone()
    }

    /// Run until `cancel` fires. Only returns an error for a configuration
    /// that can never work.
    pub async fn run(&self, cancel: CancellationToken) -> Result<()> {
        if self.accounts.is_empty() {
            return Err(Error::Config("no source accounts configured".to_string()));
        }

        let mut attempt: u64 = 0;
        loop {
            attempt += 1;
            tracing::info!(attempt, accounts = self.accounts.len(), "starting forwarding group");

            let outcome = tokio::select! {
                _ = cancel.cancelled() => return Ok(()),
                r = self.run_once() => r,
            };

            let reason = match outcome {
                Ok(()) => "all dispatchers stopped".to_string(),
                Err(e) => e.to_string(),
            };
            tracing::error!(attempt, "forwarding group failed: {reason}");
            if let Some(audit) = &self.audit {
                audit.record(AuditEvent::supervisor_restart(&reason));
            }
            tracing::info!("retrying in {}s", self.restart_delay.as_secs_f64());

            tokio::select! {
                _ = cancel.cancelled() => return Ok(()),
                _ = sleep(self.restart_delay) => {}
            }
        }
    }

    async fn run_once(&self) -> Result<()> {
        let mut connections = Vec::with_capacity(self.accounts.len());
        for account in &self.accounts {
            let conn = self.transport.connect(account).await?;
            tracing::info!(account = %account.session, "account connected");
            connections.push(conn);
        }

        let control = Arc::new(ControlHandler::new(
            self.ctx.clone(),
            self.admins.clone(),
            self.audit.clone(),
        ));
        let _dispose = DisposeOnDrop(control.clone());
        let dispatcher = Arc::new(ForwardingDispatcher::new(
            self.destination,
            self.ctx.clone(),
            control,
        ));

        let mut tasks = JoinSet::new();
        for conn in connections {
            let dispatcher = dispatcher.clone();
            tasks.spawn(async move { dispatcher.run(conn).await });
        }

        let mut result = Ok(());
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    result = Err(e);
                    break;
                }
                Err(e) => {
                    result = Err(Error::External(format!("dispatcher task failed: {e}")));
                    break;
                }
            }
        }
        tasks.abort_all();
        result
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AccountStatus {
    Ok(AccountIdentity),
    Unauthorized(String),
    Error(String),
}

impl AccountStatus {
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok(_))
    }

    fn from_error(e: Error) -> Self {
        match e {
            Error::CredentialsRejected { .. } => Self::Unauthorized(e.to_string()),
            other => Self::Error(other.to_string()),
        }
    }
}

/// Connect each account once and report who it is logged in as.
pub async fn check_accounts(
    transport: &dyn Transport,
    accounts: &[Account],
) -> Vec<(String, AccountStatus)> {
    let mut out = Vec::with_capacity(accounts.len());
    for account in accounts {
        let status = match transport.connect(account).await {
            Ok(conn) => match conn.identity().await {
                Ok(identity) => AccountStatus::Ok(identity),
                Err(e) => AccountStatus::from_error(e),
            },
            Err(e) => AccountStatus::from_error(e),
        };
        out.push((account.session.clone(), status));
    }
    out
}
