use std::sync::Arc;

use anyhow::Context;
use tokio_util::sync::CancellationToken;

use fwd_core::{
    audit::AuditLogger,
    config::Config,
    control::AdminSet,
    filter::ForwardingContext,
    supervisor::{check_accounts, AccountStatus, Supervisor},
};
use fwd_telegram::TelegramTransport;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    fwd_core::logging::init("fwd")?;

    let cfg = Config::load().context("failed to load configuration")?;

    match std::env::args().nth(1).as_deref() {
        None | Some("run") => run(cfg).await,
        Some("check") => check(&cfg).await,
        Some(other) => anyhow::bail!("unknown subcommand '{other}' (expected 'run' or 'check')"),
    }
}

async fn run(cfg: Config) -> anyhow::Result<()> {
    let ctx = Arc::new(ForwardingContext::new(cfg.initial_filter()));
    let admins = Arc::new(AdminSet::new(cfg.admin_users.clone()));
    let audit = Arc::new(AuditLogger::new(cfg.audit_log_path.clone(), cfg.audit_log_json));

    println!("fwd started: {} account(s)", cfg.accounts.len());
    println!("Target chat: {}", cfg.target_chat_id.0);
    println!("Admins: {}", admins.len());
    if admins.is_empty() {
        tracing::warn!("no admin users configured; control commands are disabled");
    }

    let supervisor = Supervisor::new(
        Arc::new(TelegramTransport::new()),
        cfg.accounts.clone(),
        cfg.target_chat_id,
        ctx,
        admins,
    )
    .with_restart_delay(cfg.restart_delay)
    .with_audit(audit);

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("shutdown requested");
        }
        on_signal.cancel();
    });

    supervisor.run(cancel).await?;
    println!("fwd stopped");
    Ok(())
}

async fn check(cfg: &Config) -> anyhow::Result<()> {
    let transport = TelegramTransport::new();
    let results = check_accounts(&transport, &cfg.accounts).await;

    let mut failed = 0usize;
    for (session, status) in &results {
        match status {
            AccountStatus::Ok(me) => {
                let name = me.username.as_deref().unwrap_or(&me.first_name);
                println!("{session}: ok (@{name}, id {})", me.id.0);
            }
            AccountStatus::Unauthorized(reason) => {
                failed += 1;
                println!("{session}: unauthorized ({reason})");
            }
            AccountStatus::Error(reason) => {
                failed += 1;
                println!("{session}: error ({reason})");
            }
        }
    }

    if failed > 0 {
        anyhow::bail!("{failed} of {} account(s) failed", results.len());
    }
    Ok(())
}
