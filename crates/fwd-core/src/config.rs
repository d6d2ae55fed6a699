use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{
    domain::{Account, ChatId, SenderRef},
    errors::Error,
    filter::{FilterMode, FilterState},
    supervisor::DEFAULT_RESTART_DELAY,
    Result,
};

/// Typed configuration, read from the environment (and `.env`).
#[derive(Clone, Debug)]
pub struct Config {
    // Routing
    pub target_chat_id: ChatId,
    pub accounts_file: PathBuf,
    pub accounts: Vec<Account>,

    // Control channel
    pub admin_users: Vec<SenderRef>,

    // Initial filter settings
    pub filter_mode: FilterMode,
    pub whitelist_keywords: Vec<String>,
    pub blacklist_keywords: Vec<String>,
    pub allowed_senders: Vec<SenderRef>,

    // Supervisor
    pub restart_delay: Duration,

    // Audit
    pub audit_log_path: PathBuf,
    pub audit_log_json: bool,
}

impl Config {
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));
        Self::from_lookup(env_str)
    }

    /// Build the config from any key/value source.
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let target_raw = get("FORWARD_TARGET_CHAT_ID").unwrap_or_default();
        if target_raw.trim().is_empty() {
            return Err(Error::Config(
                "FORWARD_TARGET_CHAT_ID environment variable is required".to_string(),
            ));
        }
        let target_chat_id = target_raw.trim().parse::<i64>().map(ChatId).map_err(|_| {
            Error::Config(format!(
                "FORWARD_TARGET_CHAT_ID must be a numeric chat id, got '{}'",
                target_raw.trim()
            ))
        })?;

        let accounts_file = PathBuf::from(
            get("FORWARD_ACCOUNTS_FILE")
                .and_then(non_empty)
                .unwrap_or_else(|| "accounts.json".to_string()),
        );
        let accounts = load_accounts(&accounts_file)?;

        let admin_users = parse_csv_senders(get("FORWARD_ADMIN_USERS"));

        let filter_mode = match get("FORWARD_FILTER_MODE").and_then(non_empty) {
            Some(raw) => raw
                .parse::<FilterMode>()
                .map_err(|e| Error::Config(format!("FORWARD_FILTER_MODE: {e}")))?,
            None => FilterMode::None,
        };
        let whitelist_keywords = parse_csv(get("FORWARD_WHITELIST_KEYWORDS"));
        let blacklist_keywords = parse_csv(get("FORWARD_BLACKLIST_KEYWORDS"));
        let allowed_senders = parse_csv_senders(get("FORWARD_ALLOWED_SENDERS"));

        let restart_delay = match get("FORWARD_RESTART_DELAY_SECS").and_then(non_empty) {
            Some(raw) => Duration::from_secs(raw.trim().parse::<u64>().map_err(|_| {
                Error::Config(format!(
                    "FORWARD_RESTART_DELAY_SECS must be a whole number of seconds, got '{raw}'"
                ))
            })?),
            None => DEFAULT_RESTART_DELAY,
        };

        let audit_log_path = PathBuf::from(
            get("AUDIT_LOG_PATH")
                .and_then(non_empty)
                .unwrap_or_else(|| "/tmp/tg-forward-audit.log".to_string()),
        );
        let audit_log_json = match get("AUDIT_LOG_JSON") {
            Some(raw) => parse_flag("AUDIT_LOG_JSON", &raw)?,
            None => false,
        };

        Ok(Self {
            target_chat_id,
            accounts_file,
            accounts,
            admin_users,
            filter_mode,
            whitelist_keywords,
            blacklist_keywords,
            allowed_senders,
            restart_delay,
            audit_log_path,
            audit_log_json,
        })
    }

    /// Filter state to hand to `load_settings` at startup.
    pub fn initial_filter(&self) -> FilterState {
        let mut st = FilterState::default();
        st.load_settings(
            self.filter_mode,
            &self.whitelist_keywords,
            &self.blacklist_keywords,
            self.allowed_senders.clone(),
        );
        st
    }
}

fn load_accounts(path: &Path) -> Result<Vec<Account>> {
    let raw = fs::read_to_string(path).map_err(|e| {
        Error::Config(format!(
            "cannot read accounts file {}: {e}",
            path.display()
        ))
    })?;
    let accounts: Vec<Account> = serde_json::from_str(&raw).map_err(|e| {
        Error::Config(format!("invalid accounts file {}: {e}", path.display()))
    })?;

    if accounts.is_empty() {
        return Err(Error::Config(format!(
            "accounts file {} lists no accounts",
            path.display()
        )));
    }
    for (idx, acc) in accounts.iter().enumerate() {
        if acc.session.trim().is_empty() {
            return Err(Error::Config(format!(
                "account #{} in {} has an empty session name",
                idx + 1,
                path.display()
            )));
        }
        let api_id = acc.api_id.trim();
        if !api_id.is_empty() && api_id.parse::<i64>().is_err() {
            return Err(Error::Config(format!(
                "account '{}' in {}: api_id must be numeric, got '{api_id}'",
                acc.session,
                path.display()
            )));
        }
    }
    if let Some(dup) = accounts
        .iter()
        .enumerate()
        .find(|(i, a)| accounts[..*i].iter().any(|b| b.session == a.session))
        .map(|(_, a)| a.session.clone())
    {
        return Err(Error::Config(format!(
            "duplicate session name '{dup}' in {}",
            path.display()
        )));
    }

    Ok(accounts)
}

fn env_str(key: &str) -> Option<String> {
    env::var(key).ok()
}

/// Export `.env` entries that the process environment does not already set.
fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };
    for (key, value) in parse_dotenv(&contents) {
        if env::var_os(&key).is_none() {
            env::set_var(key, value);
        }
    }
}

/// `KEY=value` lines; `#` comments, blank lines and an `export ` prefix are
/// accepted. A value wrapped in matching quotes is taken literally.
fn parse_dotenv(contents: &str) -> Vec<(String, String)> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| {
            let line = line.strip_prefix("export ").unwrap_or(line);
            let (key, value) = line.split_once('=')?;
            let key = key.trim();
            if key.is_empty() {
                return None;
            }
            Some((key.to_string(), unquote(value.trim()).to_string()))
        })
        .collect()
}

fn unquote(value: &str) -> &str {
    for q in ['"', '\''] {
        if let Some(inner) = value
            .strip_prefix(q)
            .and_then(|rest| rest.strip_suffix(q))
        {
            return inner;
        }
    }
    value
}

fn parse_flag(key: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_lowercase().as_str() {
        "" | "0" | "false" | "no" | "off" => Ok(false),
        "1" | "true" | "yes" | "on" => Ok(true),
        other => Err(Error::Config(format!(
            "{key} must be a boolean (true/false), got '{other}'"
        ))),
    }
}

fn parse_csv(v: Option<String>) -> Vec<String> {
    v.unwrap_or_default()
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect()
}

fn parse_csv_senders(v: Option<String>) -> Vec<SenderRef> {
    parse_csv(v)
        .iter()
        .filter_map(|s| SenderRef::parse(s))
        .collect()
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn tmp_accounts(contents: &str) -> PathBuf {
        let ts = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or(Duration::from_secs(0))
            .as_nanos();
        let path = PathBuf::from(format!(
            "/tmp/fwd-accounts-{}-{ts}.json",
            std::process::id()
        ));
        fs::write(&path, contents).unwrap();
        path
    }

    fn lookup(pairs: &[(&str, String)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();
        move |k: &str| map.get(k).cloned()
    }

    const ONE_ACCOUNT: &str =
        r#"[{"session": "session_account1", "api_id": "123", "api_hash": "abc", "bot_token": "1:xyz"}]"#;

    #[test]
    fn loads_full_config() {
        let path = tmp_accounts(ONE_ACCOUNT);
        let cfg = Config::from_lookup(lookup(&[
            ("FORWARD_TARGET_CHAT_ID", "-100200".to_string()),
            ("FORWARD_ACCOUNTS_FILE", path.display().to_string()),
            ("FORWARD_ADMIN_USERS", "42, @owner".to_string()),
            ("FORWARD_FILTER_MODE", "Blacklist".to_string()),
            ("FORWARD_BLACKLIST_KEYWORDS", "spam, ads ,".to_string()),
            ("FORWARD_ALLOWED_SENDERS", "".to_string()),
            ("FORWARD_RESTART_DELAY_SECS", "5".to_string()),
            ("AUDIT_LOG_JSON", "yes".to_string()),
        ]))
        .unwrap();

        assert_eq!(cfg.target_chat_id, ChatId(-100200));
        assert_eq!(cfg.accounts.len(), 1);
        assert_eq!(cfg.accounts[0].bot_token.as_deref(), Some("1:xyz"));
        assert_eq!(
            cfg.admin_users,
            vec![SenderRef::Id(42), SenderRef::Username("owner".into())]
        );
        assert_eq!(cfg.filter_mode, FilterMode::Blacklist);
        assert_eq!(cfg.blacklist_keywords, vec!["spam", "ads"]);
        assert!(cfg.allowed_senders.is_empty());
        assert_eq!(cfg.restart_delay, Duration::from_secs(5));
        assert!(cfg.audit_log_json);

        let filter = cfg.initial_filter();
        assert_eq!(filter.mode, FilterMode::Blacklist);
        assert_eq!(filter.blacklist_keywords, vec!["spam", "ads"]);
        let _ = fs::remove_file(path);
    }

    #[test]
    fn defaults_apply() {
        let path = tmp_accounts(r#"[{"session": "a"}]"#);
        let cfg = Config::from_lookup(lookup(&[
            ("FORWARD_TARGET_CHAT_ID", "7".to_string()),
            ("FORWARD_ACCOUNTS_FILE", path.display().to_string()),
        ]))
        .unwrap();

        assert_eq!(cfg.filter_mode, FilterMode::None);
        assert_eq!(cfg.restart_delay, DEFAULT_RESTART_DELAY);
        assert!(cfg.admin_users.is_empty());
        assert!(cfg.accounts[0].bot_token.is_none());
        let _ = fs::remove_file(path);
    }

    #[test]
    fn rejects_bad_values() {
        let path = tmp_accounts(ONE_ACCOUNT);
        let file = path.display().to_string();

        let missing = Config::from_lookup(lookup(&[("FORWARD_ACCOUNTS_FILE", file.clone())]));
        assert!(matches!(missing, Err(Error::Config(_))));

        let bad_target = Config::from_lookup(lookup(&[
            ("FORWARD_TARGET_CHAT_ID", "@me".to_string()),
            ("FORWARD_ACCOUNTS_FILE", file.clone()),
        ]));
        assert!(matches!(bad_target, Err(Error::Config(_))));

        let bad_mode = Config::from_lookup(lookup(&[
            ("FORWARD_TARGET_CHAT_ID", "1".to_string()),
            ("FORWARD_ACCOUNTS_FILE", file),
            ("FORWARD_FILTER_MODE", "greylist".to_string()),
        ]));
        assert!(matches!(bad_mode, Err(Error::Config(_))));
        let _ = fs::remove_file(path);
    }

    #[test]
    fn rejects_bad_accounts_files() {
        for contents in [
            "[]",
            "not json",
            r#"[{"session": " "}]"#,
            r#"[{"session": "a"}, {"session": "a"}]"#,
            r#"[{"session": "a", "api_id": "abc", "api_hash": "h"}]"#,
        ] {
            let path = tmp_accounts(contents);
            let res = Config::from_lookup(lookup(&[
                ("FORWARD_TARGET_CHAT_ID", "1".to_string()),
                ("FORWARD_ACCOUNTS_FILE", path.display().to_string()),
            ]));
            assert!(matches!(res, Err(Error::Config(_))), "accepted: {contents}");
            let _ = fs::remove_file(path);
        }
    }

    #[test]
    fn parses_dotenv_lines() {
        let pairs = parse_dotenv(
            "# forwarder\n\
             FORWARD_TARGET_CHAT_ID=-100200\n\
             export FORWARD_FILTER_MODE = \"whitelist\"\n\
             FORWARD_WHITELIST_KEYWORDS='vip, urgent'\n\
             =orphan\n\
             not a pair\n\
             AUDIT_LOG_JSON=\"\n",
        );
        assert_eq!(
            pairs,
            vec![
                ("FORWARD_TARGET_CHAT_ID".to_string(), "-100200".to_string()),
                ("FORWARD_FILTER_MODE".to_string(), "whitelist".to_string()),
                ("FORWARD_WHITELIST_KEYWORDS".to_string(), "vip, urgent".to_string()),
                ("AUDIT_LOG_JSON".to_string(), "\"".to_string()),
            ]
        );
    }

    #[test]
    fn audit_json_flag_must_be_boolean() {
        assert!(parse_flag("AUDIT_LOG_JSON", " On ").unwrap());
        assert!(!parse_flag("AUDIT_LOG_JSON", "no").unwrap());
        assert!(!parse_flag("AUDIT_LOG_JSON", "").unwrap());

        let path = tmp_accounts(ONE_ACCOUNT);
        let res = Config::from_lookup(lookup(&[
            ("FORWARD_TARGET_CHAT_ID", "1".to_string()),
            ("FORWARD_ACCOUNTS_FILE", path.display().to_string()),
            ("AUDIT_LOG_JSON", "sometimes".to_string()),
        ]));
        assert!(matches!(res, Err(Error::Config(_))));
        let _ = fs::remove_file(path);
    }
}
