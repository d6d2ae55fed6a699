/// Core error type.
///
/// Adapter crates map their transport-specific errors into this type so the
/// supervisor can tell fatal failures (connect, disconnect) from per-message
/// ones (relay).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("account {account}: connection failed: {reason}")]
    Connection { account: String, reason: String },

    #[error("account {account}: credentials rejected")]
    CredentialsRejected { account: String },

    #[error("account {account}: event stream ended: {reason}")]
    Disconnected { account: String, reason: String },

    #[error("relay failed: {0}")]
    Relay(String),

    #[error("external error: {0}")]
    External(String),
}

pub type Result<T> = std::result::Result<T, Error>;
