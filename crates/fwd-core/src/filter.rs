//! Filter state, forwarding gate and the shared context that guards both.

use std::{fmt, str::FromStr};

use tokio::sync::Mutex;

use crate::{
    domain::{InboundMessage, SenderRef},
    policy::{self, DispatchPath},
};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum FilterMode {
    #[default]
    None,
    Whitelist,
    Blacklist,
}

impl FilterMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Whitelist => "whitelist",
            Self::Blacklist => "blacklist",
        }
    }
}

impl fmt::Display for FilterMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FilterMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "none" => Ok(Self::None),
            "whitelist" => Ok(Self::Whitelist),
            "blacklist" => Ok(Self::Blacklist),
            other => Err(format!(
                "unknown filter mode '{other}' (expected none, whitelist or blacklist)"
            )),
        }
    }
}

/// Mutable admission settings.
///
/// Keyword lists keep insertion order. The list of the inactive mode is kept
/// as-is when the mode changes.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FilterState {
    pub mode: FilterMode,
    pub whitelist_keywords: Vec<String>,
    pub blacklist_keywords: Vec<String>,
    /// Empty means no sender restriction.
    pub allowed_senders: Vec<SenderRef>,
}

impl FilterState {
    pub fn set_mode(&mut self, mode: FilterMode) {
        self.mode = mode;
    }

    pub fn add_whitelist_keyword(&mut self, keyword: &str) -> bool {
        add_keyword(&mut self.whitelist_keywords, keyword)
    }

    pub fn remove_whitelist_keyword(&mut self, keyword: &str) -> bool {
        remove_keyword(&mut self.whitelist_keywords, keyword)
    }

    pub fn add_blacklist_keyword(&mut self, keyword: &str) -> bool {
        add_keyword(&mut self.blacklist_keywords, keyword)
    }

    pub fn remove_blacklist_keyword(&mut self, keyword: &str) -> bool {
        remove_keyword(&mut self.blacklist_keywords, keyword)
    }

    pub fn set_allowed_senders(&mut self, senders: Vec<SenderRef>) {
        let mut out: Vec<SenderRef> = Vec::with_capacity(senders.len());
        for s in senders {
            if !out.contains(&s) {
                out.push(s);
            }
        }
        self.allowed_senders = out;
    }

    /// Overwrite every field at once. Keyword lists go through the same
    /// normalization as the single-keyword operations.
    pub fn load_settings(
        &mut self,
        mode: FilterMode,
        whitelist: &[String],
        blacklist: &[String],
        allowed_senders: Vec<SenderRef>,
    ) {
        let mut next = FilterState {
            mode,
            ..FilterState::default()
        };
        for k in whitelist {
            next.add_whitelist_keyword(k);
        }
        for k in blacklist {
            next.add_blacklist_keyword(k);
        }
        next.set_allowed_senders(allowed_senders);
        *self = next;
    }

    pub fn dispatch_path(&self) -> DispatchPath {
        if self.allowed_senders.is_empty() {
            DispatchPath::AllPrivate
        } else {
            DispatchPath::SpecificSenders
        }
    }

    pub fn summary(&self) -> FilterSummary<'_> {
        FilterSummary(self)
    }
}

/// Returns true when the keyword was inserted.
fn add_keyword(list: &mut Vec<String>, keyword: &str) -> bool {
    let k = keyword.trim();
    if k.is_empty() {
        return false;
    }
    let lower = k.to_lowercase();
    if list.iter().any(|x| x.to_lowercase() == lower) {
        return false;
    }
    list.push(k.to_string());
    true
}

/// Returns true when something was removed.
fn remove_keyword(list: &mut Vec<String>, keyword: &str) -> bool {
    let lower = keyword.trim().to_lowercase();
    let before = list.len();
    list.retain(|x| x.to_lowercase() != lower);
    list.len() != before
}

/// Human-readable rendering of a filter state.
pub struct FilterSummary<'a>(&'a FilterState);

impl fmt::Display for FilterSummary<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let st = self.0;
        writeln!(f, "Filter mode: {}", st.mode)?;
        writeln!(f, "Whitelist: {}", join_or_empty(&st.whitelist_keywords))?;
        writeln!(f, "Blacklist: {}", join_or_empty(&st.blacklist_keywords))?;
        let senders = st
            .allowed_senders
            .iter()
            .map(|s| s.to_string())
            .collect::<Vec<_>>();
        if senders.is_empty() {
            write!(f, "Allowed senders: all private chats")
        } else {
            write!(f, "Allowed senders: {}", senders.join(", "))
        }
    }
}

pub fn join_or_empty(items: &[String]) -> String {
    if items.is_empty() {
        "(empty)".to_string()
    } else {
        items.join(", ")
    }
}

/// Master switch for forwarding.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Gate {
    pub enabled: bool,
}

impl Default for Gate {
    fn default() -> Self {
        Self { enabled: true }
    }
}

#[derive(Debug, Default)]
struct Shared {
    filter: FilterState,
    gate: Gate,
}

/// Process-wide forwarding settings, shared by every dispatcher and the
/// control handler. Filter state and gate sit behind a single lock.
#[derive(Debug, Default)]
pub struct ForwardingContext {
    inner: Mutex<Shared>,
}

impl ForwardingContext {
    pub fn new(filter: FilterState) -> Self {
        Self {
            inner: Mutex::new(Shared {
                filter,
                gate: Gate::default(),
            }),
        }
    }

    pub async fn load_settings(
        &self,
        mode: FilterMode,
        whitelist: &[String],
        blacklist: &[String],
        allowed_senders: Vec<SenderRef>,
    ) {
        let mut guard = self.inner.lock().await;
        guard
            .filter
            .load_settings(mode, whitelist, blacklist, allowed_senders);
    }

    pub async fn is_enabled(&self) -> bool {
        self.inner.lock().await.gate.enabled
    }

    /// Returns the previous value.
    pub async fn set_enabled(&self, enabled: bool) -> bool {
        let mut guard = self.inner.lock().await;
        std::mem::replace(&mut guard.gate.enabled, enabled)
    }

    pub async fn snapshot(&self) -> (FilterState, Gate) {
        let guard = self.inner.lock().await;
        (guard.filter.clone(), guard.gate)
    }

    /// Evaluate the admission policy against a consistent view of the state.
    pub async fn admits(&self, msg: &InboundMessage) -> bool {
        let guard = self.inner.lock().await;
        policy::should_forward(msg, &guard.filter, &guard.gate)
    }

    /// Apply a mutation to the filter state under the lock.
    pub async fn update<T>(&self, f: impl FnOnce(&mut FilterState) -> T) -> T {
        let mut guard = self.inner.lock().await;
        f(&mut guard.filter)
    }
}
