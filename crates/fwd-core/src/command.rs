//! Control command grammar.
//!
//! Keywords are matched case-insensitively. A leading `/` and a trailing
//! `@botname` on the keyword are accepted, so `/Pause@my_bot` parses as
//! `pause`.

use crate::{domain::SenderRef, filter::FilterMode};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    Pause,
    Resume,
    Status,
    Help,
    SetMode(FilterMode),
    AddWhite(Vec<String>),
    DelWhite(Vec<String>),
    AddBlack(Vec<String>),
    DelBlack(Vec<String>),
    SetSenders(Vec<SenderRef>),
    ClearSenders,
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("unknown command: {0}")]
    UnknownCommand(String),

    #[error("invalid arguments for {command}: {reason}")]
    InvalidArguments { command: String, reason: String },
}

pub const KEYWORDS: &[&str] = &[
    "pause",
    "resume",
    "status",
    "help",
    "setmode",
    "addwhite",
    "delwhite",
    "addblack",
    "delblack",
    "setsenders",
    "clearsenders",
];

pub const HELP_TEXT: &str = "Commands:
pause - stop forwarding
resume - start forwarding again
status - show forwarding state and filters
setmode <none|whitelist|blacklist> - change filter mode
addwhite <keyword...> / delwhite <keyword...> - edit whitelist
addblack <keyword...> / delblack <keyword...> - edit blacklist
setsenders <id|@username...> - only forward from these senders
clearsenders - forward from every private chat";

fn split_keyword(text: &str) -> (String, Vec<&str>) {
    let mut words = text.split_whitespace();
    let first = words.next().unwrap_or("");
    let keyword = first
        .trim_start_matches('/')
        .split('@')
        .next()
        .unwrap_or("")
        .to_lowercase();
    (keyword, words.collect())
}

/// True when the text should be routed to the control channel rather than
/// treated as a regular message.
///
/// The keyword must be known. A `/`-prefixed keyword is always a command, so
/// argument mistakes get an error reply; a bare keyword only counts when its
/// argument count fits, so prose like `status update: shipped` is forwarded.
pub fn is_control_directed(text: &str) -> bool {
    let trimmed = text.trim_start();
    let (keyword, args) = split_keyword(trimmed);
    if !KEYWORDS.contains(&keyword.as_str()) {
        return false;
    }
    trimmed.starts_with('/') || arity_fits(&keyword, args.len())
}

fn arity_fits(keyword: &str, nargs: usize) -> bool {
    match keyword {
        "pause" | "resume" | "status" | "help" | "clearsenders" => nargs == 0,
        "setmode" => nargs == 1,
        _ => nargs > 0,
    }
}

pub fn parse(text: &str) -> Result<Command, ParseError> {
    let (keyword, args) = split_keyword(text);

    let invalid = |reason: &str| ParseError::InvalidArguments {
        command: keyword.clone(),
        reason: reason.to_string(),
    };
    let no_args = |cmd: Command| {
        if args.is_empty() {
            Ok(cmd)
        } else {
            Err(invalid("takes no arguments"))
        }
    };
    let keywords = || {
        if args.is_empty() {
            Err(invalid("expected at least one keyword"))
        } else {
            Ok(args.iter().map(|s| s.to_string()).collect::<Vec<_>>())
        }
    };

    match keyword.as_str() {
        "pause" => no_args(Command::Pause),
        "resume" => no_args(Command::Resume),
        "status" => no_args(Command::Status),
        "help" => no_args(Command::Help),
        "clearsenders" => no_args(Command::ClearSenders),
        "setmode" => match args.as_slice() {
            [mode] => mode
                .parse::<FilterMode>()
                .map(Command::SetMode)
                .map_err(|e| invalid(&e)),
            [] => Err(invalid("expected a mode: none, whitelist or blacklist")),
            _ => Err(invalid("expected exactly one mode")),
        },
        "addwhite" => keywords().map(Command::AddWhite),
        "delwhite" => keywords().map(Command::DelWhite),
        "addblack" => keywords().map(Command::AddBlack),
        "delblack" => keywords().map(Command::DelBlack),
        "setsenders" => {
            let senders = args
                .iter()
                .filter_map(|s| SenderRef::parse(s))
                .collect::<Vec<_>>();
            if senders.is_empty() {
                Err(invalid("expected at least one sender id or @username"))
            } else {
                Ok(Command::SetSenders(senders))
            }
        }
        _ => Err(ParseError::UnknownCommand(
            text.split_whitespace().next().unwrap_or("").to_string(),
        )),
    }
}
