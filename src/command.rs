//! Client → server command parsing
//!
//! One inbound unit (a line, or a WebSocket text message) is either a
//! slash command or a chat payload. Parsing is transport independent.

/// Default number of lines for `/history`
pub const DEFAULT_HISTORY_LINES: usize = 20;

/// Upper bound for `/history N`
pub const MAX_HISTORY_LINES: usize = 100;

pub const PM_USAGE: &str = "/pm <닉네임> <메시지>";
pub const HISTORY_USAGE: &str = "/history [개수]";

/// A parsed client command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientCommand {
    /// `/nick <name>`; the argument is validated by the server
    Nick(String),
    /// `/join <room>`
    Join(String),
    /// `/leave`
    Leave,
    /// `/users` or `/list`
    Users,
    /// `/help`
    Help,
    /// `/quit`
    Quit,
    /// `/pm <nick> <message>`
    PrivateMessage { target: String, body: String },
    /// `/history [N]`
    History(usize),
    /// Plain chat text
    Chat(String),
    /// A known command used with bad arguments
    Usage(&'static str),
    /// A `/` token that is not a command
    Unknown(String),
    /// Blank input
    Empty,
}

impl ClientCommand {
    /// Classify one unit of input.
    pub fn parse(input: &str) -> Self {
        let line = input.trim_end_matches(['\r', '\n']);
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return ClientCommand::Empty;
        }
        if !trimmed.starts_with('/') {
            return ClientCommand::Chat(line.to_string());
        }

        let (cmd, rest) = match trimmed.split_once(char::is_whitespace) {
            Some((cmd, rest)) => (cmd, rest.trim()),
            None => (trimmed, ""),
        };

        match cmd {
            "/nick" => ClientCommand::Nick(rest.to_string()),
            "/join" => ClientCommand::Join(rest.to_string()),
            "/leave" => ClientCommand::Leave,
            "/users" | "/list" => ClientCommand::Users,
            "/help" => ClientCommand::Help,
            "/quit" => ClientCommand::Quit,
            "/pm" => match rest.split_once(char::is_whitespace) {
                Some((target, body)) if !body.trim().is_empty() => ClientCommand::PrivateMessage {
                    target: target.to_string(),
                    body: body.trim().to_string(),
                },
                _ => ClientCommand::Usage(PM_USAGE),
            },
            "/history" => {
                if rest.is_empty() {
                    ClientCommand::History(DEFAULT_HISTORY_LINES)
                } else {
                    match rest.parse::<usize>() {
                        Ok(n) if n > 0 => ClientCommand::History(n.min(MAX_HISTORY_LINES)),
                        _ => ClientCommand::Usage(HISTORY_USAGE),
                    }
                }
            }
            other => ClientCommand::Unknown(other.to_string()),
        }
    }
}
