//! IRC message types.
//! This is a minimal parser/formatter for IRC protocol lines:
//! `[":" prefix SP] command *(SP param) [SP ":" trailing]`.

use std::borrow::Cow;
use std::fmt;

pub const RPL_WELCOME: &str = "001";
pub const RPL_YOURHOST: &str = "002";
pub const RPL_CREATED: &str = "003";
pub const RPL_MYINFO: &str = "004";
pub const RPL_ISUPPORT: &str = "005";
pub const RPL_STATSCONN: &str = "250";
pub const RPL_LUSERCLIENT: &str = "251";
pub const RPL_LUSEROP: &str = "252";
pub const RPL_LUSERUNKNOWN: &str = "253";
pub const RPL_LUSERCHANNELS: &str = "254";
pub const RPL_LUSERME: &str = "255";
pub const RPL_LOCALUSERS: &str = "265";
pub const RPL_GLOBALUSERS: &str = "266";
pub const RPL_TOPIC: &str = "332";
pub const RPL_TOPICWHOTIME: &str = "333";
pub const RPL_NAMREPLY: &str = "353";
pub const RPL_ENDOFNAMES: &str = "366";
pub const RPL_MOTD: &str = "372";
pub const RPL_MOTDSTART: &str = "375";
pub const RPL_ENDOFMOTD: &str = "376";
pub const RPL_HOSTHIDDEN: &str = "396";
pub const ERR_NOMOTD: &str = "422";

/// Command of the placeholder message a producer hands to the writer when
/// it has nothing to send. Can never come off the wire: `:` is not a valid
/// command character.
pub const NOOP_COMMAND: &str = ":::";

/// Why a raw line could not be turned into a [`Message`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("empty line")]
    Empty,
    #[error("prefix without a command")]
    MissingCommand,
    #[error("invalid command {0:?}")]
    InvalidCommand(String),
}

/// A parsed IRC message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Origin of the message (`nick!user@host` or a server name), without
    /// the leading `:`.
    pub prefix: Option<String>,
    pub command: String,
    /// Parameters in wire order. A trailing parameter is stored without
    /// its `:` marker and is never split on spaces.
    pub params: Vec<String>,
}

impl Message {
    /// Parse a raw IRC line. Trailing CR/LF is ignored.
    pub fn parse(line: &str) -> Result<Self, ParseError> {
        let line = line.trim_end_matches(['\r', '\n']);
        if line.trim().is_empty() {
            return Err(ParseError::Empty);
        }

        let mut rest = line;

        // Prefix: :server or :nick!user@host
        let prefix = if let Some(stripped) = rest.strip_prefix(':') {
            let (pfx, remainder) = stripped
                .split_once(' ')
                .ok_or(ParseError::MissingCommand)?;
            rest = remainder.trim_start_matches(' ');
            Some(pfx.to_string())
        } else {
            None
        };

        let (command, remainder) = rest.split_once(' ').unwrap_or((rest, ""));
        if command.is_empty() {
            return Err(ParseError::MissingCommand);
        }
        if !is_valid_command(command) {
            return Err(ParseError::InvalidCommand(command.to_string()));
        }

        Ok(Message {
            prefix,
            command: command.to_ascii_uppercase(),
            params: split_params(remainder),
        })
    }

    pub fn new(command: &str, params: Vec<&str>) -> Self {
        Self {
            prefix: None,
            command: command.to_string(),
            params: params.into_iter().map(|s| s.to_string()).collect(),
        }
    }

    /// The "nothing to send" placeholder. The writer drops it.
    pub fn noop() -> Self {
        Self::new(NOOP_COMMAND, vec![])
    }

    pub fn is_noop(&self) -> bool {
        self.command == NOOP_COMMAND
    }

    /// Nick part of the prefix (everything before `!`).
    pub fn source_nick(&self) -> Option<&str> {
        self.prefix
            .as_deref()
            .and_then(|p| p.split('!').next())
            .filter(|n| !n.is_empty())
    }
}

/// Alphabetic keyword or three-digit numeric reply.
fn is_valid_command(command: &str) -> bool {
    command.bytes().all(|b| b.is_ascii_alphabetic())
        || (command.len() == 3 && command.bytes().all(|b| b.is_ascii_digit()))
}

/// Split the parameter part of a line, left to right. Leading spaces are
/// skipped before each parameter; text starting with `:`, or with no
/// further space, becomes the final parameter.
fn split_params(mut rest: &str) -> Vec<String> {
    let mut params = Vec::new();
    loop {
        rest = rest.trim_start_matches(' ');
        if rest.is_empty() {
            break;
        }
        if let Some(trailing) = rest.strip_prefix(':') {
            params.push(trailing.to_string());
            break;
        }
        match rest.split_once(' ') {
            Some((param, remainder)) => {
                params.push(param.to_string());
                rest = remainder;
            }
            None => {
                params.push(rest.to_string());
                break;
            }
        }
    }
    params
}

/// CR and LF end a line on the wire and NUL is not allowed in one, so
/// none of them are ever written out.
fn wire_safe(s: &str) -> Cow<'_, str> {
    const FORBIDDEN: [char; 3] = ['\r', '\n', '\0'];
    if s.contains(FORBIDDEN) {
        Cow::Owned(s.replace(FORBIDDEN, ""))
    } else {
        Cow::Borrowed(s)
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(ref prefix) = self.prefix {
            write!(f, ":{} ", wire_safe(prefix.trim_start_matches(':')))?;
        }
        write!(f, "{}", wire_safe(&self.command))?;
        let last = self.params.len().saturating_sub(1);
        for (i, param) in self.params.iter().enumerate() {
            let param = wire_safe(param);
            if i == last && (param.contains(' ') || param.starts_with(':') || param.is_empty()) {
                write!(f, " :{param}")?;
            } else {
                write!(f, " {param}")?;
            }
        }
        Ok(())
    }
}
