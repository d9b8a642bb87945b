//! Input line parsing.

use std::path::PathBuf;

use thiserror::Error;

/// One line of user input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Plain text: send as a chat message
    Say(String),
    /// `/connect <address> [name]`
    Connect {
        /// Partner address
        address: String,
        /// Name to show until the partner answers
        name: Option<String>,
    },
    /// `/accept`
    Accept,
    /// `/reject`
    Reject,
    /// `/withdraw`
    Withdraw,
    /// `/disconnect`
    Disconnect,
    /// `/file <path>`
    SendFile(PathBuf),
    /// `/cancel`
    Cancel,
    /// `/seen <id>`
    Seen(String),
    /// `/status`
    Status,
    /// `/quit`
    Quit,
}

/// Input that is not a valid command.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// Blank line
    #[error("nothing to send")]
    Empty,
    /// Command exists but an argument is missing
    #[error("usage: {0}")]
    MissingArgument(&'static str),
    /// Unrecognized `/command`
    #[error("unknown command: /{0}")]
    Unknown(String),
}

impl Command {
    /// Parse one input line. Lines not starting with `/` are chat text; `//`
    /// escapes a leading slash.
    pub fn parse(line: &str) -> Result<Self, ParseError> {
        let line = line.trim_end_matches(['\r', '\n']);
        if line.trim().is_empty() {
            return Err(ParseError::Empty);
        }

        if let Some(text) = line.strip_prefix("//") {
            return Ok(Self::Say(format!("/{text}")));
        }
        let Some(rest) = line.strip_prefix('/') else {
            return Ok(Self::Say(line.to_string()));
        };

        let (name, argument) = match rest.split_once(char::is_whitespace) {
            Some((name, argument)) => (name, argument.trim()),
            None => (rest, ""),
        };

        match name {
            "connect" => {
                let mut parts = argument.split_whitespace();
                let address = parts
                    .next()
                    .ok_or(ParseError::MissingArgument("/connect <address> [name]"))?
                    .to_string();
                let name = parts.next().map(str::to_string);
                Ok(Self::Connect { address, name })
            },
            "accept" => Ok(Self::Accept),
            "reject" => Ok(Self::Reject),
            "withdraw" => Ok(Self::Withdraw),
            "disconnect" => Ok(Self::Disconnect),
            "file" if argument.is_empty() => Err(ParseError::MissingArgument("/file <path>")),
            "file" => Ok(Self::SendFile(PathBuf::from(argument))),
            "cancel" => Ok(Self::Cancel),
            "seen" if argument.is_empty() => Err(ParseError::MissingArgument("/seen <id>")),
            "seen" => Ok(Self::Seen(argument.to_string())),
            "status" => Ok(Self::Status),
            "quit" | "exit" => Ok(Self::Quit),
            other => Err(ParseError::Unknown(other.to_string())),
        }
    }
}
