//! Inbound text commands.

use std::fmt;

use crate::error::{DomainError, DomainResult};

/// Maximum accepted task name length in characters.
pub const MAX_TASK_NAME_LEN: usize = 64;

/// A command typed by the user into a chat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `/start` - begin work, or a break after work ended
    Start,

    /// `/stop` - end the running phase or reset to idle
    Stop,

    /// `/tasks ...` - task list management
    Tasks(TaskCommand),

    /// Anything else, kept verbatim for the reply
    Unknown(String),
}

/// Sub-commands of `/tasks`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskCommand {
    List,
    Add(String),
    Set(String),
    Delete(String),
}

impl Command {
    /// Parses one line of chat input.
    ///
    /// A `@botname` suffix on the command word is ignored, so `/start@pomo_bot`
    /// parses like `/start`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidTaskName` when a task sub-command that needs
    /// a name is given none, or the name is too long.
    pub fn parse(text: &str) -> DomainResult<Self> {
        let text = text.trim();
        let (word, rest) = match text.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (text, ""),
        };
        let word = word.split('@').next().unwrap_or(word);

        match word {
            "/start" => Ok(Self::Start),
            "/stop" => Ok(Self::Stop),
            "/tasks" => TaskCommand::parse(rest).map(Self::Tasks),
            _ => Ok(Self::Unknown(text.to_string())),
        }
    }
}

impl TaskCommand {
    fn parse(args: &str) -> DomainResult<Self> {
        let (sub, name) = match args.split_once(char::is_whitespace) {
            Some((sub, name)) => (sub, name.trim()),
            None => (args, ""),
        };

        match sub {
            "" | "list" => Ok(Self::List),
            "add" => validate_task_name(name).map(Self::Add),
            "set" => validate_task_name(name).map(Self::Set),
            "delete" => validate_task_name(name).map(Self::Delete),
            other => Err(DomainError::ParseError {
                field: "tasks".to_string(),
                reason: format!("unknown sub-command '{other}'"),
            }),
        }
    }
}

fn validate_task_name(name: &str) -> DomainResult<String> {
    if name.is_empty() {
        return Err(DomainError::InvalidTaskName {
            name: name.to_string(),
            reason: "name is empty".to_string(),
        });
    }
    if name.chars().count() > MAX_TASK_NAME_LEN {
        return Err(DomainError::InvalidTaskName {
            name: name.to_string(),
            reason: format!("longer than {MAX_TASK_NAME_LEN} characters"),
        });
    }
    Ok(name.to_string())
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Start => write!(f, "/start"),
            Self::Stop => write!(f, "/stop"),
            Self::Tasks(TaskCommand::List) => write!(f, "/tasks list"),
            Self::Tasks(TaskCommand::Add(name)) => write!(f, "/tasks add {name}"),
            Self::Tasks(TaskCommand::Set(name)) => write!(f, "/tasks set {name}"),
            Self::Tasks(TaskCommand::Delete(name)) => write!(f, "/tasks delete {name}"),
            Self::Unknown(text) => write!(f, "{text}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_basic_commands() {
        assert_eq!(Command::parse("/start").unwrap(), Command::Start);
        assert_eq!(Command::parse("  /stop \n").unwrap(), Command::Stop);
        assert_eq!(Command::parse("/start@pomo_bot").unwrap(), Command::Start);
    }

    #[test]
    fn test_parse_task_commands() {
        assert_eq!(
            Command::parse("/tasks list").unwrap(),
            Command::Tasks(TaskCommand::List)
        );
        assert_eq!(
            Command::parse("/tasks").unwrap(),
            Command::Tasks(TaskCommand::List)
        );
        assert_eq!(
            Command::parse("/tasks set writing").unwrap(),
            Command::Tasks(TaskCommand::Set("writing".to_string()))
        );
        assert_eq!(
            Command::parse("/tasks add  thesis chapter 2 ").unwrap(),
            Command::Tasks(TaskCommand::Add("thesis chapter 2".to_string()))
        );
        assert_eq!(
            Command::parse("/tasks delete old").unwrap(),
            Command::Tasks(TaskCommand::Delete("old".to_string()))
        );
    }

    #[test]
    fn test_parse_task_command_without_name() {
        assert!(matches!(
            Command::parse("/tasks set"),
            Err(DomainError::InvalidTaskName { .. })
        ));
        assert!(matches!(
            Command::parse("/tasks frobnicate x"),
            Err(DomainError::ParseError { .. })
        ));
    }

    #[test]
    fn test_parse_rejects_long_names() {
        let long = "x".repeat(MAX_TASK_NAME_LEN + 1);
        let result = Command::parse(&format!("/tasks add {long}"));
        assert!(matches!(result, Err(DomainError::InvalidTaskName { .. })));
    }

    #[test]
    fn test_parse_unknown() {
        assert_eq!(
            Command::parse("hello there").unwrap(),
            Command::Unknown("hello there".to_string())
        );
    }

    #[test]
    fn test_display_roundtrips_known_commands() {
        for text in ["/start", "/stop", "/tasks list", "/tasks set focus"] {
            let cmd = Command::parse(text).unwrap();
            assert_eq!(cmd.to_string(), text);
        }
    }
}
