//! Inbound command routing.
//!
//! Parses a chat line, resolves the chat's session through the scheduler
//! and replies through the notifier. Phase announcements are sent by the
//! scheduler itself; the dispatcher only answers task commands, rejections
//! and unknown input.

use pomo_core::{format_duration, ChatId, Command, DomainError, Keyboard, Phase, TaskCommand};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::session::{Scheduler, TransitionError};
use crate::store::StoreError;

/// Why a command produced no state change.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error("chat {0} is not allowed")]
    NotAllowed(ChatId),

    #[error(transparent)]
    Rejected(#[from] TransitionError),

    #[error(transparent)]
    Invalid(#[from] DomainError),

    #[error("unknown command: {0}")]
    UnknownCommand(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Routes text commands to the scheduler.
#[derive(Clone)]
pub struct Dispatcher {
    scheduler: Scheduler,
    allowed_chat_id: Option<ChatId>,
}

impl Dispatcher {
    /// `allowed_chat_id` restricts the daemon to a single chat when set.
    pub fn new(scheduler: Scheduler, allowed_chat_id: Option<ChatId>) -> Self {
        Self {
            scheduler,
            allowed_chat_id,
        }
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn is_allowed(&self, chat_id: ChatId) -> bool {
        self.allowed_chat_id.map_or(true, |allowed| allowed == chat_id)
    }

    /// Handles one line from `chat_id` and returns the session's phase
    /// afterwards.
    ///
    /// # Errors
    ///
    /// Any `DispatchError`; all of them have already been answered in the
    /// chat (except `NotAllowed`, which is silently dropped) and are
    /// returned for logging.
    pub async fn dispatch(&self, chat_id: ChatId, text: &str) -> Result<Phase, DispatchError> {
        if !self.is_allowed(chat_id) {
            warn!(chat_id = %chat_id, "Ignoring command from chat outside allow-list");
            return Err(DispatchError::NotAllowed(chat_id));
        }

        info!(chat_id = %chat_id, text = %text.trim(), "Command received");

        let result = match Command::parse(text) {
            Ok(command) => self.execute(chat_id, command).await,
            Err(e) => Err(DispatchError::Invalid(e)),
        };

        if let Err(e) = &result {
            debug!(chat_id = %chat_id, error = %e, "Command rejected");
            self.reply_error(chat_id, e).await;
        }
        result
    }

    async fn execute(&self, chat_id: ChatId, command: Command) -> Result<Phase, DispatchError> {
        match command {
            Command::Start => Ok(self.scheduler.start(chat_id).await?.to),
            Command::Stop => Ok(self.scheduler.stop(chat_id).await.to),
            Command::Tasks(task_command) => {
                self.execute_task(chat_id, task_command).await?;
                Ok(self.scheduler.snapshot(chat_id).await.phase)
            }
            Command::Unknown(text) => Err(DispatchError::UnknownCommand(text)),
        }
    }

    async fn execute_task(&self, chat_id: ChatId, command: TaskCommand) -> Result<(), DispatchError> {
        let tasks = self.scheduler.tasks();
        match command {
            TaskCommand::List => {
                let list = tasks.list_tasks(chat_id).await?;
                let text = if list.is_empty() {
                    "No tasks yet. Add one with /tasks add <name>".to_string()
                } else {
                    list.iter()
                        .map(|t| t.name.as_str())
                        .collect::<Vec<_>>()
                        .join("\n")
                };
                self.reply(chat_id, &text).await;
            }
            TaskCommand::Add(name) => {
                tasks.add_task(chat_id, &name).await?;
                self.reply(chat_id, &format!("Added task {name}")).await;
            }
            TaskCommand::Set(name) => {
                self.scheduler.select_task(chat_id, &name).await?;
                self.reply(chat_id, &format!("Changed task to {name}")).await;
            }
            TaskCommand::Delete(name) => {
                if !tasks.delete_task(chat_id, &name).await? {
                    return Err(TransitionError::TaskNotFound { name }.into());
                }
                self.reply(chat_id, &format!("Deleted task {name}")).await;
            }
        }
        Ok(())
    }

    async fn reply(&self, chat_id: ChatId, text: &str) {
        if let Err(e) = self
            .scheduler
            .notifier()
            .send_message(chat_id, text, None)
            .await
        {
            warn!(chat_id = %chat_id, error = %e, "Failed to send reply");
        }
    }

    async fn reply_error(&self, chat_id: ChatId, error: &DispatchError) {
        let text = match error {
            DispatchError::NotAllowed(_) => return,
            DispatchError::Rejected(TransitionError::AlreadyRunning { phase, remaining }) => {
                format!(
                    "Already {phase}, {} left. Send /stop first.",
                    format_duration(*remaining)
                )
            }
            DispatchError::Rejected(TransitionError::TaskNotFound { name }) => {
                format!("Task not found: {name}")
            }
            DispatchError::Store(StoreError::DuplicateTask(name)) => {
                format!("Task already exists: {name}")
            }
            DispatchError::Rejected(TransitionError::TaskLookupFailed(_))
            | DispatchError::Store(_) => "Task storage is unavailable, try again later".to_string(),
            DispatchError::Invalid(e) => e.to_string(),
            DispatchError::UnknownCommand(_) => "Unknown command".to_string(),
        };

        let phase = self.scheduler.snapshot(chat_id).await.phase;
        if let Err(e) = self
            .scheduler
            .notifier()
            .send_message(chat_id, &text, Some(Keyboard::for_phase(phase)))
            .await
        {
            warn!(chat_id = %chat_id, error = %e, "Failed to send rejection");
        }
    }
}
