//! Tasks and work history records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{ChatId, RecordId, TaskId};

/// A named task a chat can attribute its work periods to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub chat_id: ChatId,
    pub name: String,
}

/// One work period as persisted by a history store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub id: RecordId,
    pub chat_id: ChatId,
    pub task_id: Option<TaskId>,
    pub started: DateTime<Utc>,
    pub ended: Option<DateTime<Utc>>,

    /// Set when the record was closed by a stop or an expired timer
    pub finished: bool,
}

impl HistoryRecord {
    /// Opens a new, unfinished record starting now.
    pub fn open(id: RecordId, chat_id: ChatId, task_id: Option<TaskId>) -> Self {
        Self {
            id,
            chat_id,
            task_id,
            started: Utc::now(),
            ended: None,
            finished: false,
        }
    }

    /// Marks the record finished. Closing twice keeps the first end time.
    pub fn close(&mut self) {
        if !self.finished {
            self.ended = Some(Utc::now());
            self.finished = true;
        }
    }

    /// Length of the work period, if it has ended.
    pub fn duration(&self) -> Option<chrono::Duration> {
        self.ended.map(|ended| ended - self.started)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_lifecycle() {
        let mut record = HistoryRecord::open(RecordId::new(1), ChatId::new(2), None);
        assert!(!record.finished);
        assert!(record.duration().is_none());

        record.close();
        assert!(record.finished);
        let first_end = record.ended;
        assert!(record.duration().is_some());

        record.close();
        assert_eq!(record.ended, first_end);
    }
}
