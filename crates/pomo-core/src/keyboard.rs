//! Reply keyboards offered alongside status messages.

use serde::{Deserialize, Serialize};

use crate::phase::Phase;

/// Rows of suggested commands rendered as buttons by the client.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Keyboard {
    pub rows: Vec<Vec<String>>,

    /// Hide the keyboard after one button press
    #[serde(default)]
    pub one_time: bool,
}

impl Keyboard {
    /// Keyboard for the given phase.
    ///
    /// While a countdown runs the only useful action is `/stop`; every other
    /// phase offers the full command set.
    pub fn for_phase(phase: Phase) -> Self {
        let rows = if phase.is_timed() {
            vec![vec!["/stop".to_string()]]
        } else {
            vec![
                vec!["/start".to_string(), "/stop".to_string()],
                vec![
                    "/tasks list".to_string(),
                    "/tasks add".to_string(),
                    "/tasks set".to_string(),
                    "/tasks delete".to_string(),
                ],
            ]
        };
        Self {
            rows,
            one_time: true,
        }
    }

    /// Iterates all button labels, row by row.
    pub fn buttons(&self) -> impl Iterator<Item = &str> {
        self.rows.iter().flatten().map(String::as_str)
    }
}
