use serde::{Deserialize, Serialize};

use crate::selection::{Resolution, SelectionError, SelectionOutcome};

/// Machine-readable run outcome for `--json` consumers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum OutcomeReport {
    Selected { title: String, query: String },
    CustomEntry { entry: String, query: String },
    Canceled { query: String },
    Failed { message: String, query: String },
}

impl OutcomeReport {
    pub fn from_resolution(
        outcome: &SelectionOutcome,
        resolution: &Result<Resolution, SelectionError>,
    ) -> Self {
        let query = outcome.raw_query.clone();
        match resolution {
            Ok(Resolution::Candidate(candidate)) => Self::Selected {
                title: candidate.computed_title().to_string(),
                query,
            },
            Ok(Resolution::CustomEntry(entry)) => Self::CustomEntry {
                entry: entry.clone(),
                query,
            },
            Err(SelectionError::Canceled) => Self::Canceled { query },
            Err(error) => Self::Failed {
                message: error.to_string(),
                query,
            },
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).expect("outcome report should serialize")
    }
}
