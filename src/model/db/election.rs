use std::collections::HashSet;
use std::ops::{Deref, DerefMut};

use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};

use crate::model::mongodb::Id;

/// Core election data, as stored in the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionCore {
    pub title: String,
    pub description: String,
    /// Positions being contested, e.g. "Head Prefect". Never empty.
    pub positions: Vec<String>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub start_time: DateTime<Utc>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub end_time: DateTime<Utc>,
    /// Whether voting is currently open. Toggled by admins, independently of the time window.
    pub is_active: bool,
    pub created_by: Id,
    /// Classes whose students may vote. Empty means everyone may.
    pub eligible_classes: Vec<String>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

impl ElectionCore {
    /// Is the given position contested in this election?
    pub fn has_position(&self, position: &str) -> bool {
        self.positions.iter().any(|p| p == position)
    }

    /// May a student of the given class vote in this election?
    pub fn is_eligible(&self, class: &str) -> bool {
        self.eligible_classes.is_empty() || self.eligible_classes.iter().any(|c| c == class)
    }
}

/// Check a list of positions is usable.
///
/// Positions become path segments of [`crate::model::db::user::VoterFlags`]
/// documents, so they cannot contain `.` or NUL, or start with `$`.
pub fn validate_positions(positions: &[String]) -> Result<(), String> {
    if positions.is_empty() {
        return Err("An election needs at least one position".to_string());
    }
    let mut seen = HashSet::new();
    for position in positions {
        if position.trim().is_empty() {
            return Err("Position names cannot be blank".to_string());
        }
        if position.contains(&['.', '\0'][..]) || position.starts_with('$') {
            return Err(format!(
                "Position name '{}' cannot contain '.' or NUL, or start with '$'",
                position.escape_default()
            ));
        }
        if !seen.insert(position.as_str()) {
            return Err(format!("Position '{position}' is listed more than once"));
        }
    }
    Ok(())
}

/// An election without an ID.
pub type NewElection = ElectionCore;

/// An election from the database, with its unique ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Election {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub election: ElectionCore,
}

impl Deref for Election {
    type Target = ElectionCore;

    fn deref(&self) -> &Self::Target {
        &self.election
    }
}

impl DerefMut for Election {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.election
    }
}

/// Example data for tests.
#[cfg(test)]
mod examples {
    use chrono::Duration;

    use super::*;

    impl ElectionCore {
        pub fn example(created_by: Id) -> Self {
            let now = Utc::now();
            Self {
                title: "Student Council 2026".to_string(),
                description: "Annual student council election".to_string(),
                positions: vec!["Head Prefect".to_string(), "Sports Captain".to_string()],
                start_time: now - Duration::days(1),
                end_time: now + Duration::days(1),
                is_active: true,
                created_by,
                eligible_classes: vec!["10A".to_string(), "11B".to_string()],
                created_at: now,
                updated_at: now,
            }
        }

        pub fn example_inactive(created_by: Id) -> Self {
            let mut election = Self::example(created_by);
            election.title = "House Elections".to_string();
            election.is_active = false;
            election
        }
    }
}
