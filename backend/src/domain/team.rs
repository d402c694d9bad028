//! Team data model.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::{TeamId, UserId};

/// Maximum allowed length for a team name.
pub const TEAM_NAME_MAX: usize = 255;

/// Validation errors returned by [`TeamName::new`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TeamValidationError {
    #[error("team name must not be empty")]
    EmptyName,
    #[error("team name must be at most {max} characters")]
    NameTooLong { max: usize },
}

impl From<TeamValidationError> for crate::domain::Error {
    fn from(value: TeamValidationError) -> Self {
        Self::invalid_argument(value.to_string())
    }
}

/// Globally unique team name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TeamName(String);

impl TeamName {
    /// Validate and construct a [`TeamName`].
    pub fn new(name: impl Into<String>) -> Result<Self, TeamValidationError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(TeamValidationError::EmptyName);
        }
        if name.chars().count() > TEAM_NAME_MAX {
            return Err(TeamValidationError::NameTooLong {
                max: TEAM_NAME_MAX,
            });
        }
        Ok(Self(name))
    }
}

impl AsRef<str> for TeamName {
    fn as_ref(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for TeamName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<TeamName> for String {
    fn from(value: TeamName) -> Self {
        value.0
    }
}

impl TryFrom<String> for TeamName {
    type Error = TeamValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

/// Team read model: identity, name and the ids of its members.
///
/// Membership is stored in a separate relation; `member_ids` is assembled by
/// the repository and ordered by user id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Team {
    pub id: TeamId,
    pub name: TeamName,
    pub member_ids: Vec<UserId>,
}

/// Input for creating a team without members.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTeam {
    pub id: TeamId,
    pub name: TeamName,
}
