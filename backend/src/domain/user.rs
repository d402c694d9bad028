//! User data model.
//!
//! Team membership is not an attribute of the user: it lives in its own
//! relation and is looked up through
//! [`UserRepository::team_id_for_user`](crate::domain::ports::UserRepository::team_id_for_user).

use std::fmt;

use serde::{Deserialize, Serialize};

use super::UserId;

/// Maximum allowed length for a user name.
pub const USER_NAME_MAX: usize = 255;

/// Validation errors returned by [`UserName::new`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UserValidationError {
    #[error("user name must not be empty")]
    EmptyName,
    #[error("user name must be at most {max} characters")]
    NameTooLong { max: usize },
}

/// Human readable user name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UserName(String);

impl UserName {
    /// Validate and construct a [`UserName`].
    pub fn new(name: impl Into<String>) -> Result<Self, UserValidationError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(UserValidationError::EmptyName);
        }
        if name.chars().count() > USER_NAME_MAX {
            return Err(UserValidationError::NameTooLong {
                max: USER_NAME_MAX,
            });
        }
        Ok(Self(name))
    }
}

impl AsRef<str> for UserName {
    fn as_ref(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for UserName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<UserName> for String {
    fn from(value: UserName) -> Self {
        value.0
    }
}

impl TryFrom<String> for UserName {
    type Error = UserValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

/// A user who may author pull requests and review them.
///
/// Only active users are eligible as reviewers; authorship does not depend
/// on activity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    id: UserId,
    name: UserName,
    is_active: bool,
}

impl User {
    /// Build a user from validated components.
    #[must_use]
    pub fn new(id: UserId, name: UserName, is_active: bool) -> Self {
        Self {
            id,
            name,
            is_active,
        }
    }

    /// Construct a user from raw strings, validating both fields.
    ///
    /// # Examples
    /// ```
    /// use backend::domain::User;
    ///
    /// let user = User::try_from_strings("u1", "Alice", true).expect("valid user");
    /// assert_eq!(user.id().as_str(), "u1");
    /// assert!(user.is_active());
    /// ```
    pub fn try_from_strings(
        id: impl AsRef<str>,
        name: impl Into<String>,
        is_active: bool,
    ) -> Result<Self, crate::domain::Error> {
        let id = UserId::new(id)?;
        let name = UserName::new(name)
            .map_err(|err| crate::domain::Error::invalid_argument(err.to_string()))?;
        Ok(Self::new(id, name, is_active))
    }

    /// Stable identifier.
    #[must_use]
    pub fn id(&self) -> &UserId {
        &self.id
    }

    /// Display name.
    #[must_use]
    pub fn name(&self) -> &UserName {
        &self.name
    }

    /// Whether the user may be picked as a reviewer.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.is_active
    }

    /// Return a copy with the activity flag replaced.
    #[must_use]
    pub fn with_active(mut self, is_active: bool) -> Self {
        self.is_active = is_active;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ErrorCode;
    use rstest::rstest;

    #[rstest]
    fn rejects_blank_names() {
        assert_eq!(UserName::new("  "), Err(UserValidationError::EmptyName));
    }

    #[rstest]
    fn rejects_overlong_names() {
        let name = "x".repeat(USER_NAME_MAX + 1);
        assert_eq!(
            UserName::new(name),
            Err(UserValidationError::NameTooLong { max: USER_NAME_MAX })
        );
    }

    #[rstest]
    fn try_from_strings_reports_invalid_argument() {
        let error = User::try_from_strings("", "Alice", true).expect_err("empty id");
        assert_eq!(error.code(), ErrorCode::InvalidArgument);

        let error = User::try_from_strings("u1", "", true).expect_err("empty name");
        assert_eq!(error.code(), ErrorCode::InvalidArgument);
    }

    #[rstest]
    fn with_active_toggles_flag() {
        let user = User::try_from_strings("u1", "Alice", true).expect("valid user");
        assert!(!user.with_active(false).is_active());
    }
}
