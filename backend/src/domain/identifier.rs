//! Caller-supplied string identifiers.
//!
//! Pull requests, users and teams are all keyed by opaque strings chosen by
//! the caller (`"pr-1001"`, `"u42"`, `"backend"`). Each gets its own newtype
//! so the engine cannot confuse a reviewer id with a pull-request id.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Maximum accepted identifier length, in characters.
pub const IDENTIFIER_MAX: usize = 64;

/// Validation errors raised while constructing identifiers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdentifierValidationError {
    #[error("{kind} must not be empty")]
    Empty { kind: &'static str },
    #[error("{kind} must not contain leading or trailing whitespace")]
    Whitespace { kind: &'static str },
    #[error("{kind} must be at most {max} characters")]
    TooLong { kind: &'static str, max: usize },
}

fn validate(kind: &'static str, raw: &str) -> Result<(), IdentifierValidationError> {
    if raw.is_empty() {
        return Err(IdentifierValidationError::Empty { kind });
    }
    if raw.trim() != raw {
        return Err(IdentifierValidationError::Whitespace { kind });
    }
    if raw.chars().count() > IDENTIFIER_MAX {
        return Err(IdentifierValidationError::TooLong {
            kind,
            max: IDENTIFIER_MAX,
        });
    }
    Ok(())
}

macro_rules! define_identifier {
    ($(#[$meta:meta])* $name:ident, $kind:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Validate and construct the identifier from borrowed input.
            pub fn new(id: impl AsRef<str>) -> Result<Self, IdentifierValidationError> {
                Self::from_owned(id.as_ref().to_owned())
            }

            fn from_owned(id: String) -> Result<Self, IdentifierValidationError> {
                validate($kind, &id)?;
                Ok(Self(id))
            }

            /// Borrow the raw identifier.
            #[must_use]
            pub fn as_str(&self) -> &str {
                self.0.as_str()
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                self.0.as_str()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> Self {
                value.0
            }
        }

        impl TryFrom<String> for $name {
            type Error = IdentifierValidationError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::from_owned(value)
            }
        }

        impl std::str::FromStr for $name {
            type Err = IdentifierValidationError;

            fn from_str(value: &str) -> Result<Self, Self::Err> {
                Self::new(value)
            }
        }
    };
}

define_identifier!(
    /// Caller-supplied pull request identifier, unique across the system.
    PullRequestId,
    "pull request id"
);

define_identifier!(
    /// Stable user identifier.
    UserId,
    "user id"
);

define_identifier!(
    /// Stable team identifier.
    TeamId,
    "team id"
);

impl From<IdentifierValidationError> for crate::domain::Error {
    fn from(value: IdentifierValidationError) -> Self {
        Self::invalid_argument(value.to_string())
    }
}
