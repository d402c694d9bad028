//! Domain-level error types.
//!
//! These errors are transport agnostic. Whatever sits in front of the
//! pull-request engine (HTTP, RPC, CLI) maps [`ErrorCode`] onto its own
//! envelope. Business kinds are produced once, by the port that detected the
//! violation, and travel to the caller without being rewritten.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Stable machine-readable error code describing the failure category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[non_exhaustive]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// An identifier or field failed validation.
    InvalidArgument,
    /// The referenced user does not exist.
    UserNotFound,
    /// The user is not a member of any team.
    UserNoTeam,
    /// The referenced team does not exist.
    TeamNotFound,
    /// A team with the same id or name already exists.
    TeamExists,
    /// The referenced pull request does not exist.
    PrNotFound,
    /// A pull request with the same id already exists.
    PrExists,
    /// The pull request is merged and can no longer change reviewers.
    AlreadyMerged,
    /// The user is not assigned as a reviewer of the pull request.
    ReviewerNotAssigned,
    /// The user is already assigned as a reviewer of the pull request.
    ReviewerAlreadyAssigned,
    /// The pull request already carries the maximum number of reviewers.
    TooManyReviewers,
    /// No active team member is available to take over a review.
    NoReplacementCandidates,
    /// A status value outside `OPEN`/`MERGED` was supplied.
    InvalidStatus,
    /// The transaction could not be started.
    TransactionError,
    /// The transaction could not be committed.
    CommitError,
    /// The transaction could not be rolled back.
    RollbackError,
    /// The caller cancelled the request or its deadline expired.
    Cancelled,
    /// An unexpected storage failure occurred.
    Internal,
}

impl ErrorCode {
    /// Whether the code describes a business rule rather than infrastructure.
    #[must_use]
    pub const fn is_business(self) -> bool {
        !matches!(
            self,
            Self::TransactionError
                | Self::CommitError
                | Self::RollbackError
                | Self::Cancelled
                | Self::Internal
        )
    }
}

/// Domain error payload.
///
/// ## Invariants
/// - `message` must be non-empty once trimmed of whitespace.
///
/// # Examples
/// ```
/// use backend::domain::{Error, ErrorCode};
///
/// let err = Error::new(ErrorCode::PrNotFound, "pull request pr-1 not found");
/// assert_eq!(err.code(), ErrorCode::PrNotFound);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(try_from = "ErrorDto", into = "ErrorDto")]
pub struct Error {
    code: ErrorCode,
    message: String,
    details: Option<Value>,
}

/// Validation errors emitted by the constructors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ErrorValidationError {
    #[error("error message must not be empty")]
    EmptyMessage,
}

macro_rules! error_constructors {
    ($($(#[$meta:meta])* $name:ident => $code:ident),* $(,)?) => {
        $(
            $(#[$meta])*
            pub fn $name(message: impl Into<String>) -> Self {
                Self::new(ErrorCode::$code, message)
            }
        )*
    };
}

impl Error {
    /// Create a new error.
    ///
    /// An empty message is replaced with the debug name of the code so the
    /// constructor never panics.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        match Self::try_new(code, message) {
            Ok(value) => value,
            Err(ErrorValidationError::EmptyMessage) => Self {
                code,
                message: format!("{code:?}"),
                details: None,
            },
        }
    }

    /// Fallible constructor that validates the message content.
    pub fn try_new(
        code: ErrorCode,
        message: impl Into<String>,
    ) -> Result<Self, ErrorValidationError> {
        let message = message.into();
        if message.trim().is_empty() {
            return Err(ErrorValidationError::EmptyMessage);
        }
        Ok(Self {
            code,
            message,
            details: None,
        })
    }

    /// Stable machine-readable error code.
    #[must_use]
    pub fn code(&self) -> ErrorCode {
        self.code
    }

    /// Human-readable message.
    #[must_use]
    pub fn message(&self) -> &str {
        self.message.as_str()
    }

    /// Supplementary structured details.
    #[must_use]
    pub fn details(&self) -> Option<&Value> {
        self.details.as_ref()
    }

    /// Attach structured details to the error.
    ///
    /// # Examples
    /// ```
    /// use backend::domain::Error;
    /// use serde_json::json;
    ///
    /// let err = Error::too_many_reviewers("cap reached")
    ///     .with_details(json!({ "pullRequestId": "pr-1" }));
    /// assert!(err.details().is_some());
    /// ```
    #[must_use]
    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    error_constructors! {
        /// Convenience constructor for [`ErrorCode::InvalidArgument`].
        invalid_argument => InvalidArgument,
        /// Convenience constructor for [`ErrorCode::UserNotFound`].
        user_not_found => UserNotFound,
        /// Convenience constructor for [`ErrorCode::UserNoTeam`].
        user_no_team => UserNoTeam,
        /// Convenience constructor for [`ErrorCode::TeamNotFound`].
        team_not_found => TeamNotFound,
        /// Convenience constructor for [`ErrorCode::TeamExists`].
        team_exists => TeamExists,
        /// Convenience constructor for [`ErrorCode::PrNotFound`].
        pr_not_found => PrNotFound,
        /// Convenience constructor for [`ErrorCode::PrExists`].
        pr_exists => PrExists,
        /// Convenience constructor for [`ErrorCode::AlreadyMerged`].
        already_merged => AlreadyMerged,
        /// Convenience constructor for [`ErrorCode::ReviewerNotAssigned`].
        reviewer_not_assigned => ReviewerNotAssigned,
        /// Convenience constructor for [`ErrorCode::ReviewerAlreadyAssigned`].
        reviewer_already_assigned => ReviewerAlreadyAssigned,
        /// Convenience constructor for [`ErrorCode::TooManyReviewers`].
        too_many_reviewers => TooManyReviewers,
        /// Convenience constructor for [`ErrorCode::NoReplacementCandidates`].
        no_replacement_candidates => NoReplacementCandidates,
        /// Convenience constructor for [`ErrorCode::InvalidStatus`].
        invalid_status => InvalidStatus,
        /// Convenience constructor for [`ErrorCode::TransactionError`].
        transaction => TransactionError,
        /// Convenience constructor for [`ErrorCode::CommitError`].
        commit => CommitError,
        /// Convenience constructor for [`ErrorCode::RollbackError`].
        rollback => RollbackError,
        /// Convenience constructor for [`ErrorCode::Cancelled`].
        cancelled => Cancelled,
        /// Convenience constructor for [`ErrorCode::Internal`].
        internal => Internal,
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for Error {}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ErrorDto {
    code: ErrorCode,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<Value>,
}

impl From<Error> for ErrorDto {
    fn from(value: Error) -> Self {
        Self {
            code: value.code,
            message: value.message,
            details: value.details,
        }
    }
}

impl TryFrom<ErrorDto> for Error {
    type Error = ErrorValidationError;

    fn try_from(value: ErrorDto) -> Result<Self, Self::Error> {
        let ErrorDto {
            code,
            message,
            details,
        } = value;

        let mut error = Error::try_new(code, message)?;
        error.details = details;
        Ok(error)
    }
}
