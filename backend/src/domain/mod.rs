//! Domain primitives, aggregates and the pull-request engine.
//!
//! Purpose: Define strongly typed domain entities and the service that
//! enforces the review workflow on top of the driven ports. Keep types
//! immutable and document invariants and serialisation contracts (serde) in
//! each type's Rustdoc.
//!
//! Public surface:
//! - Error (alias to `error::Error`): operation error payload.
//! - ErrorCode (alias to `error::ErrorCode`): stable error identifier.
//! - PullRequest, User, Team: aggregates read and written through ports.
//! - PullRequestService: engine implementing the driving ports.
//! - RequestContext: cancellation and deadline carried by every call.

pub mod error;
mod identifier;
pub mod ports;
mod pull_request;
mod pull_request_service;
mod pull_request_service_support;
mod request_context;
mod reviewer_selector;
mod team;
pub mod user;

pub use self::error::{Error, ErrorCode, ErrorValidationError};
pub use self::identifier::{
    IDENTIFIER_MAX, IdentifierValidationError, PullRequestId, TeamId, UserId,
};
pub use self::pull_request::{
    InvalidStatusError, MAX_REVIEWERS, NewPullRequest, PullRequest, PullRequestDraft,
    PullRequestStatus, PullRequestTitle, PullRequestValidationError, TITLE_MAX,
};
pub use self::pull_request_service::PullRequestService;
pub use self::request_context::{ContextError, RequestContext};
#[cfg(test)]
pub use self::reviewer_selector::MockReviewerSelector;
pub use self::reviewer_selector::{RandomReviewerSelector, ReviewerSelector};
pub use self::team::{NewTeam, TEAM_NAME_MAX, Team, TeamName, TeamValidationError};
pub use self::user::{USER_NAME_MAX, User, UserName, UserValidationError};

/// Convenient operation result alias.
///
/// # Examples
/// ```
/// use backend::domain::{DomainResult, Error};
///
/// fn lookup() -> DomainResult<()> {
///     Err(Error::pr_not_found("pull request pr-1 not found"))
/// }
/// assert!(lookup().is_err());
/// ```
pub type DomainResult<T> = Result<T, Error>;
