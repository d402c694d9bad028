//! Port for pull request persistence.
//!
//! Beyond plain storage the repository owns the rules that must hold no
//! matter which caller writes: id uniqueness, the reviewer cap, duplicate
//! assignment detection and the idempotent merge write. Adapters implement
//! these rules against their own storage, and the engine relies on them.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{
    MAX_REVIEWERS, NewPullRequest, PullRequest, PullRequestId, PullRequestStatus, UserId,
};

use super::define_port_error;

define_port_error! {
    /// Errors raised by pull request repository adapters.
    pub enum PullRequestRepositoryError {
        /// Repository connection could not be established.
        Connection { message: String } =>
            "pull request repository connection failed: {message}",
        /// Query or mutation failed during execution.
        Query { message: String } =>
            "pull request repository query failed: {message}",
        /// The pull request does not exist.
        NotFound { pull_request_id: PullRequestId } =>
            "pull request {pull_request_id} not found",
        /// A pull request with the same id already exists.
        AlreadyExists { pull_request_id: PullRequestId } =>
            "pull request {pull_request_id} already exists",
        /// A referenced user (author or reviewer) does not exist.
        UserNotFound { user_id: UserId } => "user {user_id} not found",
        /// The pull request already has the maximum number of reviewers.
        TooManyReviewers { pull_request_id: PullRequestId, max: usize } =>
            "pull request {pull_request_id} already has {max} reviewers",
        /// The reviewer is already attached to the pull request.
        ReviewerAlreadyAssigned { pull_request_id: PullRequestId, reviewer_id: UserId } =>
            "reviewer {reviewer_id} is already assigned to pull request {pull_request_id}",
        /// The pull request's own author was offered as a reviewer.
        AuthorAsReviewer { pull_request_id: PullRequestId, reviewer_id: UserId } =>
            "author {reviewer_id} cannot review pull request {pull_request_id}",
        /// The reviewer is not attached to the pull request.
        ReviewerNotAssigned { pull_request_id: PullRequestId, reviewer_id: UserId } =>
            "reviewer {reviewer_id} is not assigned to pull request {pull_request_id}",
        /// A status outside `OPEN`/`MERGED` was stored or requested.
        InvalidStatus { value: String } => "invalid pull request status: {value}",
        /// The request was cancelled while the call was in flight.
        Cancelled => "pull request repository call cancelled",
    }
}

/// Fail with [`PullRequestRepositoryError::TooManyReviewers`] once the cap
/// is reached.
///
/// Adapters call this from `add_reviewer` with the current assignment count.
pub fn ensure_reviewer_capacity(
    pull_request_id: &PullRequestId,
    current: usize,
) -> Result<(), PullRequestRepositoryError> {
    if current >= MAX_REVIEWERS {
        return Err(PullRequestRepositoryError::too_many_reviewers(
            pull_request_id.clone(),
            MAX_REVIEWERS,
        ));
    }
    Ok(())
}

/// Fail with [`PullRequestRepositoryError::AuthorAsReviewer`] when
/// `reviewer_id` wrote the pull request.
pub fn ensure_not_author(
    pull_request_id: &PullRequestId,
    author_id: &str,
    reviewer_id: &UserId,
) -> Result<(), PullRequestRepositoryError> {
    if reviewer_id.as_str() == author_id {
        return Err(PullRequestRepositoryError::author_as_reviewer(
            pull_request_id.clone(),
            reviewer_id.clone(),
        ));
    }
    Ok(())
}

/// Transaction-scoped pull request storage.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PullRequestRepository: Send + Sync {
    /// Insert a new pull request with status `OPEN`, then attach each of
    /// `pull_request.reviewer_ids` in order through
    /// [`PullRequestRepository::add_reviewer`].
    ///
    /// Fails with `AlreadyExists` when the id is taken; existing rows are
    /// never overwritten.
    async fn create(
        &self,
        pull_request: &NewPullRequest,
    ) -> Result<PullRequest, PullRequestRepositoryError>;

    /// Load a pull request with reviewers in assignment order.
    async fn get_by_id(
        &self,
        id: &PullRequestId,
    ) -> Result<PullRequest, PullRequestRepositoryError>;

    /// Load a pull request and hold an exclusive row lock on it until the
    /// enclosing transaction ends.
    ///
    /// Concurrent lockers of the same id wait; once they acquire the lock
    /// they observe the state committed by the previous holder.
    async fn lock_by_id(
        &self,
        id: &PullRequestId,
    ) -> Result<PullRequest, PullRequestRepositoryError>;

    /// Attach a reviewer.
    ///
    /// Fails with `TooManyReviewers` at the cap, `ReviewerAlreadyAssigned`
    /// for duplicates, and `NotFound`/`UserNotFound` for dangling references.
    async fn add_reviewer(
        &self,
        id: &PullRequestId,
        reviewer_id: &UserId,
    ) -> Result<(), PullRequestRepositoryError>;

    /// Detach a reviewer; fails with `ReviewerNotAssigned` if absent.
    async fn remove_reviewer(
        &self,
        id: &PullRequestId,
        reviewer_id: &UserId,
    ) -> Result<(), PullRequestRepositoryError>;

    /// Conditionally write a new status.
    ///
    /// The write only applies while the stored status is not `MERGED`; on an
    /// already merged pull request the call succeeds without changing
    /// anything. Fails with `NotFound` if the pull request does not exist.
    async fn update_status(
        &self,
        id: &PullRequestId,
        status: PullRequestStatus,
        merged_at: Option<DateTime<Utc>>,
    ) -> Result<(), PullRequestRepositoryError>;

    /// Pull requests reviewed by `reviewer_id`, newest first, optionally
    /// filtered by status.
    async fn list_by_reviewer(
        &self,
        reviewer_id: &UserId,
        status: Option<PullRequestStatus>,
    ) -> Result<Vec<PullRequest>, PullRequestRepositoryError>;

    /// Number of reviewers currently attached.
    async fn count_reviewers(&self, id: &PullRequestId)
    -> Result<usize, PullRequestRepositoryError>;
}
