//! Port error conversions and transaction endings for the pull request service.

use tracing::warn;

use crate::domain::ports::{
    PullRequestRepositoryError, TeamRepositoryError, Transaction, UnitOfWorkError,
    UserRepositoryError,
};
use crate::domain::{Error, ErrorCode, RequestContext};

impl From<PullRequestRepositoryError> for Error {
    fn from(error: PullRequestRepositoryError) -> Self {
        let message = error.to_string();
        match error {
            PullRequestRepositoryError::NotFound { .. } => Self::pr_not_found(message),
            PullRequestRepositoryError::AlreadyExists { .. } => Self::pr_exists(message),
            PullRequestRepositoryError::UserNotFound { .. } => Self::user_not_found(message),
            PullRequestRepositoryError::TooManyReviewers { .. } => {
                Self::too_many_reviewers(message)
            }
            PullRequestRepositoryError::ReviewerAlreadyAssigned { .. } => {
                Self::reviewer_already_assigned(message)
            }
            PullRequestRepositoryError::AuthorAsReviewer { .. } => {
                Self::invalid_argument(message)
            }
            PullRequestRepositoryError::ReviewerNotAssigned { .. } => {
                Self::reviewer_not_assigned(message)
            }
            PullRequestRepositoryError::InvalidStatus { .. } => Self::invalid_status(message),
            PullRequestRepositoryError::Cancelled => Self::cancelled(message),
            PullRequestRepositoryError::Connection { .. }
            | PullRequestRepositoryError::Query { .. } => Self::internal(message),
        }
    }
}

impl From<UserRepositoryError> for Error {
    fn from(error: UserRepositoryError) -> Self {
        let message = error.to_string();
        match error {
            UserRepositoryError::NotFound { .. } => Self::user_not_found(message),
            UserRepositoryError::NoTeam { .. } => Self::user_no_team(message),
            UserRepositoryError::Cancelled => Self::cancelled(message),
            UserRepositoryError::Connection { .. } | UserRepositoryError::Query { .. } => {
                Self::internal(message)
            }
        }
    }
}

impl From<TeamRepositoryError> for Error {
    fn from(error: TeamRepositoryError) -> Self {
        let message = error.to_string();
        match error {
            TeamRepositoryError::NotFound { .. } => Self::team_not_found(message),
            TeamRepositoryError::AlreadyExists { .. } => Self::team_exists(message),
            TeamRepositoryError::UserNotFound { .. } => Self::user_not_found(message),
            TeamRepositoryError::Cancelled => Self::cancelled(message),
            TeamRepositoryError::Connection { .. } | TeamRepositoryError::Query { .. } => {
                Self::internal(message)
            }
        }
    }
}

impl From<UnitOfWorkError> for Error {
    fn from(error: UnitOfWorkError) -> Self {
        let message = error.to_string();
        match error {
            UnitOfWorkError::Begin { .. } => Self::transaction(message),
            UnitOfWorkError::Commit { .. } | UnitOfWorkError::Finished => Self::commit(message),
            UnitOfWorkError::Rollback { .. } => Self::rollback(message),
            UnitOfWorkError::Cancelled => Self::cancelled(message),
        }
    }
}

/// Roll back, logging rather than surfacing failures.
///
/// Used on paths that already carry an error or never meant to commit.
pub(crate) async fn rollback_quietly(tx: &mut dyn Transaction, ctx: &RequestContext) {
    if let Err(error) = tx.rollback(ctx).await {
        warn!(
            correlation_id = %ctx.correlation_id(),
            error = %error,
            "transaction rollback failed"
        );
    }
}

/// End a mutating transaction according to `outcome`.
///
/// Commits on success. A failed commit is followed by a rollback and the
/// commit error is returned. Any error in `outcome` triggers a rollback and
/// is returned unchanged.
pub(crate) async fn finish_mutation<T>(
    mut tx: Box<dyn Transaction>,
    ctx: &RequestContext,
    outcome: Result<T, Error>,
) -> Result<T, Error> {
    match outcome {
        Ok(value) => match tx.commit(ctx).await {
            Ok(()) => Ok(value),
            Err(error) => {
                warn!(
                    correlation_id = %ctx.correlation_id(),
                    error = %error,
                    "transaction commit failed"
                );
                rollback_quietly(tx.as_mut(), ctx).await;
                Err(Error::from(error))
            }
        },
        Err(error) => {
            log_rejection(ctx, &error);
            rollback_quietly(tx.as_mut(), ctx).await;
            Err(error)
        }
    }
}

/// End a read-only transaction; reads never commit.
pub(crate) async fn finish_read<T>(
    mut tx: Box<dyn Transaction>,
    ctx: &RequestContext,
    outcome: Result<T, Error>,
) -> Result<T, Error> {
    if let Err(error) = &outcome {
        log_rejection(ctx, error);
    }
    rollback_quietly(tx.as_mut(), ctx).await;
    outcome
}

fn log_rejection(ctx: &RequestContext, error: &Error) {
    if error.code().is_business() {
        tracing::debug!(
            correlation_id = %ctx.correlation_id(),
            code = ?error.code(),
            message = error.message(),
            "operation rejected"
        );
    } else if error.code() != ErrorCode::Cancelled {
        warn!(
            correlation_id = %ctx.correlation_id(),
            code = ?error.code(),
            message = error.message(),
            "operation failed"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{PullRequestId, UserId};
    use rstest::rstest;

    fn pr() -> PullRequestId {
        PullRequestId::new("pr-1").expect("valid id")
    }

    fn user() -> UserId {
        UserId::new("u1").expect("valid id")
    }

    #[rstest]
    #[case(PullRequestRepositoryError::not_found(pr()), ErrorCode::PrNotFound)]
    #[case(PullRequestRepositoryError::already_exists(pr()), ErrorCode::PrExists)]
    #[case(PullRequestRepositoryError::user_not_found(user()), ErrorCode::UserNotFound)]
    #[case(
        PullRequestRepositoryError::too_many_reviewers(pr(), 2_usize),
        ErrorCode::TooManyReviewers
    )]
    #[case(
        PullRequestRepositoryError::reviewer_already_assigned(pr(), user()),
        ErrorCode::ReviewerAlreadyAssigned
    )]
    #[case(
        PullRequestRepositoryError::reviewer_not_assigned(pr(), user()),
        ErrorCode::ReviewerNotAssigned
    )]
    #[case(
        PullRequestRepositoryError::author_as_reviewer(pr(), user()),
        ErrorCode::InvalidArgument
    )]
    #[case(PullRequestRepositoryError::invalid_status("CLOSED"), ErrorCode::InvalidStatus)]
    #[case(PullRequestRepositoryError::query("boom"), ErrorCode::Internal)]
    #[case(PullRequestRepositoryError::connection("down"), ErrorCode::Internal)]
    #[case(PullRequestRepositoryError::Cancelled, ErrorCode::Cancelled)]
    fn maps_pull_request_errors(
        #[case] error: PullRequestRepositoryError,
        #[case] expected: ErrorCode,
    ) {
        assert_eq!(Error::from(error).code(), expected);
    }

    #[rstest]
    #[case(UserRepositoryError::not_found(user()), ErrorCode::UserNotFound)]
    #[case(UserRepositoryError::no_team(user()), ErrorCode::UserNoTeam)]
    #[case(UserRepositoryError::query("boom"), ErrorCode::Internal)]
    fn maps_user_errors(#[case] error: UserRepositoryError, #[case] expected: ErrorCode) {
        assert_eq!(Error::from(error).code(), expected);
    }

    #[rstest]
    #[case(TeamRepositoryError::not_found("core"), ErrorCode::TeamNotFound)]
    #[case(TeamRepositoryError::already_exists("core"), ErrorCode::TeamExists)]
    #[case(TeamRepositoryError::user_not_found(user()), ErrorCode::UserNotFound)]
    fn maps_team_errors(#[case] error: TeamRepositoryError, #[case] expected: ErrorCode) {
        assert_eq!(Error::from(error).code(), expected);
    }

    #[rstest]
    #[case(UnitOfWorkError::begin("pool exhausted"), ErrorCode::TransactionError)]
    #[case(UnitOfWorkError::commit("serialization failure"), ErrorCode::CommitError)]
    #[case(UnitOfWorkError::Finished, ErrorCode::CommitError)]
    #[case(UnitOfWorkError::rollback("socket closed"), ErrorCode::RollbackError)]
    #[case(UnitOfWorkError::Cancelled, ErrorCode::Cancelled)]
    fn maps_unit_of_work_errors(#[case] error: UnitOfWorkError, #[case] expected: ErrorCode) {
        assert_eq!(Error::from(error).code(), expected);
    }

    #[rstest]
    fn mapping_keeps_the_adapter_message() {
        let error = Error::from(PullRequestRepositoryError::not_found(pr()));
        assert_eq!(error.message(), "pull request pr-1 not found");
    }
}
