//! PostgreSQL-backed `PullRequestRepository` implementation using Diesel ORM.
//!
//! Every write first takes `SELECT ... FOR UPDATE` on the pull request row,
//! so writers of the same pull request queue behind each other until the
//! holder's transaction ends. Inserts use `ON CONFLICT DO NOTHING` and
//! report clashes from the affected row count, which keeps the surrounding
//! transaction usable after a rejected write.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};

use crate::domain::ports::{
    PullRequestRepository, PullRequestRepositoryError, ensure_not_author, ensure_reviewer_capacity,
};
use crate::domain::{
    NewPullRequest, PullRequest, PullRequestDraft, PullRequestId, PullRequestStatus,
    PullRequestTitle, UserId,
};

use super::diesel_helpers::{ConstraintViolation, cast_count, map_basic_diesel_error};
use super::diesel_unit_of_work::{FINISHED_MESSAGE, ScopeError, TransactionScope};
use super::models::{NewPullRequestRow, NewReviewerRow, PullRequestRow, PullRequestStatusUpdate};
use super::schema::{pull_request_reviewers, pull_requests};

const AUTHOR_FK: &str = "pull_requests_author_id_fkey";
const REVIEWER_FK: &str = "pull_request_reviewers_reviewer_id_fkey";

type RepoResult<T> = Result<T, PullRequestRepositoryError>;

impl From<ScopeError> for PullRequestRepositoryError {
    fn from(value: ScopeError) -> Self {
        match value {
            ScopeError::Cancelled => Self::cancelled(),
            ScopeError::Finished => Self::query(FINISHED_MESSAGE),
        }
    }
}

fn map_diesel_error(error: diesel::result::Error) -> PullRequestRepositoryError {
    map_basic_diesel_error(
        error,
        PullRequestRepositoryError::query,
        PullRequestRepositoryError::connection,
    )
}

/// Map an insert that may trip a user foreign key onto `UserNotFound`.
fn map_user_reference_error(
    error: diesel::result::Error,
    constraint: &str,
    user_id: &UserId,
) -> PullRequestRepositoryError {
    match ConstraintViolation::of(&error) {
        Some(violation) if violation.is(constraint) => {
            PullRequestRepositoryError::user_not_found(user_id.clone())
        }
        _ => map_diesel_error(error),
    }
}

fn parse_user_id(raw: &str) -> RepoResult<UserId> {
    UserId::new(raw)
        .map_err(|err| PullRequestRepositoryError::query(format!("stored user id: {err}")))
}

fn row_to_pull_request(row: PullRequestRow, reviewers: &[String]) -> RepoResult<PullRequest> {
    let PullRequestRow {
        id,
        title: raw_title,
        author_id,
        status: raw_status,
        created_at,
        updated_at,
        merged_at,
    } = row;

    let status = PullRequestStatus::from_str(&raw_status)
        .map_err(|_| PullRequestRepositoryError::invalid_status(raw_status.as_str()))?;
    let pull_request_id = PullRequestId::new(&id).map_err(|err| {
        PullRequestRepositoryError::query(format!("stored pull request id: {err}"))
    })?;
    let title = PullRequestTitle::new(raw_title).map_err(|err| {
        PullRequestRepositoryError::query(format!("stored pull request {id}: {err}"))
    })?;
    let reviewer_ids = reviewers
        .iter()
        .map(|raw| parse_user_id(raw))
        .collect::<RepoResult<Vec<_>>>()?;

    PullRequest::new(PullRequestDraft {
        id: pull_request_id,
        title,
        author_id: parse_user_id(&author_id)?,
        status,
        reviewer_ids,
        created_at,
        updated_at,
        merged_at,
    })
    .map_err(|err| {
        let message = format!("stored pull request {id} is inconsistent: {err}");
        PullRequestRepositoryError::query(message)
    })
}

/// Pull request repository bound to one database transaction.
pub struct DieselPullRequestRepository {
    scope: Arc<TransactionScope>,
}

impl DieselPullRequestRepository {
    pub(super) fn new(scope: Arc<TransactionScope>) -> Self {
        Self { scope }
    }

    /// `SELECT ... FOR UPDATE` on the row; `NotFound` when absent.
    /// Lock the pull request row and return its author id.
    async fn lock_row(
        &self,
        conn: &mut AsyncPgConnection,
        id: &PullRequestId,
    ) -> RepoResult<String> {
        self.scope
            .guard(Box::pin(
                pull_requests::table
                    .find(id.as_str())
                    .select(pull_requests::author_id)
                    .for_update()
                    .first::<String>(conn),
            ))
            .await?
            .optional()
            .map_err(map_diesel_error)?
            .ok_or_else(|| PullRequestRepositoryError::not_found(id.clone()))
    }

    async fn reviewer_ids(
        &self,
        conn: &mut AsyncPgConnection,
        id: &PullRequestId,
    ) -> RepoResult<Vec<String>> {
        self.scope
            .guard(Box::pin(
                pull_request_reviewers::table
                    .filter(pull_request_reviewers::pull_request_id.eq(id.as_str()))
                    .order(pull_request_reviewers::id.asc())
                    .select(pull_request_reviewers::reviewer_id)
                    .load(conn),
            ))
            .await?
            .map_err(map_diesel_error)
    }

    async fn load(
        &self,
        conn: &mut AsyncPgConnection,
        id: &PullRequestId,
    ) -> RepoResult<PullRequest> {
        let row = self
            .scope
            .guard(Box::pin(
                pull_requests::table
                    .find(id.as_str())
                    .select(PullRequestRow::as_select())
                    .first(&mut *conn),
            ))
            .await?
            .optional()
            .map_err(map_diesel_error)?
            .ok_or_else(|| PullRequestRepositoryError::not_found(id.clone()))?;
        let reviewers = self.reviewer_ids(&mut *conn, id).await?;
        row_to_pull_request(row, &reviewers)
    }

    async fn touch(
        &self,
        conn: &mut AsyncPgConnection,
        id: &PullRequestId,
        now: DateTime<Utc>,
    ) -> RepoResult<()> {
        self.scope
            .guard(Box::pin(
                diesel::update(pull_requests::table.find(id.as_str()))
                    .set(pull_requests::updated_at.eq(now))
                    .execute(conn),
            ))
            .await?
            .map_err(map_diesel_error)?;
        Ok(())
    }

    async fn insert_pull_request(&self, pull_request: &NewPullRequest) -> RepoResult<()> {
        let now = self.scope.now();
        let row = NewPullRequestRow {
            id: pull_request.id.as_str(),
            title: pull_request.title.as_ref(),
            author_id: pull_request.author_id.as_str(),
            status: PullRequestStatus::Open.as_str(),
            created_at: now,
            updated_at: now,
        };
        let mut conn = self.scope.connection().await?;
        let inserted = self
            .scope
            .guard(Box::pin(
                diesel::insert_into(pull_requests::table)
                    .values(&row)
                    .on_conflict_do_nothing()
                    .execute(&mut *conn),
            ))
            .await?
            .map_err(|err| map_user_reference_error(err, AUTHOR_FK, &pull_request.author_id))?;
        if inserted == 0 {
            return Err(PullRequestRepositoryError::already_exists(
                pull_request.id.clone(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl PullRequestRepository for DieselPullRequestRepository {
    async fn create(&self, pull_request: &NewPullRequest) -> RepoResult<PullRequest> {
        self.insert_pull_request(pull_request).await?;
        for reviewer_id in &pull_request.reviewer_ids {
            self.add_reviewer(&pull_request.id, reviewer_id).await?;
        }
        self.get_by_id(&pull_request.id).await
    }

    async fn get_by_id(&self, id: &PullRequestId) -> RepoResult<PullRequest> {
        let mut conn = self.scope.connection().await?;
        self.load(&mut *conn, id).await
    }

    async fn lock_by_id(&self, id: &PullRequestId) -> RepoResult<PullRequest> {
        let mut conn = self.scope.connection().await?;
        self.lock_row(&mut *conn, id).await?;
        self.load(&mut *conn, id).await
    }

    async fn add_reviewer(&self, id: &PullRequestId, reviewer_id: &UserId) -> RepoResult<()> {
        let now = self.scope.now();
        let mut conn = self.scope.connection().await?;
        let author_id = self.lock_row(&mut *conn, id).await?;

        let current: i64 = self
            .scope
            .guard(Box::pin(
                pull_request_reviewers::table
                    .filter(pull_request_reviewers::pull_request_id.eq(id.as_str()))
                    .count()
                    .get_result(&mut *conn),
            ))
            .await?
            .map_err(map_diesel_error)?;
        ensure_reviewer_capacity(id, cast_count(current))?;
        ensure_not_author(id, &author_id, reviewer_id)?;

        let row = NewReviewerRow {
            pull_request_id: id.as_str(),
            reviewer_id: reviewer_id.as_str(),
        };
        let inserted = self
            .scope
            .guard(Box::pin(
                diesel::insert_into(pull_request_reviewers::table)
                    .values(&row)
                    .on_conflict_do_nothing()
                    .execute(&mut *conn),
            ))
            .await?
            .map_err(|err| map_user_reference_error(err, REVIEWER_FK, reviewer_id))?;
        if inserted == 0 {
            return Err(PullRequestRepositoryError::reviewer_already_assigned(
                id.clone(),
                reviewer_id.clone(),
            ));
        }
        self.touch(&mut *conn, id, now).await
    }

    async fn remove_reviewer(&self, id: &PullRequestId, reviewer_id: &UserId) -> RepoResult<()> {
        let now = self.scope.now();
        let mut conn = self.scope.connection().await?;
        self.lock_row(&mut *conn, id).await?;

        let removed = self
            .scope
            .guard(Box::pin(
                diesel::delete(
                    pull_request_reviewers::table
                        .filter(pull_request_reviewers::pull_request_id.eq(id.as_str()))
                        .filter(pull_request_reviewers::reviewer_id.eq(reviewer_id.as_str())),
                )
                .execute(&mut *conn),
            ))
            .await?
            .map_err(map_diesel_error)?;
        if removed == 0 {
            return Err(PullRequestRepositoryError::reviewer_not_assigned(
                id.clone(),
                reviewer_id.clone(),
            ));
        }
        self.touch(&mut *conn, id, now).await
    }

    async fn update_status(
        &self,
        id: &PullRequestId,
        status: PullRequestStatus,
        merged_at: Option<DateTime<Utc>>,
    ) -> RepoResult<()> {
        let now = self.scope.now();
        let update = PullRequestStatusUpdate {
            status: status.as_str(),
            merged_at: match status {
                PullRequestStatus::Open => None,
                PullRequestStatus::Merged => Some(merged_at.unwrap_or(now)),
            },
            updated_at: now,
        };
        let mut conn = self.scope.connection().await?;
        self.lock_row(&mut *conn, id).await?;

        // Zero affected rows means the row is already merged.
        self.scope
            .guard(Box::pin(
                diesel::update(
                    pull_requests::table
                        .find(id.as_str())
                        .filter(pull_requests::status.ne(PullRequestStatus::Merged.as_str())),
                )
                .set(&update)
                .execute(&mut *conn),
            ))
            .await?
            .map_err(map_diesel_error)?;
        Ok(())
    }

    async fn list_by_reviewer(
        &self,
        reviewer_id: &UserId,
        status: Option<PullRequestStatus>,
    ) -> RepoResult<Vec<PullRequest>> {
        let mut query = pull_requests::table
            .inner_join(pull_request_reviewers::table)
            .filter(pull_request_reviewers::reviewer_id.eq(reviewer_id.as_str()))
            .select(PullRequestRow::as_select())
            .order((pull_requests::created_at.desc(), pull_requests::id.desc()))
            .into_boxed();
        if let Some(wanted) = status {
            query = query.filter(pull_requests::status.eq(wanted.as_str()));
        }

        let mut conn = self.scope.connection().await?;
        let rows: Vec<PullRequestRow> = self
            .scope
            .guard(Box::pin(query.load(&mut *conn)))
            .await?
            .map_err(map_diesel_error)?;
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<&str> = rows.iter().map(|row| row.id.as_str()).collect();
        let assignments: Vec<(String, String)> = self
            .scope
            .guard(Box::pin(
                pull_request_reviewers::table
                    .filter(pull_request_reviewers::pull_request_id.eq_any(ids))
                    .order(pull_request_reviewers::id.asc())
                    .select((
                        pull_request_reviewers::pull_request_id,
                        pull_request_reviewers::reviewer_id,
                    ))
                    .load(&mut *conn),
            ))
            .await?
            .map_err(map_diesel_error)?;

        let mut by_pull_request: HashMap<String, Vec<String>> = HashMap::new();
        for (pull_request_id, reviewer) in assignments {
            by_pull_request
                .entry(pull_request_id)
                .or_default()
                .push(reviewer);
        }
        rows.into_iter()
            .map(|row| {
                let reviewers = by_pull_request.remove(&row.id).unwrap_or_default();
                row_to_pull_request(row, &reviewers)
            })
            .collect()
    }

    async fn count_reviewers(&self, id: &PullRequestId) -> RepoResult<usize> {
        let mut conn = self.scope.connection().await?;
        let exists: bool = self
            .scope
            .guard(Box::pin(
                diesel::select(diesel::dsl::exists(
                    pull_requests::table.filter(pull_requests::id.eq(id.as_str())),
                ))
                .get_result(&mut *conn),
            ))
            .await?
            .map_err(map_diesel_error)?;
        if !exists {
            return Err(PullRequestRepositoryError::not_found(id.clone()));
        }

        let count: i64 = self
            .scope
            .guard(Box::pin(
                pull_request_reviewers::table
                    .filter(pull_request_reviewers::pull_request_id.eq(id.as_str()))
                    .count()
                    .get_result(&mut *conn),
            ))
            .await?
            .map_err(map_diesel_error)?;
        Ok(cast_count(count))
    }
}
