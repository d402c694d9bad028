//! In-memory pull request repository.
//!
//! Every write takes the row lock first, the same way an `UPDATE` or
//! `INSERT` locks its row in PostgreSQL.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::ports::{
    PullRequestRepository, PullRequestRepositoryError, ensure_not_author, ensure_reviewer_capacity,
};
use crate::domain::{NewPullRequest, PullRequest, PullRequestId, PullRequestStatus, UserId};

use super::store::{FINISHED_MESSAGE, PullRequestRow, ScopeError, TransactionScope};

impl From<ScopeError> for PullRequestRepositoryError {
    fn from(value: ScopeError) -> Self {
        match value {
            ScopeError::Cancelled => Self::cancelled(),
            ScopeError::Finished => Self::query(FINISHED_MESSAGE),
        }
    }
}

/// Pull request repository bound to one in-memory transaction.
pub struct InMemoryPullRequestRepository {
    scope: Arc<TransactionScope>,
}

impl InMemoryPullRequestRepository {
    pub(super) fn new(scope: Arc<TransactionScope>) -> Self {
        Self { scope }
    }

    fn read(&self, id: &PullRequestId) -> Result<PullRequest, PullRequestRepositoryError> {
        let state = self.scope.state();
        let row = state
            .working
            .pull_requests
            .get(id)
            .ok_or_else(|| PullRequestRepositoryError::not_found(id.clone()))?;
        row.to_domain(id).map_err(PullRequestRepositoryError::query)
    }

    /// Apply `change` to the locked working row and mark it dirty.
    async fn write<F>(
        &self,
        id: &PullRequestId,
        change: F,
    ) -> Result<(), PullRequestRepositoryError>
    where
        F: FnOnce(&mut PullRequestRow, DateTime<Utc>) -> Result<(), PullRequestRepositoryError>
            + Send,
    {
        self.scope.lock_row(id).await?;
        let now = self.scope.store().now();
        let mut state = self.scope.state();
        let row = state
            .working
            .pull_requests
            .get_mut(id)
            .ok_or_else(|| PullRequestRepositoryError::not_found(id.clone()))?;
        change(row, now)?;
        state.dirty.pull_requests.insert(id.clone());
        Ok(())
    }
}

#[async_trait]
impl PullRequestRepository for InMemoryPullRequestRepository {
    async fn create(
        &self,
        pull_request: &NewPullRequest,
    ) -> Result<PullRequest, PullRequestRepositoryError> {
        let id = &pull_request.id;
        self.scope.lock_row(id).await?;
        {
            let now = self.scope.store().now();
            let created_seq = self.scope.store().next_sequence();
            let mut state = self.scope.state();
            if state.working.pull_requests.contains_key(id) {
                return Err(PullRequestRepositoryError::already_exists(id.clone()));
            }
            if !state.working.users.contains_key(&pull_request.author_id) {
                return Err(PullRequestRepositoryError::user_not_found(
                    pull_request.author_id.clone(),
                ));
            }
            state.working.pull_requests.insert(
                id.clone(),
                PullRequestRow {
                    title: pull_request.title.clone(),
                    author_id: pull_request.author_id.clone(),
                    status: PullRequestStatus::Open,
                    reviewers: Vec::new(),
                    created_seq,
                    created_at: now,
                    updated_at: now,
                    merged_at: None,
                },
            );
            state.dirty.pull_requests.insert(id.clone());
        }

        for reviewer_id in &pull_request.reviewer_ids {
            self.add_reviewer(id, reviewer_id).await?;
        }
        self.read(id)
    }

    async fn get_by_id(
        &self,
        id: &PullRequestId,
    ) -> Result<PullRequest, PullRequestRepositoryError> {
        self.scope.ensure_open()?;
        self.read(id)
    }

    async fn lock_by_id(
        &self,
        id: &PullRequestId,
    ) -> Result<PullRequest, PullRequestRepositoryError> {
        self.scope.lock_row(id).await?;
        self.read(id)
    }

    async fn add_reviewer(
        &self,
        id: &PullRequestId,
        reviewer_id: &UserId,
    ) -> Result<(), PullRequestRepositoryError> {
        let known_reviewer = {
            self.scope.ensure_open()?;
            self.scope.state().working.users.contains_key(reviewer_id)
        };
        let sequence = self.scope.store().next_sequence();
        self.write(id, |row, now| {
            ensure_reviewer_capacity(id, row.reviewers.len())?;
            ensure_not_author(id, row.author_id.as_str(), reviewer_id)?;
            if row.reviewers.iter().any(|(_, existing)| existing == reviewer_id) {
                return Err(PullRequestRepositoryError::reviewer_already_assigned(
                    id.clone(),
                    reviewer_id.clone(),
                ));
            }
            if !known_reviewer {
                return Err(PullRequestRepositoryError::user_not_found(
                    reviewer_id.clone(),
                ));
            }
            row.reviewers.push((sequence, reviewer_id.clone()));
            row.updated_at = now;
            Ok(())
        })
        .await
    }

    async fn remove_reviewer(
        &self,
        id: &PullRequestId,
        reviewer_id: &UserId,
    ) -> Result<(), PullRequestRepositoryError> {
        self.write(id, |row, now| {
            let position = row
                .reviewers
                .iter()
                .position(|(_, existing)| existing == reviewer_id)
                .ok_or_else(|| {
                    PullRequestRepositoryError::reviewer_not_assigned(
                        id.clone(),
                        reviewer_id.clone(),
                    )
                })?;
            row.reviewers.remove(position);
            row.updated_at = now;
            Ok(())
        })
        .await
    }

    async fn update_status(
        &self,
        id: &PullRequestId,
        status: PullRequestStatus,
        merged_at: Option<DateTime<Utc>>,
    ) -> Result<(), PullRequestRepositoryError> {
        self.write(id, |row, now| {
            if row.status == PullRequestStatus::Merged {
                return Ok(());
            }
            row.status = status;
            row.merged_at = match status {
                PullRequestStatus::Open => None,
                PullRequestStatus::Merged => Some(merged_at.unwrap_or(now)),
            };
            row.updated_at = now;
            Ok(())
        })
        .await
    }

    async fn list_by_reviewer(
        &self,
        reviewer_id: &UserId,
        status: Option<PullRequestStatus>,
    ) -> Result<Vec<PullRequest>, PullRequestRepositoryError> {
        self.scope.ensure_open()?;
        let state = self.scope.state();
        let mut rows: Vec<_> = state
            .working
            .pull_requests
            .iter()
            .filter(|(_, row)| status.is_none_or(|wanted| row.status == wanted))
            .filter(|(_, row)| row.reviewers.iter().any(|(_, id)| id == reviewer_id))
            .collect();
        rows.sort_by(|(_, a), (_, b)| {
            b.created_at
                .cmp(&a.created_at)
                .then(b.created_seq.cmp(&a.created_seq))
        });
        rows.into_iter()
            .map(|(id, row)| row.to_domain(id).map_err(PullRequestRepositoryError::query))
            .collect()
    }

    async fn count_reviewers(
        &self,
        id: &PullRequestId,
    ) -> Result<usize, PullRequestRepositoryError> {
        self.scope.ensure_open()?;
        self.scope
            .state()
            .working
            .pull_requests
            .get(id)
            .map(|row| row.reviewers.len())
            .ok_or_else(|| PullRequestRepositoryError::not_found(id.clone()))
    }
}

#[cfg(test)]
#[path = "pull_request_repository_tests.rs"]
mod tests;
