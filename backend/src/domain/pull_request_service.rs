//! Pull request engine implementing the command and query driving ports.
//!
//! Every operation runs inside one transaction from the injected
//! [`UnitOfWork`]. Mutations that touch an existing pull request take its row
//! lock before looking at its status, so concurrent reassigns and merges on
//! the same pull request are serialised by storage. The engine keeps no
//! in-process locks of its own.

use std::sync::Arc;

use async_trait::async_trait;
use mockable::Clock;
use tracing::info;

use crate::domain::ports::{
    CreatePullRequestRequest, ListPullRequestsByAssigneeRequest, PullRequestCommand,
    PullRequestQuery, ReassignReviewerRequest, ReassignReviewerResponse, Transaction, UnitOfWork,
};
use crate::domain::pull_request_service_support::{finish_mutation, finish_read};
use crate::domain::{
    Error, MAX_REVIEWERS, NewPullRequest, PullRequest, PullRequestId, PullRequestStatus,
    RequestContext, ReviewerSelector, UserId,
};

/// Pull request service implementing the driving ports.
pub struct PullRequestService<U: ?Sized> {
    unit_of_work: Arc<U>,
    selector: Arc<dyn ReviewerSelector>,
    clock: Arc<dyn Clock>,
}

impl<U: ?Sized> Clone for PullRequestService<U> {
    fn clone(&self) -> Self {
        Self {
            unit_of_work: Arc::clone(&self.unit_of_work),
            selector: Arc::clone(&self.selector),
            clock: Arc::clone(&self.clock),
        }
    }
}

impl<U: ?Sized> PullRequestService<U> {
    /// Create a service over a unit of work, a reviewer selector and a clock
    /// used to stamp merges.
    ///
    /// ```rust
    /// # use std::sync::Arc;
    /// # use backend::domain::{PullRequestService, RandomReviewerSelector};
    /// # use backend::outbound::memory::InMemoryUnitOfWork;
    /// # use mockable::DefaultClock;
    /// let service = PullRequestService::new(
    ///     Arc::new(InMemoryUnitOfWork::new()),
    ///     Arc::new(RandomReviewerSelector::with_seed(1)),
    ///     Arc::new(DefaultClock),
    /// );
    /// # let _ = service;
    /// ```
    pub fn new(
        unit_of_work: Arc<U>,
        selector: Arc<dyn ReviewerSelector>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            unit_of_work,
            selector,
            clock,
        }
    }
}

impl<U> PullRequestService<U>
where
    U: UnitOfWork + ?Sized,
{
    async fn begin(&self, ctx: &RequestContext) -> Result<Box<dyn Transaction>, Error> {
        self.unit_of_work
            .begin(ctx)
            .await
            .map_err(Error::from)
    }

    /// Active members of the author's team, excluding the author and every
    /// id in `excluded`.
    async fn candidate_pool(
        tx: &dyn Transaction,
        author_id: &UserId,
        excluded: &[UserId],
    ) -> Result<Vec<UserId>, Error> {
        let team_id = tx
            .users()
            .team_id_for_user(author_id)
            .await
            .map_err(Error::from)?;
        let members = tx
            .users()
            .list_active_member_ids(&team_id)
            .await
            .map_err(Error::from)?;
        Ok(members
            .into_iter()
            .filter(|id| id != author_id && !excluded.contains(id))
            .collect())
    }

    async fn create_in(
        &self,
        tx: &dyn Transaction,
        request: CreatePullRequestRequest,
    ) -> Result<PullRequest, Error> {
        let author = tx
            .users()
            .get_by_id(&request.author_id)
            .await
            .map_err(Error::from)?;
        let candidates = Self::candidate_pool(tx, author.id(), &[]).await?;
        let reviewer_ids = self.selector.select(&candidates, MAX_REVIEWERS);

        let new_pull_request = NewPullRequest {
            id: request.pull_request_id,
            title: request.title,
            author_id: request.author_id,
            reviewer_ids,
        };
        tx.pull_requests()
            .create(&new_pull_request)
            .await
            .map_err(Error::from)
    }

    async fn reassign_in(
        &self,
        tx: &dyn Transaction,
        request: ReassignReviewerRequest,
    ) -> Result<ReassignReviewerResponse, Error> {
        let ReassignReviewerRequest {
            pull_request_id,
            old_reviewer_id,
        } = request;
        let pull_requests = tx.pull_requests();

        let current = pull_requests
            .lock_by_id(&pull_request_id)
            .await
            .map_err(Error::from)?;
        if current.is_merged() {
            return Err(Error::already_merged(format!(
                "pull request {pull_request_id} is already merged"
            )));
        }
        if !current.has_reviewer(&old_reviewer_id) {
            return Err(Error::reviewer_not_assigned(format!(
                "reviewer {old_reviewer_id} is not assigned to pull request {pull_request_id}"
            )));
        }

        let candidates =
            Self::candidate_pool(tx, current.author_id(), current.reviewer_ids()).await?;
        let replaced_by = self
            .selector
            .select(&candidates, 1)
            .into_iter()
            .next()
            .ok_or_else(|| {
                Error::no_replacement_candidates(format!(
                    "no active team member can replace {old_reviewer_id} on pull request {pull_request_id}"
                ))
            })?;

        pull_requests
            .remove_reviewer(&pull_request_id, &old_reviewer_id)
            .await
            .map_err(Error::from)?;
        pull_requests
            .add_reviewer(&pull_request_id, &replaced_by)
            .await
            .map_err(Error::from)?;
        let pull_request = pull_requests
            .get_by_id(&pull_request_id)
            .await
            .map_err(Error::from)?;

        Ok(ReassignReviewerResponse {
            pull_request,
            replaced_by,
        })
    }

    async fn merge_in(
        &self,
        tx: &dyn Transaction,
        pull_request_id: &PullRequestId,
    ) -> Result<PullRequest, Error> {
        let pull_requests = tx.pull_requests();
        let current = pull_requests
            .lock_by_id(pull_request_id)
            .await
            .map_err(Error::from)?;
        if current.is_merged() {
            return Ok(current);
        }

        pull_requests
            .update_status(
                pull_request_id,
                PullRequestStatus::Merged,
                Some(self.clock.utc()),
            )
            .await
            .map_err(Error::from)?;
        pull_requests
            .get_by_id(pull_request_id)
            .await
            .map_err(Error::from)
    }
}

#[async_trait]
impl<U> PullRequestCommand for PullRequestService<U>
where
    U: UnitOfWork + ?Sized,
{
    async fn create_pull_request(
        &self,
        ctx: &RequestContext,
        request: CreatePullRequestRequest,
    ) -> Result<PullRequest, Error> {
        let tx = self.begin(ctx).await?;
        let outcome = self.create_in(tx.as_ref(), request).await;
        let pull_request = finish_mutation(tx, ctx, outcome).await?;

        info!(
            correlation_id = %ctx.correlation_id(),
            pr_id = %pull_request.id(),
            author_id = %pull_request.author_id(),
            reviewers = pull_request.reviewer_ids().len(),
            "pull request created"
        );
        Ok(pull_request)
    }

    async fn reassign_reviewer(
        &self,
        ctx: &RequestContext,
        request: ReassignReviewerRequest,
    ) -> Result<ReassignReviewerResponse, Error> {
        let old_reviewer_id = request.old_reviewer_id.clone();
        let tx = self.begin(ctx).await?;
        let outcome = self.reassign_in(tx.as_ref(), request).await;
        let response = finish_mutation(tx, ctx, outcome).await?;

        info!(
            correlation_id = %ctx.correlation_id(),
            pr_id = %response.pull_request.id(),
            reviewer_id = %old_reviewer_id,
            replaced_by = %response.replaced_by,
            "reviewer reassigned"
        );
        Ok(response)
    }

    async fn merge_pull_request(
        &self,
        ctx: &RequestContext,
        pull_request_id: &PullRequestId,
    ) -> Result<PullRequest, Error> {
        let tx = self.begin(ctx).await?;
        let outcome = self.merge_in(tx.as_ref(), pull_request_id).await;
        let pull_request = finish_mutation(tx, ctx, outcome).await?;

        info!(
            correlation_id = %ctx.correlation_id(),
            pr_id = %pull_request_id,
            "pull request merged"
        );
        Ok(pull_request)
    }
}

#[async_trait]
impl<U> PullRequestQuery for PullRequestService<U>
where
    U: UnitOfWork + ?Sized,
{
    async fn get_pull_request(
        &self,
        ctx: &RequestContext,
        pull_request_id: &PullRequestId,
    ) -> Result<PullRequest, Error> {
        let tx = self.begin(ctx).await?;
        let outcome = tx
            .pull_requests()
            .get_by_id(pull_request_id)
            .await
            .map_err(Error::from);
        finish_read(tx, ctx, outcome).await
    }

    async fn list_pull_requests_by_assignee(
        &self,
        ctx: &RequestContext,
        request: ListPullRequestsByAssigneeRequest,
    ) -> Result<Vec<PullRequest>, Error> {
        let tx = self.begin(ctx).await?;
        let outcome = tx
            .pull_requests()
            .list_by_reviewer(&request.reviewer_id, request.status)
            .await
            .map_err(Error::from);
        finish_read(tx, ctx, outcome).await
    }
}

#[cfg(test)]
#[path = "pull_request_service_tests.rs"]
mod tests;
