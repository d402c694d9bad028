//! Driving port for pull request reads.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::{Error, PullRequest, PullRequestId, PullRequestStatus, RequestContext, UserId};

/// Request to list the pull requests a user reviews.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListPullRequestsByAssigneeRequest {
    pub reviewer_id: UserId,
    /// Optional status filter.
    pub status: Option<PullRequestStatus>,
}

impl ListPullRequestsByAssigneeRequest {
    /// Validate raw inputs; an unknown status string yields `InvalidStatus`.
    ///
    /// # Examples
    /// ```
    /// use backend::domain::ports::ListPullRequestsByAssigneeRequest;
    /// use backend::domain::PullRequestStatus;
    ///
    /// let request = ListPullRequestsByAssigneeRequest::try_new("u2", Some("OPEN"))
    ///     .expect("valid request");
    /// assert_eq!(request.status, Some(PullRequestStatus::Open));
    /// ```
    pub fn try_new(reviewer_id: impl AsRef<str>, status: Option<&str>) -> Result<Self, Error> {
        Ok(Self {
            reviewer_id: UserId::new(reviewer_id)?,
            status: status.map(str::parse).transpose()?,
        })
    }
}

/// Driving port for pull request reads.
///
/// Reads run inside a transaction for snapshot consistency and never commit.
#[async_trait]
pub trait PullRequestQuery: Send + Sync {
    /// Fetch one pull request.
    async fn get_pull_request(
        &self,
        ctx: &RequestContext,
        pull_request_id: &PullRequestId,
    ) -> Result<PullRequest, Error>;

    /// Pull requests assigned to a reviewer, newest first.
    async fn list_pull_requests_by_assignee(
        &self,
        ctx: &RequestContext,
        request: ListPullRequestsByAssigneeRequest,
    ) -> Result<Vec<PullRequest>, Error>;
}
