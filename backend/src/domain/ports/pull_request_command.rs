//! Driving port for pull request mutations.
//!
//! Inbound adapters (HTTP handlers, CLIs) call this port with identifiers
//! taken from the wire; request constructors validate them and report
//! `InvalidArgument` before any transaction is opened.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::{Error, PullRequest, PullRequestId, PullRequestTitle, RequestContext, UserId};

/// Request to open a pull request and auto-assign reviewers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePullRequestRequest {
    pub pull_request_id: PullRequestId,
    pub author_id: UserId,
    pub title: PullRequestTitle,
}

impl CreatePullRequestRequest {
    /// Validate raw inputs.
    ///
    /// # Examples
    /// ```
    /// use backend::domain::ports::CreatePullRequestRequest;
    ///
    /// let request = CreatePullRequestRequest::try_new("pr-1", "u1", "Add search")
    ///     .expect("valid request");
    /// assert_eq!(request.author_id.as_str(), "u1");
    /// ```
    pub fn try_new(
        pull_request_id: impl AsRef<str>,
        author_id: impl AsRef<str>,
        title: impl Into<String>,
    ) -> Result<Self, Error> {
        Ok(Self {
            pull_request_id: PullRequestId::new(pull_request_id)?,
            author_id: UserId::new(author_id)?,
            title: PullRequestTitle::new(title)?,
        })
    }
}

/// Request to replace one reviewer with another team member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReassignReviewerRequest {
    pub pull_request_id: PullRequestId,
    pub old_reviewer_id: UserId,
}

impl ReassignReviewerRequest {
    /// Validate raw inputs.
    pub fn try_new(
        pull_request_id: impl AsRef<str>,
        old_reviewer_id: impl AsRef<str>,
    ) -> Result<Self, Error> {
        Ok(Self {
            pull_request_id: PullRequestId::new(pull_request_id)?,
            old_reviewer_id: UserId::new(old_reviewer_id)?,
        })
    }
}

/// Outcome of a successful reassignment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReassignReviewerResponse {
    /// Canonical state after the swap.
    pub pull_request: PullRequest,
    /// Reviewer that took over from the old one.
    pub replaced_by: UserId,
}

/// Driving port for pull request mutations.
#[async_trait]
pub trait PullRequestCommand: Send + Sync {
    /// Create an `OPEN` pull request with up to two reviewers drawn from the
    /// author's active team mates.
    async fn create_pull_request(
        &self,
        ctx: &RequestContext,
        request: CreatePullRequestRequest,
    ) -> Result<PullRequest, Error>;

    /// Swap `old_reviewer_id` for a randomly chosen eligible team mate.
    async fn reassign_reviewer(
        &self,
        ctx: &RequestContext,
        request: ReassignReviewerRequest,
    ) -> Result<ReassignReviewerResponse, Error>;

    /// Merge a pull request. Merging an already merged pull request
    /// succeeds and returns its unchanged state.
    async fn merge_pull_request(
        &self,
        ctx: &RequestContext,
        pull_request_id: &PullRequestId,
    ) -> Result<PullRequest, Error>;
}
