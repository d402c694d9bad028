//! Pull request aggregate and its two-state lifecycle.
//!
//! A pull request starts `OPEN` and may transition once to `MERGED`, which is
//! terminal. While open it carries at most [`MAX_REVIEWERS`] reviewers, kept
//! in assignment order (oldest first).

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Error, PullRequestId, UserId};

/// Upper bound on simultaneously assigned reviewers.
pub const MAX_REVIEWERS: usize = 2;

/// Maximum allowed length for a pull request title.
pub const TITLE_MAX: usize = 255;

/// Lifecycle status of a pull request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PullRequestStatus {
    /// Initial state; reviewers may be swapped.
    Open,
    /// Terminal state.
    Merged,
}

impl PullRequestStatus {
    /// Storage and wire representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Open => "OPEN",
            Self::Merged => "MERGED",
        }
    }
}

impl fmt::Display for PullRequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raised when a status string is neither `OPEN` nor `MERGED`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid pull request status: {value}")]
pub struct InvalidStatusError {
    pub value: String,
}

impl From<InvalidStatusError> for Error {
    fn from(value: InvalidStatusError) -> Self {
        Self::invalid_status(value.to_string())
    }
}

impl FromStr for PullRequestStatus {
    type Err = InvalidStatusError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "OPEN" => Ok(Self::Open),
            "MERGED" => Ok(Self::Merged),
            other => Err(InvalidStatusError {
                value: other.to_owned(),
            }),
        }
    }
}

/// Validated pull request title.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PullRequestTitle(String);

impl PullRequestTitle {
    /// Validate and construct a title.
    pub fn new(title: impl Into<String>) -> Result<Self, PullRequestValidationError> {
        let title = title.into();
        if title.trim().is_empty() {
            return Err(PullRequestValidationError::EmptyTitle);
        }
        if title.chars().count() > TITLE_MAX {
            return Err(PullRequestValidationError::TitleTooLong { max: TITLE_MAX });
        }
        Ok(Self(title))
    }
}

impl AsRef<str> for PullRequestTitle {
    fn as_ref(&self) -> &str {
        self.0.as_str()
    }
}

impl From<PullRequestTitle> for String {
    fn from(value: PullRequestTitle) -> Self {
        value.0
    }
}

impl TryFrom<String> for PullRequestTitle {
    type Error = PullRequestValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

/// Invariant violations detected while building a [`PullRequest`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PullRequestValidationError {
    #[error("pull request title must not be empty")]
    EmptyTitle,
    #[error("pull request title must be at most {max} characters")]
    TitleTooLong { max: usize },
    #[error("pull request has {count} reviewers; at most {max} are allowed")]
    TooManyReviewers { count: usize, max: usize },
    #[error("reviewer {reviewer_id} is listed more than once")]
    DuplicateReviewer { reviewer_id: UserId },
    #[error("author {author_id} cannot review their own pull request")]
    AuthorAsReviewer { author_id: UserId },
    #[error("merged_at must be set if and only if the pull request is merged")]
    MergedAtMismatch,
}

impl From<PullRequestValidationError> for Error {
    fn from(value: PullRequestValidationError) -> Self {
        Self::invalid_argument(value.to_string())
    }
}

/// Unvalidated pull request fields, as loaded from storage or the wire.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PullRequestDraft {
    pub id: PullRequestId,
    pub title: PullRequestTitle,
    pub author_id: UserId,
    pub status: PullRequestStatus,
    pub reviewer_ids: Vec<UserId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub merged_at: Option<DateTime<Utc>>,
}

/// Snapshot of a persisted pull request.
///
/// ## Invariants
/// - `reviewer_ids` holds at most [`MAX_REVIEWERS`] distinct ids and never
///   contains `author_id`.
/// - `merged_at` is present exactly when `status` is
///   [`PullRequestStatus::Merged`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "PullRequestDraft")]
pub struct PullRequest {
    id: PullRequestId,
    title: PullRequestTitle,
    author_id: UserId,
    status: PullRequestStatus,
    reviewer_ids: Vec<UserId>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    merged_at: Option<DateTime<Utc>>,
}

impl PullRequest {
    /// Validate a draft and build the snapshot.
    pub fn new(draft: PullRequestDraft) -> Result<Self, PullRequestValidationError> {
        let PullRequestDraft {
            id,
            title,
            author_id,
            status,
            reviewer_ids,
            created_at,
            updated_at,
            merged_at,
        } = draft;

        validate_reviewers(&author_id, &reviewer_ids)?;
        if (status == PullRequestStatus::Merged) != merged_at.is_some() {
            return Err(PullRequestValidationError::MergedAtMismatch);
        }

        Ok(Self {
            id,
            title,
            author_id,
            status,
            reviewer_ids,
            created_at,
            updated_at,
            merged_at,
        })
    }

    #[must_use]
    pub fn id(&self) -> &PullRequestId {
        &self.id
    }

    #[must_use]
    pub fn title(&self) -> &PullRequestTitle {
        &self.title
    }

    #[must_use]
    pub fn author_id(&self) -> &UserId {
        &self.author_id
    }

    #[must_use]
    pub fn status(&self) -> PullRequestStatus {
        self.status
    }

    /// Reviewers in assignment order, oldest first.
    #[must_use]
    pub fn reviewer_ids(&self) -> &[UserId] {
        &self.reviewer_ids
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    #[must_use]
    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    #[must_use]
    pub fn merged_at(&self) -> Option<DateTime<Utc>> {
        self.merged_at
    }

    #[must_use]
    pub fn is_merged(&self) -> bool {
        self.status == PullRequestStatus::Merged
    }

    /// Whether `user_id` is currently assigned as a reviewer.
    #[must_use]
    pub fn has_reviewer(&self, user_id: &UserId) -> bool {
        self.reviewer_ids.contains(user_id)
    }
}

impl TryFrom<PullRequestDraft> for PullRequest {
    type Error = PullRequestValidationError;

    fn try_from(value: PullRequestDraft) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

/// Input for persisting a brand new pull request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPullRequest {
    pub id: PullRequestId,
    pub title: PullRequestTitle,
    pub author_id: UserId,
    /// Reviewers to attach, in assignment order.
    pub reviewer_ids: Vec<UserId>,
}

fn validate_reviewers(
    author_id: &UserId,
    reviewer_ids: &[UserId],
) -> Result<(), PullRequestValidationError> {
    if reviewer_ids.len() > MAX_REVIEWERS {
        return Err(PullRequestValidationError::TooManyReviewers {
            count: reviewer_ids.len(),
            max: MAX_REVIEWERS,
        });
    }
    for (index, reviewer_id) in reviewer_ids.iter().enumerate() {
        if reviewer_id == author_id {
            return Err(PullRequestValidationError::AuthorAsReviewer {
                author_id: author_id.clone(),
            });
        }
        if reviewer_ids
            .get(..index)
            .is_some_and(|earlier| earlier.contains(reviewer_id))
        {
            return Err(PullRequestValidationError::DuplicateReviewer {
                reviewer_id: reviewer_id.clone(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ErrorCode;
    use rstest::{fixture, rstest};

    fn user(raw: &str) -> UserId {
        UserId::new(raw).expect("valid user id")
    }

    #[fixture]
    fn draft() -> PullRequestDraft {
        let now = Utc::now();
        PullRequestDraft {
            id: PullRequestId::new("pr-1").expect("valid pr id"),
            title: PullRequestTitle::new("Add search").expect("valid title"),
            author_id: user("u1"),
            status: PullRequestStatus::Open,
            reviewer_ids: vec![user("u2"), user("u3")],
            created_at: now,
            updated_at: now,
            merged_at: None,
        }
    }

    #[rstest]
    fn builds_valid_snapshot(draft: PullRequestDraft) {
        let pr = PullRequest::new(draft).expect("valid pull request");
        assert_eq!(pr.reviewer_ids(), &[user("u2"), user("u3")]);
        assert!(pr.has_reviewer(&user("u3")));
        assert!(!pr.is_merged());
    }

    #[rstest]
    fn rejects_more_than_two_reviewers(mut draft: PullRequestDraft) {
        draft.reviewer_ids.push(user("u4"));
        assert_eq!(
            PullRequest::new(draft),
            Err(PullRequestValidationError::TooManyReviewers { count: 3, max: 2 })
        );
    }

    #[rstest]
    fn rejects_duplicate_reviewers(mut draft: PullRequestDraft) {
        draft.reviewer_ids = vec![user("u2"), user("u2")];
        assert!(matches!(
            PullRequest::new(draft),
            Err(PullRequestValidationError::DuplicateReviewer { .. })
        ));
    }

    #[rstest]
    fn rejects_author_as_reviewer(mut draft: PullRequestDraft) {
        draft.reviewer_ids = vec![user("u1")];
        assert!(matches!(
            PullRequest::new(draft),
            Err(PullRequestValidationError::AuthorAsReviewer { .. })
        ));
    }

    #[rstest]
    fn merged_status_requires_merged_at(mut draft: PullRequestDraft) {
        draft.status = PullRequestStatus::Merged;
        assert_eq!(
            PullRequest::new(draft.clone()),
            Err(PullRequestValidationError::MergedAtMismatch)
        );

        draft.merged_at = Some(Utc::now());
        assert!(PullRequest::new(draft).expect("merged snapshot").is_merged());
    }

    fn wire(author: &str, reviewers: &[&str], status: &str, merged_at: Option<&str>) -> String {
        serde_json::json!({
            "id": "pr-1",
            "title": "Add search",
            "authorId": author,
            "status": status,
            "reviewerIds": reviewers,
            "createdAt": "2026-01-01T00:00:00Z",
            "updatedAt": "2026-01-01T00:00:00Z",
            "mergedAt": merged_at,
        })
        .to_string()
    }

    #[rstest]
    #[case(&["u1", "u2", "u2"], "OPEN", None)]
    #[case(&["u2", "u2"], "OPEN", None)]
    #[case(&["u1"], "OPEN", None)]
    #[case(&["u2"], "MERGED", None)]
    #[case(&["u2"], "OPEN", Some("2026-01-02T00:00:00Z"))]
    fn deserialisation_enforces_invariants(
        #[case] reviewers: &[&str],
        #[case] status: &str,
        #[case] merged_at: Option<&str>,
    ) {
        let parsed = serde_json::from_str::<PullRequest>(&wire("u1", reviewers, status, merged_at));
        assert!(parsed.is_err());
    }

    #[rstest]
    fn deserialised_snapshot_round_trips(draft: PullRequestDraft) {
        let pr = PullRequest::new(draft).expect("valid pull request");
        let json = serde_json::to_string(&pr).expect("serialises");
        let back: PullRequest = serde_json::from_str(&json).expect("deserialises");
        assert_eq!(back, pr);
    }

    #[rstest]
    #[case("OPEN", PullRequestStatus::Open)]
    #[case("MERGED", PullRequestStatus::Merged)]
    fn parses_known_statuses(#[case] raw: &str, #[case] expected: PullRequestStatus) {
        assert_eq!(raw.parse::<PullRequestStatus>(), Ok(expected));
        assert_eq!(expected.as_str(), raw);
    }

    #[rstest]
    #[case("CLOSED")]
    #[case("open")]
    #[case("")]
    fn unknown_statuses_map_to_invalid_status(#[case] raw: &str) {
        let error: Error = raw
            .parse::<PullRequestStatus>()
            .expect_err("unknown status")
            .into();
        assert_eq!(error.code(), ErrorCode::InvalidStatus);
    }
}
