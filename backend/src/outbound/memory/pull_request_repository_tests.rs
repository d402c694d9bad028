//! Tests for the in-memory pull request repository.

use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use mockable::MockClock;
use rstest::{fixture, rstest};

use super::*;
use crate::domain::ports::{Transaction, UnitOfWork};
use crate::domain::{NewTeam, PullRequestTitle, RequestContext, TeamId, TeamName, User};
use crate::outbound::memory::InMemoryUnitOfWork;

fn user_id(raw: &str) -> UserId {
    UserId::new(raw).expect("valid id")
}

fn pr_id(raw: &str) -> PullRequestId {
    PullRequestId::new(raw).expect("valid id")
}

fn new_pr(id: &str, author: &str, reviewers: &[&str]) -> NewPullRequest {
    NewPullRequest {
        id: pr_id(id),
        title: PullRequestTitle::new(format!("Change {id}")).expect("valid title"),
        author_id: user_id(author),
        reviewer_ids: reviewers.iter().map(|raw| user_id(raw)).collect(),
    }
}

async fn seed(uow: &InMemoryUnitOfWork) {
    let ctx = RequestContext::new();
    let mut tx = uow.begin(&ctx).await.expect("begin");
    let team_id = TeamId::new("core").expect("valid id");
    tx.teams()
        .create(&NewTeam {
            id: team_id.clone(),
            name: TeamName::new("Core").expect("valid name"),
        })
        .await
        .expect("team");
    for raw in ["u1", "u2", "u3", "u4"] {
        tx.users()
            .upsert(&User::try_from_strings(raw, format!("User {raw}"), true).expect("user"))
            .await
            .expect("upsert");
        tx.teams()
            .assign_member(&team_id, &user_id(raw))
            .await
            .expect("member");
    }
    tx.commit(&ctx).await.expect("seed commit");
}

#[fixture]
fn uow() -> InMemoryUnitOfWork {
    InMemoryUnitOfWork::new()
}

async fn open(uow: &InMemoryUnitOfWork) -> Box<dyn Transaction> {
    uow.begin(&RequestContext::new()).await.expect("begin")
}

async fn commit(mut tx: Box<dyn Transaction>) {
    tx.commit(&RequestContext::new()).await.expect("commit");
}

#[rstest]
#[tokio::test]
async fn create_keeps_reviewers_in_assignment_order(uow: InMemoryUnitOfWork) {
    seed(&uow).await;
    let tx = open(&uow).await;

    let created = tx
        .pull_requests()
        .create(&new_pr("pr-1", "u1", &["u3", "u2"]))
        .await
        .expect("created");

    assert_eq!(created.status(), PullRequestStatus::Open);
    assert_eq!(created.reviewer_ids(), &[user_id("u3"), user_id("u2")]);
    assert!(created.merged_at().is_none());
}

#[rstest]
#[tokio::test]
async fn create_rejects_duplicate_ids(uow: InMemoryUnitOfWork) {
    seed(&uow).await;
    let tx = open(&uow).await;
    tx.pull_requests()
        .create(&new_pr("pr-1", "u1", &[]))
        .await
        .expect("created");
    commit(tx).await;

    let tx = open(&uow).await;
    let error = tx
        .pull_requests()
        .create(&new_pr("pr-1", "u2", &[]))
        .await
        .expect_err("collision");
    assert_eq!(error, PullRequestRepositoryError::already_exists(pr_id("pr-1")));
}

#[rstest]
#[tokio::test]
async fn create_rejects_unknown_author(uow: InMemoryUnitOfWork) {
    seed(&uow).await;
    let tx = open(&uow).await;
    let error = tx
        .pull_requests()
        .create(&new_pr("pr-1", "ghost", &[]))
        .await
        .expect_err("unknown author");
    assert_eq!(error, PullRequestRepositoryError::user_not_found(user_id("ghost")));
}

#[rstest]
#[case("u2", PullRequestRepositoryError::reviewer_already_assigned(pr_id("pr-1"), user_id("u2")))]
#[case("ghost", PullRequestRepositoryError::user_not_found(user_id("ghost")))]
#[case("u1", PullRequestRepositoryError::author_as_reviewer(pr_id("pr-1"), user_id("u1")))]
#[tokio::test]
async fn add_reviewer_rejects_invalid_reviewers(
    uow: InMemoryUnitOfWork,
    #[case] reviewer: &str,
    #[case] expected: PullRequestRepositoryError,
) {
    seed(&uow).await;
    let tx = open(&uow).await;
    tx.pull_requests()
        .create(&new_pr("pr-1", "u1", &["u2"]))
        .await
        .expect("created");

    let error = tx
        .pull_requests()
        .add_reviewer(&pr_id("pr-1"), &user_id(reviewer))
        .await
        .expect_err("rejected");
    assert_eq!(error, expected);
}

#[rstest]
#[tokio::test]
async fn add_reviewer_enforces_the_cap(uow: InMemoryUnitOfWork) {
    seed(&uow).await;
    let tx = open(&uow).await;
    tx.pull_requests()
        .create(&new_pr("pr-1", "u1", &["u2", "u3"]))
        .await
        .expect("created");

    let error = tx
        .pull_requests()
        .add_reviewer(&pr_id("pr-1"), &user_id("u4"))
        .await
        .expect_err("cap reached");
    assert_eq!(
        error,
        PullRequestRepositoryError::too_many_reviewers(pr_id("pr-1"), 2_usize)
    );
    assert_eq!(
        tx.pull_requests()
            .count_reviewers(&pr_id("pr-1"))
            .await
            .expect("count"),
        2
    );
}

#[rstest]
#[tokio::test]
async fn reviewer_changes_on_missing_pull_request_report_not_found(uow: InMemoryUnitOfWork) {
    seed(&uow).await;
    let tx = open(&uow).await;
    let missing = pr_id("missing");

    assert_eq!(
        tx.pull_requests()
            .add_reviewer(&missing, &user_id("u2"))
            .await,
        Err(PullRequestRepositoryError::not_found(missing.clone()))
    );
    assert_eq!(
        tx.pull_requests()
            .update_status(&missing, PullRequestStatus::Merged, None)
            .await,
        Err(PullRequestRepositoryError::not_found(missing.clone()))
    );
    assert_eq!(
        tx.pull_requests().lock_by_id(&missing).await,
        Err(PullRequestRepositoryError::not_found(missing))
    );
}

#[rstest]
#[tokio::test]
async fn remove_reviewer_requires_assignment(uow: InMemoryUnitOfWork) {
    seed(&uow).await;
    let tx = open(&uow).await;
    tx.pull_requests()
        .create(&new_pr("pr-1", "u1", &["u2"]))
        .await
        .expect("created");

    let error = tx
        .pull_requests()
        .remove_reviewer(&pr_id("pr-1"), &user_id("u3"))
        .await
        .expect_err("not assigned");
    assert_eq!(
        error,
        PullRequestRepositoryError::reviewer_not_assigned(pr_id("pr-1"), user_id("u3"))
    );
}

#[rstest]
#[tokio::test]
async fn update_status_is_a_no_op_once_merged() {
    let first = Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).single().expect("valid time");
    let second = Utc.with_ymd_and_hms(2026, 2, 2, 3, 4, 5).single().expect("valid time");
    let mut clock = MockClock::new();
    clock.expect_utc().return_const(first);
    let uow = InMemoryUnitOfWork::with_clock(Arc::new(clock));
    seed(&uow).await;
    let tx = open(&uow).await;
    tx.pull_requests()
        .create(&new_pr("pr-1", "u1", &[]))
        .await
        .expect("created");

    let id = pr_id("pr-1");
    tx.pull_requests()
        .update_status(&id, PullRequestStatus::Merged, Some(first))
        .await
        .expect("merged");
    tx.pull_requests()
        .update_status(&id, PullRequestStatus::Merged, Some(second))
        .await
        .expect("second merge is a no-op");
    tx.pull_requests()
        .update_status(&id, PullRequestStatus::Open, None)
        .await
        .expect("reopen is ignored");

    let merged = tx.pull_requests().get_by_id(&id).await.expect("loaded");
    assert_eq!(merged.status(), PullRequestStatus::Merged);
    assert_eq!(merged.merged_at(), Some(first));
}

#[rstest]
#[tokio::test]
async fn list_by_reviewer_is_newest_first_and_filterable(uow: InMemoryUnitOfWork) {
    seed(&uow).await;
    let tx = open(&uow).await;
    for id in ["pr-1", "pr-2", "pr-3"] {
        tx.pull_requests()
            .create(&new_pr(id, "u1", &["u2"]))
            .await
            .expect("created");
    }
    tx.pull_requests()
        .create(&new_pr("pr-other", "u1", &["u3"]))
        .await
        .expect("created");
    tx.pull_requests()
        .update_status(&pr_id("pr-2"), PullRequestStatus::Merged, Some(Utc::now()))
        .await
        .expect("merged");

    let all = tx
        .pull_requests()
        .list_by_reviewer(&user_id("u2"), None)
        .await
        .expect("listed");
    let ids: Vec<_> = all.iter().map(|pr| pr.id().as_str()).collect();
    assert_eq!(ids, vec!["pr-3", "pr-2", "pr-1"]);

    let open_only = tx
        .pull_requests()
        .list_by_reviewer(&user_id("u2"), Some(PullRequestStatus::Open))
        .await
        .expect("listed");
    let ids: Vec<_> = open_only.iter().map(|pr| pr.id().as_str()).collect();
    assert_eq!(ids, vec!["pr-3", "pr-1"]);

    let none = tx
        .pull_requests()
        .list_by_reviewer(&user_id("u4"), None)
        .await
        .expect("listed");
    assert!(none.is_empty());
}

#[rstest]
#[tokio::test]
async fn lock_waits_for_the_holder_and_sees_its_commit(uow: InMemoryUnitOfWork) {
    seed(&uow).await;
    let tx = open(&uow).await;
    tx.pull_requests()
        .create(&new_pr("pr-1", "u1", &["u2"]))
        .await
        .expect("created");
    commit(tx).await;

    let holder = open(&uow).await;
    holder
        .pull_requests()
        .lock_by_id(&pr_id("pr-1"))
        .await
        .expect("locked");

    let waiter_uow = uow.clone();
    let waiter = tokio::spawn(async move {
        let tx = open(&waiter_uow).await;
        let seen = tx
            .pull_requests()
            .lock_by_id(&pr_id("pr-1"))
            .await
            .expect("locked after holder");
        seen.reviewer_ids().to_vec()
    });

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(!waiter.is_finished());

    holder
        .pull_requests()
        .add_reviewer(&pr_id("pr-1"), &user_id("u3"))
        .await
        .expect("added");
    commit(holder).await;

    let seen = waiter.await.expect("waiter joined");
    assert_eq!(seen, vec![user_id("u2"), user_id("u3")]);
}

#[rstest]
#[tokio::test]
async fn lock_wait_honours_the_deadline(uow: InMemoryUnitOfWork) {
    seed(&uow).await;
    let tx = open(&uow).await;
    tx.pull_requests()
        .create(&new_pr("pr-1", "u1", &[]))
        .await
        .expect("created");
    commit(tx).await;

    let holder = open(&uow).await;
    holder
        .pull_requests()
        .lock_by_id(&pr_id("pr-1"))
        .await
        .expect("locked");

    let ctx = RequestContext::new().with_timeout(Duration::from_millis(20));
    let waiter = uow.begin(&ctx).await.expect("begin");
    assert_eq!(
        waiter.pull_requests().lock_by_id(&pr_id("pr-1")).await,
        Err(PullRequestRepositoryError::cancelled())
    );
}

#[rstest]
#[tokio::test]
async fn colliding_creates_leave_one_winner(uow: InMemoryUnitOfWork) {
    seed(&uow).await;
    let first = open(&uow).await;
    let second_uow = uow.clone();

    first
        .pull_requests()
        .create(&new_pr("pr-1", "u1", &[]))
        .await
        .expect("first create");

    let loser = tokio::spawn(async move {
        let tx = open(&second_uow).await;
        tx.pull_requests()
            .create(&new_pr("pr-1", "u2", &[]))
            .await
    });

    tokio::time::sleep(Duration::from_millis(20)).await;
    commit(first).await;

    let outcome = loser.await.expect("loser joined");
    assert_eq!(
        outcome.map(|pr| pr.id().clone()),
        Err(PullRequestRepositoryError::already_exists(pr_id("pr-1")))
    );
}
