//! End-to-end lifecycle tests through the public engine API over the
//! in-memory adapter.

use std::collections::BTreeSet;
use std::sync::Arc;

use backend::domain::ports::{
    CreatePullRequestRequest, ListPullRequestsByAssigneeRequest, PullRequestCommand,
    PullRequestQuery, ReassignReviewerRequest, Transaction,
};
use backend::domain::{
    ErrorCode, NewTeam, PullRequest, PullRequestId, PullRequestService, PullRequestStatus,
    RandomReviewerSelector, RequestContext, TeamId, TeamName, User,
};
use backend::outbound::memory::InMemoryUnitOfWork;
use futures::future::join_all;
use mockable::DefaultClock;
use rstest::{fixture, rstest};

type Service = PullRequestService<InMemoryUnitOfWork>;

struct World {
    uow: Arc<InMemoryUnitOfWork>,
    service: Service,
}

impl World {
    async fn seed_team(&self, team: &str, members: &[(&str, bool)]) {
        let ctx = RequestContext::new();
        let mut tx = self.uow.begin_transaction(&ctx).expect("begin");
        let new_team = NewTeam {
            id: TeamId::new(team).expect("valid team id"),
            name: TeamName::new(format!("Team {team}")).expect("valid team name"),
        };
        tx.teams().create(&new_team).await.expect("team created");
        for (id, active) in members {
            let user = User::try_from_strings(id, format!("User {id}"), *active)
                .expect("valid user");
            tx.users().upsert(&user).await.expect("user stored");
            tx.teams()
                .assign_member(&new_team.id, user.id())
                .await
                .expect("member assigned");
        }
        tx.commit(&ctx).await.expect("seed commit");
    }

    async fn create(&self, pr: &str, author: &str) -> PullRequest {
        let request = CreatePullRequestRequest::try_new(pr, author, format!("Change {pr}"))
            .expect("valid request");
        self.service
            .create_pull_request(&RequestContext::new(), request)
            .await
            .expect("pull request created")
    }

    async fn list(&self, reviewer: &str, status: Option<&str>) -> Vec<PullRequest> {
        let request =
            ListPullRequestsByAssigneeRequest::try_new(reviewer, status).expect("valid request");
        self.service
            .list_pull_requests_by_assignee(&RequestContext::new(), request)
            .await
            .expect("listed")
    }
}

#[fixture]
fn world() -> World {
    let uow = Arc::new(InMemoryUnitOfWork::new());
    let service = PullRequestService::new(
        Arc::clone(&uow),
        Arc::new(RandomReviewerSelector::with_seed(2024)),
        Arc::new(DefaultClock),
    );
    World { uow, service }
}

fn pr_id(raw: &str) -> PullRequestId {
    PullRequestId::new(raw).expect("valid pull request id")
}

#[rstest]
#[tokio::test]
async fn create_reassign_merge_round_trip(world: World) {
    world
        .seed_team(
            "core",
            &[("alice", true), ("bob", true), ("carol", true), ("dave", true)],
        )
        .await;

    let created = world.create("pr-1", "alice").await;
    assert_eq!(created.status(), PullRequestStatus::Open);
    assert_eq!(created.reviewer_ids().len(), 2);
    assert!(!created.has_reviewer(created.author_id()));

    let old = created
        .reviewer_ids()
        .first()
        .expect("two reviewers")
        .clone();
    let request = ReassignReviewerRequest::try_new("pr-1", old.as_str()).expect("valid request");
    let swapped = world
        .service
        .reassign_reviewer(&RequestContext::new(), request)
        .await
        .expect("reassigned");
    let reviewers = swapped.pull_request.reviewer_ids();
    assert_eq!(reviewers.len(), 2);
    assert!(!reviewers.contains(&old));
    assert!(reviewers.contains(&swapped.replaced_by));
    assert_ne!(swapped.replaced_by.as_str(), "alice");

    let merged = world
        .service
        .merge_pull_request(&RequestContext::new(), &pr_id("pr-1"))
        .await
        .expect("merged");
    assert!(merged.is_merged());
    assert!(merged.merged_at().is_some());
    assert_eq!(merged.reviewer_ids(), reviewers);

    let again = world
        .service
        .merge_pull_request(&RequestContext::new(), &pr_id("pr-1"))
        .await
        .expect("merge is idempotent");
    assert_eq!(again, merged);

    let request = ReassignReviewerRequest::try_new("pr-1", swapped.replaced_by.as_str())
        .expect("valid request");
    let error = world
        .service
        .reassign_reviewer(&RequestContext::new(), request)
        .await
        .expect_err("merged pull requests are frozen");
    assert_eq!(error.code(), ErrorCode::AlreadyMerged);
}

#[rstest]
#[tokio::test]
async fn assignee_listing_follows_status_filter(world: World) {
    world
        .seed_team("core", &[("alice", true), ("bob", true)])
        .await;
    world.create("pr-1", "alice").await;
    world.create("pr-2", "alice").await;
    world
        .service
        .merge_pull_request(&RequestContext::new(), &pr_id("pr-1"))
        .await
        .expect("merged");

    let all = world.list("bob", None).await;
    assert_eq!(all.len(), 2);
    let open = world.list("bob", Some("OPEN")).await;
    assert_eq!(open.len(), 1);
    assert_eq!(open.first().map(|pr| pr.id().as_str()), Some("pr-2"));

    let error = ListPullRequestsByAssigneeRequest::try_new("bob", Some("CLOSED"))
        .expect_err("unknown status");
    assert_eq!(error.code(), ErrorCode::InvalidStatus);
}

#[rstest]
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn colliding_creates_admit_exactly_one(world: World) {
    world
        .seed_team("core", &[("alice", true), ("bob", true), ("carol", true)])
        .await;

    let attempts = (0..8).map(|_| {
        let service = world.service.clone();
        tokio::spawn(async move {
            let request = CreatePullRequestRequest::try_new("pr-race", "alice", "Race")
                .expect("valid request");
            service
                .create_pull_request(&RequestContext::new(), request)
                .await
        })
    });
    let outcomes: Vec<_> = join_all(attempts)
        .await
        .into_iter()
        .map(|joined| joined.expect("task joins"))
        .collect();

    let winners = outcomes.iter().filter(|outcome| outcome.is_ok()).count();
    assert_eq!(winners, 1);
    assert!(outcomes.iter().filter_map(|outcome| outcome.as_ref().err()).all(
        |error| error.code() == ErrorCode::PrExists
    ));
}

#[rstest]
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_reassigns_keep_reviewers_distinct(world: World) {
    world
        .seed_team(
            "core",
            &[
                ("alice", true),
                ("bob", true),
                ("carol", true),
                ("dave", true),
                ("erin", true),
                ("frank", true),
            ],
        )
        .await;
    let created = world.create("pr-1", "alice").await;

    let swaps = created.reviewer_ids().iter().map(|old| {
        let service = world.service.clone();
        let old = old.clone();
        tokio::spawn(async move {
            let request =
                ReassignReviewerRequest::try_new("pr-1", old.as_str()).expect("valid request");
            service
                .reassign_reviewer(&RequestContext::new(), request)
                .await
        })
    });
    for joined in join_all(swaps).await {
        joined.expect("task joins").expect("reassigned");
    }

    let current = world
        .service
        .get_pull_request(&RequestContext::new(), &pr_id("pr-1"))
        .await
        .expect("pull request exists");
    let distinct: BTreeSet<_> = current.reviewer_ids().iter().collect();
    assert_eq!(distinct.len(), 2);
    assert!(!current.has_reviewer(current.author_id()));
}

#[rstest]
#[tokio::test]
async fn cancelled_requests_leave_no_trace(world: World) {
    world
        .seed_team("core", &[("alice", true), ("bob", true)])
        .await;
    let ctx = RequestContext::new();
    ctx.cancel();
    let request =
        CreatePullRequestRequest::try_new("pr-1", "alice", "Never").expect("valid request");

    let error = world
        .service
        .create_pull_request(&ctx, request)
        .await
        .expect_err("cancelled");
    assert_eq!(error.code(), ErrorCode::Cancelled);

    let missing = world
        .service
        .get_pull_request(&RequestContext::new(), &pr_id("pr-1"))
        .await
        .expect_err("nothing written");
    assert_eq!(missing.code(), ErrorCode::PrNotFound);
}
