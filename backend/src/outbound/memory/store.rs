//! Shared state and per-transaction scope for the in-memory adapter.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use mockable::Clock;
use tokio::sync::{Mutex as RowLock, OwnedMutexGuard};

use crate::domain::{
    ContextError, PullRequest, PullRequestDraft, PullRequestId, PullRequestStatus,
    PullRequestTitle, RequestContext, TeamId, TeamName, User, UserId,
};

/// Stored pull request, reviewers tagged with their assignment sequence.
#[derive(Debug, Clone)]
pub(super) struct PullRequestRow {
    pub(super) title: PullRequestTitle,
    pub(super) author_id: UserId,
    pub(super) status: PullRequestStatus,
    pub(super) reviewers: Vec<(u64, UserId)>,
    pub(super) created_seq: u64,
    pub(super) created_at: DateTime<Utc>,
    pub(super) updated_at: DateTime<Utc>,
    pub(super) merged_at: Option<DateTime<Utc>>,
}

impl PullRequestRow {
    pub(super) fn to_domain(&self, id: &PullRequestId) -> Result<PullRequest, String> {
        let mut reviewers = self.reviewers.clone();
        reviewers.sort_by_key(|(seq, _)| *seq);
        PullRequest::new(PullRequestDraft {
            id: id.clone(),
            title: self.title.clone(),
            author_id: self.author_id.clone(),
            status: self.status,
            reviewer_ids: reviewers.into_iter().map(|(_, id)| id).collect(),
            created_at: self.created_at,
            updated_at: self.updated_at,
            merged_at: self.merged_at,
        })
        .map_err(|err| format!("stored pull request {id} is inconsistent: {err}"))
    }
}

/// Every table of the store.
#[derive(Debug, Clone, Default)]
pub(super) struct StoreData {
    pub(super) users: BTreeMap<UserId, User>,
    pub(super) teams: BTreeMap<TeamId, TeamName>,
    pub(super) memberships: BTreeMap<UserId, TeamId>,
    pub(super) pull_requests: BTreeMap<PullRequestId, PullRequestRow>,
}

impl StoreData {
    pub(super) fn member_ids(&self, team_id: &TeamId) -> Vec<UserId> {
        self.memberships
            .iter()
            .filter(|(_, team)| *team == team_id)
            .map(|(user, _)| user.clone())
            .collect()
    }
}

/// Keys written by a transaction.
#[derive(Debug, Default)]
pub(super) struct DirtySet {
    pub(super) users: BTreeSet<UserId>,
    pub(super) teams: BTreeSet<TeamId>,
    pub(super) created_teams: BTreeSet<TeamId>,
    pub(super) memberships: BTreeSet<UserId>,
    pub(super) pull_requests: BTreeSet<PullRequestId>,
}

/// Committed state shared by every transaction of one unit of work.
pub(super) struct Store {
    data: Mutex<StoreData>,
    row_locks: Mutex<HashMap<PullRequestId, Arc<RowLock<()>>>>,
    sequence: AtomicU64,
    clock: Arc<dyn Clock>,
}

impl Store {
    pub(super) fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            data: Mutex::new(StoreData::default()),
            row_locks: Mutex::new(HashMap::new()),
            sequence: AtomicU64::new(0),
            clock,
        }
    }

    pub(super) fn committed(&self) -> MutexGuard<'_, StoreData> {
        self.data.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(super) fn next_sequence(&self) -> u64 {
        self.sequence.fetch_add(1, Ordering::Relaxed)
    }

    pub(super) fn now(&self) -> DateTime<Utc> {
        self.clock.utc()
    }

    fn row_lock(&self, id: &PullRequestId) -> Arc<RowLock<()>> {
        let mut locks = self.row_locks.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(locks.entry(id.clone()).or_default())
    }

    /// Drop lock entries nobody holds or waits on.
    fn prune_row_locks(&self) {
        let mut locks = self.row_locks.lock().unwrap_or_else(PoisonError::into_inner);
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
    }

    #[cfg(test)]
    pub(super) fn row_lock_count(&self) -> usize {
        self.row_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// Why a repository call could not touch the transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum ScopeError {
    Cancelled,
    Finished,
}

impl From<ContextError> for ScopeError {
    fn from(_: ContextError) -> Self {
        Self::Cancelled
    }
}

pub(super) const FINISHED_MESSAGE: &str = "transaction already finished";

pub(super) struct ScopeState {
    pub(super) working: StoreData,
    pub(super) dirty: DirtySet,
    pub(super) finished: bool,
}

/// Private view of the store for one transaction.
pub(super) struct TransactionScope {
    store: Arc<Store>,
    ctx: RequestContext,
    state: Mutex<ScopeState>,
    held: Mutex<HashMap<PullRequestId, OwnedMutexGuard<()>>>,
}

impl TransactionScope {
    pub(super) fn begin(store: Arc<Store>, ctx: RequestContext) -> Self {
        let working = store.committed().clone();
        Self {
            store,
            ctx,
            state: Mutex::new(ScopeState {
                working,
                dirty: DirtySet::default(),
                finished: false,
            }),
            held: Mutex::new(HashMap::new()),
        }
    }

    pub(super) fn store(&self) -> &Store {
        &self.store
    }

    pub(super) fn state(&self) -> MutexGuard<'_, ScopeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Fail when the request is gone or the transaction has ended.
    pub(super) fn ensure_open(&self) -> Result<(), ScopeError> {
        self.ctx.check()?;
        if self.state().finished {
            return Err(ScopeError::Finished);
        }
        Ok(())
    }

    fn holds(&self, id: &PullRequestId) -> bool {
        self.held
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(id)
    }

    /// Take the row lock for `id` unless this transaction already holds it.
    ///
    /// On first acquisition the working copy of the row is replaced by the
    /// committed one, so the holder sees what the previous holder committed.
    pub(super) async fn lock_row(&self, id: &PullRequestId) -> Result<(), ScopeError> {
        self.ensure_open()?;
        if self.holds(id) {
            return Ok(());
        }

        let row_lock = self.store.row_lock(id);
        let guard = self.ctx.run(row_lock.lock_owned()).await?;

        let committed_row = self.store.committed().pull_requests.get(id).cloned();
        {
            let mut state = self.state();
            match committed_row {
                Some(row) => state.working.pull_requests.insert(id.clone(), row),
                None => state.working.pull_requests.remove(id),
            };
        }
        self.held
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id.clone(), guard);
        Ok(())
    }

    /// Publish every dirty row.
    ///
    /// Team rows created by this transaction are checked against teams
    /// committed meanwhile; a clash aborts the whole commit.
    pub(super) fn publish(&self) -> Result<(), String> {
        let mut state = self.state();
        let mut committed = self.store.committed();
        let ScopeState { working, dirty, .. } = &mut *state;

        for team_id in &dirty.created_teams {
            if committed.teams.contains_key(team_id) {
                return Err(format!("team {team_id} was created concurrently"));
            }
            let name_taken = working
                .teams
                .get(team_id)
                .is_some_and(|name| committed.teams.values().any(|existing| existing == name));
            if name_taken {
                return Err(format!("team {team_id} name was taken concurrently"));
            }
        }

        for id in &dirty.users {
            write_back(&mut committed.users, &working.users, id);
        }
        for id in &dirty.teams {
            write_back(&mut committed.teams, &working.teams, id);
        }
        for id in &dirty.memberships {
            write_back(&mut committed.memberships, &working.memberships, id);
        }
        for id in &dirty.pull_requests {
            write_back(&mut committed.pull_requests, &working.pull_requests, id);
        }
        Ok(())
    }

    /// Mark the transaction ended, discard its copy and release row locks.
    pub(super) fn close(&self) {
        {
            let mut state = self.state();
            state.finished = true;
            state.working = StoreData::default();
            state.dirty = DirtySet::default();
        }
        self.held
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        self.store.prune_row_locks();
    }

    pub(super) fn is_finished(&self) -> bool {
        self.state().finished
    }
}

// Covers transactions abandoned without commit or rollback, e.g. an aborted
// task. Guards go first so the pruning sees the entries as unused.
impl Drop for TransactionScope {
    fn drop(&mut self) {
        self.held
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        self.store.prune_row_locks();
    }
}

fn write_back<K, V>(committed: &mut BTreeMap<K, V>, working: &BTreeMap<K, V>, key: &K)
where
    K: Ord + Clone,
    V: Clone,
{
    match working.get(key) {
        Some(value) => committed.insert(key.clone(), value.clone()),
        None => committed.remove(key),
    };
}
