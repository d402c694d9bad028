//! In-memory unit of work.

use std::sync::Arc;

use async_trait::async_trait;
use mockable::{Clock, DefaultClock};
use tracing::debug;

use crate::domain::RequestContext;
use crate::domain::ports::{
    PullRequestRepository, TeamRepository, Transaction, UnitOfWork, UnitOfWorkError,
    UserRepository,
};

use super::store::{Store, TransactionScope};
use super::{InMemoryPullRequestRepository, InMemoryTeamRepository, InMemoryUserRepository};

/// Unit of work over a process-local store.
///
/// Clones share the same committed state.
///
/// # Examples
/// ```rust,no_run
/// # use backend::domain::RequestContext;
/// # use backend::domain::ports::UnitOfWork;
/// # use backend::outbound::memory::InMemoryUnitOfWork;
/// # async fn example() -> Result<(), backend::domain::ports::UnitOfWorkError> {
/// let uow = InMemoryUnitOfWork::new();
/// let ctx = RequestContext::new();
/// let mut tx = uow.begin(&ctx).await?;
/// tx.commit(&ctx).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct InMemoryUnitOfWork {
    store: Arc<Store>,
}

impl InMemoryUnitOfWork {
    /// Empty store stamped by the system clock.
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(Arc::new(DefaultClock))
    }

    /// Empty store stamped by `clock`.
    #[must_use]
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            store: Arc::new(Store::new(clock)),
        }
    }

    /// Open a transaction with the concrete adapter type.
    ///
    /// Seeding code uses this to reach the repositories without boxing.
    pub fn begin_transaction(
        &self,
        ctx: &RequestContext,
    ) -> Result<InMemoryTransaction, UnitOfWorkError> {
        ctx.check()?;
        let scope = Arc::new(TransactionScope::begin(
            Arc::clone(&self.store),
            ctx.clone(),
        ));
        debug!(correlation_id = %ctx.correlation_id(), "in-memory transaction started");
        Ok(InMemoryTransaction {
            pull_requests: InMemoryPullRequestRepository::new(Arc::clone(&scope)),
            users: InMemoryUserRepository::new(Arc::clone(&scope)),
            teams: InMemoryTeamRepository::new(Arc::clone(&scope)),
            scope,
        })
    }
}

impl Default for InMemoryUnitOfWork {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl UnitOfWork for InMemoryUnitOfWork {
    async fn begin(&self, ctx: &RequestContext) -> Result<Box<dyn Transaction>, UnitOfWorkError> {
        Ok(Box::new(self.begin_transaction(ctx)?))
    }
}

/// Transaction over an [`InMemoryUnitOfWork`].
///
/// Dropping it without commit discards its writes and releases its row
/// locks.
pub struct InMemoryTransaction {
    scope: Arc<TransactionScope>,
    pull_requests: InMemoryPullRequestRepository,
    users: InMemoryUserRepository,
    teams: InMemoryTeamRepository,
}

#[async_trait]
impl Transaction for InMemoryTransaction {
    fn pull_requests(&self) -> &dyn PullRequestRepository {
        &self.pull_requests
    }

    fn users(&self) -> &dyn UserRepository {
        &self.users
    }

    fn teams(&self) -> &dyn TeamRepository {
        &self.teams
    }

    async fn commit(&mut self, ctx: &RequestContext) -> Result<(), UnitOfWorkError> {
        if self.scope.is_finished() {
            return Err(UnitOfWorkError::finished());
        }
        ctx.check()?;
        self.scope.publish().map_err(UnitOfWorkError::commit)?;
        self.scope.close();
        debug!(correlation_id = %ctx.correlation_id(), "in-memory transaction committed");
        Ok(())
    }

    async fn rollback(&mut self, ctx: &RequestContext) -> Result<(), UnitOfWorkError> {
        if !self.scope.is_finished() {
            self.scope.close();
            debug!(correlation_id = %ctx.correlation_id(), "in-memory transaction rolled back");
        }
        Ok(())
    }
}
