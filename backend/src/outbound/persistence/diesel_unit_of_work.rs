//! PostgreSQL unit of work built on a single pooled connection.
//!
//! Each transaction checks out one owned connection, issues `BEGIN` through
//! the connection's transaction manager and shares the connection with its
//! three repositories. Every statement runs under the request context, so a
//! cancelled request stops waiting on the database and the transaction is
//! rolled back by the engine or, failing that, discarded with the connection.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use diesel::result::QueryResult;
use diesel_async::{AnsiTransactionManager, AsyncPgConnection, TransactionManager};
use mockable::Clock;
use tokio::sync::{MappedMutexGuard, Mutex, MutexGuard};
use tracing::{debug, warn};

use crate::domain::ports::{
    PullRequestRepository, TeamRepository, Transaction, UnitOfWork, UnitOfWorkError,
    UserRepository,
};
use crate::domain::{ContextError, RequestContext};

use super::diesel_pull_request_repository::DieselPullRequestRepository;
use super::diesel_team_repository::DieselTeamRepository;
use super::diesel_user_repository::DieselUserRepository;
use super::pool::{DbPool, OwnedConnection};

/// Message reported by repositories used after their transaction ended.
pub(super) const FINISHED_MESSAGE: &str = "transaction already finished";

/// Why a statement could not be issued on the scope's connection.
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

/// Boxed statement future borrowing the transaction's connection.
pub(super) type QueryFuture<'a, T> = Pin<Box<dyn Future<Output = QueryResult<T>> + Send + 'a>>;

/// Connection and request context shared by one transaction's repositories.
pub(super) struct TransactionScope {
    conn: Mutex<Option<OwnedConnection>>,
    ctx: RequestContext,
    clock: Arc<dyn Clock>,
}

impl TransactionScope {
    /// Borrow the connection, waiting for any statement in flight.
    pub(super) async fn connection(
        &self,
    ) -> Result<MappedMutexGuard<'_, AsyncPgConnection>, ScopeError> {
        let guard = self.ctx.run(self.conn.lock()).await?;
        MutexGuard::try_map(guard, |slot| slot.as_deref_mut()).map_err(|_| ScopeError::Finished)
    }

    /// Run one statement under the request context.
    ///
    /// Statements arrive boxed so `async_trait` methods stay `Send` across
    /// the borrowed connection lifetime.
    pub(super) async fn guard<T>(
        &self,
        fut: QueryFuture<'_, T>,
    ) -> Result<QueryResult<T>, ScopeError> {
        Ok(self.ctx.run(fut).await?)
    }

    pub(super) fn now(&self) -> chrono::DateTime<chrono::Utc> {
        self.clock.utc()
    }
}

/// Unit of work over a PostgreSQL connection pool.
///
/// # Examples
/// ```rust,no_run
/// # use std::sync::Arc;
/// # use mockable::DefaultClock;
/// # use backend::outbound::persistence::{DbPool, DieselUnitOfWork, PoolConfig};
/// # async fn example() -> Result<(), backend::outbound::persistence::PoolError> {
/// let pool = DbPool::new(PoolConfig::new("postgres://review@localhost/review")).await?;
/// let uow = DieselUnitOfWork::new(pool, Arc::new(DefaultClock));
/// # let _ = uow;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct DieselUnitOfWork {
    pool: DbPool,
    clock: Arc<dyn Clock>,
}

impl DieselUnitOfWork {
    /// Create a unit of work stamping writes with `clock`.
    pub fn new(pool: DbPool, clock: Arc<dyn Clock>) -> Self {
        Self { pool, clock }
    }
}

#[async_trait]
impl UnitOfWork for DieselUnitOfWork {
    async fn begin(&self, ctx: &RequestContext) -> Result<Box<dyn Transaction>, UnitOfWorkError> {
        let mut conn = ctx
            .run(self.pool.get_owned())
            .await?
            .map_err(|err| UnitOfWorkError::begin(err.into_message()))?;

        ctx.run(AnsiTransactionManager::begin_transaction(&mut *conn))
            .await?
            .map_err(|err| UnitOfWorkError::begin(err.to_string()))?;
        debug!(correlation_id = %ctx.correlation_id(), "database transaction started");

        let scope = Arc::new(TransactionScope {
            conn: Mutex::new(Some(conn)),
            ctx: ctx.clone(),
            clock: Arc::clone(&self.clock),
        });
        Ok(Box::new(DieselTransaction {
            pull_requests: DieselPullRequestRepository::new(Arc::clone(&scope)),
            users: DieselUserRepository::new(Arc::clone(&scope)),
            teams: DieselTeamRepository::new(Arc::clone(&scope)),
            scope,
        }))
    }
}

/// Transaction over a [`DieselUnitOfWork`] connection.
///
/// Dropping it while open returns a connection with a live transaction to
/// the pool, which discards the connection and with it the pending writes.
pub struct DieselTransaction {
    scope: Arc<TransactionScope>,
    pull_requests: DieselPullRequestRepository,
    users: DieselUserRepository,
    teams: DieselTeamRepository,
}

#[async_trait]
impl Transaction for DieselTransaction {
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
        let mut slot = self.scope.conn.lock().await;
        let Some(conn) = slot.as_mut() else {
            return Err(UnitOfWorkError::finished());
        };
        ctx.check()?;

        let outcome = ctx
            .run(AnsiTransactionManager::commit_transaction(&mut **conn))
            .await;
        match outcome {
            Ok(Ok(())) => {
                slot.take();
                debug!(correlation_id = %ctx.correlation_id(), "database transaction committed");
                Ok(())
            }
            // The commit may or may not have reached the server; leave the
            // connection for rollback so it is either cleaned or discarded.
            Err(err) => Err(err.into()),
            Ok(Err(err)) => {
                // A failed COMMIT already ended the transaction server side.
                slot.take();
                Err(UnitOfWorkError::commit(err.to_string()))
            }
        }
    }

    async fn rollback(&mut self, ctx: &RequestContext) -> Result<(), UnitOfWorkError> {
        let Some(mut conn) = self.scope.conn.lock().await.take() else {
            return Ok(());
        };
        match AnsiTransactionManager::rollback_transaction(&mut *conn).await {
            Ok(()) => {
                debug!(correlation_id = %ctx.correlation_id(), "database transaction rolled back");
                Ok(())
            }
            Err(err) => {
                warn!(
                    correlation_id = %ctx.correlation_id(),
                    error = %err,
                    "database rollback failed; discarding connection"
                );
                Err(UnitOfWorkError::rollback(err.to_string()))
            }
        }
    }
}
