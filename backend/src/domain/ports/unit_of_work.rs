//! Port for transactional units of work.
//!
//! A [`UnitOfWork`] opens one atomic scope per business operation and hands
//! out a [`Transaction`]. Every repository borrowed from that transaction is
//! bound to the same underlying connection and to the [`RequestContext`]
//! passed to [`UnitOfWork::begin`].
//!
//! # Lifecycle
//!
//! - `commit` publishes all writes made through the transaction's
//!   repositories, atomically.
//! - `rollback` discards them. Calling it after `commit` or a previous
//!   `rollback` is a no-op success.
//! - Dropping a transaction that was never committed discards its writes.
//!   Prefer an explicit `rollback` so the outcome is observed and logged.
//!
//! A transaction is owned by the operation that began it and is never
//! shared between tasks. It is `Send + Sync` so the operation may hold a
//! borrow of it across await points.

use async_trait::async_trait;

use crate::domain::RequestContext;

use super::{PullRequestRepository, TeamRepository, UserRepository, define_port_error};

define_port_error! {
    /// Errors raised while opening or closing a transaction.
    pub enum UnitOfWorkError {
        /// The transaction could not be started.
        Begin { message: String } => "failed to begin transaction: {message}",
        /// The transaction could not be committed.
        Commit { message: String } => "failed to commit transaction: {message}",
        /// The transaction could not be rolled back.
        Rollback { message: String } => "failed to roll back transaction: {message}",
        /// Commit was requested on a transaction that already ended.
        Finished => "transaction already finished",
        /// The request was cancelled while the transaction was in flight.
        Cancelled => "transaction aborted by request cancellation",
    }
}

/// Factory for transactions.
#[async_trait]
pub trait UnitOfWork: Send + Sync {
    /// Start a new atomic scope bound to `ctx`.
    async fn begin(&self, ctx: &RequestContext) -> Result<Box<dyn Transaction>, UnitOfWorkError>;
}

/// An open transaction and its scoped repositories.
#[async_trait]
pub trait Transaction: Send + Sync {
    /// Pull request repository bound to this transaction.
    fn pull_requests(&self) -> &dyn PullRequestRepository;

    /// User repository bound to this transaction.
    fn users(&self) -> &dyn UserRepository;

    /// Team repository bound to this transaction.
    fn teams(&self) -> &dyn TeamRepository;

    /// Publish every write made through this transaction.
    ///
    /// Fails with [`UnitOfWorkError::Finished`] if the transaction already
    /// ended. After a failed commit the caller should still call
    /// [`Transaction::rollback`] to release the connection promptly.
    async fn commit(&mut self, ctx: &RequestContext) -> Result<(), UnitOfWorkError>;

    /// Discard every write made through this transaction.
    ///
    /// Always runs to completion, even when `ctx` is already cancelled.
    async fn rollback(&mut self, ctx: &RequestContext) -> Result<(), UnitOfWorkError>;
}
