//! PostgreSQL persistence adapters using Diesel ORM.
//!
//! This module provides the PostgreSQL unit of work and its transaction
//! scoped repositories, backed by `diesel-async` with `bb8` connection
//! pooling.
//!
//! # Architecture
//!
//! - **One connection per transaction**: `DieselUnitOfWork::begin` checks
//!   out an owned pooled connection and opens a database transaction on it.
//!   The three repositories of that transaction share the connection.
//! - **Thin adapters**: repositories translate between Diesel rows and
//!   domain types and enforce storage rules (row locks, reviewer cap,
//!   idempotent merge write). Business decisions stay in the engine.
//! - **Internal models**: Diesel row structs (`models.rs`) and schema
//!   definitions (`schema.rs`) never leave this module.
//! - **Strongly typed errors**: database failures map onto the port error
//!   enums; integrity violations are classified by constraint name.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use mockable::DefaultClock;
//! use backend::outbound::persistence::{DbPool, DieselUnitOfWork, PoolConfig, run_migrations};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let url = "postgres://review@localhost/review";
//! run_migrations(url)?;
//! let pool = DbPool::new(PoolConfig::new(url)).await?;
//! let uow = DieselUnitOfWork::new(pool, Arc::new(DefaultClock));
//! # let _ = uow;
//! # Ok(())
//! # }
//! ```

pub(crate) mod diesel_helpers;
mod diesel_pull_request_repository;
mod diesel_team_repository;
mod diesel_unit_of_work;
mod diesel_user_repository;
mod migrations;
mod models;
mod pool;
mod schema;

pub use diesel_pull_request_repository::DieselPullRequestRepository;
pub use diesel_team_repository::DieselTeamRepository;
pub use diesel_unit_of_work::{DieselTransaction, DieselUnitOfWork};
pub use diesel_user_repository::DieselUserRepository;
pub use migrations::{MigrationError, run_migrations};
pub use pool::{DbPool, OwnedConnection, PoolConfig, PoolError};
