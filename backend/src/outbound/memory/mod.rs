//! In-memory adapter for the unit of work and repository ports.
//!
//! Committed state lives behind one mutex. Each transaction works on a
//! private copy taken at `begin` and records which rows it touched; commit
//! writes those rows back. Pull request rows have their own async locks,
//! held from first lock or write until the transaction ends, mirroring
//! `SELECT ... FOR UPDATE` in the PostgreSQL adapter.
//!
//! Used by tests and by deployments configured without a database URL.

mod pull_request_repository;
mod store;
mod team_repository;
mod unit_of_work;
mod user_repository;

pub use pull_request_repository::InMemoryPullRequestRepository;
pub use team_repository::InMemoryTeamRepository;
pub use unit_of_work::{InMemoryTransaction, InMemoryUnitOfWork};
pub use user_repository::InMemoryUserRepository;
