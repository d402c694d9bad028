//! Domain ports and supporting types for the hexagonal boundary.
//!
//! Driven ports ([`UnitOfWork`] and the three transaction-scoped
//! repositories) are implemented by outbound adapters. Driving ports
//! ([`PullRequestCommand`], [`PullRequestQuery`]) are implemented by the
//! pull-request engine and called by inbound adapters.

mod macros;
pub(crate) use macros::define_port_error;

mod pull_request_command;
mod pull_request_query;
mod pull_request_repository;
mod team_repository;
mod unit_of_work;
mod user_repository;

pub use pull_request_command::{
    CreatePullRequestRequest, PullRequestCommand, ReassignReviewerRequest,
    ReassignReviewerResponse,
};
pub use pull_request_query::{ListPullRequestsByAssigneeRequest, PullRequestQuery};
#[cfg(test)]
pub use pull_request_repository::MockPullRequestRepository;
pub use pull_request_repository::{
    PullRequestRepository, PullRequestRepositoryError, ensure_not_author, ensure_reviewer_capacity,
};
#[cfg(test)]
pub use team_repository::MockTeamRepository;
pub use team_repository::{TeamRepository, TeamRepositoryError};
pub use unit_of_work::{Transaction, UnitOfWork, UnitOfWorkError};
#[cfg(test)]
pub use user_repository::MockUserRepository;
pub use user_repository::{UserRepository, UserRepositoryError};
