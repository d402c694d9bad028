//! Port for team storage and membership.
//!
//! A user belongs to at most one team. Membership is a relation of its own,
//! so moving a user between teams is a single `assign_member` call.

use async_trait::async_trait;

use crate::domain::{NewTeam, Team, TeamId, TeamName, UserId};

use super::define_port_error;

define_port_error! {
    /// Errors raised by team repository adapters.
    pub enum TeamRepositoryError {
        /// Repository connection could not be established.
        Connection { message: String } => "team repository connection failed: {message}",
        /// Query or mutation failed during execution.
        Query { message: String } => "team repository query failed: {message}",
        /// No team matches the given id or name.
        NotFound { team: String } => "team {team} not found",
        /// A team with the same id or name already exists.
        AlreadyExists { team: String } => "team {team} already exists",
        /// The user to add does not exist.
        UserNotFound { user_id: UserId } => "user {user_id} not found",
        /// The request was cancelled while the call was in flight.
        Cancelled => "team repository call cancelled",
    }
}

/// Transaction-scoped team storage.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TeamRepository: Send + Sync {
    /// Fetch a team and its member ids.
    async fn get_by_id(&self, id: &TeamId) -> Result<Team, TeamRepositoryError>;

    /// Fetch a team by its unique name.
    async fn get_by_name(&self, name: &TeamName) -> Result<Team, TeamRepositoryError>;

    /// Create an empty team; fails with `AlreadyExists` on id or name clash.
    async fn create(&self, team: &NewTeam) -> Result<Team, TeamRepositoryError>;

    /// Make `user_id` a member of `team_id`, leaving any previous team.
    async fn assign_member(
        &self,
        team_id: &TeamId,
        user_id: &UserId,
    ) -> Result<(), TeamRepositoryError>;

    /// Member ids of `team_id`, ordered by user id.
    async fn list_member_ids(&self, team_id: &TeamId) -> Result<Vec<UserId>, TeamRepositoryError>;
}
