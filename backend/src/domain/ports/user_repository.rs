//! Port abstraction for user lookups used by reviewer assignment.
use async_trait::async_trait;

use crate::domain::{TeamId, User, UserId};

use super::define_port_error;

define_port_error! {
    /// Persistence errors raised by user repository adapters.
    pub enum UserRepositoryError {
        /// Repository connection could not be established.
        Connection { message: String } => "user repository connection failed: {message}",
        /// Query or mutation failed during execution.
        Query { message: String } => "user repository query failed: {message}",
        /// The user does not exist.
        NotFound { user_id: UserId } => "user {user_id} not found",
        /// The user exists but belongs to no team.
        NoTeam { user_id: UserId } => "user {user_id} is not a member of any team",
        /// The request was cancelled while the call was in flight.
        Cancelled => "user repository call cancelled",
    }
}

/// Transaction-scoped user storage.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Fetch a user; fails with `NotFound` if absent.
    async fn get_by_id(&self, id: &UserId) -> Result<User, UserRepositoryError>;

    /// Team the user currently belongs to; fails with `NoTeam` if none.
    async fn team_id_for_user(&self, id: &UserId) -> Result<TeamId, UserRepositoryError>;

    /// Ids of active members of `team_id`, ordered by user id.
    ///
    /// An unknown team yields an empty list.
    async fn list_active_member_ids(
        &self,
        team_id: &TeamId,
    ) -> Result<Vec<UserId>, UserRepositoryError>;

    /// Insert or update a user record.
    async fn upsert(&self, user: &User) -> Result<(), UserRepositoryError>;
}
