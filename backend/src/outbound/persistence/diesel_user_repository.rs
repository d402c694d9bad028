//! PostgreSQL-backed `UserRepository` implementation using Diesel ORM.

use std::sync::Arc;

use async_trait::async_trait;
use diesel::prelude::*;
use diesel::upsert::excluded;
use diesel_async::RunQueryDsl;

use crate::domain::ports::{UserRepository, UserRepositoryError};
use crate::domain::{TeamId, User, UserId};

use super::diesel_helpers::map_basic_diesel_error;
use super::diesel_unit_of_work::{FINISHED_MESSAGE, ScopeError, TransactionScope};
use super::models::{NewUserRow, UserRow};
use super::schema::{team_members, users};

impl From<ScopeError> for UserRepositoryError {
    fn from(value: ScopeError) -> Self {
        match value {
            ScopeError::Cancelled => Self::cancelled(),
            ScopeError::Finished => Self::query(FINISHED_MESSAGE),
        }
    }
}

fn map_diesel_error(error: diesel::result::Error) -> UserRepositoryError {
    map_basic_diesel_error(
        error,
        UserRepositoryError::query,
        UserRepositoryError::connection,
    )
}

fn parse_user_id(raw: &str) -> Result<UserId, UserRepositoryError> {
    UserId::new(raw).map_err(|err| UserRepositoryError::query(format!("stored user id: {err}")))
}

fn row_to_user(row: UserRow) -> Result<User, UserRepositoryError> {
    User::try_from_strings(&row.id, row.name, row.is_active)
        .map_err(|err| UserRepositoryError::query(format!("stored user {}: {err}", row.id)))
}

/// User repository bound to one database transaction.
pub struct DieselUserRepository {
    scope: Arc<TransactionScope>,
}

impl DieselUserRepository {
    pub(super) fn new(scope: Arc<TransactionScope>) -> Self {
        Self { scope }
    }
}

#[async_trait]
impl UserRepository for DieselUserRepository {
    async fn get_by_id(&self, id: &UserId) -> Result<User, UserRepositoryError> {
        let mut conn = self.scope.connection().await?;
        let row = self
            .scope
            .guard(Box::pin(
                users::table
                    .find(id.as_str())
                    .select(UserRow::as_select())
                    .first(&mut *conn),
            ))
            .await?
            .optional()
            .map_err(map_diesel_error)?
            .ok_or_else(|| UserRepositoryError::not_found(id.clone()))?;
        row_to_user(row)
    }

    async fn team_id_for_user(&self, id: &UserId) -> Result<TeamId, UserRepositoryError> {
        let mut conn = self.scope.connection().await?;
        let membership: Option<Option<String>> = self
            .scope
            .guard(Box::pin(
                users::table
                    .left_join(team_members::table)
                    .filter(users::id.eq(id.as_str()))
                    .select(team_members::team_id.nullable())
                    .first(&mut *conn),
            ))
            .await?
            .optional()
            .map_err(map_diesel_error)?;

        match membership {
            None => Err(UserRepositoryError::not_found(id.clone())),
            Some(None) => Err(UserRepositoryError::no_team(id.clone())),
            Some(Some(team_id)) => TeamId::new(&team_id)
                .map_err(|err| UserRepositoryError::query(format!("stored team id: {err}"))),
        }
    }

    async fn list_active_member_ids(
        &self,
        team_id: &TeamId,
    ) -> Result<Vec<UserId>, UserRepositoryError> {
        let mut conn = self.scope.connection().await?;
        let ids: Vec<String> = self
            .scope
            .guard(Box::pin(
                team_members::table
                    .inner_join(users::table)
                    .filter(team_members::team_id.eq(team_id.as_str()))
                    .filter(users::is_active.eq(true))
                    .select(users::id)
                    .order(users::id.asc())
                    .load(&mut *conn),
            ))
            .await?
            .map_err(map_diesel_error)?;
        ids.iter().map(|raw| parse_user_id(raw)).collect()
    }

    async fn upsert(&self, user: &User) -> Result<(), UserRepositoryError> {
        let row = NewUserRow {
            id: user.id().as_str(),
            name: user.name().as_ref(),
            is_active: user.is_active(),
        };
        let now = self.scope.now();
        let mut conn = self.scope.connection().await?;
        self.scope
            .guard(Box::pin(
                diesel::insert_into(users::table)
                    .values(&row)
                    .on_conflict(users::id)
                    .do_update()
                    .set((
                        users::name.eq(excluded(users::name)),
                        users::is_active.eq(excluded(users::is_active)),
                        users::updated_at.eq(now),
                    ))
                    .execute(&mut *conn),
            ))
            .await?
            .map_err(map_diesel_error)?;
        Ok(())
    }
}
