//! PostgreSQL-backed `TeamRepository` implementation using Diesel ORM.

use std::sync::Arc;

use async_trait::async_trait;
use diesel::prelude::*;
use diesel::upsert::excluded;
use diesel_async::{AsyncPgConnection, RunQueryDsl};

use crate::domain::ports::{TeamRepository, TeamRepositoryError};
use crate::domain::{NewTeam, Team, TeamId, TeamName, UserId};

use super::diesel_helpers::{ConstraintViolation, map_basic_diesel_error};
use super::diesel_unit_of_work::{FINISHED_MESSAGE, ScopeError, TransactionScope};
use super::models::{NewTeamMemberRow, NewTeamRow, TeamRow};
use super::schema::{team_members, teams};

const TEAM_FK: &str = "team_members_team_id_fkey";
const USER_FK: &str = "team_members_user_id_fkey";

impl From<ScopeError> for TeamRepositoryError {
    fn from(value: ScopeError) -> Self {
        match value {
            ScopeError::Cancelled => Self::cancelled(),
            ScopeError::Finished => Self::query(FINISHED_MESSAGE),
        }
    }
}

fn map_diesel_error(error: diesel::result::Error) -> TeamRepositoryError {
    map_basic_diesel_error(
        error,
        TeamRepositoryError::query,
        TeamRepositoryError::connection,
    )
}

/// Classify a failed membership write.
fn map_assign_error(
    error: diesel::result::Error,
    team_id: &TeamId,
    user_id: &UserId,
) -> TeamRepositoryError {
    match ConstraintViolation::of(&error) {
        Some(violation) if violation.is(TEAM_FK) => {
            TeamRepositoryError::not_found(team_id.as_str())
        }
        Some(violation) if violation.is(USER_FK) => {
            TeamRepositoryError::user_not_found(user_id.clone())
        }
        _ => map_diesel_error(error),
    }
}

fn row_to_team(row: TeamRow, member_ids: Vec<UserId>) -> Result<Team, TeamRepositoryError> {
    let id = TeamId::new(&row.id)
        .map_err(|err| TeamRepositoryError::query(format!("stored team id: {err}")))?;
    let name = TeamName::new(row.name)
        .map_err(|err| TeamRepositoryError::query(format!("stored team {id}: {err}")))?;
    Ok(Team {
        id,
        name,
        member_ids,
    })
}

/// Team repository bound to one database transaction.
pub struct DieselTeamRepository {
    scope: Arc<TransactionScope>,
}

impl DieselTeamRepository {
    pub(super) fn new(scope: Arc<TransactionScope>) -> Self {
        Self { scope }
    }

    async fn member_ids(
        &self,
        conn: &mut AsyncPgConnection,
        team_id: &str,
    ) -> Result<Vec<UserId>, TeamRepositoryError> {
        let ids: Vec<String> = self
            .scope
            .guard(Box::pin(
                team_members::table
                    .filter(team_members::team_id.eq(team_id))
                    .select(team_members::user_id)
                    .order(team_members::user_id.asc())
                    .load(conn),
            ))
            .await?
            .map_err(map_diesel_error)?;
        ids.iter()
            .map(|raw| {
                UserId::new(raw)
                    .map_err(|err| TeamRepositoryError::query(format!("stored user id: {err}")))
            })
            .collect()
    }

    async fn with_members(
        &self,
        conn: &mut AsyncPgConnection,
        row: TeamRow,
    ) -> Result<Team, TeamRepositoryError> {
        let member_ids = self.member_ids(conn, &row.id).await?;
        row_to_team(row, member_ids)
    }
}

#[async_trait]
impl TeamRepository for DieselTeamRepository {
    async fn get_by_id(&self, id: &TeamId) -> Result<Team, TeamRepositoryError> {
        let mut conn = self.scope.connection().await?;
        let row = self
            .scope
            .guard(Box::pin(
                teams::table
                    .find(id.as_str())
                    .select(TeamRow::as_select())
                    .first(&mut *conn),
            ))
            .await?
            .optional()
            .map_err(map_diesel_error)?
            .ok_or_else(|| TeamRepositoryError::not_found(id.as_str()))?;
        self.with_members(&mut *conn, row).await
    }

    async fn get_by_name(&self, name: &TeamName) -> Result<Team, TeamRepositoryError> {
        let mut conn = self.scope.connection().await?;
        let row = self
            .scope
            .guard(Box::pin(
                teams::table
                    .filter(teams::name.eq(name.as_ref()))
                    .select(TeamRow::as_select())
                    .first(&mut *conn),
            ))
            .await?
            .optional()
            .map_err(map_diesel_error)?
            .ok_or_else(|| TeamRepositoryError::not_found(name.as_ref()))?;
        self.with_members(&mut *conn, row).await
    }

    async fn create(&self, team: &NewTeam) -> Result<Team, TeamRepositoryError> {
        let row = NewTeamRow {
            id: team.id.as_str(),
            name: team.name.as_ref(),
        };
        let mut conn = self.scope.connection().await?;
        let inserted = self
            .scope
            .guard(Box::pin(
                diesel::insert_into(teams::table)
                    .values(&row)
                    .on_conflict_do_nothing()
                    .execute(&mut *conn),
            ))
            .await?
            .map_err(map_diesel_error)?;

        if inserted == 0 {
            let id_taken: bool = self
                .scope
                .guard(Box::pin(
                    diesel::select(diesel::dsl::exists(
                        teams::table.filter(teams::id.eq(team.id.as_str())),
                    ))
                    .get_result(&mut *conn),
                ))
                .await?
                .map_err(map_diesel_error)?;
            let clash = if id_taken {
                team.id.as_str()
            } else {
                team.name.as_ref()
            };
            return Err(TeamRepositoryError::already_exists(clash));
        }

        Ok(Team {
            id: team.id.clone(),
            name: team.name.clone(),
            member_ids: Vec::new(),
        })
    }

    async fn assign_member(
        &self,
        team_id: &TeamId,
        user_id: &UserId,
    ) -> Result<(), TeamRepositoryError> {
        let row = NewTeamMemberRow {
            user_id: user_id.as_str(),
            team_id: team_id.as_str(),
        };
        let now = self.scope.now();
        let mut conn = self.scope.connection().await?;
        self.scope
            .guard(Box::pin(
                diesel::insert_into(team_members::table)
                    .values(&row)
                    .on_conflict(team_members::user_id)
                    .do_update()
                    .set((
                        team_members::team_id.eq(excluded(team_members::team_id)),
                        team_members::joined_at.eq(now),
                    ))
                    .execute(&mut *conn),
            ))
            .await?
            .map_err(|err| map_assign_error(err, team_id, user_id))?;
        Ok(())
    }

    async fn list_member_ids(&self, team_id: &TeamId) -> Result<Vec<UserId>, TeamRepositoryError> {
        let mut conn = self.scope.connection().await?;
        let exists: bool = self
            .scope
            .guard(Box::pin(
                diesel::select(diesel::dsl::exists(
                    teams::table.filter(teams::id.eq(team_id.as_str())),
                ))
                .get_result(&mut *conn),
            ))
            .await?
            .map_err(map_diesel_error)?;
        if !exists {
            return Err(TeamRepositoryError::not_found(team_id.as_str()));
        }
        self.member_ids(&mut *conn, team_id.as_str()).await
    }
}
