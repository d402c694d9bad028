//! In-memory team repository.

use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::ports::{TeamRepository, TeamRepositoryError};
use crate::domain::{NewTeam, Team, TeamId, TeamName, UserId};

use super::store::{FINISHED_MESSAGE, ScopeError, StoreData, TransactionScope};

impl From<ScopeError> for TeamRepositoryError {
    fn from(value: ScopeError) -> Self {
        match value {
            ScopeError::Cancelled => Self::cancelled(),
            ScopeError::Finished => Self::query(FINISHED_MESSAGE),
        }
    }
}

/// Team repository bound to one in-memory transaction.
pub struct InMemoryTeamRepository {
    scope: Arc<TransactionScope>,
}

impl InMemoryTeamRepository {
    pub(super) fn new(scope: Arc<TransactionScope>) -> Self {
        Self { scope }
    }
}

fn team_from(data: &StoreData, id: &TeamId, name: &TeamName) -> Team {
    Team {
        id: id.clone(),
        name: name.clone(),
        member_ids: data.member_ids(id),
    }
}

#[async_trait]
impl TeamRepository for InMemoryTeamRepository {
    async fn get_by_id(&self, id: &TeamId) -> Result<Team, TeamRepositoryError> {
        self.scope.ensure_open()?;
        let state = self.scope.state();
        let name = state
            .working
            .teams
            .get(id)
            .ok_or_else(|| TeamRepositoryError::not_found(id.as_str()))?;
        Ok(team_from(&state.working, id, name))
    }

    async fn get_by_name(&self, name: &TeamName) -> Result<Team, TeamRepositoryError> {
        self.scope.ensure_open()?;
        let state = self.scope.state();
        state
            .working
            .teams
            .iter()
            .find(|(_, existing)| *existing == name)
            .map(|(id, existing)| team_from(&state.working, id, existing))
            .ok_or_else(|| TeamRepositoryError::not_found(name.as_ref()))
    }

    async fn create(&self, team: &NewTeam) -> Result<Team, TeamRepositoryError> {
        self.scope.ensure_open()?;
        let mut state = self.scope.state();
        if state.working.teams.contains_key(&team.id) {
            return Err(TeamRepositoryError::already_exists(team.id.as_str()));
        }
        if state.working.teams.values().any(|name| *name == team.name) {
            return Err(TeamRepositoryError::already_exists(team.name.as_ref()));
        }

        state
            .working
            .teams
            .insert(team.id.clone(), team.name.clone());
        state.dirty.teams.insert(team.id.clone());
        state.dirty.created_teams.insert(team.id.clone());
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
        self.scope.ensure_open()?;
        let mut state = self.scope.state();
        if !state.working.teams.contains_key(team_id) {
            return Err(TeamRepositoryError::not_found(team_id.as_str()));
        }
        if !state.working.users.contains_key(user_id) {
            return Err(TeamRepositoryError::user_not_found(user_id.clone()));
        }

        state
            .working
            .memberships
            .insert(user_id.clone(), team_id.clone());
        state.dirty.memberships.insert(user_id.clone());
        Ok(())
    }

    async fn list_member_ids(&self, team_id: &TeamId) -> Result<Vec<UserId>, TeamRepositoryError> {
        self.scope.ensure_open()?;
        let state = self.scope.state();
        if !state.working.teams.contains_key(team_id) {
            return Err(TeamRepositoryError::not_found(team_id.as_str()));
        }
        Ok(state.working.member_ids(team_id))
    }
}
