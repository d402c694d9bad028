//! In-memory user repository.

use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::ports::{UserRepository, UserRepositoryError};
use crate::domain::{TeamId, User, UserId};

use super::store::{FINISHED_MESSAGE, ScopeError, TransactionScope};

impl From<ScopeError> for UserRepositoryError {
    fn from(value: ScopeError) -> Self {
        match value {
            ScopeError::Cancelled => Self::cancelled(),
            ScopeError::Finished => Self::query(FINISHED_MESSAGE),
        }
    }
}

/// User repository bound to one in-memory transaction.
pub struct InMemoryUserRepository {
    scope: Arc<TransactionScope>,
}

impl InMemoryUserRepository {
    pub(super) fn new(scope: Arc<TransactionScope>) -> Self {
        Self { scope }
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn get_by_id(&self, id: &UserId) -> Result<User, UserRepositoryError> {
        self.scope.ensure_open()?;
        self.scope
            .state()
            .working
            .users
            .get(id)
            .cloned()
            .ok_or_else(|| UserRepositoryError::not_found(id.clone()))
    }

    async fn team_id_for_user(&self, id: &UserId) -> Result<TeamId, UserRepositoryError> {
        self.scope.ensure_open()?;
        let state = self.scope.state();
        if !state.working.users.contains_key(id) {
            return Err(UserRepositoryError::not_found(id.clone()));
        }
        state
            .working
            .memberships
            .get(id)
            .cloned()
            .ok_or_else(|| UserRepositoryError::no_team(id.clone()))
    }

    async fn list_active_member_ids(
        &self,
        team_id: &TeamId,
    ) -> Result<Vec<UserId>, UserRepositoryError> {
        self.scope.ensure_open()?;
        let state = self.scope.state();
        let working = &state.working;
        Ok(working
            .member_ids(team_id)
            .into_iter()
            .filter(|id| working.users.get(id).is_some_and(User::is_active))
            .collect())
    }

    async fn upsert(&self, user: &User) -> Result<(), UserRepositoryError> {
        self.scope.ensure_open()?;
        let mut state = self.scope.state();
        state.working.users.insert(user.id().clone(), user.clone());
        state.dirty.users.insert(user.id().clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::{Transaction, UnitOfWork};
    use crate::domain::{NewTeam, RequestContext, TeamName};
    use crate::outbound::memory::InMemoryUnitOfWork;
    use rstest::rstest;

    fn user(id: &str, is_active: bool) -> User {
        User::try_from_strings(id, format!("User {id}"), is_active).expect("valid user")
    }

    fn id(raw: &str) -> UserId {
        UserId::new(raw).expect("valid id")
    }

    async fn seeded() -> (InMemoryUnitOfWork, Box<dyn Transaction>, TeamId) {
        let uow = InMemoryUnitOfWork::new();
        let tx = uow.begin(&RequestContext::new()).await.expect("begin");
        let team_id = TeamId::new("core").expect("valid id");
        tx.teams()
            .create(&NewTeam {
                id: team_id.clone(),
                name: TeamName::new("Core").expect("valid name"),
            })
            .await
            .expect("team created");
        for (raw, active) in [("u3", true), ("u1", true), ("u2", false)] {
            tx.users().upsert(&user(raw, active)).await.expect("upsert");
            tx.teams()
                .assign_member(&team_id, &id(raw))
                .await
                .expect("member assigned");
        }
        tx.users().upsert(&user("loner", true)).await.expect("upsert");
        (uow, tx, team_id)
    }

    #[rstest]
    #[tokio::test]
    async fn active_members_are_sorted_and_filtered() {
        let (_uow, tx, team_id) = seeded().await;
        let members = tx
            .users()
            .list_active_member_ids(&team_id)
            .await
            .expect("members listed");
        assert_eq!(members, vec![id("u1"), id("u3")]);
    }

    #[rstest]
    #[tokio::test]
    async fn unknown_team_has_no_members() {
        let (_uow, tx, _) = seeded().await;
        let unknown = TeamId::new("ghost").expect("valid id");
        let members = tx
            .users()
            .list_active_member_ids(&unknown)
            .await
            .expect("members listed");
        assert!(members.is_empty());
    }

    #[rstest]
    #[case("loner", UserRepositoryError::no_team(id("loner")))]
    #[case("ghost", UserRepositoryError::not_found(id("ghost")))]
    #[tokio::test]
    async fn team_lookup_reports_missing_links(
        #[case] raw: &str,
        #[case] expected: UserRepositoryError,
    ) {
        let (_uow, tx, _) = seeded().await;
        assert_eq!(tx.users().team_id_for_user(&id(raw)).await, Err(expected));
    }

    #[rstest]
    #[tokio::test]
    async fn upsert_replaces_existing_user() {
        let (_uow, tx, team_id) = seeded().await;
        tx.users()
            .upsert(&user("u3", false))
            .await
            .expect("upsert");
        let members = tx
            .users()
            .list_active_member_ids(&team_id)
            .await
            .expect("members listed");
        assert_eq!(members, vec![id("u1")]);
    }
}
