use crate::{error::forbidden, jwt::SessionData, schema::UserRole};

const ACTION_TABLE: &[(UserRole, &[ActionType])] = &[
    (
        UserRole::User,
        &[
            ActionType::CreateRecipes,
            ActionType::ManageOwnRecipes,
            ActionType::ManageOwnMarkers,
            ActionType::ManageOwnSubscriptions,
        ],
    ),
    (
        UserRole::Admin,
        &[
            ActionType::CreateRecipes,
            ActionType::ManageOwnRecipes,
            ActionType::ManageOwnMarkers,
            ActionType::ManageOwnSubscriptions,
            ActionType::ManageAllRecipes,
        ],
    ),
];

#[derive(Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub enum ActionType {
    CreateRecipes,

    ManageOwnRecipes,
    ManageOwnMarkers,
    ManageOwnSubscriptions,

    ManageAllRecipes,
}

impl ActionType {
    pub fn authenticate(self, session: &SessionData) -> bool {
        ACTION_TABLE
            .iter()
            .find(|(role, _)| role == &session.role)
            .map(|(_, actions)| actions.contains(&self))
            .unwrap_or(false)
    }
}

/// Recipes may be changed by their author or by anyone allowed to manage all recipes.
pub fn ensure_can_manage_recipe(
    author_id: i32,
    session: &SessionData,
) -> Result<(), potion::Error> {
    if ActionType::ManageAllRecipes.authenticate(session) {
        return Ok(());
    }
    if ActionType::ManageOwnRecipes.authenticate(session) && author_id == session.user_id {
        return Ok(());
    }

    Err(forbidden(
        "You do not have permission to perform this action",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(user_id: i32, role: UserRole) -> SessionData {
        SessionData {
            user_id,
            username: format!("user{user_id}"),
            role,
        }
    }

    #[test]
    fn users_manage_only_their_own_recipes() {
        let user = session(1, UserRole::User);
        assert!(ensure_can_manage_recipe(1, &user).is_ok());

        let denied = ensure_can_manage_recipe(2, &user).err().map(|e| e.code == 403);
        assert_eq!(denied, Some(true));
    }

    #[test]
    fn admins_manage_every_recipe() {
        let admin = session(9, UserRole::Admin);
        assert!(ensure_can_manage_recipe(1, &admin).is_ok());
        assert!(ActionType::ManageAllRecipes.authenticate(&admin));
        assert!(!ActionType::ManageAllRecipes.authenticate(&session(1, UserRole::User)));
    }

    #[test]
    fn every_role_may_keep_markers_and_subscriptions() {
        for role in [UserRole::User, UserRole::Admin] {
            let session = session(1, role);
            assert!(ActionType::ManageOwnMarkers.authenticate(&session));
            assert!(ActionType::ManageOwnSubscriptions.authenticate(&session));
            assert!(ActionType::CreateRecipes.authenticate(&session));
        }
    }
}
