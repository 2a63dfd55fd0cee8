use super::{
    permissions::{Permission, UserRole},
    user_models::{NewUser, User, UserFilter, UserUpdate},
    AuthToken, AuthTokenValue, UserAuthCredentials, UserAuthCredentialsStore, UserAuthTokenStore,
    UserStore, UsernamePasswordCredentials,
};
use anyhow::{bail, Context, Result};
use std::{sync::Arc, time::SystemTime};
use tracing::{debug, info};

/// Result of a login attempt that did not hit an infrastructure error.
#[derive(Debug)]
pub enum LoginOutcome {
    LoggedIn(AuthToken),
    InvalidCredentials,
    Inactive,
}

pub struct UserManager {
    user_store: Arc<dyn UserStore>,
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

impl UserManager {
    pub fn new(user_store: Arc<dyn UserStore>) -> Self {
        Self { user_store }
    }

    /// Creates a user with password credentials and the given role.
    pub fn register_user(
        &self,
        new_user: NewUser,
        password: &str,
        role: UserRole,
    ) -> Result<usize> {
        let email = normalize_email(&new_user.email);
        if email.is_empty() {
            bail!("The email cannot be empty.");
        }
        if !email.contains('@') {
            bail!("Enter a valid email address.");
        }
        if password.is_empty() {
            bail!("The password cannot be empty.");
        }
        if self.user_store.get_user_id(&email)?.is_some() {
            bail!("A user with this email already exists.");
        }

        let user_id = self.user_store.create_user(&NewUser {
            email,
            first_name: new_user.first_name.trim().to_string(),
            last_name: new_user.last_name.trim().to_string(),
        })?;
        self.user_store.update_user_auth_credentials(UserAuthCredentials {
            user_id,
            username_password: Some(UsernamePasswordCredentials::from_plain(user_id, password)?),
        })?;
        self.user_store.add_user_role(user_id, role)?;
        info!("Registered user {} with role {}", user_id, role.as_str());
        Ok(user_id)
    }

    pub fn login(&self, email: &str, password: &str) -> Result<LoginOutcome> {
        let email = normalize_email(email);
        let Some(credentials) = self.user_store.get_user_auth_credentials(&email)? else {
            debug!("login: no user with email {}", email);
            return Ok(LoginOutcome::InvalidCredentials);
        };
        let Some(password_credentials) = credentials.username_password else {
            debug!("login: user {} has no password", credentials.user_id);
            return Ok(LoginOutcome::InvalidCredentials);
        };
        if !password_credentials.verify(password)? {
            return Ok(LoginOutcome::InvalidCredentials);
        }

        let user = self
            .user_store
            .get_user(credentials.user_id)?
            .with_context(|| format!("User {} vanished during login", credentials.user_id))?;
        if !user.is_active {
            return Ok(LoginOutcome::Inactive);
        }

        Ok(LoginOutcome::LoggedIn(
            self.generate_auth_token(credentials.user_id)?,
        ))
    }

    pub fn generate_auth_token(&self, user_id: usize) -> Result<AuthToken> {
        let token = AuthToken {
            user_id,
            value: AuthTokenValue::generate(),
            created: SystemTime::now(),
            last_used: None,
        };
        self.user_store.add_user_auth_token(token.clone())?;
        Ok(token)
    }

    pub fn get_auth_token(&self, value: &AuthTokenValue) -> Result<Option<AuthToken>> {
        self.user_store.get_user_auth_token(value)
    }

    pub fn update_auth_token_last_used(&self, value: &AuthTokenValue) -> Result<()> {
        self.user_store
            .update_user_auth_token_last_used_timestamp(value)
    }

    pub fn delete_auth_token(&self, user_id: usize, token_value: &AuthTokenValue) -> Result<()> {
        match self.user_store.delete_user_auth_token(token_value)? {
            Some(removed) if removed.user_id == user_id => Ok(()),
            Some(removed) => {
                self.user_store.add_user_auth_token(removed.clone())?;
                bail!(
                    "Tried to delete auth token of user {}, but the authenticated user was {}.",
                    removed.user_id,
                    user_id
                )
            }
            None => bail!("Did not find auth token {}", token_value.0),
        }
    }

    pub fn get_user_tokens(&self, user_id: usize) -> Result<Vec<AuthToken>> {
        self.user_store.get_all_user_auth_tokens(user_id)
    }

    pub fn get_user(&self, user_id: usize) -> Result<Option<User>> {
        self.user_store.get_user(user_id)
    }

    pub fn get_user_id(&self, email: &str) -> Result<Option<usize>> {
        self.user_store.get_user_id(&normalize_email(email))
    }

    pub fn list_users(&self, filter: &UserFilter) -> Result<Vec<User>> {
        self.user_store.list_users(filter)
    }

    pub fn update_user(&self, user_id: usize, update: &UserUpdate) -> Result<bool> {
        let update = UserUpdate {
            first_name: update.first_name.as_ref().map(|s| s.trim().to_string()),
            last_name: update.last_name.as_ref().map(|s| s.trim().to_string()),
            is_active: update.is_active,
        };
        self.user_store.update_user(user_id, &update)
    }

    pub fn delete_user(&self, user_id: usize) -> Result<bool> {
        self.user_store.delete_user(user_id)
    }

    /// Sets (or replaces) the password of an existing user.
    pub fn set_password(&self, user_id: usize, password: &str) -> Result<()> {
        if password.is_empty() {
            bail!("The password cannot be empty.");
        }
        if self.user_store.get_user(user_id)?.is_none() {
            bail!("User {} not found.", user_id);
        }
        self.user_store.update_user_auth_credentials(UserAuthCredentials {
            user_id,
            username_password: Some(UsernamePasswordCredentials::from_plain(user_id, password)?),
        })
    }

    pub fn get_user_permissions(&self, user_id: usize) -> Result<Vec<Permission>> {
        self.user_store.resolve_user_permissions(user_id)
    }

    pub fn get_user_roles(&self, user_id: usize) -> Result<Vec<UserRole>> {
        self.user_store.get_user_roles(user_id)
    }

    pub fn add_user_role(&self, user_id: usize, role: UserRole) -> Result<()> {
        self.user_store.add_user_role(user_id, role)
    }

    pub fn remove_user_role(&self, user_id: usize, role: UserRole) -> Result<()> {
        self.user_store.remove_user_role(user_id, role)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::user::SqliteUserStore;
    use tempfile::TempDir;

    fn create_manager() -> (UserManager, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let store = SqliteUserStore::new(temp_dir.path().join("user.db")).unwrap();
        (UserManager::new(Arc::new(store)), temp_dir)
    }

    fn new_user(email: &str) -> NewUser {
        NewUser {
            email: email.to_string(),
            first_name: " Jane ".to_string(),
            last_name: "Doe".to_string(),
        }
    }

    #[test]
    fn registers_user_with_normalized_email() {
        let (manager, _dir) = create_manager();
        let user_id = manager
            .register_user(new_user("  Jane@Test.COM"), "pw", UserRole::Regular)
            .unwrap();

        let user = manager.get_user(user_id).unwrap().unwrap();
        assert_eq!(user.email, "jane@test.com");
        assert_eq!(user.first_name, "Jane");
        assert_eq!(
            manager.get_user_roles(user_id).unwrap(),
            vec![UserRole::Regular]
        );
        assert_eq!(manager.get_user_id("JANE@test.com").unwrap(), Some(user_id));

        assert!(manager
            .register_user(new_user("jane@test.com"), "pw", UserRole::Regular)
            .is_err());
        assert!(manager
            .register_user(new_user("not-an-email"), "pw", UserRole::Regular)
            .is_err());
        assert!(manager
            .register_user(new_user("x@test.com"), "", UserRole::Regular)
            .is_err());
    }

    #[test]
    fn login_checks_password_and_active_flag() {
        let (manager, _dir) = create_manager();
        let user_id = manager
            .register_user(new_user("jane@test.com"), "pw", UserRole::Regular)
            .unwrap();

        assert!(matches!(
            manager.login("jane@test.com", "wrong").unwrap(),
            LoginOutcome::InvalidCredentials
        ));
        assert!(matches!(
            manager.login("nobody@test.com", "pw").unwrap(),
            LoginOutcome::InvalidCredentials
        ));

        let token = match manager.login("Jane@test.com", "pw").unwrap() {
            LoginOutcome::LoggedIn(token) => token,
            other => panic!("Unexpected outcome {:?}", other),
        };
        assert_eq!(token.user_id, user_id);
        assert!(manager.get_auth_token(&token.value).unwrap().is_some());

        manager
            .update_user(
                user_id,
                &UserUpdate {
                    is_active: Some(false),
                    ..Default::default()
                },
            )
            .unwrap();
        assert!(matches!(
            manager.login("jane@test.com", "pw").unwrap(),
            LoginOutcome::Inactive
        ));
    }

    #[test]
    fn only_owner_can_delete_token() {
        let (manager, _dir) = create_manager();
        let jane = manager
            .register_user(new_user("jane@test.com"), "pw", UserRole::Regular)
            .unwrap();
        let john = manager
            .register_user(new_user("john@test.com"), "pw", UserRole::Regular)
            .unwrap();
        let token = manager.generate_auth_token(jane).unwrap();

        assert!(manager.delete_auth_token(john, &token.value).is_err());
        assert!(manager.get_auth_token(&token.value).unwrap().is_some());

        manager.delete_auth_token(jane, &token.value).unwrap();
        assert!(manager.get_auth_token(&token.value).unwrap().is_none());
    }

    #[test]
    fn set_password_replaces_credentials() {
        let (manager, _dir) = create_manager();
        let user_id = manager
            .register_user(new_user("jane@test.com"), "old", UserRole::Regular)
            .unwrap();

        manager.set_password(user_id, "new").unwrap();
        assert!(matches!(
            manager.login("jane@test.com", "old").unwrap(),
            LoginOutcome::InvalidCredentials
        ));
        assert!(matches!(
            manager.login("jane@test.com", "new").unwrap(),
            LoginOutcome::LoggedIn(_)
        ));
        assert!(manager.set_password(999, "new").is_err());
    }
}
