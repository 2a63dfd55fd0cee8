use super::auth::{AuthToken, AuthTokenValue, UserAuthCredentials};
use super::permissions::{Permission, UserRole};
use super::user_models::{NewUser, User, UserFilter, UserUpdate};
use anyhow::Result;

pub trait UserAuthCredentialsStore: Send + Sync {
    /// Returns the user's authentication credentials given the user email.
    /// Returns Ok(None) if the user does not exist.
    /// Returns Err if there is a database error.
    fn get_user_auth_credentials(&self, email: &str) -> Result<Option<UserAuthCredentials>>;

    /// Replaces the user's authentication credentials.
    fn update_user_auth_credentials(&self, credentials: UserAuthCredentials) -> Result<()>;
}

pub trait UserAuthTokenStore: Send + Sync {
    /// Returns a user's authentication token given an AuthTokenValue.
    /// Returns Ok(None) if the token does not exist.
    fn get_user_auth_token(&self, token: &AuthTokenValue) -> Result<Option<AuthToken>>;

    /// Deletes an auth token given the token value, returning the deleted token.
    /// Returns Ok(None) if the token does not exist.
    fn delete_user_auth_token(&self, token: &AuthTokenValue) -> Result<Option<AuthToken>>;

    /// Updates an auth token with the latest timestamp.
    fn update_user_auth_token_last_used_timestamp(&self, token: &AuthTokenValue) -> Result<()>;

    fn add_user_auth_token(&self, token: AuthToken) -> Result<()>;

    /// Returns all the tokens of a user.
    fn get_all_user_auth_tokens(&self, user_id: usize) -> Result<Vec<AuthToken>>;
}

pub trait UserStore: UserAuthTokenStore + UserAuthCredentialsStore + Send + Sync {
    /// Creates a new user and returns the user id.
    fn create_user(&self, new_user: &NewUser) -> Result<usize>;

    /// Returns Ok(None) if the user does not exist.
    fn get_user(&self, user_id: usize) -> Result<Option<User>>;

    /// Returns the id of the user with the given email.
    /// Returns Ok(None) if the user does not exist.
    fn get_user_id(&self, email: &str) -> Result<Option<usize>>;

    /// Returns the users matching `filter`, newest first.
    fn list_users(&self, filter: &UserFilter) -> Result<Vec<User>>;

    /// Returns false if the user does not exist.
    fn update_user(&self, user_id: usize, update: &UserUpdate) -> Result<bool>;

    /// Deletes the user together with its credentials, tokens and roles.
    /// Returns false if the user does not exist.
    fn delete_user(&self, user_id: usize) -> Result<bool>;

    fn get_user_roles(&self, user_id: usize) -> Result<Vec<UserRole>>;

    fn add_user_role(&self, user_id: usize, role: UserRole) -> Result<()>;

    fn remove_user_role(&self, user_id: usize, role: UserRole) -> Result<()>;

    /// Resolves all permissions granted by the user's roles.
    fn resolve_user_permissions(&self, user_id: usize) -> Result<Vec<Permission>>;
}
