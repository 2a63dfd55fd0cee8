//! Test fixture creation for the user database

use super::constants::*;
use anyhow::Result;
use songlens_server::user::{NewUser, SqliteUserStore, UserManager, UserRole};
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

/// Creates a temporary db dir with a user database holding two regular
/// users and one admin.
/// Returns (temp_dir, user_db_path)
pub fn create_test_db_with_users() -> Result<(TempDir, PathBuf)> {
    let dir = TempDir::new()?;
    let db_path = dir.path().join("user.db");

    let user_manager = UserManager::new(Arc::new(SqliteUserStore::new(&db_path)?));
    for (email, password, first_name, role) in [
        (TEST_USER, TEST_PASS, "Test", UserRole::Regular),
        (OTHER_USER, OTHER_PASS, "Other", UserRole::Regular),
        (ADMIN_USER, ADMIN_PASS, "Admin", UserRole::Admin),
    ] {
        user_manager.register_user(
            NewUser {
                email: email.to_string(),
                first_name: first_name.to_string(),
                last_name: "User".to_string(),
            },
            password,
            role,
        )?;
    }

    Ok((dir, db_path))
}
