use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Permission {
    AccessSongs,
    ViewAllSongs,
    ManageUsers,
}

impl Permission {
    pub fn as_int(self) -> i32 {
        match self {
            Permission::AccessSongs => 1,
            Permission::ViewAllSongs => 2,
            Permission::ManageUsers => 3,
        }
    }

    pub fn from_int(value: i32) -> Option<Self> {
        match value {
            1 => Some(Permission::AccessSongs),
            2 => Some(Permission::ViewAllSongs),
            3 => Some(Permission::ManageUsers),
            _ => None,
        }
    }
}

const ADMIN_PERMISSIONS: &[Permission] = &[
    Permission::AccessSongs,
    Permission::ViewAllSongs,
    Permission::ManageUsers,
];
const REGULAR_PERMISSIONS: &[Permission] = &[Permission::AccessSongs];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UserRole {
    Admin,
    Regular,
}

impl UserRole {
    pub fn permissions(&self) -> &'static [Permission] {
        match self {
            UserRole::Admin => ADMIN_PERMISSIONS,
            UserRole::Regular => REGULAR_PERMISSIONS,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            UserRole::Admin => "Admin",
            UserRole::Regular => "Regular",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "admin" => Some(UserRole::Admin),
            "regular" => Some(UserRole::Regular),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permission_roundtrip() {
        for permission in ADMIN_PERMISSIONS {
            assert_eq!(Permission::from_int(permission.as_int()), Some(*permission));
        }
        assert_eq!(Permission::from_int(0), None);
        assert_eq!(Permission::from_int(4), None);
    }

    #[test]
    fn regular_users_only_access_their_songs() {
        let perms = UserRole::Regular.permissions();
        assert_eq!(perms, &[Permission::AccessSongs]);
        assert!(!perms.contains(&Permission::ViewAllSongs));
    }

    #[test]
    fn admin_has_every_permission() {
        let perms = UserRole::Admin.permissions();
        assert!(perms.contains(&Permission::AccessSongs));
        assert!(perms.contains(&Permission::ViewAllSongs));
        assert!(perms.contains(&Permission::ManageUsers));
    }

    #[test]
    fn role_from_str_is_case_insensitive() {
        assert_eq!(UserRole::from_str("ADMIN"), Some(UserRole::Admin));
        assert_eq!(UserRole::from_str("regular"), Some(UserRole::Regular));
        assert_eq!(UserRole::from_str("staff"), None);
        assert_eq!(
            UserRole::from_str(UserRole::Admin.as_str()),
            Some(UserRole::Admin)
        );
    }
}
