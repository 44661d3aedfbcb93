//! Authenticated user record and the admin predicate.

use serde::{Deserialize, Serialize};

use super::id::UserId;

/// Username that is always treated as an administrator.
pub const ADMIN_USERNAME: &str = "admin";

/// The user resolved from `GET /user/`.
///
/// The backend returns only `name`, `email` and `username` today; the other
/// fields are accepted when present so richer user payloads keep working.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    #[serde(default)]
    pub id: Option<UserId>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub is_staff: Option<bool>,
    #[serde(default)]
    pub is_superuser: Option<bool>,
}

impl UserRecord {
    /// Name to show in greetings: full name, else username, else email.
    #[must_use]
    pub fn display_name(&self) -> &str {
        if !self.name.is_empty() {
            return &self.name;
        }
        self.username.as_deref().unwrap_or(&self.email)
    }
}

/// Whether a user may enter the admin back-office.
///
/// True if the username is [`ADMIN_USERNAME`], the role is `Admin`/`admin`,
/// or either staff flag is set. `None` is never an admin.
#[must_use]
pub fn is_user_admin(user: Option<&UserRecord>) -> bool {
    let Some(user) = user else {
        return false;
    };

    user.username.as_deref() == Some(ADMIN_USERNAME)
        || matches!(user.role.as_deref(), Some("Admin" | "admin"))
        || user.is_staff == Some(true)
        || user.is_superuser == Some(true)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_admin_by_username() {
        let user = UserRecord {
            username: Some("admin".to_string()),
            ..Default::default()
        };
        assert!(is_user_admin(Some(&user)));
    }

    #[test]
    fn test_admin_by_role_or_flags() {
        for role in ["Admin", "admin"] {
            let user = UserRecord {
                role: Some(role.to_string()),
                ..Default::default()
            };
            assert!(is_user_admin(Some(&user)), "role {role}");
        }

        let staff = UserRecord {
            is_staff: Some(true),
            ..Default::default()
        };
        assert!(is_user_admin(Some(&staff)));

        let superuser = UserRecord {
            is_superuser: Some(true),
            ..Default::default()
        };
        assert!(is_user_admin(Some(&superuser)));
    }

    #[test]
    fn test_regular_user_is_not_admin() {
        let user = UserRecord {
            name: "Asha".to_string(),
            email: "asha@example.com".to_string(),
            username: Some("asha@example.com".to_string()),
            role: Some("ADMIN".to_string()),
            is_staff: Some(false),
            ..Default::default()
        };
        assert!(!is_user_admin(Some(&user)));
        assert!(!is_user_admin(None));
    }

    #[test]
    fn test_deserialize_backend_payload() {
        let user: UserRecord = serde_json::from_str(
            r#"{"name": "Asha K", "email": "asha@example.com", "username": "asha@example.com"}"#,
        )
        .unwrap();
        assert_eq!(user.display_name(), "Asha K");
        assert!(user.role.is_none());
    }
}
