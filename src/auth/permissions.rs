//! Role to route permission table.

use std::collections::{HashMap, HashSet};

use crate::db::UserRole;

/// Routes each role may call. Read-only once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RolePermissions {
    routes: HashMap<UserRole, HashSet<String>>,
}

impl RolePermissions {
    pub fn new<R, I, S>(table: R) -> Self
    where
        R: IntoIterator<Item = (UserRole, I)>,
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let routes = table
            .into_iter()
            .map(|(role, routes)| (role, routes.into_iter().map(Into::into).collect()))
            .collect();
        Self { routes }
    }

    /// Parse a table of the form `{"admin": ["GetCustomer", ...], "user": [...]}`.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let table: HashMap<UserRole, Vec<String>> = serde_json::from_str(json)?;
        Ok(Self::new(table))
    }

    /// Whether `role` may call `route`. Unknown roles and routes are denied.
    pub fn is_authorized_for(&self, role: UserRole, route: &str) -> bool {
        self.routes
            .get(&role)
            .is_some_and(|routes| routes.contains(route))
    }
}

impl Default for RolePermissions {
    /// The banking API's route table.
    fn default() -> Self {
        Self::new([
            (
                UserRole::Admin,
                vec![
                    "GetAllCustomers",
                    "GetCustomer",
                    "NewAccount",
                    "NewTransaction",
                ],
            ),
            (UserRole::User, vec!["GetCustomer", "NewTransaction"]),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_table() {
        let permissions = RolePermissions::default();

        assert!(permissions.is_authorized_for(UserRole::Admin, "GetAllCustomers"));
        assert!(permissions.is_authorized_for(UserRole::Admin, "NewAccount"));
        assert!(permissions.is_authorized_for(UserRole::User, "GetCustomer"));
        assert!(permissions.is_authorized_for(UserRole::User, "NewTransaction"));

        assert!(!permissions.is_authorized_for(UserRole::User, "GetAllCustomers"));
        assert!(!permissions.is_authorized_for(UserRole::User, "NewAccount"));
    }

    #[test]
    fn test_unknown_route_denied() {
        let permissions = RolePermissions::default();
        assert!(!permissions.is_authorized_for(UserRole::Admin, "DeleteEverything"));
        assert!(!permissions.is_authorized_for(UserRole::Admin, ""));
        // Route names are case sensitive
        assert!(!permissions.is_authorized_for(UserRole::User, "getcustomer"));
    }

    #[test]
    fn test_role_missing_from_table_denied() {
        let permissions = RolePermissions::new([(UserRole::Admin, vec!["viewAccount"])]);
        assert!(permissions.is_authorized_for(UserRole::Admin, "viewAccount"));
        assert!(!permissions.is_authorized_for(UserRole::User, "viewAccount"));
    }

    #[test]
    fn test_lookup_is_stable() {
        let permissions = RolePermissions::default();
        for _ in 0..3 {
            assert!(permissions.is_authorized_for(UserRole::User, "GetCustomer"));
            assert!(!permissions.is_authorized_for(UserRole::User, "NewAccount"));
        }
    }

    #[test]
    fn test_from_json() {
        let permissions =
            RolePermissions::from_json(r#"{"user": ["viewAccount"], "admin": ["viewAccount", "closeAccount"]}"#)
                .unwrap();

        assert!(permissions.is_authorized_for(UserRole::User, "viewAccount"));
        assert!(!permissions.is_authorized_for(UserRole::User, "closeAccount"));
        assert!(permissions.is_authorized_for(UserRole::Admin, "closeAccount"));
    }

    #[test]
    fn test_from_json_rejects_unknown_role() {
        assert!(RolePermissions::from_json(r#"{"root": ["viewAccount"]}"#).is_err());
        assert!(RolePermissions::from_json("not json").is_err());
    }
}
