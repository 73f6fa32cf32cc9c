//! Role based permissions and the session snapshot taken at login
use crate::types::{Operation, Resource, UserId};
use std::collections::{BTreeMap, BTreeSet};

/// A single grant: `operation` may be performed on `resource`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, minicbor::Encode, minicbor::Decode,
)]
pub struct Permission {
    #[n(0)]
    pub resource: Resource,
    #[n(1)]
    pub operation: Operation,
}

impl Permission {
    pub const fn new(resource: Resource, operation: Operation) -> Self {
        Self {
            resource,
            operation,
        }
    }
}

/// Named bundle of permissions. Reference data, seeded once.
#[derive(Debug, Clone, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
pub struct Role {
    #[n(0)]
    pub name: String,
    #[n(1)]
    pub permissions: Vec<Permission>,
}

impl Role {
    pub fn new(name: impl Into<String>, permissions: impl IntoIterator<Item = Permission>) -> Self {
        let mut permissions: Vec<Permission> = permissions.into_iter().collect();
        permissions.sort();
        permissions.dedup();
        Self {
            name: name.into(),
            permissions,
        }
    }
}

pub const ADMINISTRATOR: &str = "Administrator";
pub const EMPLOYEE: &str = "Employee";

/// The set of roles a fresh store is seeded with.
#[derive(Debug, Clone)]
pub struct RoleCatalog {
    roles: Vec<Role>,
}

impl RoleCatalog {
    pub fn new(roles: Vec<Role>) -> Self {
        Self { roles }
    }
    pub fn roles(&self) -> &[Role] {
        &self.roles
    }
    pub fn get(&self, name: &str) -> Option<&Role> {
        self.roles.iter().find(|r| r.name == name)
    }
}

impl Default for RoleCatalog {
    fn default() -> Self {
        let everything = Resource::ALL.into_iter().flat_map(|resource| {
            Operation::ALL
                .into_iter()
                .map(move |operation| Permission::new(resource, operation))
        });
        let employee = [Operation::View, Operation::Buy, Operation::Sell]
            .into_iter()
            .map(|operation| Permission::new(Resource::Product, operation));

        Self::new(vec![
            Role::new(ADMINISTRATOR, everything),
            Role::new(EMPLOYEE, employee),
        ])
    }
}

/// Resolved permissions of an authenticated user.
///
/// Built once at login by flattening every assigned role. It is a snapshot:
/// role edits made afterwards are not seen until the user logs in again.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct Session {
    pub user_id: UserId,
    pub username: String,
    pub roles: Vec<String>,
    pub permissions: BTreeMap<Resource, BTreeSet<Operation>>,
}

impl Session {
    pub fn from_roles<'a>(
        user_id: UserId,
        username: impl Into<String>,
        roles: impl IntoIterator<Item = &'a Role>,
    ) -> Self {
        let mut names = Vec::new();
        let mut permissions: BTreeMap<Resource, BTreeSet<Operation>> = BTreeMap::new();

        for role in roles {
            names.push(role.name.clone());
            for p in &role.permissions {
                permissions.entry(p.resource).or_default().insert(p.operation);
            }
        }

        Self {
            user_id,
            username: username.into(),
            roles: names,
            permissions,
        }
    }

    pub fn has_permission(&self, resource: Resource, operation: Operation) -> bool {
        has_permission(self, resource, operation)
    }
}

/// Pure lookup over the session snapshot. An absent resource is a plain `false`.
pub fn has_permission(session: &Session, resource: Resource, operation: Operation) -> bool {
    session
        .permissions
        .get(&resource)
        .is_some_and(|ops| ops.contains(&operation))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session_for(role_names: &[&str]) -> Session {
        let catalog = RoleCatalog::default();
        let roles = role_names.iter().filter_map(|n| catalog.get(n));
        Session::from_roles(UserId::from("user_1test"), "tester", roles)
    }

    #[test]
    fn employee_cannot_view_users() {
        let session = session_for(&[EMPLOYEE]);

        assert!(!has_permission(&session, Resource::User, Operation::View));
        assert!(session.has_permission(Resource::Product, Operation::Sell));
        assert!(!session.has_permission(Resource::Product, Operation::Create));
    }

    #[test]
    fn administrator_holds_every_grant() {
        let session = session_for(&[ADMINISTRATOR]);

        for resource in Resource::ALL {
            for operation in Operation::ALL {
                assert!(session.has_permission(resource, operation));
            }
        }
    }

    #[test]
    fn roles_are_flattened_into_one_map() {
        let audit = Role::new(
            "Auditor",
            [Permission::new(Resource::User, Operation::View)],
        );
        let catalog = RoleCatalog::default();
        let employee = catalog.get(EMPLOYEE).unwrap();
        let session = Session::from_roles(UserId::from("user_1x"), "x", [employee, &audit]);

        assert_eq!(session.roles, vec![EMPLOYEE.to_string(), "Auditor".to_string()]);
        assert!(session.has_permission(Resource::User, Operation::View));
        assert!(session.has_permission(Resource::Product, Operation::Buy));
        assert!(!session.has_permission(Resource::User, Operation::Update));
    }

    #[test]
    fn empty_session_denies_everything() {
        let session = Session::from_roles(UserId::from("user_1y"), "y", Vec::<&Role>::new());
        assert!(!session.has_permission(Resource::Product, Operation::View));
    }

    #[test]
    fn role_encoding() {
        let role = RoleCatalog::default().get(EMPLOYEE).unwrap().clone();
        let bytes = minicbor::to_vec(&role).unwrap();
        let decoded: Role = minicbor::decode(&bytes).unwrap();
        assert_eq!(role, decoded);
    }
}
