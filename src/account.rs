//! User accounts and their status lifecycle
//!
//! ```text
//! register ──▶ Pending ──approve──▶ Approved
//!                 │                     │
//!                 └──────disable────────┴──▶ Disabled (terminal)
//! ```
use crate::credentials::Credentials;
use crate::error::WorkflowError;
use crate::permission::{ADMINISTRATOR, Role, Session};
use crate::store::{OrAbort, Store, decode, encode, settle};
use crate::types::{Operation, Resource, TimeStamp, UserId};
use sled::Transactional;
use sled::transaction::{
    ConflictableTransactionResult, TransactionResult, TransactionalTree, abort,
};
use std::fmt;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, minicbor::Encode, minicbor::Decode, serde::Serialize,
)]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
    #[n(0)]
    Pending,
    #[n(1)]
    Approved,
    #[n(2)]
    Disabled,
}

/// Outcome of applying a status change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Moved { from: AccountStatus, to: AccountStatus },
    Unchanged(AccountStatus),
}

impl AccountStatus {
    pub fn is_active(&self) -> bool {
        matches!(self, AccountStatus::Approved)
    }

    pub fn approve(self) -> Result<Transition, WorkflowError> {
        match self {
            AccountStatus::Pending => Ok(Transition::Moved {
                from: self,
                to: AccountStatus::Approved,
            }),
            AccountStatus::Approved => Ok(Transition::Unchanged(self)),
            AccountStatus::Disabled => Err(WorkflowError::InvalidStatusTransition {
                from: self,
                to: AccountStatus::Approved,
            }),
        }
    }

    pub fn disable(self) -> Transition {
        match self {
            AccountStatus::Disabled => Transition::Unchanged(self),
            from => Transition::Moved {
                from,
                to: AccountStatus::Disabled,
            },
        }
    }
}

impl Transition {
    pub fn status(&self) -> AccountStatus {
        match self {
            Transition::Moved { to, .. } => *to,
            Transition::Unchanged(status) => *status,
        }
    }
    pub fn changed(&self) -> bool {
        matches!(self, Transition::Moved { .. })
    }
}

impl fmt::Display for AccountStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AccountStatus::Pending => "pending",
            AccountStatus::Approved => "approved",
            AccountStatus::Disabled => "disabled",
        })
    }
}

/// Persisted account. Never deleted; `Disabled` is the soft delete.
#[derive(Debug, Clone, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
pub struct User {
    #[n(0)]
    pub id: UserId,
    #[n(1)]
    pub username: String,
    #[n(2)]
    pub password_hash: String, // argon2id PHC string
    #[n(3)]
    pub status: AccountStatus,
    #[n(4)]
    pub roles: Vec<String>, // role names, the user/role join
    #[n(5)]
    pub created_at: TimeStamp,
    #[n(6)]
    pub updated_at: TimeStamp,
}

/// Listing view of a user, safe to hand to a presentation layer.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct UserEntry {
    pub id: UserId,
    pub username: String,
    pub status: AccountStatus,
    pub role: Option<String>,
}

impl From<&User> for UserEntry {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            username: user.username.clone(),
            status: user.status,
            role: user.roles.first().cloned(),
        }
    }
}

// meta key holding the id of the bootstrapped administrator
const BOOTSTRAP_KEY: &[u8] = b"bootstrap_administrator";

struct NewAccount<'a> {
    username: &'a str,
    password_hash: &'a str,
    role_name: &'a str,
    status: AccountStatus,
}

impl NewAccount<'_> {
    // username uniqueness and role existence are checked in the same transaction as the insert
    fn insert(
        &self,
        users: &TransactionalTree,
        usernames: &TransactionalTree,
        roles: &TransactionalTree,
    ) -> ConflictableTransactionResult<User, WorkflowError> {
        if usernames.get(self.username)?.is_some() {
            return abort(WorkflowError::DuplicateUsername(self.username.to_owned()));
        }
        if roles.get(self.role_name)?.is_none() {
            return abort(WorkflowError::UnknownRole(self.role_name.to_owned()));
        }

        let now = TimeStamp::new();
        let user = User {
            id: UserId::generate().or_abort()?,
            username: self.username.to_owned(),
            password_hash: self.password_hash.to_owned(),
            status: self.status,
            roles: vec![self.role_name.to_owned()],
            created_at: now,
            updated_at: now,
        };

        users.insert(user.id.as_bytes(), encode(&user).or_abort()?)?;
        usernames.insert(self.username, user.id.as_bytes())?;
        Ok(user)
    }
}

#[derive(Clone)]
pub struct AccountLifecycle {
    store: Store,
    credentials: Credentials,
}

impl AccountLifecycle {
    pub fn new(store: Store, credentials: Credentials) -> Self {
        Self { store, credentials }
    }

    /// Create a pending account holding a single role. Does not log in.
    pub fn register(
        &self,
        username: &str,
        password: &str,
        role_name: &str,
    ) -> Result<User, WorkflowError> {
        // hashing is slow, keep it out of the transaction since sled may rerun the closure
        let password_hash = self.credentials.hash_password(password)?;

        let result: TransactionResult<User, WorkflowError> =
            (&self.store.users, &self.store.usernames, &self.store.roles).transaction(
                |(users, usernames, roles)| {
                    let account = NewAccount {
                        username,
                        password_hash: &password_hash,
                        role_name,
                        status: AccountStatus::Pending,
                    };
                    account.insert(users, usernames, roles)
                },
            );

        let user = settle(result)?;
        tracing::info!(user_id = %user.id, role = role_name, "registered user {}", user.username);
        Ok(user)
    }

    /// Create an approved administrator without going through the approval queue.
    ///
    /// Refused while the previously bootstrapped administrator is still active.
    /// The check and the insert share one transaction, so of two racing
    /// bootstraps only one commits.
    pub fn bootstrap_administrator(
        &self,
        username: &str,
        password: &str,
    ) -> Result<User, WorkflowError> {
        let password_hash = self.credentials.hash_password(password)?;

        let result: TransactionResult<User, WorkflowError> = (
            &self.store.users,
            &self.store.usernames,
            &self.store.roles,
            &self.store.meta,
        )
            .transaction(|(users, usernames, roles, meta)| {
                if let Some(id) = meta.get(BOOTSTRAP_KEY)? {
                    if let Some(bytes) = users.get(&id)? {
                        let previous: User = decode(&bytes).or_abort()?;
                        if previous.status.is_active() {
                            return abort(WorkflowError::PermissionDenied {
                                resource: Resource::User,
                                operation: Operation::Create,
                            });
                        }
                    }
                }

                let account = NewAccount {
                    username,
                    password_hash: &password_hash,
                    role_name: ADMINISTRATOR,
                    status: AccountStatus::Approved,
                };
                let user = account.insert(users, usernames, roles)?;
                meta.insert(BOOTSTRAP_KEY, user.id.as_bytes())?;
                Ok(user)
            });

        let user = settle(result)?;
        tracing::info!(user_id = %user.id, "bootstrapped administrator {}", user.username);
        Ok(user)
    }

    /// Check credentials and status, then snapshot the user's permissions.
    ///
    /// Unknown usernames and wrong passwords are indistinguishable to the caller.
    pub fn login(&self, username: &str, password: &str) -> Result<Session, WorkflowError> {
        let result: TransactionResult<Option<(User, Vec<Role>)>, WorkflowError> =
            (&self.store.usernames, &self.store.users, &self.store.roles).transaction(
                |(usernames, users, roles)| {
                    let Some(id) = usernames.get(username)? else {
                        return Ok(None);
                    };
                    let Some(bytes) = users.get(&id)? else {
                        return Ok(None);
                    };
                    let user: User = decode(&bytes).or_abort()?;

                    let mut assigned = Vec::with_capacity(user.roles.len());
                    for name in &user.roles {
                        if let Some(bytes) = roles.get(name.as_str())? {
                            assigned.push(decode::<Role>(&bytes).or_abort()?);
                        }
                    }
                    Ok(Some((user, assigned)))
                },
            );

        // an unknown username costs the same argon2 run as a wrong password
        let found = settle(result)?;
        let stored = found.as_ref().map(|(user, _)| user.password_hash.as_str());
        let verified = self.credentials.verify_stored(password, stored);

        let Some((user, roles)) = found else {
            tracing::debug!("login rejected: unknown username");
            return Err(WorkflowError::InvalidCredentials);
        };
        if !verified {
            tracing::debug!(user_id = %user.id, "login rejected: password mismatch");
            return Err(WorkflowError::InvalidCredentials);
        }
        if !user.status.is_active() {
            return Err(WorkflowError::AccountNotActive);
        }
        if roles.len() < user.roles.len() {
            tracing::warn!(user_id = %user.id, "user references roles that no longer exist");
        }

        Ok(Session::from_roles(user.id, user.username, &roles))
    }

    /// Pending → Approved. Approving twice is a no-op; a disabled account stays disabled.
    pub fn approve(&self, user_id: &UserId) -> Result<Transition, WorkflowError> {
        self.apply(user_id, AccountStatus::approve)
    }

    /// Any status → Disabled. Disabling twice is a no-op.
    pub fn disable(&self, user_id: &UserId) -> Result<Transition, WorkflowError> {
        self.apply(user_id, |status| Ok(status.disable()))
    }

    fn apply(
        &self,
        user_id: &UserId,
        step: impl Fn(AccountStatus) -> Result<Transition, WorkflowError>,
    ) -> Result<Transition, WorkflowError> {
        let result: TransactionResult<Transition, WorkflowError> =
            self.store.users.transaction(|users| {
                let Some(bytes) = users.get(user_id.as_bytes())? else {
                    return abort(WorkflowError::UserNotFound(user_id.clone()));
                };
                let mut user: User = decode(&bytes).or_abort()?;
                let transition = step(user.status).or_abort()?;

                if transition.changed() {
                    user.status = transition.status();
                    user.updated_at = TimeStamp::new();
                    users.insert(user_id.as_bytes(), encode(&user).or_abort()?)?;
                }
                Ok(transition)
            });

        let transition = settle(result)?;
        if let Transition::Moved { from, to } = transition {
            tracing::info!(user_id = %user_id, %from, %to, "account status changed");
        }
        Ok(transition)
    }

    /// Accounts waiting for an administrator, the approval queue.
    pub fn pending_users(&self) -> Result<Vec<UserEntry>, WorkflowError> {
        Ok(self
            .store
            .users()?
            .iter()
            .filter(|u| u.status == AccountStatus::Pending)
            .map(UserEntry::from)
            .collect())
    }

    pub fn all_users(&self) -> Result<Vec<UserEntry>, WorkflowError> {
        let mut users: Vec<UserEntry> = self.store.users()?.iter().map(UserEntry::from).collect();
        users.sort_by(|a, b| a.username.cmp(&b.username));
        Ok(users)
    }
}
