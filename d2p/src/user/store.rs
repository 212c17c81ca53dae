//! User records and the in-memory directory

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::UserConfig;

const EMAIL_DOMAIN: &str = "dump2plan.local";

/// A known user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub display_name: String,
    pub username: String,
    pub email: String,
    pub role: String,
}

impl User {
    /// User whose id is the username and whose email is `<username>@dump2plan.local`
    pub fn new(display_name: impl Into<String>, username: impl Into<String>, role: impl Into<String>) -> Self {
        let username = username.into();
        Self {
            id: username.clone(),
            display_name: display_name.into(),
            email: format!("{}@{}", username, EMAIL_DOMAIN),
            username,
            role: role.into(),
        }
    }
}

impl From<&UserConfig> for User {
    fn from(config: &UserConfig) -> Self {
        let mut user = User::new(&config.display_name, &config.username, &config.role);
        if let Some(email) = &config.email {
            user.email = email.clone();
        }
        user
    }
}

/// Lookup interface over the user directory
pub trait UserStore: Send + Sync {
    fn find_by_id(&self, id: &str) -> Option<User>;
    fn find_by_username(&self, username: &str) -> Option<User>;
    fn find_by_email(&self, email: &str) -> Option<User>;

    /// User bound to conversations that do not name one
    fn default_user(&self) -> User;
}

/// Fixed directory built at startup
#[derive(Debug, Clone)]
pub struct InMemoryUserStore {
    users: HashMap<String, User>,
    default_username: String,
}

impl InMemoryUserStore {
    /// Build from a non-empty list; the first user is the default
    ///
    /// An empty list falls back to a single `user` account.
    pub fn new(users: Vec<User>) -> Self {
        debug!(count = users.len(), "InMemoryUserStore::new: called");
        let users = if users.is_empty() {
            vec![User::new("User", "user", "USER")]
        } else {
            users
        };
        let default_username = users[0].username.clone();
        Self {
            users: users.into_iter().map(|u| (u.username.clone(), u)).collect(),
            default_username,
        }
    }

    pub fn from_config(users: &[UserConfig]) -> Self {
        Self::new(users.iter().map(User::from).collect())
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

impl Default for InMemoryUserStore {
    fn default() -> Self {
        Self::new(vec![
            User::new("User", "user", "USER"),
            User::new("Alice", "alice", "USER"),
            User::new("Bob", "bob", "USER"),
        ])
    }
}

impl UserStore for InMemoryUserStore {
    fn find_by_id(&self, id: &str) -> Option<User> {
        debug!(%id, "InMemoryUserStore::find_by_id: called");
        self.users.values().find(|u| u.id == id).cloned()
    }

    fn find_by_username(&self, username: &str) -> Option<User> {
        debug!(%username, "InMemoryUserStore::find_by_username: called");
        self.users.get(username).cloned()
    }

    fn find_by_email(&self, email: &str) -> Option<User> {
        debug!(%email, "InMemoryUserStore::find_by_email: called");
        self.users.values().find(|u| u.email.eq_ignore_ascii_case(email)).cloned()
    }

    fn default_user(&self) -> User {
        self.users
            .get(&self.default_username)
            .cloned()
            .unwrap_or_else(|| User::new("User", "user", "USER"))
    }
}
