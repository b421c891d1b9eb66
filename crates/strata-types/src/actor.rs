use std::fmt;

use serde::{Deserialize, Serialize};

/// The user on whose behalf repository operations run.
///
/// Only the login takes part in any decision (lock ownership is a plain
/// string comparison of logins); the display name is informational.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Actor {
    pub login: String,
    pub display_name: String,
}

impl Actor {
    pub fn new(login: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            login: login.into(),
            display_name: display_name.into(),
        }
    }

    /// An actor whose display name is its login.
    pub fn with_login(login: impl Into<String>) -> Self {
        let login = login.into();
        Self {
            display_name: login.clone(),
            login,
        }
    }

    /// Returns `true` if both actors share a login.
    pub fn same_login(&self, login: &str) -> bool {
        self.login == login
    }
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.display_name == self.login {
            write!(f, "{}", self.login)
        } else {
            write!(f, "{} ({})", self.display_name, self.login)
        }
    }
}
