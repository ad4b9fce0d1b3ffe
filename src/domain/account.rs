//! Account-level domain types.
//!
//! The account manager owns the real account; these are the values it
//! hands across the boundary plus the session's own status tracking.

use serde::{Deserialize, Serialize};

/// Sign-in status as tracked by the account session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AccountStatus {
    SignedIn,
    #[default]
    SignedOut,
    NeedsReconnect,
}

impl AccountStatus {
    /// Initial status for an account manager's current state.
    #[must_use]
    pub const fn from_account(has_account: bool, needs_reauth: bool) -> Self {
        match (has_account, needs_reauth) {
            (false, _) => Self::SignedOut,
            (true, true) => Self::NeedsReconnect,
            (true, false) => Self::SignedIn,
        }
    }
}

impl std::fmt::Display for AccountStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SignedIn => write!(f, "signed in"),
            Self::SignedOut => write!(f, "signed out"),
            Self::NeedsReconnect => write!(f, "needs reconnect"),
        }
    }
}

/// Which part of the UI started the sign-in flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoginOrigin {
    Bookmarks,
    History,
    Settings,
    #[default]
    Undefined,
}

/// How an account became authenticated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuthType {
    /// Restored from persisted state.
    Existing,
    Signin,
    Signup,
    Pairing,
    /// Recovered after an authentication problem.
    Recovered,
}

/// An authenticated account as known to the account manager.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub uid: String,
    pub email: String,
    /// Set when the server rejected our credentials.
    #[serde(default)]
    pub needs_reauth: bool,
}

/// Public profile of the signed-in account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub uid: Option<String>,
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
}
