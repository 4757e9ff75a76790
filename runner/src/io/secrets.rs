//! Secrets passed through to the generator step.
//!
//! Both values are opaque strings: the runner never inspects them, never logs
//! them, and injects them only into the generator child's environment. They
//! are read once per run; lifecycle ends with the run's process.

use std::env;
use std::fmt;

use anyhow::{Result, anyhow};

/// Environment variable holding the API access token.
pub const ACCESS_TOKEN_VAR: &str = "ACCESS_TOKEN";
/// Environment variable holding the account name the generator reports on.
pub const USER_NAME_VAR: &str = "USER_NAME";

/// Secret values consumed by the generator step.
#[derive(Clone, PartialEq, Eq)]
pub struct Secrets {
    pub access_token: String,
    pub user_name: String,
}

impl Secrets {
    /// Read both secrets from the process environment.
    ///
    /// Missing either one fails the run before any step executes.
    pub fn from_env() -> Result<Self> {
        let access_token = env::var(ACCESS_TOKEN_VAR)
            .map_err(|_| anyhow!("{ACCESS_TOKEN_VAR} is not set (required secret)"))?;
        let user_name = env::var(USER_NAME_VAR)
            .map_err(|_| anyhow!("{USER_NAME_VAR} is not set (required secret)"))?;
        Ok(Self {
            access_token,
            user_name,
        })
    }
}

// Redacted by hand so a stray debug log can never leak the token.
impl fmt::Debug for Secrets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Secrets")
            .field("access_token", &"<redacted>")
            .field("user_name", &"<redacted>")
            .finish()
    }
}
