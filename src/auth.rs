//! Placeholder admin authentication.
//!
//! This is NOT an authorization layer. A successful login issues no token or session,
//! and the admin report routes do not check anything. It exists so the admin UI has a
//! login form to call.

use tracing::{info, warn};

use crate::{config::AdminConfig, error::ReportError, metrics};

/// Stateless comparison against one configured username/password pair.
#[derive(Clone, Debug)]
pub struct PlaceholderAdminAuth {
    credentials: AdminConfig,
}

impl PlaceholderAdminAuth {
    pub fn new(credentials: AdminConfig) -> Self {
        Self { credentials }
    }

    /// Check the supplied credentials.
    pub fn login(&self, username: &str, password: &str) -> Result<(), ReportError> {
        if username == self.credentials.username && password == self.credentials.password {
            info!("admin login successful");
            Ok(())
        } else {
            ::metrics::counter!(metrics::AUTH_FAILED).increment(1);
            warn!("failed admin login attempt");
            Err(ReportError::Unauthorized)
        }
    }
}
