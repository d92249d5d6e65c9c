use std::sync::Arc;

use chrono::{Duration, Utc};
use tokio::sync::RwLock;
use tracing::debug;

use super::{AuthError, Authenticator, Session};

/// Caches the session of one invocation and refreshes it on expiry or after
/// the caller reports an auth failure through [`SessionManager::invalidate`].
pub struct SessionManager {
    authenticator: Arc<dyn Authenticator>,
    ttl: Duration,
    current: RwLock<Option<Session>>,
}

impl SessionManager {
    pub fn new(authenticator: Arc<dyn Authenticator>, ttl: Duration) -> Self {
        Self {
            authenticator,
            ttl,
            current: RwLock::new(None),
        }
    }

    /// Return the cached session, logging in when there is none or it expired.
    pub async fn session(&self) -> Result<Session, AuthError> {
        {
            let current = self.current.read().await;
            if let Some(session) = current.as_ref() {
                if !session.is_expired(self.ttl, Utc::now()) {
                    return Ok(session.clone());
                }
                debug!("Cached session expired");
            }
        }

        let session = self.authenticator.authenticate().await?;
        debug!(
            platform = self.authenticator.platform_name(),
            "Authenticated new session"
        );
        *self.current.write().await = Some(session.clone());
        Ok(session)
    }

    /// Drop the cached session so the next call logs in again.
    pub async fn invalidate(&self) {
        *self.current.write().await = None;
    }
}
