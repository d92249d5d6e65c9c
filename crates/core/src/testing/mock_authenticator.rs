//! Mock authenticator for testing.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;

use crate::session::{AuthError, Authenticator, Session};

/// Authenticator that hands out numbered sessions without a network.
///
/// Every call to `authenticate` counts as a login attempt, failed or not.
#[derive(Debug, Default)]
pub struct MockAuthenticator {
    logins: AtomicUsize,
    /// If set, the next login fails with this error.
    next_error: Mutex<Option<AuthError>>,
}

impl MockAuthenticator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of login attempts so far.
    pub fn login_count(&self) -> usize {
        self.logins.load(Ordering::SeqCst)
    }

    /// Make the next login fail.
    pub fn fail_next(&self, error: AuthError) {
        *self.next_error.lock().unwrap_or_else(|e| e.into_inner()) = Some(error);
    }
}

#[async_trait]
impl Authenticator for MockAuthenticator {
    async fn authenticate(&self) -> Result<Session, AuthError> {
        let attempt = self.logins.fetch_add(1, Ordering::SeqCst) + 1;

        if let Some(error) = self
            .next_error
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
        {
            return Err(error);
        }

        Ok(Session::new(format!("JSESSIONID=mock-{}", attempt), Utc::now()))
    }

    fn platform_name(&self) -> &'static str {
        "mock"
    }
}
