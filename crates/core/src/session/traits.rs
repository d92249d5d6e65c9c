use async_trait::async_trait;
use thiserror::Error;

use super::types::Session;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),

    #[error("Authentication service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Unexpected login response: {0}")]
    Protocol(String),
}

/// Obtains a session against the ticketing platform for the configured
/// service account. Implementations never retry and never log credentials.
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Log in and return a fresh session
    async fn authenticate(&self) -> Result<Session, AuthError>;

    /// Name of the platform this authenticator logs into
    fn platform_name(&self) -> &'static str;
}
