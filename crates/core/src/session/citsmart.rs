//! CITSmart service-account login.

use async_trait::async_trait;
use chrono::Utc;
use reqwest::header::SET_COOKIE;
use serde_json::json;
use tracing::debug;

use crate::config::TicketingConfig;
use crate::ticketing::CitsmartHttp;

use super::{AuthError, Authenticator, Session};

const LOGIN_PATH: &str = "/citsmart/services/login";

/// Logs the configured service account into CITSmart.
pub struct CitsmartAuthenticator {
    http: CitsmartHttp,
    user: String,
    password: String,
    platform: String,
}

impl CitsmartAuthenticator {
    pub fn new(http: CitsmartHttp, config: &TicketingConfig) -> Self {
        Self {
            http,
            user: config.user.clone(),
            password: config.password.clone(),
            platform: config.platform.clone(),
        }
    }
}

#[async_trait]
impl Authenticator for CitsmartAuthenticator {
    async fn authenticate(&self) -> Result<Session, AuthError> {
        debug!(user = %self.user, "Logging into CITSmart");

        let body = json!({
            "userName": self.user,
            "password": self.password,
            "platform": self.platform,
        });

        let response = self
            .http
            .post_json(LOGIN_PATH, &body, None)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AuthError::ServiceUnavailable("login timed out".to_string())
                } else {
                    AuthError::ServiceUnavailable(e.to_string())
                }
            })?;

        let status = response.status();
        if status.as_u16() == 401 || status.as_u16() == 403 {
            return Err(AuthError::InvalidCredentials(format!("HTTP {}", status)));
        }
        if status.is_server_error() {
            return Err(AuthError::ServiceUnavailable(format!("HTTP {}", status)));
        }
        if status.as_u16() != 200 {
            return Err(AuthError::Protocol(format!("HTTP {}", status)));
        }

        let cookies: Vec<&str> = response
            .headers()
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .collect();

        Session::from_set_cookies(cookies, Utc::now())
            .ok_or_else(|| AuthError::Protocol("login response set no session cookie".to_string()))
    }

    fn platform_name(&self) -> &'static str {
        "citsmart"
    }
}
