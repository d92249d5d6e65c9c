use chrono::{DateTime, Duration, Utc};
use std::fmt;

/// Session credential for the ticketing platform.
///
/// Holds the `Cookie` header value returned by login. It lives only for one
/// process invocation and is never persisted or logged.
#[derive(Clone, PartialEq, Eq)]
pub struct Session {
    cookie: String,
    established_at: DateTime<Utc>,
}

impl Session {
    pub fn new(cookie: impl Into<String>, established_at: DateTime<Utc>) -> Self {
        Self {
            cookie: cookie.into(),
            established_at,
        }
    }

    /// Build a session from `Set-Cookie` header values, keeping only the
    /// `name=value` pair of each. Returns `None` when no cookie was set.
    pub fn from_set_cookies<'a>(
        set_cookies: impl IntoIterator<Item = &'a str>,
        established_at: DateTime<Utc>,
    ) -> Option<Self> {
        let pairs: Vec<&str> = set_cookies
            .into_iter()
            .filter_map(|raw| raw.split(';').next())
            .map(str::trim)
            .filter(|pair| pair.contains('=') && !pair.starts_with('='))
            .collect();

        if pairs.is_empty() {
            None
        } else {
            Some(Self::new(pairs.join("; "), established_at))
        }
    }

    /// Value for the `Cookie` request header
    pub fn cookie_header(&self) -> &str {
        &self.cookie
    }

    pub fn is_expired(&self, ttl: Duration, now: DateTime<Utc>) -> bool {
        now - self.established_at >= ttl
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("cookie", &"<redacted>")
            .field("established_at", &self.established_at)
            .finish()
    }
}
