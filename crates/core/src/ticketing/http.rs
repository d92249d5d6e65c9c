//! HTTP plumbing shared by the CITSmart authenticator and ticket client.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, COOKIE, HOST, ORIGIN, REFERER};
use reqwest::{Client, RequestBuilder, Url};
use serde::Serialize;

use crate::config::{normalize_base_url, TicketingConfig};
use crate::session::Session;

/// Page the portal form posts claim to come from.
pub const PORTAL_PAGE: &str = "/citsmart/pages/smartPortal/smartPortal.load";

/// Configured HTTP client plus base URL and header policy.
#[derive(Clone)]
pub struct CitsmartHttp {
    client: Client,
    base_url: String,
    forced_host: Option<String>,
}

impl CitsmartHttp {
    pub fn new(config: &TicketingConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs as u64))
            .timeout(Duration::from_secs(config.timeout_secs as u64))
            .danger_accept_invalid_certs(!config.verify_tls)
            .redirect(reqwest::redirect::Policy::none())
            .build()?;

        Ok(Self {
            client,
            base_url: normalize_base_url(&config.base_url),
            forced_host: config
                .forced_host
                .as_deref()
                .map(str::trim)
                .filter(|h| !h.is_empty())
                .map(String::from),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Origin the platform expects: the forced virtual host when set,
    /// otherwise scheme and authority of the base URL.
    pub fn origin(&self) -> String {
        match &self.forced_host {
            Some(host) => format!("https://{}", host),
            None => Url::parse(&self.base_url)
                .map(|u| u.origin().ascii_serialization())
                .unwrap_or_else(|_| self.base_url.clone()),
        }
    }

    fn headers(&self, referer: Option<&str>, session: Option<&Session>) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/json, text/plain, */*"),
        );

        let origin = self.origin();
        let referer = match referer {
            Some(path) => format!("{}{}", origin, path),
            None => format!("{}/", origin),
        };
        if let Ok(value) = HeaderValue::from_str(&origin) {
            headers.insert(ORIGIN, value);
        }
        if let Ok(value) = HeaderValue::from_str(&referer) {
            headers.insert(REFERER, value);
        }
        if let Some(host) = &self.forced_host {
            if let Ok(value) = HeaderValue::from_str(host) {
                headers.insert(HOST, value);
            }
        }
        if let Some(session) = session {
            if let Ok(mut value) = HeaderValue::from_str(session.cookie_header()) {
                value.set_sensitive(true);
                headers.insert(COOKIE, value);
            }
        }
        headers
    }

    /// JSON POST to `path`.
    pub fn post_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &T,
        session: Option<&Session>,
    ) -> RequestBuilder {
        self.client
            .post(self.url(path))
            .headers(self.headers(None, session))
            .json(body)
    }

    /// Form POST to `path`, referred from the portal page.
    pub fn post_form<T: Serialize + ?Sized>(
        &self,
        path: &str,
        form: &T,
        session: &Session,
    ) -> RequestBuilder {
        self.client
            .post(self.url(path))
            .headers(self.headers(Some(PORTAL_PAGE), Some(session)))
            .form(form)
    }
}
