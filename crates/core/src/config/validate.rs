use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Both API URLs are non-empty and http(s) (a missing scheme is allowed for the
///   ticketing base URL, `normalize_base_url` adds one)
/// - Credentials, activity and destination group are set
/// - Timeouts and the problem lookup limit are not 0
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let t = &config.ticketing;
    let m = &config.monitoring;

    if t.base_url.trim().is_empty() {
        return Err(invalid("ticketing.base_url cannot be empty"));
    }
    require_http(&normalize_base_url(&t.base_url), "ticketing.base_url")?;
    require_http(m.api_url.trim(), "monitoring.api_url")?;

    for (value, name) in [
        (&t.user, "ticketing.user"),
        (&t.password, "ticketing.password"),
        (&t.activity_id, "ticketing.activity_id"),
        (&t.destination_group_id, "ticketing.destination_group_id"),
        (&t.service_id, "ticketing.service_id"),
        (&m.api_token, "monitoring.api_token"),
    ] {
        if value.trim().is_empty() {
            return Err(invalid(&format!("{} cannot be empty", name)));
        }
    }

    for (value, name) in [
        (t.timeout_secs, "ticketing.timeout_secs"),
        (t.connect_timeout_secs, "ticketing.connect_timeout_secs"),
        (m.timeout_secs, "monitoring.timeout_secs"),
        (m.connect_timeout_secs, "monitoring.connect_timeout_secs"),
        (m.problem_lookup_limit, "monitoring.problem_lookup_limit"),
    ] {
        if value == 0 {
            return Err(invalid(&format!("{} cannot be 0", name)));
        }
    }

    Ok(())
}

/// Trim, default the scheme to https and drop trailing slashes.
pub fn normalize_base_url(base: &str) -> String {
    let base = base.trim().trim_end_matches('/');
    if base.contains("://") {
        base.to_string()
    } else {
        format!("https://{}", base)
    }
}

fn require_http(url: &str, name: &str) -> Result<(), ConfigError> {
    if url.is_empty() {
        return Err(invalid(&format!("{} cannot be empty", name)));
    }
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        return Err(invalid(&format!("{} must be an http(s) URL", name)));
    }
    Ok(())
}

fn invalid(message: &str) -> ConfigError {
    ConfigError::ValidationError(message.to_string())
}
