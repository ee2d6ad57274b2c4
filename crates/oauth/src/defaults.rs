use {secrecy::Secret, underwood_config::OAuthSection};

use crate::types::OAuthConfig;

pub const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/auth";
pub const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
pub const GOOGLE_REVOKE_URL: &str = "https://accounts.google.com/o/oauth2/revoke";
pub const GOOGLE_PROFILE_URL: &str =
    "https://people.googleapis.com/v1/people/me?personFields=names";

/// Read-only mail and calendar plus the profile name.
pub const DEFAULT_SCOPES: &[&str] = &[
    "https://www.googleapis.com/auth/gmail.readonly",
    "https://www.googleapis.com/auth/calendar.readonly",
    "https://www.googleapis.com/auth/userinfo.profile",
];

/// Build the provider config from the `[oauth]` section, filling in Google endpoints.
///
/// Consent always asks for offline access so a refresh token is issued.
pub fn google_config(section: &OAuthSection) -> OAuthConfig {
    OAuthConfig {
        client_id: section.client_id.clone(),
        client_secret: section.client_secret.clone(),
        auth_url: section
            .auth_url
            .clone()
            .unwrap_or_else(|| GOOGLE_AUTH_URL.into()),
        token_url: section
            .token_url
            .clone()
            .unwrap_or_else(|| GOOGLE_TOKEN_URL.into()),
        revoke_url: section
            .revoke_url
            .clone()
            .unwrap_or_else(|| GOOGLE_REVOKE_URL.into()),
        profile_url: section
            .profile_url
            .clone()
            .unwrap_or_else(|| GOOGLE_PROFILE_URL.into()),
        redirect_uri: section.redirect_uri.clone(),
        scopes: DEFAULT_SCOPES.iter().map(|s| (*s).to_string()).collect(),
        extra_auth_params: vec![
            ("access_type".into(), "offline".into()),
            ("prompt".into(), "consent".into()),
        ],
    }
}

/// Load the OAuth config for the appliance.
///
/// Priority:
/// 1. Environment variables (`UNDERWOOD_OAUTH_CLIENT_ID`, `UNDERWOOD_OAUTH_CLIENT_SECRET`)
/// 2. The `[oauth]` config section
/// 3. Built-in Google endpoints
pub fn load_oauth_config(section: &OAuthSection) -> OAuthConfig {
    apply_env_overrides(google_config(section), |key| std::env::var(key).ok())
}

fn apply_env_overrides(
    mut config: OAuthConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> OAuthConfig {
    if let Some(v) = lookup("UNDERWOOD_OAUTH_CLIENT_ID") {
        config.client_id = v;
    }
    if let Some(v) = lookup("UNDERWOOD_OAUTH_CLIENT_SECRET") {
        config.client_secret = Some(Secret::new(v));
    }
    if let Some(v) = lookup("UNDERWOOD_OAUTH_REDIRECT_URI") {
        config.redirect_uri = v;
    }
    config
}
