use {
    async_trait::async_trait,
    secrecy::{ExposeSecret, Secret},
    tracing::{debug, info},
    url::Url,
};

use crate::{
    Error, Result,
    pkce::{generate_pkce, generate_state},
    types::{Credential, OAuthConfig, PkceChallenge, Profile, unix_now},
};

/// Token lifecycle operations against the identity provider.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Build a consent URL with fresh PKCE and state values.
    fn start(&self) -> Result<AuthorizationRequest>;

    async fn exchange(&self, code: &str, verifier: &str) -> Result<Credential>;

    async fn refresh(&self, credential: &Credential) -> Result<Credential>;

    async fn revoke(&self, credential: &Credential) -> Result<()>;

    async fn fetch_profile(&self, credential: &Credential) -> Result<Profile>;
}

/// Manages the OAuth 2.0 authorization code flow with PKCE.
pub struct OAuthFlow {
    config: OAuthConfig,
    client: reqwest::Client,
}

/// Result of starting the OAuth flow.
pub struct AuthorizationRequest {
    pub url: String,
    pub pkce: PkceChallenge,
    pub state: String,
}

impl OAuthFlow {
    pub fn new(config: OAuthConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    pub fn config(&self) -> &OAuthConfig {
        &self.config
    }

    fn client_form(&self) -> Vec<(String, String)> {
        let mut form = vec![("client_id".to_string(), self.config.client_id.clone())];
        if let Some(secret) = &self.config.client_secret {
            form.push((
                "client_secret".to_string(),
                secret.expose_secret().clone(),
            ));
        }
        form
    }

    async fn token_request(&self, form: &[(String, String)]) -> Result<serde_json::Value> {
        Ok(self
            .client
            .post(&self.config.token_url)
            .form(form)
            .send()
            .await?
            .error_for_status()?
            .json::<serde_json::Value>()
            .await?)
    }
}

#[async_trait]
impl AuthProvider for OAuthFlow {
    fn start(&self) -> Result<AuthorizationRequest> {
        let pkce = generate_pkce();
        let state = generate_state();

        let mut url = Url::parse(&self.config.auth_url)
            .map_err(|source| Error::external(format!("invalid auth_url: {source}"), source))?;
        url.query_pairs_mut()
            .append_pair("response_type", "code")
            .append_pair("client_id", &self.config.client_id)
            .append_pair("redirect_uri", &self.config.redirect_uri)
            .append_pair("code_challenge", &pkce.challenge)
            .append_pair("code_challenge_method", "S256")
            .append_pair("state", &state);

        if !self.config.scopes.is_empty() {
            url.query_pairs_mut()
                .append_pair("scope", &self.config.scopes.join(" "));
        }

        for (key, value) in &self.config.extra_auth_params {
            url.query_pairs_mut().append_pair(key, value);
        }

        Ok(AuthorizationRequest {
            url: url.to_string(),
            pkce,
            state,
        })
    }

    async fn exchange(&self, code: &str, verifier: &str) -> Result<Credential> {
        let mut form = vec![
            ("grant_type".to_string(), "authorization_code".to_string()),
            ("code".to_string(), code.to_string()),
            ("redirect_uri".to_string(), self.config.redirect_uri.clone()),
            ("code_verifier".to_string(), verifier.to_string()),
        ];
        form.extend(self.client_form());

        let resp = self.token_request(&form).await?;
        info!("authorization code exchanged");
        parse_token_response(&resp, None)
    }

    async fn refresh(&self, credential: &Credential) -> Result<Credential> {
        let refresh_token = credential
            .refresh_token
            .as_ref()
            .ok_or_else(|| Error::message("credential has no refresh token"))?;
        let mut form = vec![
            ("grant_type".to_string(), "refresh_token".to_string()),
            (
                "refresh_token".to_string(),
                refresh_token.expose_secret().clone(),
            ),
        ];
        form.extend(self.client_form());

        let resp = self.token_request(&form).await?;
        info!("access token refreshed");
        parse_token_response(&resp, Some(refresh_token))
    }

    async fn revoke(&self, credential: &Credential) -> Result<()> {
        let mut url = Url::parse(&self.config.revoke_url)?;
        url.query_pairs_mut()
            .append_pair("token", credential.access_token.expose_secret());
        self.client
            .post(url)
            .header(
                reqwest::header::CONTENT_TYPE,
                "application/x-www-form-urlencoded",
            )
            .send()
            .await?
            .error_for_status()?;
        info!("credential revoked");
        Ok(())
    }

    async fn fetch_profile(&self, credential: &Credential) -> Result<Profile> {
        let resp = self
            .client
            .get(&self.config.profile_url)
            .bearer_auth(credential.access_token.expose_secret())
            .send()
            .await?
            .error_for_status()?
            .json::<serde_json::Value>()
            .await?;
        let profile = parse_profile(&resp);
        debug!(has_name = profile.given_name.is_some(), "profile fetched");
        Ok(profile)
    }
}

/// Parse a token endpoint response.
///
/// Refresh responses usually omit `refresh_token`; `previous` is kept then.
fn parse_token_response(
    resp: &serde_json::Value,
    previous: Option<&Secret<String>>,
) -> Result<Credential> {
    let access_token = resp["access_token"]
        .as_str()
        .ok_or_else(|| Error::message("missing access_token in response"))?
        .to_string();

    let refresh_token = resp["refresh_token"]
        .as_str()
        .map(|s| Secret::new(s.to_string()))
        .or_else(|| previous.cloned());

    let expires_at = resp["expires_in"]
        .as_u64()
        .map(|secs| unix_now().saturating_add(secs));

    Ok(Credential {
        access_token: Secret::new(access_token),
        refresh_token,
        expires_at,
    })
}

/// Pick the primary name entry from a People API `people/me` response.
fn parse_profile(resp: &serde_json::Value) -> Profile {
    let names = resp["names"].as_array();
    let entry = names.and_then(|names| {
        names
            .iter()
            .find(|n| n["metadata"]["primary"].as_bool() == Some(true))
            .or_else(|| names.first())
    });
    let field = |key: &str| {
        entry
            .and_then(|n| n[key].as_str())
            .filter(|s| !s.trim().is_empty())
            .map(ToString::to_string)
    };
    Profile {
        given_name: field("givenName"),
        family_name: field("familyName"),
    }
}
