//! OAuth consent, token lifecycle and the local callback listener.

pub mod callback_server;
pub mod defaults;
pub mod error;
pub mod flow;
pub mod pkce;
pub mod storage;
pub mod tunnel;
pub mod types;

pub use {
    callback_server::CallbackServer,
    defaults::{DEFAULT_SCOPES, google_config, load_oauth_config},
    flow::{AuthProvider, AuthorizationRequest, OAuthFlow},
    storage::CredentialStore,
    tunnel::{CloudflaredTunnel, TunnelHandle, TunnelLauncher},
    types::{
        Credential, OAuthConfig, PkceChallenge, Profile, serialize_option_secret,
        serialize_secret, unix_now,
    },
};

pub use error::{Error, Result};
