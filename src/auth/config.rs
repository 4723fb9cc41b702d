use base64::{engine::general_purpose::URL_SAFE, Engine as _};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;

use crate::error::SessionError;

/// Key under which credentials for the official index are stored.
pub const OFFICIAL_INDEX_KEY: &str = "https://index.docker.io/v1/";

/// Header carrying the encoded [`AuthConfig`] on privileged requests.
pub const REGISTRY_AUTH_HEADER: &str = "X-Registry-Auth";

const OFFICIAL_INDEX_NAME: &str = "docker.io";

/// Registry endpoint that credentials are resolved against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexInfo {
    pub name: String,
    pub official: bool,
}

impl IndexInfo {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let official = name == OFFICIAL_INDEX_NAME || name == "index.docker.io";
        Self { name, official }
    }

    pub fn official() -> Self {
        Self {
            name: OFFICIAL_INDEX_NAME.to_string(),
            official: true,
        }
    }

    /// Derives the index an image reference belongs to.
    ///
    /// The first path component names a registry host when it contains a
    /// `.` or a `:` or is `localhost`; anything else lives on the official
    /// index.
    pub fn from_image(image: &str) -> Self {
        match image.split_once('/') {
            Some((host, _))
                if host.contains('.') || host.contains(':') || host == "localhost" =>
            {
                Self::new(host)
            }
            _ => Self::official(),
        }
    }
}

/// Credentials for one registry.
#[derive(Debug, Clone, Default)]
pub struct AuthConfig {
    pub username: String,
    pub password: Option<SecretString>,
    /// Pre-encoded `user:password` as stored in the credentials file
    pub auth: Option<SecretString>,
    pub email: String,
    pub server_address: String,
    pub identity_token: Option<SecretString>,
    pub registry_token: Option<SecretString>,
}

#[derive(Serialize)]
struct WireAuthConfig<'a> {
    #[serde(skip_serializing_if = "str::is_empty")]
    username: &'a str,
    #[serde(skip_serializing_if = "str::is_empty")]
    password: &'a str,
    #[serde(skip_serializing_if = "str::is_empty")]
    auth: &'a str,
    #[serde(skip_serializing_if = "str::is_empty")]
    email: &'a str,
    #[serde(rename = "serveraddress", skip_serializing_if = "str::is_empty")]
    server_address: &'a str,
    #[serde(rename = "identitytoken", skip_serializing_if = "str::is_empty")]
    identity_token: &'a str,
    #[serde(rename = "registrytoken", skip_serializing_if = "str::is_empty")]
    registry_token: &'a str,
}

fn exposed(secret: &Option<SecretString>) -> &str {
    secret
        .as_ref()
        .map(|value| value.expose_secret().as_str())
        .unwrap_or_default()
}

impl AuthConfig {
    /// Anonymous credentials for `server_address`.
    pub fn anonymous(server_address: impl Into<String>) -> Self {
        Self {
            server_address: server_address.into(),
            ..Self::default()
        }
    }

    pub fn with_password(
        username: impl Into<String>,
        password: SecretString,
        server_address: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            password: Some(password),
            server_address: server_address.into(),
            ..Self::default()
        }
    }

    /// True when no credential material is present.
    pub fn is_anonymous(&self) -> bool {
        self.username.is_empty()
            && exposed(&self.password).is_empty()
            && exposed(&self.auth).is_empty()
            && exposed(&self.identity_token).is_empty()
            && exposed(&self.registry_token).is_empty()
    }

    /// Encodes the credentials for the [`REGISTRY_AUTH_HEADER`] header:
    /// base64url of the JSON document the daemon expects.
    pub fn encode_header(&self) -> Result<String, SessionError> {
        let wire = WireAuthConfig {
            username: &self.username,
            password: exposed(&self.password),
            auth: exposed(&self.auth),
            email: &self.email,
            server_address: &self.server_address,
            identity_token: exposed(&self.identity_token),
            registry_token: exposed(&self.registry_token),
        };
        let json = serde_json::to_vec(&wire)?;
        Ok(URL_SAFE.encode(json))
    }
}
