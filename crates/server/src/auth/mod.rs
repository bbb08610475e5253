use crate::protocol::HandshakeRequest;
use thiserror::Error;

mod credentials;
pub use credentials::{default_credentials, parse_credentials, Credential, CredentialError};

/// Authentication configuration driven by environment variables.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub credentials: Vec<Credential>,
}

impl AuthConfig {
    pub fn from_lookup<F>(lookup: F) -> Result<Self, CredentialError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let credentials = match lookup("CAMPUS_RELAY_CREDENTIALS") {
            Some(value) => parse_credentials(&value)?,
            None => default_credentials(),
        };
        Ok(Self { credentials })
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            credentials: default_credentials(),
        }
    }
}

/// Errors that can occur during authentication.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("invalid credentials for campus {campus}")]
    InvalidCredentials { campus: String },
}

/// Checks handshake credentials against the static table.
#[derive(Debug, Clone)]
pub struct Authenticator {
    config: AuthConfig,
}

impl Authenticator {
    pub fn new(config: AuthConfig) -> Self {
        Self { config }
    }

    /// Exact, case-sensitive match on both campus and password.
    pub fn authenticate(&self, campus: &str, password: &str) -> bool {
        self.config
            .credentials
            .iter()
            .any(|cred| cred.campus == campus && cred.password == password)
    }

    pub fn verify_handshake(&self, handshake: &HandshakeRequest) -> Result<(), AuthError> {
        if self.authenticate(&handshake.identity.campus, &handshake.password) {
            Ok(())
        } else {
            Err(AuthError::InvalidCredentials {
                campus: handshake.identity.campus.clone(),
            })
        }
    }
}
