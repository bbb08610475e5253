use thiserror::Error;

/// A campus and the password its endpoints authenticate with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    pub campus: String,
    pub password: String,
}

impl Credential {
    pub fn new(campus: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            campus: campus.into(),
            password: password.into(),
        }
    }
}

/// Errors raised while reading a credential list.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CredentialError {
    #[error("credential entry `{0}` is not of the form campus=password")]
    MissingSeparator(String),
    #[error("credential entry `{0}` has an empty campus")]
    EmptyCampus(String),
}

/// Built-in table used when no override is configured.
pub fn default_credentials() -> Vec<Credential> {
    vec![
        Credential::new("Lahore", "NU-LHR-123"),
        Credential::new("Karachi", "NU-KHI-123"),
        Credential::new("Peshawar", "NU-PSH-123"),
        Credential::new("CFD", "NU-CFD-123"),
        Credential::new("Multan", "NU-MTN-123"),
    ]
}

/// Parses `Campus=password,Campus2=password2`. Blank entries are skipped.
pub fn parse_credentials(value: &str) -> Result<Vec<Credential>, CredentialError> {
    value
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let (campus, password) = entry
                .split_once('=')
                .ok_or_else(|| CredentialError::MissingSeparator(entry.to_string()))?;
            let campus = campus.trim();
            if campus.is_empty() {
                return Err(CredentialError::EmptyCampus(entry.to_string()));
            }
            Ok(Credential::new(campus, password.trim()))
        })
        .collect()
}
