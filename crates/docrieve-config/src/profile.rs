//! Configuration profiles for different environments

/// Deployment profiles. Only `Development` has any effect today (it is
/// the default when `DOCRIEVE_PROFILE` is unset); the others exist so the
/// profile axis doesn't need a breaking enum change once a production
/// deployment wants profile-specific defaults (e.g. smaller worker pools
/// in `Test`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[allow(clippy::derive_partial_eq_without_eq)]
pub enum Profile {
    #[serde(rename = "development")]
    Development,
    #[serde(rename = "staging")]
    Staging,
    #[serde(rename = "production")]
    Production,
    #[serde(rename = "test")]
    Test,
}

impl Default for Profile {
    fn default() -> Self {
        Self::Development
    }
}

impl std::fmt::Display for Profile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Development => "development",
            Self::Staging => "staging",
            Self::Production => "production",
            Self::Test => "test",
        };
        write!(f, "{name}")
    }
}

impl std::str::FromStr for Profile {
    type Err = crate::ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "development" | "dev" => Ok(Self::Development),
            "staging" => Ok(Self::Staging),
            "production" | "prod" => Ok(Self::Production),
            "test" => Ok(Self::Test),
            _ => Err(crate::ConfigError::MissingField {
                field: format!("invalid profile: {s}"),
            }),
        }
    }
}
