use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Reasons a bearer token is rejected.
///
/// Messages are meant for logs. None of them carry key material, and callers
/// should not forward them to untrusted clients verbatim.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Malformed token: {0}")]
    MalformedToken(String),
    #[error("The key ID of the provided JWT is not present in the JWKS")]
    UnknownKeyId,
    #[error("Signature of the provided JWT could not be verified")]
    SignatureMismatch,
    #[error("The provided JWT has expired")]
    Expired,
    #[error("The provided JWT is not valid yet")]
    NotYetValid,
    #[error("The provided JWT does not match the expected issuer")]
    IssuerMismatch,
    #[error("The provided JWT does not carry any of the expected audiences")]
    AudienceMismatch,
    #[error("Signing keys unavailable: {0}")]
    KeyFetchFailure(#[from] FetchError),
}

impl Error {
    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedToken(reason.into())
    }

    /// Short, stable label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MalformedToken(_) => "malformed_token",
            Self::UnknownKeyId => "unknown_key_id",
            Self::SignatureMismatch => "signature_mismatch",
            Self::Expired => "expired",
            Self::NotYetValid => "not_yet_valid",
            Self::IssuerMismatch => "issuer_mismatch",
            Self::AudienceMismatch => "audience_mismatch",
            Self::KeyFetchFailure(_) => "key_fetch_failure",
        }
    }

    /// HTTP status the calling layer should answer with.
    ///
    /// A key fetch failure is an unavailable dependency rather than a bad
    /// credential, so it maps to 503 instead of 401.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::KeyFetchFailure(_) => 503,
            _ => 401,
        }
    }

    /// Whether a retry of the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::KeyFetchFailure(_))
    }
}

/// Failure to retrieve a key set from the JWKS endpoint.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("request to JWKS endpoint failed: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("JWKS endpoint did not answer within {0:?}")]
    Timeout(std::time::Duration),
    #[error("JWKS endpoint returned HTTP {0}")]
    Status(u16),
    #[error("JWKS body could not be parsed: {0}")]
    InvalidBody(String),
}

/// Invalid or incomplete verifier configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(&'static str),
    #[error("Invalid value for {name}: {reason}")]
    InvalidValue { name: &'static str, reason: String },
    #[error("Failed to build HTTP client: {0}")]
    HttpClient(#[source] reqwest::Error),
    #[error("OpenID discovery failed: {0}")]
    Discovery(String),
}

pub(crate) fn discovery_error(error: reqwest::Error) -> ConfigError {
    ConfigError::Discovery(format!("Failed to fetch OpenID config: {error}"))
}
