use std::collections::HashMap;
use std::env;
use std::time::Duration;

use reqwest::Client;
use reqwest::Url;

use crate::error::ConfigError;
use crate::fetcher::discover_provider;

/// Environment variables read by [`JwtVerifierConfig::from_env`]
pub const ENV_JWKS_URI: &str = "JWKS_URI";
pub const ENV_ISSUER: &str = "JWT_ISSUER";
pub const ENV_AUDIENCE: &str = "JWT_AUDIENCE";
pub const ENV_CLOCK_SKEW_SECONDS: &str = "JWT_CLOCK_SKEW_SECONDS";
pub const ENV_CACHE_TTL_SECONDS: &str = "JWKS_CACHE_TTL_SECONDS";
pub const ENV_FETCH_TIMEOUT_SECONDS: &str = "JWKS_FETCH_TIMEOUT_SECONDS";

const DEFAULT_JWKS_CACHE_TTL_SECS: u64 = 3600;
const DEFAULT_CLOCK_SKEW_SECS: u64 = 60;
const MAX_CLOCK_SKEW_SECS: u64 = 600;
const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 10;
const MIN_JWKS_CACHE_TTL: Duration = Duration::from_millis(100);

/// Configuration for the JWT verifier
#[derive(Debug, Clone)]
pub struct JwtVerifierConfig {
    /// Endpoint publishing the signing keys
    pub(crate) jwks_uri: String,
    /// Expected issuer; issuer validation is skipped when unset
    pub(crate) expected_issuer: Option<String>,
    /// Expected audiences; the token must carry at least one of them.
    /// Audience validation is skipped when empty
    pub(crate) expected_audiences: Vec<String>,
    /// Tolerance applied to `exp` and `nbf` (default: 60 seconds)
    pub(crate) clock_skew: Duration,
    /// Time-to-live for cached JWKS (default: 1 hour)
    pub(crate) jwks_cache_ttl: Duration,
    /// Upper bound for a single JWKS fetch (default: 10 seconds)
    pub(crate) fetch_timeout: Duration,
    /// Optional custom HTTP client for fetching JWKS
    /// If not provided, a default client will be created
    pub(crate) http_client: Option<Client>,
}

impl JwtVerifierConfig {
    /// Create a configuration that fetches keys from `jwks_uri`, with issuer and
    /// audience validation disabled
    pub fn new(jwks_uri: impl Into<String>) -> Self {
        Self {
            jwks_uri: jwks_uri.into(),
            expected_issuer: None,
            expected_audiences: Vec::new(),
            clock_skew: Duration::from_secs(DEFAULT_CLOCK_SKEW_SECS),
            jwks_cache_ttl: Duration::from_secs(DEFAULT_JWKS_CACHE_TTL_SECS),
            fetch_timeout: Duration::from_secs(DEFAULT_FETCH_TIMEOUT_SECS),
            http_client: None,
        }
    }

    /// Build a configuration from the provider's OpenID discovery document.
    ///
    /// The advertised JWKS URI is used and the issuer is enforced.
    ///
    /// # Errors
    /// Returns `ConfigError::Discovery` if the discovery document is unavailable.
    pub async fn discover(issuer: impl Into<String>) -> Result<Self, ConfigError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(DEFAULT_FETCH_TIMEOUT_SECS))
            .build()
            .map_err(ConfigError::HttpClient)?;

        Self::discover_with_client(issuer, client).await
    }

    /// Same as [`discover`](Self::discover), reusing the given client for key fetches too
    ///
    /// # Errors
    /// Returns `ConfigError::Discovery` if the discovery document is unavailable.
    pub async fn discover_with_client(
        issuer: impl Into<String>,
        client: Client,
    ) -> Result<Self, ConfigError> {
        let timeout = Duration::from_secs(DEFAULT_FETCH_TIMEOUT_SECS);
        let provider = discover_provider(&client, &issuer.into(), timeout).await?;

        Ok(Self::new(provider.jwks_uri)
            .with_issuer(provider.issuer)
            .with_http_client(client))
    }

    /// Load configuration from environment variables.
    ///
    /// # Errors
    /// Returns `ConfigError` if `JWKS_URI` is missing or any value is invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a map of variables.
    ///
    /// # Errors
    /// Returns `ConfigError` if `JWKS_URI` is missing or any value is invalid.
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let jwks_uri = non_empty(vars, ENV_JWKS_URI).ok_or(ConfigError::MissingEnvVar(ENV_JWKS_URI))?;
        Url::parse(jwks_uri).map_err(|e| ConfigError::InvalidValue {
            name: ENV_JWKS_URI,
            reason: e.to_string(),
        })?;

        let mut config = Self::new(jwks_uri);

        if let Some(issuer) = non_empty(vars, ENV_ISSUER) {
            config = config.with_issuer(issuer);
        }

        if let Some(audiences) = non_empty(vars, ENV_AUDIENCE) {
            config.expected_audiences = audiences
                .split(',')
                .map(str::trim)
                .filter(|audience| !audience.is_empty())
                .map(str::to_string)
                .collect();

            if config.expected_audiences.is_empty() {
                return Err(ConfigError::InvalidValue {
                    name: ENV_AUDIENCE,
                    reason: format!("no audience in '{audiences}'"),
                });
            }
        }

        if let Some(skew) = parse_seconds(vars, ENV_CLOCK_SKEW_SECONDS)? {
            if skew > MAX_CLOCK_SKEW_SECS {
                return Err(ConfigError::InvalidValue {
                    name: ENV_CLOCK_SKEW_SECONDS,
                    reason: format!("must not exceed {MAX_CLOCK_SKEW_SECS} seconds, got {skew}"),
                });
            }
            config.clock_skew = Duration::from_secs(skew);
        }

        if let Some(ttl) = parse_positive_seconds(vars, ENV_CACHE_TTL_SECONDS)? {
            config.jwks_cache_ttl = ttl;
        }

        if let Some(timeout) = parse_positive_seconds(vars, ENV_FETCH_TIMEOUT_SECONDS)? {
            config.fetch_timeout = timeout;
        }

        Ok(config)
    }

    /// Require tokens to carry exactly this `iss`
    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.expected_issuer = Some(issuer.into());
        self
    }

    /// Add a single expected audience
    pub fn with_audience(mut self, audience: impl Into<String>) -> Self {
        self.expected_audiences.push(audience.into());
        self
    }

    /// Replace the expected audiences; an empty list disables audience validation
    pub fn with_audiences(mut self, audiences: Vec<String>) -> Self {
        self.expected_audiences = audiences;
        self
    }

    /// Set the clock skew tolerance for time-based claims
    pub fn with_clock_skew(mut self, skew: Duration) -> Self {
        self.clock_skew = skew;
        self
    }

    /// Set the JWKS cache TTL, raised to at least 100 ms so a fetched key set
    /// is reused at all
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.jwks_cache_ttl = ttl.max(MIN_JWKS_CACHE_TTL);
        self
    }

    /// Set the timeout for a single JWKS fetch
    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    /// Set a custom HTTP client
    pub fn with_http_client(mut self, client: Client) -> Self {
        self.http_client = Some(client);
        self
    }

    /// Endpoint the signing keys are fetched from
    pub fn jwks_uri(&self) -> &str {
        &self.jwks_uri
    }

    /// Issuer tokens must carry, if enforced
    pub fn expected_issuer(&self) -> Option<&str> {
        self.expected_issuer.as_deref()
    }

    /// Audiences of which a token must carry at least one; empty when not enforced
    pub fn expected_audiences(&self) -> &[String] {
        &self.expected_audiences
    }
}

fn non_empty<'a>(vars: &'a HashMap<String, String>, name: &str) -> Option<&'a str> {
    vars.get(name)
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
}

fn parse_seconds(
    vars: &HashMap<String, String>,
    name: &'static str,
) -> Result<Option<u64>, ConfigError> {
    non_empty(vars, name)
        .map(|value| {
            value.parse::<u64>().map_err(|e| ConfigError::InvalidValue {
                name,
                reason: format!("must be a whole number of seconds, got '{value}': {e}"),
            })
        })
        .transpose()
}

fn parse_positive_seconds(
    vars: &HashMap<String, String>,
    name: &'static str,
) -> Result<Option<Duration>, ConfigError> {
    match parse_seconds(vars, name)? {
        Some(0) => Err(ConfigError::InvalidValue {
            name,
            reason: "must be greater than zero".to_string(),
        }),
        other => Ok(other.map(Duration::from_secs)),
    }
}
