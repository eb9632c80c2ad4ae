use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use jsonwebtoken::decode;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::jwk::AlgorithmParameters;
use jsonwebtoken::jwk::EllipticCurve;
use jsonwebtoken::jwk::Jwk;
use jsonwebtoken::Algorithm;
use jsonwebtoken::DecodingKey;
use jsonwebtoken::Validation;
use reqwest::Client;
use tracing::debug;
use tracing::instrument;

use crate::claims::Claims;
use crate::config::JwtVerifierConfig;
use crate::error::ConfigError;
use crate::error::Error;
use crate::error::Result;
use crate::fetcher::FetchJwks;
use crate::fetcher::HttpJwksFetcher;
use crate::jwks_cache::JwksCache;
use crate::token::parse_unverified;
use crate::token::redact_token;

/// Trait for JWT verification
#[async_trait]
pub trait VerifyJwt: Send + Sync {
    /// Verify a bearer token and return its decoded claims
    async fn verify(&self, token: &str) -> Result<Claims>;
}

/// JWT verifier backed by a cached JWKS
pub struct JwtVerifier {
    jwks_cache: JwksCache,
    expected_issuer: Option<String>,
    expected_audiences: Vec<String>,
    clock_skew_secs: i64,
}

impl JwtVerifier {
    /// Create a verifier that fetches keys over HTTP.
    ///
    /// # Errors
    /// Returns `ConfigError::HttpClient` if the default HTTP client cannot be built.
    pub fn new(config: JwtVerifierConfig) -> std::result::Result<Self, ConfigError> {
        let client = match config.http_client.clone() {
            Some(client) => client,
            None => Client::builder()
                .timeout(config.fetch_timeout)
                .build()
                .map_err(ConfigError::HttpClient)?,
        };
        let fetcher = HttpJwksFetcher::new(client, config.fetch_timeout);

        Ok(Self::with_fetcher(config, Arc::new(fetcher)))
    }

    /// Create a verifier that obtains key sets from the given fetcher
    pub fn with_fetcher(config: JwtVerifierConfig, fetcher: Arc<dyn FetchJwks>) -> Self {
        Self {
            jwks_cache: JwksCache::new(
                config.jwks_uri,
                config.jwks_cache_ttl,
                config.fetch_timeout,
                fetcher,
            ),
            expected_issuer: config.expected_issuer,
            expected_audiences: config.expected_audiences,
            clock_skew_secs: i64::try_from(config.clock_skew.as_secs()).unwrap_or(i64::MAX),
        }
    }

    /// Create a verifier configured from environment variables.
    ///
    /// # Errors
    /// Returns `ConfigError` if the environment is incomplete or invalid.
    pub fn from_env() -> std::result::Result<Self, ConfigError> {
        Self::new(JwtVerifierConfig::from_env()?)
    }

    /// Load the key set ahead of the first request.
    ///
    /// # Errors
    /// Returns `Error::KeyFetchFailure` if the JWKS endpoint is unavailable.
    pub async fn prefetch(&self) -> Result<()> {
        self.jwks_cache.prefetch().await
    }

    /// Key IDs currently held in the cache, sorted
    pub async fn cached_key_ids(&self) -> Vec<String> {
        self.jwks_cache.key_ids().await
    }

    async fn verify_token(&self, token: &str) -> Result<Claims> {
        let unverified = parse_unverified(token)?;
        let jwk = self.jwks_cache.get_key(&unverified.kid).await?;

        verify_signature(token, unverified.header.alg, &jwk)?;

        // The payload is authentic from here on
        let claims = unverified.claims;
        self.validate_claims(&claims, Utc::now().timestamp())?;

        Ok(claims)
    }

    /// Check time, issuer and audience claims, stopping at the first failure
    fn validate_claims(&self, claims: &Claims, now: i64) -> Result<()> {
        if claims.exp <= now.saturating_sub(self.clock_skew_secs) {
            return Err(Error::Expired);
        }

        if let Some(nbf) = claims.nbf {
            if nbf > now.saturating_add(self.clock_skew_secs) {
                return Err(Error::NotYetValid);
            }
        }

        if let Some(expected) = &self.expected_issuer {
            if claims.iss.as_deref() != Some(expected.as_str()) {
                return Err(Error::IssuerMismatch);
            }
        }

        if !self.expected_audiences.is_empty() {
            let matches = claims.aud.as_ref().is_some_and(|aud| {
                self.expected_audiences
                    .iter()
                    .any(|expected| aud.contains(expected))
            });
            if !matches {
                return Err(Error::AudienceMismatch);
            }
        }

        Ok(())
    }
}

#[async_trait]
impl VerifyJwt for JwtVerifier {
    #[instrument(skip_all)]
    async fn verify(&self, token: &str) -> Result<Claims> {
        let result = self.verify_token(token).await;

        match &result {
            Ok(claims) => debug!(sub = ?claims.sub, "Token verified"),
            Err(error) => debug!(
                reason = error.kind(),
                token = %redact_token(token),
                "Token rejected"
            ),
        }

        result
    }
}

/// Verify the signature with `alg` taken from the header, but only after
/// checking that the key was published for that algorithm.
fn verify_signature(token: &str, alg: Algorithm, jwk: &Jwk) -> Result<()> {
    if !algorithm_fits_key(alg, jwk) {
        debug!(?alg, "Token algorithm does not fit the resolved key");
        return Err(Error::SignatureMismatch);
    }

    let decoding_key = DecodingKey::from_jwk(jwk).map_err(|e| {
        debug!(error = %e, "Resolved JWK cannot be used as a decoding key");
        Error::SignatureMismatch
    })?;

    // Time, issuer and audience are checked separately so each failure keeps its own reason
    let mut validation = Validation::new(alg);
    validation.required_spec_claims.clear();
    validation.validate_exp = false;
    validation.validate_nbf = false;
    validation.validate_aud = false;

    decode::<serde_json::Value>(token, &decoding_key, &validation)
        .map(|_| ())
        .map_err(|e| match e.kind() {
            ErrorKind::InvalidToken | ErrorKind::Base64(_) | ErrorKind::Json(_) | ErrorKind::Utf8(_) => {
                Error::malformed(e.to_string())
            }
            _ => Error::SignatureMismatch,
        })
}

/// Whether a key may verify signatures made with `alg`.
///
/// The key type decides the algorithm family, and an `alg` published with the
/// key pins the exact algorithm. Symmetric keys are never accepted from a JWKS.
fn algorithm_fits_key(alg: Algorithm, jwk: &Jwk) -> bool {
    let family_matches = match &jwk.algorithm {
        AlgorithmParameters::RSA(_) => matches!(
            alg,
            Algorithm::RS256
                | Algorithm::RS384
                | Algorithm::RS512
                | Algorithm::PS256
                | Algorithm::PS384
                | Algorithm::PS512
        ),
        AlgorithmParameters::EllipticCurve(params) => matches!(
            (alg, &params.curve),
            (Algorithm::ES256, EllipticCurve::P256) | (Algorithm::ES384, EllipticCurve::P384)
        ),
        AlgorithmParameters::OctetKeyPair(params) => {
            alg == Algorithm::EdDSA && params.curve == EllipticCurve::Ed25519
        }
        _ => false,
    };

    family_matches && declared_algorithm_matches(alg, jwk)
}

fn declared_algorithm_matches(alg: Algorithm, jwk: &Jwk) -> bool {
    let Some(declared) = &jwk.common.key_algorithm else {
        return true;
    };

    // Encryption algorithms such as RSA-OAEP do not parse as a signing algorithm
    match serde_json::to_value(declared) {
        Ok(serde_json::Value::String(name)) => name.parse::<Algorithm>().is_ok_and(|d| d == alg),
        _ => false,
    }
}
