use std::time::Duration;

use async_trait::async_trait;
use jsonwebtoken::jwk::Jwk;
use jsonwebtoken::jwk::JwkSet;
use reqwest::header::ACCEPT;
use reqwest::Client;
use reqwest::Response;
use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use crate::error::discovery_error;
use crate::error::ConfigError;
use crate::error::FetchError;

/// Retrieves a key set from a JWKS endpoint.
///
/// The verifier only depends on this trait, so tests and alternative
/// transports can hand it a fixed key set instead of a network client.
#[async_trait]
pub trait FetchJwks: Send + Sync {
    /// Retrieve the current key set published at `jwks_uri`
    async fn fetch(&self, jwks_uri: &str) -> Result<JwkSet, FetchError>;
}

/// Fetches key sets over HTTP with a per-request timeout
#[derive(Debug, Clone)]
pub struct HttpJwksFetcher {
    client: Client,
    timeout: Duration,
}

/// Largest JWKS document that is read into memory.
pub const MAX_JWKS_BYTES: usize = 1024 * 1024;

impl HttpJwksFetcher {
    /// Fetcher using `client`, bounding every request by `timeout`
    pub fn new(client: Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }
}

#[async_trait]
impl FetchJwks for HttpJwksFetcher {
    async fn fetch(&self, jwks_uri: &str) -> Result<JwkSet, FetchError> {
        let response = self
            .client
            .get(jwks_uri)
            .header(ACCEPT, "application/json")
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| transport_error(e, self.timeout))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let body = read_capped(response, MAX_JWKS_BYTES, self.timeout).await?;

        parse_jwk_set(&body)
    }
}

/// Read the response body, refusing anything over `limit` bytes.
async fn read_capped(
    mut response: Response,
    limit: usize,
    timeout: Duration,
) -> Result<Vec<u8>, FetchError> {
    let too_large = || FetchError::InvalidBody(format!("body exceeds {limit} bytes"));

    if response
        .content_length()
        .is_some_and(|length| length > limit as u64)
    {
        return Err(too_large());
    }

    let mut body = Vec::new();
    while let Some(chunk) = response
        .chunk()
        .await
        .map_err(|e| transport_error(e, timeout))?
    {
        if body.len() + chunk.len() > limit {
            return Err(too_large());
        }
        body.extend_from_slice(&chunk);
    }

    Ok(body)
}

#[derive(Deserialize)]
struct RawJwkSet {
    keys: Vec<Value>,
}

/// Parse a JWKS document key by key.
///
/// Keys that cannot be represented (unsupported `kty` or curve, missing
/// parameters) are skipped so the remaining keys stay usable.
pub(crate) fn parse_jwk_set(body: &[u8]) -> Result<JwkSet, FetchError> {
    let raw: RawJwkSet =
        serde_json::from_slice(body).map_err(|e| FetchError::InvalidBody(e.to_string()))?;

    let keys = raw
        .keys
        .into_iter()
        .filter_map(|value| {
            let kid = value.get("kid").and_then(Value::as_str).map(str::to_string);
            match serde_json::from_value::<Jwk>(value) {
                Ok(jwk) => Some(jwk),
                Err(e) => {
                    warn!(kid = ?kid, error = %e, "Skipping unsupported JWK");
                    None
                }
            }
        })
        .collect();

    Ok(JwkSet { keys })
}

fn transport_error(error: reqwest::Error, timeout: Duration) -> FetchError {
    if error.is_timeout() {
        FetchError::Timeout(timeout)
    } else {
        FetchError::Transport(error)
    }
}

#[derive(Debug, Deserialize)]
struct OpenIdConfig {
    issuer: String,
    jwks_uri: String,
}

/// Issuer and JWKS URI advertised by an OpenID provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredProvider {
    /// Issuer as advertised by the provider
    pub issuer: String,
    /// Endpoint publishing the provider's signing keys
    pub jwks_uri: String,
}

/// Read the provider metadata at `{issuer}/.well-known/openid-configuration`,
/// giving up after `timeout`.
///
/// # Errors
/// Returns `ConfigError::Discovery` if the document cannot be fetched or parsed,
/// or if it advertises an issuer other than the one requested.
pub async fn discover_provider(
    client: &Client,
    issuer: &str,
    timeout: Duration,
) -> Result<DiscoveredProvider, ConfigError> {
    let issuer = issuer.trim_end_matches('/');
    let openid_url = format!("{issuer}/.well-known/openid-configuration");

    let OpenIdConfig {
        issuer: advertised,
        jwks_uri,
    } = client
        .get(&openid_url)
        .header(ACCEPT, "application/json")
        .timeout(timeout)
        .send()
        .await
        .map_err(discovery_error)?
        .error_for_status()
        .map_err(discovery_error)?
        .json()
        .await
        .map_err(discovery_error)?;

    if advertised.trim_end_matches('/') != issuer {
        return Err(ConfigError::Discovery(format!(
            "provider advertises issuer {advertised}, expected {issuer}"
        )));
    }

    Ok(DiscoveredProvider {
        issuer: advertised,
        jwks_uri,
    })
}
