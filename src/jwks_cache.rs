use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use std::time::Instant;

use jsonwebtoken::jwk::Jwk;
use jsonwebtoken::jwk::JwkSet;
use jsonwebtoken::jwk::PublicKeyUse;
use tokio::sync::RwLock;
use tracing::debug;
use tracing::info;
use tracing::instrument;
use tracing::warn;

use crate::error::Error;
use crate::error::FetchError;
use crate::error::Result;
use crate::fetcher::FetchJwks;

/// One generation of signing keys, indexed by key ID. Never mutated after construction.
struct CachedJwks {
    keys: HashMap<String, Jwk>,
    fetched_at: Instant,
}

impl CachedJwks {
    fn new(jwks: JwkSet) -> Self {
        let mut keys = HashMap::with_capacity(jwks.keys.len());

        for jwk in jwks.keys {
            let Some(kid) = jwk.common.key_id.clone() else {
                warn!("Skipping JWK without 'kid'");
                continue;
            };
            if matches!(jwk.common.public_key_use, Some(PublicKeyUse::Encryption)) {
                debug!(kid = %kid, "Skipping encryption JWK");
                continue;
            }
            keys.insert(kid, jwk);
        }

        Self {
            keys,
            fetched_at: Instant::now(),
        }
    }

    fn is_expired(&self, ttl: Duration) -> bool {
        self.fetched_at.elapsed() >= ttl
    }

    fn get(&self, kid: &str) -> Option<&Jwk> {
        self.keys.get(kid)
    }
}

/// Cache for the key set published at a single JWKS URI.
///
/// Readers take a snapshot of the current generation and release the lock
/// immediately. A refresh fetches and indexes the new key set without holding
/// the lock, then swaps the whole generation in one write.
pub(crate) struct JwksCache {
    current: RwLock<Option<Arc<CachedJwks>>>,
    jwks_uri: String,
    ttl: Duration,
    fetch_timeout: Duration,
    fetcher: Arc<dyn FetchJwks>,
}

impl JwksCache {
    pub(crate) fn new(
        jwks_uri: String,
        ttl: Duration,
        fetch_timeout: Duration,
        fetcher: Arc<dyn FetchJwks>,
    ) -> Self {
        Self {
            current: RwLock::new(None),
            jwks_uri,
            ttl,
            fetch_timeout,
            fetcher,
        }
    }

    /// Resolve the key with the given ID.
    ///
    /// A cold cache, an expired generation or a missing key ID causes exactly
    /// one refresh. If that refresh fails, whatever unexpired generation is
    /// current at that point is consulted before giving up.
    pub(crate) async fn get_key(&self, kid: &str) -> Result<Jwk> {
        if let Some(cached) = self.try_get_cached().await {
            if let Some(jwk) = cached.get(kid) {
                debug!(kid = %kid, "JWKS cache hit");
                return Ok(jwk.clone());
            }
            debug!(kid = %kid, "Key ID not in cached JWKS, refreshing");
        }

        match self.refresh().await {
            Ok(fresh) => fresh.get(kid).cloned().ok_or_else(|| {
                debug!(kid = %kid, "Key ID not found in JWKS after refresh");
                Error::UnknownKeyId
            }),
            Err(error) => {
                warn!(kid = %kid, error = %error, "JWKS refresh failed");

                // A concurrent refresh may have installed a usable generation meanwhile
                self.try_get_cached()
                    .await
                    .and_then(|cached| cached.get(kid).cloned())
                    .ok_or(Error::KeyFetchFailure(error))
            }
        }
    }

    /// Fetch the key set unconditionally and install it as the current generation.
    pub(crate) async fn prefetch(&self) -> Result<()> {
        self.refresh().await?;
        Ok(())
    }

    /// Key IDs of the current generation, expired or not.
    pub(crate) async fn key_ids(&self) -> Vec<String> {
        let cache = self.current.read().await;
        let mut ids: Vec<String> = cache
            .as_ref()
            .map(|cached| cached.keys.keys().cloned().collect())
            .unwrap_or_default();
        ids.sort();
        ids
    }

    /// Current generation if present and within its TTL
    async fn try_get_cached(&self) -> Option<Arc<CachedJwks>> {
        let cache = self.current.read().await;
        let cached = cache.as_ref()?;

        if cached.is_expired(self.ttl) {
            return None;
        }

        Some(Arc::clone(cached))
    }

    #[instrument(skip(self), fields(jwks_uri = %self.jwks_uri))]
    async fn refresh(&self) -> std::result::Result<Arc<CachedJwks>, FetchError> {
        let jwks = tokio::time::timeout(self.fetch_timeout, self.fetcher.fetch(&self.jwks_uri))
            .await
            .map_err(|_| FetchError::Timeout(self.fetch_timeout))??;

        let fresh = Arc::new(CachedJwks::new(jwks));

        let mut cache = self.current.write().await;
        *cache = Some(Arc::clone(&fresh));
        drop(cache);

        info!(key_count = fresh.keys.len(), "JWKS cache refreshed");

        Ok(fresh)
    }
}
