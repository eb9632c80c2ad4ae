//! # oil-auth
//!
//! Bearer token verification for the oil resource API.
//!
//! Tokens are verified against the public keys published at a JWKS endpoint
//! (for example a Keycloak realm's `protocol/openid-connect/certs`).
//!
//! ## Features
//!
//! - Signature verification with RSA, EC and Ed25519 keys, cross-checked
//!   against the key's own type and declared algorithm
//! - JWKS caching with a TTL and a single refresh when a key ID is unknown
//! - Expiry and not-before validation with clock skew tolerance
//! - Optional issuer and audience validation
//! - Keycloak realm and client role checks
//! - Configuration from environment variables or OpenID discovery
//!
//! ## Example
//!
//! ```rust,no_run
//! use oil_auth::authorize::{authenticate, require_role};
//! use oil_auth::{JwtVerifier, JwtVerifierConfig};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = JwtVerifierConfig::new(
//!         "http://localhost:8080/realms/master/protocol/openid-connect/certs",
//!     )
//!     .with_issuer("http://localhost:8080/realms/master")
//!     .with_cache_ttl(Duration::from_secs(1800));
//!
//!     let verifier = JwtVerifier::new(config)?;
//!
//!     let header = Some("Bearer eyJhbGciOiJSUzI1NiIsInR5cCI6IkpXVCJ9...");
//!     match authenticate(&verifier, header).await {
//!         Ok(claims) => {
//!             require_role(&claims, "oil-writer")?;
//!             println!("Subject: {:?}", claims.sub);
//!         }
//!         Err(e) => eprintln!("{} {}", e.status_code(), e.public_message()),
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod authorize;
mod claims;
mod config;
mod error;
mod fetcher;
mod jwks_cache;
mod token;
mod verifier;

// Re-exports for public API
pub use claims::Audience;
pub use claims::Claims;
pub use config::JwtVerifierConfig;
pub use config::ENV_AUDIENCE;
pub use config::ENV_CACHE_TTL_SECONDS;
pub use config::ENV_CLOCK_SKEW_SECONDS;
pub use config::ENV_FETCH_TIMEOUT_SECONDS;
pub use config::ENV_ISSUER;
pub use config::ENV_JWKS_URI;
pub use error::ConfigError;
pub use error::Error;
pub use error::FetchError;
pub use error::Result;
pub use fetcher::discover_provider;
pub use fetcher::DiscoveredProvider;
pub use fetcher::FetchJwks;
pub use fetcher::HttpJwksFetcher;
pub use fetcher::MAX_JWKS_BYTES;
pub use token::redact_token;
pub use token::MAX_TOKEN_BYTES;
pub use verifier::JwtVerifier;
pub use verifier::VerifyJwt;
