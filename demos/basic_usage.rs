use oil_auth::authorize::{authenticate, require_any_role};
use oil_auth::{redact_token, JwtVerifier, JwtVerifierConfig};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Verifies the bearer token passed as the first argument.
///
/// ```text
/// JWKS_URI=http://localhost:8080/realms/master/protocol/openid-connect/certs \
/// JWT_ISSUER=http://localhost:8080/realms/master \
/// RUST_LOG=oil_auth=debug \
///     cargo run --example basic_usage -- <token>
/// ```
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let token = std::env::args().nth(1).unwrap_or_default();

    // Example 1: configuration from the environment
    println!("=== Example 1: Environment Configuration ===");
    let verifier = JwtVerifier::from_env()?;
    let header = format!("Bearer {token}");

    match authenticate(&verifier, Some(header.as_str())).await {
        Ok(claims) => {
            println!("Token {} verified", redact_token(&token));
            println!("  Subject: {:?}", claims.sub);
            println!("  Username: {:?}", claims.preferred_username());
            println!("  Roles: {:?}", claims.roles());

            match require_any_role(&claims, &["oil-reader", "oil-writer"]) {
                Ok(()) => println!("  May read oil resources"),
                Err(e) => println!("  {} {}", e.status_code(), e.public_message()),
            }
        }
        Err(e) => {
            eprintln!("Rejected ({e}): {} {}", e.status_code(), e.public_message());
        }
    }

    println!();

    // Example 2: explicit configuration with a shorter cache TTL
    println!("=== Example 2: Explicit Configuration ===");
    let config = JwtVerifierConfig::new(
        "http://localhost:8080/realms/master/protocol/openid-connect/certs",
    )
    .with_audience("oil-api")
    .with_cache_ttl(Duration::from_secs(1800))
    .with_fetch_timeout(Duration::from_secs(5));

    let verifier = JwtVerifier::new(config)?;

    if let Err(e) = verifier.prefetch().await {
        eprintln!("Could not warm the key cache: {e}");
    }
    println!("Cached key IDs: {:?}", verifier.cached_key_ids().await);

    match authenticate(&verifier, Some(header.as_str())).await {
        Ok(claims) => println!("Token verified for {:?}", claims.sub),
        Err(e) => println!("{}", serde_json::to_string(&e.to_response())?),
    }

    Ok(())
}
