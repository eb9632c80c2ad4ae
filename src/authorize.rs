//! Glue for the request-handling layer: pulling the bearer token out of the
//! `Authorization` header, role checks, and the status and body to answer with
//! when either fails.

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use crate::claims::Claims;
use crate::error::Error;
use crate::verifier::VerifyJwt;

/// Why a request was not allowed through
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Missing authorization header")]
    MissingCredentials,
    #[error("Invalid authorization header format")]
    InvalidAuthorizationHeader,
    #[error("Token rejected: {0}")]
    Rejected(#[from] Error),
    #[error("Access denied")]
    Forbidden,
}

impl AuthError {
    /// HTTP status to answer with
    pub fn status_code(&self) -> u16 {
        match self {
            Self::MissingCredentials | Self::InvalidAuthorizationHeader => 401,
            Self::Rejected(error) => error.status_code(),
            Self::Forbidden => 403,
        }
    }

    /// Message that is safe to show to the client.
    ///
    /// Token rejections collapse into one generic message; the precise reason
    /// only goes to the logs.
    pub fn public_message(&self) -> &'static str {
        match self {
            Self::MissingCredentials => "Missing authorization header",
            Self::InvalidAuthorizationHeader => "Invalid authorization header format",
            Self::Rejected(Error::KeyFetchFailure(_)) => {
                "Failed to fetch JWKS from authentication server"
            }
            Self::Rejected(_) => "Invalid authentication token",
            Self::Forbidden => "Access denied",
        }
    }

    /// Error body carrying the status and the public message
    pub fn to_response(&self) -> ErrorResponse {
        ErrorResponse {
            status: self.status_code(),
            message: self.public_message().to_string(),
        }
    }
}

/// JSON error body returned to clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub status: u16,
    pub message: String,
}

/// Extract the token from an `Authorization` header value.
///
/// The value must be exactly two whitespace-separated parts, the first being
/// `Bearer` in any letter case.
pub fn bearer_token(authorization: Option<&str>) -> Result<&str, AuthError> {
    let authorization = authorization.ok_or(AuthError::MissingCredentials)?;

    let mut parts = authorization.split_whitespace();
    match (parts.next(), parts.next(), parts.next()) {
        (Some(scheme), Some(token), None) if scheme.eq_ignore_ascii_case("bearer") => Ok(token),
        (None, _, _) => Err(AuthError::MissingCredentials),
        _ => Err(AuthError::InvalidAuthorizationHeader),
    }
}

/// Extract and verify the bearer token of a request.
///
/// # Errors
/// Returns `AuthError` if the header is missing, malformed, or the token is rejected.
pub async fn authenticate<V>(verifier: &V, authorization: Option<&str>) -> Result<Claims, AuthError>
where
    V: VerifyJwt + ?Sized,
{
    let token = bearer_token(authorization)?;
    Ok(verifier.verify(token).await?)
}

/// Require a single role.
///
/// # Errors
/// Returns `AuthError::Forbidden` if the role is not granted.
pub fn require_role(claims: &Claims, role: &str) -> Result<(), AuthError> {
    if claims.has_role(role) {
        return Ok(());
    }
    debug!(sub = ?claims.sub, role, "Required role missing");
    Err(AuthError::Forbidden)
}

/// Require at least one of the roles.
///
/// # Errors
/// Returns `AuthError::Forbidden` if none of the roles is granted.
pub fn require_any_role<S: AsRef<str>>(claims: &Claims, roles: &[S]) -> Result<(), AuthError> {
    if claims.has_any_role(roles) {
        return Ok(());
    }
    debug!(sub = ?claims.sub, "None of the required roles granted");
    Err(AuthError::Forbidden)
}

/// Require every one of the roles.
///
/// # Errors
/// Returns `AuthError::Forbidden` if any role is missing.
pub fn require_all_roles<S: AsRef<str>>(claims: &Claims, roles: &[S]) -> Result<(), AuthError> {
    if claims.has_all_roles(roles) {
        return Ok(());
    }
    debug!(sub = ?claims.sub, "Not all required roles granted");
    Err(AuthError::Forbidden)
}
