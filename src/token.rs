use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use jsonwebtoken::decode_header;
use jsonwebtoken::Header;

use crate::claims::Claims;
use crate::error::Error;
use crate::error::Result;

/// Tokens above this size are rejected before any decoding.
pub const MAX_TOKEN_BYTES: usize = 16 * 1024;

/// A compact JWT whose header and payload decoded cleanly.
///
/// Nothing in here is trusted until the signature has been checked.
#[derive(Debug)]
pub(crate) struct UnverifiedToken {
    pub(crate) header: Header,
    pub(crate) kid: String,
    pub(crate) claims: Claims,
}

/// Split and decode a compact serialized token without checking its signature.
pub(crate) fn parse_unverified(token: &str) -> Result<UnverifiedToken> {
    if token.is_empty() {
        return Err(Error::malformed("empty token"));
    }
    if token.len() > MAX_TOKEN_BYTES {
        return Err(Error::malformed("token exceeds maximum size"));
    }

    let segments: Vec<&str> = token.split('.').collect();
    let [header_b64, payload_b64, signature_b64] = segments.as_slice() else {
        return Err(Error::malformed("expected three dot-separated segments"));
    };

    if signature_b64.is_empty() {
        return Err(Error::malformed("signature segment is empty"));
    }
    URL_SAFE_NO_PAD
        .decode(signature_b64)
        .map_err(|_| Error::malformed("signature segment is not base64url"))?;

    URL_SAFE_NO_PAD
        .decode(header_b64)
        .map_err(|_| Error::malformed("header segment is not base64url"))?;
    let header = decode_header(token).map_err(|e| Error::malformed(format!("header: {e}")))?;

    let kid = match header.kid.as_deref() {
        Some(kid) if !kid.is_empty() => kid.to_string(),
        _ => return Err(Error::malformed("missing 'kid' in header")),
    };

    let payload = URL_SAFE_NO_PAD
        .decode(payload_b64)
        .map_err(|_| Error::malformed("payload segment is not base64url"))?;
    let claims: Claims =
        serde_json::from_slice(&payload).map_err(|e| Error::malformed(format!("payload: {e}")))?;

    Ok(UnverifiedToken {
        header,
        kid,
        claims,
    })
}

/// Shorten a token so it can be logged without exposing a usable credential.
pub fn redact_token(token: &str) -> String {
    if token.is_empty() {
        return "<empty token>".to_string();
    }
    if token.split('.').count() != 3 {
        return "<invalid token format>".to_string();
    }

    let prefix: String = token.chars().take(10).collect();
    format!("{prefix}...")
}
