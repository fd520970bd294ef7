//! Caller identity
//!
//! Authentication happens upstream; the auth proxy forwards the verified
//! user in `X-User-Id` (and optionally `X-User-Email`), and the client
//! address in `X-Forwarded-For` or `X-Real-IP`.

use axum::{extract::FromRequestParts, http::request::Parts};
use codekit_core::Caller;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_EMAIL_HEADER: &str = "x-user-email";
pub const FORWARDED_FOR_HEADER: &str = "x-forwarded-for";
pub const REAL_IP_HEADER: &str = "x-real-ip";

/// Extractor wrapping the forwarded caller; anonymous when headers are absent
#[derive(Clone, Debug)]
pub struct Identity(pub Caller);

fn header<'a>(parts: &'a Parts, name: &str) -> Option<&'a str> {
    parts
        .headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// Original client: the left-most `X-Forwarded-For` entry
fn client_address(parts: &Parts) -> Option<&str> {
    header(parts, FORWARDED_FOR_HEADER)
        .and_then(|list| list.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .or_else(|| header(parts, REAL_IP_HEADER))
}

impl<S: Send + Sync> FromRequestParts<S> for Identity {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let mut caller = header(parts, USER_ID_HEADER).map_or_else(Caller::anonymous, Caller::user);
        if let Some(email) = header(parts, USER_EMAIL_HEADER) {
            caller = caller.with_email(email);
        }
        if let Some(client) = client_address(parts) {
            caller = caller.with_client(client);
        }
        Ok(Self(caller))
    }
}
