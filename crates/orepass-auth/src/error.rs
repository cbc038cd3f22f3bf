//! Authentication error types.
//!
//! Every credential- or session-shaped failure collapses into the
//! generic `Unauthorized` when it crosses into the core taxonomy, so
//! callers cannot distinguish "no such account" from "wrong password".

use orepass_core::error::OrepassError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("account is inactive")]
    AccountInactive,

    #[error("session is expired, revoked, or unknown")]
    SessionInvalid,

    #[error("token has expired")]
    TokenExpired,

    #[error("invalid token: {0}")]
    TokenInvalid(String),

    #[error("cryptography error: {0}")]
    Crypto(String),
}

impl From<AuthError> for OrepassError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidCredentials
            | AuthError::AccountInactive
            | AuthError::SessionInvalid
            | AuthError::TokenExpired
            | AuthError::TokenInvalid(_) => OrepassError::Unauthorized,
            AuthError::Crypto(msg) => OrepassError::Storage(msg),
        }
    }
}
