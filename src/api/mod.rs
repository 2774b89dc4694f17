//! Backend API Client
//!
//! Transport layer for the wellness backend.
//!
//! ## Behaviour
//!
//! - Bearer token read from the [`CredentialStore`](crate::credentials::CredentialStore)
//!   on every call
//! - Calls that need a token fail with [`ApiError::Unauthenticated`] before
//!   touching the network when none is stored
//! - A 401 on an authenticated call clears the store, notifies the user and
//!   runs the installed [`AuthFailureHandler`]
//! - No retries: every failure reaches the caller immediately

mod client;
mod error;
mod token;

pub use client::{encode_form, read_json, ApiClient, AuthFailureHandler, RequestOptions};
pub use error::{ApiError, ApiResult, ResponseMeta};
pub use token::{decode_claims, is_token_expired, is_token_expired_at, TokenClaims};

#[cfg(test)]
pub(crate) use token::make_token;
