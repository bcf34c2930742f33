//! The remote authority that issues and refreshes credentials

use std::error;

use async_trait::async_trait;
use passage_clock::DurationSecs;
use thiserror::Error;

use crate::{AccessTokenRef, RefreshTokenRef};

pub mod dto;
#[cfg(feature = "http")]
pub mod http;

#[cfg(feature = "http")]
pub use http::HttpAuthApi;

use dto::{LoginRequest, LoginResponse, RefreshResponse, UserProfile};

/// A boxed error from an underlying transport
pub type BoxError = Box<dyn error::Error + Send + Sync + 'static>;

/// Endpoint paths, relative to the authority's base URL
pub mod endpoints {
    /// Exchanges an email and password for a credential bundle (`POST`)
    pub const LOGIN: &str = "api/v1/auth/login";
    /// Exchanges a refresh token for a new access token (`POST`)
    pub const REFRESH: &str = "api/v1/auth/refresh";
    /// Reads the profile of the bearer (`GET`)
    pub const PROFILE: &str = "api/v1/auth/profile";
}

/// The calls this crate makes against the remote authority
///
/// Every suspension point in the session lifecycle goes through this trait.
#[async_trait]
pub trait AuthApi: Send + Sync {
    /// Authenticates a user by email and password
    async fn login(&self, request: &LoginRequest) -> Result<LoginResponse, AuthApiError>;

    /// Exchanges a refresh token for a new access token
    async fn refresh(&self, refresh_token: &RefreshTokenRef)
        -> Result<RefreshResponse, AuthApiError>;

    /// Fetches the profile of the user that owns `access_token`
    async fn fetch_profile(&self, access_token: &AccessTokenRef)
        -> Result<UserProfile, AuthApiError>;
}

#[async_trait]
impl<A: AuthApi + ?Sized> AuthApi for std::sync::Arc<A> {
    async fn login(&self, request: &LoginRequest) -> Result<LoginResponse, AuthApiError> {
        (**self).login(request).await
    }

    async fn refresh(
        &self,
        refresh_token: &RefreshTokenRef,
    ) -> Result<RefreshResponse, AuthApiError> {
        (**self).refresh(refresh_token).await
    }

    async fn fetch_profile(
        &self,
        access_token: &AccessTokenRef,
    ) -> Result<UserProfile, AuthApiError> {
        (**self).fetch_profile(access_token).await
    }
}

/// An error while talking to the authority
#[derive(Debug, Error)]
pub enum AuthApiError {
    /// The authority answered with a non-success status
    #[error("authority responded with status {status}: {body}")]
    Status {
        /// The HTTP status code
        status: u16,
        /// The body of the error response
        body: String,
    },
    /// Unable to send the request to the authority
    #[error("error sending request to authority")]
    RequestSend(#[source] BoxError),
    /// Unable to read the response
    #[error("error reading response body")]
    BodyRead(#[source] BoxError),
    /// The response did not have the expected shape
    #[error("malformed response from authority: {0}")]
    Malformed(#[source] BoxError),
}

impl AuthApiError {
    /// The HTTP status, if the authority answered at all
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether the authority rejected the presented credential
    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(401)
    }

    pub(crate) fn malformed(reason: &'static str) -> Self {
        Self::Malformed(reason.into())
    }
}

/// Rejects lifetimes that would make a credential expire the moment it is issued
pub(crate) fn positive_lifetime(expires_in: u64) -> Result<DurationSecs, AuthApiError> {
    if expires_in == 0 {
        Err(AuthApiError::malformed("expiresIn must be positive"))
    } else {
        Ok(DurationSecs(expires_in))
    }
}
