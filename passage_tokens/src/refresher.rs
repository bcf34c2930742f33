use std::{fmt, str::FromStr};

use passage_clock::{Clock, System};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    authority::{positive_lifetime, AuthApi, AuthApiError},
    BundleLifetimeConfig, CredentialBundle,
};

/// Why a session can no longer refresh its credentials
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub enum TokenErrorKind {
    /// The refresh failed for a reason other than the refresh token being rejected
    #[serde(rename = "RefreshTokenError")]
    RefreshError,
    /// The authority rejected the refresh token; a new login is required
    #[serde(rename = "RefreshTokenExpired")]
    RefreshTokenExpired,
}

impl TokenErrorKind {
    /// The code used when the error is surfaced to clients
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::RefreshError => "RefreshTokenError",
            Self::RefreshTokenExpired => "RefreshTokenExpired",
        }
    }

    /// A message suitable for showing to the user
    pub const fn message(self) -> &'static str {
        match self {
            Self::RefreshError => "Something went wrong while renewing your session.",
            Self::RefreshTokenExpired => "Your session has expired. Please sign in again.",
        }
    }
}

impl fmt::Display for TokenErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The string was not a known token error code
#[derive(Clone, Debug, Error)]
#[error("unknown token error code: {0}")]
pub struct UnknownTokenErrorKind(String);

impl FromStr for TokenErrorKind {
    type Err = UnknownTokenErrorKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "RefreshTokenError" => Ok(Self::RefreshError),
            "RefreshTokenExpired" => Ok(Self::RefreshTokenExpired),
            other => Err(UnknownTokenErrorKind(other.to_owned())),
        }
    }
}

/// A failed refresh, classified for the session lifecycle
#[derive(Debug, Error)]
#[error("token refresh failed: {kind}")]
pub struct RefreshFailure {
    kind: TokenErrorKind,
    #[source]
    source: AuthApiError,
}

impl RefreshFailure {
    /// Classifies an error from the authority
    ///
    /// A `401` means the refresh token itself was rejected. Anything else is
    /// reported as a generic refresh error.
    pub fn classify(source: AuthApiError) -> Self {
        let kind = if source.is_unauthorized() {
            TokenErrorKind::RefreshTokenExpired
        } else {
            TokenErrorKind::RefreshError
        };

        Self { kind, source }
    }

    /// The classification of this failure
    #[inline]
    pub fn kind(&self) -> TokenErrorKind {
        self.kind
    }

    /// The underlying error from the authority
    #[inline]
    pub fn source_error(&self) -> &AuthApiError {
        &self.source
    }
}

/// Exchanges a bundle's refresh token for a new bundle
///
/// Exactly one call is made to the authority per invocation. Retrying is
/// left to the caller.
#[derive(Debug)]
pub struct TokenRefresher<A, C = System> {
    api: A,
    lifetime: BundleLifetimeConfig<C>,
}

impl<A> TokenRefresher<A, System> {
    /// Constructs a refresher with the default lifetime configuration
    pub fn new(api: A) -> Self {
        Self::with_lifetime(api, BundleLifetimeConfig::default())
    }
}

impl<A, C> TokenRefresher<A, C> {
    /// Constructs a refresher minting bundles with `lifetime`
    pub fn with_lifetime(api: A, lifetime: BundleLifetimeConfig<C>) -> Self {
        Self { api, lifetime }
    }

    /// The authority used for refreshes
    #[inline]
    pub fn api(&self) -> &A {
        &self.api
    }

    /// The lifetime configuration used to mint bundles
    #[inline]
    pub fn lifetime(&self) -> &BundleLifetimeConfig<C> {
        &self.lifetime
    }
}

impl<A: AuthApi, C: Clock> TokenRefresher<A, C> {
    /// Performs a single refresh exchange for `bundle`
    ///
    /// If the authority does not rotate the refresh token, the new bundle
    /// keeps the old one.
    #[tracing::instrument(level = "debug", skip_all)]
    pub async fn refresh(&self, bundle: &CredentialBundle) -> Result<CredentialBundle, RefreshFailure> {
        tracing::debug!(
            stale = bundle.stale().0,
            expiry = bundle.expiry().0,
            "refreshing credential bundle"
        );

        let resp = self
            .api
            .refresh(bundle.refresh_token())
            .await
            .map_err(RefreshFailure::classify)?;

        let lifetime = positive_lifetime(resp.expires_in).map_err(RefreshFailure::classify)?;

        let (refresh_token, rotated) = match resp.refresh_token.filter(|t| !t.as_str().is_empty()) {
            Some(token) => (token, true),
            None => (bundle.refresh_token().to_owned(), false),
        };

        let new_bundle = self
            .lifetime
            .create_bundle(resp.access_token, refresh_token, lifetime);

        tracing::info!(
            rotated,
            lifetime = new_bundle.lifetime().0,
            stale = new_bundle.stale().0,
            expiry = new_bundle.expiry().0,
            "credential bundle refreshed"
        );

        Ok(new_bundle)
    }
}
