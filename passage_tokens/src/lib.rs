//! Session and access-token lifecycle management with proactive refresh
//!
//! A session begins with a login against a remote authority, which hands back
//! an access token, a refresh token, and a lifetime. This crate keeps those
//! credentials as an immutable [`CredentialBundle`] and refreshes them lazily:
//! the first access after the bundle comes within [`REFRESH_THRESHOLD`] of its
//! expiry exchanges the refresh token for a new bundle. Callers only ever
//! see the result.
//!
//! A failed refresh is _sticky_. The session keeps its last bundle and user
//! profile so they can still be displayed, but no further refresh is
//! attempted until the user logs in again or logs out. This guarantees that a
//! broken authority cannot be hammered by every page access.
//!
//! # General Flow
//!
//! ```
//! use passage_tokens::{ApiConfig, Email, HttpAuthApi, Password, SessionLifecycle};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ApiConfig::new("https://auth.example.com/".parse()?);
//! let api = HttpAuthApi::from_config(&config)?;
//! let mut session = SessionLifecycle::new(api);
//!
//! # /* Commented out due to this trying to interact with the world.
//! let profile = session
//!     .login(Email::from_static("kim@example.com"), Password::from_static("hunter2"))
//!     .await?;
//!
//! // Later, before each outbound call
//! let token = session.access().await;
//! # */
//! # Ok(())
//! # }
//! ```
//!
//! A [`SessionLifecycle`] is driven through `&mut self` and is meant for a
//! single owner. [`SharedSession`] wraps the same state for concurrent use:
//! concurrent stale accesses share one refresh, and a refresh that completes
//! after a logout or a fresh login is thrown away.
//!
//! Choosing which token to put on an outbound call is the job of the
//! [`CredentialResolver`][resolver::CredentialResolver]. On the server it reads
//! the [`ServerRequestToken`][resolver::ServerRequestToken] scoped to the
//! request being handled; in a browser context it asks the session first and
//! then falls back to durable storage.
//!
//! # Features
//!
//! The following features are supported by this crate, all of which are enabled by default:
//!
//! * `http`: Provides [`HttpAuthApi`], an authority client built on [reqwest],
//!   along with [`ApiConfig`].
//! * `file`: Provides a [`FileStorage`][resolver::FileStorage] for persisting
//!   fallback tokens on the local filesystem.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(
    missing_docs,
    unused_import_braces,
    unused_imports,
    unused_qualifications
)]
#![deny(
    missing_debug_implementations,
    trivial_numeric_casts,
    unsafe_code,
    unused_must_use
)]

pub mod authority;
mod braids;
mod bundle;
pub mod config;
mod refresher;
pub mod resolver;
mod session;
mod shared;
mod store;

#[cfg(test)]
mod test_support;

pub use authority::{AuthApi, AuthApiError};
#[cfg(feature = "http")]
pub use authority::HttpAuthApi;
pub use braids::*;
pub use bundle::{BundleLifetimeConfig, BundleStatus, CredentialBundle, REFRESH_THRESHOLD};
#[cfg(feature = "http")]
pub use config::ApiConfig;
pub use config::ConfigError;
pub use refresher::{RefreshFailure, TokenErrorKind, TokenRefresher, UnknownTokenErrorKind};
pub use session::{
    LoginError, ProfileError, SessionLifecycle, SessionProjection, SessionState, SessionStatus,
    SessionUser, TokenProjection,
};
pub use shared::SharedSession;
pub use store::TokenStore;
