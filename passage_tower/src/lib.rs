//! Page-access gating for `tower_http` and other constructs in the
//! ecosystem, including `axum`.
//!
//! [`AccessGate::decide()`] is a pure function of a path and whether the
//! user is signed in. [`RequireSession`] applies it to incoming requests as a
//! [`ValidateRequest`][tower_http::validate_request::ValidateRequest],
//! answering with a `307 Temporary Redirect` when the user belongs elsewhere.
//!
//! See the `examples` folder in the repository for a working example using
//! an `axum` web server.
//!
//! ```
//! # use axum::routing::get;
//! use passage_tower::{AccessGate, RequireSession};
//! use tower_http::validate_request::ValidateRequestHeaderLayer;
//!
//! let gate = AccessGate::new()
//!     .with_public_path("/about")
//!     .with_unauthenticated_redirect("/login")
//!     .unwrap();
//!
//! let app: axum::Router = axum::Router::new()
//!     .route("/", get(handle_root))
//!     .route("/dashboard", get(handle_dashboard))
//!     .layer(ValidateRequestHeaderLayer::custom(
//!         RequireSession::<axum::body::Body>::new(gate),
//!     ));
//! #
//! # async fn handle_root() {}
//! #
//! # async fn handle_dashboard() {}
//! ```
//!
//! The session itself is not looked up here. An earlier layer is expected to
//! place a [`SessionProjection`][passage_tokens::SessionProjection] in the
//! request's extensions.

#![warn(
    missing_docs,
    unused_import_braces,
    unused_imports,
    unused_qualifications
)]
#![deny(
    missing_debug_implementations,
    trivial_casts,
    trivial_numeric_casts,
    unsafe_code,
    unused_must_use
)]

mod gate;
mod require;
pub mod util;

pub use crate::gate::*;
pub use crate::require::RequireSession;
