//! Middleware to automatically attach session credentials to outgoing requests
//!
//! When using [`ClientWithMiddleware`](reqwest_middleware::ClientWithMiddleware),
//! include the [`BearerTokenMiddleware`] in the middleware stack to ask a
//! [`CredentialResolver`] for the best available access token before each
//! outbound request.
//!
//! If a request already has specified an `Authorization` header value by
//! the time that the middleware executes, the existing value will be left
//! in place, allowing overrides to be specified as required. If the resolver
//! has no token, the request is sent without one.
//!
//! ```
//! use passage_reqwest::BearerTokenMiddleware;
//! use passage_tokens::{
//!     resolver::{CredentialResolver, ServerRequestToken},
//!     AccessToken,
//! };
//! use reqwest::Client;
//! use reqwest_middleware::ClientBuilder;
//!
//! # #[tokio::main(flavor = "current_thread")] async fn main() {
//! let client = ClientBuilder::new(Client::default())
//!     .with(BearerTokenMiddleware::new(CredentialResolver::server()))
//!     .build();
//!
//! let req = client.get("https://example.com");
//! # async move {
//! ServerRequestToken::scope(Some(AccessToken::from_static("token")), req.send())
//!     .await
//!     .unwrap();
//! # };
//! # }
//! ```
//!
//! The middleware can also be configured to add an authorization token
//! only conditionally. This is useful when one middleware stack talks to
//! several backends and session tokens must only reach the application's
//! own API.
//!
//! These predicates can be composed together to evaluate more complex
//! requirements prior to attaching a token to a request.
//!
//! ```
//! use passage_reqwest::{BearerTokenMiddleware, HttpsOnly, SameOrigin};
//! use passage_tokens::resolver::CredentialResolver;
//! use predicates::prelude::PredicateBooleanExt;
//!
//! let api = reqwest::Url::parse("https://api.example.com/").unwrap();
//!
//! BearerTokenMiddleware::new(CredentialResolver::server())
//!     .with_predicate(HttpsOnly.and(SameOrigin::new(&api)));
//! ```
//!
//! When the API answers `401 Unauthorized` to a request this middleware
//! applies to, tokens persisted for the browser context are forgotten so that
//! a rejected fallback is not presented again.
//!
//! Idempotent requests that fail transiently can be retried with exponential
//! backoff by placing a [`RetryMiddleware`] ahead of the token middleware.
//!
//! ```
//! use passage_reqwest::{BearerTokenMiddleware, RetryMiddleware, RetryPolicy};
//! use passage_tokens::resolver::CredentialResolver;
//! use reqwest_middleware::ClientBuilder;
//!
//! let client = ClientBuilder::new(reqwest::Client::default())
//!     .with(RetryMiddleware::new(RetryPolicy::production()))
//!     .with(BearerTokenMiddleware::new(CredentialResolver::server()))
//!     .build();
//! # drop(client);
//! ```

#![warn(
    missing_docs,
    unused_import_braces,
    unused_imports,
    unused_qualifications
)]
#![deny(
    missing_debug_implementations,
    missing_copy_implementations,
    trivial_casts,
    trivial_numeric_casts,
    unsafe_code,
    unused_must_use
)]

use std::fmt;

use bytes::{BufMut, BytesMut};
use passage_tokens::{resolver::CredentialResolver, AccessTokenRef};
use predicates::{prelude::*, reflection};
use reqwest::{header, Request, Response, StatusCode, Url};
use reqwest_middleware::{Middleware, Next, Result};

mod retry;

pub use retry::{RetryMiddleware, RetryPolicy};

/// A middleware that injects the resolved bearer token into outgoing requests
#[derive(Clone, Debug)]
pub struct BearerTokenMiddleware<P> {
    resolver: CredentialResolver,
    predicate: P,
}

impl BearerTokenMiddleware<HttpsOnly> {
    /// Construct a new middleware from a credential resolver
    ///
    /// By default, this middleware will only send a token if the request
    /// is being sent via HTTPS. To change this behavior, provide a
    /// custom predicate with [`with_predicate()`][Self::with_predicate()].
    pub fn new(resolver: CredentialResolver) -> Self {
        Self {
            resolver,
            predicate: HttpsOnly,
        }
    }

    /// Replaces the default predicate with a custom predicate
    pub fn with_predicate<P>(self, predicate: P) -> BearerTokenMiddleware<P> {
        BearerTokenMiddleware {
            resolver: self.resolver,
            predicate,
        }
    }
}

impl<P> BearerTokenMiddleware<P> {
    /// The resolver consulted for each request
    pub fn resolver(&self) -> &CredentialResolver {
        &self.resolver
    }

    async fn attach_token(&self, req: &mut Request) {
        if req.headers().contains_key(header::AUTHORIZATION) {
            tracing::trace!("request already carries authorization; leaving it in place");
            return;
        }

        let Some(token) = self.resolver.resolve().await else {
            tracing::debug!(url = %req.url(), "no bearer token available; sending unauthenticated");
            return;
        };

        match bearer_header(&token) {
            Some(value) => {
                tracing::trace!(token = format_args!("{:#?}", token), "attached bearer token");
                req.headers_mut().insert(header::AUTHORIZATION, value);
            }
            None => tracing::warn!("access token is not a valid header value; not attaching"),
        }
    }
}

fn bearer_header(token: &AccessTokenRef) -> Option<header::HeaderValue> {
    let mut header_value = BytesMut::with_capacity(token.as_str().len() + 7);
    header_value.put_slice(b"Bearer ");
    header_value.put_slice(token.as_str().as_bytes());
    let mut value = header::HeaderValue::from_maybe_shared(header_value).ok()?;
    value.set_sensitive(true);
    Some(value)
}

#[async_trait::async_trait]
impl<P> Middleware for BearerTokenMiddleware<P>
where
    P: Predicate<Request> + Send + Sync + 'static,
{
    #[tracing::instrument(level = "debug", skip_all, fields(url = %req.url()))]
    async fn handle(
        &self,
        mut req: Request,
        extensions: &mut http::Extensions,
        next: Next<'_>,
    ) -> Result<Response> {
        let applies = self.predicate.eval(&req);
        if applies {
            self.attach_token(&mut req).await;
        }

        let resp = next.run(req, extensions).await?;

        if applies && resp.status() == StatusCode::UNAUTHORIZED {
            tracing::warn!(url = %resp.url(), "API rejected credentials; forgetting persisted tokens");
            self.resolver.forget_persisted().await;
        }

        Ok(resp)
    }
}

/// Only attach an access token if the request is being sent over HTTPS
#[derive(Clone, Copy, Debug)]
pub struct HttpsOnly;

impl Predicate<Request> for HttpsOnly {
    #[inline]
    fn eval(&self, req: &Request) -> bool {
        req.url().scheme() == "https"
    }

    fn find_case(&self, expected: bool, req: &Request) -> Option<reflection::Case> {
        let result = self.eval(req);
        if result != expected {
            Some(
                reflection::Case::new(Some(self), result).add_product(reflection::Product::new(
                    "scheme",
                    req.url().scheme().to_owned(),
                )),
            )
        } else {
            None
        }
    }
}

impl reflection::PredicateReflection for HttpsOnly {}
impl fmt::Display for HttpsOnly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("scheme is https")
    }
}

/// Only attach an access token if the request goes to the same origin as the API
///
/// The scheme, host, and port must all match. Default ports are filled in,
/// so `https://api.example.com` and `https://api.example.com:443` are the
/// same origin.
#[derive(Clone, Debug)]
pub struct SameOrigin {
    origin: String,
}

impl SameOrigin {
    /// Construct a new predicate matching the origin of `url`
    pub fn new(url: &Url) -> Self {
        Self {
            origin: origin_of(url),
        }
    }
}

fn origin_of(url: &Url) -> String {
    url.origin().ascii_serialization()
}

impl Predicate<Request> for SameOrigin {
    #[inline]
    fn eval(&self, req: &Request) -> bool {
        origin_of(req.url()) == self.origin
    }

    fn find_case(&self, expected: bool, req: &Request) -> Option<reflection::Case> {
        let result = self.eval(req);
        if result != expected {
            Some(
                reflection::Case::new(Some(self), result)
                    .add_product(reflection::Product::new("origin", origin_of(req.url()))),
            )
        } else {
            None
        }
    }
}

impl reflection::PredicateReflection for SameOrigin {}
impl fmt::Display for SameOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("origin == ")?;
        f.write_str(&self.origin)
    }
}
