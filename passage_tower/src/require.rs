use std::{fmt, marker::PhantomData, sync::Arc};

use http::{Request, Response};
use passage_tokens::SessionProjection;
use tower_http::validate_request::ValidateRequest;

use crate::{util::redirect, AccessGate, Decision};

/// Gates navigations on the session attached to the request
///
/// The session is read from a [`SessionProjection`] in the request's
/// extensions, placed there by an earlier layer. A request without one is
/// treated as anonymous. An errored session still counts as signed in, so the
/// page can prompt for a new login.
///
/// Use with [`ValidateRequestHeaderLayer::custom()`][tower_http::validate_request::ValidateRequestHeaderLayer::custom].
pub struct RequireSession<ResBody> {
    gate: Arc<AccessGate>,
    _ty: PhantomData<fn() -> ResBody>,
}

impl<ResBody> RequireSession<ResBody> {
    /// Constructs a validator enforcing `gate`
    #[inline]
    pub fn new(gate: AccessGate) -> Self {
        Self {
            gate: Arc::new(gate),
            _ty: PhantomData,
        }
    }

    /// The gate being enforced
    #[inline]
    pub fn gate(&self) -> &AccessGate {
        &self.gate
    }
}

impl<ResBody> Default for RequireSession<ResBody> {
    #[inline]
    fn default() -> Self {
        Self::new(AccessGate::default())
    }
}

impl<ResBody> Clone for RequireSession<ResBody> {
    #[inline]
    fn clone(&self) -> Self {
        Self {
            gate: Arc::clone(&self.gate),
            _ty: PhantomData,
        }
    }
}

impl<ResBody> fmt::Debug for RequireSession<ResBody> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("RequireSession")
            .field("gate", &self.gate)
            .finish()
    }
}

impl<ReqBody, ResBody> ValidateRequest<ReqBody> for RequireSession<ResBody>
where
    ResBody: Default,
{
    type ResponseBody = ResBody;

    fn validate(
        &mut self,
        request: &mut Request<ReqBody>,
    ) -> Result<(), Response<Self::ResponseBody>> {
        let path = request.uri().path();

        if self.gate.is_exempt(path) {
            tracing::trace!(path, "path is exempt from gating");
            return Ok(());
        }

        let authenticated = request
            .extensions()
            .get::<SessionProjection>()
            .map_or(false, |session| session.authenticated);

        match self.gate.decide(path, authenticated) {
            Decision::Allow => {
                tracing::trace!(path, authenticated, "navigation allowed");
                Ok(())
            }
            Decision::Redirect(target) => {
                tracing::debug!(path, authenticated, location = %target, "redirecting navigation");
                Err(redirect(target))
            }
        }
    }
}
