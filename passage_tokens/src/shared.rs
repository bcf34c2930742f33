use std::{
    error,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use passage_clock::{Clock, System};

use crate::{
    authority::{
        dto::{LoginResponse, UserProfile},
        AuthApi,
    },
    session::{admit_grant, classify_failure, login_request},
    BundleLifetimeConfig, Email, LoginError, Password, ProfileError, SessionProjection,
    SessionState, SessionStatus, TokenProjection, TokenRefresher,
};

/// A session that can be accessed from many tasks at once
///
/// Concurrent accesses of a stale session share a single refresh. A refresh
/// that completes after the session has been logged out or logged in again
/// is discarded.
#[derive(Debug)]
pub struct SharedSession<A, C = System> {
    inner: Arc<Inner<A, C>>,
}

#[derive(Debug)]
struct Inner<A, C> {
    refresher: TokenRefresher<A, C>,
    state: Mutex<SessionState>,
    refresh_flight: tokio::sync::Mutex<()>,
}

impl<A, C> Clone for SharedSession<A, C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<A> SharedSession<A, System> {
    /// Constructs an anonymous session using the system clock
    pub fn new(api: A) -> Self {
        Self::with_lifetime(api, BundleLifetimeConfig::default())
    }
}

impl<A, C> SharedSession<A, C> {
    /// Constructs an anonymous session with a custom lifetime configuration
    pub fn with_lifetime(api: A, lifetime: BundleLifetimeConfig<C>) -> Self {
        Self::from_parts(
            TokenRefresher::with_lifetime(api, lifetime),
            SessionState::new(),
        )
    }

    pub(crate) fn from_parts(refresher: TokenRefresher<A, C>, state: SessionState) -> Self {
        Self {
            inner: Arc::new(Inner {
                refresher,
                state: Mutex::new(state),
                refresh_flight: tokio::sync::Mutex::new(()),
            }),
        }
    }

    /// The authority backing this session
    #[inline]
    pub fn api(&self) -> &A {
        self.inner.refresher.api()
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// The coarse state of the session
    pub fn status(&self) -> SessionStatus {
        self.lock().status()
    }

    /// The token-facing view, without triggering a refresh
    pub fn token_projection(&self) -> TokenProjection {
        self.lock().token_projection()
    }

    /// The user-facing view
    pub fn session_projection(&self) -> SessionProjection {
        self.lock().session_projection()
    }

    /// Inspects the session state while holding its lock
    pub fn inspect<T>(&self, f: impl FnOnce(&SessionState) -> T) -> T {
        f(&self.lock())
    }

    /// Ends the session
    ///
    /// A refresh that is in flight will not be applied.
    pub fn logout(&self) {
        tracing::info!("session ended");
        self.lock().end();
    }
}

impl<A: AuthApi, C: Clock> SharedSession<A, C> {
    /// Logs in with an email and password
    ///
    /// On failure, the session is left exactly as it was.
    pub async fn login(
        &self,
        email: Email,
        password: Password,
    ) -> Result<SessionProjection, LoginError> {
        let request = login_request(email, password)?;
        let grant = self.api().login(&request).await.map_err(|error| {
            tracing::warn!(error = (&error as &dyn error::Error), "login rejected");
            LoginError::AuthenticationFailed(error)
        })?;

        self.establish(grant)?;
        Ok(self.session_projection())
    }

    /// Starts a session from a login grant obtained elsewhere
    pub fn establish(&self, grant: LoginResponse) -> Result<(), LoginError> {
        let (bundle, user) = admit_grant(self.inner.refresher.lifetime(), grant)?;
        self.lock().begin(bundle, user);
        Ok(())
    }

    /// Accesses the session's credentials, refreshing them first if they are stale
    ///
    /// Callers that find the session stale while a refresh is in flight wait
    /// for that refresh instead of starting their own.
    pub async fn access(&self) -> TokenProjection {
        let lifetime = self.inner.refresher.lifetime();

        if self.lock().refresh_due(lifetime.now()).is_some() {
            let _flight = self.inner.refresh_flight.lock().await;

            let (due, epoch) = {
                let state = self.lock();
                (state.refresh_due(lifetime.now()), state.epoch())
            };

            if let Some(bundle) = due {
                let outcome = self
                    .inner
                    .refresher
                    .refresh(&bundle)
                    .await
                    .map_err(classify_failure);

                if !self.lock().apply_refresh(epoch, outcome) {
                    tracing::debug!("session changed during refresh; discarding result");
                }
            }
        }

        self.token_projection()
    }

    /// Re-reads the user's profile from the authority
    pub async fn refresh_profile(&self) -> Result<UserProfile, ProfileError> {
        let token = match self.access().await {
            TokenProjection {
                access_token: Some(token),
                ..
            } => token,
            TokenProjection {
                error: Some(kind), ..
            } => return Err(ProfileError::SessionErrored(kind)),
            _ => return Err(ProfileError::Unauthenticated),
        };

        let epoch = self.lock().epoch();
        let profile = self
            .api()
            .fetch_profile(&token)
            .await
            .map_err(ProfileError::Fetch)?;

        if self.lock().replace_user(epoch, profile.clone()) {
            Ok(profile)
        } else {
            Err(ProfileError::Superseded)
        }
    }
}
