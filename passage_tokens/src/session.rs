//! The session lifecycle: login, proactive refresh, sticky failure, and logout
//!
//! A session is in one of three states:
//!
//! * _anonymous_: no credentials are held.
//! * _active_: a bundle is held and is refreshed on access once it comes
//!   within the refresh threshold of its expiry.
//! * _errored_: a refresh failed. The last bundle and user profile are kept
//!   for display, but no further refreshes are attempted until the next login
//!   or logout.
//!
//! Projections of the state are handed to the transport and rendering
//! layers through [`TokenProjection`] and [`SessionProjection`].

use std::error;

use passage_clock::{Clock, System, UnixTime};
use serde::Serialize;
use thiserror::Error;

use crate::{
    authority::{
        dto::{LoginRequest, LoginResponse, UserProfile},
        positive_lifetime, AuthApi, AuthApiError,
    },
    AccessToken, BundleLifetimeConfig, CredentialBundle, Email, Password, RefreshFailure,
    SharedSession, TokenErrorKind, TokenRefresher, TokenStore, UserId,
};

/// The coarse state of a session
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionStatus {
    /// No credentials are held
    Anonymous,
    /// Credentials are held and refreshable
    Active,
    /// A refresh failed; a new login is needed
    Errored(TokenErrorKind),
}

/// The mutable state behind one authenticated principal's session
#[derive(Debug, Default)]
pub struct SessionState {
    store: TokenStore,
    error: Option<TokenErrorKind>,
    user: Option<UserProfile>,
    epoch: u64,
}

impl SessionState {
    /// Constructs an anonymous session
    pub const fn new() -> Self {
        Self {
            store: TokenStore::new(),
            error: None,
            user: None,
            epoch: 0,
        }
    }

    /// The current state of the session
    pub fn status(&self) -> SessionStatus {
        match (self.store.get(), self.error) {
            (None, _) => SessionStatus::Anonymous,
            (Some(_), Some(kind)) => SessionStatus::Errored(kind),
            (Some(_), None) => SessionStatus::Active,
        }
    }

    /// The current bundle, if any
    #[inline]
    pub fn bundle(&self) -> Option<&CredentialBundle> {
        self.store.get()
    }

    /// The error flag, if a refresh has failed
    #[inline]
    pub fn error(&self) -> Option<TokenErrorKind> {
        self.error
    }

    /// The last known user profile
    #[inline]
    pub fn user(&self) -> Option<&UserProfile> {
        self.user.as_ref()
    }

    /// Incremented on every login and logout
    ///
    /// Work started under one epoch must not be applied under another.
    #[inline]
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// The bundle to refresh, if the session is active and the bundle is stale at `now`
    ///
    /// A bundle without a refresh token is never due; it is used until the
    /// authority rejects it.
    pub fn refresh_due(&self, now: UnixTime) -> Option<CredentialBundle> {
        if self.error.is_some() {
            return None;
        }

        self.store
            .get()
            .filter(|bundle| !bundle.refresh_token().as_str().is_empty())
            .filter(|bundle| bundle.needs_refresh_at(now))
            .cloned()
    }

    pub(crate) fn begin(&mut self, bundle: CredentialBundle, user: UserProfile) {
        self.store.set(bundle);
        self.error = None;
        self.user = Some(user);
        self.epoch += 1;
    }

    pub(crate) fn end(&mut self) {
        self.store.clear();
        self.error = None;
        self.user = None;
        self.epoch += 1;
    }

    /// Applies the outcome of a refresh started during `epoch`
    ///
    /// Returns `false` and leaves the state untouched if the session has since
    /// logged in, logged out, or already failed.
    pub(crate) fn apply_refresh(
        &mut self,
        epoch: u64,
        outcome: Result<CredentialBundle, TokenErrorKind>,
    ) -> bool {
        if epoch != self.epoch || self.error.is_some() || self.store.get().is_none() {
            return false;
        }

        match outcome {
            Ok(bundle) => self.store.set(bundle),
            Err(kind) => self.error = Some(kind),
        }

        true
    }

    pub(crate) fn replace_user(&mut self, epoch: u64, user: UserProfile) -> bool {
        if epoch != self.epoch || self.store.get().is_none() {
            return false;
        }

        self.user = Some(user);
        true
    }

    /// What outbound API calls should use
    pub fn token_projection(&self) -> TokenProjection {
        match self.status() {
            SessionStatus::Anonymous => TokenProjection::default(),
            SessionStatus::Active => TokenProjection {
                access_token: self.store.get().map(|b| b.access_token().to_owned()),
                error: None,
            },
            SessionStatus::Errored(kind) => TokenProjection {
                access_token: None,
                error: Some(kind),
            },
        }
    }

    /// What the rendering layer shows
    ///
    /// An errored session still carries its last known user so the page can
    /// prompt for a new login instead of going blank.
    pub fn session_projection(&self) -> SessionProjection {
        let status = self.status();
        SessionProjection {
            authenticated: status != SessionStatus::Anonymous,
            user: match status {
                SessionStatus::Anonymous => None,
                _ => self.user.as_ref().map(SessionUser::from),
            },
            error: self.error,
        }
    }
}

/// The token-facing view of a session
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenProjection {
    /// The access token to attach to outbound calls, present only while active
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token: Option<AccessToken>,
    /// Why the session cannot supply a token, if it has errored
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<TokenErrorKind>,
}

/// The user-facing view of a session
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionProjection {
    /// Whether the session holds credentials, even if they can no longer be refreshed
    pub authenticated: bool,
    /// The last known user
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<SessionUser>,
    /// Set when a new login is required
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<TokenErrorKind>,
}

impl SessionProjection {
    /// Whether the user should be asked to log in again
    pub fn needs_relogin(&self) -> bool {
        self.error.is_some()
    }
}

/// The user as displayed by the rendering layer
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SessionUser {
    /// The authority's identifier for the user
    pub id: UserId,
    /// Email address
    pub email: Email,
    /// Display name
    pub name: String,
    /// Avatar image URL
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

impl From<&UserProfile> for SessionUser {
    fn from(profile: &UserProfile) -> Self {
        Self {
            id: profile.id.clone(),
            email: profile.email.clone(),
            name: profile.display_name(),
            image: profile.avatar.clone(),
        }
    }
}

/// A login attempt did not produce a session
///
/// Login failures are reported only to the caller and never recorded in the
/// session.
#[derive(Debug, Error)]
pub enum LoginError {
    /// The email or password was empty
    #[error("email and password are required")]
    MissingCredentials,
    /// The authority refused the login or could not be reached
    #[error("authentication failed")]
    AuthenticationFailed(#[source] AuthApiError),
}

impl LoginError {
    /// The status code surfaced to callers
    pub const fn code(&self) -> &'static str {
        "authentication_failed"
    }
}

/// The profile could not be refreshed
#[derive(Debug, Error)]
pub enum ProfileError {
    /// There is no session to fetch a profile for
    #[error("no active session")]
    Unauthenticated,
    /// The session has errored and needs a new login
    #[error("session requires a new login: {0}")]
    SessionErrored(TokenErrorKind),
    /// The authority did not return a profile
    #[error("unable to fetch profile")]
    Fetch(#[source] AuthApiError),
    /// The session changed while the profile was being fetched
    #[error("session changed while fetching profile")]
    Superseded,
}

pub(crate) fn login_request(email: Email, password: Password) -> Result<LoginRequest, LoginError> {
    if email.as_str().trim().is_empty() || password.as_str().is_empty() {
        tracing::debug!("login attempted without credentials");
        return Err(LoginError::MissingCredentials);
    }

    Ok(LoginRequest::new(email, password))
}

pub(crate) fn admit_grant<C: Clock>(
    lifetime: &BundleLifetimeConfig<C>,
    grant: LoginResponse,
) -> Result<(CredentialBundle, UserProfile), LoginError> {
    let valid_for =
        positive_lifetime(grant.expires_in).map_err(LoginError::AuthenticationFailed)?;
    let bundle = lifetime.create_bundle(grant.access_token, grant.refresh_token, valid_for);

    tracing::info!(
        user.id = %grant.user.id,
        lifetime = bundle.lifetime().0,
        stale = bundle.stale().0,
        expiry = bundle.expiry().0,
        "session established"
    );

    Ok((bundle, grant.user))
}

pub(crate) fn classify_failure(failure: RefreshFailure) -> TokenErrorKind {
    tracing::warn!(
        error = (&failure as &dyn error::Error),
        kind = %failure.kind(),
        "credential refresh failed; further refreshes suspended until next login"
    );
    failure.kind()
}

/// Drives a single session through its lifecycle
///
/// Operations take `&mut self`, so calls are strictly sequential. Use
/// [`into_shared()`][Self::into_shared] for a handle that can be used from
/// many tasks at once.
#[derive(Debug)]
pub struct SessionLifecycle<A, C = System> {
    refresher: TokenRefresher<A, C>,
    state: SessionState,
}

impl<A> SessionLifecycle<A, System> {
    /// Constructs an anonymous session using the system clock
    pub fn new(api: A) -> Self {
        Self::with_lifetime(api, BundleLifetimeConfig::default())
    }
}

impl<A, C> SessionLifecycle<A, C> {
    /// Constructs an anonymous session with a custom lifetime configuration
    pub fn with_lifetime(api: A, lifetime: BundleLifetimeConfig<C>) -> Self {
        Self {
            refresher: TokenRefresher::with_lifetime(api, lifetime),
            state: SessionState::new(),
        }
    }

    /// The authority backing this session
    #[inline]
    pub fn api(&self) -> &A {
        self.refresher.api()
    }

    /// The current session state
    #[inline]
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// The coarse state of the session
    #[inline]
    pub fn status(&self) -> SessionStatus {
        self.state.status()
    }

    /// The token-facing view, without triggering a refresh
    pub fn token_projection(&self) -> TokenProjection {
        self.state.token_projection()
    }

    /// The user-facing view
    pub fn session_projection(&self) -> SessionProjection {
        self.state.session_projection()
    }

    /// Ends the session, discarding credentials and any error flag
    pub fn logout(&mut self) {
        tracing::info!("session ended");
        self.state.end();
    }

    /// Converts into a handle that serializes concurrent access
    pub fn into_shared(self) -> SharedSession<A, C> {
        SharedSession::from_parts(self.refresher, self.state)
    }
}

impl<A: AuthApi, C: Clock> SessionLifecycle<A, C> {
    /// Logs in with an email and password
    ///
    /// On success, any previous credentials and error flag are replaced.
    /// On failure, the session is left exactly as it was.
    pub async fn login(
        &mut self,
        email: Email,
        password: Password,
    ) -> Result<SessionProjection, LoginError> {
        let request = login_request(email, password)?;
        let grant = self
            .refresher
            .api()
            .login(&request)
            .await
            .map_err(|error| {
                tracing::warn!(error = (&error as &dyn error::Error), "login rejected");
                LoginError::AuthenticationFailed(error)
            })?;

        self.establish(grant)?;
        Ok(self.session_projection())
    }

    /// Starts a session from a login grant obtained elsewhere
    pub fn establish(&mut self, grant: LoginResponse) -> Result<(), LoginError> {
        let (bundle, user) = admit_grant(self.refresher.lifetime(), grant)?;
        self.state.begin(bundle, user);
        Ok(())
    }

    /// Accesses the session's credentials, refreshing them first if they are stale
    ///
    /// At most one refresh is attempted. A failed refresh leaves the session
    /// errored, and errored sessions are never refreshed.
    pub async fn access(&mut self) -> TokenProjection {
        let now = self.refresher.lifetime().now();
        if let Some(bundle) = self.state.refresh_due(now) {
            let epoch = self.state.epoch();
            let outcome = self
                .refresher
                .refresh(&bundle)
                .await
                .map_err(classify_failure);
            self.state.apply_refresh(epoch, outcome);
        }

        self.state.token_projection()
    }

    /// Re-reads the user's profile from the authority
    ///
    /// This is the only operation that updates the profile after login. On
    /// failure the previous profile is kept.
    pub async fn refresh_profile(&mut self) -> Result<&UserProfile, ProfileError> {
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

        let epoch = self.state.epoch();
        let profile = self
            .refresher
            .api()
            .fetch_profile(&token)
            .await
            .map_err(ProfileError::Fetch)?;

        if !self.state.replace_user(epoch, profile) {
            return Err(ProfileError::Superseded);
        }

        self.state.user().ok_or(ProfileError::Superseded)
    }
}

#[cfg(test)]
mod tests {
    use passage_clock::{DurationSecs, ManualClock};

    use super::*;
    use crate::test_support::{login_grant, profile, MockAuthApi, RefreshOutcome};

    fn session(api: MockAuthApi) -> (SessionLifecycle<MockAuthApi, ManualClock>, ManualClock) {
        let clock = ManualClock::new(UnixTime(0));
        let lifetime = BundleLifetimeConfig::default().with_clock(clock.clone());
        (SessionLifecycle::with_lifetime(api, lifetime), clock)
    }

    async fn logged_in(api: MockAuthApi) -> (SessionLifecycle<MockAuthApi, ManualClock>, ManualClock) {
        let (mut session, clock) = session(api);
        session
            .login(Email::from_static("kim@example.com"), Password::from_static("pw"))
            .await
            .unwrap();
        (session, clock)
    }

    fn token(projection: &TokenProjection) -> Option<&str> {
        projection.access_token.as_ref().map(|t| t.as_str())
    }

    mod when_anonymous {
        use super::*;

        #[tokio::test]
        async fn access_yields_nothing_and_calls_nothing() {
            let (mut session, _) = session(MockAuthApi::new());

            let projection = session.access().await;

            assert_eq!(projection, TokenProjection::default());
            assert_eq!(session.status(), SessionStatus::Anonymous);
            assert_eq!(session.api().refresh_calls(), 0);
            assert!(!session.session_projection().authenticated);
        }

        #[tokio::test]
        async fn successful_login_activates() {
            let (session, _) = logged_in(MockAuthApi::new()).await;

            assert_eq!(session.status(), SessionStatus::Active);
            assert_eq!(token(&session.token_projection()), Some("a1"));

            let view = session.session_projection();
            assert!(view.authenticated);
            assert_eq!(view.user.unwrap().name, "kim");
        }

        #[tokio::test]
        async fn failed_login_leaves_state_unchanged() {
            let (mut session, _) = session(MockAuthApi::new().with_login(Err(401)));

            let err = session
                .login(Email::from_static("kim@example.com"), Password::from_static("bad"))
                .await
                .unwrap_err();

            assert!(matches!(err, LoginError::AuthenticationFailed(_)));
            assert_eq!(err.code(), "authentication_failed");
            assert_eq!(session.status(), SessionStatus::Anonymous);
            assert_eq!(session.state().epoch(), 0);
        }

        #[tokio::test]
        async fn blank_credentials_never_reach_the_authority() {
            let (mut session, _) = session(MockAuthApi::new());

            let err = session
                .login(Email::from_static("  "), Password::from_static("pw"))
                .await
                .unwrap_err();

            assert!(matches!(err, LoginError::MissingCredentials));
            assert_eq!(session.api().login_calls(), 0);
        }

        #[tokio::test]
        async fn grant_with_zero_lifetime_is_rejected() {
            let (mut session, _) =
                session(MockAuthApi::new().with_login(Ok(login_grant("a1", "r1", 0))));

            let err = session
                .login(Email::from_static("kim@example.com"), Password::from_static("pw"))
                .await
                .unwrap_err();

            assert!(matches!(err, LoginError::AuthenticationFailed(AuthApiError::Malformed(_))));
            assert_eq!(session.status(), SessionStatus::Anonymous);
        }
    }

    mod when_active {
        use super::*;

        #[tokio::test]
        async fn fresh_bundle_is_returned_without_refresh() {
            let (mut session, clock) = logged_in(MockAuthApi::new()).await;
            let before = session.state().bundle().cloned();

            clock.set(UnixTime(3_000));
            let projection = session.access().await;

            assert_eq!(token(&projection), Some("a1"));
            assert_eq!(session.api().refresh_calls(), 0);
            assert_eq!(session.state().bundle().cloned(), before);
        }

        #[tokio::test]
        async fn stale_bundle_is_refreshed_once() {
            let api = MockAuthApi::new().with_refresh(RefreshOutcome::rotated("a2", "r2", 3_600));
            let (mut session, clock) = logged_in(api).await;

            clock.set(UnixTime(3_400));
            let projection = session.access().await;

            assert_eq!(token(&projection), Some("a2"));
            assert_eq!(session.api().refresh_calls(), 1);

            let bundle = session.state().bundle().unwrap();
            assert_eq!(bundle.expiry(), UnixTime(7_000));
            assert_eq!(bundle.refresh_token().as_str(), "r2");

            session.access().await;
            assert_eq!(session.api().refresh_calls(), 1);
        }

        #[tokio::test]
        async fn refresh_without_rotation_keeps_refresh_token() {
            let api = MockAuthApi::new().with_refresh(RefreshOutcome::unrotated("a2", 3_600));
            let (mut session, clock) = logged_in(api).await;

            clock.set(UnixTime(3_500));
            session.access().await;

            assert_eq!(session.state().bundle().unwrap().refresh_token().as_str(), "r1");
        }

        #[tokio::test]
        async fn grant_without_refresh_token_is_never_refreshed() {
            let api = MockAuthApi::new()
                .with_login(Ok(login_grant("a1", "", 3_600)))
                .with_refresh(RefreshOutcome::rotated("a2", "r2", 3_600));
            let (mut session, clock) = logged_in(api).await;

            clock.set(UnixTime(3_400));
            let projection = session.access().await;

            assert_eq!(token(&projection), Some("a1"));
            assert_eq!(session.status(), SessionStatus::Active);
            assert_eq!(session.api().refresh_calls(), 0);
            assert_eq!(session.api().last_refresh_token(), None);
        }

        #[tokio::test]
        async fn expired_bundle_is_also_refreshed() {
            let api = MockAuthApi::new().with_refresh(RefreshOutcome::rotated("a2", "r2", 3_600));
            let (mut session, clock) = logged_in(api).await;

            clock.set(UnixTime(10_000));
            let projection = session.access().await;

            assert_eq!(token(&projection), Some("a2"));
        }

        #[tokio::test]
        async fn logout_discards_everything() {
            let (mut session, _) = logged_in(MockAuthApi::new()).await;

            session.logout();

            assert_eq!(session.status(), SessionStatus::Anonymous);
            assert_eq!(session.session_projection(), SessionProjection::default());
            assert_eq!(session.token_projection(), TokenProjection::default());
        }

        #[tokio::test]
        async fn profile_is_only_updated_when_asked() {
            let mut renamed = profile("kim");
            renamed.first_name = Some("Min".into());
            renamed.last_name = Some("Kim".into());
            let api = MockAuthApi::new().with_profile(Ok(renamed));
            let (mut session, _) = logged_in(api).await;

            session.access().await;
            assert_eq!(session.api().profile_calls(), 0);
            assert_eq!(session.session_projection().user.unwrap().name, "kim");

            let updated = session.refresh_profile().await.unwrap();
            assert_eq!(updated.display_name(), "Min Kim");
            assert_eq!(session.session_projection().user.unwrap().name, "Min Kim");
        }

        #[tokio::test]
        async fn failed_profile_fetch_keeps_previous_profile() {
            let api = MockAuthApi::new().with_profile(Err(503));
            let (mut session, _) = logged_in(api).await;

            let err = session.refresh_profile().await.unwrap_err();

            assert!(matches!(err, ProfileError::Fetch(_)));
            assert_eq!(session.session_projection().user.unwrap().name, "kim");
            assert_eq!(session.status(), SessionStatus::Active);
        }
    }

    mod when_refresh_fails {
        use super::*;

        #[tokio::test]
        async fn rejected_refresh_token_expires_session_and_sticks() {
            let api = MockAuthApi::new().with_refresh(RefreshOutcome::Status(401));
            let (mut session, clock) = logged_in(api).await;

            clock.set(UnixTime(3_000));
            session.access().await;
            assert_eq!(session.api().refresh_calls(), 0);

            clock.set(UnixTime(3_400));
            let projection = session.access().await;
            assert_eq!(session.api().refresh_calls(), 1);
            assert_eq!(
                session.status(),
                SessionStatus::Errored(TokenErrorKind::RefreshTokenExpired)
            );
            assert_eq!(projection.access_token, None);
            assert_eq!(projection.error, Some(TokenErrorKind::RefreshTokenExpired));

            clock.set(UnixTime(3_500));
            session.access().await;
            assert_eq!(session.api().refresh_calls(), 1);
        }

        #[tokio::test]
        async fn transient_failure_is_also_sticky() {
            let api = MockAuthApi::new()
                .with_refresh(RefreshOutcome::Status(502))
                .with_refresh(RefreshOutcome::rotated("a2", "r2", 3_600));
            let (mut session, clock) = logged_in(api).await;

            clock.set(UnixTime(3_400));
            session.access().await;
            clock.advance(DurationSecs(60));
            session.access().await;

            assert_eq!(
                session.status(),
                SessionStatus::Errored(TokenErrorKind::RefreshError)
            );
            assert_eq!(session.api().refresh_calls(), 1);
        }

        #[tokio::test]
        async fn errored_session_keeps_bundle_and_user_for_display() {
            let api = MockAuthApi::new().with_refresh(RefreshOutcome::Unreachable);
            let (mut session, clock) = logged_in(api).await;
            let before = session.state().bundle().cloned();

            clock.set(UnixTime(3_400));
            session.access().await;

            assert_eq!(session.state().bundle().cloned(), before);
            let view = session.session_projection();
            assert!(view.authenticated);
            assert!(view.needs_relogin());
            assert_eq!(view.error, Some(TokenErrorKind::RefreshError));
            assert_eq!(view.user.unwrap().name, "kim");
        }

        #[tokio::test]
        async fn profile_refresh_reports_errored_session() {
            let api = MockAuthApi::new().with_refresh(RefreshOutcome::Status(401));
            let (mut session, clock) = logged_in(api).await;

            clock.set(UnixTime(3_400));
            let err = session.refresh_profile().await.unwrap_err();

            assert!(matches!(
                err,
                ProfileError::SessionErrored(TokenErrorKind::RefreshTokenExpired)
            ));
            assert_eq!(session.api().profile_calls(), 0);
        }

        #[tokio::test]
        async fn fresh_login_clears_the_error() {
            let api = MockAuthApi::new().with_refresh(RefreshOutcome::Status(401));
            let (mut session, clock) = logged_in(api).await;

            clock.set(UnixTime(3_400));
            session.access().await;
            assert!(session.state().error().is_some());

            session.api().set_login(Ok(login_grant("a9", "r9", 3_600)));
            session
                .login(Email::from_static("kim@example.com"), Password::from_static("pw"))
                .await
                .unwrap();

            assert_eq!(session.status(), SessionStatus::Active);
            assert_eq!(token(&session.token_projection()), Some("a9"));
            assert_eq!(session.state().bundle().unwrap().expiry(), UnixTime(7_000));
        }

        #[tokio::test]
        async fn failed_relogin_keeps_the_error() {
            let api = MockAuthApi::new().with_refresh(RefreshOutcome::Status(401));
            let (mut session, clock) = logged_in(api).await;

            clock.set(UnixTime(3_400));
            session.access().await;

            session.api().set_login(Err(401));
            let result = session
                .login(Email::from_static("kim@example.com"), Password::from_static("pw"))
                .await;

            assert!(result.is_err());
            assert_eq!(
                session.status(),
                SessionStatus::Errored(TokenErrorKind::RefreshTokenExpired)
            );
        }

        #[tokio::test]
        async fn logout_from_errored_returns_to_anonymous() {
            let api = MockAuthApi::new().with_refresh(RefreshOutcome::Status(401));
            let (mut session, clock) = logged_in(api).await;

            clock.set(UnixTime(3_400));
            session.access().await;
            session.logout();

            assert_eq!(session.status(), SessionStatus::Anonymous);
            assert_eq!(session.state().error(), None);
        }
    }

    #[test]
    fn stale_refresh_results_are_not_applied() {
        let lifetime = BundleLifetimeConfig::default().with_clock(ManualClock::new(UnixTime(0)));
        let grant = login_grant("a1", "r1", 3_600);
        let (bundle, user) = admit_grant(&lifetime, grant).unwrap();

        let mut state = SessionState::new();
        state.begin(bundle.clone(), user);
        let epoch = state.epoch();
        state.end();

        assert!(!state.apply_refresh(epoch, Ok(bundle)));
        assert_eq!(state.status(), SessionStatus::Anonymous);
    }

    #[test]
    fn session_projection_serializes_for_the_rendering_layer() {
        let lifetime = BundleLifetimeConfig::default().with_clock(ManualClock::new(UnixTime(0)));
        let (bundle, user) = admit_grant(&lifetime, login_grant("a1", "r1", 3_600)).unwrap();
        let mut state = SessionState::new();
        state.begin(bundle, user);
        state.apply_refresh(state.epoch(), Err(TokenErrorKind::RefreshTokenExpired));

        let json = serde_json::to_value(state.session_projection()).unwrap();

        assert_eq!(
            json,
            serde_json::json!({
                "authenticated": true,
                "user": { "id": "id-kim", "email": "kim@example.com", "name": "kim" },
                "error": "RefreshTokenExpired"
            })
        );
    }
}
