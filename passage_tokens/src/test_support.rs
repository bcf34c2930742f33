//! A scripted authority for unit tests

use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex,
    },
    time::Duration,
};

use async_trait::async_trait;

use crate::{
    authority::{
        dto::{LoginRequest, LoginResponse, RefreshResponse, UserProfile},
        AuthApi, AuthApiError,
    },
    AccessToken, AccessTokenRef, Email, RefreshToken, RefreshTokenRef, UserId,
};

#[derive(Clone, Debug)]
pub(crate) enum RefreshOutcome {
    Granted(RefreshResponse),
    Status(u16),
    Unreachable,
}

impl RefreshOutcome {
    pub(crate) fn rotated(access: &'static str, refresh: &'static str, expires_in: u64) -> Self {
        Self::Granted(RefreshResponse {
            access_token: AccessToken::from_static(access),
            refresh_token: Some(RefreshToken::from_static(refresh)),
            expires_in,
        })
    }

    pub(crate) fn unrotated(access: &'static str, expires_in: u64) -> Self {
        Self::Granted(RefreshResponse {
            access_token: AccessToken::from_static(access),
            refresh_token: None,
            expires_in,
        })
    }

    fn into_result(self) -> Result<RefreshResponse, AuthApiError> {
        match self {
            Self::Granted(resp) => Ok(resp),
            Self::Status(status) => Err(status_error(status)),
            Self::Unreachable => Err(AuthApiError::RequestSend("connection refused".into())),
        }
    }
}

fn status_error(status: u16) -> AuthApiError {
    AuthApiError::Status {
        status,
        body: String::new(),
    }
}

pub(crate) fn profile(username: &str) -> UserProfile {
    UserProfile {
        id: UserId::new(format!("id-{}", username)),
        email: Email::new(format!("{}@example.com", username)),
        username: username.to_owned(),
        first_name: None,
        last_name: None,
        avatar: None,
        role: Some("USER".into()),
        status: Some("ACTIVE".into()),
    }
}

pub(crate) fn login_grant(access: &'static str, refresh: &'static str, expires_in: u64) -> LoginResponse {
    LoginResponse {
        user: profile("kim"),
        access_token: AccessToken::from_static(access),
        refresh_token: RefreshToken::from_static(refresh),
        expires_in,
    }
}

/// Answers from scripted outcomes and counts the calls it receives
///
/// Refresh outcomes are consumed in order; the last one is repeated once
/// the script runs out.
#[derive(Debug)]
pub(crate) struct MockAuthApi {
    login: Mutex<Result<LoginResponse, u16>>,
    refresh: Mutex<VecDeque<RefreshOutcome>>,
    profile: Mutex<Result<UserProfile, u16>>,
    refresh_delay: Option<Duration>,
    login_calls: AtomicUsize,
    refresh_calls: AtomicUsize,
    profile_calls: AtomicUsize,
    last_refresh_token: Mutex<Option<RefreshToken>>,
}

impl MockAuthApi {
    pub(crate) fn new() -> Self {
        Self {
            login: Mutex::new(Ok(login_grant("a1", "r1", 3_600))),
            refresh: Mutex::new(VecDeque::new()),
            profile: Mutex::new(Ok(profile("kim"))),
            refresh_delay: None,
            login_calls: AtomicUsize::new(0),
            refresh_calls: AtomicUsize::new(0),
            profile_calls: AtomicUsize::new(0),
            last_refresh_token: Mutex::new(None),
        }
    }

    pub(crate) fn with_login(self, outcome: Result<LoginResponse, u16>) -> Self {
        *self.login.lock().unwrap() = outcome;
        self
    }

    pub(crate) fn with_refresh(self, outcome: RefreshOutcome) -> Self {
        self.refresh.lock().unwrap().push_back(outcome);
        self
    }

    pub(crate) fn with_profile(self, outcome: Result<UserProfile, u16>) -> Self {
        *self.profile.lock().unwrap() = outcome;
        self
    }

    pub(crate) fn with_refresh_delay(mut self, delay: Duration) -> Self {
        self.refresh_delay = Some(delay);
        self
    }

    pub(crate) fn set_login(&self, outcome: Result<LoginResponse, u16>) {
        *self.login.lock().unwrap() = outcome;
    }

    pub(crate) fn login_calls(&self) -> usize {
        self.login_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn profile_calls(&self) -> usize {
        self.profile_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn last_refresh_token(&self) -> Option<RefreshToken> {
        self.last_refresh_token.lock().unwrap().clone()
    }

    fn next_refresh(&self) -> RefreshOutcome {
        let mut script = self.refresh.lock().unwrap();
        if script.len() > 1 {
            script.pop_front().unwrap()
        } else {
            script
                .front()
                .cloned()
                .unwrap_or(RefreshOutcome::Unreachable)
        }
    }
}

#[async_trait]
impl AuthApi for MockAuthApi {
    async fn login(&self, _request: &LoginRequest) -> Result<LoginResponse, AuthApiError> {
        self.login_calls.fetch_add(1, Ordering::SeqCst);
        self.login.lock().unwrap().clone().map_err(status_error)
    }

    async fn refresh(
        &self,
        refresh_token: &RefreshTokenRef,
    ) -> Result<RefreshResponse, AuthApiError> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_refresh_token.lock().unwrap() = Some(refresh_token.to_owned());
        let outcome = self.next_refresh();

        if let Some(delay) = self.refresh_delay {
            tokio::time::sleep(delay).await;
        }

        outcome.into_result()
    }

    async fn fetch_profile(
        &self,
        _access_token: &AccessTokenRef,
    ) -> Result<UserProfile, AuthApiError> {
        self.profile_calls.fetch_add(1, Ordering::SeqCst);
        self.profile.lock().unwrap().clone().map_err(status_error)
    }
}
