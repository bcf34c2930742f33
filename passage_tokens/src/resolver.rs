//! Choosing the bearer token for an outbound call
//!
//! Server-side work reads the token supplied for the request being handled.
//! Browser-side work prefers the session's own token and falls back to a
//! token persisted in durable storage. The two contexts never share tokens.

use std::{error, fmt, future::Future, sync::Arc};

use async_trait::async_trait;
use passage_clock::Clock;

use crate::{authority::AuthApi, AccessToken, SharedSession};

pub mod storage;

pub use storage::{DurableStorage, InMemoryStorage, StorageError};
#[cfg(feature = "file")]
pub use storage::FileStorage;

/// The storage key under which a fallback access token is persisted
pub const AUTH_TOKEN_KEY: &str = "auth-token";

tokio::task_local! {
    static SERVER_REQUEST_TOKEN: Option<AccessToken>;
}

/// The access token of the server-side request currently being handled
///
/// The token is visible only to the future passed to [`scope()`][Self::scope]
/// and is gone once that future completes, fails, panics, or is dropped.
/// Work spawned onto other tasks does not inherit it.
#[derive(Clone, Copy, Debug)]
pub struct ServerRequestToken;

impl ServerRequestToken {
    /// Runs `fut` with `token` as the current request's token
    pub async fn scope<F: Future>(token: Option<AccessToken>, fut: F) -> F::Output {
        SERVER_REQUEST_TOKEN.scope(token, fut).await
    }

    /// Runs `f` with `token` as the current request's token
    pub fn sync_scope<R>(token: Option<AccessToken>, f: impl FnOnce() -> R) -> R {
        SERVER_REQUEST_TOKEN.sync_scope(token, f)
    }

    /// The current request's token, if one was supplied
    pub fn current() -> Option<AccessToken> {
        SERVER_REQUEST_TOKEN
            .try_with(|token| token.clone())
            .ok()
            .flatten()
    }
}

/// Looks up the access token of the active session
#[async_trait]
pub trait SessionTokenLookup: Send + Sync {
    /// The session's current access token, if it has one
    async fn session_token(
        &self,
    ) -> Result<Option<AccessToken>, Box<dyn error::Error + Send + Sync + 'static>>;
}

#[async_trait]
impl<A, C> SessionTokenLookup for SharedSession<A, C>
where
    A: AuthApi,
    C: Clock + Send + Sync,
{
    async fn session_token(
        &self,
    ) -> Result<Option<AccessToken>, Box<dyn error::Error + Send + Sync + 'static>> {
        Ok(self.access().await.access_token)
    }
}

/// Where to look for a token in a browser context
#[derive(Clone, Default)]
pub struct BrowserCredentials {
    session: Option<Arc<dyn SessionTokenLookup>>,
    storages: Vec<Arc<dyn DurableStorage>>,
}

impl BrowserCredentials {
    /// No session and no fallback storage
    pub fn new() -> Self {
        Self::default()
    }

    /// Consults `session` first
    #[must_use]
    pub fn with_session(mut self, session: impl SessionTokenLookup + 'static) -> Self {
        self.session = Some(Arc::new(session));
        self
    }

    /// Adds a fallback storage, consulted after any added earlier
    #[must_use]
    pub fn with_storage(mut self, storage: Arc<dyn DurableStorage>) -> Self {
        self.storages.push(storage);
        self
    }

    async fn session_token(&self) -> Option<AccessToken> {
        let session = self.session.as_ref()?;
        match session.session_token().await {
            Ok(token) => token.filter(|t| !t.as_str().is_empty()),
            Err(error) => {
                tracing::warn!(error = (&*error as &dyn error::Error), "session lookup failed");
                None
            }
        }
    }

    async fn persisted_token(&self) -> Option<AccessToken> {
        for storage in &self.storages {
            match storage.get_item(AUTH_TOKEN_KEY).await {
                Ok(Some(token)) if !token.is_empty() => return Some(AccessToken::new(token)),
                Ok(_) => {}
                Err(error) => {
                    tracing::warn!(
                        error = (&error as &dyn error::Error),
                        "unable to read persisted token"
                    );
                }
            }
        }

        None
    }
}

impl fmt::Debug for BrowserCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BrowserCredentials")
            .field("has_session", &self.session.is_some())
            .field("storages", &self.storages)
            .finish()
    }
}

/// The context in which a token is being resolved
#[derive(Clone, Debug)]
pub enum ExecutionContext {
    /// Handling a request on the server
    Server,
    /// Running on behalf of a signed-in browser user
    Browser(BrowserCredentials),
}

/// Resolves the best available bearer token for the current context
#[derive(Clone, Debug)]
pub struct CredentialResolver {
    context: ExecutionContext,
}

impl CredentialResolver {
    /// Constructs a resolver for `context`
    pub fn new(context: ExecutionContext) -> Self {
        Self { context }
    }

    /// A resolver reading the server request token
    pub fn server() -> Self {
        Self::new(ExecutionContext::Server)
    }

    /// A resolver consulting browser credentials
    pub fn browser(credentials: BrowserCredentials) -> Self {
        Self::new(ExecutionContext::Browser(credentials))
    }

    /// The context this resolver serves
    pub fn context(&self) -> &ExecutionContext {
        &self.context
    }

    /// The bearer token to attach to an outbound call, if any
    ///
    /// Absence is not an error; the caller decides whether to proceed
    /// unauthenticated.
    ///
    /// In a browser context backed by a [`SharedSession`], asking the session
    /// for its token is a session access: a stale bundle is refreshed first,
    /// and a failed refresh leaves the session errored. Server resolution and
    /// storage lookups never change any state.
    pub async fn resolve(&self) -> Option<AccessToken> {
        let token = match &self.context {
            ExecutionContext::Server => ServerRequestToken::current(),
            ExecutionContext::Browser(credentials) => match credentials.session_token().await {
                Some(token) => Some(token),
                None => credentials.persisted_token().await,
            },
        };

        if token.is_none() {
            tracing::trace!(status = "unauthenticated", "no bearer token available");
        }

        token
    }

    /// Removes persisted fallback tokens
    ///
    /// Called after the API rejects a token, so that a rejected fallback is
    /// not presented again. Does nothing in a server context.
    pub async fn forget_persisted(&self) {
        let ExecutionContext::Browser(credentials) = &self.context else {
            return;
        };

        for storage in &credentials.storages {
            if let Err(error) = storage.remove_item(AUTH_TOKEN_KEY).await {
                tracing::warn!(
                    error = (&error as &dyn error::Error),
                    "unable to remove persisted token"
                );
            }
        }
    }
}
