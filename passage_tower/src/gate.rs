use std::{fmt, sync::Arc};

use http::HeaderValue;
use thiserror::Error;

/// Paths reachable without a session
pub const DEFAULT_PUBLIC_PATHS: &[&str] = &["/", "/login", "/signup", "/home"];

/// Paths that only make sense without a session
pub const DEFAULT_SIGN_IN_PATHS: &[&str] = &["/login", "/signup"];

/// Where anonymous users are sent
pub const DEFAULT_UNAUTHENTICATED_REDIRECT: &str = "/home";

/// Where signed-in users are sent when they visit a sign-in path
pub const DEFAULT_AUTHENTICATED_REDIRECT: &str = "/";

const EXEMPT_PREFIXES: &[&str] = &["/api", "/_next/static", "/_next/image"];
const EXEMPT_FILES: &[&str] = &["/favicon.ico"];
const EXEMPT_EXTENSIONS: &[&str] = &["svg", "png", "jpg", "jpeg", "gif", "webp", "ico"];

/// A redirect target could not be used as a `Location` header
#[derive(Debug, Error)]
#[error("invalid redirect target {target:?}")]
pub struct InvalidRedirect {
    target: String,
    #[source]
    source: http::header::InvalidHeaderValue,
}

/// A path to redirect to, validated as a `Location` header value
#[derive(Clone, PartialEq, Eq)]
pub struct RedirectTarget {
    path: Arc<str>,
    header: HeaderValue,
}

impl RedirectTarget {
    /// Validates `path` as a redirect target
    pub fn new(path: &str) -> Result<Self, InvalidRedirect> {
        let header = HeaderValue::from_str(path).map_err(|source| InvalidRedirect {
            target: path.to_owned(),
            source,
        })?;

        Ok(Self {
            path: Arc::from(path),
            header,
        })
    }

    fn from_static(path: &'static str) -> Self {
        Self {
            path: Arc::from(path),
            header: HeaderValue::from_static(path),
        }
    }

    /// The target path
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.path
    }

    /// The target as a header value
    #[inline]
    pub fn header_value(&self) -> &HeaderValue {
        &self.header
    }
}

impl fmt::Debug for RedirectTarget {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Debug::fmt(&*self.path, f)
    }
}

impl fmt::Display for RedirectTarget {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.path)
    }
}

/// The outcome of gating a navigation
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Decision<'a> {
    /// Let the request through unchanged
    Allow,
    /// Send the user elsewhere
    Redirect(&'a RedirectTarget),
}

impl<'a> Decision<'a> {
    /// Where to redirect to, if anywhere
    pub fn redirect_target(&self) -> Option<&'a str> {
        match self {
            Self::Allow => None,
            Self::Redirect(target) => Some(target.as_str()),
        }
    }
}

/// Decides whether a navigation may proceed given the user's authentication state
///
/// Public paths are open to everyone. Any other path requires a session;
/// anonymous users are redirected to the unauthenticated entry point.
/// Signed-in users visiting a sign-in path are redirected to the application
/// entry point instead of being shown a login form.
#[derive(Clone, Debug)]
pub struct AccessGate {
    public_paths: Vec<String>,
    sign_in_paths: Vec<String>,
    unauthenticated_redirect: RedirectTarget,
    authenticated_redirect: RedirectTarget,
}

impl Default for AccessGate {
    fn default() -> Self {
        Self {
            public_paths: DEFAULT_PUBLIC_PATHS.iter().map(|&p| p.to_owned()).collect(),
            sign_in_paths: DEFAULT_SIGN_IN_PATHS.iter().map(|&p| p.to_owned()).collect(),
            unauthenticated_redirect: RedirectTarget::from_static(DEFAULT_UNAUTHENTICATED_REDIRECT),
            authenticated_redirect: RedirectTarget::from_static(DEFAULT_AUTHENTICATED_REDIRECT),
        }
    }
}

impl AccessGate {
    /// A gate with the default paths and redirects
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `path` reachable without a session
    #[must_use]
    pub fn with_public_path(mut self, path: impl Into<String>) -> Self {
        self.public_paths.push(path.into());
        self
    }

    /// Marks `path` as a sign-in path
    ///
    /// Sign-in paths are also public.
    #[must_use]
    pub fn with_sign_in_path(mut self, path: impl Into<String>) -> Self {
        let path = path.into();
        if !self.public_paths.contains(&path) {
            self.public_paths.push(path.clone());
        }
        self.sign_in_paths.push(path);
        self
    }

    /// Sets where anonymous users are sent
    pub fn with_unauthenticated_redirect(mut self, target: &str) -> Result<Self, InvalidRedirect> {
        self.unauthenticated_redirect = RedirectTarget::new(target)?;
        Ok(self)
    }

    /// Sets where signed-in users visiting a sign-in path are sent
    pub fn with_authenticated_redirect(mut self, target: &str) -> Result<Self, InvalidRedirect> {
        self.authenticated_redirect = RedirectTarget::new(target)?;
        Ok(self)
    }

    /// Whether `path` is open to everyone
    pub fn is_public(&self, path: &str) -> bool {
        self.public_paths.iter().any(|p| p == path)
    }

    /// Whether `path` is a sign-in path
    pub fn is_sign_in(&self, path: &str) -> bool {
        self.sign_in_paths.iter().any(|p| p == path)
    }

    /// Whether `path` bypasses the gate entirely
    ///
    /// API routes, framework assets, the favicon, and image files are never
    /// gated.
    pub fn is_exempt(&self, path: &str) -> bool {
        let under = |prefix: &str| {
            path.strip_prefix(prefix)
                .map_or(false, |rest| rest.is_empty() || rest.starts_with('/'))
        };

        if EXEMPT_PREFIXES.iter().any(|p| under(p)) || EXEMPT_FILES.contains(&path) {
            return true;
        }

        path.rsplit_once('.').map_or(false, |(_, ext)| {
            EXEMPT_EXTENSIONS
                .iter()
                .any(|e| e.eq_ignore_ascii_case(ext))
        })
    }

    /// Decides what to do with a navigation to `path`
    pub fn decide(&self, path: &str, authenticated: bool) -> Decision<'_> {
        if authenticated && self.is_sign_in(path) {
            return Decision::Redirect(&self.authenticated_redirect);
        }

        if !authenticated && !self.is_public(path) {
            return Decision::Redirect(&self.unauthenticated_redirect);
        }

        Decision::Allow
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod when_anonymous {
        use super::*;

        #[test]
        fn public_paths_are_allowed() {
            let gate = AccessGate::default();

            for path in ["/", "/login", "/signup", "/home"] {
                assert_eq!(gate.decide(path, false), Decision::Allow, "{}", path);
            }
        }

        #[test]
        fn private_paths_redirect_to_home() {
            let gate = AccessGate::default();

            assert_eq!(gate.decide("/dashboard", false).redirect_target(), Some("/home"));
            assert_eq!(gate.decide("/settings/profile", false).redirect_target(), Some("/home"));
        }

        #[test]
        fn public_matching_is_exact() {
            let gate = AccessGate::default();

            assert_eq!(gate.decide("/login/", false).redirect_target(), Some("/home"));
            assert_eq!(gate.decide("/homepage", false).redirect_target(), Some("/home"));
        }
    }

    mod when_authenticated {
        use super::*;

        #[test]
        fn sign_in_paths_redirect_to_root() {
            let gate = AccessGate::default();

            assert_eq!(gate.decide("/login", true).redirect_target(), Some("/"));
            assert_eq!(gate.decide("/signup", true).redirect_target(), Some("/"));
        }

        #[test]
        fn everything_else_is_allowed() {
            let gate = AccessGate::default();

            for path in ["/", "/home", "/dashboard"] {
                assert_eq!(gate.decide(path, true), Decision::Allow, "{}", path);
            }
        }
    }

    #[test]
    fn custom_paths_and_targets() {
        let gate = AccessGate::new()
            .with_public_path("/about")
            .with_sign_in_path("/register")
            .with_unauthenticated_redirect("/login")
            .unwrap()
            .with_authenticated_redirect("/dashboard")
            .unwrap();

        assert_eq!(gate.decide("/about", false), Decision::Allow);
        assert_eq!(gate.decide("/register", false), Decision::Allow);
        assert_eq!(gate.decide("/register", true).redirect_target(), Some("/dashboard"));
        assert_eq!(gate.decide("/orders", false).redirect_target(), Some("/login"));
    }

    #[test]
    fn unusable_redirect_target_is_rejected() {
        let err = AccessGate::new()
            .with_unauthenticated_redirect("/bad\npath")
            .unwrap_err();

        assert!(err.to_string().contains("invalid redirect target"));
    }

    #[test]
    fn assets_and_api_routes_are_exempt() {
        let gate = AccessGate::default();

        for path in [
            "/api",
            "/api/v1/auth/login",
            "/_next/static/chunks/main.js",
            "/_next/image",
            "/favicon.ico",
            "/images/logo.svg",
            "/photo.JPG",
            "/a/b/c.webp",
            "/icons/app.ico",
        ] {
            assert!(gate.is_exempt(path), "{}", path);
        }
    }

    #[test]
    fn pages_are_not_exempt() {
        let gate = AccessGate::default();

        for path in ["/", "/dashboard", "/apiary", "/_next", "/report.pdf", "/v1.2/notes"] {
            assert!(!gate.is_exempt(path), "{}", path);
        }
    }
}
