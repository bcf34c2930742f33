use crate::CredentialBundle;

/// Holds the current credential bundle for one execution context
///
/// The store is plain owned state. Whoever owns it serializes access to it;
/// concurrent users go through [`SharedSession`](crate::SharedSession).
#[derive(Debug, Default)]
pub struct TokenStore {
    bundle: Option<CredentialBundle>,
}

impl TokenStore {
    /// Constructs an empty store
    pub const fn new() -> Self {
        Self { bundle: None }
    }

    /// Gets the current bundle, if any
    #[inline]
    pub fn get(&self) -> Option<&CredentialBundle> {
        self.bundle.as_ref()
    }

    /// Replaces the current bundle wholesale
    #[inline]
    pub fn set(&mut self, bundle: CredentialBundle) {
        self.bundle = Some(bundle);
    }

    /// Discards the current bundle
    #[inline]
    pub fn clear(&mut self) {
        self.bundle = None;
    }

    /// Removes and returns the current bundle
    #[inline]
    pub fn take(&mut self) -> Option<CredentialBundle> {
        self.bundle.take()
    }
}
