use passage_clock::{Clock, DurationSecs, System, UnixTime};
use serde::{Deserialize, Serialize};

use crate::{AccessToken, AccessTokenRef, RefreshToken, RefreshTokenRef};

/// How long before expiry a bundle becomes eligible for a proactive refresh
pub const REFRESH_THRESHOLD: DurationSecs = DurationSecs(5 * 60);

/// An access/refresh token pair with the lifetime metadata derived when it was issued
///
/// Bundles are never edited. A refresh produces a whole new bundle, so the
/// expiry is always consistent with the access token it describes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialBundle {
    access_token: AccessToken,
    refresh_token: RefreshToken,
    lifetime: DurationSecs,
    issued: UnixTime,
    stale: UnixTime,
    expiry: UnixTime,
}

/// A bundle's lifecycle status
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BundleStatus {
    /// The access token is valid and not yet due for refresh
    Fresh,
    /// The access token is valid, but within the refresh threshold of its expiry
    Stale,
    /// The access token is no longer valid
    Expired,
}

impl CredentialBundle {
    /// Gets the access token
    #[inline]
    pub fn access_token(&self) -> &AccessTokenRef {
        &self.access_token
    }

    /// Gets the refresh token
    #[inline]
    pub fn refresh_token(&self) -> &RefreshTokenRef {
        &self.refresh_token
    }

    /// Gets the lifetime the authority declared for the access token
    #[inline]
    pub fn lifetime(&self) -> DurationSecs {
        self.lifetime
    }

    /// Gets the time that the bundle was issued
    #[inline]
    pub fn issued(&self) -> UnixTime {
        self.issued
    }

    /// Gets the time from which the bundle should be refreshed
    #[inline]
    pub fn stale(&self) -> UnixTime {
        self.stale
    }

    /// Gets the time that the access token expires
    #[inline]
    pub fn expiry(&self) -> UnixTime {
        self.expiry
    }

    /// Gets the bundle's status as of the provided time
    #[inline]
    pub fn status_at(&self, time: UnixTime) -> BundleStatus {
        if time < self.stale {
            BundleStatus::Fresh
        } else if time < self.expiry {
            BundleStatus::Stale
        } else {
            BundleStatus::Expired
        }
    }

    /// Whether the bundle is due for refresh as of the provided time
    #[inline]
    pub fn needs_refresh_at(&self, time: UnixTime) -> bool {
        !matches!(self.status_at(time), BundleStatus::Fresh)
    }

    /// Gets how much longer the access token would be valid as of the provided time
    #[inline]
    pub fn until_expired_at(&self, time: UnixTime) -> DurationSecs {
        self.expiry - time
    }
}

/// Mints bundles against a clock and a refresh threshold
#[derive(Clone, Debug)]
pub struct BundleLifetimeConfig<C = System> {
    refresh_threshold: DurationSecs,
    clock: C,
}

impl Default for BundleLifetimeConfig {
    /// Uses [`REFRESH_THRESHOLD`] and the system clock
    fn default() -> Self {
        Self {
            refresh_threshold: REFRESH_THRESHOLD,
            clock: System,
        }
    }
}

impl BundleLifetimeConfig {
    /// Constructs a configuration with a custom refresh threshold
    pub fn new(refresh_threshold: DurationSecs) -> Self {
        Self {
            refresh_threshold,
            clock: System,
        }
    }
}

impl<C> BundleLifetimeConfig<C> {
    /// Replaces the clock used to stamp and evaluate bundles
    pub fn with_clock<D>(self, clock: D) -> BundleLifetimeConfig<D> {
        BundleLifetimeConfig {
            refresh_threshold: self.refresh_threshold,
            clock,
        }
    }

    /// The configured refresh threshold
    #[inline]
    pub fn refresh_threshold(&self) -> DurationSecs {
        self.refresh_threshold
    }

    /// The configured clock
    #[inline]
    pub fn clock(&self) -> &C {
        &self.clock
    }
}

impl<C: Clock> BundleLifetimeConfig<C> {
    /// The current time according to the configured clock
    #[inline]
    pub fn now(&self) -> UnixTime {
        self.clock.now()
    }

    /// Builds a bundle issued now, expiring `lifetime` from now
    pub fn create_bundle(
        &self,
        access_token: AccessToken,
        refresh_token: RefreshToken,
        lifetime: DurationSecs,
    ) -> CredentialBundle {
        let issued = self.clock.now();
        let expiry = issued + lifetime;
        CredentialBundle {
            access_token,
            refresh_token,
            lifetime,
            issued,
            stale: (expiry - self.refresh_threshold).max(issued),
            expiry,
        }
    }

    /// Gets the bundle's status according to the configured clock
    #[inline]
    pub fn status(&self, bundle: &CredentialBundle) -> BundleStatus {
        bundle.status_at(self.clock.now())
    }
}

#[cfg(test)]
mod tests {
    use passage_clock::TestClock;

    use super::*;

    fn config_at(time: u64) -> BundleLifetimeConfig<TestClock> {
        BundleLifetimeConfig::default().with_clock(TestClock::new(UnixTime(time)))
    }

    fn bundle(config: &BundleLifetimeConfig<TestClock>, lifetime: u64) -> CredentialBundle {
        config.create_bundle(
            AccessToken::from_static("access"),
            RefreshToken::from_static("refresh"),
            DurationSecs(lifetime),
        )
    }

    #[test]
    fn expiry_and_stale_are_derived_from_issue_time() {
        let config = config_at(1_000);
        let bundle = bundle(&config, 3_600);

        assert_eq!(bundle.issued(), UnixTime(1_000));
        assert_eq!(bundle.expiry(), UnixTime(4_600));
        assert_eq!(bundle.stale(), UnixTime(4_300));
        assert_eq!(bundle.lifetime(), DurationSecs(3_600));
    }

    #[test]
    fn status_transitions_at_threshold_and_expiry() {
        let bundle = bundle(&config_at(0), 3_600);

        assert_eq!(bundle.status_at(UnixTime(3_000)), BundleStatus::Fresh);
        assert_eq!(bundle.status_at(UnixTime(3_299)), BundleStatus::Fresh);
        assert_eq!(bundle.status_at(UnixTime(3_300)), BundleStatus::Stale);
        assert_eq!(bundle.status_at(UnixTime(3_599)), BundleStatus::Stale);
        assert_eq!(bundle.status_at(UnixTime(3_600)), BundleStatus::Expired);
    }

    #[test]
    fn short_lived_bundle_is_stale_from_the_start() {
        let config = config_at(50);
        let bundle = bundle(&config, 120);

        assert_eq!(bundle.stale(), UnixTime(50));
        assert_eq!(config.status(&bundle), BundleStatus::Stale);
        assert!(bundle.needs_refresh_at(UnixTime(50)));
    }

    #[test]
    fn remaining_validity_saturates_after_expiry() {
        let bundle = bundle(&config_at(0), 60);

        assert_eq!(bundle.until_expired_at(UnixTime(20)), DurationSecs(40));
        assert_eq!(bundle.until_expired_at(UnixTime(90)), DurationSecs(0));
    }
}
