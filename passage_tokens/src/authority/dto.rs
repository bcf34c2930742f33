//! Request and response bodies exchanged with the authority

use serde::{Deserialize, Serialize};

use crate::{AccessToken, Email, Password, RefreshToken, RefreshTokenRef, UserId};

/// Login credentials
#[derive(Debug, Serialize)]
pub struct LoginRequest {
    /// The user's email address
    pub email: Email,

    /// The user's password
    pub password: Password,
}

impl LoginRequest {
    /// Builds a request with the email normalized the way the authority stores it
    pub fn new(email: Email, password: Password) -> Self {
        Self {
            email: email.normalized(),
            password,
        }
    }
}

/// The body of a refresh request
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest<'a> {
    /// The refresh token being exchanged
    pub refresh_token: &'a RefreshTokenRef,
}

/// A successful login
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    /// The authenticated user
    pub user: UserProfile,

    /// The new access token
    pub access_token: AccessToken,

    /// The new refresh token
    pub refresh_token: RefreshToken,

    /// Lifetime of the access token in seconds
    pub expires_in: u64,
}

/// A successful refresh
///
/// Authorities do not always rotate refresh tokens, so the new one is optional.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResponse {
    /// The new access token
    pub access_token: AccessToken,

    /// A rotated refresh token, if the authority issued one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<RefreshToken>,

    /// Lifetime of the new access token in seconds
    pub expires_in: u64,
}

/// A snapshot of the user's profile as reported by the authority
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    /// The authority's identifier for the user
    pub id: UserId,
    /// Email address
    pub email: Email,
    /// Username
    pub username: String,
    /// Given name
    #[serde(default)]
    pub first_name: Option<String>,
    /// Family name
    #[serde(default)]
    pub last_name: Option<String>,
    /// Avatar image URL
    #[serde(default)]
    pub avatar: Option<String>,
    /// Role, such as `USER` or `ADMIN`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    /// Account status, such as `ACTIVE`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

impl UserProfile {
    /// The name to show for this user: "first last", or the username when both are blank
    pub fn display_name(&self) -> String {
        let first = self.first_name.as_deref().unwrap_or_default();
        let last = self.last_name.as_deref().unwrap_or_default();
        let full = format!("{} {}", first, last);
        let full = full.trim();

        if full.is_empty() {
            self.username.clone()
        } else {
            full.to_owned()
        }
    }
}
