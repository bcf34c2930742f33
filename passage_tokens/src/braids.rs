use aliri_braid::braid;
use std::fmt;

/// Redacts a credential in `Debug` and `Display`
///
/// The alternate form reveals a prefix of at most `$default` characters
/// (`Debug`) or `$display` characters (`Display`), overridable with a width.
macro_rules! limited_reveal {
    ($ty:ty: $hidden:literal, $default:literal, $display:expr) => {
        impl fmt::Debug for $ty {
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                if f.alternate() {
                    f.write_str("\"")?;
                    limited_reveal(&self.0, &mut *f, $default)?;
                    f.write_str("\"")
                } else {
                    f.write_str(concat!("***", $hidden, "***"))
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                if f.alternate() {
                    limited_reveal(&self.0, &mut *f, $display)
                } else {
                    f.write_str(concat!("***", $hidden, "***"))
                }
            }
        }
    };
}

fn limited_reveal(unprotected: &str, f: &mut fmt::Formatter, default_len: usize) -> fmt::Result {
    let max_len = f.width().unwrap_or(default_len);
    if max_len <= 1 {
        f.write_str("…")
    } else if max_len > unprotected.len() {
        f.write_str(unprotected)
    } else {
        match unprotected.char_indices().nth(max_len - 2) {
            Some((idx, c)) if idx + c.len_utf8() < unprotected.len() => {
                f.write_str(&unprotected[0..idx + c.len_utf8()])?;
                f.write_str("…")
            }
            _ => f.write_str(unprotected),
        }
    }
}

/// A bearer access token, opaque to this crate
#[braid(serde, debug = "owned", display = "owned")]
pub struct AccessToken;

limited_reveal!(AccessTokenRef: "ACCESS TOKEN", 15, usize::MAX);

/// A refresh token, exchanged with the authority for a new access token
#[braid(serde, debug = "owned", display = "owned")]
pub struct RefreshToken;

limited_reveal!(RefreshTokenRef: "REFRESH TOKEN", 5, 5);

/// A password, only ever held long enough to perform a login
#[braid(serde, debug = "owned", display = "owned")]
pub struct Password;

limited_reveal!(PasswordRef: "PASSWORD", 0, 0);

/// The authority's identifier for a user
#[braid(serde)]
pub struct UserId;

/// An email address as entered by a user
#[braid(serde)]
pub struct Email;

impl EmailRef {
    /// The address with ASCII letters lower-cased, as the authority expects
    pub fn normalized(&self) -> Email {
        Email::new(self.as_str().to_ascii_lowercase())
    }
}
