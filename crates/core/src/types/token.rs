//! Opaque credentials issued by the upstream commerce API.
//!
//! Both token types serialize as plain strings but never print their value
//! through `Debug`, so they can sit inside structs that are logged.

use core::fmt;

use serde::{Deserialize, Serialize};

use super::user::SessionUser;

macro_rules! define_token {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wrap a raw token string.
            #[must_use]
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Returns the raw token value.
            #[must_use]
            pub fn expose(&self) -> &str {
                &self.0
            }

            /// Whether the upstream handed back an empty string.
            #[must_use]
            pub fn is_empty(&self) -> bool {
                self.0.trim().is_empty()
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(concat!(stringify!($name), "([REDACTED])"))
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

define_token!(
    /// Short-lived bearer credential sent in the `Authorization` header.
    BearerToken
);

define_token!(
    /// Longer-lived credential exchanged for a new [`BearerToken`].
    RefreshToken
);

impl BearerToken {
    /// Value for an `Authorization` header.
    #[must_use]
    pub fn header_value(&self) -> String {
        format!("Bearer {}", self.0)
    }

    /// Extract the token from an `Authorization: Bearer <token>` value.
    ///
    /// The scheme is matched case-insensitively.
    #[must_use]
    pub fn from_header_value(value: &str) -> Option<Self> {
        let (scheme, token) = value.trim().split_once(' ')?;
        if !scheme.eq_ignore_ascii_case("bearer") {
            return None;
        }
        let token = token.trim();
        (!token.is_empty()).then(|| Self(token.to_owned()))
    }
}

/// Token pair and profile returned by the login and signup endpoints.
///
/// This is the `data` member of a successful `/api/login` or `/api/signup`
/// response and what the session client hands to `set_session`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthPayload {
    pub auth_token: BearerToken,
    #[serde(default)]
    pub refresh_token: Option<RefreshToken>,
    #[serde(default)]
    pub user: Option<SessionUser>,
}
