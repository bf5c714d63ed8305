//! Authorization gate
//!
//! Sign-in happens upstream; requests arrive with the signed-in email in a
//! trusted header. This module only decides whether that email may operate
//! the server.
//!
//! ```ignore
//! async fn restart(user: AuthorizedUser) -> impl IntoResponse { }
//! ```

use std::collections::HashSet;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::error::ApiError;
use crate::state::AppState;

/// Emails allowed to use the dashboard
#[derive(Clone, Debug, Default)]
pub struct AllowList {
    emails: HashSet<String>,
}

impl AllowList {
    pub fn new<I, S>(emails: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let emails = emails
            .into_iter()
            .map(|e| e.as_ref().trim().to_ascii_lowercase())
            .filter(|e| !e.is_empty())
            .collect();
        Self { emails }
    }

    /// Parse the comma separated `AUTHORIZED_EMAILS` format
    pub fn from_csv(csv: &str) -> Self {
        Self::new(csv.split(','))
    }

    pub fn is_allowed(&self, email: &str) -> bool {
        self.emails.contains(&email.trim().to_ascii_lowercase())
    }

    pub fn len(&self) -> usize {
        self.emails.len()
    }

    pub fn is_empty(&self) -> bool {
        self.emails.is_empty()
    }
}

/// A request whose identity is on the allow-list
///
/// Rejects with `401` when no identity is present and `403` when the
/// identity is not allow-listed.
#[derive(Clone, Debug)]
pub struct AuthorizedUser {
    email: String,
}

impl AuthorizedUser {
    pub fn email(&self) -> &str {
        &self.email
    }
}

impl FromRequestParts<AppState> for AuthorizedUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let email = parts
            .headers
            .get(&state.identity_header)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or(ApiError::Unauthorized)?;

        if !state.allow_list.is_allowed(email) {
            tracing::warn!(%email, path = %parts.uri.path(), "unauthorized dashboard access");
            return Err(ApiError::Forbidden);
        }

        Ok(Self {
            email: email.to_string(),
        })
    }
}
