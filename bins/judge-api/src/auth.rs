// Caller identity supplied by the upstream auth gateway

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use judge_common::types::Role;

use crate::error::JudgeError;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";

/// Authenticated caller
///
/// The gateway verifies the session and forwards the user id and role as
/// headers. A request without a user id is unauthenticated; a missing role
/// means a regular user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: String,
    pub role: Role,
}

impl Identity {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Admins may act on anyone; users only on themselves
    pub fn may_access(&self, user_id: &str) -> bool {
        self.is_admin() || self.user_id == user_id
    }
}

fn header_value<'a>(parts: &'a Parts, name: &str) -> Option<&'a str> {
    parts
        .headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

#[async_trait]
impl<S> FromRequestParts<S> for Identity
where
    S: Send + Sync,
{
    type Rejection = JudgeError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = header_value(parts, USER_ID_HEADER).ok_or(JudgeError::Unauthenticated)?;
        let role = match header_value(parts, USER_ROLE_HEADER) {
            Some(raw) => raw
                .parse::<Role>()
                .map_err(|_| JudgeError::Unauthenticated)?,
            None => Role::User,
        };

        Ok(Identity {
            user_id: user_id.to_string(),
            role,
        })
    }
}
