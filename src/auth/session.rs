use uuid::Uuid;

use super::jwt::Claims;
use crate::error::{AppError, Result};

/// The authenticated caller. Passed explicitly into every repository call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub user_id: Uuid,
    pub role: String,
}

impl Session {
    pub fn new(user_id: Uuid) -> Self {
        Self {
            user_id,
            role: "authenticated".to_string(),
        }
    }

    pub fn from_claims(claims: &Claims) -> Result<Self> {
        let user_id = Uuid::parse_str(&claims.sub)
            .map_err(|_| AppError::Authentication("Invalid token".to_string()))?;

        Ok(Self {
            user_id,
            role: claims.role.clone(),
        })
    }
}

/// Fails with an authentication error when there is no active session.
pub fn require_session(session: Option<&Session>) -> Result<&Session> {
    session.ok_or_else(AppError::no_session)
}
