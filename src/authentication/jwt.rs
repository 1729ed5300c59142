use chrono::Duration;
use chrono::Local;
use hmac::{Hmac, Mac};
use jwt::SignWithKey;
use jwt::VerifyWithKey;
use potion::HtmlError;
use serde::Deserialize;
use serde::Serialize;
use sha2::Sha256;

use crate::database::schema::User;
use crate::error::QueryError;
use crate::schema::UserRole;

use super::permissions::ActionType;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct JwtSessionData {
    pub user_id: i32,
    pub username: String,
    pub role: UserRole,
    iat: i64,
    exp: i64,
}

impl JwtSessionData {
    pub fn new(id: i32, username: String, role: UserRole, lifetime: Duration) -> Self {
        let now = Local::now();
        let iat = now.timestamp();
        let exp = (now + lifetime).timestamp();

        Self {
            user_id: id,
            username,
            role,
            iat,
            exp,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SessionData {
    pub user_id: i32,
    pub username: String,
    pub role: UserRole,
}

impl SessionData {
    pub fn authenticate(&self, action: ActionType) -> Result<(), potion::Error> {
        if !action.authenticate(self) {
            return Err(crate::error::forbidden(
                "You don't have permission to perform this action",
            ));
        }
        Ok(())
    }
}

impl From<JwtSessionData> for SessionData {
    fn from(value: JwtSessionData) -> Self {
        SessionData {
            username: value.username,
            user_id: value.user_id,
            role: value.role,
        }
    }
}

/// Signing key and token lifetime for session tokens.
#[derive(Clone)]
pub struct SessionKeys {
    key: Hmac<Sha256>,
    lifetime: Duration,
}

impl SessionKeys {
    pub fn new(secret: &str, lifetime_hours: i64) -> Result<Self, potion::Error> {
        let key: Hmac<Sha256> = Hmac::new_from_slice(secret.as_bytes())
            .map_err(|e| QueryError::new(format!("Invalid session secret: {e}")))?;

        Ok(Self {
            key,
            lifetime: Duration::hours(lifetime_hours),
        })
    }

    pub fn generate_jwt_session(&self, user: &User) -> Result<String, potion::Error> {
        let claims = JwtSessionData::new(
            user.id,
            user.username.to_owned(),
            user.role.to_owned(),
            self.lifetime,
        );

        claims
            .sign_with_key(&self.key)
            .map_err(|e| QueryError::new(format!("Could not sign session: {e}")).into())
    }

    pub fn verify_jwt_session(&self, token: &str) -> Result<JwtSessionData, potion::Error> {
        let session: JwtSessionData = token
            .verify_with_key(&self.key)
            .map_err(|_| HtmlError::InvalidSession.new("Invalid Session; Invalid token"))?;

        let now = Local::now().timestamp();
        if (session.exp - now).is_negative() {
            return Err(HtmlError::InvalidSession.new("Invalid session; Token expired"));
        }

        Ok(session)
    }
}
