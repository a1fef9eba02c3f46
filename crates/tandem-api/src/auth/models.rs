use crate::error::HttpAppError;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use serde::{Deserialize, Serialize};
use tandem_core::models::UserProfile;
use tandem_core::AppError;
use uuid::Uuid;

/// JWT claims structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id, must be a UUID
    pub sub: String,
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub picture: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
    pub exp: i64,
    pub iat: i64,
}

impl Claims {
    /// Profile to mirror into the user store
    pub fn into_profile(self) -> Result<UserProfile, AppError> {
        let id = Uuid::parse_str(&self.sub)
            .map_err(|_| AppError::Unauthorized("Token subject is not a valid user id".into()))?;
        let username = self.username.trim().to_string();
        if username.is_empty() {
            return Err(AppError::Unauthorized("Token carries no username".into()));
        }

        Ok(UserProfile {
            id,
            username,
            display_name: self.name,
            avatar_url: self.picture,
        })
    }
}

/// Authenticated caller, inserted into request extensions by the auth middleware
#[derive(Debug, Clone)]
pub struct UserContext {
    pub user_id: Uuid,
    pub username: String,
}

impl<S> FromRequestParts<S> for UserContext
where
    S: Send + Sync,
{
    type Rejection = HttpAppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<UserContext>()
            .cloned()
            .ok_or_else(|| HttpAppError(AppError::Unauthorized("Missing user context".into())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims(sub: &str, username: &str) -> Claims {
        Claims {
            sub: sub.to_string(),
            username: username.to_string(),
            name: Some("Octo Cat".into()),
            picture: None,
            iss: None,
            exp: 0,
            iat: 0,
        }
    }

    #[test]
    fn test_into_profile() {
        let id = Uuid::new_v4();
        let profile = claims(&id.to_string(), " octo ").into_profile().unwrap();
        assert_eq!(profile.id, id);
        assert_eq!(profile.username, "octo");
        assert_eq!(profile.display_name.as_deref(), Some("Octo Cat"));
    }

    #[test]
    fn test_into_profile_rejects_bad_subject() {
        assert!(matches!(
            claims("github|42", "octo").into_profile(),
            Err(AppError::Unauthorized(_))
        ));
        assert!(claims(&Uuid::new_v4().to_string(), "  ")
            .into_profile()
            .is_err());
    }
}
