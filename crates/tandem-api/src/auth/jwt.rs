//! HS256 JWT verification

use crate::auth::models::Claims;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use std::fmt::{Debug, Formatter, Result as FmtResult};
use tandem_core::AppError;

pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl Debug for JwtService {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("JwtService")
            .field("algorithms", &self.validation.algorithms)
            .finish()
    }
}

impl JwtService {
    /// `issuer`, when set, must match the token's `iss` claim
    pub fn new(secret: &str, issuer: Option<String>) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        if let Some(issuer) = issuer {
            validation.set_issuer(&[issuer]);
        }

        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    pub fn verify(&self, token: &str) -> Result<Claims, AppError> {
        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::debug!(error = %e, "JWT verification failed");
                AppError::Unauthorized("Invalid or expired token".to_string())
            })
    }

    /// Sign `claims`; used by local tooling and tests
    pub fn issue(&self, claims: &Claims) -> Result<String, AppError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)
            .map_err(|e| AppError::Internal(format!("Failed to sign token: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    const SECRET: &str = "0123456789abcdef0123456789abcdef";

    fn claims(exp_offset: Duration, iss: Option<&str>) -> Claims {
        let now = Utc::now();
        Claims {
            sub: uuid::Uuid::new_v4().to_string(),
            username: "octo".into(),
            name: None,
            picture: None,
            iss: iss.map(String::from),
            exp: (now + exp_offset).timestamp(),
            iat: now.timestamp(),
        }
    }

    #[test]
    fn test_issue_and_verify() {
        let service = JwtService::new(SECRET, None);
        let token = service.issue(&claims(Duration::hours(1), None)).unwrap();
        assert_eq!(service.verify(&token).unwrap().username, "octo");
    }

    #[test]
    fn test_rejects_expired_and_foreign_tokens() {
        let service = JwtService::new(SECRET, None);
        let expired = service.issue(&claims(Duration::hours(-2), None)).unwrap();
        assert!(service.verify(&expired).is_err());

        let other = JwtService::new("ffffffffffffffffffffffffffffffff", None);
        let foreign = other.issue(&claims(Duration::hours(1), None)).unwrap();
        assert!(service.verify(&foreign).is_err());
        assert!(service.verify("not-a-token").is_err());
    }

    #[test]
    fn test_issuer_is_enforced() {
        let service = JwtService::new(SECRET, Some("https://id.tandem.dev".into()));
        let wrong = service
            .issue(&claims(Duration::hours(1), Some("https://evil.example")))
            .unwrap();
        assert!(service.verify(&wrong).is_err());

        let right = service
            .issue(&claims(Duration::hours(1), Some("https://id.tandem.dev")))
            .unwrap();
        assert!(service.verify(&right).is_ok());
    }
}
