use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::JwtConfig;
use crate::models::{Role, User};

/// HS256 signing and verification. Access and refresh tokens use
/// independent secrets, so neither kind verifies as the other.
#[derive(Clone)]
pub struct JwtService {
    access_encoding_key: EncodingKey,
    access_decoding_key: DecodingKey,
    refresh_encoding_key: EncodingKey,
    refresh_decoding_key: DecodingKey,
    access_token_expiry_minutes: i64,
    refresh_token_expiry_days: i64,
}

/// Claims for access tokens (short-lived)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessTokenClaims {
    /// Subject (user ID)
    pub sub: Uuid,
    pub email: String,
    pub role: Role,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    pub jti: String,
}

/// Claims for refresh tokens (long-lived)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefreshTokenClaims {
    pub sub: Uuid,
    pub iat: i64,
    pub exp: i64,
    /// Random per token; two tokens issued in the same second still differ.
    pub jti: String,
}

impl JwtService {
    pub fn new(config: &JwtConfig) -> Self {
        let access_secret = config.access_secret.expose_secret().as_bytes();
        let refresh_secret = config.refresh_secret.expose_secret().as_bytes();

        tracing::info!("JWT service initialized with HS256 secrets");

        Self {
            access_encoding_key: EncodingKey::from_secret(access_secret),
            access_decoding_key: DecodingKey::from_secret(access_secret),
            refresh_encoding_key: EncodingKey::from_secret(refresh_secret),
            refresh_decoding_key: DecodingKey::from_secret(refresh_secret),
            access_token_expiry_minutes: config.access_token_expiry_minutes,
            refresh_token_expiry_days: config.refresh_token_expiry_days,
        }
    }

    pub fn generate_access_token(&self, user: &User) -> Result<String, anyhow::Error> {
        let now = Utc::now();
        let exp = now + Duration::minutes(self.access_token_expiry_minutes);

        let claims = AccessTokenClaims {
            sub: user.id,
            email: user.email.clone(),
            role: user.role,
            iat: now.timestamp(),
            exp: exp.timestamp(),
            jti: Uuid::new_v4().to_string(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.access_encoding_key)
            .map_err(|e| anyhow::anyhow!("Failed to encode access token: {}", e))
    }

    pub fn generate_refresh_token(&self, user_id: Uuid) -> Result<String, anyhow::Error> {
        let now = Utc::now();
        let exp = now + Duration::days(self.refresh_token_expiry_days);

        let claims = RefreshTokenClaims {
            sub: user_id,
            iat: now.timestamp(),
            exp: exp.timestamp(),
            jti: Uuid::new_v4().to_string(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.refresh_encoding_key)
            .map_err(|e| anyhow::anyhow!("Failed to encode refresh token: {}", e))
    }

    /// Signature, algorithm and expiry check with no leeway.
    pub fn validate_access_token(&self, token: &str) -> Result<AccessTokenClaims, anyhow::Error> {
        let token_data =
            decode::<AccessTokenClaims>(token, &self.access_decoding_key, &strict_validation())
                .map_err(|e| anyhow::anyhow!("Invalid access token: {}", e))?;

        Ok(token_data.claims)
    }

    pub fn validate_refresh_token(&self, token: &str) -> Result<RefreshTokenClaims, anyhow::Error> {
        let token_data =
            decode::<RefreshTokenClaims>(token, &self.refresh_decoding_key, &strict_validation())
                .map_err(|e| anyhow::anyhow!("Invalid refresh token: {}", e))?;

        Ok(token_data.claims)
    }

    pub fn access_token_expiry_seconds(&self) -> i64 {
        self.access_token_expiry_minutes * 60
    }
}

fn strict_validation() -> Validation {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = true;
    validation.leeway = 0;
    validation
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UserRecord;
    use secrecy::Secret;

    fn service() -> JwtService {
        JwtService::new(&JwtConfig {
            access_secret: Secret::new("access-secret-for-tests-0123456789".to_string()),
            refresh_secret: Secret::new("refresh-secret-for-tests-0123456789".to_string()),
            access_token_expiry_minutes: 15,
            refresh_token_expiry_days: 7,
        })
    }

    fn user() -> User {
        UserRecord::new(
            "alice@example.com".to_string(),
            None,
            Role::Admin,
            "hash".to_string(),
        )
        .user
    }

    #[test]
    fn test_access_token_round_trip() {
        let jwt = service();
        let user = user();

        let token = jwt.generate_access_token(&user).unwrap();
        let claims = jwt.validate_access_token(&token).unwrap();

        assert_eq!(claims.sub, user.id);
        assert_eq!(claims.email, user.email);
        assert_eq!(claims.role, Role::Admin);
        assert_eq!(claims.exp - claims.iat, 15 * 60);
    }

    #[test]
    fn test_refresh_tokens_issued_together_differ() {
        let jwt = service();
        let id = Uuid::new_v4();

        let first = jwt.generate_refresh_token(id).unwrap();
        let second = jwt.generate_refresh_token(id).unwrap();

        assert_ne!(first, second);
        assert_eq!(jwt.validate_refresh_token(&second).unwrap().sub, id);
    }

    #[test]
    fn test_altered_signature_byte_is_rejected() {
        let jwt = service();
        let token = jwt.generate_access_token(&user()).unwrap();

        let signature_start = token.rfind('.').unwrap() + 1;
        let mut bytes = token.into_bytes();
        let i = signature_start + 5;
        bytes[i] = if bytes[i] == b'A' { b'B' } else { b'A' };
        let tampered = String::from_utf8(bytes).unwrap();

        assert!(jwt.validate_access_token(&tampered).is_err());
    }

    #[test]
    fn test_expired_token_is_rejected() {
        let jwt = service();
        let user = user();
        let now = Utc::now().timestamp();
        let claims = AccessTokenClaims {
            sub: user.id,
            email: user.email.clone(),
            role: user.role,
            iat: now - 7200,
            exp: now - 3600,
            jti: Uuid::new_v4().to_string(),
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &jwt.access_encoding_key,
        )
        .unwrap();

        assert!(jwt.validate_access_token(&token).is_err());
    }

    #[test]
    fn test_token_kinds_do_not_cross_verify() {
        let jwt = service();
        let user = user();

        let access = jwt.generate_access_token(&user).unwrap();
        let refresh = jwt.generate_refresh_token(user.id).unwrap();

        assert!(jwt.validate_refresh_token(&access).is_err());
        assert!(jwt.validate_access_token(&refresh).is_err());
    }
}
