//! # rr-auth-jwt
//!
//! Argon2 + HS256 JWT implementation of `AuthProvider`.
//! Access tokens authenticate API calls; refresh tokens are single-use and
//! tracked through their `jti`.

use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rr_core::error::{AppError, Result};
use rr_core::models::User;
use rr_core::traits::{AuthProvider, TokenClaims, TokenKind, TokenPair};

const INVALID_TOKEN: &str = "Token is invalid or expired";

pub struct JwtAuthProvider {
    encoding: EncodingKey,
    decoding: DecodingKey,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl JwtAuthProvider {
    /// `secret` signs every token; rotating it invalidates all sessions.
    pub fn new(secret: &[u8], access_ttl: Duration, refresh_ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            access_ttl,
            refresh_ttl,
        }
    }

    fn claims_for(&self, user: &User, kind: TokenKind) -> TokenClaims {
        let now = Utc::now();
        let ttl = match kind {
            TokenKind::Access => self.access_ttl,
            TokenKind::Refresh => self.refresh_ttl,
        };
        TokenClaims {
            sub: user.id.to_string(),
            username: user.username.clone(),
            role: user.role,
            token_type: kind,
            jti: uuid::Uuid::new_v4().simple().to_string(),
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
        }
    }

    fn sign(&self, claims: &TokenClaims) -> anyhow::Result<String> {
        Ok(encode(&Header::new(Algorithm::HS256), claims, &self.encoding)?)
    }
}

#[async_trait]
impl AuthProvider for JwtAuthProvider {
    fn hash_password(&self, password: &str) -> anyhow::Result<String> {
        let mut bytes = [0u8; 16];
        getrandom::getrandom(&mut bytes).map_err(|e| anyhow::anyhow!("salt generation failed: {}", e))?;
        let salt = SaltString::encode_b64(&bytes).map_err(|e| anyhow::anyhow!("salt encoding failed: {}", e))?;
        let hash = Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| anyhow::anyhow!("password hashing failed: {}", e))?;
        Ok(hash.to_string())
    }

    /// Verifies if a provided password matches a stored Argon2 hash.
    async fn verify_password(&self, password: &str, hash: &str) -> bool {
        let parsed_hash = match PasswordHash::new(hash) {
            Ok(p) => p,
            Err(_) => return false,
        };
        Argon2::default()
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok()
    }

    fn issue_tokens(&self, user: &User) -> anyhow::Result<TokenPair> {
        let access = self.claims_for(user, TokenKind::Access);
        let refresh = self.claims_for(user, TokenKind::Refresh);
        Ok(TokenPair {
            access: self.sign(&access)?,
            refresh: self.sign(&refresh)?,
            refresh_jti: refresh.jti,
        })
    }

    fn verify_token(&self, token: &str, kind: TokenKind) -> Result<TokenClaims> {
        let validation = Validation::new(Algorithm::HS256);
        let data = decode::<TokenClaims>(token, &self.decoding, &validation).map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => log::debug!("Rejected expired {:?} token", kind),
                _ => log::debug!("Rejected {:?} token: {}", kind, e),
            }
            AppError::Unauthorized(INVALID_TOKEN.into())
        })?;

        if data.claims.token_type != kind {
            return Err(AppError::Unauthorized("Token has wrong type".into()));
        }
        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rr_core::models::Role;

    fn provider() -> JwtAuthProvider {
        JwtAuthProvider::new(b"test-secret", Duration::minutes(5), Duration::days(1))
    }

    fn user() -> User {
        User {
            id: 42,
            username: "amina".into(),
            email: "amina@example.com".into(),
            password_hash: String::new(),
            role: Role::Citizen,
            phone_number: String::new(),
            name: None,
            token: None,
            is_active: true,
            date_joined: Utc::now(),
        }
    }

    #[tokio::test]
    async fn hashes_and_verifies_passwords() {
        let auth = provider();
        let hash = auth.hash_password("correct horse").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(auth.verify_password("correct horse", &hash).await);
        assert!(!auth.verify_password("wrong horse", &hash).await);
        assert!(!auth.verify_password("correct horse", "not-a-hash").await);
    }

    #[test]
    fn issued_tokens_verify_with_their_kind_only() {
        let auth = provider();
        let pair = auth.issue_tokens(&user()).unwrap();

        let access = auth.verify_token(&pair.access, TokenKind::Access).unwrap();
        assert_eq!(access.user_id(), Some(42));
        assert_eq!(access.username, "amina");

        let refresh = auth.verify_token(&pair.refresh, TokenKind::Refresh).unwrap();
        assert_eq!(refresh.jti, pair.refresh_jti);
        assert_ne!(access.jti, refresh.jti);

        assert!(matches!(
            auth.verify_token(&pair.refresh, TokenKind::Access),
            Err(AppError::Unauthorized(_))
        ));
    }

    #[test]
    fn rejects_expired_and_foreign_tokens() {
        let auth = provider();
        let mut claims = auth.claims_for(&user(), TokenKind::Access);
        claims.iat -= 7200;
        claims.exp = Utc::now().timestamp() - 3600;
        let expired = auth.sign(&claims).unwrap();
        assert!(auth.verify_token(&expired, TokenKind::Access).is_err());

        let other = JwtAuthProvider::new(b"other-secret", Duration::minutes(5), Duration::days(1));
        let foreign = other.issue_tokens(&user()).unwrap();
        assert!(auth.verify_token(&foreign.access, TokenKind::Access).is_err());
        assert!(auth.verify_token("garbage", TokenKind::Access).is_err());
    }
}
