//! Stateless HS256 JWTs for access and refresh tokens.
//!
//! Layout is the standard `header.claims.signature`, each part base64url without
//! padding, signature = HMAC-SHA256 over `header.claims`. Revocation is handled
//! outside this module by the `token_blacklist` table keyed on `jti`.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

const MAX_TOKEN_LEN: usize = 4096;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("token is malformed")]
    Malformed,

    #[error("token signature mismatch")]
    BadSignature,

    #[error("token has expired")]
    Expired,

    #[error("expected a {expected} token")]
    WrongType { expected: TokenType },

    #[error("token signing failed")]
    Signing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenType {
    Access,
    Refresh,
}

impl std::fmt::Display for TokenType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenType::Access => f.write_str("access"),
            TokenType::Refresh => f.write_str("refresh"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: i64,
    pub token_type: TokenType,
    pub jti: Uuid,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
}

#[derive(Serialize)]
struct Header {
    alg: &'static str,
    typ: &'static str,
}

/// Issues and verifies tokens with a shared secret.
#[derive(Clone)]
pub struct TokenSigner {
    secret: Vec<u8>,
    access_ttl_secs: i64,
    refresh_ttl_secs: i64,
}

impl TokenSigner {
    pub fn new(secret: &str, access_ttl_secs: i64, refresh_ttl_secs: i64) -> Self {
        Self {
            secret: secret.as_bytes().to_vec(),
            access_ttl_secs,
            refresh_ttl_secs,
        }
    }

    pub fn issue_pair(&self, user_id: i64) -> Result<TokenPair, TokenError> {
        Ok(TokenPair {
            access: self.issue(user_id, TokenType::Access)?,
            refresh: self.issue(user_id, TokenType::Refresh)?,
        })
    }

    pub fn issue(&self, user_id: i64, token_type: TokenType) -> Result<String, TokenError> {
        let now = Utc::now().timestamp();
        let ttl = match token_type {
            TokenType::Access => self.access_ttl_secs,
            TokenType::Refresh => self.refresh_ttl_secs,
        };
        self.encode(&Claims {
            user_id,
            token_type,
            jti: Uuid::new_v4(),
            iat: now,
            exp: now + ttl,
        })
    }

    pub fn encode(&self, claims: &Claims) -> Result<String, TokenError> {
        let header = serde_json::to_vec(&Header {
            alg: "HS256",
            typ: "JWT",
        })
        .map_err(|_| TokenError::Signing)?;
        let body = serde_json::to_vec(claims).map_err(|_| TokenError::Signing)?;
        let signing_input = format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(header),
            URL_SAFE_NO_PAD.encode(body)
        );
        let signature = self.sign(signing_input.as_bytes())?;
        Ok(format!(
            "{signing_input}.{}",
            URL_SAFE_NO_PAD.encode(signature)
        ))
    }

    /// Verifies signature, type, and expiry.
    pub fn decode(&self, token: &str, expected: TokenType) -> Result<Claims, TokenError> {
        if token.len() > MAX_TOKEN_LEN {
            return Err(TokenError::Malformed);
        }
        let mut parts = token.split('.');
        let (header, body, signature) = match (parts.next(), parts.next(), parts.next(), parts.next())
        {
            (Some(h), Some(b), Some(s), None) => (h, b, s),
            _ => return Err(TokenError::Malformed),
        };

        let signature = URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|_| TokenError::Malformed)?;
        let mut mac =
            HmacSha256::new_from_slice(&self.secret).map_err(|_| TokenError::Signing)?;
        mac.update(header.as_bytes());
        mac.update(b".");
        mac.update(body.as_bytes());
        mac.verify_slice(&signature)
            .map_err(|_| TokenError::BadSignature)?;

        let body = URL_SAFE_NO_PAD
            .decode(body)
            .map_err(|_| TokenError::Malformed)?;
        let claims: Claims = serde_json::from_slice(&body).map_err(|_| TokenError::Malformed)?;

        if claims.token_type != expected {
            return Err(TokenError::WrongType { expected });
        }
        if claims.exp <= Utc::now().timestamp() {
            return Err(TokenError::Expired);
        }
        Ok(claims)
    }

    fn sign(&self, input: &[u8]) -> Result<Vec<u8>, TokenError> {
        let mut mac =
            HmacSha256::new_from_slice(&self.secret).map_err(|_| TokenError::Signing)?;
        mac.update(input);
        Ok(mac.finalize().into_bytes().to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signer() -> TokenSigner {
        TokenSigner::new("test-secret", 3600, 7 * 24 * 3600)
    }

    #[test]
    fn test_issued_access_token_verifies() {
        let s = signer();
        let token = s.issue(42, TokenType::Access).unwrap();
        let claims = s.decode(&token, TokenType::Access).unwrap();
        assert_eq!(claims.user_id, 42);
        assert_eq!(claims.exp - claims.iat, 3600);
    }

    #[test]
    fn test_pair_tokens_have_distinct_jti() {
        let s = signer();
        let pair = s.issue_pair(7).unwrap();
        let access = s.decode(&pair.access, TokenType::Access).unwrap();
        let refresh = s.decode(&pair.refresh, TokenType::Refresh).unwrap();
        assert_ne!(access.jti, refresh.jti);
    }

    #[test]
    fn test_refresh_token_rejected_as_access() {
        let s = signer();
        let token = s.issue(1, TokenType::Refresh).unwrap();
        assert_eq!(
            s.decode(&token, TokenType::Access),
            Err(TokenError::WrongType {
                expected: TokenType::Access
            })
        );
    }

    #[test]
    fn test_tampered_claims_fail_signature() {
        let s = signer();
        let token = s.issue(1, TokenType::Access).unwrap();
        let parts: Vec<&str> = token.split('.').collect();

        let forged = Claims {
            user_id: 999,
            token_type: TokenType::Access,
            jti: Uuid::new_v4(),
            iat: 0,
            exp: i64::MAX,
        };
        let forged_body = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&forged).unwrap());
        let tampered = format!("{}.{}.{}", parts[0], forged_body, parts[2]);

        assert_eq!(
            s.decode(&tampered, TokenType::Access),
            Err(TokenError::BadSignature)
        );
    }

    #[test]
    fn test_other_secret_fails_signature() {
        let token = signer().issue(1, TokenType::Access).unwrap();
        let other = TokenSigner::new("other-secret", 3600, 3600);
        assert_eq!(
            other.decode(&token, TokenType::Access),
            Err(TokenError::BadSignature)
        );
    }

    #[test]
    fn test_expired_token_rejected() {
        let s = signer();
        let now = Utc::now().timestamp();
        let token = s
            .encode(&Claims {
                user_id: 1,
                token_type: TokenType::Access,
                jti: Uuid::new_v4(),
                iat: now - 7200,
                exp: now - 3600,
            })
            .unwrap();
        assert_eq!(s.decode(&token, TokenType::Access), Err(TokenError::Expired));
    }

    #[test]
    fn test_garbage_is_malformed() {
        let s = signer();
        assert_eq!(s.decode("abc", TokenType::Access), Err(TokenError::Malformed));
        assert_eq!(
            s.decode("a.b.c.d", TokenType::Access),
            Err(TokenError::Malformed)
        );
        assert_eq!(
            s.decode("a.b.!!!", TokenType::Access),
            Err(TokenError::Malformed)
        );
    }
}
