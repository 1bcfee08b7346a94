use chrono::{Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Claims {
    pub sub: Uuid,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("Token expired")]
    Expired,

    #[error("Invalid token")]
    Invalid,

    #[error("Failed to sign token: {0}")]
    Encode(jsonwebtoken::errors::Error),
}

/// Signs an HS256 bearer token for `user_id`.
pub fn issue_token(user_id: Uuid, secret: &str, ttl: Duration) -> Result<String, TokenError> {
    let now = Utc::now();
    let claims = Claims {
        sub: user_id,
        iat: now.timestamp(),
        exp: (now + ttl).timestamp(),
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(TokenError::Encode)
}

pub fn decode_token(token: &str, secret: &str) -> Result<Claims, TokenError> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| match e.kind() {
        ErrorKind::ExpiredSignature => TokenError::Expired,
        _ => TokenError::Invalid,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issued_token_decodes_to_same_subject() {
        let id = Uuid::new_v4();
        let token = issue_token(id, "s3cret", Duration::days(30)).unwrap();
        let claims = decode_token(&token, "s3cret").unwrap();
        assert_eq!(claims.sub, id);
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn test_wrong_secret_is_invalid() {
        let token = issue_token(Uuid::new_v4(), "one", Duration::days(1)).unwrap();
        assert!(matches!(decode_token(&token, "two"), Err(TokenError::Invalid)));
    }

    #[test]
    fn test_expired_token_is_reported_as_expired() {
        let token = issue_token(Uuid::new_v4(), "s3cret", Duration::hours(-2)).unwrap();
        assert!(matches!(
            decode_token(&token, "s3cret"),
            Err(TokenError::Expired)
        ));
    }

    #[test]
    fn test_garbage_is_invalid() {
        assert!(matches!(
            decode_token("not.a.jwt", "s3cret"),
            Err(TokenError::Invalid)
        ));
    }
}
