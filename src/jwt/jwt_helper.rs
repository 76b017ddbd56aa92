use jsonwebtoken::{
    decode, encode, errors::Result as JwtResult, DecodingKey, EncodingKey, Header, Validation,
};
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

use crate::config::jwt_secret;
use crate::jwt::claims::Claims;

const TOKEN_LIFETIME_SECS: u64 = 7 * 24 * 60 * 60; // 7 days

pub fn create_token(user_id: Uuid) -> JwtResult<String> {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    let claims = Claims {
        sub: user_id.to_string(),
        exp: (now + TOKEN_LIFETIME_SECS) as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(jwt_secret().as_bytes()),
    )
}

pub fn verify_token(token: &str) -> Result<Claims, String> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(jwt_secret().as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|_| "Invalid token".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_round_trip() {
        let user_id = Uuid::new_v4();
        let token = create_token(user_id).unwrap();
        let claims = verify_token(&token).unwrap();
        assert_eq!(claims.sub, user_id.to_string());
    }

    #[test]
    fn garbage_token_is_rejected() {
        assert!(verify_token("not-a-token").is_err());
    }

    #[test]
    fn tampered_token_is_rejected() {
        let token = create_token(Uuid::new_v4()).unwrap();
        let mut tampered = token.clone();
        tampered.pop();
        tampered.push(if token.ends_with('a') { 'b' } else { 'a' });
        assert!(verify_token(&tampered).is_err());
    }
}
