use jsonwebtoken::{encode, decode, Header, Validation, EncodingKey, DecodingKey};
use serde::{Deserialize, Serialize};
use mongodb::bson::oid::ObjectId;

use crate::models::Role;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,  // Person ID
    pub role: Role,
    pub exp: i64,
    pub iat: i64,
}

pub struct JwtService;

impl JwtService {
    fn sign(user_id: &ObjectId, role: Role, expiry: i64, secret: &str) -> Result<String, jsonwebtoken::errors::Error> {
        let now = chrono::Utc::now().timestamp();

        let claims = Claims {
            sub: user_id.to_hex(),
            role,
            exp: now + expiry,
            iat: now,
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
    }

    pub fn generate_access_token(user_id: &ObjectId, role: Role) -> Result<String, jsonwebtoken::errors::Error> {
        Self::sign(
            user_id,
            role,
            crate::config::Config::jwt_expiry(),
            &crate::config::Config::jwt_secret(),
        )
    }

    pub fn generate_refresh_token(user_id: &ObjectId, role: Role) -> Result<String, jsonwebtoken::errors::Error> {
        Self::sign(
            user_id,
            role,
            crate::config::Config::jwt_refresh_expiry(),
            &crate::config::Config::jwt_refresh_secret(),
        )
    }

    pub fn verify_token(token: &str, is_refresh: bool) -> Result<Claims, jsonwebtoken::errors::Error> {
        let secret = if is_refresh {
            crate::config::Config::jwt_refresh_secret()
        } else {
            crate::config::Config::jwt_secret()
        };

        let token_data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(secret.as_bytes()),
            &Validation::default(),
        )?;

        Ok(token_data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn access_token_carries_identity_and_role() {
        let id = ObjectId::new();
        let token = JwtService::generate_access_token(&id, Role::Company).unwrap();
        let claims = JwtService::verify_token(&token, false).unwrap();

        assert_eq!(claims.sub, id.to_hex());
        assert_eq!(claims.role, Role::Company);
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn refresh_token_is_not_an_access_token() {
        let id = ObjectId::new();
        let refresh = JwtService::generate_refresh_token(&id, Role::Student).unwrap();

        assert!(JwtService::verify_token(&refresh, false).is_err());
        assert!(JwtService::verify_token(&refresh, true).is_ok());
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(JwtService::verify_token("not.a.token", false).is_err());
    }
}
