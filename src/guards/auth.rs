use rocket::request::{self, FromRequest, Request, Outcome};
use rocket::http::Status;
use mongodb::bson::oid::ObjectId;

// === OpenAPI (compatible with rocket_okapi 0.8.0 / 0.8.1) ===
use rocket_okapi::request::{OpenApiFromRequest, RequestHeaderInput};
use rocket_okapi::r#gen::OpenApiGenerator;

use crate::models::Role;

pub const TOKEN_HEADER: &str = "x-access-token";

/// JWT-based authentication guard. The identity comes from the token on
/// every request; nothing is cached between requests.
pub struct AuthGuard {
    pub user_id: ObjectId,
    pub role: Role,
}

impl AuthGuard {
    /// `x-access-token` first, then a standard bearer header.
    fn token<'a>(req: &'a Request<'_>) -> Option<&'a str> {
        req.headers().get_one(TOKEN_HEADER).or_else(|| {
            req.headers()
                .get_one("Authorization")
                .map(|value| value.trim_start_matches("Bearer "))
        })
    }

    pub fn is(&self, person: &ObjectId) -> bool {
        &self.user_id == person
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for AuthGuard {
    type Error = ();

    async fn from_request(req: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        match Self::token(req) {
            Some(token) => match crate::services::JwtService::verify_token(token, false) {
                Ok(claims) => match ObjectId::parse_str(&claims.sub) {
                    Ok(user_id) => Outcome::Success(AuthGuard {
                        user_id,
                        role: claims.role,
                    }),
                    Err(_) => Outcome::Error((Status::Unauthorized, ())),
                },
                Err(e) => {
                    log::debug!("Rejected access token: {}", e);
                    Outcome::Error((Status::Unauthorized, ()))
                }
            },
            None => Outcome::Error((Status::Unauthorized, ())),
        }
    }
}

/// === OpenAPI Integration ===
impl<'a> OpenApiFromRequest<'a> for AuthGuard {
    fn from_request_input(
        _gen: &mut OpenApiGenerator,
        _name: String,
        _required: bool,
    ) -> rocket_okapi::Result<RequestHeaderInput> {
        Ok(RequestHeaderInput::None)
    }
}
