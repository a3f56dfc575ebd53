use rocket::request::{self, Request, FromRequest, Outcome};
use rocket::http::Status;
use rocket_okapi::request::OpenApiFromRequest;
use rocket_okapi::r#gen::OpenApiGenerator;
use rocket_okapi::request::RequestHeaderInput;

use crate::guards::AuthGuard;
use crate::models::Role;

async fn require_role<'r>(req: &'r Request<'_>, role: Role) -> request::Outcome<AuthGuard, ()> {
    match req.guard::<AuthGuard>().await {
        Outcome::Success(auth) if auth.role == role => Outcome::Success(auth),
        Outcome::Success(auth) => {
            log::warn!(
                "Role guard rejected {} ({} route, token role {})",
                auth.user_id,
                role.as_str(),
                auth.role.as_str()
            );
            Outcome::Error((Status::Forbidden, ()))
        }
        Outcome::Error(e) => Outcome::Error(e),
        Outcome::Forward(f) => Outcome::Forward(f),
    }
}

/// Authenticated caller holding a student account.
pub struct StudentGuard {
    pub auth: AuthGuard,
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for StudentGuard {
    type Error = ();

    async fn from_request(req: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        require_role(req, Role::Student).await.map(|auth| StudentGuard { auth })
    }
}

/// Authenticated caller holding a company account.
pub struct CompanyGuard {
    pub auth: AuthGuard,
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for CompanyGuard {
    type Error = ();

    async fn from_request(req: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        require_role(req, Role::Company).await.map(|auth| CompanyGuard { auth })
    }
}

impl<'a> OpenApiFromRequest<'a> for StudentGuard {
    fn from_request_input(
        _gen: &mut OpenApiGenerator,
        _name: String,
        _required: bool,
    ) -> rocket_okapi::Result<RequestHeaderInput> {
        Ok(RequestHeaderInput::None)
    }
}

impl<'a> OpenApiFromRequest<'a> for CompanyGuard {
    fn from_request_input(
        _gen: &mut OpenApiGenerator,
        _name: String,
        _required: bool,
    ) -> rocket_okapi::Result<RequestHeaderInput> {
        Ok(RequestHeaderInput::None)
    }
}
