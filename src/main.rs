#[macro_use]
extern crate rocket;

mod config;
mod db;
mod guards;
mod models;
mod routes;
mod services;
mod utils;

#[cfg(test)]
mod tests;

use dotenvy::dotenv;
use rocket::fairing::{AdHoc, Fairing, Info, Kind};
use rocket::fs::{FileServer, Options};
use rocket::http::Header;
use rocket::serde::json::{json, Value};
use rocket::{Build, Request, Response, Rocket, Route};
use rocket_okapi::openapi_get_routes;
use rocket_okapi::swagger_ui::{SwaggerUIConfig, make_swagger_ui};

use crate::config::Config;

/* ----------------------------- CORS ----------------------------- */

pub struct CORS;

#[rocket::async_trait]
impl Fairing for CORS {
    fn info(&self) -> Info {
        Info {
            name: "CORS",
            kind: Kind::Response,
        }
    }

    async fn on_response<'r>(&self, request: &'r Request<'_>, response: &mut Response<'r>) {
        if let Some(origin) = request.headers().get_one("Origin") {
            response.set_header(Header::new("Access-Control-Allow-Origin", origin));
        }

        response.set_header(Header::new(
            "Access-Control-Allow-Methods",
            "GET, POST, PUT, DELETE, OPTIONS",
        ));

        response.set_header(Header::new(
            "Access-Control-Allow-Headers",
            "Content-Type, Authorization, x-access-token",
        ));

        response.set_header(Header::new("Access-Control-Allow-Credentials", "true"));
    }
}

/* ----------------------------- OPTIONS ----------------------------- */

#[options("/<_..>")]
fn options_handler() {}

/* ----------------------------- ERRORS ----------------------------- */

fn error_body(message: &str) -> Value {
    json!({
        "success": false,
        "message": message
    })
}

#[catch(400)]
fn bad_request() -> Value {
    error_body("Bad request")
}

#[catch(401)]
fn unauthorized() -> Value {
    error_body("Missing or invalid access token")
}

#[catch(403)]
fn forbidden() -> Value {
    error_body("You are not allowed to perform this action")
}

#[catch(404)]
fn not_found() -> Value {
    error_body("Resource not found")
}

#[catch(409)]
fn conflict() -> Value {
    error_body("Conflict with the current state of the resource")
}

#[catch(422)]
fn unprocessable() -> Value {
    error_body("Malformed request body")
}

#[catch(500)]
fn internal_error() -> Value {
    error_body("Internal server error")
}

/* ----------------------------- ROUTES ----------------------------- */

fn api_routes() -> Vec<Route> {
    openapi_get_routes![
        // Auth
        routes::auth::signup,
        routes::auth::signin,
        routes::auth::refresh_token,
        // Users
        routes::user::get_me,
        routes::user::get_person,
        routes::user::update_me,
        routes::user::search_students,
        routes::file_upload::upload_document,
        // Favorites
        routes::favorites::list_favorites,
        routes::favorites::add_favorite,
        routes::favorites::remove_favorite,
        // Adoptions
        routes::adoption::create_adoption,
        routes::adoption::list_adoptions,
        routes::adoption::find_adoption,
        routes::adoption::adoption_history,
        routes::adoption::accept_adoption,
        routes::adoption::reject_adoption,
        routes::adoption::cancel_adoption,
        // Contracts
        routes::contract::create_contract,
        routes::contract::list_contracts,
        routes::contract::contract_history,
        routes::contract::sign_contract,
        routes::contract::terminate_contract,
        routes::contract::cancel_contract,
        // Job offers
        routes::job_offer::list_job_offers,
        routes::job_offer::get_job_offer,
        routes::job_offer::list_company_job_offers,
        routes::job_offer::company_job_stats,
        routes::job_offer::create_job_offer,
        routes::job_offer::update_job_offer,
        routes::job_offer::delete_job_offer,
        routes::job_offer::publish_job_offer,
        routes::job_offer::close_job_offer,
        // Job applications
        routes::job_application::submit_application,
        routes::job_application::list_student_applications,
        routes::job_application::list_company_applications,
        routes::job_application::check_application,
        routes::job_application::update_application_status,
        routes::job_application::withdraw_application,
        // Conversations
        routes::conversation::open_conversation,
        routes::conversation::list_conversations,
        routes::conversation::find_conversation,
        routes::conversation::post_message,
        routes::conversation::list_messages,
        // History
        routes::history::relationship_history,
    ]
}

/* ----------------------------- SWAGGER ----------------------------- */

fn swagger_config() -> SwaggerUIConfig {
    SwaggerUIConfig {
        url: "/api/openapi.json".to_string(),
        ..Default::default()
    }
}

/// Everything but the database: routes, catchers, static files and fairings.
pub fn build(rocket: Rocket<Build>) -> Rocket<Build> {
    rocket
        .attach(CORS)
        .mount("/", routes![options_handler])
        .mount("/api", api_routes())
        .mount(
            "/uploads",
            FileServer::new(Config::upload_dir(), Options::Index | Options::Missing),
        )
        .mount("/api/docs", make_swagger_ui(&swagger_config()))
        .register(
            "/",
            catchers![
                bad_request,
                unauthorized,
                forbidden,
                not_found,
                conflict,
                unprocessable,
                internal_error
            ],
        )
}

/* ----------------------------- SECRETS ----------------------------- */

/// Outside development, refuse to sign tokens with the built-in fallback secrets.
fn jwt_secrets_check() -> AdHoc {
    AdHoc::try_on_ignite("JWT secrets", |rocket| async {
        let unset = Config::unset_jwt_secrets();
        if unset.is_empty() {
            return Ok(rocket);
        }

        if Config::is_development() {
            log::warn!("Using fallback values for {}", unset.join(", "));
            Ok(rocket)
        } else {
            log::error!(
                "Refusing to start: set {} (ROCKET_JWT_SECRET / ROCKET_JWT_REFRESH_SECRET)",
                unset.join(", ")
            );
            Err(rocket)
        }
    })
}

/* ----------------------------- LAUNCH ----------------------------- */

#[launch]
fn rocket() -> Rocket<Build> {
    dotenv().ok();
    env_logger::init();

    log::info!("Adopte un Étudiant API starting");
    log::info!("Swagger UI at /api/docs");

    build(rocket::build().attach(jwt_secrets_check()).attach(db::init()))
}
