use rocket::serde::json::Json;
use rocket::response::status::Created;
use rocket::State;
use rocket_okapi::openapi;
use mongodb::bson::{doc, DateTime, oid::ObjectId};
use validator::Validate;
use log::info;

use crate::db::{self, DbConn};
use crate::models::{Person, PersonResponse, RefreshTokenDto, SigninDto, SignupDto};
use crate::services::JwtService;
use crate::utils::{ApiResponse, ApiError};

fn issue_tokens(person: Person) -> Result<serde_json::Value, ApiError> {
    let id = person.id.ok_or_else(|| ApiError::internal_error("Person without id"))?;
    let role = person.role();

    let access_token = JwtService::generate_access_token(&id, role)
        .map_err(|e| ApiError::internal_error(e.to_string()))?;
    let refresh_token = JwtService::generate_refresh_token(&id, role)
        .map_err(|e| ApiError::internal_error(e.to_string()))?;

    Ok(serde_json::json!({
        "user": PersonResponse::from(person),
        "accessToken": access_token,
        "refreshToken": refresh_token
    }))
}

/// --------------------
/// Sign up (student or company)
/// --------------------
#[openapi(tag = "Auth")]
#[post("/auth/signup", data = "<dto>")]
pub async fn signup(
    db: &State<DbConn>,
    dto: Json<SignupDto>,
) -> Result<Created<Json<ApiResponse<serde_json::Value>>>, ApiError> {
    dto.validate().map_err(|e| ApiError::validation(&e))?;
    let profile = dto.profile()?;
    let email = dto.email.trim().to_lowercase();

    let users = db.collection::<Person>(db::USERS);
    let existing = users
        .find_one(doc! { "email": &email }, None)
        .await
        .map_err(ApiError::database)?;
    if existing.is_some() {
        return Err(ApiError::conflict("Email already exists in the database"));
    }

    let password_hash = bcrypt::hash(&dto.password, bcrypt::DEFAULT_COST)
        .map_err(|e| ApiError::internal_error(format!("Failed to hash password: {}", e)))?;

    let now = DateTime::now();
    let mut person = Person {
        id: None,
        email,
        password_hash,
        city: dto.city.clone(),
        description: dto.description.clone(),
        picture: None,
        profile,
        created_at: now,
        updated_at: now,
    };

    let result = users.insert_one(&person, None).await.map_err(|e| {
        if db::is_duplicate_key(&e) {
            ApiError::conflict("Email already exists in the database")
        } else {
            ApiError::database(e)
        }
    })?;
    person.id = result.inserted_id.as_object_id();

    info!("New {} account {}", person.role().as_str(), person.email);

    Ok(Created::new("/api/users").body(Json(ApiResponse::success_with_message(
        "Registration successful".to_string(),
        issue_tokens(person)?,
    ))))
}

/// --------------------
/// Sign in
/// --------------------
#[openapi(tag = "Auth")]
#[post("/auth/signin", data = "<dto>")]
pub async fn signin(
    db: &State<DbConn>,
    dto: Json<SigninDto>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    dto.validate().map_err(|e| ApiError::validation(&e))?;

    let person = db
        .collection::<Person>(db::USERS)
        .find_one(doc! { "email": dto.email.trim().to_lowercase() }, None)
        .await
        .map_err(ApiError::database)?
        .ok_or_else(|| ApiError::unauthorized("Invalid email or password"))?;

    let valid = bcrypt::verify(&dto.password, &person.password_hash)
        .map_err(|e| ApiError::internal_error(format!("Failed to verify password: {}", e)))?;
    if !valid {
        return Err(ApiError::unauthorized("Invalid email or password"));
    }

    Ok(Json(ApiResponse::success_with_message(
        "Login successful".to_string(),
        issue_tokens(person)?,
    )))
}

/// --------------------
/// Silent Refresh Token
/// --------------------
#[openapi(tag = "Auth")]
#[post("/auth/refresh", data = "<dto>")]
pub async fn refresh_token(
    dto: Json<RefreshTokenDto>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let claims = JwtService::verify_token(&dto.refresh_token, true)
        .map_err(|_| ApiError::unauthorized("Invalid refresh token"))?;

    let user_id = ObjectId::parse_str(&claims.sub)
        .map_err(|_| ApiError::unauthorized("Invalid user id in token"))?;

    let access = JwtService::generate_access_token(&user_id, claims.role)
        .map_err(|e| ApiError::internal_error(e.to_string()))?;

    Ok(Json(ApiResponse::success(serde_json::json!({
        "accessToken": access
    }))))
}
