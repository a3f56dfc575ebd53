use rocket::serde::json::Json;
use rocket::State;
use rocket_okapi::openapi;
use mongodb::bson::{doc, oid::ObjectId};
use mongodb::options::{FindOneAndUpdateOptions, FindOptions, ReturnDocument};
use rocket::futures::TryStreamExt;

use crate::db::{self, DbConn};
use crate::models::{Person, PersonResponse, Role, StudentSearchQuery, UpdatePersonDto};
use crate::guards::AuthGuard;
use crate::utils::{ApiResponse, ApiError, pagination, parse_object_id, total_pages};

pub async fn load_person(db: &DbConn, id: ObjectId) -> Result<Person, ApiError> {
    db.collection::<Person>(db::USERS)
        .find_one(doc! { "_id": id }, None)
        .await
        .map_err(ApiError::database)?
        .ok_or_else(|| ApiError::not_found("User not found"))
}

/// Loads `id` and checks it holds the expected kind of account.
pub async fn load_person_with_role(
    db: &DbConn,
    id: ObjectId,
    role: Role,
) -> Result<Person, ApiError> {
    let person = load_person(db, id).await?;
    if person.role() != role {
        return Err(ApiError::bad_request(format!("User {} is not a {}", id, role.as_str())));
    }
    Ok(person)
}

#[openapi(tag = "User")]
#[get("/users/me")]
pub async fn get_me(
    db: &State<DbConn>,
    auth: AuthGuard,
) -> Result<Json<ApiResponse<PersonResponse>>, ApiError> {
    let person = load_person(db, auth.user_id).await?;
    Ok(Json(ApiResponse::success(person.into())))
}

#[openapi(tag = "User")]
#[get("/users/<person_id>")]
pub async fn get_person(
    db: &State<DbConn>,
    _auth: AuthGuard,
    person_id: String,
) -> Result<Json<ApiResponse<PersonResponse>>, ApiError> {
    let id = parse_object_id(&person_id, "personId")?;
    let person = load_person(db, id).await?;
    Ok(Json(ApiResponse::success(person.into())))
}

#[openapi(tag = "User")]
#[put("/users/me", data = "<dto>")]
pub async fn update_me(
    db: &State<DbConn>,
    auth: AuthGuard,
    dto: Json<UpdatePersonDto>,
) -> Result<Json<ApiResponse<PersonResponse>>, ApiError> {
    let update = dto.to_update(auth.role)?;

    let options = FindOneAndUpdateOptions::builder()
        .return_document(ReturnDocument::After)
        .build();

    let person = db
        .collection::<Person>(db::USERS)
        .find_one_and_update(doc! { "_id": auth.user_id }, doc! { "$set": update }, options)
        .await
        .map_err(ApiError::database)?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    Ok(Json(ApiResponse::success_with_message(
        "Profile updated successfully".to_string(),
        person.into(),
    )))
}

#[openapi(tag = "User")]
#[get("/students?<query..>")]
pub async fn search_students(
    db: &State<DbConn>,
    _auth: AuthGuard,
    query: StudentSearchQuery,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let (page, limit, skip) = pagination(query.page, query.limit);

    let mut filter = doc! { "profile.role": Role::Student.as_str() };
    if let Some(ref domain) = query.domain {
        filter.insert("profile.domain", domain);
    }
    if let Some(ref search_type) = query.search_type {
        filter.insert("profile.search_type", search_type);
    }
    if let Some(ref city) = query.city {
        filter.insert("city", doc! { "$regex": regex::escape(city.trim()), "$options": "i" });
    }
    if let Some(searching) = query.searching {
        filter.insert("profile.searching", searching);
    }

    let find_options = FindOptions::builder()
        .skip(skip)
        .limit(limit)
        .sort(doc! { "created_at": -1 })
        .build();

    let users = db.collection::<Person>(db::USERS);
    let students: Vec<PersonResponse> = users
        .find(filter.clone(), find_options)
        .await
        .map_err(ApiError::database)?
        .map_ok(PersonResponse::from)
        .try_collect()
        .await
        .map_err(ApiError::database)?;

    let total = users
        .count_documents(filter, None)
        .await
        .map_err(ApiError::database)?;

    Ok(Json(ApiResponse::success(serde_json::json!({
        "students": students,
        "pagination": {
            "page": page,
            "limit": limit,
            "total": total,
            "pages": total_pages(total, limit),
        }
    }))))
}
