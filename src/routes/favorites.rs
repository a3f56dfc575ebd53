use rocket::serde::json::Json;
use rocket::State;
use rocket_okapi::openapi;
use mongodb::bson::{doc, DateTime, Document, oid::ObjectId};
use mongodb::options::{FindOneAndUpdateOptions, ReturnDocument};
use rocket::futures::TryStreamExt;
use log::info;

use crate::db::{self, DbConn};
use crate::models::{Person, PersonResponse, Profile, Role};
use crate::guards::{AuthGuard, CompanyGuard};
use crate::routes::user::{load_person, load_person_with_role};
use crate::utils::{ApiResponse, ApiError, parse_object_id};

fn favorites_of(company: &Person) -> Result<Vec<ObjectId>, ApiError> {
    match &company.profile {
        Profile::Company(c) => Ok(c.favorites.clone()),
        Profile::Student(_) => Err(ApiError::bad_request("Only companies keep favorites")),
    }
}

async fn favorite_students(db: &DbConn, ids: Vec<ObjectId>) -> Result<Vec<PersonResponse>, ApiError> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }

    db.collection::<Person>(db::USERS)
        .find(
            doc! { "_id": { "$in": ids }, "profile.role": Role::Student.as_str() },
            None,
        )
        .await
        .map_err(ApiError::database)?
        .map_ok(PersonResponse::from)
        .try_collect()
        .await
        .map_err(ApiError::database)
}

async fn update_favorites(
    db: &DbConn,
    company: ObjectId,
    update: Document,
) -> Result<Vec<PersonResponse>, ApiError> {
    let options = FindOneAndUpdateOptions::builder()
        .return_document(ReturnDocument::After)
        .build();

    let person = db
        .collection::<Person>(db::USERS)
        .find_one_and_update(
            doc! { "_id": company, "profile.role": Role::Company.as_str() },
            update,
            options,
        )
        .await
        .map_err(ApiError::database)?
        .ok_or_else(|| ApiError::not_found("Company not found"))?;

    favorite_students(db, favorites_of(&person)?).await
}

#[openapi(tag = "Favorites")]
#[get("/favorites/<company_id>")]
pub async fn list_favorites(
    db: &State<DbConn>,
    auth: AuthGuard,
    company_id: String,
) -> Result<Json<ApiResponse<Vec<PersonResponse>>>, ApiError> {
    let id = parse_object_id(&company_id, "companyId")?;
    if !auth.is(&id) {
        return Err(ApiError::forbidden("You can only list your own favorites"));
    }

    let company = load_person(db, id).await?;
    let students = favorite_students(db, favorites_of(&company)?).await?;
    Ok(Json(ApiResponse::success(students)))
}

#[openapi(tag = "Favorites")]
#[put("/favorites/<student_id>")]
pub async fn add_favorite(
    db: &State<DbConn>,
    company: CompanyGuard,
    student_id: String,
) -> Result<Json<ApiResponse<Vec<PersonResponse>>>, ApiError> {
    let student = parse_object_id(&student_id, "studentId")?;
    load_person_with_role(db, student, Role::Student).await?;

    let students = update_favorites(
        db,
        company.auth.user_id,
        doc! {
            "$addToSet": { "profile.favorites": student },
            "$set": { "updated_at": DateTime::now() }
        },
    )
    .await?;

    info!("Company {} bookmarked student {}", company.auth.user_id, student);
    Ok(Json(ApiResponse::success_with_message(
        "Student added to favorites".to_string(),
        students,
    )))
}

#[openapi(tag = "Favorites")]
#[delete("/favorites/<student_id>")]
pub async fn remove_favorite(
    db: &State<DbConn>,
    company: CompanyGuard,
    student_id: String,
) -> Result<Json<ApiResponse<Vec<PersonResponse>>>, ApiError> {
    let student = parse_object_id(&student_id, "studentId")?;

    let students = update_favorites(
        db,
        company.auth.user_id,
        doc! {
            "$pull": { "profile.favorites": student },
            "$set": { "updated_at": DateTime::now() }
        },
    )
    .await?;

    Ok(Json(ApiResponse::success_with_message(
        "Student removed from favorites".to_string(),
        students,
    )))
}
