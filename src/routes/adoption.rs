use rocket::serde::json::Json;
use rocket::response::status::{Created, NoContent};
use rocket::State;
use rocket_okapi::openapi;
use mongodb::bson::{doc, DateTime, oid::ObjectId};
use mongodb::options::{FindOneAndUpdateOptions, FindOneOptions, FindOptions, ReturnDocument};
use rocket::futures::TryStreamExt;
use log::info;

use crate::db::{self, DbConn};
use crate::models::{Adoption, AdoptionResponse, AdoptionStatus, CreateAdoptionDto, Role};
use crate::guards::{AuthGuard, CompanyGuard, StudentGuard};
use crate::routes::user::load_person_with_role;
use crate::services::EmailService;
use crate::utils::{ApiResponse, ApiError, parse_object_id};

pub async fn load_adoption(db: &DbConn, id: ObjectId) -> Result<Adoption, ApiError> {
    db.collection::<Adoption>(db::ADOPTIONS)
        .find_one(doc! { "_id": id }, None)
        .await
        .map_err(ApiError::database)?
        .ok_or_else(|| ApiError::not_found("Adoption not found"))
}

/// First (`1`) or latest (`-1`) adoption between a company and a student.
pub async fn adoption_for_pair(
    db: &DbConn,
    company: ObjectId,
    student: ObjectId,
    order: i32,
) -> Result<Option<Adoption>, ApiError> {
    let options = FindOneOptions::builder()
        .sort(doc! { "created_at": order })
        .build();

    db.collection::<Adoption>(db::ADOPTIONS)
        .find_one(doc! { "adopter": company, "adopted": student }, options)
        .await
        .map_err(ApiError::database)
}

pub async fn has_accepted_adoption(
    db: &DbConn,
    company: ObjectId,
    student: ObjectId,
) -> Result<bool, ApiError> {
    let found = db
        .collection::<Adoption>(db::ADOPTIONS)
        .find_one(
            doc! {
                "adopter": company,
                "adopted": student,
                "status": AdoptionStatus::Accepted.as_str()
            },
            None,
        )
        .await
        .map_err(ApiError::database)?;
    Ok(found.is_some())
}

#[openapi(tag = "Adoption")]
#[post("/adoptions", data = "<dto>")]
pub async fn create_adoption(
    db: &State<DbConn>,
    company: CompanyGuard,
    dto: Json<CreateAdoptionDto>,
) -> Result<Created<Json<ApiResponse<AdoptionResponse>>>, ApiError> {
    let adopter = parse_object_id(&dto.adopter_id, "adopterId")?;
    let adopted = parse_object_id(&dto.adopted_id, "adoptedId")?;

    if !company.auth.is(&adopter) {
        return Err(ApiError::forbidden("You can only adopt on behalf of your own company"));
    }

    let student = load_person_with_role(db, adopted, Role::Student).await?;

    let adoptions = db.collection::<Adoption>(db::ADOPTIONS);
    let pending = adoptions
        .find_one(
            doc! {
                "adopter": adopter,
                "adopted": adopted,
                "status": AdoptionStatus::Pending.as_str()
            },
            None,
        )
        .await
        .map_err(ApiError::database)?;
    if pending.is_some() {
        return Err(ApiError::conflict("An adoption request is already pending for this student"));
    }

    let mut adoption = Adoption::new(adopter, adopted);
    // the partial unique index settles concurrent requests that both passed the check above
    let result = adoptions.insert_one(&adoption, None).await.map_err(|e| {
        if db::is_duplicate_key(&e) {
            ApiError::conflict("An adoption request is already pending for this student")
        } else {
            ApiError::database(e)
        }
    })?;
    adoption.id = result.inserted_id.as_object_id();

    info!("Adoption {:?} created: {} -> {}", adoption.id, adopter, adopted);

    let company_name = load_person_with_role(db, adopter, Role::Company)
        .await
        .map(|c| c.display_name())
        .unwrap_or_else(|_| "Une entreprise".to_string());
    EmailService::adoption_received(&student.email, &company_name);

    let location = format!("/api/adoptions/{}", adopted.to_hex());
    Ok(Created::new(location).body(Json(ApiResponse::success_with_message(
        "Adoption request sent".to_string(),
        adoption.into(),
    ))))
}

#[openapi(tag = "Adoption")]
#[get("/adoptions/<person_id>")]
pub async fn list_adoptions(
    db: &State<DbConn>,
    auth: AuthGuard,
    person_id: String,
) -> Result<Json<ApiResponse<Vec<AdoptionResponse>>>, ApiError> {
    let person = parse_object_id(&person_id, "personId")?;
    if !auth.is(&person) {
        return Err(ApiError::forbidden("You can only list your own adoptions"));
    }

    let options = FindOptions::builder().sort(doc! { "created_at": -1 }).build();
    let adoptions: Vec<AdoptionResponse> = db
        .collection::<Adoption>(db::ADOPTIONS)
        .find(doc! { "$or": [ { "adopter": person }, { "adopted": person } ] }, options)
        .await
        .map_err(ApiError::database)?
        .map_ok(AdoptionResponse::from)
        .try_collect()
        .await
        .map_err(ApiError::database)?;

    Ok(Json(ApiResponse::success(adoptions)))
}

async fn pair_lookup(
    db: &DbConn,
    auth: &AuthGuard,
    company_id: &str,
    student_id: &str,
    order: i32,
) -> Result<Option<AdoptionResponse>, ApiError> {
    let company = parse_object_id(company_id, "companyId")?;
    let student = parse_object_id(student_id, "studentId")?;
    if !auth.is(&company) && !auth.is(&student) {
        return Err(ApiError::forbidden("Not a party to this relationship"));
    }

    Ok(adoption_for_pair(db, company, student, order).await?.map(AdoptionResponse::from))
}

/// Latest adoption for the pair, or null.
#[openapi(tag = "Adoption")]
#[get("/adoptions/find/<company_id>/<student_id>")]
pub async fn find_adoption(
    db: &State<DbConn>,
    auth: AuthGuard,
    company_id: String,
    student_id: String,
) -> Result<Json<ApiResponse<Option<AdoptionResponse>>>, ApiError> {
    let found = pair_lookup(db, &auth, &company_id, &student_id, -1).await?;
    Ok(Json(ApiResponse::success(found)))
}

/// Earliest adoption for the pair, or null.
#[openapi(tag = "Adoption")]
#[get("/adoptions/history/<company_id>/<student_id>")]
pub async fn adoption_history(
    db: &State<DbConn>,
    auth: AuthGuard,
    company_id: String,
    student_id: String,
) -> Result<Json<ApiResponse<Option<AdoptionResponse>>>, ApiError> {
    let found = pair_lookup(db, &auth, &company_id, &student_id, 1).await?;
    Ok(Json(ApiResponse::success(found)))
}

/// Moves a pending adoption to `next` in one conditional update; on a miss,
/// the stored record explains why.
async fn resolve(
    db: &DbConn,
    adoption_id: &str,
    student: &ObjectId,
    next: AdoptionStatus,
) -> Result<Adoption, ApiError> {
    let id = parse_object_id(adoption_id, "id")?;

    let options = FindOneAndUpdateOptions::builder()
        .return_document(ReturnDocument::After)
        .build();

    let updated = db
        .collection::<Adoption>(db::ADOPTIONS)
        .find_one_and_update(
            doc! {
                "_id": id,
                "adopted": *student,
                "status": AdoptionStatus::Pending.as_str()
            },
            doc! {
                "$set": {
                    "status": next.as_str(),
                    "updated_at": DateTime::now()
                }
            },
            options,
        )
        .await
        .map_err(ApiError::database)?;

    match updated {
        Some(adoption) => {
            info!("Adoption {} {}", id, next.as_str());
            Ok(adoption)
        }
        None => {
            let current = load_adoption(db, id).await?;
            current.check_resolution(student, next)?;
            Err(ApiError::not_found("No pending adoption found"))
        }
    }
}

#[openapi(tag = "Adoption")]
#[put("/adoptions/<adoption_id>/accepted")]
pub async fn accept_adoption(
    db: &State<DbConn>,
    student: StudentGuard,
    adoption_id: String,
) -> Result<Json<ApiResponse<AdoptionResponse>>, ApiError> {
    let adoption = resolve(db, &adoption_id, &student.auth.user_id, AdoptionStatus::Accepted).await?;
    Ok(Json(ApiResponse::success_with_message(
        "Adoption accepted".to_string(),
        adoption.into(),
    )))
}

#[openapi(tag = "Adoption")]
#[put("/adoptions/<adoption_id>/rejected")]
pub async fn reject_adoption(
    db: &State<DbConn>,
    student: StudentGuard,
    adoption_id: String,
) -> Result<Json<ApiResponse<AdoptionResponse>>, ApiError> {
    let adoption = resolve(db, &adoption_id, &student.auth.user_id, AdoptionStatus::Rejected).await?;
    Ok(Json(ApiResponse::success_with_message(
        "Adoption rejected".to_string(),
        adoption.into(),
    )))
}

#[openapi(tag = "Adoption")]
#[delete("/adoptions/<adoption_id>")]
pub async fn cancel_adoption(
    db: &State<DbConn>,
    company: CompanyGuard,
    adoption_id: String,
) -> Result<NoContent, ApiError> {
    let id = parse_object_id(&adoption_id, "id")?;
    let adopter = company.auth.user_id;

    let result = db
        .collection::<Adoption>(db::ADOPTIONS)
        .delete_one(
            doc! {
                "_id": id,
                "adopter": adopter,
                "status": AdoptionStatus::Pending.as_str()
            },
            None,
        )
        .await
        .map_err(ApiError::database)?;

    if result.deleted_count == 0 {
        let current = load_adoption(db, id).await?;
        current.check_cancel(&adopter)?;
        return Err(ApiError::not_found("No pending adoption found"));
    }

    info!("Adoption {} cancelled by {}", id, adopter);
    Ok(NoContent)
}
