use rocket::serde::json::Json;
use rocket::response::status::{Created, NoContent};
use rocket::State;
use rocket_okapi::openapi;
use mongodb::bson::{doc, DateTime, Document, oid::ObjectId};
use mongodb::options::{FindOneAndUpdateOptions, FindOptions, ReturnDocument};
use rocket::futures::TryStreamExt;
use validator::Validate;
use log::{info, warn};

use crate::db::{self, DbConn};
use crate::models::{
    ApplicationResponse, ApplicationStatus, JobApplication, SubmitApplicationDto,
    UpdateApplicationStatusDto,
};
use crate::guards::{AuthGuard, CompanyGuard, StudentGuard};
use crate::routes::job_offer::load_job_offer;
use crate::routes::user::load_person;
use crate::services::EmailService;
use crate::utils::{ApiResponse, ApiError, parse_object_id};

async fn load_application(db: &DbConn, id: ObjectId) -> Result<JobApplication, ApiError> {
    db.collection::<JobApplication>(db::JOB_APPLICATIONS)
        .find_one(doc! { "_id": id }, None)
        .await
        .map_err(ApiError::database)?
        .ok_or_else(|| ApiError::not_found("Application not found"))
}

pub async fn find_application(
    db: &DbConn,
    student: ObjectId,
    job_offer: ObjectId,
) -> Result<Option<JobApplication>, ApiError> {
    db.collection::<JobApplication>(db::JOB_APPLICATIONS)
        .find_one(doc! { "student": student, "job_offer": job_offer }, None)
        .await
        .map_err(ApiError::database)
}

async fn list_applications(db: &DbConn, filter: Document) -> Result<Vec<ApplicationResponse>, ApiError> {
    let options = FindOptions::builder().sort(doc! { "created_at": -1 }).build();
    db.collection::<JobApplication>(db::JOB_APPLICATIONS)
        .find(filter, options)
        .await
        .map_err(ApiError::database)?
        .map_ok(ApplicationResponse::from)
        .try_collect()
        .await
        .map_err(ApiError::database)
}

#[openapi(tag = "JobApplication")]
#[post("/jobApplications", data = "<dto>")]
pub async fn submit_application(
    db: &State<DbConn>,
    student: StudentGuard,
    dto: Json<SubmitApplicationDto>,
) -> Result<Created<Json<ApiResponse<ApplicationResponse>>>, ApiError> {
    dto.validate().map_err(|e| ApiError::validation(&e))?;
    let student_id = parse_object_id(&dto.student_id, "studentId")?;
    let job_offer_id = parse_object_id(&dto.job_offer_id, "jobOfferId")?;

    if !student.auth.is(&student_id) {
        return Err(ApiError::forbidden("You can only apply for yourself"));
    }

    let offer = load_job_offer(db, job_offer_id).await?;
    offer.check_open_for_applications(chrono::Utc::now().date_naive())?;

    if find_application(db, student_id, job_offer_id).await?.is_some() {
        return Err(ApiError::conflict("You have already applied to this job offer"));
    }

    let mut application = JobApplication::new(
        student_id,
        job_offer_id,
        offer.company,
        dto.cover_letter.clone(),
    );
    let result = db
        .collection::<JobApplication>(db::JOB_APPLICATIONS)
        .insert_one(&application, None)
        .await
        .map_err(|e| {
            if db::is_duplicate_key(&e) {
                ApiError::conflict("You have already applied to this job offer")
            } else {
                ApiError::database(e)
            }
        })?;
    application.id = result.inserted_id.as_object_id();

    info!("Student {} applied to job offer {}", student_id, job_offer_id);

    Ok(Created::new("/api/jobApplications").body(Json(ApiResponse::success_with_message(
        "Application submitted".to_string(),
        application.into(),
    ))))
}

#[openapi(tag = "JobApplication")]
#[get("/jobApplications/student/<student_id>")]
pub async fn list_student_applications(
    db: &State<DbConn>,
    auth: AuthGuard,
    student_id: String,
) -> Result<Json<ApiResponse<Vec<ApplicationResponse>>>, ApiError> {
    let student = parse_object_id(&student_id, "studentId")?;
    if !auth.is(&student) {
        return Err(ApiError::forbidden("You can only list your own applications"));
    }

    let applications = list_applications(db, doc! { "student": student }).await?;
    Ok(Json(ApiResponse::success(applications)))
}

#[openapi(tag = "JobApplication")]
#[get("/jobApplications/company/<company_id>")]
pub async fn list_company_applications(
    db: &State<DbConn>,
    auth: AuthGuard,
    company_id: String,
) -> Result<Json<ApiResponse<Vec<ApplicationResponse>>>, ApiError> {
    let company = parse_object_id(&company_id, "companyId")?;
    if !auth.is(&company) {
        return Err(ApiError::forbidden("You can only list applications to your own offers"));
    }

    let applications = list_applications(db, doc! { "company": company }).await?;
    Ok(Json(ApiResponse::success(applications)))
}

#[openapi(tag = "JobApplication")]
#[get("/jobApplications/check/<student_id>/<job_offer_id>")]
pub async fn check_application(
    db: &State<DbConn>,
    _auth: AuthGuard,
    student_id: String,
    job_offer_id: String,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let student = parse_object_id(&student_id, "studentId")?;
    let job_offer = parse_object_id(&job_offer_id, "jobOfferId")?;

    let existing = find_application(db, student, job_offer).await?;
    Ok(Json(ApiResponse::success(serde_json::json!({
        "applied": existing.is_some(),
        "status": existing.map(|a| a.status),
    }))))
}

#[openapi(tag = "JobApplication")]
#[put("/jobApplications/<application_id>/status", data = "<dto>")]
pub async fn update_application_status(
    db: &State<DbConn>,
    company: CompanyGuard,
    application_id: String,
    dto: Json<UpdateApplicationStatusDto>,
) -> Result<Json<ApiResponse<ApplicationResponse>>, ApiError> {
    dto.validate().map_err(|e| ApiError::validation(&e))?;
    let id = parse_object_id(&application_id, "id")?;
    let reviewer = company.auth.user_id;

    let current = load_application(db, id).await?;
    current.check_review(&reviewer, dto.status)?;

    let mut set = doc! {
        "status": dto.status.as_str(),
        "updated_at": DateTime::now()
    };
    if let Some(ref notes) = dto.review_notes {
        set.insert("review_notes", notes.clone());
    }

    let options = FindOneAndUpdateOptions::builder()
        .return_document(ReturnDocument::After)
        .build();

    let application = db
        .collection::<JobApplication>(db::JOB_APPLICATIONS)
        .find_one_and_update(
            doc! {
                "_id": id,
                "company": reviewer,
                "status": { "$in": ApplicationStatus::sources_of(dto.status) }
            },
            doc! { "$set": set },
            options,
        )
        .await
        .map_err(ApiError::database)?
        .ok_or_else(|| ApiError::conflict("Application status changed meanwhile"))?;

    info!("Application {} is now {}", id, dto.status.as_str());

    // The update is committed; a failed lookup only costs the notice
    match load_person(db, application.student).await {
        Ok(student) => {
            let title = load_job_offer(db, application.job_offer)
                .await
                .map(|o| o.title)
                .unwrap_or_default();
            EmailService::application_status_changed(&student.email, &title, dto.status.as_str());
        }
        Err(e) => warn!("No status notice for application {}: {}", id, e.message),
    }

    Ok(Json(ApiResponse::success_with_message(
        "Application updated".to_string(),
        application.into(),
    )))
}

#[openapi(tag = "JobApplication")]
#[delete("/jobApplications/<application_id>")]
pub async fn withdraw_application(
    db: &State<DbConn>,
    student: StudentGuard,
    application_id: String,
) -> Result<NoContent, ApiError> {
    let id = parse_object_id(&application_id, "id")?;
    let applicant = student.auth.user_id;

    let result = db
        .collection::<JobApplication>(db::JOB_APPLICATIONS)
        .delete_one(
            doc! {
                "_id": id,
                "student": applicant,
                "status": ApplicationStatus::Pending.as_str()
            },
            None,
        )
        .await
        .map_err(ApiError::database)?;

    if result.deleted_count == 0 {
        load_application(db, id).await?.check_withdraw(&applicant)?;
        return Err(ApiError::not_found("No pending application found"));
    }

    info!("Application {} withdrawn", id);
    Ok(NoContent)
}
