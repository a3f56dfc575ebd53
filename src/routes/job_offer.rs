use rocket::serde::json::Json;
use rocket::response::status::{Created, NoContent};
use rocket::State;
use rocket_okapi::openapi;
use mongodb::bson::{doc, DateTime, Document, oid::ObjectId};
use mongodb::options::{FindOneAndUpdateOptions, FindOptions, ReturnDocument};
use rocket::futures::TryStreamExt;
use validator::Validate;
use log::info;

use crate::db::{self, DbConn};
use crate::models::{
    ApplicationStatus, CreateJobOfferDto, JobApplication, JobOffer, JobOfferQuery,
    JobOfferResponse, JobOfferStatus, UpdateJobOfferDto,
};
use crate::guards::{AuthGuard, CompanyGuard};
use crate::utils::{ApiResponse, ApiError, pagination, parse_object_id, total_pages};

pub async fn load_job_offer(db: &DbConn, id: ObjectId) -> Result<JobOffer, ApiError> {
    db.collection::<JobOffer>(db::JOB_OFFERS)
        .find_one(doc! { "_id": id }, None)
        .await
        .map_err(ApiError::database)?
        .ok_or_else(|| ApiError::not_found("Job offer not found"))
}

async fn application_count(db: &DbConn, offer: ObjectId) -> Result<u64, ApiError> {
    db.collection::<JobApplication>(db::JOB_APPLICATIONS)
        .count_documents(doc! { "job_offer": offer }, None)
        .await
        .map_err(ApiError::database)
}

/// Attaches the derived application count to each offer.
async fn with_counts(db: &DbConn, offers: Vec<JobOffer>) -> Result<Vec<JobOfferResponse>, ApiError> {
    let mut responses = Vec::with_capacity(offers.len());
    for offer in offers {
        let count = match offer.id {
            Some(id) => application_count(db, id).await?,
            None => 0,
        };
        responses.push(JobOfferResponse::from_offer(offer, count));
    }
    Ok(responses)
}

async fn find_offers(db: &DbConn, filter: Document, options: FindOptions) -> Result<Vec<JobOffer>, ApiError> {
    db.collection::<JobOffer>(db::JOB_OFFERS)
        .find(filter, options)
        .await
        .map_err(ApiError::database)?
        .try_collect()
        .await
        .map_err(ApiError::database)
}

#[openapi(tag = "JobOffer")]
#[get("/jobOffers?<query..>")]
pub async fn list_job_offers(
    db: &State<DbConn>,
    query: JobOfferQuery,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let (page, limit, skip) = pagination(query.page, query.limit);
    let filter = query.to_filter();

    let find_options = FindOptions::builder()
        .skip(skip)
        .limit(limit)
        .sort(doc! { "created_at": -1 })
        .build();

    let offers = find_offers(db, filter.clone(), find_options).await?;
    let offers = with_counts(db, offers).await?;

    let total = db
        .collection::<JobOffer>(db::JOB_OFFERS)
        .count_documents(filter, None)
        .await
        .map_err(ApiError::database)?;

    Ok(Json(ApiResponse::success(serde_json::json!({
        "jobOffers": offers,
        "pagination": {
            "page": page,
            "limit": limit,
            "total": total,
            "pages": total_pages(total, limit),
        }
    }))))
}

#[openapi(tag = "JobOffer")]
#[get("/jobOffers/<job_id>")]
pub async fn get_job_offer(
    db: &State<DbConn>,
    auth: Option<AuthGuard>,
    job_id: String,
) -> Result<Json<ApiResponse<JobOfferResponse>>, ApiError> {
    let id = parse_object_id(&job_id, "id")?;
    let offer = load_job_offer(db, id).await?;

    let is_owner = auth.map(|a| a.is(&offer.company)).unwrap_or(false);
    if offer.status == JobOfferStatus::Draft && !is_owner {
        return Err(ApiError::not_found("Job offer not found"));
    }

    let count = application_count(db, id).await?;
    Ok(Json(ApiResponse::success(JobOfferResponse::from_offer(offer, count))))
}

#[openapi(tag = "JobOffer")]
#[get("/jobOffers/company/<company_id>")]
pub async fn list_company_job_offers(
    db: &State<DbConn>,
    auth: Option<AuthGuard>,
    company_id: String,
) -> Result<Json<ApiResponse<Vec<JobOfferResponse>>>, ApiError> {
    let company = parse_object_id(&company_id, "companyId")?;

    let mut filter = doc! { "company": company };
    // Drafts and closed offers are only visible to their owner
    if !auth.map(|a| a.is(&company)).unwrap_or(false) {
        filter.insert("status", JobOfferStatus::Published.as_str());
    }

    let options = FindOptions::builder().sort(doc! { "created_at": -1 }).build();
    let offers = find_offers(db, filter, options).await?;
    Ok(Json(ApiResponse::success(with_counts(db, offers).await?)))
}

#[openapi(tag = "JobOffer")]
#[get("/jobOffers/company/<company_id>/stats")]
pub async fn company_job_stats(
    db: &State<DbConn>,
    company: CompanyGuard,
    company_id: String,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let company_oid = parse_object_id(&company_id, "companyId")?;
    if !company.auth.is(&company_oid) {
        return Err(ApiError::forbidden("You can only view your own statistics"));
    }

    let offers = db.collection::<JobOffer>(db::JOB_OFFERS);
    let mut offer_counts = serde_json::Map::new();
    let mut total_offers = 0;
    for status in [JobOfferStatus::Draft, JobOfferStatus::Published, JobOfferStatus::Closed] {
        let count = offers
            .count_documents(doc! { "company": company_oid, "status": status.as_str() }, None)
            .await
            .map_err(ApiError::database)?;
        total_offers += count;
        offer_counts.insert(status.as_str().to_string(), count.into());
    }

    let applications = db.collection::<JobApplication>(db::JOB_APPLICATIONS);
    let mut application_counts = serde_json::Map::new();
    let mut total_applications = 0;
    for status in ApplicationStatus::ALL {
        let count = applications
            .count_documents(doc! { "company": company_oid, "status": status.as_str() }, None)
            .await
            .map_err(ApiError::database)?;
        total_applications += count;
        application_counts.insert(status.as_str().to_string(), count.into());
    }

    Ok(Json(ApiResponse::success(serde_json::json!({
        "jobOffers": {
            "total": total_offers,
            "byStatus": offer_counts,
        },
        "applications": {
            "total": total_applications,
            "byStatus": application_counts,
        }
    }))))
}

#[openapi(tag = "JobOffer")]
#[post("/jobOffers", data = "<dto>")]
pub async fn create_job_offer(
    db: &State<DbConn>,
    company: CompanyGuard,
    dto: Json<CreateJobOfferDto>,
) -> Result<Created<Json<ApiResponse<JobOfferResponse>>>, ApiError> {
    dto.validate().map_err(|e| ApiError::validation(&e))?;
    let mut offer = dto.into_inner().into_job_offer(company.auth.user_id)?;

    let result = db
        .collection::<JobOffer>(db::JOB_OFFERS)
        .insert_one(&offer, None)
        .await
        .map_err(ApiError::database)?;
    offer.id = result.inserted_id.as_object_id();

    let location = format!(
        "/api/jobOffers/{}",
        offer.id.map(|id| id.to_hex()).unwrap_or_default()
    );
    info!("Job offer {} drafted by {}", location, company.auth.user_id);

    Ok(Created::new(location).body(Json(ApiResponse::success_with_message(
        "Job offer created".to_string(),
        JobOfferResponse::from_offer(offer, 0),
    ))))
}

#[openapi(tag = "JobOffer")]
#[put("/jobOffers/<job_id>", data = "<dto>")]
pub async fn update_job_offer(
    db: &State<DbConn>,
    company: CompanyGuard,
    job_id: String,
    dto: Json<UpdateJobOfferDto>,
) -> Result<Json<ApiResponse<JobOfferResponse>>, ApiError> {
    dto.validate().map_err(|e| ApiError::validation(&e))?;
    let id = parse_object_id(&job_id, "id")?;

    let current = load_job_offer(db, id).await?;
    current.check_owner(&company.auth.user_id)?;
    if current.status == JobOfferStatus::Closed {
        return Err(ApiError::conflict("Closed job offers cannot be edited"));
    }
    let update = dto.to_update(&current)?;

    let options = FindOneAndUpdateOptions::builder()
        .return_document(ReturnDocument::After)
        .build();

    let offer = db
        .collection::<JobOffer>(db::JOB_OFFERS)
        .find_one_and_update(
            doc! {
                "_id": id,
                "company": company.auth.user_id,
                "status": { "$ne": JobOfferStatus::Closed.as_str() }
            },
            doc! { "$set": update },
            options,
        )
        .await
        .map_err(ApiError::database)?
        .ok_or_else(|| ApiError::conflict("Job offer was closed meanwhile"))?;

    let count = application_count(db, id).await?;
    Ok(Json(ApiResponse::success_with_message(
        "Job offer updated".to_string(),
        JobOfferResponse::from_offer(offer, count),
    )))
}

#[openapi(tag = "JobOffer")]
#[delete("/jobOffers/<job_id>")]
pub async fn delete_job_offer(
    db: &State<DbConn>,
    company: CompanyGuard,
    job_id: String,
) -> Result<NoContent, ApiError> {
    let id = parse_object_id(&job_id, "id")?;
    load_job_offer(db, id).await?.check_owner(&company.auth.user_id)?;

    db.collection::<JobOffer>(db::JOB_OFFERS)
        .delete_one(doc! { "_id": id, "company": company.auth.user_id }, None)
        .await
        .map_err(ApiError::database)?;

    let removed = db
        .collection::<JobApplication>(db::JOB_APPLICATIONS)
        .delete_many(doc! { "job_offer": id }, None)
        .await
        .map_err(ApiError::database)?;

    info!("Job offer {} deleted with {} applications", id, removed.deleted_count);
    Ok(NoContent)
}

async fn transition(
    db: &DbConn,
    company: &ObjectId,
    job_id: &str,
    next: JobOfferStatus,
) -> Result<JobOfferResponse, ApiError> {
    let id = parse_object_id(job_id, "id")?;
    let current = load_job_offer(db, id).await?;
    current.check_owner(company)?;
    current.check_transition(next)?;

    let options = FindOneAndUpdateOptions::builder()
        .return_document(ReturnDocument::After)
        .build();

    let offer = db
        .collection::<JobOffer>(db::JOB_OFFERS)
        .find_one_and_update(
            doc! { "_id": id, "company": *company, "status": current.status.as_str() },
            doc! { "$set": { "status": next.as_str(), "updated_at": DateTime::now() } },
            options,
        )
        .await
        .map_err(ApiError::database)?
        .ok_or_else(|| ApiError::conflict("Job offer status changed meanwhile"))?;

    info!("Job offer {} is now {}", id, next.as_str());
    let count = application_count(db, id).await?;
    Ok(JobOfferResponse::from_offer(offer, count))
}

#[openapi(tag = "JobOffer")]
#[put("/jobOffers/<job_id>/publish")]
pub async fn publish_job_offer(
    db: &State<DbConn>,
    company: CompanyGuard,
    job_id: String,
) -> Result<Json<ApiResponse<JobOfferResponse>>, ApiError> {
    let offer = transition(db, &company.auth.user_id, &job_id, JobOfferStatus::Published).await?;
    Ok(Json(ApiResponse::success_with_message("Job offer published".to_string(), offer)))
}

#[openapi(tag = "JobOffer")]
#[put("/jobOffers/<job_id>/close")]
pub async fn close_job_offer(
    db: &State<DbConn>,
    company: CompanyGuard,
    job_id: String,
) -> Result<Json<ApiResponse<JobOfferResponse>>, ApiError> {
    let offer = transition(db, &company.auth.user_id, &job_id, JobOfferStatus::Closed).await?;
    Ok(Json(ApiResponse::success_with_message("Job offer closed".to_string(), offer)))
}
