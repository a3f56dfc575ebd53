use rocket::serde::json::Json;
use rocket::response::status::{Created, NoContent};
use rocket::State;
use rocket_okapi::openapi;
use mongodb::bson::{doc, DateTime, oid::ObjectId};
use mongodb::options::{FindOneAndUpdateOptions, FindOneOptions, FindOptions, ReturnDocument};
use rocket::futures::TryStreamExt;
use validator::Validate;
use log::info;

use crate::db::{self, DbConn};
use crate::models::{
    Contract, ContractListQuery, ContractResponse, ContractStatus, CreateContractDto, Role,
};
use crate::guards::{AuthGuard, CompanyGuard, StudentGuard};
use crate::routes::adoption::has_accepted_adoption;
use crate::routes::user::load_person_with_role;
use crate::services::EmailService;
use crate::utils::{ApiResponse, ApiError, date_to_bson, parse_object_id};

pub async fn load_contract(db: &DbConn, id: ObjectId) -> Result<Contract, ApiError> {
    db.collection::<Contract>(db::CONTRACTS)
        .find_one(doc! { "_id": id }, None)
        .await
        .map_err(ApiError::database)?
        .ok_or_else(|| ApiError::not_found("Contract not found"))
}

/// Earliest contract between a company and a student.
pub async fn first_contract_for_pair(
    db: &DbConn,
    company: ObjectId,
    student: ObjectId,
) -> Result<Option<Contract>, ApiError> {
    let options = FindOneOptions::builder().sort(doc! { "created_at": 1 }).build();
    db.collection::<Contract>(db::CONTRACTS)
        .find_one(doc! { "company": company, "student": student }, options)
        .await
        .map_err(ApiError::database)
}

#[openapi(tag = "Contract")]
#[post("/contracts", data = "<dto>")]
pub async fn create_contract(
    db: &State<DbConn>,
    company: CompanyGuard,
    dto: Json<CreateContractDto>,
) -> Result<Created<Json<ApiResponse<ContractResponse>>>, ApiError> {
    // Field checks come first so a malformed request never touches the database
    dto.validate().map_err(|e| ApiError::validation(&e))?;
    let (start, end) = dto.date_range()?;
    let company_id = parse_object_id(&dto.company_id, "companyId")?;
    let student_id = parse_object_id(&dto.student_id, "studentId")?;

    if !company.auth.is(&company_id) {
        return Err(ApiError::forbidden("You can only create contracts for your own company"));
    }

    let student = load_person_with_role(db, student_id, Role::Student).await?;

    if !has_accepted_adoption(db, company_id, student_id).await? {
        return Err(ApiError::conflict(
            "The student must accept an adoption before a contract can be created",
        ));
    }

    let contracts = db.collection::<Contract>(db::CONTRACTS);
    let open = contracts
        .find_one(
            doc! {
                "company": company_id,
                "student": student_id,
                "status": { "$in": [ContractStatus::Pending.as_str(), ContractStatus::Active.as_str()] }
            },
            None,
        )
        .await
        .map_err(ApiError::database)?;
    if let Some(open) = open {
        return Err(ApiError::conflict(format!(
            "A {} contract already exists with this student",
            open.status.as_str()
        )));
    }

    let now = DateTime::now();
    let mut contract = Contract {
        id: None,
        company: company_id,
        student: student_id,
        start_date: date_to_bson(start),
        end_date: date_to_bson(end),
        terms: dto.terms.clone(),
        status: ContractStatus::Pending,
        signed_at: None,
        created_at: now,
        updated_at: now,
    };

    let result = contracts
        .insert_one(&contract, None)
        .await
        .map_err(ApiError::database)?;
    contract.id = result.inserted_id.as_object_id();

    info!("Contract {:?} sent: {} -> {}", contract.id, company_id, student_id);

    let company_name = load_person_with_role(db, company_id, Role::Company)
        .await
        .map(|c| c.display_name())
        .unwrap_or_else(|_| "Une entreprise".to_string());
    EmailService::contract_received(&student.email, &company_name);

    let location = format!("/api/contracts/{}", company_id.to_hex());
    Ok(Created::new(location).body(Json(ApiResponse::success_with_message(
        "Contract sent".to_string(),
        ContractResponse::from_contract(contract, chrono::Utc::now()),
    ))))
}

#[openapi(tag = "Contract")]
#[get("/contracts/<person_id>?<query..>")]
pub async fn list_contracts(
    db: &State<DbConn>,
    auth: AuthGuard,
    person_id: String,
    query: ContractListQuery,
) -> Result<Json<ApiResponse<Vec<ContractResponse>>>, ApiError> {
    let person = parse_object_id(&person_id, "personId")?;
    if !auth.is(&person) {
        return Err(ApiError::forbidden("You can only list your own contracts"));
    }

    let mut filter = doc! { "$or": [ { "company": person }, { "student": person } ] };
    if let Some(ref status) = query.status {
        if !status.trim().is_empty() {
            filter.insert("status", ContractStatus::parse_filter(status)?.as_str());
        }
    }

    let now = chrono::Utc::now();
    let options = FindOptions::builder().sort(doc! { "created_at": -1 }).build();
    let contracts: Vec<ContractResponse> = db
        .collection::<Contract>(db::CONTRACTS)
        .find(filter, options)
        .await
        .map_err(ApiError::database)?
        .map_ok(|c| ContractResponse::from_contract(c, now))
        .try_collect()
        .await
        .map_err(ApiError::database)?;

    Ok(Json(ApiResponse::success(contracts)))
}

#[openapi(tag = "Contract")]
#[get("/contracts/history/<company_id>/<student_id>")]
pub async fn contract_history(
    db: &State<DbConn>,
    auth: AuthGuard,
    company_id: String,
    student_id: String,
) -> Result<Json<ApiResponse<Option<ContractResponse>>>, ApiError> {
    let company = parse_object_id(&company_id, "companyId")?;
    let student = parse_object_id(&student_id, "studentId")?;
    if !auth.is(&company) && !auth.is(&student) {
        return Err(ApiError::forbidden("Not a party to this relationship"));
    }

    let now = chrono::Utc::now();
    let contract = first_contract_for_pair(db, company, student)
        .await?
        .map(|c| ContractResponse::from_contract(c, now));
    Ok(Json(ApiResponse::success(contract)))
}

#[openapi(tag = "Contract")]
#[put("/contracts/active/<contract_id>")]
pub async fn sign_contract(
    db: &State<DbConn>,
    student: StudentGuard,
    contract_id: String,
) -> Result<Json<ApiResponse<ContractResponse>>, ApiError> {
    let id = parse_object_id(&contract_id, "id")?;
    let signer = student.auth.user_id;
    let now = DateTime::now();

    let options = FindOneAndUpdateOptions::builder()
        .return_document(ReturnDocument::After)
        .build();

    let signed = db
        .collection::<Contract>(db::CONTRACTS)
        .find_one_and_update(
            doc! {
                "_id": id,
                "student": signer,
                "status": ContractStatus::Pending.as_str()
            },
            doc! {
                "$set": {
                    "status": ContractStatus::Active.as_str(),
                    "signed_at": now,
                    "updated_at": now
                }
            },
            options,
        )
        .await
        .map_err(ApiError::database)?;

    let contract = match signed {
        Some(contract) => contract,
        None => {
            load_contract(db, id).await?.check_sign(&signer)?;
            return Err(ApiError::not_found("No pending contract found"));
        }
    };

    info!("Contract {} signed by {}", id, signer);
    Ok(Json(ApiResponse::success_with_message(
        "Contract signed".to_string(),
        ContractResponse::from_contract(contract, chrono::Utc::now()),
    )))
}

#[openapi(tag = "Contract")]
#[put("/contracts/terminated/<contract_id>")]
pub async fn terminate_contract(
    db: &State<DbConn>,
    auth: AuthGuard,
    contract_id: String,
) -> Result<Json<ApiResponse<ContractResponse>>, ApiError> {
    let id = parse_object_id(&contract_id, "id")?;
    let actor = auth.user_id;

    let options = FindOneAndUpdateOptions::builder()
        .return_document(ReturnDocument::After)
        .build();

    let terminated = db
        .collection::<Contract>(db::CONTRACTS)
        .find_one_and_update(
            doc! {
                "_id": id,
                "$or": [ { "company": actor }, { "student": actor } ],
                "status": ContractStatus::Active.as_str()
            },
            doc! {
                "$set": {
                    "status": ContractStatus::Terminated.as_str(),
                    "updated_at": DateTime::now()
                }
            },
            options,
        )
        .await
        .map_err(ApiError::database)?;

    let contract = match terminated {
        Some(contract) => contract,
        None => {
            load_contract(db, id).await?.check_terminate(&actor)?;
            return Err(ApiError::not_found("No active contract found"));
        }
    };

    info!("Contract {} terminated by {}", id, actor);
    Ok(Json(ApiResponse::success_with_message(
        "Contract terminated".to_string(),
        ContractResponse::from_contract(contract, chrono::Utc::now()),
    )))
}

#[openapi(tag = "Contract")]
#[delete("/contracts/<contract_id>")]
pub async fn cancel_contract(
    db: &State<DbConn>,
    auth: AuthGuard,
    contract_id: String,
) -> Result<NoContent, ApiError> {
    let id = parse_object_id(&contract_id, "id")?;
    let actor = auth.user_id;

    let result = db
        .collection::<Contract>(db::CONTRACTS)
        .delete_one(
            doc! {
                "_id": id,
                "$or": [ { "company": actor }, { "student": actor } ],
                "status": ContractStatus::Pending.as_str()
            },
            None,
        )
        .await
        .map_err(ApiError::database)?;

    if result.deleted_count == 0 {
        load_contract(db, id).await?.check_cancel(&actor)?;
        return Err(ApiError::not_found("No pending contract found"));
    }

    info!("Contract {} cancelled by {}", id, actor);
    Ok(NoContent)
}
