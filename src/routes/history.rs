use rocket::serde::json::Json;
use rocket::State;
use rocket_okapi::openapi;

use crate::db::DbConn;
use crate::models::HistoryProjection;
use crate::guards::AuthGuard;
use crate::routes::adoption::adoption_for_pair;
use crate::routes::contract::first_contract_for_pair;
use crate::routes::conversation::conversation_for_pair;
use crate::utils::{ApiResponse, ApiError, parse_object_id};

/// Relationship timeline between a company and a student.
#[openapi(tag = "History")]
#[get("/history/<company_id>/<student_id>")]
pub async fn relationship_history(
    db: &State<DbConn>,
    auth: AuthGuard,
    company_id: String,
    student_id: String,
) -> Result<Json<ApiResponse<HistoryProjection>>, ApiError> {
    let company = parse_object_id(&company_id, "companyId")?;
    let student = parse_object_id(&student_id, "studentId")?;
    if !auth.is(&company) && !auth.is(&student) {
        return Err(ApiError::forbidden("Not a party to this relationship"));
    }

    let adoption = adoption_for_pair(db, company, student, 1).await?;
    let conversation = conversation_for_pair(db, company, student).await?;
    let contract = first_contract_for_pair(db, company, student).await?;

    let projection = HistoryProjection::build(
        company.to_hex(),
        student.to_hex(),
        adoption.as_ref(),
        conversation.as_ref(),
        contract.as_ref(),
        chrono::Utc::now(),
    );
    Ok(Json(ApiResponse::success(projection)))
}
