use rocket::serde::json::Json;
use rocket::State;
use rocket_okapi::openapi;
use mongodb::bson::{doc, DateTime};
use mongodb::options::{FindOneAndUpdateOptions, ReturnDocument};
use data_encoding::BASE64;
use serde::Deserialize;
use schemars::JsonSchema;
use std::path::Path;
use tokio::fs;
use uuid::Uuid;
use log::{error, info};

use crate::config::Config;
use crate::db::{self, DbConn};
use crate::models::{Person, PersonResponse, Role};
use crate::guards::AuthGuard;
use crate::utils::{ApiResponse, ApiError};

const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Base64UploadRequest {
    pub filename: String,
    pub mime_type: String,
    pub data: String,
}

/// What an uploaded file is attached to on the caller's profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Picture,
    Cv,
    MotivationLetter,
}

impl DocumentKind {
    pub fn parse(value: &str) -> Result<Self, ApiError> {
        match value {
            "picture" => Ok(DocumentKind::Picture),
            "cv" => Ok(DocumentKind::Cv),
            "motivation_letter" => Ok(DocumentKind::MotivationLetter),
            other => Err(ApiError::invalid_field(
                "kind",
                format!("Unknown document kind '{}'. Allowed: picture, cv, motivation_letter", other),
            )),
        }
    }

    fn field(self) -> &'static str {
        match self {
            DocumentKind::Picture => "picture",
            DocumentKind::Cv => "profile.cv",
            DocumentKind::MotivationLetter => "profile.motivation_letter",
        }
    }

    fn allowed_for(self, role: Role) -> bool {
        self == DocumentKind::Picture || role == Role::Student
    }

    /// Extension to store the file under, if the MIME type is accepted for this kind.
    pub fn extension_for(self, mime_type: &str) -> Option<&'static str> {
        let ext = match mime_type {
            "image/jpeg" | "image/jpg" => "jpg",
            "image/png" => "png",
            "image/webp" => "webp",
            "application/pdf" => "pdf",
            _ => return None,
        };
        if self == DocumentKind::Picture && ext == "pdf" {
            return None;
        }
        Some(ext)
    }
}

fn decode(data: &str) -> Result<Vec<u8>, ApiError> {
    // Accept data URLs as sent by browsers' FileReader
    let payload = match data.split_once(";base64,") {
        Some((_, rest)) => rest,
        None => data,
    };
    let bytes = BASE64
        .decode(payload.trim().as_bytes())
        .map_err(|_| ApiError::invalid_field("data", "Invalid base64 data"))?;

    if bytes.is_empty() {
        return Err(ApiError::invalid_field("data", "File is empty"));
    }
    if bytes.len() > MAX_UPLOAD_BYTES {
        return Err(ApiError::invalid_field("data", "File size exceeds 10MB limit"));
    }
    Ok(bytes)
}

#[openapi(tag = "User")]
#[post("/users/me/documents/<kind>", data = "<request>")]
pub async fn upload_document(
    db: &State<DbConn>,
    auth: AuthGuard,
    kind: String,
    request: Json<Base64UploadRequest>,
) -> Result<Json<ApiResponse<PersonResponse>>, ApiError> {
    let kind = DocumentKind::parse(&kind)?;
    if !kind.allowed_for(auth.role) {
        return Err(ApiError::forbidden("Only students can upload this document"));
    }

    let extension = kind.extension_for(&request.mime_type).ok_or_else(|| {
        ApiError::invalid_field(
            "mimeType",
            format!("MIME type {} is not accepted for this document", request.mime_type),
        )
    })?;
    let bytes = decode(&request.data)?;

    let upload_dir = Config::upload_dir();
    fs::create_dir_all(&upload_dir).await.map_err(|e| {
        error!("Failed to create upload directory {}: {}", upload_dir, e);
        ApiError::internal_error("Failed to store file")
    })?;

    let filename = format!("{}_{}.{}", Uuid::new_v4(), chrono::Utc::now().timestamp(), extension);
    let path = Path::new(&upload_dir).join(&filename);
    fs::write(&path, &bytes).await.map_err(|e| {
        error!("Failed to write {}: {}", path.display(), e);
        ApiError::internal_error("Failed to store file")
    })?;

    let url = format!("/uploads/{}", filename);
    info!(
        "Stored {} ({} bytes, from {}) for {}",
        url,
        bytes.len(),
        request.filename,
        auth.user_id
    );

    let options = FindOneAndUpdateOptions::builder()
        .return_document(ReturnDocument::After)
        .build();

    let mut set = doc! { "updated_at": DateTime::now() };
    set.insert(kind.field(), url.clone());

    let person = db
        .collection::<Person>(db::USERS)
        .find_one_and_update(
            doc! { "_id": auth.user_id },
            doc! { "$set": set },
            options,
        )
        .await
        .map_err(ApiError::database)?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    Ok(Json(ApiResponse::success_with_message(
        "Document uploaded successfully".to_string(),
        person.into(),
    )))
}
