mod lifecycle;

use mongodb::bson::oid::ObjectId;
use rocket::http::{ContentType, Header, Status};
use rocket::local::asynchronous::Client;
use rocket::serde::json::{json, Value};

use crate::guards::auth::TOKEN_HEADER;
use crate::models::Role;
use crate::services::JwtService;

/// The driver connects lazily, so requests rejected before any query never
/// need a running MongoDB.
async fn client() -> Client {
    let database = mongodb::Client::with_uri_str("mongodb://127.0.0.1:27017")
        .await
        .expect("valid uri")
        .database("adopte-un-etudiant-test");

    let rocket = crate::build(rocket::build().manage(database));
    Client::tracked(rocket).await.expect("valid rocket instance")
}

fn token_for(id: &ObjectId, role: Role) -> Header<'static> {
    let token = JwtService::generate_access_token(id, role).expect("token");
    Header::new(TOKEN_HEADER, token)
}

#[rocket::async_test]
async fn protected_route_without_token_is_unauthorized() {
    let client = client().await;
    let response = client.get("/api/users/me").dispatch().await;

    assert_eq!(response.status(), Status::Unauthorized);
    let body: Value = response.into_json().await.expect("json body");
    assert_eq!(body["success"], false);
}

#[rocket::async_test]
async fn garbage_token_is_unauthorized() {
    let client = client().await;
    let response = client
        .get("/api/adoptions/65a000000000000000000001")
        .header(Header::new(TOKEN_HEADER, "not-a-jwt"))
        .dispatch()
        .await;

    assert_eq!(response.status(), Status::Unauthorized);
}

#[rocket::async_test]
async fn refresh_token_cannot_authenticate_requests() {
    let client = client().await;
    let id = ObjectId::new();
    let refresh = JwtService::generate_refresh_token(&id, Role::Student).expect("token");

    let response = client
        .get("/api/users/me")
        .header(Header::new(TOKEN_HEADER, refresh))
        .dispatch()
        .await;

    assert_eq!(response.status(), Status::Unauthorized);
}

#[rocket::async_test]
async fn students_cannot_send_adoption_requests() {
    let client = client().await;
    let student = ObjectId::new();

    let response = client
        .post("/api/adoptions")
        .header(ContentType::JSON)
        .header(token_for(&student, Role::Student))
        .body(
            json!({
                "adopterId": student.to_hex(),
                "adoptedId": ObjectId::new().to_hex()
            })
            .to_string(),
        )
        .dispatch()
        .await;

    assert_eq!(response.status(), Status::Forbidden);
}

#[rocket::async_test]
async fn companies_cannot_accept_adoptions() {
    let client = client().await;
    let response = client
        .put(format!("/api/adoptions/{}/accepted", ObjectId::new().to_hex()))
        .header(token_for(&ObjectId::new(), Role::Company))
        .dispatch()
        .await;

    assert_eq!(response.status(), Status::Forbidden);
}

#[rocket::async_test]
async fn contract_with_end_before_start_is_rejected_on_end_date() {
    let client = client().await;
    let company = ObjectId::new();

    let response = client
        .post("/api/contracts")
        .header(ContentType::JSON)
        .header(token_for(&company, Role::Company))
        .body(
            json!({
                "companyId": company.to_hex(),
                "studentId": ObjectId::new().to_hex(),
                "startDate": "2024-09-01",
                "endDate": "2024-09-01",
                "terms": "Alternance"
            })
            .to_string(),
        )
        .dispatch()
        .await;

    assert_eq!(response.status(), Status::BadRequest);
    let body: Value = response.into_json().await.expect("json body");
    assert!(body["errors"]["endDate"].is_array());
}

#[rocket::async_test]
async fn unknown_contract_status_filter_is_rejected() {
    let client = client().await;
    let person = ObjectId::new();

    let response = client
        .get(format!("/api/contracts/{}?status=signed", person.to_hex()))
        .header(token_for(&person, Role::Student))
        .dispatch()
        .await;

    assert_eq!(response.status(), Status::BadRequest);
}

#[rocket::async_test]
async fn listing_someone_elses_adoptions_is_forbidden() {
    let client = client().await;
    let response = client
        .get(format!("/api/adoptions/{}", ObjectId::new().to_hex()))
        .header(token_for(&ObjectId::new(), Role::Student))
        .dispatch()
        .await;

    assert_eq!(response.status(), Status::Forbidden);
}

#[rocket::async_test]
async fn malformed_id_is_a_field_error() {
    let client = client().await;
    let response = client
        .put("/api/adoptions/not-an-id/accepted")
        .header(token_for(&ObjectId::new(), Role::Student))
        .dispatch()
        .await;

    assert_eq!(response.status(), Status::BadRequest);
    let body: Value = response.into_json().await.expect("json body");
    assert!(body["errors"]["id"].is_array());
}

#[rocket::async_test]
async fn signup_reports_invalid_fields() {
    let client = client().await;
    let response = client
        .post("/api/auth/signup")
        .header(ContentType::JSON)
        .body(
            json!({
                "role": "student",
                "email": "not-an-email",
                "password": "short",
                "firstname": "Camille",
                "lastname": "Martin"
            })
            .to_string(),
        )
        .dispatch()
        .await;

    assert_eq!(response.status(), Status::BadRequest);
    let body: Value = response.into_json().await.expect("json body");
    assert!(body["errors"]["email"].is_array());
    assert!(body["errors"]["password"].is_array());
}

#[rocket::async_test]
async fn companies_cannot_upload_a_cv() {
    let client = client().await;
    let response = client
        .post("/api/users/me/documents/cv")
        .header(ContentType::JSON)
        .header(token_for(&ObjectId::new(), Role::Company))
        .body(
            json!({
                "filename": "cv.pdf",
                "mimeType": "application/pdf",
                "data": "aGVsbG8="
            })
            .to_string(),
        )
        .dispatch()
        .await;

    assert_eq!(response.status(), Status::Forbidden);
}

#[rocket::async_test]
async fn unknown_route_returns_json_404() {
    let client = client().await;
    let response = client.get("/api/nowhere/to/be/found").dispatch().await;

    assert_eq!(response.status(), Status::NotFound);
    let body: Value = response.into_json().await.expect("json body");
    assert_eq!(body["success"], false);
}

#[rocket::async_test]
async fn preflight_allows_the_token_header() {
    let client = client().await;
    let response = client
        .options("/api/adoptions")
        .header(Header::new("Origin", "http://localhost:3000"))
        .dispatch()
        .await;

    assert_eq!(response.status(), Status::Ok);
    let allowed = response
        .headers()
        .get_one("Access-Control-Allow-Headers")
        .unwrap_or_default();
    assert!(allowed.contains("x-access-token"));
}

#[rocket::async_test]
async fn openapi_document_is_served() {
    let client = client().await;
    let response = client.get("/api/openapi.json").dispatch().await;

    assert_eq!(response.status(), Status::Ok);
    let body: Value = response.into_json().await.expect("json body");
    let paths = body["paths"].as_object().expect("paths object");
    assert!(paths.keys().any(|path| path.ends_with("/adoptions")));
    assert!(paths.keys().any(|path| path.contains("/history/")));
}
