//! Lifecycle scenarios against a real MongoDB. They run when `MONGODB_URI`
//! (or `ROCKET_MONGODB_URI`) points at a reachable server and return early
//! otherwise. Every test works in its own throwaway database.

use std::time::Duration;

use mongodb::bson::{doc, oid::ObjectId, DateTime};
use mongodb::options::ClientOptions;
use mongodb::Database;
use rocket::http::{ContentType, Method, Status};
use rocket::local::asynchronous::Client;
use rocket::serde::json::{json, Value};

use super::token_for;
use crate::db;
use crate::models::{Adoption, AdoptionStatus, CompanyProfile, Person, Profile, Role, StudentProfile};

async fn setup() -> Option<(Client, Database)> {
    let uri = std::env::var("MONGODB_URI")
        .or_else(|_| std::env::var("ROCKET_MONGODB_URI"))
        .ok()?;

    let mut options = ClientOptions::parse(&uri).await.ok()?;
    options.server_selection_timeout = Some(Duration::from_secs(2));
    let driver = mongodb::Client::with_options(options).ok()?;

    let database = driver.database(&format!("adopte-test-{}", ObjectId::new().to_hex()));
    if let Err(e) = database.run_command(doc! { "ping": 1 }, None).await {
        eprintln!("MongoDB unreachable at {}, skipping: {}", uri, e);
        return None;
    }
    db::ensure_indexes(&database).await.expect("indexes");

    let rocket = crate::build(rocket::build().manage(database.clone()));
    let client = Client::tracked(rocket).await.expect("valid rocket instance");
    Some((client, database))
}

async fn insert_person(database: &Database, profile: Profile) -> ObjectId {
    let now = DateTime::now();
    let person = Person {
        id: None,
        email: format!("{}@example.test", ObjectId::new().to_hex()),
        password_hash: String::new(),
        city: None,
        description: None,
        picture: None,
        profile,
        created_at: now,
        updated_at: now,
    };

    database
        .collection::<Person>(db::USERS)
        .insert_one(&person, None)
        .await
        .expect("insert person")
        .inserted_id
        .as_object_id()
        .expect("object id")
}

async fn student(database: &Database) -> ObjectId {
    let profile = StudentProfile {
        firstname: "Camille".to_string(),
        lastname: "Martin".to_string(),
        searching: true,
        ..Default::default()
    };
    insert_person(database, Profile::Student(profile)).await
}

async fn company(database: &Database) -> ObjectId {
    let profile = CompanyProfile {
        name: "Acme".to_string(),
        favorites: Vec::new(),
    };
    insert_person(database, Profile::Company(profile)).await
}

async fn call(
    client: &Client,
    method: Method,
    uri: String,
    caller: (&ObjectId, Role),
    body: Option<Value>,
) -> (Status, Value) {
    let mut request = client.req(method, uri).header(token_for(caller.0, caller.1));
    if let Some(body) = body {
        request = request.header(ContentType::JSON).body(body.to_string());
    }

    let response = request.dispatch().await;
    let status = response.status();
    let body = response.into_json::<Value>().await.unwrap_or(Value::Null);
    (status, body)
}

fn id_of(body: &Value) -> String {
    body["data"]["id"].as_str().expect("data.id").to_string()
}

async fn pending_adoptions(database: &Database, adopter: ObjectId, adopted: ObjectId) -> u64 {
    database
        .collection::<Adoption>(db::ADOPTIONS)
        .count_documents(
            doc! { "adopter": adopter, "adopted": adopted, "status": "pending" },
            None,
        )
        .await
        .expect("count")
}

async fn adopt(client: &Client, adopter: &ObjectId, adopted: &ObjectId) -> (Status, Value) {
    call(
        client,
        Method::Post,
        "/api/adoptions".to_string(),
        (adopter, Role::Company),
        Some(json!({ "adopterId": adopter.to_hex(), "adoptedId": adopted.to_hex() })),
    )
    .await
}

async fn published_offer(client: &Client, owner: &ObjectId) -> String {
    let (status, body) = call(
        client,
        Method::Post,
        "/api/jobOffers".to_string(),
        (owner, Role::Company),
        Some(json!({ "title": "Développeur Rust", "description": "Alternance backend" })),
    )
    .await;
    assert_eq!(status, Status::Created);
    let offer = id_of(&body);

    let (status, _) = call(
        client,
        Method::Put,
        format!("/api/jobOffers/{}/publish", offer),
        (owner, Role::Company),
        None,
    )
    .await;
    assert_eq!(status, Status::Ok);
    offer
}

#[rocket::async_test]
async fn second_adoption_request_conflicts_and_leaves_one_pending() {
    let Some((client, database)) = setup().await else { return };
    let acme = company(&database).await;
    let camille = student(&database).await;

    let (first, _) = adopt(&client, &acme, &camille).await;
    let (second, body) = adopt(&client, &acme, &camille).await;

    assert_eq!(first, Status::Created);
    assert_eq!(second, Status::Conflict);
    assert_eq!(body["success"], false);
    assert_eq!(pending_adoptions(&database, acme, camille).await, 1);

    database.drop(None).await.ok();
}

#[rocket::async_test]
async fn concurrent_adoption_requests_create_a_single_pending_adoption() {
    let Some((client, database)) = setup().await else { return };
    let acme = company(&database).await;
    let camille = student(&database).await;

    let ((a, _), (b, _)) = tokio::join!(
        adopt(&client, &acme, &camille),
        adopt(&client, &acme, &camille)
    );

    let mut statuses = vec![a.code, b.code];
    statuses.sort();
    assert_eq!(statuses, vec![201, 409]);
    assert_eq!(pending_adoptions(&database, acme, camille).await, 1);

    database.drop(None).await.ok();
}

#[rocket::async_test]
async fn pending_index_only_restricts_pending_adoptions() {
    let Some((_client, database)) = setup().await else { return };
    let adoptions = database.collection::<Adoption>(db::ADOPTIONS);
    let (acme, camille) = (ObjectId::new(), ObjectId::new());

    let mut accepted = Adoption::new(acme, camille);
    accepted.status = AdoptionStatus::Accepted;
    adoptions.insert_one(&accepted, None).await.expect("accepted adoption");
    adoptions
        .insert_one(&Adoption::new(acme, camille), None)
        .await
        .expect("first pending adoption");

    let err = adoptions
        .insert_one(&Adoption::new(acme, camille), None)
        .await
        .expect_err("second pending adoption");
    assert!(db::is_duplicate_key(&err));

    database.drop(None).await.ok();
}

#[rocket::async_test]
async fn accepted_adoption_cannot_be_cancelled() {
    let Some((client, database)) = setup().await else { return };
    let acme = company(&database).await;
    let camille = student(&database).await;

    let (_, body) = adopt(&client, &acme, &camille).await;
    let adoption = id_of(&body);

    let (status, body) = call(
        &client,
        Method::Put,
        format!("/api/adoptions/{}/accepted", adoption),
        (&camille, Role::Student),
        None,
    )
    .await;
    assert_eq!(status, Status::Ok);
    assert_eq!(body["data"]["status"], "accepted");

    let (status, _) = call(
        &client,
        Method::Delete,
        format!("/api/adoptions/{}", adoption),
        (&acme, Role::Company),
        None,
    )
    .await;
    assert_eq!(status, Status::Forbidden);

    let stored = database
        .collection::<Adoption>(db::ADOPTIONS)
        .find_one(doc! { "_id": ObjectId::parse_str(&adoption).expect("id") }, None)
        .await
        .expect("query")
        .expect("adoption still stored");
    assert_eq!(stored.status, AdoptionStatus::Accepted);

    database.drop(None).await.ok();
}

#[rocket::async_test]
async fn contract_requires_an_accepted_adoption() {
    let Some((client, database)) = setup().await else { return };
    let acme = company(&database).await;
    let camille = student(&database).await;
    adopt(&client, &acme, &camille).await;

    let (status, _) = call(
        &client,
        Method::Post,
        "/api/contracts".to_string(),
        (&acme, Role::Company),
        Some(json!({
            "companyId": acme.to_hex(),
            "studentId": camille.to_hex(),
            "startDate": "2025-01-01",
            "endDate": "2025-07-01"
        })),
    )
    .await;
    assert_eq!(status, Status::Conflict);

    database.drop(None).await.ok();
}

#[rocket::async_test]
async fn adopt_accept_contract_sign_yields_one_active_six_month_contract() {
    let Some((client, database)) = setup().await else { return };
    let acme = company(&database).await;
    let camille = student(&database).await;

    let (_, body) = adopt(&client, &acme, &camille).await;
    let (status, _) = call(
        &client,
        Method::Put,
        format!("/api/adoptions/{}/accepted", id_of(&body)),
        (&camille, Role::Student),
        None,
    )
    .await;
    assert_eq!(status, Status::Ok);

    let (status, body) = call(
        &client,
        Method::Post,
        "/api/contracts".to_string(),
        (&acme, Role::Company),
        Some(json!({
            "companyId": acme.to_hex(),
            "studentId": camille.to_hex(),
            "startDate": "2025-01-01",
            "endDate": "2025-07-01",
            "terms": "Alternance, 3 jours en entreprise"
        })),
    )
    .await;
    assert_eq!(status, Status::Created);
    assert_eq!(body["data"]["status"], "pending");

    let (status, body) = call(
        &client,
        Method::Put,
        format!("/api/contracts/active/{}", id_of(&body)),
        (&camille, Role::Student),
        None,
    )
    .await;
    assert_eq!(status, Status::Ok);
    assert!(body["data"]["signedAt"].is_string());

    let (status, body) = call(
        &client,
        Method::Get,
        format!("/api/contracts/{}", camille.to_hex()),
        (&camille, Role::Student),
        None,
    )
    .await;
    assert_eq!(status, Status::Ok);
    let contracts = body["data"].as_array().expect("contract list");
    assert_eq!(contracts.len(), 1);
    assert_eq!(contracts[0]["status"], "active");
    assert_eq!(contracts[0]["durationMonths"], 6);

    let (_, body) = call(
        &client,
        Method::Get,
        format!("/api/contracts/{}?status=pending", camille.to_hex()),
        (&camille, Role::Student),
        None,
    )
    .await;
    assert_eq!(body["data"].as_array().map(Vec::len), Some(0));

    database.drop(None).await.ok();
}

#[rocket::async_test]
async fn second_application_conflicts_and_check_reports_applied() {
    let Some((client, database)) = setup().await else { return };
    let acme = company(&database).await;
    let camille = student(&database).await;
    let offer = published_offer(&client, &acme).await;

    let submit = json!({ "studentId": camille.to_hex(), "jobOfferId": offer });
    let (first, _) = call(
        &client,
        Method::Post,
        "/api/jobApplications".to_string(),
        (&camille, Role::Student),
        Some(submit.clone()),
    )
    .await;
    let (second, _) = call(
        &client,
        Method::Post,
        "/api/jobApplications".to_string(),
        (&camille, Role::Student),
        Some(submit),
    )
    .await;
    assert_eq!(first, Status::Created);
    assert_eq!(second, Status::Conflict);

    let (status, body) = call(
        &client,
        Method::Get,
        format!("/api/jobApplications/check/{}/{}", camille.to_hex(), offer),
        (&camille, Role::Student),
        None,
    )
    .await;
    assert_eq!(status, Status::Ok);
    assert_eq!(body["data"]["applied"], true);

    database.drop(None).await.ok();
}

#[rocket::async_test]
async fn review_succeeds_when_the_applicant_account_is_gone() {
    let Some((client, database)) = setup().await else { return };
    let acme = company(&database).await;
    let camille = student(&database).await;
    let offer = published_offer(&client, &acme).await;

    let (status, body) = call(
        &client,
        Method::Post,
        "/api/jobApplications".to_string(),
        (&camille, Role::Student),
        Some(json!({ "studentId": camille.to_hex(), "jobOfferId": offer })),
    )
    .await;
    assert_eq!(status, Status::Created);
    let application = id_of(&body);

    database
        .collection::<Person>(db::USERS)
        .delete_one(doc! { "_id": camille }, None)
        .await
        .expect("delete student");

    let (status, body) = call(
        &client,
        Method::Put,
        format!("/api/jobApplications/{}/status", application),
        (&acme, Role::Company),
        Some(json!({ "status": "reviewed" })),
    )
    .await;
    assert_eq!(status, Status::Ok);
    assert_eq!(body["data"]["status"], "reviewed");

    database.drop(None).await.ok();
}
