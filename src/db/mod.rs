use mongodb::bson::doc;
use mongodb::error::{Error, ErrorKind, WriteFailure};
use mongodb::options::IndexOptions;
use mongodb::{Client, Database, IndexModel};
use rocket::fairing::AdHoc;
use log::{error, info};

pub const USERS: &str = "users";
pub const ADOPTIONS: &str = "adoptions";
pub const CONTRACTS: &str = "contracts";
pub const JOB_OFFERS: &str = "job_offers";
pub const JOB_APPLICATIONS: &str = "job_applications";
pub const CONVERSATIONS: &str = "conversations";
pub const MESSAGES: &str = "messages";

const DUPLICATE_KEY: i32 = 11000;

pub fn init() -> AdHoc {
    AdHoc::on_ignite("MongoDB", |rocket| async {
        match connect().await {
            Ok(database) => {
                info!("✓ MongoDB connected successfully");
                if let Err(e) = ensure_indexes(&database).await {
                    error!("✗ Failed to create MongoDB indexes: {}", e);
                }
                rocket.manage(database)
            }
            Err(e) => {
                error!("✗ Failed to connect to MongoDB: {}", e);
                rocket
            }
        }
    })
}

async fn connect() -> Result<Database, Error> {
    let uri = crate::config::Config::mongodb_uri();
    let client = Client::with_uri_str(&uri).await?;

    // Test connection
    client
        .database("admin")
        .run_command(doc! {"ping": 1}, None)
        .await?;

    Ok(client.database(&crate::config::Config::database_name()))
}

/// Unique indexes backing the lifecycle invariants. Two concurrent creates
/// for the same pair cannot both pass these.
pub async fn ensure_indexes(db: &Database) -> Result<(), Error> {
    db.collection::<mongodb::bson::Document>(USERS)
        .create_index(
            IndexModel::builder()
                .keys(doc! { "email": 1 })
                .options(IndexOptions::builder().unique(true).build())
                .build(),
            None,
        )
        .await?;

    // One pending adoption per (adopter, adopted)
    db.collection::<mongodb::bson::Document>(ADOPTIONS)
        .create_index(
            IndexModel::builder()
                .keys(doc! { "adopter": 1, "adopted": 1 })
                .options(
                    IndexOptions::builder()
                        .unique(true)
                        .partial_filter_expression(doc! { "status": "pending" })
                        .name("one_pending_adoption_per_pair".to_string())
                        .build(),
                )
                .build(),
            None,
        )
        .await?;

    db.collection::<mongodb::bson::Document>(JOB_APPLICATIONS)
        .create_index(
            IndexModel::builder()
                .keys(doc! { "student": 1, "job_offer": 1 })
                .options(IndexOptions::builder().unique(true).build())
                .build(),
            None,
        )
        .await?;

    db.collection::<mongodb::bson::Document>(MESSAGES)
        .create_index(
            IndexModel::builder()
                .keys(doc! { "conversation": 1, "created_at": 1 })
                .build(),
            None,
        )
        .await?;

    Ok(())
}

/// True when the write was refused by a unique index.
pub fn is_duplicate_key(err: &Error) -> bool {
    match err.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(write_error)) => write_error.code == DUPLICATE_KEY,
        _ => false,
    }
}

pub type DbConn = Database;
