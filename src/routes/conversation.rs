use rocket::serde::json::Json;
use rocket::response::status::Created;
use rocket::State;
use rocket_okapi::openapi;
use mongodb::bson::{doc, DateTime, oid::ObjectId};
use mongodb::options::{FindOneOptions, FindOptions};
use rocket::futures::TryStreamExt;
use validator::Validate;
use log::info;

use crate::db::{self, DbConn};
use crate::models::{
    Conversation, ConversationResponse, Message, MessageResponse, OpenConversationDto,
    PostMessageDto,
};
use crate::guards::AuthGuard;
use crate::routes::user::load_person;
use crate::utils::{ApiResponse, ApiError, parse_object_id};

/// Oldest thread between two people, in either order.
pub async fn conversation_for_pair(
    db: &DbConn,
    a: ObjectId,
    b: ObjectId,
) -> Result<Option<Conversation>, ApiError> {
    let options = FindOneOptions::builder().sort(doc! { "created_at": 1 }).build();
    db.collection::<Conversation>(db::CONVERSATIONS)
        .find_one(Conversation::pair_filter(&a, &b), options)
        .await
        .map_err(ApiError::database)
}

/// Loads a conversation the caller belongs to.
async fn member_conversation(
    db: &DbConn,
    auth: &AuthGuard,
    conversation_id: &str,
) -> Result<Conversation, ApiError> {
    let id = parse_object_id(conversation_id, "conversationId")?;
    let conversation = db
        .collection::<Conversation>(db::CONVERSATIONS)
        .find_one(doc! { "_id": id }, None)
        .await
        .map_err(ApiError::database)?
        .ok_or_else(|| ApiError::not_found("Conversation not found"))?;

    if !conversation.has_member(&auth.user_id) {
        return Err(ApiError::forbidden("You are not a member of this conversation"));
    }
    Ok(conversation)
}

#[openapi(tag = "Conversation")]
#[post("/conversations", data = "<dto>")]
pub async fn open_conversation(
    db: &State<DbConn>,
    auth: AuthGuard,
    dto: Json<OpenConversationDto>,
) -> Result<Json<ApiResponse<ConversationResponse>>, ApiError> {
    let sender = parse_object_id(&dto.sender_id, "senderId")?;
    let receiver = parse_object_id(&dto.receiver_id, "receiverId")?;

    if !auth.is(&sender) {
        return Err(ApiError::forbidden("You can only open conversations as yourself"));
    }
    if sender == receiver {
        return Err(ApiError::invalid_field("receiverId", "Cannot open a conversation with yourself"));
    }

    if let Some(existing) = conversation_for_pair(db, sender, receiver).await? {
        return Ok(Json(ApiResponse::success(existing.into())));
    }

    load_person(db, receiver).await?;

    let mut conversation = Conversation::new(sender, receiver);
    let result = db
        .collection::<Conversation>(db::CONVERSATIONS)
        .insert_one(&conversation, None)
        .await
        .map_err(ApiError::database)?;
    conversation.id = result.inserted_id.as_object_id();

    info!("Conversation {:?} opened between {} and {}", conversation.id, sender, receiver);
    Ok(Json(ApiResponse::success_with_message(
        "Conversation opened".to_string(),
        conversation.into(),
    )))
}

#[openapi(tag = "Conversation")]
#[get("/conversations/<person_id>")]
pub async fn list_conversations(
    db: &State<DbConn>,
    auth: AuthGuard,
    person_id: String,
) -> Result<Json<ApiResponse<Vec<ConversationResponse>>>, ApiError> {
    let person = parse_object_id(&person_id, "personId")?;
    if !auth.is(&person) {
        return Err(ApiError::forbidden("You can only list your own conversations"));
    }

    let options = FindOptions::builder().sort(doc! { "updated_at": -1 }).build();
    let conversations: Vec<ConversationResponse> = db
        .collection::<Conversation>(db::CONVERSATIONS)
        .find(doc! { "members": person }, options)
        .await
        .map_err(ApiError::database)?
        .map_ok(ConversationResponse::from)
        .try_collect()
        .await
        .map_err(ApiError::database)?;

    Ok(Json(ApiResponse::success(conversations)))
}

#[openapi(tag = "Conversation")]
#[get("/conversations/find/<first_id>/<second_id>")]
pub async fn find_conversation(
    db: &State<DbConn>,
    auth: AuthGuard,
    first_id: String,
    second_id: String,
) -> Result<Json<ApiResponse<Option<ConversationResponse>>>, ApiError> {
    let first = parse_object_id(&first_id, "firstId")?;
    let second = parse_object_id(&second_id, "secondId")?;
    if !auth.is(&first) && !auth.is(&second) {
        return Err(ApiError::forbidden("You are not a member of this conversation"));
    }

    let found = conversation_for_pair(db, first, second).await?;
    Ok(Json(ApiResponse::success(found.map(ConversationResponse::from))))
}

#[openapi(tag = "Conversation")]
#[post("/messages", data = "<dto>")]
pub async fn post_message(
    db: &State<DbConn>,
    auth: AuthGuard,
    dto: Json<PostMessageDto>,
) -> Result<Created<Json<ApiResponse<MessageResponse>>>, ApiError> {
    dto.validate().map_err(|e| ApiError::validation(&e))?;
    let conversation = member_conversation(db, &auth, &dto.conversation_id).await?;
    let conversation_id = conversation.id.ok_or_else(|| ApiError::not_found("Conversation not found"))?;

    let now = DateTime::now();
    let mut message = Message {
        id: None,
        conversation: conversation_id,
        sender: auth.user_id,
        text: dto.text.trim().to_string(),
        created_at: now,
    };

    let result = db
        .collection::<Message>(db::MESSAGES)
        .insert_one(&message, None)
        .await
        .map_err(ApiError::database)?;
    message.id = result.inserted_id.as_object_id();

    db.collection::<Conversation>(db::CONVERSATIONS)
        .update_one(
            doc! { "_id": conversation_id },
            doc! { "$set": { "updated_at": now } },
            None,
        )
        .await
        .map_err(ApiError::database)?;

    let location = format!("/api/messages/{}", conversation_id.to_hex());
    Ok(Created::new(location).body(Json(ApiResponse::success(message.into()))))
}

#[openapi(tag = "Conversation")]
#[get("/messages/<conversation_id>")]
pub async fn list_messages(
    db: &State<DbConn>,
    auth: AuthGuard,
    conversation_id: String,
) -> Result<Json<ApiResponse<Vec<MessageResponse>>>, ApiError> {
    let conversation = member_conversation(db, &auth, &conversation_id).await?;
    let id = conversation.id.ok_or_else(|| ApiError::not_found("Conversation not found"))?;

    let options = FindOptions::builder().sort(doc! { "created_at": 1 }).build();
    let messages: Vec<MessageResponse> = db
        .collection::<Message>(db::MESSAGES)
        .find(doc! { "conversation": id }, options)
        .await
        .map_err(ApiError::database)?
        .map_ok(MessageResponse::from)
        .try_collect()
        .await
        .map_err(ApiError::database)?;

    Ok(Json(ApiResponse::success(messages)))
}
