use actix_web::{web, HttpResponse};

use crate::database::MongoDB;
use crate::middleware::auth::Claims;
use crate::models::{ConversationResponse, CreateConversationRequest, SendMessageRequest};
use crate::services::message_service;
use crate::utils::AppError;

#[utoipa::path(
    get,
    path = "/api/messages/conversations",
    tag = "Messages",
    responses((status = 200, description = "Caller's conversations, most recent first")),
    security(("bearer_auth" = []))
)]
pub async fn list_conversations(
    db: web::Data<MongoDB>,
    claims: web::ReqData<Claims>,
) -> Result<HttpResponse, AppError> {
    log::info!("💬 GET /messages/conversations - user: {}", claims.sub);

    let conversations = message_service::list_conversations(&db, &claims).await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "total": conversations.len(),
        "conversations": conversations
    })))
}

#[utoipa::path(
    post,
    path = "/api/messages/conversations",
    tag = "Messages",
    request_body = CreateConversationRequest,
    responses(
        (status = 200, description = "Existing or new conversation", body = ConversationResponse),
        (status = 404, description = "Participant not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_conversation(
    db: web::Data<MongoDB>,
    claims: web::ReqData<Claims>,
    request: web::Json<CreateConversationRequest>,
) -> Result<HttpResponse, AppError> {
    log::info!(
        "💬 POST /messages/conversations - {} -> {}",
        claims.sub,
        request.participant_id
    );

    let conversation = message_service::create_conversation(&db, &claims, &request).await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "conversation": ConversationResponse::from(conversation)
    })))
}

#[utoipa::path(
    get,
    path = "/api/messages/conversations/{id}",
    tag = "Messages",
    params(("id" = String, Path, description = "Conversation ID")),
    responses(
        (status = 200, description = "Conversation with messages", body = ConversationResponse),
        (status = 403, description = "Not a participant")
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_conversation(
    db: web::Data<MongoDB>,
    claims: web::ReqData<Claims>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let id = path.into_inner();
    let conversation = message_service::get_conversation(&db, &claims, &id).await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "conversation": ConversationResponse::from(conversation)
    })))
}

#[utoipa::path(
    post,
    path = "/api/messages/conversations/{id}",
    tag = "Messages",
    params(("id" = String, Path, description = "Conversation ID")),
    request_body = SendMessageRequest,
    responses(
        (status = 201, description = "Message stored"),
        (status = 400, description = "Empty or oversized message"),
        (status = 403, description = "Not a participant")
    ),
    security(("bearer_auth" = []))
)]
pub async fn send_message(
    db: web::Data<MongoDB>,
    claims: web::ReqData<Claims>,
    path: web::Path<String>,
    request: web::Json<SendMessageRequest>,
) -> Result<HttpResponse, AppError> {
    let id = path.into_inner();
    log::info!("✉️ POST /messages/conversations/{} - sender: {}", id, claims.sub);

    let message = message_service::send_message(&db, &claims, &id, &request.text).await?;

    Ok(HttpResponse::Created().json(serde_json::json!({
        "success": true,
        "message": message
    })))
}

#[utoipa::path(
    post,
    path = "/api/messages/conversations/{id}/read",
    tag = "Messages",
    params(("id" = String, Path, description = "Conversation ID")),
    responses((status = 200, description = "Messages marked read")),
    security(("bearer_auth" = []))
)]
pub async fn mark_read(
    db: web::Data<MongoDB>,
    claims: web::ReqData<Claims>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let id = path.into_inner();
    let updated = message_service::mark_read(&db, &claims, &id).await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "marked_read": updated
    })))
}
