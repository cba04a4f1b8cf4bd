use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
};
use uuid::Uuid;

use crate::{
    dto::chat::{
        ConversationList, ConversationSummary, MessageList, SendMessageRequest,
        StartConversationRequest,
    },
    error::AppResult,
    middleware::auth::AuthUser,
    models::Message,
    response::ApiResponse,
    routes::params::Pagination,
    services::chat_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/messages", post(send_message))
        .route("/conversations", get(list_conversations).post(start_conversation))
        .route("/conversations/{id}/messages", get(list_messages))
}

#[utoipa::path(
    post,
    path = "/api/chat/messages",
    request_body = SendMessageRequest,
    responses(
        (status = 201, description = "Message sent", body = ApiResponse<Message>),
        (status = 400, description = "Empty message or messaging yourself"),
        (status = 404, description = "Recipient not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Chat"
)]
pub async fn send_message(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<SendMessageRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<Message>>)> {
    let resp = chat_service::send_message(&state, &user, payload).await?;
    Ok((StatusCode::CREATED, Json(resp)))
}

#[utoipa::path(
    get,
    path = "/api/chat/conversations",
    params(Pagination),
    responses(
        (status = 200, description = "Own conversations", body = ApiResponse<ConversationList>)
    ),
    security(("bearer_auth" = [])),
    tag = "Chat"
)]
pub async fn list_conversations(
    State(state): State<AppState>,
    user: AuthUser,
    Query(pagination): Query<Pagination>,
) -> AppResult<Json<ApiResponse<ConversationList>>> {
    let resp = chat_service::list_conversations(&state, &user, pagination).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/chat/conversations",
    request_body = StartConversationRequest,
    responses(
        (status = 200, description = "Existing or new conversation", body = ApiResponse<ConversationSummary>),
        (status = 404, description = "Participant not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Chat"
)]
pub async fn start_conversation(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<StartConversationRequest>,
) -> AppResult<Json<ApiResponse<ConversationSummary>>> {
    let resp = chat_service::start_conversation(&state, &user, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/chat/conversations/{id}/messages",
    params(("id" = Uuid, Path, description = "Conversation ID"), Pagination),
    responses(
        (status = 200, description = "Messages, newest first", body = ApiResponse<MessageList>),
        (status = 404, description = "Not a participant")
    ),
    security(("bearer_auth" = [])),
    tag = "Chat"
)]
pub async fn list_messages(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Query(pagination): Query<Pagination>,
) -> AppResult<Json<ApiResponse<MessageList>>> {
    let resp = chat_service::list_messages(&state, &user, id, pagination).await?;
    Ok(Json(resp))
}
