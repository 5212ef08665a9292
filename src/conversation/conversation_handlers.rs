use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use uuid::Uuid;

use crate::{
    conversation::{
        conversation_dto::StartConversationRequest,
        conversation_models::{Conversation, ConversationPreview},
    },
    error::Result,
    middleware::AuthUser,
    state::AppState,
};

/// List the caller's conversations
#[utoipa::path(
    get,
    path = "/api/conversations",
    tag = "conversations",
    responses(
        (status = 200, description = "Conversation previews, unordered", body = [ConversationPreview]),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn get_conversations(
    State(state): State<AppState>,
    AuthUser(session): AuthUser,
) -> Result<impl IntoResponse> {
    let previews = state
        .conversation_repository
        .fetch_user_conversations(Some(&session))
        .await?;

    Ok((StatusCode::OK, Json(previews)))
}

/// Open (or create) the conversation with another user
#[utoipa::path(
    post,
    path = "/api/conversations",
    tag = "conversations",
    request_body = StartConversationRequest,
    responses(
        (status = 201, description = "Conversation ready", body = Conversation),
        (status = 400, description = "Invalid counterpart"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "User not found")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn start_conversation(
    State(state): State<AppState>,
    AuthUser(session): AuthUser,
    Json(payload): Json<StartConversationRequest>,
) -> Result<impl IntoResponse> {
    let conversation = state
        .conversation_repository
        .start_conversation(Some(&session), payload.other_user_id)
        .await?;

    Ok((StatusCode::CREATED, Json(conversation)))
}

/// Delete a conversation with all of its messages
#[utoipa::path(
    delete,
    path = "/api/conversations/{id}",
    tag = "conversations",
    params(
        ("id" = Uuid, Path, description = "Conversation id")
    ),
    responses(
        (status = 204, description = "Conversation deleted"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Not a participant"),
        (status = 500, description = "A deletion step failed")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn delete_conversation(
    State(state): State<AppState>,
    AuthUser(session): AuthUser,
    Path(conversation_id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    state
        .conversation_deletion
        .delete_conversation(Some(&session), conversation_id)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}
