use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive},
        IntoResponse, Sse,
    },
    Json,
};
use futures::stream::Stream;
use std::convert::Infallible;
use tokio::sync::broadcast;
use tokio_stream::{wrappers::BroadcastStream, StreamExt};
use uuid::Uuid;
use validator::Validate;

use crate::{
    error::Result,
    message::{
        message_dto::{
            MarkReadRequest, MarkReadResponse, MessageQuery, SendMessageRequest,
            UnreadCountResponse,
        },
        message_models::{Message, MessageEvent},
    },
    middleware::{AuthUser, MaybeSession},
    state::AppState,
};

/// Messages of one conversation, oldest first
#[utoipa::path(
    get,
    path = "/api/conversations/{id}/messages",
    tag = "messages",
    params(
        ("id" = Uuid, Path, description = "Conversation id"),
        ("page" = Option<u32>, Query, description = "1-based page"),
        ("limit" = Option<u32>, Query, description = "Page size, at most 100")
    ),
    responses(
        (status = 200, description = "Messages", body = [Message]),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Not a participant")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn get_messages(
    State(state): State<AppState>,
    AuthUser(session): AuthUser,
    Path(conversation_id): Path<Uuid>,
    Query(query): Query<MessageQuery>,
) -> Result<impl IntoResponse> {
    let messages = state
        .message_repository
        .list_thread(
            Some(&session),
            conversation_id,
            query.page.unwrap_or(1),
            query.limit.unwrap_or(50),
        )
        .await?;

    Ok((StatusCode::OK, Json(messages)))
}

/// Send a message into a conversation
#[utoipa::path(
    post,
    path = "/api/conversations/{id}/messages",
    tag = "messages",
    params(
        ("id" = Uuid, Path, description = "Conversation id")
    ),
    request_body = SendMessageRequest,
    responses(
        (status = 201, description = "Message sent successfully", body = Message),
        (status = 400, description = "Invalid input"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Not a participant"),
        (status = 503, description = "Message could not be stored; retry")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn send_message(
    State(state): State<AppState>,
    AuthUser(session): AuthUser,
    Path(conversation_id): Path<Uuid>,
    Json(payload): Json<SendMessageRequest>,
) -> Result<impl IntoResponse> {
    payload.validate()?;

    let message = state
        .message_repository
        .send_message(
            Some(&session),
            conversation_id,
            &payload.content,
            payload.client_token.as_deref(),
        )
        .await?;

    // Broadcast message to SSE subscribers
    match state
        .conversation_repository
        .participant_ids(conversation_id)
        .await
    {
        Ok(recipients) => {
            let _ = state.message_tx.send(MessageEvent {
                recipients,
                message: message.clone(),
            });
        }
        Err(e) => tracing::warn!("Skipping realtime delivery of {}: {}", message.id, e),
    }

    Ok((StatusCode::CREATED, Json(message)))
}

/// Mark messages as read
#[utoipa::path(
    post,
    path = "/api/messages/read",
    tag = "messages",
    request_body = MarkReadRequest,
    responses(
        (status = 200, description = "Read flags updated", body = MarkReadResponse),
        (status = 401, description = "Unauthorized"),
        (status = 503, description = "Update failed")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn mark_messages_read(
    State(state): State<AppState>,
    MaybeSession(session): MaybeSession,
    Json(payload): Json<MarkReadRequest>,
) -> Result<impl IntoResponse> {
    let updated = state
        .message_repository
        .mark_messages_as_read(session.as_ref(), &payload.message_ids)
        .await?;

    Ok((StatusCode::OK, Json(MarkReadResponse { updated })))
}

/// Number of unread messages from others
#[utoipa::path(
    get,
    path = "/api/messages/unread-count",
    tag = "messages",
    responses(
        (status = 200, description = "Unread count; 0 when it cannot be determined", body = UnreadCountResponse)
    )
)]
pub async fn unread_count(
    State(state): State<AppState>,
    MaybeSession(session): MaybeSession,
) -> impl IntoResponse {
    let count = state
        .message_repository
        .get_unread_message_count(session.as_ref())
        .await;

    Json(UnreadCountResponse { count })
}

/// Real-time message stream (SSE)
#[utoipa::path(
    get,
    path = "/api/messages/stream",
    tag = "messages",
    responses(
        (status = 200, description = "Message stream established"),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn message_stream(
    State(state): State<AppState>,
    AuthUser(session): AuthUser,
) -> Sse<impl Stream<Item = std::result::Result<Event, Infallible>>> {
    let stream = messages_for(session.user_id, state.message_tx.subscribe()).filter_map(|message| {
        let json = serde_json::to_string(&message).ok()?;
        Some(Ok::<_, Infallible>(Event::default().event("message").data(json)))
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}

/// Messages from the broadcast channel that `user_id` is a recipient of.
pub(crate) fn messages_for(
    user_id: Uuid,
    rx: broadcast::Receiver<MessageEvent>,
) -> impl Stream<Item = Message> {
    BroadcastStream::new(rx).filter_map(move |result| match result {
        Ok(event) if event.recipients.contains(&user_id) => Some(event.message),
        Ok(_) => None,
        Err(e) => {
            tracing::warn!("Message stream for {} fell behind: {}", user_id, e);
            None
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn event(recipients: Vec<Uuid>, content: &str) -> MessageEvent {
        MessageEvent {
            recipients,
            message: Message {
                id: Uuid::new_v4(),
                conversation_id: Uuid::new_v4(),
                sender_id: Uuid::new_v4(),
                content: content.to_string(),
                created_at: Utc::now(),
                read: false,
            },
        }
    }

    #[tokio::test]
    async fn test_stream_only_carries_events_for_the_subscriber() {
        let (tx, _) = broadcast::channel(16);
        let (ana, bruno, eve) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let ana_stream = messages_for(ana, tx.subscribe());
        let eve_stream = messages_for(eve, tx.subscribe());

        tx.send(event(vec![ana, bruno], "for ana")).unwrap();
        tx.send(event(vec![bruno], "not for ana")).unwrap();
        drop(tx);

        let ana_got: Vec<Message> = ana_stream.collect().await;
        let eve_got: Vec<Message> = eve_stream.collect().await;

        assert_eq!(ana_got.len(), 1);
        assert_eq!(ana_got[0].content, "for ana");
        assert!(eve_got.is_empty());
    }
}
