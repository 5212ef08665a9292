use crate::{
    conversation::{
        conversation_dto::StartConversationRequest,
        conversation_handlers,
        conversation_models::{
            Conversation, ConversationPreview, LastMessageSummary, OtherUserSummary,
        },
    },
    functions::{functions_dto::*, functions_handlers},
    message::{message_dto::*, message_handlers, message_models::Message},
    middleware::session_middleware,
    state::AppState,
};
use axum::{
    middleware,
    routing::{delete, get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(
        conversation_handlers::get_conversations,
        conversation_handlers::start_conversation,
        conversation_handlers::delete_conversation,
        message_handlers::get_messages,
        message_handlers::send_message,
        message_handlers::mark_messages_read,
        message_handlers::unread_count,
        message_handlers::message_stream,
        functions_handlers::translate,
        functions_handlers::register_push_token,
        functions_handlers::get_secrets,
    ),
    components(
        schemas(
            Conversation,
            ConversationPreview,
            OtherUserSummary,
            LastMessageSummary,
            StartConversationRequest,
            Message,
            SendMessageRequest,
            MarkReadRequest,
            MarkReadResponse,
            UnreadCountResponse,
            TranslateRequest,
            TranslateResponse,
            RegisterPushTokenRequest,
            SuccessResponse,
            GetSecretsRequest,
        )
    ),
    tags(
        (name = "conversations", description = "Conversation list and lifecycle"),
        (name = "messages", description = "Messages, read state and realtime stream"),
        (name = "functions", description = "Proxy functions used by the mobile client")
    ),
    modifiers(&SecurityAddon)
)]
struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                utoipa::openapi::security::SecurityScheme::Http(
                    utoipa::openapi::security::Http::new(
                        utoipa::openapi::security::HttpAuthScheme::Bearer,
                    ),
                ),
            )
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let conversation_routes = Router::new()
        .route(
            "/",
            get(conversation_handlers::get_conversations)
                .post(conversation_handlers::start_conversation),
        )
        .route("/:id", delete(conversation_handlers::delete_conversation))
        .route(
            "/:id/messages",
            get(message_handlers::get_messages).post(message_handlers::send_message),
        );

    let message_routes = Router::new()
        .route("/read", post(message_handlers::mark_messages_read))
        .route("/unread-count", get(message_handlers::unread_count))
        .route("/stream", get(message_handlers::message_stream));

    let function_routes = Router::new()
        .route("/translate", post(functions_handlers::translate))
        .route(
            "/register-push-token",
            post(functions_handlers::register_push_token),
        )
        .route("/get_secrets", post(functions_handlers::get_secrets));

    let api_routes = Router::new()
        .nest("/conversations", conversation_routes)
        .nest("/messages", message_routes);

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .nest("/api", api_routes)
        .nest("/functions", function_routes)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            session_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
