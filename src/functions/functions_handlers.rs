use std::collections::BTreeMap;

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use validator::Validate;

use crate::{
    error::{AppError, Result},
    functions::functions_dto::{
        GetSecretsRequest, RegisterPushTokenRequest, SuccessResponse, TranslateRequest,
        TranslateResponse,
    },
    middleware::AuthUser,
    state::AppState,
};

/// Translate a piece of text
#[utoipa::path(
    post,
    path = "/functions/translate",
    tag = "functions",
    request_body = TranslateRequest,
    responses(
        (status = 200, description = "Translated text", body = TranslateResponse),
        (status = 400, description = "Missing text or targetLang"),
        (status = 500, description = "Translation service failed")
    )
)]
pub async fn translate(
    State(state): State<AppState>,
    Json(payload): Json<TranslateRequest>,
) -> Result<impl IntoResponse> {
    let (Some(text), Some(target_lang)) = (
        payload.text.filter(|t| !t.is_empty()),
        payload.target_lang.filter(|t| !t.is_empty()),
    ) else {
        return Err(AppError::BadRequest(
            "Missing required fields: text and targetLang".to_string(),
        ));
    };

    let translation = state
        .translator
        .translate(&text, &target_lang, payload.source_lang.as_deref())
        .await?;

    Ok((StatusCode::OK, Json(translation)))
}

/// Register a device push token for the caller
#[utoipa::path(
    post,
    path = "/functions/register-push-token",
    tag = "functions",
    request_body = RegisterPushTokenRequest,
    responses(
        (status = 200, description = "Token stored", body = SuccessResponse),
        (status = 400, description = "Invalid input"),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn register_push_token(
    State(state): State<AppState>,
    AuthUser(session): AuthUser,
    Json(payload): Json<RegisterPushTokenRequest>,
) -> Result<impl IntoResponse> {
    payload.validate()?;

    state
        .backend
        .upsert_push_token(session.user_id, &payload.token, &payload.platform)
        .await?;

    tracing::info!(
        "Registered {} push token for {}",
        payload.platform,
        session.user_id
    );
    Ok((StatusCode::OK, Json(SuccessResponse { success: true })))
}

/// Look up configured client secrets; unknown keys map to an empty string
#[utoipa::path(
    post,
    path = "/functions/get_secrets",
    tag = "functions",
    request_body = GetSecretsRequest,
    responses(
        (status = 200, description = "Key to value map")
    )
)]
pub async fn get_secrets(
    State(state): State<AppState>,
    Json(payload): Json<GetSecretsRequest>,
) -> impl IntoResponse {
    let secrets: BTreeMap<String, String> = payload
        .keys
        .into_iter()
        .map(|key| {
            let value = state
                .config
                .exposed_secrets
                .get(&key)
                .cloned()
                .unwrap_or_default();
            (key, value)
        })
        .collect();

    Json(secrets)
}
