use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TranslateRequest {
    pub text: Option<String>,
    pub target_lang: Option<String>,
    pub source_lang: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TranslateResponse {
    pub translated_text: String,
    pub detected_language: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct RegisterPushTokenRequest {
    #[validate(length(min = 1, max = 512))]
    pub token: String,
    #[validate(length(min = 1, max = 32))]
    pub platform: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SuccessResponse {
    pub success: bool,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct GetSecretsRequest {
    pub keys: Vec<String>,
}
