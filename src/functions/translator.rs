use serde::{Deserialize, Serialize};

use crate::{
    error::{AppError, Result},
    functions::functions_dto::TranslateResponse,
};

#[derive(Debug, Serialize)]
struct UpstreamRequest<'a> {
    q: &'a str,
    target: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    source: Option<&'a str>,
    format: &'static str,
}

#[derive(Debug, Deserialize)]
struct UpstreamResponse {
    data: UpstreamData,
}

#[derive(Debug, Deserialize)]
struct UpstreamData {
    translations: Vec<UpstreamTranslation>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpstreamTranslation {
    translated_text: String,
    detected_source_language: Option<String>,
}

/// Client for a Google-Translate-v2 compatible API.
#[derive(Clone)]
pub struct Translator {
    http: reqwest::Client,
    api_url: String,
    api_key: Option<String>,
}

impl Translator {
    pub fn new(api_url: String, api_key: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_url,
            api_key,
        }
    }

    pub async fn translate(
        &self,
        text: &str,
        target_lang: &str,
        source_lang: Option<&str>,
    ) -> Result<TranslateResponse> {
        let mut request = self.http.post(&self.api_url).json(&UpstreamRequest {
            q: text,
            target: target_lang,
            source: source_lang,
            format: "text",
        });
        if let Some(key) = &self.api_key {
            request = request.query(&[("key", key)]);
        }

        let response = request
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| AppError::Upstream(format!("Translation request failed: {}", e)))?;

        let body: UpstreamResponse = response
            .json()
            .await
            .map_err(|e| AppError::Upstream(format!("Invalid translation response: {}", e)))?;

        into_translation(body, source_lang)
    }
}

fn into_translation(body: UpstreamResponse, source_lang: Option<&str>) -> Result<TranslateResponse> {
    let first = body
        .data
        .translations
        .into_iter()
        .next()
        .ok_or_else(|| AppError::Upstream("Translation response was empty".to_string()))?;

    Ok(TranslateResponse {
        translated_text: first.translated_text,
        detected_language: first
            .detected_source_language
            .or_else(|| source_lang.map(str::to_string))
            .unwrap_or_else(|| "unknown".to_string()),
    })
}
