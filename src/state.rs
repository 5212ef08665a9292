use anyhow::Context;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::{
    backend::ChatBackend,
    conversation::{ConversationDeletion, ConversationRepository},
    functions::Translator,
    message::{MessageEvent, MessageRepository},
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub backend: Arc<dyn ChatBackend>,
    pub message_tx: broadcast::Sender<MessageEvent>,
    pub conversation_repository: ConversationRepository,
    pub conversation_deletion: ConversationDeletion,
    pub message_repository: MessageRepository,
    pub translator: Translator,
}

impl AppState {
    pub fn new(config: Arc<Config>, backend: Arc<dyn ChatBackend>) -> Self {
        let (message_tx, _) = broadcast::channel(100);
        let translator = Translator::new(
            config.translate_api_url.clone(),
            config.translate_api_key.clone(),
        );

        Self {
            conversation_repository: ConversationRepository::new(backend.clone()),
            conversation_deletion: ConversationDeletion::new(backend.clone()),
            message_repository: MessageRepository::new(backend.clone()),
            translator,
            message_tx,
            backend,
            config,
        }
    }
}

#[derive(Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub host: String,
    pub port: u16,
    pub translate_api_url: String,
    pub translate_api_key: Option<String>,
    /// Values handed out by the `get_secrets` function, keyed by name.
    pub exposed_secrets: HashMap<String, String>,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let exposed_secrets = std::env::var("EXPOSED_SECRETS")
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(|name| (name.to_string(), std::env::var(name).unwrap_or_default()))
            .collect();

        Ok(Self {
            database_url: std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            jwt_secret: std::env::var("JWT_SECRET").context("JWT_SECRET must be set")?,
            host: std::env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .context("PORT must be a number")?,
            translate_api_url: std::env::var("TRANSLATE_API_URL").unwrap_or_else(|_| {
                "https://translation.googleapis.com/language/translate/v2".to_string()
            }),
            translate_api_key: std::env::var("TRANSLATE_API_KEY").ok(),
            exposed_secrets,
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
impl Config {
    pub fn for_tests() -> Self {
        Self {
            database_url: "postgres://localhost/test".to_string(),
            jwt_secret: "test-secret".to_string(),
            host: "127.0.0.1".to_string(),
            port: 0,
            // Nothing listens on the discard port, so upstream calls fail fast.
            translate_api_url: "http://127.0.0.1:9/translate".to_string(),
            translate_api_key: None,
            exposed_secrets: HashMap::from([
                ("MAPBOX_TOKEN".to_string(), "pk.test".to_string()),
                ("UNSET_KEY".to_string(), String::new()),
            ]),
        }
    }
}
