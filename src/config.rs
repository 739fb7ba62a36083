use std::{env, net::SocketAddr};

use url::Url;

use crate::error::AppError;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub listen_addr: SocketAddr,
    pub llm_api_key: String,
    pub llm_model: String,
    pub llm_base_url: String,
    pub llm_timeout_ms: u64,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let database_url =
            env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://wayfarer.db".to_string());
        let listen_addr: SocketAddr = env::var("APP_LISTEN_ADDR")
            .unwrap_or_else(|_| "127.0.0.1:3000".to_string())
            .parse()
            .map_err(|err| AppError::Config(format!("invalid APP_LISTEN_ADDR: {err}")))?;

        let llm_api_key = env::var("GROQ_API_KEY").unwrap_or_default();
        let llm_model = env::var("LLM_MODEL").unwrap_or_else(|_| "llama3-8b-8192".to_string());

        let llm_base_url = env::var("LLM_BASE_URL")
            .unwrap_or_else(|_| "https://api.groq.com/openai/v1".to_string());
        Url::parse(&llm_base_url)
            .map_err(|err| AppError::Config(format!("invalid LLM_BASE_URL: {err}")))?;

        let llm_timeout_ms = env::var("LLM_TIMEOUT_MS")
            .ok()
            .map(|raw| {
                raw.parse::<u64>()
                    .map_err(|err| AppError::Config(format!("invalid LLM_TIMEOUT_MS: {err}")))
            })
            .transpose()?
            .unwrap_or(30_000);

        Ok(Self {
            database_url,
            listen_addr,
            llm_api_key,
            llm_model,
            llm_base_url,
            llm_timeout_ms,
        })
    }
}
