//! Environment-based configuration and shared application state.

use std::env;
use std::sync::Arc;

use sentflow_core::HandlerRegistry;

use crate::auth::AuthService;
use crate::cipher::CipherService;
use crate::store::{
    CredentialStore, MemoryCredentialStore, MemoryUserStore, MemoryWorkflowStore, UserStore,
    WorkflowStore,
};

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    /// HS256 signing secret for access tokens.
    pub jwt_secret: String,
    /// Access-token lifetime in minutes.
    pub token_expire_minutes: i64,
    /// Master key for the credential cipher.
    pub encryption_key: String,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Self {
            host: env::var("SENTFLOW_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("SENTFLOW_PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .unwrap_or(8080),
            jwt_secret: env::var("SENTFLOW_JWT_SECRET").unwrap_or_default(),
            token_expire_minutes: env::var("SENTFLOW_TOKEN_EXPIRE_MINUTES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(30),
            encryption_key: env::var("SENTFLOW_ENCRYPTION_KEY").unwrap_or_default(),
        }
    }

    /// Get the server bind address.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub http_client: reqwest::Client,
    pub registry: Arc<HandlerRegistry>,
    pub auth: Arc<AuthService>,
    pub cipher: Arc<CipherService>,
    pub users: Arc<dyn UserStore>,
    pub workflows: Arc<dyn WorkflowStore>,
    pub credentials: Arc<dyn CredentialStore>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        // No global client timeout: the engine enforces the per-request
        // budget itself, attempt by attempt.
        let http_client = reqwest::Client::builder()
            .build()
            .expect("Failed to create HTTP client");

        let auth = Arc::new(AuthService::new(
            &config.jwt_secret,
            config.token_expire_minutes,
        ));
        let cipher = Arc::new(CipherService::new(config.encryption_key.clone()));

        Self {
            config: Arc::new(config),
            http_client,
            registry: Arc::new(HandlerRegistry::new()),
            auth,
            cipher,
            users: Arc::new(MemoryUserStore::new()),
            workflows: Arc::new(MemoryWorkflowStore::new()),
            credentials: Arc::new(MemoryCredentialStore::new()),
        }
    }
}
