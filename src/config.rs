use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use std::path::Path;
use thiserror::Error;
use tracing::{error, info};
use validator::{Validate, ValidationError, ValidationErrors};

/// Default values for configuration
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const DEFAULT_PORT: u16 = 8080;
const CONFIG_DIR: &str = "config";
const DEFAULT_SESSION_BACKEND: &str = "in-memory";
const DEFAULT_SESSION_TTL_SECS: u64 = 86_400; // sessions left stale are reaped after a day
const DEFAULT_SESSION_NAMESPACE: &str = "wastetreasure:checkout";
const DEFAULT_COLLABORATOR_TIMEOUT_SECS: u64 = 10;
const DEFAULT_GATEWAY_LATENCY_FLOOR_MS: u64 = 2_000;

/// Checkout session store configuration
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct SessionStoreConfig {
    /// Backend to use: "in-memory" or "redis"
    #[serde(default = "default_session_backend")]
    pub backend: String,

    /// Redis connection URL (used when backend = "redis")
    #[serde(default = "default_redis_url")]
    pub redis_url: String,

    /// TTL for abandoned checkout sessions, in seconds
    #[serde(default = "default_session_ttl")]
    pub ttl_secs: u64,

    /// Key namespace for the redis backend
    #[serde(default = "default_session_namespace")]
    pub namespace: String,
}

impl Default for SessionStoreConfig {
    fn default() -> Self {
        Self {
            backend: default_session_backend(),
            redis_url: default_redis_url(),
            ttl_secs: default_session_ttl(),
            namespace: default_session_namespace(),
        }
    }
}

/// Base URLs and client settings for the external collaborators
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct CollaboratorConfig {
    /// Identity provider (resolves bearer tokens to buyers)
    #[validate(url)]
    pub identity_url: String,

    /// Saved-address backend
    #[validate(url)]
    pub address_url: String,

    /// Payment gateway (tokenized payment methods)
    #[validate(url)]
    pub gateway_url: String,

    /// Order submission backend
    #[validate(url)]
    pub order_url: String,

    /// Cart backend
    #[validate(url)]
    pub cart_url: String,

    /// Bounded timeout applied to every collaborator call, in seconds
    #[serde(default = "default_collaborator_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for CollaboratorConfig {
    fn default() -> Self {
        Self {
            identity_url: "http://localhost:9001".to_string(),
            address_url: "http://localhost:9002".to_string(),
            gateway_url: "http://localhost:9003".to_string(),
            order_url: "http://localhost:9004".to_string(),
            cart_url: "http://localhost:9005".to_string(),
            request_timeout_secs: default_collaborator_timeout(),
        }
    }
}

/// Checkout flow tuning
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct CheckoutConfig {
    /// Minimum visible duration for payment-method add/delete operations,
    /// in milliseconds. Perceived-responsiveness floor, not a correctness
    /// requirement; set to 0 in tests.
    #[serde(default = "default_gateway_latency_floor")]
    pub gateway_latency_floor_ms: u64,
}

impl Default for CheckoutConfig {
    fn default() -> Self {
        Self {
            gateway_latency_floor_ms: default_gateway_latency_floor(),
        }
    }
}

/// Application configuration structure with validation
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Server host address
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Application environment
    #[validate(custom = "validate_environment")]
    pub environment: String,

    /// Logging level
    #[serde(default = "default_log_level")]
    #[validate(custom = "validate_log_level")]
    pub log_level: String,

    /// Log in JSON format (structured logging)
    #[serde(default)]
    pub log_json: bool,

    /// Request timeout for inbound HTTP requests, in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// CORS: comma-separated list of allowed origins (production)
    #[serde(default)]
    pub cors_allowed_origins: Option<String>,

    /// Allow permissive CORS fallback
    #[serde(default)]
    pub cors_allow_any_origin: bool,

    /// Checkout session store configuration
    #[serde(default)]
    #[validate]
    pub session: SessionStoreConfig,

    /// External collaborator endpoints
    #[serde(default)]
    #[validate]
    pub collaborators: CollaboratorConfig,

    /// Checkout flow tuning
    #[serde(default)]
    #[validate]
    pub checkout: CheckoutConfig,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_request_timeout() -> u64 {
    30
}

fn default_session_backend() -> String {
    DEFAULT_SESSION_BACKEND.to_string()
}

fn default_redis_url() -> String {
    "redis://localhost:6379".to_string()
}

fn default_session_ttl() -> u64 {
    DEFAULT_SESSION_TTL_SECS
}

fn default_session_namespace() -> String {
    DEFAULT_SESSION_NAMESPACE.to_string()
}

fn default_collaborator_timeout() -> u64 {
    DEFAULT_COLLABORATOR_TIMEOUT_SECS
}

fn default_gateway_latency_floor() -> u64 {
    DEFAULT_GATEWAY_LATENCY_FLOOR_MS
}

fn validate_environment(environment: &str) -> Result<(), ValidationError> {
    match environment {
        "development" | "staging" | "production" | "test" => Ok(()),
        _ => {
            let mut err = ValidationError::new("environment");
            err.message = Some("environment must be development, staging, production or test".into());
            Err(err)
        }
    }
}

fn validate_log_level(level: &str) -> Result<(), ValidationError> {
    match level {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => {
            let mut err = ValidationError::new("log_level");
            err.message = Some("log_level must be trace, debug, info, warn or error".into());
            Err(err)
        }
    }
}

impl AppConfig {
    pub fn log_level(&self) -> &str {
        &self.log_level
    }

    pub fn is_development(&self) -> bool {
        self.environment == "development" || self.environment == "test"
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Constraints that span multiple fields and cannot be expressed as
    /// per-field validators.
    pub fn validate_additional_constraints(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if !self.is_development()
            && !self.cors_allow_any_origin
            && self
                .cors_allowed_origins
                .as_deref()
                .map(|s| s.trim().is_empty())
                .unwrap_or(true)
        {
            let mut err = ValidationError::new("cors_allowed_origins");
            err.message =
                Some("cors_allowed_origins is required outside development (or set cors_allow_any_origin)".into());
            errors.add("cors_allowed_origins", err);
        }

        match self.session.backend.as_str() {
            "in-memory" | "redis" => {}
            other => {
                let mut err = ValidationError::new("backend");
                err.message = Some(format!("unknown session backend '{}'", other).into());
                errors.add("session", err);
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[derive(Debug, Error)]
pub enum AppConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] ConfigError),
    #[error("configuration validation failed: {0}")]
    Validation(ValidationErrors),
}

/// Loads application configuration
///
/// Layers configuration sources in this order:
/// 1. Default config (config/default.toml)
/// 2. Environment-specific config (config/{env}.toml)
/// 3. Environment variables (APP__*)
pub fn load_config() -> Result<AppConfig, AppConfigError> {
    // Support both RUN_ENV and APP_ENV for selecting config profile
    let run_env = env::var("RUN_ENV")
        .or_else(|_| env::var("APP_ENV"))
        .unwrap_or_else(|_| DEFAULT_ENV.to_string());
    info!("Loading configuration for environment: {}", run_env);

    if !Path::new(CONFIG_DIR).exists() {
        info!(
            "Config directory '{}' not found; relying on built-in defaults and environment variables",
            CONFIG_DIR
        );
    }

    let config = Config::builder()
        .set_default("host", "0.0.0.0")?
        .set_default("port", DEFAULT_PORT as i64)?
        .set_default("environment", DEFAULT_ENV)?
        .set_default("log_level", DEFAULT_LOG_LEVEL)?
        .set_default("log_json", false)?
        .add_source(File::with_name(&format!("{}/default", CONFIG_DIR)).required(false))
        .add_source(File::with_name(&format!("{}/{}", CONFIG_DIR, run_env)).required(false))
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?;

    let app_config: AppConfig = config.try_deserialize()?;

    app_config.validate().map_err(|e| {
        error!("Configuration validation failed: {:?}", e);
        AppConfigError::Validation(e)
    })?;

    app_config.validate_additional_constraints().map_err(|e| {
        error!("Configuration validation failed: {:?}", e);
        AppConfigError::Validation(e)
    })?;

    info!("Configuration loaded successfully");
    Ok(app_config)
}

/// Initialise the tracing subscriber.
pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default_directive = format!("wastetreasure_api={},tower_http=info", level);
    let filter_directive = env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(default_directive);

    if json {
        let _ = fmt()
            .with_env_filter(EnvFilter::new(filter_directive))
            .json()
            .try_init();
    } else {
        let _ = fmt()
            .with_env_filter(EnvFilter::new(filter_directive))
            .try_init();
    }
}
