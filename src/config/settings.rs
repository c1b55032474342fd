//! Application settings and configuration structures.

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

/// Root configuration structure containing all application settings.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Server configuration (host, port)
    pub server: ServerSettings,

    /// Persistence backend configuration
    pub database: DatabaseSettings,

    /// Redis configuration
    pub redis: RedisSettings,

    /// JWT authentication settings
    pub jwt: JwtSettings,

    /// Snowflake ID generator settings
    pub snowflake: SnowflakeSettings,

    /// CORS configuration
    pub cors: CorsSettings,

    /// WebSocket configuration
    pub websocket: WebSocketSettings,

    /// Background job queue configuration
    pub jobs: JobSettings,

    /// Attachment upload configuration
    pub uploads: UploadSettings,

    /// List endpoint page sizes
    pub pagination: PaginationSettings,

    /// Log output configuration
    pub log: LogSettings,

    /// Current environment (development, staging, production)
    pub environment: String,
}

/// Server binding configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    /// Host address to bind to (e.g., "0.0.0.0")
    pub host: String,

    /// Port number to listen on
    pub port: u16,

    /// Emit Strict-Transport-Security on every response
    pub hsts: bool,
}

/// Which repository implementation backs the API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseBackend {
    Postgres,
    Memory,
}

/// Persistence configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    pub backend: DatabaseBackend,

    /// Database connection URL (required for the postgres backend)
    #[serde(default)]
    pub url: Option<String>,

    /// Maximum number of connections in the pool
    pub max_connections: u32,

    /// Minimum number of connections to maintain
    pub min_connections: u32,

    /// Connection acquire timeout in seconds
    pub acquire_timeout: u64,

    /// Apply pending migrations on startup
    pub run_migrations: bool,
}

/// Redis configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RedisSettings {
    /// Redis connection URL
    #[serde(default)]
    pub url: Option<String>,

    /// Prefix applied to every queue key
    pub key_prefix: String,
}

/// JWT authentication configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct JwtSettings {
    /// Secret key for signing tokens
    pub secret: String,

    /// Access token expiry in minutes
    pub access_token_expiry_minutes: i64,

    /// Refresh token expiry in days
    pub refresh_token_expiry_days: i64,
}

/// Snowflake ID generator configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SnowflakeSettings {
    /// Machine/worker ID (0-1023)
    pub machine_id: u16,

    /// Custom epoch timestamp in milliseconds
    pub epoch: u64,
}

/// CORS configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct CorsSettings {
    /// Allowed origins; `*` allows any
    pub allowed_origins: Vec<String>,
}

/// WebSocket configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct WebSocketSettings {
    /// Maximum message size in bytes
    pub max_message_size: usize,

    /// Maximum frame size in bytes
    pub max_frame_size: usize,

    /// Heartbeat interval in milliseconds
    pub heartbeat_interval_ms: u64,

    /// Extra silence tolerated past the heartbeat interval
    pub heartbeat_grace_ms: u64,

    /// Connection timeout for identify in seconds
    pub identify_timeout_secs: u64,
}

/// Which queue implementation carries background jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobBackend {
    Redis,
    Memory,
}

/// Background job configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct JobSettings {
    pub backend: JobBackend,

    /// Start worker and scheduler tasks with the server
    pub enabled: bool,

    /// Number of concurrent worker loops
    pub concurrency: usize,

    /// Attempts before a job is dead-lettered
    pub max_attempts: u32,

    pub backoff_base_ms: u64,
    pub backoff_max_ms: u64,

    /// Idle sleep between empty reserves and delayed-job promotion
    pub poll_interval_ms: u64,

    pub cleanup_interval_secs: u64,
    pub reminder_interval_secs: u64,

    /// Soft-deleted records older than this are purged
    pub soft_delete_retention_days: i64,

    /// Read notifications older than this are purged
    pub notification_retention_days: i64,

    /// Tasks due within this window get a reminder
    pub reminder_window_hours: i64,
}

/// Attachment upload configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct UploadSettings {
    /// Directory for stored files
    pub storage_dir: String,

    /// Maximum file size in bytes
    pub max_file_size: usize,

    /// Accepted content types; `type/*` wildcards allowed
    pub allowed_content_types: Vec<String>,
}

/// Pagination limits.
#[derive(Debug, Clone, Deserialize)]
pub struct PaginationSettings {
    pub default_limit: u32,
    pub max_limit: u32,
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogSettings {
    pub format: LogFormat,
}

/// Minimum required length for JWT secret (256 bits = 32 bytes)
pub const MIN_JWT_SECRET_LENGTH: usize = 32;

impl Settings {
    /// Load settings from environment variables and configuration files.
    ///
    /// The loading order is:
    /// 1. built-in defaults
    /// 2. config/default.toml (base configuration)
    /// 3. config/{RUN_ENV}.toml (environment-specific overrides)
    /// 4. `APP__SECTION__KEY` environment variables
    /// 5. plain variables such as `DATABASE_URL` (highest priority)
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if configuration cannot be loaded or parsed,
    /// or if it fails [`Settings::validate`].
    pub fn load() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let environment = std::env::var("RUN_ENV").unwrap_or_else(|_| "development".into());

        let settings: Self = Self::builder(&environment)?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", environment)).required(false))
            // APP__SERVER__PORT=3000 -> server.port = 3000
            .add_source(
                Environment::default()
                    .prefix("APP")
                    .prefix_separator("__")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("cors.allowed_origins")
                    .with_list_parse_key("uploads.allowed_content_types")
                    .try_parsing(true),
            )
            .set_override_option("server.host", std::env::var("SERVER_HOST").ok())?
            .set_override_option("server.port", std::env::var("SERVER_PORT").ok())?
            .set_override_option("database.url", std::env::var("DATABASE_URL").ok())?
            .set_override_option("redis.url", std::env::var("REDIS_URL").ok())?
            .set_override_option("jwt.secret", std::env::var("JWT_SECRET").ok())?
            .set_override_option(
                "snowflake.machine_id",
                std::env::var("SNOWFLAKE_MACHINE_ID").ok(),
            )?
            .build()?
            .try_deserialize()?;

        settings.validate()?;
        Ok(settings)
    }

    /// Built-in defaults; every key has a value so a bare environment only needs a JWT secret.
    fn builder(
        environment: &str,
    ) -> Result<config::ConfigBuilder<config::builder::DefaultState>, ConfigError> {
        Config::builder()
            .set_default("environment", environment)?
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 3000)?
            .set_default("server.hsts", false)?
            .set_default("database.backend", "postgres")?
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 2)?
            .set_default("database.acquire_timeout", 30)?
            .set_default("database.run_migrations", true)?
            .set_default("redis.key_prefix", "tasks")?
            .set_default("jwt.secret", "")?
            .set_default("jwt.access_token_expiry_minutes", 15)?
            .set_default("jwt.refresh_token_expiry_days", 7)?
            .set_default("snowflake.machine_id", 1)?
            .set_default("snowflake.epoch", crate::shared::snowflake::DEFAULT_EPOCH)?
            .set_default("cors.allowed_origins", vec!["http://localhost:3000"])?
            .set_default("websocket.max_message_size", 65536_i64)?
            .set_default("websocket.max_frame_size", 16384_i64)?
            .set_default("websocket.heartbeat_interval_ms", 45000_i64)?
            .set_default("websocket.heartbeat_grace_ms", 15000_i64)?
            .set_default("websocket.identify_timeout_secs", 30_i64)?
            .set_default("jobs.backend", "redis")?
            .set_default("jobs.enabled", true)?
            .set_default("jobs.concurrency", 4)?
            .set_default("jobs.max_attempts", 5)?
            .set_default("jobs.backoff_base_ms", 1000_i64)?
            .set_default("jobs.backoff_max_ms", 300_000_i64)?
            .set_default("jobs.poll_interval_ms", 500_i64)?
            .set_default("jobs.cleanup_interval_secs", 3600_i64)?
            .set_default("jobs.reminder_interval_secs", 300_i64)?
            .set_default("jobs.soft_delete_retention_days", 30)?
            .set_default("jobs.notification_retention_days", 90)?
            .set_default("jobs.reminder_window_hours", 24)?
            .set_default("uploads.storage_dir", "./uploads")?
            .set_default("uploads.max_file_size", 10 * 1024 * 1024_i64)?
            .set_default(
                "uploads.allowed_content_types",
                vec![
                    "image/*",
                    "text/plain",
                    "text/csv",
                    "application/pdf",
                    "application/zip",
                    "application/json",
                ],
            )?
            .set_default("pagination.default_limit", 20)?
            .set_default("pagination.max_limit", 100)?
            .set_default("log.format", "pretty")
    }

    /// Cross-field checks the deserializer cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.jwt.secret.len() < MIN_JWT_SECRET_LENGTH {
            return Err(ConfigError::Message(format!(
                "JWT secret must be at least {} characters for security. Current length: {}",
                MIN_JWT_SECRET_LENGTH,
                self.jwt.secret.len()
            )));
        }
        if self.database.backend == DatabaseBackend::Postgres && self.database.url.is_none() {
            return Err(ConfigError::Message(
                "database.url (or DATABASE_URL) is required for the postgres backend".into(),
            ));
        }
        if self.jobs.backend == JobBackend::Redis && self.redis.url.is_none() {
            return Err(ConfigError::Message(
                "redis.url (or REDIS_URL) is required for the redis job backend".into(),
            ));
        }
        if self.pagination.default_limit == 0
            || self.pagination.default_limit > self.pagination.max_limit
        {
            return Err(ConfigError::Message(
                "pagination.default_limit must be between 1 and pagination.max_limit".into(),
            ));
        }
        Ok(())
    }

    /// Settings for tests and local tooling: memory backends, jobs disabled.
    pub fn for_tests(jwt_secret: &str) -> Result<Self, ConfigError> {
        let settings: Self = Self::builder("test")?
            .set_override("database.backend", "memory")?
            .set_override("jobs.backend", "memory")?
            .set_override("jobs.enabled", false)?
            .set_override("jwt.secret", jwt_secret)?
            .build()?
            .try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }
}

impl ServerSettings {
    /// Get the socket address for binding.
    pub fn socket_addr(&self) -> Result<std::net::SocketAddr, ConfigError> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| ConfigError::Message(format!("Invalid server address: {}", e)))
    }
}

impl UploadSettings {
    /// Whether `content_type` matches the allow-list (exact or `type/*`).
    pub fn is_allowed(&self, content_type: &str) -> bool {
        let content_type = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        self.allowed_content_types.iter().any(|allowed| {
            let allowed = allowed.to_ascii_lowercase();
            match allowed.strip_suffix("/*") {
                Some(prefix) => content_type
                    .split_once('/')
                    .map(|(kind, _)| kind == prefix)
                    .unwrap_or(false),
                None => allowed == content_type,
            }
        })
    }
}
