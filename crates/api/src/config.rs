use serde::Deserialize;
use std::net::SocketAddr;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    #[serde(default)]
    pub security: SecurityConfig,
    /// JWT authentication configuration
    pub jwt: JwtAuthConfig,
    #[serde(default)]
    pub admin: AdminConfig,
    /// Notification email configuration
    #[serde(default)]
    pub email: EmailConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub clan: ClanConfig,
    #[serde(default)]
    pub expiry: ExpiryConfig,
    #[serde(default)]
    pub sync: SyncSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Upper bound for multipart submissions (three screenshots plus fields).
    #[serde(default = "default_max_body_size")]
    pub max_body_size: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,
}

impl From<&DatabaseConfig> for persistence::db::DatabaseConfig {
    fn from(config: &DatabaseConfig) -> Self {
        Self {
            url: config.url.clone(),
            max_connections: config.max_connections,
            min_connections: config.min_connections,
            connect_timeout_secs: config.connect_timeout_secs,
            idle_timeout_secs: config.idle_timeout_secs,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SecurityConfig {
    #[serde(default)]
    pub cors_origins: Vec<String>,

    /// Application submissions allowed per client per minute. 0 disables the limit.
    #[serde(default = "default_submissions_per_minute")]
    pub submissions_per_minute: u32,

    #[serde(default)]
    pub hsts_enabled: bool,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            cors_origins: Vec::new(),
            submissions_per_minute: default_submissions_per_minute(),
            hsts_enabled: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct JwtAuthConfig {
    /// RSA private key in PEM format for signing tokens
    #[serde(default)]
    pub private_key: String,

    /// RSA public key in PEM format for verifying tokens
    #[serde(default)]
    pub public_key: String,

    /// Shared HS256 secret, used only when no key pair is configured.
    #[serde(default)]
    pub secret: Option<String>,

    /// Access token expiration in seconds (default: 28800 = 8 hours)
    #[serde(default = "default_access_token_expiry")]
    pub access_token_expiry_secs: i64,

    /// Leeway in seconds for clock skew tolerance (default: 30)
    #[serde(default = "default_jwt_leeway")]
    pub leeway_secs: u64,
}

impl JwtAuthConfig {
    pub fn build(&self) -> Result<shared::jwt::JwtConfig, shared::jwt::JwtError> {
        if self.private_key.is_empty() && self.public_key.is_empty() {
            if let Some(secret) = self.secret.as_deref() {
                return shared::jwt::JwtConfig::from_secret(secret, self.access_token_expiry_secs);
            }
        }
        shared::jwt::JwtConfig::from_rsa_pem(
            &self.private_key,
            &self.public_key,
            self.access_token_expiry_secs,
            self.leeway_secs,
        )
    }
}

/// Admin account created at startup when absent.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AdminConfig {
    #[serde(default)]
    pub bootstrap_email: Option<String>,

    #[serde(default)]
    pub bootstrap_password: Option<String>,
}

/// Applicant notification configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct EmailConfig {
    /// Whether notifications are sent at all
    #[serde(default)]
    pub enabled: bool,

    /// Provider: console, http (edge function) or sendgrid
    #[serde(default = "default_email_provider")]
    pub provider: String,

    /// Edge-function URL (for http provider)
    #[serde(default)]
    pub endpoint_url: String,

    /// Bearer key sent to the edge function
    #[serde(default)]
    pub endpoint_key: String,

    /// SendGrid API key (for sendgrid provider)
    #[serde(default)]
    pub sendgrid_api_key: String,

    #[serde(default = "default_sender_email")]
    pub sender_email: String,

    #[serde(default = "default_sender_name")]
    pub sender_name: String,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            provider: default_email_provider(),
            endpoint_url: String::new(),
            endpoint_key: String::new(),
            sendgrid_api_key: String::new(),
            sender_email: default_sender_email(),
            sender_name: default_sender_name(),
        }
    }
}

/// Screenshot object storage.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Provider: local or http
    #[serde(default = "default_storage_provider")]
    pub provider: String,

    #[serde(default = "default_bucket")]
    pub bucket: String,

    /// Directory holding buckets (for local provider)
    #[serde(default = "default_local_root")]
    pub local_root: String,

    /// Base URL the local files are served from
    #[serde(default = "default_public_base_url")]
    pub public_base_url: String,

    /// Storage REST endpoint, e.g. `https://project.supabase.co/storage/v1` (for http provider)
    #[serde(default)]
    pub endpoint: String,

    #[serde(default)]
    pub service_key: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            provider: default_storage_provider(),
            bucket: default_bucket(),
            local_root: default_local_root(),
            public_base_url: default_public_base_url(),
            endpoint: String::new(),
            service_key: String::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClanConfig {
    #[serde(default = "default_clan_name")]
    pub name: String,

    /// Community invite sent with approval emails.
    #[serde(default = "default_invite_link")]
    pub invite_link: String,

    #[serde(default = "default_clan_id")]
    pub clan_id: String,

    #[serde(default)]
    pub require_screenshots: bool,
}

impl Default for ClanConfig {
    fn default() -> Self {
        Self {
            name: default_clan_name(),
            invite_link: default_invite_link(),
            clan_id: default_clan_id(),
            require_screenshots: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExpiryConfig {
    /// Hours after review before screenshots are purged.
    #[serde(default = "default_window_hours")]
    pub window_hours: i64,

    /// Delay before a failed cleanup is attempted again.
    #[serde(default = "default_retry_delay")]
    pub retry_delay_secs: u64,

    #[serde(default = "default_job_interval")]
    pub job_interval_secs: u64,
}

impl Default for ExpiryConfig {
    fn default() -> Self {
        Self {
            window_hours: default_window_hours(),
            retry_delay_secs: default_retry_delay(),
            job_interval_secs: default_job_interval(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SyncSettings {
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    #[serde(default = "default_subscribe_timeout")]
    pub subscribe_timeout_secs: u64,

    #[serde(default = "default_notice_capacity")]
    pub notice_capacity: usize,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval(),
            subscribe_timeout_secs: default_subscribe_timeout(),
            notice_capacity: default_notice_capacity(),
        }
    }
}

impl From<&SyncSettings> for domain::services::SyncConfig {
    fn from(settings: &SyncSettings) -> Self {
        Self {
            poll_interval: std::time::Duration::from_secs(settings.poll_interval_secs),
            subscribe_timeout: std::time::Duration::from_secs(settings.subscribe_timeout_secs),
            notice_capacity: settings.notice_capacity,
        }
    }
}

// Default value functions
fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8080
}
fn default_request_timeout() -> u64 {
    30
}
fn default_max_body_size() -> usize {
    16 * 1_048_576
}
fn default_max_connections() -> u32 {
    10
}
fn default_min_connections() -> u32 {
    2
}
fn default_connect_timeout() -> u64 {
    10
}
fn default_idle_timeout() -> u64 {
    600
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_format() -> String {
    "json".to_string()
}
fn default_submissions_per_minute() -> u32 {
    5
}
fn default_access_token_expiry() -> i64 {
    28_800
}
fn default_jwt_leeway() -> u64 {
    30
}
fn default_email_provider() -> String {
    "console".to_string()
}
fn default_sender_email() -> String {
    "noreply@clan-recruit.app".to_string()
}
fn default_sender_name() -> String {
    "Clan Recruitment".to_string()
}
fn default_storage_provider() -> String {
    "local".to_string()
}
fn default_bucket() -> String {
    "application-screenshots".to_string()
}
fn default_local_root() -> String {
    "./data/storage".to_string()
}
fn default_public_base_url() -> String {
    "http://localhost:8080/files".to_string()
}
fn default_clan_name() -> String {
    "Clan".to_string()
}
fn default_invite_link() -> String {
    "https://discord.com/invite/jBPFT3BGF".to_string()
}
fn default_clan_id() -> String {
    "6748765112867225602".to_string()
}
fn default_window_hours() -> i64 {
    domain::services::DEFAULT_WINDOW_HOURS
}
fn default_retry_delay() -> u64 {
    300
}
fn default_job_interval() -> u64 {
    60
}
fn default_poll_interval() -> u64 {
    2
}
fn default_subscribe_timeout() -> u64 {
    10
}
fn default_notice_capacity() -> usize {
    64
}

/// Configuration validation error
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("Missing required configuration: {0}")]
    MissingRequired(String),

    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

impl Config {
    /// Load configuration from files and environment variables.
    ///
    /// Loading order (later sources override earlier):
    /// 1. config/default.toml - base configuration with defaults
    /// 2. config/local.toml - local overrides (optional, not in git)
    /// 3. Environment variables with CR__ prefix
    pub fn load() -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(
                config::Environment::with_prefix("CR")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("security.cors_origins")
                    .try_parsing(true),
            )
            .build()?;

        let cfg: Self = config.try_deserialize()?;
        cfg.validate()
            .map_err(|e| config::ConfigError::Message(e.to_string()))?;
        Ok(cfg)
    }

    /// Load configuration for testing with custom overrides.
    ///
    /// Built entirely from embedded defaults and overrides, without config files.
    pub fn load_for_test(overrides: &[(&str, &str)]) -> Result<Self, config::ConfigError> {
        let defaults = r#"
            [server]
            host = "0.0.0.0"
            port = 8080
            request_timeout_secs = 30
            max_body_size = 16777216

            [database]
            url = ""
            max_connections = 5
            min_connections = 1
            connect_timeout_secs = 10
            idle_timeout_secs = 600

            [logging]
            level = "info"
            format = "json"

            [security]
            cors_origins = []
            submissions_per_minute = 5

            [jwt]
            private_key = ""
            public_key = ""
            access_token_expiry_secs = 3600
            leeway_secs = 30

            [email]
            enabled = false
            provider = "console"
            sender_email = "test@example.com"
            sender_name = "Test"

            [storage]
            provider = "local"
            bucket = "application-screenshots"

            [clan]
            name = "Test Clan"
            require_screenshots = false

            [expiry]
            window_hours = 5
            retry_delay_secs = 300
            job_interval_secs = 60

            [sync]
            poll_interval_secs = 2
            notice_capacity = 64
        "#;

        let mut builder = config::Config::builder()
            .add_source(config::File::from_str(defaults, config::FileFormat::Toml));

        for (key, value) in overrides {
            builder = builder.set_override(*key, *value)?;
        }

        let cfg: Self = builder.build()?.try_deserialize()?;
        // Skip validation in tests to allow partial configs
        Ok(cfg)
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.database.url.is_empty() {
            return Err(ConfigValidationError::MissingRequired(
                "CR__DATABASE__URL environment variable must be set".to_string(),
            ));
        }

        if self.server.port == 0 {
            return Err(ConfigValidationError::InvalidValue(
                "Server port cannot be 0".to_string(),
            ));
        }

        if self.database.min_connections > self.database.max_connections {
            return Err(ConfigValidationError::InvalidValue(
                "min_connections cannot exceed max_connections".to_string(),
            ));
        }

        if self.expiry.window_hours <= 0 {
            return Err(ConfigValidationError::InvalidValue(
                "expiry.window_hours must be positive".to_string(),
            ));
        }

        if self.sync.poll_interval_secs == 0 {
            return Err(ConfigValidationError::InvalidValue(
                "sync.poll_interval_secs must be positive".to_string(),
            ));
        }

        match self.storage.provider.as_str() {
            "local" => {}
            "http" if self.storage.endpoint.is_empty() => {
                return Err(ConfigValidationError::MissingRequired(
                    "storage.endpoint is required for the http provider".to_string(),
                ))
            }
            "http" => {}
            other => {
                return Err(ConfigValidationError::InvalidValue(format!(
                    "Unknown storage provider: {}",
                    other
                )))
            }
        }

        Ok(())
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        format!("{}:{}", self.server.host, self.server.port).parse()
    }

    pub fn expiry_window(&self) -> chrono::Duration {
        chrono::Duration::hours(self.expiry.window_hours)
    }
}
