use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Longest accepted session lifetime (one year)
pub const MAX_SESSION_MINUTES: u64 = 60 * 24 * 365;

/// Application configuration
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub jwt: JwtConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub cloudinary: CloudinaryConfig,
    #[serde(default)]
    pub upload: UploadConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// `development` or `production`
    #[serde(default = "default_environment")]
    pub environment: String,
    /// Allowed CORS origins; empty means any origin without credentials
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    #[serde(default = "default_jwt_secret")]
    pub secret: String,
    #[serde(default)]
    pub previous_secrets: Vec<String>,
    #[serde(default = "default_access_token_expire")]
    pub access_token_expire_minutes: u64,
    #[serde(default)]
    pub cookie_secure: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    #[serde(default = "default_bcrypt_cost")]
    pub bcrypt_cost: u32,
}

/// Which media host receives uploads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HostKind {
    Local,
    Cloudinary,
}

impl FromStr for HostKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "local" => Ok(HostKind::Local),
            "cloudinary" => Ok(HostKind::Cloudinary),
            other => Err(format!("unknown storage provider: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_provider")]
    pub provider: HostKind,
    #[serde(default = "default_local_path")]
    pub local_path: String,
    #[serde(default = "default_temp_dir")]
    pub temp_dir: String,
    /// Prefix for URLs of locally hosted media
    #[serde(default = "default_public_base_url")]
    pub public_base_url: String,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CloudinaryConfig {
    #[serde(default)]
    pub cloud_name: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub api_secret: String,
    #[serde(default = "default_folder")]
    pub folder: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UploadConfig {
    #[serde(default = "default_max_width")]
    pub max_width: u32,
    #[serde(default = "default_max_height")]
    pub max_height: u32,
    #[serde(default = "default_allowed_formats")]
    pub allowed_formats: Vec<String>,
    #[serde(default = "default_max_file_bytes")]
    pub max_file_bytes: u64,
    #[serde(default = "default_max_request_bytes")]
    pub max_request_bytes: usize,
    #[serde(default = "default_list_limit")]
    pub default_limit: i64,
    #[serde(default = "default_max_list_limit")]
    pub max_limit: i64,
}

// Default values
fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_environment() -> String {
    "development".to_string()
}

fn default_db_path() -> String {
    "data/media-gallery.db".to_string()
}

fn default_jwt_secret() -> String {
    "change-me-media-gallery-secret".to_string()
}

fn default_access_token_expire() -> u64 {
    60
}

fn default_bcrypt_cost() -> u32 {
    12
}

fn default_provider() -> HostKind {
    HostKind::Local
}

fn default_local_path() -> String {
    "data/media".to_string()
}

fn default_temp_dir() -> String {
    "data/uploads".to_string()
}

fn default_public_base_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_request_timeout() -> u64 {
    60
}

fn default_folder() -> String {
    "media-gallery".to_string()
}

fn default_max_width() -> u32 {
    1920
}

fn default_max_height() -> u32 {
    1080
}

fn default_allowed_formats() -> Vec<String> {
    vec!["jpg".to_string(), "jpeg".to_string(), "png".to_string()]
}

fn default_max_file_bytes() -> u64 {
    10 * 1024 * 1024
}

fn default_max_request_bytes() -> usize {
    50 * 1024 * 1024
}

fn default_list_limit() -> i64 {
    5
}

fn default_max_list_limit() -> i64 {
    100
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            environment: default_environment(),
            cors_origins: Vec::new(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self {
            secret: default_jwt_secret(),
            previous_secrets: Vec::new(),
            access_token_expire_minutes: default_access_token_expire(),
            cookie_secure: false,
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            bcrypt_cost: default_bcrypt_cost(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            local_path: default_local_path(),
            temp_dir: default_temp_dir(),
            public_base_url: default_public_base_url(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl Default for CloudinaryConfig {
    fn default() -> Self {
        Self {
            cloud_name: String::new(),
            api_key: String::new(),
            api_secret: String::new(),
            folder: default_folder(),
        }
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_width: default_max_width(),
            max_height: default_max_height(),
            allowed_formats: default_allowed_formats(),
            max_file_bytes: default_max_file_bytes(),
            max_request_bytes: default_max_request_bytes(),
            default_limit: default_list_limit(),
            max_limit: default_max_list_limit(),
        }
    }
}

impl Config {
    /// Load configuration from file and environment variables
    pub fn load() -> anyhow::Result<Self> {
        let mut config = Self::load_from_file()?;
        config.apply_env_overrides();
        config.validate()?;
        config.ensure_directories()?;
        config.ensure_jwt_secret()?;
        tracing::info!(
            "Storage provider: {:?}, environment: {}",
            config.storage.provider,
            config.server.environment
        );
        Ok(config)
    }

    pub fn is_production(&self) -> bool {
        self.server.environment.eq_ignore_ascii_case("production")
    }

    /// Session cookies are marked `Secure` in production or when forced
    pub fn cookie_secure(&self) -> bool {
        self.jwt.cookie_secure || self.is_production()
    }

    /// Session lifetime in seconds, shared by the token and its cookie
    pub fn session_ttl_secs(&self) -> i64 {
        let minutes = self.jwt.access_token_expire_minutes.min(MAX_SESSION_MINUTES);
        (minutes * 60) as i64
    }

    /// Reject values the token, cookie and listing code cannot work with
    pub fn validate(&self) -> anyhow::Result<()> {
        let minutes = self.jwt.access_token_expire_minutes;
        if minutes == 0 || minutes > MAX_SESSION_MINUTES {
            anyhow::bail!(
                "jwt.access_token_expire_minutes must be between 1 and {}, got {}",
                MAX_SESSION_MINUTES,
                minutes
            );
        }
        if self.upload.default_limit < 1 || self.upload.max_limit < self.upload.default_limit {
            anyhow::bail!(
                "upload limits must satisfy 1 <= default_limit <= max_limit, got {} and {}",
                self.upload.default_limit,
                self.upload.max_limit
            );
        }
        Ok(())
    }

    /// Replace the placeholder JWT secret with one persisted next to the database
    fn ensure_jwt_secret(&mut self) -> anyhow::Result<()> {
        if self.jwt.secret != default_jwt_secret() && !self.jwt.secret.is_empty() {
            return Ok(());
        }

        let secret_path = Path::new(&self.database.path)
            .parent()
            .map(|p| p.join(".jwt_secret"))
            .unwrap_or_else(|| PathBuf::from(".jwt_secret"));

        if secret_path.exists() {
            let secret = fs::read_to_string(&secret_path)?;
            self.jwt.secret = secret.trim().to_string();
            tracing::info!("Loaded persisted JWT secret from {:?}", secret_path);
        } else {
            let secret = format!("{}{}", uuid::Uuid::new_v4().simple(), uuid::Uuid::new_v4().simple());
            if let Some(parent) = secret_path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&secret_path, &secret)?;
            self.jwt.secret = secret;
            tracing::info!("Generated and persisted new JWT secret to {:?}", secret_path);
        }
        Ok(())
    }

    /// Load configuration from config.toml
    fn load_from_file() -> anyhow::Result<Self> {
        let config_paths = ["config.toml", "data/config.toml"];

        for path in config_paths {
            if Path::new(path).exists() {
                let content = fs::read_to_string(path)?;
                let config: Config = toml::from_str(&content)?;
                tracing::info!("Loaded configuration from {}", path);
                return Ok(config);
            }
        }

        tracing::info!("No configuration file found, using defaults");
        Ok(Config::default())
    }

    /// Apply environment variable overrides
    /// Format: MG_CONF_<SECTION>_<KEY>
    pub fn apply_env_overrides(&mut self) {
        override_parsed("MG_CONF_SERVER_HOST", &mut self.server.host);
        override_parsed("MG_CONF_SERVER_PORT", &mut self.server.port);
        override_parsed("MG_CONF_SERVER_ENVIRONMENT", &mut self.server.environment);
        override_list("MG_CONF_SERVER_CORS_ORIGINS", &mut self.server.cors_origins);

        override_parsed("MG_CONF_DATABASE_PATH", &mut self.database.path);

        override_parsed("MG_CONF_JWT_SECRET", &mut self.jwt.secret);
        override_list("MG_CONF_JWT_PREVIOUS_SECRETS", &mut self.jwt.previous_secrets);
        override_parsed("MG_CONF_JWT_ACCESS_EXPIRE", &mut self.jwt.access_token_expire_minutes);
        override_parsed("MG_CONF_JWT_COOKIE_SECURE", &mut self.jwt.cookie_secure);

        override_parsed("MG_CONF_AUTH_BCRYPT_COST", &mut self.auth.bcrypt_cost);

        override_parsed("MG_CONF_STORAGE_PROVIDER", &mut self.storage.provider);
        override_parsed("MG_CONF_STORAGE_LOCAL_PATH", &mut self.storage.local_path);
        override_parsed("MG_CONF_STORAGE_TEMP_DIR", &mut self.storage.temp_dir);
        override_parsed("MG_CONF_STORAGE_PUBLIC_BASE_URL", &mut self.storage.public_base_url);
        override_parsed("MG_CONF_STORAGE_REQUEST_TIMEOUT", &mut self.storage.request_timeout_secs);

        override_parsed("MG_CONF_CLOUDINARY_CLOUD_NAME", &mut self.cloudinary.cloud_name);
        override_parsed("MG_CONF_CLOUDINARY_API_KEY", &mut self.cloudinary.api_key);
        override_parsed("MG_CONF_CLOUDINARY_API_SECRET", &mut self.cloudinary.api_secret);
        override_parsed("MG_CONF_CLOUDINARY_FOLDER", &mut self.cloudinary.folder);

        override_parsed("MG_CONF_UPLOAD_MAX_WIDTH", &mut self.upload.max_width);
        override_parsed("MG_CONF_UPLOAD_MAX_HEIGHT", &mut self.upload.max_height);
        override_list("MG_CONF_UPLOAD_ALLOWED_FORMATS", &mut self.upload.allowed_formats);
        override_parsed("MG_CONF_UPLOAD_MAX_FILE_BYTES", &mut self.upload.max_file_bytes);
        override_parsed("MG_CONF_UPLOAD_MAX_REQUEST_BYTES", &mut self.upload.max_request_bytes);
        override_parsed("MG_CONF_UPLOAD_DEFAULT_LIMIT", &mut self.upload.default_limit);
        override_parsed("MG_CONF_UPLOAD_MAX_LIMIT", &mut self.upload.max_limit);
    }

    /// Ensure required directories exist
    fn ensure_directories(&self) -> anyhow::Result<()> {
        if let Some(parent) = Path::new(&self.database.path).parent() {
            fs::create_dir_all(parent)?;
        }
        fs::create_dir_all(&self.storage.temp_dir)?;
        if self.storage.provider == HostKind::Local {
            fs::create_dir_all(&self.storage.local_path)?;
        }
        Ok(())
    }
}

/// Overwrite `target` when the variable is set and parses; bad values are logged and ignored
fn override_parsed<T: FromStr>(key: &str, target: &mut T) {
    if let Ok(val) = env::var(key) {
        if val.trim().is_empty() {
            return;
        }
        match val.trim().parse() {
            Ok(parsed) => *target = parsed,
            Err(_) => tracing::warn!("Ignoring invalid value for {}", key),
        }
    }
}

fn override_list(key: &str, target: &mut Vec<String>) {
    if let Ok(val) = env::var(key) {
        *target = val
            .split(',')
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(|s| s.to_string())
            .collect();
    }
}
