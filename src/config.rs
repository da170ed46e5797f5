use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::avatar::AvatarStyle;

/// Base for relative database files unless `DB_ROOT` says otherwise.
pub const PROJECT_ROOT: &str = env!("CARGO_MANIFEST_DIR");

/// Plain environment variables and the config keys they override.
const ENV_OVERRIDES: &[(&str, &str)] = &[
    ("DB_FILE", "database.file"),
    ("DB_ROOT", "database.root"),
    ("PORT", "server.port"),
    ("HOST", "server.host"),
    ("API_KEY", "auth.api_key"),
    ("API_KEY_HEADER", "auth.header"),
];

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("DB_FILE environment variable is not set (or is empty); set it in the environment or in .env")]
    MissingDatabaseFile,
    #[error("invalid server.port: {0}")]
    InvalidPort(u16),
    #[error("database.max_connections must be > 0")]
    InvalidPoolSize,
    #[error("auth.header is not a valid HTTP header name: {0:?}")]
    InvalidAuthHeader(String),
    #[error(transparent)]
    Source(#[from] ::config::ConfigError),
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Database file, relative to `root` unless absolute. Required.
    pub file: Option<String>,
    pub root: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Shared secret. The key check is disabled while this is unset or empty.
    pub api_key: Option<String>,
    pub header: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AvatarConfig {
    pub style: AvatarStyle,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub avatar: AvatarConfig,
}

impl AppConfig {
    /// Resolves the database file against `database.root`.
    pub fn database_path(&self) -> Result<PathBuf, ConfigError> {
        let file = self
            .database
            .file
            .as_deref()
            .map(str::trim)
            .filter(|f| !f.is_empty())
            .ok_or(ConfigError::MissingDatabaseFile)?;
        let file = Path::new(file);
        if file.is_absolute() {
            Ok(file.to_path_buf())
        } else {
            Ok(Path::new(&self.database.root).join(file))
        }
    }

    /// The configured API key, if the key check is enabled.
    pub fn api_key(&self) -> Option<&str> {
        self.auth.api_key.as_deref().filter(|k| !k.is_empty())
    }
}

/// Loads `.env` (optional) and builds the configuration from the process environment.
pub fn load() -> Result<AppConfig, ConfigError> {
    let _ = dotenvy::dotenv();
    from_env(std::env::vars().collect())
}

/// Builds the configuration from embedded defaults, optional files and the given variables.
pub fn from_env(vars: ::config::Map<String, String>) -> Result<AppConfig, ConfigError> {
    let defaults: &str = include_str!("../config/default.toml");
    let mut builder = ::config::Config::builder()
        .set_default("database.root", PROJECT_ROOT)?
        .add_source(::config::File::from_str(defaults, ::config::FileFormat::Toml))
        // Optional local file: userbase.toml (in CWD)
        .add_source(::config::File::with_name("userbase").required(false));

    if let Some(custom_path) = vars.get("USERBASE_CONFIG") {
        builder = builder.add_source(::config::File::with_name(custom_path).required(false));
    }
    builder = builder.add_source(
        ::config::Environment::with_prefix("USERBASE")
            .separator("__")
            .source(Some(vars.clone())),
    );
    for (var, key) in ENV_OVERRIDES {
        builder = builder.set_override_option(*key, vars.get(*var).cloned())?;
    }

    let app_cfg: AppConfig = builder.build()?.try_deserialize()?;
    validate(&app_cfg)?;
    Ok(app_cfg)
}

fn validate(cfg: &AppConfig) -> Result<(), ConfigError> {
    cfg.database_path()?;

    if cfg.server.port == 0 {
        return Err(ConfigError::InvalidPort(cfg.server.port));
    }
    #[cfg(unix)]
    if cfg.server.port < 1024 {
        tracing::warn!("Using privileged port {} - may require elevated permissions", cfg.server.port);
    }

    if cfg.database.max_connections == 0 {
        return Err(ConfigError::InvalidPoolSize);
    }
    if axum::http::HeaderName::from_bytes(cfg.auth.header.as_bytes()).is_err() {
        return Err(ConfigError::InvalidAuthHeader(cfg.auth.header.clone()));
    }

    Ok(())
}
