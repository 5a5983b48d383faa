use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const MAX_PAGE_SIZE_LIMIT: u32 = 1000;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub auth: AuthConfig,
    pub approvals: ApprovalsConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub graceful_shutdown_secs: u64,
}

/// Headers set by the upstream authenticating proxy.
#[derive(Clone, Debug)]
pub struct AuthConfig {
    pub person_header: String,
    pub role_header: String,
    pub proxy_secret_header: String,
    pub proxy_secret: Option<SecretString>,
}

#[derive(Clone, Debug)]
pub struct ApprovalsConfig {
    pub default_page_size: u32,
    pub max_page_size: u32,
    /// Pass raw persistence errors through to clients on 500 responses.
    pub expose_internal_errors: bool,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub server_port: Option<u16>,
    pub proxy_secret: Option<String>,
    pub expose_internal_errors: Option<bool>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://tradeflow.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 8080,
                graceful_shutdown_secs: 15,
            },
            auth: AuthConfig {
                person_header: "x-person-id".to_string(),
                role_header: "x-person-role".to_string(),
                proxy_secret_header: "x-proxy-secret".to_string(),
                proxy_secret: None,
            },
            approvals: ApprovalsConfig {
                default_page_size: 10,
                max_page_size: 100,
                expose_internal_errors: false,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("tradeflow.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(database) = patch.database {
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
            }
        }

        if let Some(auth) = patch.auth {
            if let Some(person_header) = auth.person_header {
                self.auth.person_header = person_header;
            }
            if let Some(role_header) = auth.role_header {
                self.auth.role_header = role_header;
            }
            if let Some(proxy_secret_header) = auth.proxy_secret_header {
                self.auth.proxy_secret_header = proxy_secret_header;
            }
            if let Some(proxy_secret_value) = auth.proxy_secret {
                self.auth.proxy_secret = Some(secret_value(proxy_secret_value));
            }
        }

        if let Some(approvals) = patch.approvals {
            if let Some(default_page_size) = approvals.default_page_size {
                self.approvals.default_page_size = default_page_size;
            }
            if let Some(max_page_size) = approvals.max_page_size {
                self.approvals.max_page_size = max_page_size;
            }
            if let Some(expose_internal_errors) = approvals.expose_internal_errors {
                self.approvals.expose_internal_errors = expose_internal_errors;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("TRADEFLOW_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("TRADEFLOW_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections =
                parse_u32("TRADEFLOW_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("TRADEFLOW_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_u64("TRADEFLOW_DATABASE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("TRADEFLOW_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("TRADEFLOW_SERVER_PORT") {
            self.server.port = parse_u16("TRADEFLOW_SERVER_PORT", &value)?;
        }
        if let Some(value) = read_env("TRADEFLOW_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_u64("TRADEFLOW_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        if let Some(value) = read_env("TRADEFLOW_AUTH_PERSON_HEADER") {
            self.auth.person_header = value;
        }
        if let Some(value) = read_env("TRADEFLOW_AUTH_ROLE_HEADER") {
            self.auth.role_header = value;
        }
        if let Some(value) = read_env("TRADEFLOW_AUTH_PROXY_SECRET_HEADER") {
            self.auth.proxy_secret_header = value;
        }
        if let Some(value) = read_env("TRADEFLOW_AUTH_PROXY_SECRET") {
            self.auth.proxy_secret = Some(secret_value(value));
        }

        if let Some(value) = read_env("TRADEFLOW_APPROVALS_DEFAULT_PAGE_SIZE") {
            self.approvals.default_page_size =
                parse_u32("TRADEFLOW_APPROVALS_DEFAULT_PAGE_SIZE", &value)?;
        }
        if let Some(value) = read_env("TRADEFLOW_APPROVALS_MAX_PAGE_SIZE") {
            self.approvals.max_page_size = parse_u32("TRADEFLOW_APPROVALS_MAX_PAGE_SIZE", &value)?;
        }
        if let Some(value) = read_env("TRADEFLOW_APPROVALS_EXPOSE_INTERNAL_ERRORS") {
            self.approvals.expose_internal_errors =
                parse_bool("TRADEFLOW_APPROVALS_EXPOSE_INTERNAL_ERRORS", &value)?;
        }

        let log_level =
            read_env("TRADEFLOW_LOGGING_LEVEL").or_else(|| read_env("TRADEFLOW_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("TRADEFLOW_LOGGING_FORMAT").or_else(|| read_env("TRADEFLOW_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(database_url) = overrides.database_url {
            self.database.url = database_url;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(port) = overrides.server_port {
            self.server.port = port;
        }
        if let Some(proxy_secret) = overrides.proxy_secret {
            self.auth.proxy_secret = Some(secret_value(proxy_secret));
        }
        if let Some(expose_internal_errors) = overrides.expose_internal_errors {
            self.approvals.expose_internal_errors = expose_internal_errors;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_server(&self.server)?;
        validate_auth(&self.auth)?;
        validate_approvals(&self.approvals)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("tradeflow.toml"), PathBuf::from("config/tradeflow.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_database(database: &DatabaseConfig) -> Result<(), ConfigError> {
    let url = database.url.trim();
    let sqlite_url =
        url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:";
    if !sqlite_url {
        return Err(ConfigError::Validation(
            "database.url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)"
                .to_string(),
        ));
    }

    if database.max_connections == 0 {
        return Err(ConfigError::Validation(
            "database.max_connections must be greater than zero".to_string(),
        ));
    }

    if database.timeout_secs == 0 || database.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "database.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.bind_address.trim().is_empty() {
        return Err(ConfigError::Validation("server.bind_address is required".to_string()));
    }

    if server.port == 0 {
        return Err(ConfigError::Validation("server.port must be greater than zero".to_string()));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_auth(auth: &AuthConfig) -> Result<(), ConfigError> {
    for (key, value) in [
        ("auth.person_header", &auth.person_header),
        ("auth.role_header", &auth.role_header),
        ("auth.proxy_secret_header", &auth.proxy_secret_header),
    ] {
        let valid = !value.is_empty()
            && value.chars().all(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '_');
        if !valid {
            return Err(ConfigError::Validation(format!(
                "{key} must be a non-empty HTTP header name (letters, digits, `-`, `_`)"
            )));
        }
    }

    if auth.person_header.eq_ignore_ascii_case(&auth.role_header) {
        return Err(ConfigError::Validation(
            "auth.person_header and auth.role_header must differ".to_string(),
        ));
    }

    if let Some(secret) = &auth.proxy_secret {
        if secret.expose_secret().trim().len() < 16 {
            return Err(ConfigError::Validation(
                "auth.proxy_secret must be at least 16 characters when set".to_string(),
            ));
        }
    }

    Ok(())
}

fn validate_approvals(approvals: &ApprovalsConfig) -> Result<(), ConfigError> {
    if approvals.default_page_size == 0 {
        return Err(ConfigError::Validation(
            "approvals.default_page_size must be greater than zero".to_string(),
        ));
    }

    if approvals.max_page_size < approvals.default_page_size
        || approvals.max_page_size > MAX_PAGE_SIZE_LIMIT
    {
        return Err(ConfigError::Validation(format!(
            "approvals.max_page_size must be in range default_page_size..={MAX_PAGE_SIZE_LIMIT}"
        )));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    value.parse::<bool>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    server: Option<ServerPatch>,
    auth: Option<AuthPatch>,
    approvals: Option<ApprovalsPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct AuthPatch {
    person_header: Option<String>,
    role_header: Option<String>,
    proxy_secret_header: Option<String>,
    proxy_secret: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ApprovalsPatch {
    default_page_size: Option<u32>,
    max_page_size: Option<u32>,
    expose_internal_errors: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
