use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::ExposeSecret;
use toml::Value;
use tradeflow_core::config::{AppConfig, LoadOptions};

use crate::commands::{CommandResult, EXIT_CONFIG};

pub fn run() -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "config",
                "config_validation",
                format!("configuration issue: {error}"),
                EXIT_CONFIG,
            );
        }
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    CommandResult {
        exit_code: 0,
        output: render(&config, config_file_doc.as_ref(), config_file_path.as_deref()),
    }
}

/// One line per setting, each naming where its value came from.
pub fn render(config: &AppConfig, file_doc: Option<&Value>, file_path: Option<&Path>) -> String {
    let entries: Vec<(&str, &[&str], String)> = vec![
        ("database.url", &["TRADEFLOW_DATABASE_URL"][..], config.database.url.clone()),
        (
            "database.max_connections",
            &["TRADEFLOW_DATABASE_MAX_CONNECTIONS"][..],
            config.database.max_connections.to_string(),
        ),
        (
            "database.timeout_secs",
            &["TRADEFLOW_DATABASE_TIMEOUT_SECS"][..],
            config.database.timeout_secs.to_string(),
        ),
        ("server.bind_address", &["TRADEFLOW_SERVER_BIND_ADDRESS"][..], config.server.bind_address.clone()),
        ("server.port", &["TRADEFLOW_SERVER_PORT"][..], config.server.port.to_string()),
        (
            "server.graceful_shutdown_secs",
            &["TRADEFLOW_SERVER_GRACEFUL_SHUTDOWN_SECS"][..],
            config.server.graceful_shutdown_secs.to_string(),
        ),
        ("auth.person_header", &["TRADEFLOW_AUTH_PERSON_HEADER"][..], config.auth.person_header.clone()),
        ("auth.role_header", &["TRADEFLOW_AUTH_ROLE_HEADER"][..], config.auth.role_header.clone()),
        (
            "auth.proxy_secret_header",
            &["TRADEFLOW_AUTH_PROXY_SECRET_HEADER"][..],
            config.auth.proxy_secret_header.clone(),
        ),
        (
            "auth.proxy_secret",
            &["TRADEFLOW_AUTH_PROXY_SECRET"][..],
            redact_secret(config.auth.proxy_secret.as_ref().map(|secret| secret.expose_secret())),
        ),
        (
            "approvals.default_page_size",
            &["TRADEFLOW_APPROVALS_DEFAULT_PAGE_SIZE"][..],
            config.approvals.default_page_size.to_string(),
        ),
        (
            "approvals.max_page_size",
            &["TRADEFLOW_APPROVALS_MAX_PAGE_SIZE"][..],
            config.approvals.max_page_size.to_string(),
        ),
        (
            "approvals.expose_internal_errors",
            &["TRADEFLOW_APPROVALS_EXPOSE_INTERNAL_ERRORS"][..],
            config.approvals.expose_internal_errors.to_string(),
        ),
        (
            "logging.level",
            &["TRADEFLOW_LOGGING_LEVEL", "TRADEFLOW_LOG_LEVEL"][..],
            config.logging.level.clone(),
        ),
        (
            "logging.format",
            &["TRADEFLOW_LOGGING_FORMAT", "TRADEFLOW_LOG_FORMAT"][..],
            format!("{:?}", config.logging.format).to_ascii_lowercase(),
        ),
    ];

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    lines.extend(entries.into_iter().map(|(key, env_keys, value)| {
        render_line(key, &value, field_source(key, env_keys, file_doc, file_path))
    }));
    lines.join("\n")
}

fn detect_config_path() -> Option<PathBuf> {
    [PathBuf::from("tradeflow.toml"), PathBuf::from("config/tradeflow.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let raw = fs::read_to_string(path?).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

fn redact_secret(secret: Option<&str>) -> String {
    match secret.map(str::trim) {
        None => "<unset>".to_string(),
        Some("") => "<empty>".to_string(),
        Some(_) => "<redacted>".to_string(),
    }
}
