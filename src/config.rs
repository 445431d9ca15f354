// src/config.rs - Configuration management
use serde::Deserialize;
use std::env;
use anyhow::{Context, Result};
use std::path::Path;
use std::fs;

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub security: SecurityConfig,
    pub logging: LoggingConfig,
    pub notifications: NotificationConfig,
    pub maintenance: MaintenanceConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub workers: Option<usize>,
    pub keep_alive: u64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout: u64,
    pub idle_timeout: u64,
    pub busy_timeout: u64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SecurityConfig {
    pub allowed_origins: Vec<String>,
    pub max_request_size: usize,
    pub require_https: bool,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

/// Stock-change notification settings.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct NotificationConfig {
    /// Page size when the client does not ask for one
    pub list_limit: i64,
    pub max_list_limit: i64,
    /// Full read-decide-write attempts before an update is reported as a conflict
    pub max_update_attempts: u32,
    /// Buffered events per change-feed subscriber
    pub feed_capacity: usize,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct MaintenanceConfig {
    pub enabled: bool,
    pub interval_minutes: u64,
    pub sensor_retention_days: i64,
    /// 0 keeps read notifications forever
    pub read_notification_retention_days: i64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            workers: None,
            keep_alive: 30,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite:stockwatch.db".to_string(),
            max_connections: 10,
            min_connections: 1,
            connect_timeout: 30,
            idle_timeout: 600,
            busy_timeout: 5,
        }
    }
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec![
                "http://localhost:3000".to_string(),
                "http://127.0.0.1:3000".to_string(),
                "http://localhost:5173".to_string(),
                "http://127.0.0.1:5173".to_string(),
            ],
            max_request_size: 256 * 1024,
            require_https: false,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "full".to_string(),
        }
    }
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            list_limit: 50,
            max_list_limit: 200,
            max_update_attempts: 3,
            feed_capacity: 64,
        }
    }
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_minutes: 60,
            sensor_retention_days: 30,
            read_notification_retention_days: 0,
        }
    }
}

pub fn load_config() -> Result<Config> {
    load_env_file()?;

    let mut config = if let Ok(config_file) = env::var("CONFIG_FILE") {
        let path = Path::new(&config_file);
        let config_str = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", config_file))?;
        Config::from_toml_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", config_file))?
    } else {
        Config::default()
    };

    override_with_env(&mut config, |key| env::var(key).ok())?;

    config.validate()
        .context("Configuration validation failed")?;

    Ok(config)
}

/// `lookup` resolves a variable name, normally from the process environment.
fn override_with_env<F>(config: &mut Config, lookup: F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(host) = lookup("BIND_ADDRESS") {
        config.server.host = host;
    }
    if let Some(port_str) = lookup("STOCKWATCH_PORT") {
        config.server.port = port_str.parse::<u16>()
            .with_context(|| format!("Invalid STOCKWATCH_PORT: {}", port_str))?;
    }
    if let Some(workers_str) = lookup("STOCKWATCH_WORKERS") {
        if let Ok(workers) = workers_str.parse::<usize>() {
            config.server.workers = Some(workers);
        }
    }
    if let Some(url) = lookup("DATABASE_URL") {
        config.database.url = url;
    }
    if let Some(max_conn_str) = lookup("DATABASE_MAX_CONNECTIONS") {
        if let Ok(max_conn) = max_conn_str.parse::<u32>() {
            config.database.max_connections = max_conn;
        }
    }
    if let Some(min_conn_str) = lookup("DATABASE_MIN_CONNECTIONS") {
        if let Ok(min_conn) = min_conn_str.parse::<u32>() {
            config.database.min_connections = min_conn;
        }
    }
    if let Some(origins_str) = lookup("ALLOWED_ORIGINS") {
        config.security.allowed_origins = origins_str
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
    }
    if let Some(level) = lookup("RUST_LOG") {
        config.logging.level = level;
    }
    if let Some(attempts_str) = lookup("NOTIFICATION_MAX_UPDATE_ATTEMPTS") {
        if let Ok(attempts) = attempts_str.parse::<u32>() {
            config.notifications.max_update_attempts = attempts;
        }
    }
    if let Some(days_str) = lookup("SENSOR_RETENTION_DAYS") {
        if let Ok(days) = days_str.parse::<i64>() {
            config.maintenance.sensor_retention_days = days;
        }
    }

    Ok(())
}

impl Config {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn validate(&self) -> Result<()> {
        if self.database.max_connections < self.database.min_connections {
            return Err(anyhow::anyhow!(
                "max_connections ({}) must be >= min_connections ({})",
                self.database.max_connections,
                self.database.min_connections
            ));
        }

        if self.notifications.max_update_attempts == 0 {
            anyhow::bail!("notifications.max_update_attempts must be at least 1");
        }

        if self.notifications.list_limit < 1
            || self.notifications.list_limit > self.notifications.max_list_limit
        {
            anyhow::bail!(
                "notifications.list_limit ({}) must be between 1 and max_list_limit ({})",
                self.notifications.list_limit,
                self.notifications.max_list_limit
            );
        }

        if self.notifications.feed_capacity == 0 {
            anyhow::bail!("notifications.feed_capacity must be at least 1");
        }

        if self.maintenance.sensor_retention_days < 1 {
            anyhow::bail!("maintenance.sensor_retention_days must be at least 1");
        }

        if self.maintenance.read_notification_retention_days < 0 {
            anyhow::bail!("maintenance.read_notification_retention_days cannot be negative");
        }

        if self.is_production() && self.security.allowed_origins.iter().any(|o| o == "*") {
            anyhow::bail!("Wildcard CORS origins not allowed in production!");
        }

        Ok(())
    }

    pub fn is_production(&self) -> bool {
        env::var("STOCKWATCH_ENV").map(|v| v == "production").unwrap_or(false)
    }

    pub fn print_startup_info(&self) {
        log::info!("Stockwatch starting up...");
        log::info!("Server: {}:{}", self.server.host, self.server.port);
        log::info!("Database: {}", self.database.url);
        log::info!("Logging: {} level", self.logging.level);
        log::info!(
            "Notifications: {} update attempts, feed capacity {}",
            self.notifications.max_update_attempts,
            self.notifications.feed_capacity
        );

        if !self.is_production() {
            log::warn!("Running in development mode");
        }

        if self.security.require_https {
            log::info!("HTTPS enforcement enabled");
        } else if self.is_production() {
            log::warn!("HTTPS not required in production mode");
        }
    }
}

pub fn load_env_file() -> Result<()> {
    if let Ok(env_file) = env::var("ENV_FILE") {
        dotenvy::from_filename(&env_file)
            .with_context(|| format!("Failed to load environment file: {}", env_file))?;
    } else if Path::new(".env").exists() {
        dotenvy::dotenv().context("Failed to load .env file")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.notifications.list_limit, 50);
        assert_eq!(config.notifications.max_update_attempts, 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();

        config.database.max_connections = 1;
        config.database.min_connections = 5;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.notifications.max_update_attempts = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.notifications.list_limit = 500;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.maintenance.read_notification_retention_days = -1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() -> Result<()> {
        let toml_content = r#"
        [server]
        host = "0.0.0.0"
        port = 9000

        [notifications]
        max_update_attempts = 5
        "#;

        let config = Config::from_toml_str(toml_content)?;
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.keep_alive, 30);
        assert_eq!(config.notifications.max_update_attempts, 5);
        assert_eq!(config.notifications.list_limit, 50);
        assert_eq!(config.database.url, "sqlite:stockwatch.db");

        Ok(())
    }

    #[test]
    fn test_env_file_and_override() -> Result<()> {
        let mut env_file = NamedTempFile::new()?;
        writeln!(env_file, "STOCKWATCH_PORT=9191")?;
        writeln!(env_file, "ALLOWED_ORIGINS=\"http://a.test, ,http://b.test\"")?;
        writeln!(env_file, "NOTIFICATION_MAX_UPDATE_ATTEMPTS=7")?;

        let vars: HashMap<String, String> = dotenvy::from_path_iter(env_file.path())?
            .collect::<std::result::Result<_, _>>()?;

        let mut config = Config::default();
        override_with_env(&mut config, |key| vars.get(key).cloned())?;
        assert_eq!(config.server.port, 9191);
        assert_eq!(config.security.allowed_origins, vec!["http://a.test", "http://b.test"]);
        assert_eq!(config.notifications.max_update_attempts, 7);
        assert_eq!(config.database.url, "sqlite:stockwatch.db");
        Ok(())
    }

    #[test]
    fn test_invalid_port_override_is_an_error() {
        let mut config = Config::default();
        let result = override_with_env(&mut config, |key| {
            (key == "STOCKWATCH_PORT").then(|| "not-a-port".to_string())
        });
        assert!(result.is_err());
    }
}
