//! Application configuration loaded from environment variables.

use crate::errors::{LedgerError, Result};

#[derive(Debug, Clone)]
pub struct Config {
    /// Title shown on the landing endpoint
    pub app_title: String,
    /// Path to the SQLite database file
    pub database_url: String,
    /// Upper bound for the SQLite connection pool
    pub max_connections: u32,
    /// Port for the REST API server
    pub api_port: u16,
    /// HS256 secret that user bearer tokens are signed with
    pub secret: String,
    /// How often (in seconds) the auditor re-checks the ledger; 0 disables it
    pub audit_interval_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Config {
            app_title: env_var("APP_TITLE").unwrap_or_else(|_| "QRKot charity fund".to_string()),
            database_url: env_var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite:./fund_ledger.db".to_string()),
            max_connections: env_var("DB_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "5".to_string())
                .parse()
                .map_err(|_| LedgerError::Config("Invalid DB_MAX_CONNECTIONS".to_string()))?,
            api_port: env_var("API_PORT")
                .unwrap_or_else(|_| "3001".to_string())
                .parse()
                .map_err(|_| LedgerError::Config("Invalid API_PORT".to_string()))?,
            secret: env_var("SECRET")
                .ok()
                .filter(|s| !s.is_empty())
                .ok_or_else(|| {
                    LedgerError::Config("SECRET environment variable is required".to_string())
                })?,
            audit_interval_secs: env_var("AUDIT_INTERVAL_SECS")
                .unwrap_or_else(|_| "60".to_string())
                .parse()
                .map_err(|_| LedgerError::Config("Invalid AUDIT_INTERVAL_SECS".to_string()))?,
        })
    }
}

fn env_var(key: &str) -> Result<String> {
    std::env::var(key).map_err(|_| LedgerError::Config(format!("Missing env var: {key}")))
}
