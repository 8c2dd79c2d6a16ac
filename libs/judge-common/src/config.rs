use std::env;
use std::time::Duration;

/// Application configuration
/// Provides defaults with environment variable overrides
#[derive(Debug, Clone)]
pub struct Config {
    pub redis_url: String,
    pub execution_service_url: String,
    pub execution_timeout_ms: u64,
    pub execution_connect_timeout_ms: u64,
    pub execution_max_attempts: u32,
    pub autosave_debounce_ms: u64,
    pub port: u16,
    pub log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

fn parsed<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            redis_url: env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string()),
            execution_service_url: env::var("EXECUTION_SERVICE_URL")
                .or_else(|_| env::var("COMPILER_URL"))
                .unwrap_or_else(|_| "http://localhost:9000".to_string()),
            execution_timeout_ms: parsed("EXECUTION_TIMEOUT_MS").unwrap_or(10_000),
            execution_connect_timeout_ms: parsed("EXECUTION_CONNECT_TIMEOUT_MS").unwrap_or(2_000),
            // at least one attempt is always made
            execution_max_attempts: parsed("EXECUTION_MAX_ATTEMPTS").unwrap_or(1).max(1),
            autosave_debounce_ms: parsed("AUTOSAVE_DEBOUNCE_MS").unwrap_or(1_000),
            port: parsed("PORT").unwrap_or(5000),
            log_format: match env::var("LOG_FORMAT") {
                Ok(v) if v.eq_ignore_ascii_case("json") => LogFormat::Json,
                _ => LogFormat::Text,
            },
        }
    }

    pub fn new() -> Self {
        Self::from_env()
    }

    pub fn execution_timeout(&self) -> Duration {
        Duration::from_millis(self.execution_timeout_ms)
    }

    /// Deadline for opening the connection, kept below the per-call deadline
    pub fn execution_connect_timeout(&self) -> Duration {
        Duration::from_millis(self.execution_connect_timeout_ms.min(self.execution_timeout_ms / 2))
    }

    pub fn autosave_debounce(&self) -> Duration {
        Duration::from_millis(self.autosave_debounce_ms)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}
