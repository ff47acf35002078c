use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub notifier: NotifierConfig,
    pub retention: RetentionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    /// Socket address string suitable for `TcpListener::bind`.
    #[must_use]
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

/// Bounds for the observer fan-out set.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifierConfig {
    /// Maximum number of live observers.
    pub max_observers: usize,
    /// Per-observer queue depth; events beyond it are dropped for that observer.
    pub observer_buffer: usize,
}

/// Staleness sweep for market state snapshots.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetentionConfig {
    pub market_state_max_age_secs: u64,
    /// Zero disables the periodic sweep.
    pub sweep_interval_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3001,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://data/bot.db".to_string(),
            max_connections: 5,
        }
    }
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            max_observers: 256,
            observer_buffer: 64,
        }
    }
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            market_state_max_age_secs: 3600,
            sweep_interval_secs: 60,
        }
    }
}
