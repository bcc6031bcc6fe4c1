use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::Path;

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// Primary database
    pub database: DatabaseConfig,
    /// Duplicate databases for replication (may be empty)
    #[serde(default)]
    pub replicas: Vec<DatabaseConfig>,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file
    pub path: String,
    /// Maximum read connections in the pool; defaults to available
    /// parallelism. Writes always go through one dedicated connection.
    #[serde(default = "default_read_connections")]
    pub max_read_connections: u32,
}

impl DatabaseConfig {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            max_read_connections: default_read_connections(),
        }
    }
}

fn default_read_connections() -> u32 {
    std::thread::available_parallelism().map_or(4, |n| n.get() as u32)
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl StoreConfig {
    /// Load configuration from files and environment
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from("config")
    }

    /// Load configuration from a specific directory
    pub fn load_from<P: AsRef<Path>>(config_dir: P) -> Result<Self, ConfigError> {
        let config_dir = config_dir.as_ref();

        let builder = Config::builder()
            .set_default("logging.level", "info")?
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            .add_source(
                File::from(config_dir.join(
                    std::env::var("ORDERSTORE_ENV").unwrap_or_else(|_| "development".to_string()),
                ))
                .required(false),
            )
            // Override with environment variables (ORDERSTORE_DATABASE__PATH, etc.)
            .add_source(
                Environment::with_prefix("ORDERSTORE")
                    .separator("__")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();
        if self.database.path.is_empty() {
            errors.push("database.path must not be empty".to_string());
        }
        for (i, replica) in self.replicas.iter().enumerate() {
            if replica.path.is_empty() {
                errors.push(format!("replicas[{i}].path must not be empty"));
            } else if replica.path == self.database.path {
                errors.push(format!(
                    "replicas[{i}].path duplicates the primary database path"
                ));
            }
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Initialize the tracing subscriber from the logging config. Safe to call
/// more than once; later calls are ignored.
pub fn init_logging(config: &LoggingConfig) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.clone()));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
