use std::path::Path;

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::error::{CatastroError, Result};

/// Application configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    pub listing: ListingConfig,
    pub photos: PhotoConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub path: String,
    pub busy_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub file_path: Option<String>,
    pub format: String, // "json" or "text"
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListingConfig {
    pub default_page_size: u32,
    pub max_page_size: u32,
}

/// Upload policy for property photos
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhotoConfig {
    pub upload_dir: String,
    pub max_file_size_mb: u64,
    pub allowed_extensions: Vec<String>,
}

impl Default for PhotoConfig {
    fn default() -> Self {
        Self {
            upload_dir: "uploads".to_string(),
            max_file_size_mb: 10,
            allowed_extensions: vec!["jpg".to_string(), "jpeg".to_string(), "png".to_string()],
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                path: "data/catastro_propiedades.db".to_string(),
                busy_timeout_secs: 5,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                file_path: None,
                format: "text".to_string(),
            },
            listing: ListingConfig {
                default_page_size: 10,
                max_page_size: 1000,
            },
            photos: PhotoConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from multiple sources with precedence,
    /// layering `path` above the default config files
    pub fn load_with(path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder()
            // Start with default values
            .add_source(Config::try_from(&Self::default())?)
            // Add config files if they exist
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(File::with_name("catastro").required(false));

        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(true));
        }

        let config = builder
            // Add environment variables with prefix
            .add_source(
                Environment::with_prefix("CATASTRO")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("photos.allowed_extensions")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| CatastroError::InvalidConfig(format!("Failed to load configuration: {e}")))?;

        let app_config: Self = config
            .try_deserialize()
            .map_err(|e| CatastroError::InvalidConfig(format!("Failed to deserialize configuration: {e}")))?;

        // Validate configuration
        app_config.validate()?;

        Ok(app_config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        // Validate database config
        if self.database.path.trim().is_empty() {
            return Err(CatastroError::InvalidConfig("database.path cannot be empty".to_string()));
        }
        if self.database.busy_timeout_secs == 0 {
            return Err(CatastroError::InvalidConfig(
                "busy_timeout_secs must be greater than 0".to_string(),
            ));
        }

        // Validate logging config
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(CatastroError::InvalidConfig(format!(
                "Invalid log level: {}. Must be one of: {:?}",
                self.logging.level, valid_levels
            )));
        }

        let valid_formats = ["text", "json"];
        if !valid_formats.contains(&self.logging.format.as_str()) {
            return Err(CatastroError::InvalidConfig(format!(
                "Invalid log format: {}. Must be one of: {:?}",
                self.logging.format, valid_formats
            )));
        }

        // Validate listing config
        if self.listing.default_page_size == 0 || self.listing.max_page_size == 0 {
            return Err(CatastroError::InvalidConfig(
                "page sizes must be greater than 0".to_string(),
            ));
        }
        if self.listing.default_page_size > self.listing.max_page_size {
            return Err(CatastroError::InvalidConfig(format!(
                "default_page_size ({}) exceeds max_page_size ({})",
                self.listing.default_page_size, self.listing.max_page_size
            )));
        }

        // Validate photo config
        if self.photos.max_file_size_mb == 0 {
            return Err(CatastroError::InvalidConfig(
                "max_file_size_mb must be greater than 0".to_string(),
            ));
        }
        if self.photos.allowed_extensions.is_empty() {
            return Err(CatastroError::InvalidConfig(
                "allowed_extensions cannot be empty".to_string(),
            ));
        }

        Ok(())
    }

    /// Get database path from environment or config
    pub fn get_database_path(&self) -> String {
        std::env::var("CATASTRO_DB_PATH").unwrap_or_else(|_| self.database.path.clone())
    }

    /// Get log level from environment or config
    pub fn get_log_level(&self) -> String {
        std::env::var("RUST_LOG").unwrap_or_else(|_| self.logging.level.clone())
    }

    /// Clamp a requested page size to the configured maximum
    #[must_use]
    pub fn effective_page_size(&self, requested: Option<u32>) -> u32 {
        requested
            .unwrap_or(self.listing.default_page_size)
            .clamp(1, self.listing.max_page_size)
    }
}
