//! API configuration

use serde::Deserialize;

/// API configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// JWT secret for authentication
    pub jwt_secret: String,
    /// JWT expiration in seconds
    pub jwt_expiration_secs: u64,
    /// Database URL
    pub database_url: String,
    /// Log level
    pub log_level: String,
    /// Root directory of the private disk holding claim documents
    pub document_root: String,
    /// Largest accepted claim document, in bytes
    pub max_document_bytes: usize,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            jwt_secret: "change-me-in-production".to_string(),
            jwt_expiration_secs: 3600,
            database_url: "postgres://localhost/hospital".to_string(),
            log_level: "info".to_string(),
            document_root: "storage/private".to_string(),
            max_document_bytes: 10 * 1024 * 1024,
        }
    }
}

impl ApiConfig {
    /// Loads configuration from `API_*` environment variables
    ///
    /// Unset variables keep their defaults. `DATABASE_URL` is honoured when
    /// `API_DATABASE_URL` is absent.
    pub fn from_env() -> Result<Self, config::ConfigError> {
        let mut config: ApiConfig = config::Config::builder()
            .add_source(config::Environment::with_prefix("API").try_parsing(true))
            .build()?
            .try_deserialize()?;

        if std::env::var("API_DATABASE_URL").is_err() {
            if let Ok(url) = std::env::var("DATABASE_URL") {
                config.database_url = url;
            }
        }
        Ok(config)
    }

    /// Returns the server address
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ApiConfig::default();
        assert_eq!(config.server_addr(), "0.0.0.0:8080");
        assert_eq!(config.max_document_bytes, 10_485_760);
    }
}
