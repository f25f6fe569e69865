use std::{fs, path::Path};

use serde::Deserialize;

/// Everything the retrieval pipeline needs to know about where and how to fetch reports.
#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Where reports come from.
    pub server: ServerConfiguration,
    /// Which reports to keep.
    pub reports: ReportsConfiguration,
}

/// The report aggregation server.
#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct ServerConfiguration {
    /// Report aggregation endpoint. Validated when a refresh starts, not here.
    pub server_url: Option<String>,
    /// Sent with every fetch.
    pub authorization: Authorization,
}

/// How requests to the report server are authorized.
#[derive(Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Authorization {
    /// No `Authorization` header.
    #[default]
    None,
    /// Verbatim value of the `Authorization` header.
    HttpHeader(String),
}

/// The reporting window.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ReportsConfiguration {
    /// How far back to ask for and keep reports.
    pub number_of_days: u32,
    /// Carried for compatibility with existing configuration files; unused.
    pub cache_factor: f64,
}

impl Default for ReportsConfiguration {
    fn default() -> Self {
        Self {
            number_of_days: 7,
            cache_factor: 10.0,
        }
    }
}

/// Why a configuration file couldn't be loaded.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The file couldn't be read.
    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),
    /// The file isn't valid JSON for [`Config`].
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),
}

impl Config {
    /// Parse a JSON configuration. Missing fields take their defaults.
    pub fn from_slice(data: &[u8]) -> Result<Self, ConfigError> {
        Ok(serde_json::from_slice(data)?)
    }

    /// Read and parse a JSON configuration file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::from_slice(&fs::read(path)?)
    }

    /// Apply overrides from the command line or environment on top of the file values.
    pub fn with_overrides(mut self, server_url: Option<String>, authorization: Option<String>) -> Self {
        if server_url.is_some() {
            self.server.server_url = server_url;
        }
        if let Some(authorization) = authorization {
            self.server.authorization = Authorization::HttpHeader(authorization);
        }

        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::from_slice(b"{}").unwrap();

        assert_eq!(config.server.server_url, None);
        assert_eq!(config.server.authorization, Authorization::None);
        assert_eq!(config.reports.number_of_days, 7);
        assert_eq!(config.reports.cache_factor, 10.0);
    }

    #[test]
    fn test_full_file() {
        let config = Config::from_slice(
            br#"{
                "server": {
                    "server_url": "https://example.com/reports",
                    "authorization": { "http_header": "Basic abc" }
                },
                "reports": { "number_of_days": 3 }
            }"#,
        )
        .unwrap();

        assert_eq!(
            config.server.server_url.as_deref(),
            Some("https://example.com/reports")
        );
        assert_eq!(
            config.server.authorization,
            Authorization::HttpHeader("Basic abc".to_string())
        );
        assert_eq!(config.reports.number_of_days, 3);
        assert_eq!(config.reports.cache_factor, 10.0);
    }

    #[test]
    fn test_unit_authorization() {
        let config =
            Config::from_slice(br#"{ "server": { "authorization": "none" } }"#).unwrap();

        assert_eq!(config.server.authorization, Authorization::None);
    }

    #[test]
    fn test_overrides_win() {
        let config = Config::default()
            .with_overrides(Some("http://localhost:6176".to_string()), Some("x".to_string()));

        assert_eq!(
            config.server.server_url.as_deref(),
            Some("http://localhost:6176")
        );
        assert_eq!(
            config.server.authorization,
            Authorization::HttpHeader("x".to_string())
        );

        let untouched = config.clone().with_overrides(None, None);
        assert_eq!(untouched, config);
    }
}
