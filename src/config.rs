// Process configuration from the environment (.env supported by the binaries)

use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;

use crate::benchmarks::AnalysisConfig;

pub const DEFAULT_DATABASE_PATH: &str = "finhealth.db";
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub database_path: PathBuf,
    pub host: String,
    pub port: u16,
    /// Optional JSON file overriding benchmarks and rates
    pub analysis_config_path: Option<PathBuf>,
    pub max_upload_bytes: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            database_path: PathBuf::from(DEFAULT_DATABASE_PATH),
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            analysis_config_path: None,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

impl Config {
    /// Read configuration from process environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from any key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let mut config = Config::default();

        if let Some(path) = get("DATABASE_PATH") {
            config.database_path = PathBuf::from(path);
        } else if let Some(url) = get("DATABASE_URL") {
            config.database_path = PathBuf::from(sqlite_path_from_url(&url));
        }

        if let Some(host) = get("HOST") {
            config.host = host;
        }

        if let Some(port) = get("PORT") {
            config.port = port
                .parse()
                .with_context(|| format!("Invalid PORT value: {}", port))?;
        }

        if let Some(limit) = get("MAX_UPLOAD_BYTES") {
            config.max_upload_bytes = limit
                .parse()
                .with_context(|| format!("Invalid MAX_UPLOAD_BYTES value: {}", limit))?;
        }

        config.analysis_config_path = get("FINHEALTH_CONFIG").map(PathBuf::from);

        Ok(config)
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// The configured analysis config file, or the built-in defaults
    pub fn load_analysis_config(&self) -> Result<AnalysisConfig> {
        match &self.analysis_config_path {
            Some(path) => AnalysisConfig::from_file(path),
            None => Ok(AnalysisConfig::default()),
        }
    }
}

/// "sqlite:///data/app.db" → "/data/app.db"; plain paths pass through
pub fn sqlite_path_from_url(url: &str) -> &str {
    url.strip_prefix("sqlite://")
        .or_else(|| url.strip_prefix("sqlite:"))
        .unwrap_or(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.bind_address(), "0.0.0.0:8000");
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("DATABASE_PATH", "/tmp/fh.db"),
            ("HOST", "127.0.0.1"),
            ("PORT", "9100"),
            ("MAX_UPLOAD_BYTES", "2048"),
            ("FINHEALTH_CONFIG", "bench.json"),
        ])
        .unwrap();

        assert_eq!(config.database_path, PathBuf::from("/tmp/fh.db"));
        assert_eq!(config.bind_address(), "127.0.0.1:9100");
        assert_eq!(config.max_upload_bytes, 2048);
        assert_eq!(config.analysis_config_path, Some(PathBuf::from("bench.json")));
    }

    #[test]
    fn test_database_url_fallback() {
        let config = config_from(&[("DATABASE_URL", "sqlite:///var/lib/fh.db")]).unwrap();
        assert_eq!(config.database_path, PathBuf::from("/var/lib/fh.db"));

        // DATABASE_PATH wins
        let config = config_from(&[("DATABASE_URL", "sqlite://a.db"), ("DATABASE_PATH", "b.db")]).unwrap();
        assert_eq!(config.database_path, PathBuf::from("b.db"));
    }

    #[test]
    fn test_invalid_port() {
        let err = config_from(&[("PORT", "eighty")]).unwrap_err();
        assert!(err.to_string().contains("Invalid PORT value"));
    }

    #[test]
    fn test_blank_values_are_ignored() {
        let config = config_from(&[("PORT", "  "), ("FINHEALTH_CONFIG", "")]).unwrap();
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.analysis_config_path, None);
    }

    #[test]
    fn test_missing_analysis_config_file() {
        let config = config_from(&[("FINHEALTH_CONFIG", "/nonexistent/finhealth.json")]).unwrap();
        assert!(config.load_analysis_config().is_err());
        assert_eq!(
            Config::default().load_analysis_config().unwrap(),
            AnalysisConfig::default()
        );
    }
}
