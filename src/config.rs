//! Runtime configuration.
//!
//! Sources, lowest precedence first:
//! 1. built-in defaults
//! 2. `.env` in the working directory (via `dotenvy`)
//! 3. process environment (`RP_*`)
//! 4. CLI flags (applied by `app`)

use std::path::PathBuf;

use crate::error::AppError;
use crate::io::{BatchLimits, DEFAULT_MAX_ROWS, DEFAULT_MAX_UPLOAD_BYTES};

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_MODEL_PATH: &str = "model/revenue_model.json";

const MIB: usize = 1024 * 1024;

/// Allowed CORS origins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CorsOrigins {
    Any,
    List(Vec<String>),
}

impl CorsOrigins {
    /// `*` (or blank) means any origin; otherwise a comma-separated list.
    pub fn parse(value: &str) -> Self {
        let origins: Vec<String> = value
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        if origins.is_empty() || origins.iter().any(|o| o == "*") {
            CorsOrigins::Any
        } else {
            CorsOrigins::List(origins)
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ServeConfig {
    pub host: String,
    pub port: u16,
    pub model_path: PathBuf,
    pub limits: BatchLimits,
    pub cors_origins: CorsOrigins,
    /// Refuse to start without a loadable model.
    pub require_model: bool,
}

impl Default for ServeConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            model_path: PathBuf::from(DEFAULT_MODEL_PATH),
            limits: BatchLimits {
                max_bytes: DEFAULT_MAX_UPLOAD_BYTES,
                max_rows: DEFAULT_MAX_ROWS,
            },
            cors_origins: CorsOrigins::Any,
            require_model: true,
        }
    }
}

/// Load `.env` (if present) and read the process environment.
pub fn load() -> Result<ServeConfig, AppError> {
    let _ = dotenvy::dotenv();
    ServeConfig::from_lookup(|key| std::env::var(key).ok())
}

impl ServeConfig {
    /// Build from an arbitrary key lookup; unset keys keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(host) = lookup("RP_HOST").filter(|s| !s.trim().is_empty()) {
            config.host = host.trim().to_string();
        }
        if let Some(port) = lookup("RP_PORT") {
            config.port = parse_var("RP_PORT", &port)?;
        }
        if let Some(path) = lookup("RP_MODEL_PATH").filter(|s| !s.trim().is_empty()) {
            config.model_path = PathBuf::from(path.trim());
        }
        if let Some(mb) = lookup("RP_MAX_UPLOAD_MB") {
            let mb: usize = parse_positive("RP_MAX_UPLOAD_MB", &mb)?;
            config.limits.max_bytes = mb.saturating_mul(MIB);
        }
        if let Some(rows) = lookup("RP_MAX_ROWS") {
            config.limits.max_rows = parse_positive("RP_MAX_ROWS", &rows)?;
        }
        if let Some(origins) = lookup("RP_CORS_ORIGINS") {
            config.cors_origins = CorsOrigins::parse(&origins);
        }
        if let Some(flag) = lookup("RP_REQUIRE_MODEL") {
            config.require_model = parse_bool("RP_REQUIRE_MODEL", &flag)?;
        }

        Ok(config)
    }

    /// Upload limit expressed in MiB, for flag overrides.
    pub fn set_max_upload_mb(&mut self, mb: usize) -> Result<(), AppError> {
        if mb == 0 {
            return Err(AppError::config("--max-upload-mb must be greater than 0."));
        }
        self.limits.max_bytes = mb.saturating_mul(MIB);
        Ok(())
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_var<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, AppError> {
    value
        .trim()
        .parse()
        .map_err(|_| AppError::config(format!("{key} has an invalid value '{value}'.")))
}

fn parse_positive(key: &str, value: &str) -> Result<usize, AppError> {
    let n: usize = parse_var(key, value)?;
    if n == 0 {
        return Err(AppError::config(format!("{key} must be greater than 0.")));
    }
    Ok(n)
}

fn parse_bool(key: &str, value: &str) -> Result<bool, AppError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(AppError::config(format!("{key} must be true or false (got '{value}')."))),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::error::ErrorKind;

    fn from_pairs(pairs: &[(&str, &str)]) -> Result<ServeConfig, AppError> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServeConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn defaults_without_environment() {
        let config = from_pairs(&[]).unwrap();
        assert_eq!(config, ServeConfig::default());
        assert_eq!(config.bind_addr(), "0.0.0.0:8000");
        assert_eq!(config.limits.max_bytes, 50 * 1024 * 1024);
        assert!(config.require_model);
    }

    #[test]
    fn environment_overrides_defaults() {
        let config = from_pairs(&[
            ("RP_HOST", "127.0.0.1"),
            ("RP_PORT", "9000"),
            ("RP_MODEL_PATH", "/srv/model.json"),
            ("RP_MAX_UPLOAD_MB", "5"),
            ("RP_MAX_ROWS", "10"),
            ("RP_CORS_ORIGINS", "https://a.example, https://b.example"),
            ("RP_REQUIRE_MODEL", "false"),
        ])
        .unwrap();
        assert_eq!(config.bind_addr(), "127.0.0.1:9000");
        assert_eq!(config.model_path, PathBuf::from("/srv/model.json"));
        assert_eq!(config.limits, BatchLimits { max_bytes: 5 * MIB, max_rows: 10 });
        assert_eq!(
            config.cors_origins,
            CorsOrigins::List(vec!["https://a.example".to_string(), "https://b.example".to_string()])
        );
        assert!(!config.require_model);
    }

    #[test]
    fn invalid_values_are_config_errors() {
        for pair in [("RP_PORT", "eighty"), ("RP_MAX_ROWS", "0"), ("RP_REQUIRE_MODEL", "maybe")] {
            let err = from_pairs(&[pair]).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Config);
            assert!(err.message().contains(pair.0));
        }
    }

    #[test]
    fn wildcard_cors() {
        assert_eq!(CorsOrigins::parse("*"), CorsOrigins::Any);
        assert_eq!(CorsOrigins::parse(" "), CorsOrigins::Any);
    }
}
