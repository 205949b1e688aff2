use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

use crate::cache::CacheConfig;

const DEFAULT_PORT: u16 = 8080;
const DEFAULT_SESSION_TTL_SECS: i64 = 86_400;
const DEFAULT_UPLOAD_DIR: &str = "uploads";
const DEFAULT_MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024;
const DEFAULT_UPLOAD_CHUNK_BYTES: usize = 1024 * 1024;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{name} must be a valid {expected}, got {value:?}")]
    Invalid {
        name: &'static str,
        expected: &'static str,
        value: String,
    },
}

/// Signing secret and lifetime for session tokens.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub secret: String,
    pub ttl_secs: i64,
}

#[derive(Debug, Clone)]
pub struct UploadConfig {
    pub dir: PathBuf,
    pub max_bytes: u64,
    pub chunk_bytes: usize,
}

/// Everything the server reads from the environment at startup.
///
/// | Env Var              | Required | Default    |
/// |----------------------|----------|------------|
/// | `DATABASE_URL`       | **yes**  | --         |
/// | `SESSION_SECRET`     | **yes**  | --         |
/// | `SESSION_TTL_SECS`   | no       | `86400`    |
/// | `PORT`               | no       | `8080`     |
/// | `UPLOAD_DIR`         | no       | `uploads`  |
/// | `MAX_UPLOAD_BYTES`   | no       | `10485760` |
/// | `UPLOAD_CHUNK_BYTES` | no       | `1048576`  |
/// | `RUN_MIGRATIONS`     | no       | `true`     |
///
/// Cache TTLs are read by [`CacheConfig`].
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub port: u16,
    pub session: SessionConfig,
    pub upload: UploadConfig,
    pub cache: CacheConfig,
    pub run_migrations: bool,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the config from any key lookup (the process environment in
    /// production, a map in tests).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &'static str| {
            lookup(name)
                .filter(|v| !v.trim().is_empty())
                .ok_or(ConfigError::Missing(name))
        };

        Ok(Self {
            database_url: required("DATABASE_URL")?,
            port: parse_or(&lookup, "PORT", "port number", DEFAULT_PORT)?,
            session: SessionConfig {
                secret: required("SESSION_SECRET")?,
                ttl_secs: parse_or(
                    &lookup,
                    "SESSION_TTL_SECS",
                    "number of seconds",
                    DEFAULT_SESSION_TTL_SECS,
                )?,
            },
            upload: UploadConfig {
                dir: lookup("UPLOAD_DIR")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_UPLOAD_DIR)),
                max_bytes: parse_or(
                    &lookup,
                    "MAX_UPLOAD_BYTES",
                    "byte count",
                    DEFAULT_MAX_UPLOAD_BYTES,
                )?,
                chunk_bytes: parse_or(
                    &lookup,
                    "UPLOAD_CHUNK_BYTES",
                    "byte count",
                    DEFAULT_UPLOAD_CHUNK_BYTES,
                )?,
            },
            cache: CacheConfig::from_lookup(&lookup),
            run_migrations: parse_or(&lookup, "RUN_MIGRATIONS", "boolean", true)?,
        })
    }
}

fn parse_or<F, T>(
    lookup: &F,
    name: &'static str,
    expected: &'static str,
    default: T,
) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(name) {
        None => Ok(default),
        Some(value) => value.trim().parse().map_err(|_| ConfigError::Invalid {
            name,
            expected,
            value,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_optional_vars_are_absent() {
        let config = AppConfig::from_lookup(lookup_from(&[
            ("DATABASE_URL", "postgres://localhost/bidwork"),
            ("SESSION_SECRET", "s3cret"),
        ]))
        .unwrap();

        assert_eq!(config.port, 8080);
        assert_eq!(config.session.ttl_secs, 86_400);
        assert_eq!(config.upload.dir, PathBuf::from("uploads"));
        assert_eq!(config.upload.max_bytes, 10 * 1024 * 1024);
        assert!(config.run_migrations);
    }

    #[test]
    fn missing_secret_is_an_error() {
        let err = AppConfig::from_lookup(lookup_from(&[("DATABASE_URL", "postgres://x")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Missing("SESSION_SECRET")));
    }

    #[test]
    fn malformed_number_is_reported() {
        let err = AppConfig::from_lookup(lookup_from(&[
            ("DATABASE_URL", "postgres://x"),
            ("SESSION_SECRET", "s"),
            ("MAX_UPLOAD_BYTES", "ten megs"),
        ]))
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "MAX_UPLOAD_BYTES must be a valid byte count, got \"ten megs\""
        );
    }
}
