//! Configuration module
//!
//! Environment-driven settings for the proxy binary. The configuration is
//! built once at process start and passed to the pipeline and storage
//! factory; nothing reads the environment after startup.

use std::env;
use std::str::FromStr;

use thiserror::Error;

use crate::storage_types::StorageBackend;

const DEFAULT_SERVER_PORT: u16 = 8080;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {var}: {value}")]
    Invalid { var: &'static str, value: String },
}

/// Proxy configuration.
#[derive(Clone, Debug)]
pub struct Config {
    pub server_port: u16,
    pub storage_backend: StorageBackend,
    // S3 backend
    pub s3_bucket: Option<String>,
    pub s3_region: Option<String>,
    /// Custom endpoint for S3-compatible providers (MinIO, Spaces, ...).
    pub s3_endpoint: Option<String>,
    // Local backend
    pub local_storage_path: Option<String>,
}

impl Config {
    /// Load configuration from the environment.
    ///
    /// Backend-specific settings are validated by the storage factory, not
    /// here, so a partially configured environment still loads for the
    /// backend it does configure.
    pub fn from_env() -> Result<Self, ConfigError> {
        let server_port = match env::var("SERVER_PORT") {
            Ok(value) => value.parse::<u16>().map_err(|_| ConfigError::Invalid {
                var: "SERVER_PORT",
                value: value.clone(),
            })?,
            Err(_) => DEFAULT_SERVER_PORT,
        };

        let storage_backend = match env::var("STORAGE_BACKEND") {
            Ok(value) => {
                StorageBackend::from_str(&value).map_err(|_| ConfigError::Invalid {
                    var: "STORAGE_BACKEND",
                    value: value.clone(),
                })?
            }
            Err(_) => StorageBackend::S3,
        };

        Ok(Config {
            server_port,
            storage_backend,
            s3_bucket: env::var("S3_BUCKET").ok(),
            s3_region: env::var("S3_REGION")
                .or_else(|_| env::var("AWS_REGION"))
                .ok(),
            s3_endpoint: env::var("S3_ENDPOINT").ok(),
            local_storage_path: env::var("LOCAL_STORAGE_PATH").ok(),
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server_port: DEFAULT_SERVER_PORT,
            storage_backend: StorageBackend::S3,
            s3_bucket: None,
            s3_region: None,
            s3_endpoint: None,
            local_storage_path: None,
        }
    }
}
