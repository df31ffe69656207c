/// Configuration management for imagebin
use crate::error::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

/// Default GridFS-compatible chunk size (255 KiB)
pub const DEFAULT_CHUNK_SIZE: usize = 255 * 1024;

/// Main server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub service: ServiceConfig,
    pub storage: StorageConfig,
}

/// Service-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub hostname: String,
    pub port: u16,
    /// Request body cap for uploads; `None` accepts any size
    pub upload_limit: Option<usize>,
    pub static_directory: PathBuf,
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub bucket_name: String,
    pub chunk_size: usize,
    pub backend: StorageBackendConfig,
}

/// Grid storage backend selection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum StorageBackendConfig {
    Sqlite { path: PathBuf },
    Memory,
}

impl ServerConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> AppResult<Self> {
        dotenv::dotenv().ok();

        let hostname = env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = env::var("PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse()
            .map_err(|_| AppError::Validation("Invalid port number".to_string()))?;
        let upload_limit = match env::var("UPLOAD_LIMIT_BYTES") {
            Ok(value) => Some(value.parse().map_err(|_| {
                AppError::Validation(format!("Invalid UPLOAD_LIMIT_BYTES: {}", value))
            })?),
            Err(_) => None,
        };
        let static_directory = env::var("STATIC_DIR")
            .unwrap_or_else(|_| "./public".to_string())
            .into();

        let bucket_name = env::var("BUCKET_NAME").unwrap_or_else(|_| "uploads".to_string());
        let chunk_size = env::var("CHUNK_SIZE_BYTES")
            .unwrap_or_else(|_| DEFAULT_CHUNK_SIZE.to_string())
            .parse()
            .map_err(|_| AppError::Validation("Invalid chunk size".to_string()))?;

        let backend = match env::var("STORAGE_BACKEND")
            .unwrap_or_else(|_| "sqlite".to_string())
            .to_lowercase()
            .as_str()
        {
            "sqlite" => StorageBackendConfig::Sqlite {
                path: env::var("DATABASE_PATH")
                    .unwrap_or_else(|_| "./data/imageUpload.sqlite".to_string())
                    .into(),
            },
            "memory" => StorageBackendConfig::Memory,
            other => {
                return Err(AppError::Validation(format!(
                    "Unknown storage backend: {}",
                    other
                )))
            }
        };

        Ok(ServerConfig {
            service: ServiceConfig {
                hostname,
                port,
                upload_limit,
                static_directory,
            },
            storage: StorageConfig {
                bucket_name,
                chunk_size,
                backend,
            },
        })
    }

    /// Validate configuration
    pub fn validate(&self) -> AppResult<()> {
        if self.service.hostname.is_empty() {
            return Err(AppError::Validation("Hostname cannot be empty".to_string()));
        }

        if self.storage.chunk_size == 0 {
            return Err(AppError::Validation(
                "Chunk size must be greater than zero".to_string(),
            ));
        }

        if self.storage.bucket_name.trim().is_empty() {
            return Err(AppError::Validation("Bucket name cannot be empty".to_string()));
        }

        Ok(())
    }

    /// Address the listener binds to
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.service.hostname, self.service.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            service: ServiceConfig {
                hostname: "0.0.0.0".to_string(),
                port: 3000,
                upload_limit: None,
                static_directory: PathBuf::from("./public"),
            },
            storage: StorageConfig {
                bucket_name: "uploads".to_string(),
                chunk_size: DEFAULT_CHUNK_SIZE,
                backend: StorageBackendConfig::Sqlite {
                    path: PathBuf::from("./data/imageUpload.sqlite"),
                },
            },
        }
    }
}
