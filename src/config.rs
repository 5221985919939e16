//! Application configuration management.
//!
//! Configuration is loaded from a YAML file with environment variable overrides. The configuration
//! file path defaults to `config.yaml` but can be specified via `-f` flag or `ICEBOX_CONFIG`
//! environment variable.
//!
//! ## Loading Priority
//!
//! Configuration sources are merged in the following order (later sources override earlier ones):
//!
//! 1. **YAML config file** - Base configuration (default: `config.yaml`)
//! 2. **Environment variables** - Variables prefixed with `ICEBOX_` override YAML values
//!
//! For nested config values, use double underscores in environment variables. For example,
//! `ICEBOX_STORAGE__BUCKET=my-bucket` sets the `storage.bucket` field.
//!
//! ## Configuration Structure
//!
//! - **Server**: `host`, `port` - HTTP server binding configuration
//! - **Storage**: `storage.bucket`, `storage.region`, `storage.transition_days` - archive target
//! - **Limits**: `limits.max_upload_bytes` - request body cap for uploads
//!
//! ## Environment Variable Examples
//!
//! ```bash
//! # Override server port
//! ICEBOX_PORT=8080
//!
//! # Point at a local Minio instead of AWS
//! ICEBOX_STORAGE__ENDPOINT_URL="http://localhost:9000"
//! ICEBOX_STORAGE__ACCESS_KEY_ID=minioadmin
//! ICEBOX_STORAGE__SECRET_ACCESS_KEY=minioadmin
//! ```

use clap::Parser;
use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use serde::{Deserialize, Serialize};

use crate::errors::Error;

/// Simple CLI args - just for specifying config file
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to configuration file
    #[arg(short = 'f', long, env = "ICEBOX_CONFIG", default_value = "config.yaml")]
    pub config: String,

    /// Validate configuration and exit without starting the server.
    /// Useful for CI/CD pipelines to catch config errors before deployment.
    #[arg(long)]
    pub validate: bool,
}

/// Main application configuration.
///
/// This is the root configuration structure loaded from YAML and environment variables.
/// All fields have sensible defaults defined in the `Default` implementation.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// HTTP server host to bind to (e.g., "0.0.0.0" for all interfaces)
    pub host: String,
    /// HTTP server port to bind to
    pub port: u16,
    /// Object storage configuration (bucket, region, lifecycle transition)
    pub storage: StorageConfig,
    /// Resource limits for protecting system capacity
    pub limits: LimitsConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5000,
            storage: StorageConfig::default(),
            limits: LimitsConfig::default(),
        }
    }
}

/// Object storage configuration for the archive target.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageConfig {
    /// Target bucket name
    pub bucket: String,
    /// AWS region of the bucket
    pub region: String,
    /// Optional endpoint override for S3-compatible services (Minio, etc.).
    /// When set, path-style addressing is used.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint_url: Option<String>,
    /// Optional static access key. When absent, the ambient AWS credential
    /// chain (environment, profile, instance metadata) is used.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_key_id: Option<String>,
    /// Optional static secret key, paired with `access_key_id`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret_access_key: Option<String>,
    /// Days before uploaded objects transition to the cold storage class
    pub transition_days: i32,
    /// Cold storage class objects transition into
    pub target_storage_class: TargetStorageClass,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            bucket: "icebox-uploads".to_string(),
            region: "us-east-1".to_string(),
            endpoint_url: None,
            access_key_id: None,
            secret_access_key: None,
            transition_days: 30,
            target_storage_class: TargetStorageClass::Glacier,
        }
    }
}

/// Storage classes an uploaded object can be transitioned to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetStorageClass {
    Glacier,
    GlacierIr,
    DeepArchive,
}

/// Resource limits for protecting system capacity.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct LimitsConfig {
    /// Maximum accepted upload body size in bytes. Uploads are fully buffered
    /// in memory, so this also bounds per-request memory usage.
    pub max_upload_bytes: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_upload_bytes: 50 * 1024 * 1024, // 50 MiB
        }
    }
}

impl Config {
    #[allow(clippy::result_large_err)]
    pub fn load(args: &Args) -> Result<Self, figment::Error> {
        let config: Self = Self::figment(args).extract()?;
        config.validate().map_err(|e| figment::Error::from(e.to_string()))?;
        Ok(config)
    }

    pub fn figment(args: &Args) -> Figment {
        Figment::new()
            // Load base config file
            .merge(Yaml::file(&args.config))
            // Environment variables can still override specific values
            .merge(Env::prefixed("ICEBOX_").split("__"))
    }

    /// Validate the configuration for consistency and required fields
    pub fn validate(&self) -> Result<(), Error> {
        if self.storage.bucket.is_empty() {
            return Err(Error::Internal {
                operation: "validate configuration: storage.bucket cannot be empty. Set ICEBOX_STORAGE__BUCKET or add storage.bucket to the config file."
                    .to_string(),
            });
        }

        if self.storage.region.is_empty() {
            return Err(Error::Internal {
                operation: "validate configuration: storage.region cannot be empty.".to_string(),
            });
        }

        if self.storage.transition_days < 1 {
            return Err(Error::Internal {
                operation: format!(
                    "validate configuration: storage.transition_days must be at least 1 (got {})",
                    self.storage.transition_days
                ),
            });
        }

        // Static credentials must come as a pair
        if self.storage.access_key_id.is_some() != self.storage.secret_access_key.is_some() {
            return Err(Error::Internal {
                operation: "validate configuration: storage.access_key_id and storage.secret_access_key must be set together.".to_string(),
            });
        }

        if self.limits.max_upload_bytes == 0 {
            return Err(Error::Internal {
                operation: "validate configuration: limits.max_upload_bytes cannot be 0.".to_string(),
            });
        }

        Ok(())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    fn test_args(path: &str) -> Args {
        Args {
            config: path.to_string(),
            validate: false,
        }
    }

    #[test]
    fn test_defaults() {
        Jail::expect_with(|_jail| {
            let config = Config::load(&test_args("missing.yaml")).expect("defaults should validate");

            assert_eq!(config.host, "127.0.0.1");
            assert_eq!(config.port, 5000);
            assert_eq!(config.storage.bucket, "icebox-uploads");
            assert_eq!(config.storage.region, "us-east-1");
            assert_eq!(config.storage.transition_days, 30);
            assert_eq!(config.storage.target_storage_class, TargetStorageClass::Glacier);
            Ok(())
        });
    }

    #[test]
    fn test_yaml_file_overrides_defaults() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "config.yaml",
                r#"
                port: 8080
                storage:
                  bucket: archive-bucket
                  region: eu-west-1
                  transition_days: 7
                  target_storage_class: deep_archive
                "#,
            )?;

            let config = Config::load(&test_args("config.yaml")).expect("config should load");

            assert_eq!(config.port, 8080);
            assert_eq!(config.storage.bucket, "archive-bucket");
            assert_eq!(config.storage.region, "eu-west-1");
            assert_eq!(config.storage.transition_days, 7);
            assert_eq!(config.storage.target_storage_class, TargetStorageClass::DeepArchive);
            Ok(())
        });
    }

    #[test]
    fn test_env_overrides_yaml() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "config.yaml",
                r#"
                port: 8080
                storage:
                  bucket: from-yaml
                "#,
            )?;
            jail.set_env("ICEBOX_PORT", "9090");
            jail.set_env("ICEBOX_STORAGE__BUCKET", "from-env");

            let config = Config::load(&test_args("config.yaml")).expect("config should load");

            assert_eq!(config.port, 9090);
            assert_eq!(config.storage.bucket, "from-env");
            Ok(())
        });
    }

    #[test]
    fn test_validation_error_message_reads_cleanly() {
        let mut config = Config::default();
        config.storage.bucket = String::new();

        let err = config.validate().unwrap_err();
        let message = err.to_string();

        assert!(message.starts_with("Failed to validate configuration:"), "got: {message}");
    }

    #[test]
    fn test_rejects_zero_transition_days() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "config.yaml",
                r#"
                storage:
                  transition_days: 0
                "#,
            )?;

            let result = Config::load(&test_args("config.yaml"));
            assert!(result.is_err());
            Ok(())
        });
    }

    #[test]
    fn test_rejects_half_configured_credentials() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "config.yaml",
                r#"
                storage:
                  access_key_id: AKIAEXAMPLE
                "#,
            )?;

            let result = Config::load(&test_args("config.yaml"));
            assert!(result.is_err());
            Ok(())
        });
    }

    #[test]
    fn test_rejects_empty_bucket() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "config.yaml",
                r#"
                storage:
                  bucket: ""
                "#,
            )?;

            let result = Config::load(&test_args("config.yaml"));
            assert!(result.is_err());
            Ok(())
        });
    }
}
