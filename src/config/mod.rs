use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::extract::{ExtractOptions, FULL_LOAD_CHUNK_SIZE};
use crate::source::Source;
use crate::storage::{FilesystemStorage, S3Storage, StorageGateway};

const ENV_PREFIX: &str = "LAKELOADER";

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub storage: StorageConfig,
    #[serde(default)]
    pub extract: ExtractConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    #[serde(rename = "type")]
    pub database_type: String,
    #[serde(default = "default_host")]
    pub host: String,
    /// Defaults to 5432 for postgres and 3306 for mysql
    pub port: Option<u16>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub database: Option<String>,
    /// Only extract this schema (postgres). Ignored for mysql.
    pub schema: Option<String>,
}

fn default_host() -> String {
    "localhost".to_string()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    #[serde(rename = "type", default = "default_storage_type")]
    pub storage_type: String,
    pub endpoint: Option<String>,
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
    #[serde(default)]
    pub secure: bool,
    #[serde(default = "default_region")]
    pub region: String,
    pub bucket: Option<String>,
    /// Landing directory for filesystem storage
    pub base_dir: Option<String>,
}

fn default_storage_type() -> String {
    "s3".to_string()
}

fn default_region() -> String {
    "us-east-1".to_string()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExtractConfig {
    /// Maximum rows per object in a full load
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    /// Prefix object paths with the database name (postgres only)
    #[serde(default)]
    pub include_database_in_path: bool,
}

fn default_chunk_size() -> usize {
    FULL_LOAD_CHUNK_SIZE
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            include_database_in_path: false,
        }
    }
}

fn environment() -> config::Environment {
    // Example: LAKELOADER_DATABASE__HOST=db.internal
    config::Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
}

impl AppConfig {
    /// Load configuration from an optional file overlaid with environment variables
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        Self::from_sources(config_path, environment())
    }

    fn from_sources(config_path: Option<&str>, env: config::Environment) -> Result<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = config_path {
            builder = builder.add_source(config::File::with_name(path));
        }
        builder = builder.add_source(env);

        let config = builder.build().context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        match self.database.database_type.as_str() {
            "postgres" | "mysql" => {
                let kind = &self.database.database_type;
                if self.database.user.is_none() {
                    anyhow::bail!("{kind} database requires 'user'");
                }
                if self.database.password.is_none() {
                    anyhow::bail!("{kind} database requires 'password'");
                }
                if self.database.database.is_none() {
                    anyhow::bail!("{kind} database requires 'database'");
                }
            }
            _ => anyhow::bail!("Invalid database type: {}", self.database.database_type),
        }

        match self.storage.storage_type.as_str() {
            "s3" => {
                if self.storage.endpoint.is_none() {
                    anyhow::bail!("S3 storage requires 'endpoint'");
                }
                if self.storage.bucket.is_none() {
                    anyhow::bail!("S3 storage requires 'bucket'");
                }
                if self.storage.access_key.is_none() || self.storage.secret_key.is_none() {
                    anyhow::bail!("S3 storage requires 'access_key' and 'secret_key'");
                }
            }
            "filesystem" => {
                if self.storage.base_dir.is_none() {
                    anyhow::bail!("Filesystem storage requires 'base_dir'");
                }
                if self.storage.bucket.is_none() {
                    anyhow::bail!("Filesystem storage requires 'bucket'");
                }
            }
            _ => anyhow::bail!("Invalid storage type: {}", self.storage.storage_type),
        }

        if self.extract.chunk_size == 0 {
            anyhow::bail!("extract.chunk_size must be greater than 0");
        }

        Ok(())
    }

    pub fn extract_options(&self) -> Result<ExtractOptions> {
        let source = self.database.to_source()?;
        Ok(ExtractOptions {
            schema_filter: source.schema_filter().map(str::to_string),
            include_database_in_path: self.extract.include_database_in_path,
        })
    }
}

fn required<'a>(value: &'a Option<String>, name: &str) -> Result<&'a str> {
    value
        .as_deref()
        .with_context(|| format!("Missing configuration value '{name}'"))
}

impl DatabaseConfig {
    pub fn to_source(&self) -> Result<Source> {
        let user = required(&self.user, "database.user")?.to_string();
        let password = required(&self.password, "database.password")?.to_string();
        let database = required(&self.database, "database.database")?.to_string();
        let host = self.host.clone();

        match self.database_type.as_str() {
            "postgres" => Ok(Source::Postgres {
                host,
                port: self.port.unwrap_or(5432),
                user,
                password,
                database,
                schema: self.schema.clone(),
            }),
            "mysql" => Ok(Source::Mysql {
                host,
                port: self.port.unwrap_or(3306),
                user,
                password,
                database,
            }),
            other => anyhow::bail!("Invalid database type: {other}"),
        }
    }
}

impl StorageConfig {
    /// Build the gateway for the configured bucket.
    pub fn build_gateway(&self) -> Result<Arc<dyn StorageGateway>> {
        let bucket = required(&self.bucket, "storage.bucket")?;

        match self.storage_type.as_str() {
            "s3" => {
                let storage = S3Storage::new_with_endpoint(
                    bucket,
                    required(&self.endpoint, "storage.endpoint")?,
                    required(&self.access_key, "storage.access_key")?,
                    required(&self.secret_key, "storage.secret_key")?,
                    &self.region,
                    self.secure,
                )?;
                Ok(Arc::new(storage))
            }
            "filesystem" => {
                let base_dir = required(&self.base_dir, "storage.base_dir")?;
                Ok(Arc::new(FilesystemStorage::new(base_dir, bucket)))
            }
            other => anyhow::bail!("Invalid storage type: {other}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const POSTGRES_MINIO: &str = r#"
[database]
type = "postgres"
host = "db.internal"
user = "etl"
password = "secret"
database = "dvdrental"

[storage]
endpoint = "localhost:9000"
access_key = "minioadmin"
secret_key = "minioadmin"
bucket = "landing"
"#;

    fn no_env() -> config::Environment {
        environment().source(Some(HashMap::new()))
    }

    fn env(vars: &[(&str, &str)]) -> config::Environment {
        let map = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        environment().source(Some(map))
    }

    fn config_file(contents: &str) -> NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_file_with_defaults() {
        let file = config_file(POSTGRES_MINIO);
        let config = AppConfig::from_sources(file.path().to_str(), no_env()).unwrap();

        config.validate().unwrap();
        assert_eq!(config.storage.storage_type, "s3");
        assert_eq!(config.storage.region, "us-east-1");
        assert!(!config.storage.secure);
        assert_eq!(config.extract.chunk_size, FULL_LOAD_CHUNK_SIZE);
        assert!(!config.extract.include_database_in_path);

        let source = config.database.to_source().unwrap();
        assert_eq!(source.source_type(), "postgres");
        assert!(matches!(source, Source::Postgres { port: 5432, .. }));
    }

    #[test]
    fn test_env_overrides_file() {
        let file = config_file(POSTGRES_MINIO);
        let config = AppConfig::from_sources(
            file.path().to_str(),
            env(&[
                ("LAKELOADER_DATABASE__HOST", "replica.internal"),
                ("LAKELOADER_EXTRACT__CHUNK_SIZE", "500"),
                ("LAKELOADER_STORAGE__SECURE", "true"),
            ]),
        )
        .unwrap();

        assert_eq!(config.database.host, "replica.internal");
        assert_eq!(config.extract.chunk_size, 500);
        assert!(config.storage.secure);
    }

    #[test]
    fn test_env_only_mysql() {
        let config = AppConfig::from_sources(
            None,
            env(&[
                ("LAKELOADER_DATABASE__TYPE", "mysql"),
                ("LAKELOADER_DATABASE__USER", "etl"),
                ("LAKELOADER_DATABASE__PASSWORD", "secret"),
                ("LAKELOADER_DATABASE__DATABASE", "shop"),
                ("LAKELOADER_STORAGE__TYPE", "filesystem"),
                ("LAKELOADER_STORAGE__BASE_DIR", "/tmp/landing"),
                ("LAKELOADER_STORAGE__BUCKET", "raw"),
            ]),
        )
        .unwrap();

        config.validate().unwrap();
        let source = config.database.to_source().unwrap();
        assert!(matches!(source, Source::Mysql { port: 3306, .. }));
        assert_eq!(
            config.extract_options().unwrap().schema_filter.as_deref(),
            Some("shop")
        );
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let file = config_file(POSTGRES_MINIO);
        let base = AppConfig::from_sources(file.path().to_str(), no_env()).unwrap();

        let mut config = base.clone();
        config.database.database_type = "oracle".into();
        assert!(config.validate().is_err());

        let mut config = base.clone();
        config.storage.bucket = None;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("bucket"));

        let mut config = base.clone();
        config.storage.secret_key = None;
        assert!(config.validate().is_err());

        let mut config = base.clone();
        config.storage.storage_type = "filesystem".into();
        assert!(config.validate().is_err(), "filesystem needs base_dir");

        let mut config = base;
        config.extract.chunk_size = 0;
        assert!(config.validate().is_err());
    }

    #[tokio::test]
    async fn test_build_filesystem_gateway() {
        let dir = tempfile::TempDir::new().unwrap();
        let storage = StorageConfig {
            storage_type: "filesystem".into(),
            endpoint: None,
            access_key: None,
            secret_key: None,
            secure: false,
            region: default_region(),
            bucket: Some("raw".into()),
            base_dir: dir.path().to_str().map(str::to_string),
        };

        let gateway = storage.build_gateway().unwrap();
        assert_eq!(gateway.bucket(), "raw");
        assert!(gateway.list_objects("sales/").await.unwrap().is_empty());
    }
}
