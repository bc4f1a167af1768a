//! Object store client for the distribution bucket.
//!
//! Tencent COS is reached through its S3-compatible API. Keys use the
//! `/{name}/...` form of [`mpdeploy_schema::layout`]; the leading slash is
//! stripped before it reaches the backend.

use crate::config::StoreConfig;
use crate::error::{DeployError, Result};
use opendal::{ErrorKind, Operator, services::S3};

/// Storage class for every object written by this tool.
pub const STORAGE_CLASS: &str = "STANDARD";

/// Thin wrapper over an [`Operator`] with the error mapping the deployer
/// needs.
#[derive(Debug, Clone)]
pub struct ObjectStore {
    op: Operator,
}

fn object_path(key: &str) -> &str {
    key.trim_start_matches('/')
}

impl ObjectStore {
    /// Connect to the bucket described by `config`.
    ///
    /// # Errors
    ///
    /// Returns [`DeployError::Store`] if the operator cannot be built.
    pub fn connect(config: &StoreConfig) -> Result<Self> {
        let mut builder = S3::default();
        builder.bucket(&config.bucket);
        builder.region(&config.region);
        builder.endpoint(&config.endpoint());
        builder.access_key_id(&config.credentials.secret_id);
        builder.secret_access_key(&config.credentials.secret_key);
        builder.default_storage_class(STORAGE_CLASS);
        // COS only serves bucket-in-host requests; custom endpoints may be
        // bare IPs, which cannot take a bucket prefix
        if config.virtual_host_style() {
            builder.enable_virtual_host_style();
        }
        // Never pick up ~/.aws or AWS_* from the runner
        builder.disable_config_load();

        let op = Operator::new(builder).map_err(DeployError::Store)?.finish();
        Ok(Self { op })
    }

    /// Wrap an existing operator (e.g. the in-memory backend).
    pub fn from_operator(op: Operator) -> Self {
        Self { op }
    }

    /// The underlying operator.
    pub fn operator(&self) -> &Operator {
        &self.op
    }

    /// Write `data` at `key`, replacing any existing object.
    ///
    /// # Errors
    ///
    /// Returns [`DeployError::Upload`] if the write fails.
    pub async fn put(&self, key: &str, data: Vec<u8>) -> Result<()> {
        let size = data.len();
        self.op
            .write(object_path(key), data)
            .await
            .map_err(|source| DeployError::Upload {
                key: key.to_string(),
                source,
            })?;
        tracing::debug!("Uploaded {key} ({size} bytes)");
        Ok(())
    }

    /// Read the object at `key`. A missing object is `Ok(None)`.
    ///
    /// # Errors
    ///
    /// Returns the backend error for anything other than "not found".
    pub async fn get(&self, key: &str) -> std::result::Result<Option<Vec<u8>>, opendal::Error> {
        match self.op.read(object_path(key)).await {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }
}
