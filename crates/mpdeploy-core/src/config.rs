//! Run configuration.
//!
//! A [`DeployConfig`] is built once at startup (by the CLI, from CI inputs)
//! and handed to the deployer by value.

use crate::error::{DeployError, Result};
use mpdeploy_schema::{DEFAULT_PUBLIC_BASE_URL, PUBSPEC_FILE};
use std::fmt;
use std::path::PathBuf;

/// Global COS transfer-acceleration endpoint.
pub const ACCELERATE_ENDPOINT: &str = "https://cos.accelerate.myqcloud.com";

/// Storage credentials. `Debug` never prints the secret.
#[derive(Clone)]
pub struct Credentials {
    /// Access key id (`SecretId` in COS terms).
    pub secret_id: String,
    /// Secret access key (`SecretKey` in COS terms).
    pub secret_key: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("secret_id", &self.secret_id)
            .field("secret_key", &"<redacted>")
            .finish()
    }
}

/// Location of the distribution bucket.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Bucket name (COS buckets carry the app id, e.g. `dist-1250000000`).
    pub bucket: String,
    /// Region, e.g. `ap-guangzhou`.
    pub region: String,
    /// Endpoint override. Defaults to the regional COS endpoint.
    pub endpoint: Option<String>,
    /// Use the COS acceleration endpoint instead of the regional one.
    /// Ignored when `endpoint` is set.
    pub accelerate: bool,
    /// Access credentials.
    pub credentials: Credentials,
}

impl StoreConfig {
    /// The S3-compatible endpoint to talk to.
    ///
    /// Returns: `https://cos.{region}.myqcloud.com` unless overridden.
    pub fn endpoint(&self) -> String {
        match &self.endpoint {
            Some(endpoint) => endpoint.clone(),
            None if self.accelerate => ACCELERATE_ENDPOINT.to_string(),
            None => format!("https://cos.{}.myqcloud.com", self.region),
        }
    }

    /// Whether the bucket goes in the host name (`{bucket}.cos...`).
    ///
    /// True for the COS endpoints. An overridden endpoint (MinIO, a local
    /// gateway, an IP address) is addressed path-style.
    pub fn virtual_host_style(&self) -> bool {
        self.endpoint.is_none()
    }
}

/// Everything a single publish needs.
#[derive(Debug, Clone)]
pub struct DeployConfig {
    /// Package identifier; also the first segment of every bucket key.
    pub package_name: String,
    /// Local root of the package to publish.
    pub package_path: PathBuf,
    /// Public host serving the bucket.
    pub public_base_url: String,
    /// Where the archive and the index copy are written.
    pub temp_dir: PathBuf,
    /// Bucket configuration; `None` means dry run.
    pub store: Option<StoreConfig>,
}

impl DeployConfig {
    /// A config for `package_name` at `package_path` with default URL and
    /// temp dir, in dry-run mode until [`DeployConfig::with_store`] is called.
    pub fn new(package_name: impl Into<String>, package_path: impl Into<PathBuf>) -> Self {
        Self {
            package_name: package_name.into(),
            package_path: package_path.into(),
            public_base_url: DEFAULT_PUBLIC_BASE_URL.to_string(),
            temp_dir: std::env::temp_dir(),
            store: None,
        }
    }

    /// Attach bucket configuration.
    pub fn with_store(mut self, store: StoreConfig) -> Self {
        self.store = Some(store);
        self
    }

    /// Whether remote calls are skipped.
    pub fn is_dry_run(&self) -> bool {
        self.store.is_none()
    }

    /// `{package_path}/pubspec.yaml`
    pub fn pubspec_path(&self) -> PathBuf {
        self.package_path.join(PUBSPEC_FILE)
    }

    /// Check the fields that end up in keys, URLs and requests.
    ///
    /// # Errors
    ///
    /// Returns [`DeployError::Config`] naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        let name = self.package_name.trim();
        if name.is_empty() {
            return Err(DeployError::Config("package_name is empty".to_string()));
        }
        if name.contains('/') || name.contains('\\') {
            return Err(DeployError::Config(format!(
                "package_name {name:?} must not contain path separators"
            )));
        }
        if self.package_path.as_os_str().is_empty() {
            return Err(DeployError::Config("package_path is empty".to_string()));
        }
        if !self.public_base_url.starts_with("http") {
            return Err(DeployError::Config(format!(
                "public_base_url {:?} must start with http(s)",
                self.public_base_url
            )));
        }

        if let Some(store) = &self.store {
            for (field, value) in [
                ("cos_bucket", &store.bucket),
                ("cos_region", &store.region),
                ("secret_id", &store.credentials.secret_id),
                ("secret_key", &store.credentials.secret_key),
            ] {
                if value.trim().is_empty() {
                    return Err(DeployError::Config(format!("{field} is empty")));
                }
            }
            if let Some(endpoint) = &store.endpoint {
                validate_endpoint(endpoint)?;
            }
        }

        Ok(())
    }
}

fn validate_endpoint(endpoint: &str) -> Result<()> {
    let host = endpoint
        .strip_prefix("https://")
        .or_else(|| endpoint.strip_prefix("http://"))
        .map(|rest| rest.split('/').next().unwrap_or_default());
    match host {
        Some(host) if !host.is_empty() && !host.contains(char::is_whitespace) => Ok(()),
        _ => Err(DeployError::Config(format!(
            "endpoint {endpoint:?} must be an http(s) URL with a host"
        ))),
    }
}
