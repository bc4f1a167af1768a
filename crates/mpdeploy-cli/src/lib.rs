//! mpdeploy - command-line surface.
//!
//! Inputs arrive the way a GitHub Actions step receives them: every
//! `with:` input is exported as `INPUT_<NAME>`, and the triggering ref as
//! `GITHUB_REF`. Each can also be passed as a flag for local runs.

use anyhow::{Context, Result, bail};
use clap::Parser;
use mpdeploy_core::{Credentials, DeployConfig, StoreConfig};
use mpdeploy_schema::{DEFAULT_PUBLIC_BASE_URL, ReleaseVersion};
use std::path::PathBuf;

/// Command-line arguments.
#[derive(Parser, Debug)]
#[command(name = "mpdeploy")]
#[command(author, version, about = "Publish a Dart package archive and update its package index", long_about = None)]
pub struct Cli {
    /// Storage credential id
    #[arg(long, env = "INPUT_SECRET_ID", hide_env_values = true)]
    pub secret_id: Option<String>,

    /// Storage credential secret
    #[arg(long, env = "INPUT_SECRET_KEY", hide_env_values = true)]
    pub secret_key: Option<String>,

    /// Bucket name
    #[arg(long, env = "INPUT_COS_BUCKET")]
    pub cos_bucket: Option<String>,

    /// Bucket region (e.g. ap-guangzhou)
    #[arg(long, env = "INPUT_COS_REGION")]
    pub cos_region: Option<String>,

    /// Package name; first segment of every bucket key
    #[arg(long, env = "INPUT_PACKAGE_NAME")]
    pub package_name: String,

    /// Local root of the package to publish
    #[arg(long, env = "INPUT_PACKAGE_PATH")]
    pub package_path: PathBuf,

    /// Git ref that triggered the run (refs/tags/<version>)
    #[arg(long, env = "GITHUB_REF")]
    pub git_ref: Option<String>,

    /// Explicit version; overrides --git-ref
    #[arg(long, env = "MPDEPLOY_RELEASE")]
    pub release: Option<String>,

    /// Storage endpoint (defaults to https://cos.<region>.myqcloud.com)
    #[arg(long, env = "MPDEPLOY_ENDPOINT")]
    pub endpoint: Option<String>,

    /// Upload through the COS acceleration endpoint
    #[arg(long, env = "MPDEPLOY_ACCELERATE", default_value_t = false)]
    pub accelerate: bool,

    /// Public host serving the bucket
    #[arg(long, env = "MPDEPLOY_PUBLIC_BASE_URL", default_value = DEFAULT_PUBLIC_BASE_URL)]
    pub public_base_url: String,

    /// Directory for the archive and the index copy (defaults to the OS temp dir)
    #[arg(long, env = "RUNNER_TEMP")]
    pub temp_dir: Option<PathBuf>,

    /// Dry run mode (don't touch the bucket)
    #[arg(long, env = "MPDEPLOY_DRY_RUN", default_value_t = false)]
    pub dry_run: bool,
}

fn present(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl Cli {
    /// Resolve the release version: `--release` first, then the git ref.
    ///
    /// # Errors
    ///
    /// Fails when neither is set or the value is not a usable version.
    pub fn release_version(&self) -> Result<ReleaseVersion> {
        if let Some(release) = present(self.release.clone()) {
            return ReleaseVersion::new(release).context("Invalid --release");
        }
        if let Some(git_ref) = present(self.git_ref.clone()) {
            return ReleaseVersion::from_git_ref(&git_ref)
                .with_context(|| format!("Cannot derive a version from ref {git_ref:?}"));
        }
        bail!("No release version: set GITHUB_REF or pass --release")
    }

    /// Turn the parsed arguments into the run configuration.
    ///
    /// # Errors
    ///
    /// Fails when the release cannot be resolved, when storage inputs are
    /// missing outside a dry run, or when validation rejects a field.
    pub fn into_config(self) -> Result<(DeployConfig, ReleaseVersion)> {
        let release = self.release_version()?;

        let mut config = DeployConfig::new(self.package_name, self.package_path);
        config.public_base_url = self.public_base_url;
        if let Some(temp_dir) = self.temp_dir.filter(|p| !p.as_os_str().is_empty()) {
            config.temp_dir = temp_dir;
        }

        if !self.dry_run {
            let inputs = [
                ("secret_id", present(self.secret_id)),
                ("secret_key", present(self.secret_key)),
                ("cos_bucket", present(self.cos_bucket)),
                ("cos_region", present(self.cos_region)),
            ];
            let missing: Vec<&str> = inputs
                .iter()
                .filter(|(_, v)| v.is_none())
                .map(|(name, _)| *name)
                .collect();
            if !missing.is_empty() {
                bail!("Missing required inputs: {}", missing.join(", "));
            }

            let [secret_id, secret_key, bucket, region] =
                inputs.map(|(_, v)| v.unwrap_or_default());
            config = config.with_store(StoreConfig {
                bucket,
                region,
                endpoint: present(self.endpoint),
                accelerate: self.accelerate,
                credentials: Credentials {
                    secret_id,
                    secret_key,
                },
            });
        }

        config.validate()?;
        Ok((config, release))
    }
}
