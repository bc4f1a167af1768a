//! The publish pipeline.
//!
//! RewriteManifest -> Archive -> Upload -> BuildEntry -> UpdateIndex.
//!
//! Each step is awaited before the next starts and any error aborts the
//! run. Nothing is rolled back: an archive uploaded before a failed index
//! update stays in the bucket, unlisted.

use crate::archive;
use crate::config::DeployConfig;
use crate::error::Result;
use crate::manifest::{self, PubspecFile};
use crate::store::ObjectStore;
use chrono::{DateTime, Utc};
use mpdeploy_schema::{
    PackageIndex, PublishedEntry, ReleaseVersion, Upsert, archive_key, archive_url, index_file_name,
    index_key,
};
use std::path::{Path, PathBuf};
use tokio::fs;

/// Publishes one package at one version.
#[derive(Debug)]
pub struct PackageDeployer {
    config: DeployConfig,
    release: ReleaseVersion,
    store: Option<ObjectStore>,
}

impl PackageDeployer {
    /// Create a deployer. A `None` store is a dry run.
    pub fn new(config: DeployConfig, release: ReleaseVersion, store: Option<ObjectStore>) -> Self {
        Self {
            config,
            release,
            store,
        }
    }

    /// Validate `config` and connect to the bucket it names (if any).
    ///
    /// # Errors
    ///
    /// Returns a config error, or a store error if the client cannot be
    /// built.
    pub fn connect(config: DeployConfig, release: ReleaseVersion) -> Result<Self> {
        config.validate()?;
        let store = config
            .store
            .as_ref()
            .map(ObjectStore::connect)
            .transpose()?;
        Ok(Self::new(config, release, store))
    }

    /// The version being published.
    pub fn release(&self) -> &ReleaseVersion {
        &self.release
    }

    /// The run configuration.
    pub fn config(&self) -> &DeployConfig {
        &self.config
    }

    fn name(&self) -> &str {
        &self.config.package_name
    }

    /// Run the whole pipeline.
    ///
    /// # Errors
    ///
    /// The first failing step's error. Index fetch problems are not errors.
    pub async fn deploy(&self) -> Result<()> {
        tracing::info!(
            "Publishing {} {}{}",
            self.name(),
            self.release,
            if self.store.is_none() { " (dry run)" } else { "" }
        );

        let manifest = self.rewrite_pubspec().await?;
        let archive = self.make_archive().await?;
        let url = self.upload_archive(&archive).await?;
        let entry = self.make_pubspec(&manifest, &url)?;

        if let Err(e) = self.update_package(&entry).await {
            if self.store.is_some() {
                tracing::error!(
                    "{} was uploaded but the index update failed; version {} is unlisted",
                    archive_key(self.name(), self.release.as_str()),
                    self.release
                );
            }
            return Err(e);
        }

        tracing::info!("Published {} {} -> {url}", self.name(), self.release);
        Ok(())
    }

    /// Step 1: set `version` in `{package_path}/pubspec.yaml` and save it.
    ///
    /// # Errors
    ///
    /// Manifest read, parse or write failure.
    pub async fn rewrite_pubspec(&self) -> Result<PubspecFile> {
        let path = self.config.pubspec_path();
        tracing::info!("Rewriting {} to version {}", path.display(), self.release);
        manifest::rewrite_version(&path, &self.release).await
    }

    /// Step 2: bundle the package directory into `{temp_dir}/{version}.tar.gz`.
    ///
    /// # Errors
    ///
    /// Archive creation failure.
    pub async fn make_archive(&self) -> Result<PathBuf> {
        let path = archive::make_archive(
            &self.config.package_path,
            &self.config.temp_dir,
            self.release.as_str(),
        )
        .await?;
        tracing::info!("Created archive {}", path.display());
        Ok(path)
    }

    /// Step 3: upload the archive and return its public URL.
    ///
    /// # Errors
    ///
    /// Reading the archive or the upload itself failed.
    pub async fn upload_archive(&self, archive: &Path) -> Result<String> {
        let key = archive_key(self.name(), self.release.as_str());
        let url = archive_url(
            &self.config.public_base_url,
            self.name(),
            self.release.as_str(),
        );

        let Some(store) = &self.store else {
            tracing::info!("Dry run: would upload {} to {key}", archive.display());
            return Ok(url);
        };

        let data = fs::read(archive).await?;
        tracing::info!("Uploading {key} ({} bytes)", data.len());
        store.put(&key, data).await?;
        Ok(url)
    }

    /// Step 4: build the index entry, stamped with the current time.
    ///
    /// # Errors
    ///
    /// A projected manifest field has the wrong type.
    pub fn make_pubspec(&self, manifest: &PubspecFile, archive_url: &str) -> Result<PublishedEntry> {
        self.make_pubspec_at(manifest, archive_url, Utc::now())
    }

    /// Step 4 with an explicit publish time.
    ///
    /// # Errors
    ///
    /// See [`PackageDeployer::make_pubspec`].
    pub fn make_pubspec_at(
        &self,
        manifest: &PubspecFile,
        archive_url: &str,
        published: DateTime<Utc>,
    ) -> Result<PublishedEntry> {
        let pubspec = manifest.pubspec()?;
        Ok(PublishedEntry::new(
            &pubspec,
            self.name(),
            &self.release,
            archive_url,
            published,
        ))
    }

    /// Step 5: merge `entry` into the remote index and write it back.
    ///
    /// A local copy is kept at `{temp_dir}/{name}.package.json`.
    ///
    /// # Errors
    ///
    /// Serialising, writing the local copy, or uploading the index failed.
    pub async fn update_package(&self, entry: &PublishedEntry) -> Result<Upsert> {
        let key = index_key(self.name());
        let mut index = self.fetch_existing_index(&key).await;

        let outcome = index.publish(self.name(), entry)?;
        match outcome {
            Upsert::Replaced { position } => {
                tracing::info!("Replaced {} at versions[{position}]", entry.version);
            }
            Upsert::Appended { position } => {
                tracing::info!("Appended {} at versions[{position}]", entry.version);
            }
        }
        if self.release.is_dev() {
            tracing::info!("{} is a dev build, latest left unchanged", self.release);
        }

        let index_json = index.to_vec()?;
        fs::create_dir_all(&self.config.temp_dir).await?;
        let local_path = self.config.temp_dir.join(index_file_name(self.name()));
        fs::write(&local_path, &index_json).await?;
        tracing::debug!("Wrote {}", local_path.display());

        let Some(store) = &self.store else {
            tracing::info!(
                "Dry run: would upload {key} ({} bytes)",
                index_json.len()
            );
            return Ok(outcome);
        };

        store.put(&key, index_json).await?;
        tracing::info!("Uploaded {key}");
        Ok(outcome)
    }

    /// Fetch the current index, falling back to `{}` on any problem.
    async fn fetch_existing_index(&self, key: &str) -> PackageIndex {
        let Some(store) = &self.store else {
            tracing::info!("Dry run: skipping index fetch, starting from an empty index");
            return PackageIndex::new();
        };

        match store.get(key).await {
            Ok(Some(data)) => match PackageIndex::from_slice(&data) {
                Ok(index) => {
                    tracing::info!(
                        "Loaded {key} with {} versions",
                        index.versions().len()
                    );
                    index
                }
                Err(e) => {
                    tracing::warn!("Existing {key} is malformed ({e}), starting fresh");
                    PackageIndex::new()
                }
            },
            Ok(None) => {
                tracing::info!("No existing {key}, starting fresh");
                PackageIndex::new()
            }
            Err(e) => {
                tracing::warn!("Failed to fetch {key} ({e}), starting fresh");
                PackageIndex::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opendal::Operator;
    use opendal::services::Memory;
    use serde_json::json;
    use tempfile::TempDir;

    struct Fixture {
        _pkg: TempDir,
        _tmp: TempDir,
        config: DeployConfig,
        store: ObjectStore,
    }

    fn fixture() -> Fixture {
        let pkg = TempDir::new().unwrap();
        let tmp = TempDir::new().unwrap();
        std::fs::write(
            pkg.path().join("pubspec.yaml"),
            "name: foo\nversion: 0.0.1\n",
        )
        .unwrap();

        let mut config = DeployConfig::new("foo", pkg.path());
        config.temp_dir = tmp.path().to_path_buf();
        let store = ObjectStore::from_operator(Operator::new(Memory::default()).unwrap().finish());

        Fixture {
            _pkg: pkg,
            _tmp: tmp,
            config,
            store,
        }
    }

    fn deployer(fx: &Fixture, version: &str) -> PackageDeployer {
        PackageDeployer::new(
            fx.config.clone(),
            ReleaseVersion::new(version).unwrap(),
            Some(fx.store.clone()),
        )
    }

    /// A real S3 client pointed at a port nothing listens on.
    fn unreachable_store() -> ObjectStore {
        ObjectStore::connect(&crate::config::StoreConfig {
            bucket: "dist-1250000000".to_string(),
            region: "ap-guangzhou".to_string(),
            endpoint: Some("http://127.0.0.1:1".to_string()),
            accelerate: false,
            credentials: crate::config::Credentials {
                secret_id: "AKID".to_string(),
                secret_key: "secret".to_string(),
            },
        })
        .unwrap()
    }

    async fn remote_index(fx: &Fixture) -> PackageIndex {
        let data = fx.store.get("/foo/package.json").await.unwrap().unwrap();
        PackageIndex::from_slice(&data).unwrap()
    }

    #[tokio::test]
    async fn test_upload_archive_returns_public_url() {
        let fx = fixture();
        let d = deployer(&fx, "1.2.3");
        let archive = d.make_archive().await.unwrap();

        let url = d.upload_archive(&archive).await.unwrap();
        assert_eq!(url, "https://dist.mpflutter.com/foo/versions/1.2.3.tar.gz");
        assert!(
            fx.store
                .get("/foo/versions/1.2.3.tar.gz")
                .await
                .unwrap()
                .is_some()
        );
    }

    #[tokio::test]
    async fn test_make_pubspec_uses_configured_name() {
        let fx = fixture();
        let d = deployer(&fx, "1.2.3");
        let manifest = d.rewrite_pubspec().await.unwrap();

        let entry = d.make_pubspec(&manifest, "https://example/x.tar.gz").unwrap();
        assert_eq!(entry.version, "1.2.3");
        assert_eq!(entry.pubspec.name, "foo");
        assert_eq!(entry.pubspec.author, "MPFlutter");
        assert_eq!(entry.archive_url, "https://example/x.tar.gz");
        assert!(entry.published.ends_with('Z'));
    }

    #[tokio::test]
    async fn test_malformed_remote_index_is_replaced() {
        let fx = fixture();
        fx.store
            .put("/foo/package.json", b"not json at all".to_vec())
            .await
            .unwrap();

        let d = deployer(&fx, "1.0.0");
        let manifest = d.rewrite_pubspec().await.unwrap();
        let entry = d.make_pubspec(&manifest, "u").unwrap();
        let outcome = d.update_package(&entry).await.unwrap();

        assert_eq!(outcome, Upsert::Appended { position: 0 });
        let index = remote_index(&fx).await;
        assert_eq!(index.name(), Some("foo"));
        assert_eq!(index.latest().unwrap()["version"], "1.0.0");
    }

    #[tokio::test]
    async fn test_republish_replaces_entry() {
        let fx = fixture();
        let existing = json!({
            "name": "foo",
            "latest": { "version": "1.0.0" },
            "versions": [{ "version": "1.0.0", "archive_url": "old" }]
        });
        fx.store
            .put("/foo/package.json", existing.to_string().into_bytes())
            .await
            .unwrap();

        deployer(&fx, "1.0.0").deploy().await.unwrap();
        let index = remote_index(&fx).await;
        assert_eq!(index.versions().len(), 1);
        assert_eq!(
            index.versions()[0]["archive_url"],
            "https://dist.mpflutter.com/foo/versions/1.0.0.tar.gz"
        );

        deployer(&fx, "1.1.0").deploy().await.unwrap();
        let index = remote_index(&fx).await;
        assert_eq!(index.versions().len(), 2);
        assert_eq!(index.versions()[0]["version"], "1.0.0");
        assert_eq!(index.latest().unwrap()["version"], "1.1.0");
    }

    #[tokio::test]
    async fn test_dev_build_keeps_latest() {
        let fx = fixture();
        deployer(&fx, "1.0.0").deploy().await.unwrap();
        deployer(&fx, mpdeploy_schema::DEV_VERSION)
            .deploy()
            .await
            .unwrap();

        let index = remote_index(&fx).await;
        assert_eq!(index.latest().unwrap()["version"], "1.0.0");
        assert_eq!(index.versions().len(), 2);
    }

    #[tokio::test]
    async fn test_dry_run_touches_nothing_remote() {
        let fx = fixture();
        let d = PackageDeployer::new(
            fx.config.clone(),
            ReleaseVersion::new("3.0.0").unwrap(),
            None,
        );
        d.deploy().await.unwrap();

        assert!(fx.store.get("/foo/package.json").await.unwrap().is_none());
        let local = std::fs::read(fx.config.temp_dir.join("foo.package.json")).unwrap();
        let index = PackageIndex::from_slice(&local).unwrap();
        assert_eq!(index.latest().unwrap()["version"], "3.0.0");
        assert!(fx.config.temp_dir.join("3.0.0.tar.gz").exists());
    }

    #[tokio::test]
    async fn test_manifest_error_aborts_before_upload() {
        let fx = fixture();
        std::fs::write(fx.config.pubspec_path(), "- not\n- a mapping\n").unwrap();

        let err = deployer(&fx, "1.0.0").deploy().await.unwrap_err();
        assert!(matches!(err, crate::DeployError::ManifestShape { .. }));
        assert!(
            fx.store
                .get("/foo/versions/1.0.0.tar.gz")
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_upload_failure_aborts_run() {
        let fx = fixture();
        let d = PackageDeployer::new(
            fx.config.clone(),
            ReleaseVersion::new("1.0.0").unwrap(),
            Some(unreachable_store()),
        );

        let err = d.deploy().await.unwrap_err();
        assert!(
            matches!(&err, crate::DeployError::Upload { key, .. } if key == "/foo/versions/1.0.0.tar.gz"),
            "{err:?}"
        );
        // Aborted before the index step
        assert!(!fx.config.temp_dir.join("foo.package.json").exists());
    }

    #[tokio::test]
    async fn test_fetch_failure_starts_from_empty_index() {
        let fx = fixture();
        let d = PackageDeployer::new(
            fx.config.clone(),
            ReleaseVersion::new("1.0.0").unwrap(),
            Some(unreachable_store()),
        );

        let index = d.fetch_existing_index("/foo/package.json").await;
        assert_eq!(index, PackageIndex::new());
    }
}
