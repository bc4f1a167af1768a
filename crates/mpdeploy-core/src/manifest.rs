//! `pubspec.yaml` loading and version rewrite.
//!
//! The document is kept as a raw YAML mapping so that every key the tool
//! does not know about is written back unchanged and in its original order.
//! Comments and quoting style are not preserved.

use crate::error::{DeployError, Result};
use mpdeploy_schema::{Pubspec, ReleaseVersion};
use serde_yaml::{Mapping, Value};
use std::path::{Path, PathBuf};
use tokio::fs;

const VERSION_KEY: &str = "version";

/// A parsed `pubspec.yaml` bound to the path it came from.
#[derive(Debug, Clone)]
pub struct PubspecFile {
    path: PathBuf,
    document: Mapping,
}

impl PubspecFile {
    /// Read and parse the manifest at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`DeployError::ManifestIo`] if the file cannot be read and
    /// [`DeployError::ManifestParse`]/[`DeployError::ManifestShape`] if it is
    /// not a YAML mapping.
    pub async fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|source| DeployError::ManifestIo {
                path: path.to_path_buf(),
                source,
            })?;
        Self::parse(path, &content)
    }

    /// Parse manifest text that was read from `path`.
    ///
    /// # Errors
    ///
    /// See [`PubspecFile::load`].
    pub fn parse(path: &Path, content: &str) -> Result<Self> {
        let value: Value =
            serde_yaml::from_str(content).map_err(|source| DeployError::ManifestParse {
                path: path.to_path_buf(),
                source,
            })?;

        match value {
            Value::Mapping(document) => Ok(Self {
                path: path.to_path_buf(),
                document,
            }),
            _ => Err(DeployError::ManifestShape {
                path: path.to_path_buf(),
            }),
        }
    }

    /// Path the manifest is read from and saved to.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current `version` field, if it is a string.
    pub fn version(&self) -> Option<&str> {
        self.document.get(VERSION_KEY).and_then(Value::as_str)
    }

    /// Set `version`, keeping its position if the key already exists.
    pub fn set_version(&mut self, version: &ReleaseVersion) {
        self.document.insert(
            Value::String(VERSION_KEY.to_string()),
            Value::String(version.to_string()),
        );
    }

    /// Raw access to a top-level key.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.document.get(key)
    }

    /// Typed projection of the fields published to the index.
    ///
    /// # Errors
    ///
    /// Returns [`DeployError::ManifestParse`] if a projected field has the
    /// wrong type (e.g. `environment` is a list).
    pub fn pubspec(&self) -> Result<Pubspec> {
        serde_yaml::from_value(Value::Mapping(self.document.clone())).map_err(|source| {
            DeployError::ManifestParse {
                path: self.path.clone(),
                source,
            }
        })
    }

    /// Serialise the document back to YAML text.
    ///
    /// # Errors
    ///
    /// Returns [`DeployError::ManifestParse`] if serialisation fails.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(&self.document).map_err(|source| DeployError::ManifestParse {
            path: self.path.clone(),
            source,
        })
    }

    /// Overwrite the manifest on disk.
    ///
    /// Written to a sibling temp file first and renamed into place.
    ///
    /// # Errors
    ///
    /// Returns [`DeployError::ManifestIo`] if writing or renaming fails.
    pub async fn save(&self) -> Result<()> {
        let content = self.to_yaml()?;
        let io_err = |source| DeployError::ManifestIo {
            path: self.path.clone(),
            source,
        };

        let temp_path = self.path.with_extension("yaml.tmp");
        fs::write(&temp_path, &content).await.map_err(io_err)?;
        fs::rename(&temp_path, &self.path).await.map_err(io_err)?;

        Ok(())
    }
}

/// Load the manifest at `path`, set its version and persist it.
///
/// # Errors
///
/// Any error from [`PubspecFile::load`] or [`PubspecFile::save`].
pub async fn rewrite_version(path: &Path, version: &ReleaseVersion) -> Result<PubspecFile> {
    let mut manifest = PubspecFile::load(path).await?;
    let previous = manifest.version().map(str::to_string);
    manifest.set_version(version);
    manifest.save().await?;

    tracing::debug!(
        "Rewrote {} version {} -> {version}",
        path.display(),
        previous.as_deref().unwrap_or("<unset>")
    );
    Ok(manifest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const PUBSPEC: &str = "\
name: mp_core
description: Core runtime
version: 0.0.1
environment:
  sdk: '>=2.12.0 <3.0.0'
  flutter: '>=1.17.0'
dependencies:
  flutter:
    sdk: flutter
";

    fn version(v: &str) -> ReleaseVersion {
        ReleaseVersion::new(v).unwrap()
    }

    #[tokio::test]
    async fn test_rewrite_preserves_other_keys() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("pubspec.yaml");
        std::fs::write(&path, PUBSPEC).unwrap();

        let manifest = rewrite_version(&path, &version("2.0.0")).await.unwrap();
        assert_eq!(manifest.version(), Some("2.0.0"));

        let on_disk = PubspecFile::load(&path).await.unwrap();
        assert_eq!(on_disk.version(), Some("2.0.0"));

        let original = PubspecFile::parse(&path, PUBSPEC).unwrap();
        let keys = |m: &PubspecFile| {
            m.document
                .keys()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect::<Vec<_>>()
        };
        assert_eq!(keys(&on_disk), keys(&original));
        for key in ["name", "description", "environment", "dependencies"] {
            assert_eq!(on_disk.get(key), original.get(key), "{key} changed");
        }

        // No temp file left behind in the package directory
        assert!(!dir.path().join("pubspec.yaml.tmp").exists());
    }

    #[tokio::test]
    async fn test_missing_version_is_added() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("pubspec.yaml");
        std::fs::write(&path, "name: foo\n").unwrap();

        rewrite_version(&path, &version("1.0.0")).await.unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("name: foo"));
        assert_eq!(
            PubspecFile::load(&path).await.unwrap().version(),
            Some("1.0.0")
        );
    }

    #[tokio::test]
    async fn test_missing_file_is_manifest_error() {
        let dir = TempDir::new().unwrap();
        let err = PubspecFile::load(&dir.path().join("pubspec.yaml"))
            .await
            .unwrap_err();
        assert!(matches!(err, DeployError::ManifestIo { .. }));
    }

    #[test]
    fn test_non_mapping_is_rejected() {
        let path = Path::new("pubspec.yaml");
        assert!(matches!(
            PubspecFile::parse(path, "- a\n- b\n"),
            Err(DeployError::ManifestShape { .. })
        ));
        assert!(matches!(
            PubspecFile::parse(path, "name: [unclosed"),
            Err(DeployError::ManifestParse { .. })
        ));
    }

    #[test]
    fn test_projection() {
        let manifest = PubspecFile::parse(Path::new("pubspec.yaml"), PUBSPEC).unwrap();
        let pubspec = manifest.pubspec().unwrap();
        assert_eq!(pubspec.description.as_deref(), Some("Core runtime"));
        let env = pubspec.environment.unwrap();
        assert_eq!(env.flutter.as_deref(), Some(">=1.17.0"));
        assert!(pubspec.dependencies.unwrap().contains_key("flutter"));
        assert!(pubspec.author.is_none());
    }
}
