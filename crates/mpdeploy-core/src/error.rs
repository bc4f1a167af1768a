//! Domain-specific errors for a publish run

use mpdeploy_schema::{IndexError, ReleaseError};
use std::path::PathBuf;
use thiserror::Error;

/// Everything that can abort a deploy.
///
/// A failed index *fetch* is not represented here: it is recovered by
/// starting from an empty index.
#[derive(Error, Debug)]
pub enum DeployError {
    /// The configuration is incomplete or inconsistent.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// The release version could not be derived.
    #[error("Invalid release version: {0}")]
    Release(#[from] ReleaseError),

    /// `pubspec.yaml` could not be read or written.
    #[error("Failed to access manifest {}", .path.display())]
    ManifestIo {
        /// Manifest path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// `pubspec.yaml` is not valid YAML, or its fields have the wrong shape.
    #[error("Failed to parse manifest {}", .path.display())]
    ManifestParse {
        /// Manifest path.
        path: PathBuf,
        /// Underlying YAML error.
        #[source]
        source: serde_yaml::Error,
    },

    /// `pubspec.yaml` parsed, but its top level is not a mapping.
    #[error("Manifest {} is not a YAML mapping", .path.display())]
    ManifestShape {
        /// Manifest path.
        path: PathBuf,
    },

    /// Bundling the package directory failed.
    #[error("Failed to create archive {}", .path.display())]
    Archive {
        /// Destination archive path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The object store client could not be constructed.
    #[error("Failed to initialize object store")]
    Store(#[source] opendal::Error),

    /// A `put` to the object store failed.
    #[error("Failed to upload {key}")]
    Upload {
        /// Bucket key that was being written.
        key: String,
        /// Underlying storage error.
        #[source]
        source: opendal::Error,
    },

    /// The updated index could not be serialised.
    #[error("Failed to encode package index")]
    Index(#[from] IndexError),

    /// A local file (archive, index copy) could not be read or written.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience alias used throughout the crate.
pub type Result<T, E = DeployError> = std::result::Result<T, E>;
