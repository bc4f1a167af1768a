//! Object-key and URL layout of the distribution bucket.
//!
//! Layout: `/{name}/versions/{version}.tar.gz` - one archive per version.
//! Layout: `/{name}/package.json` - the package index document.
//!
//! Downstream tools construct these URLs themselves, so the shapes here are
//! part of the external contract.

/// Public host that serves the distribution bucket.
pub const DEFAULT_PUBLIC_BASE_URL: &str = "https://dist.mpflutter.com";

/// File extension of published archives (tar + gzip).
pub const ARCHIVE_EXTENSION: &str = "tar.gz";

/// Name of the manifest file inside a package directory.
pub const PUBSPEC_FILE: &str = "pubspec.yaml";

/// `{version}.tar.gz`
pub fn archive_file_name(version: &str) -> String {
    format!("{version}.{ARCHIVE_EXTENSION}")
}

/// Bucket key of a version's archive: `/{name}/versions/{version}.tar.gz`.
pub fn archive_key(name: &str, version: &str) -> String {
    format!("/{name}/versions/{}", archive_file_name(version))
}

/// Bucket key of the package index: `/{name}/package.json`.
pub fn index_key(name: &str) -> String {
    format!("/{name}/package.json")
}

/// Local file name used for the downloaded/updated index copy.
pub fn index_file_name(name: &str) -> String {
    format!("{name}.package.json")
}

/// Public download URL of a version's archive.
///
/// Returns: `{base}/{name}/versions/{version}.tar.gz`
pub fn archive_url(base: &str, name: &str, version: &str) -> String {
    format!(
        "{}{}",
        base.trim_end_matches('/'),
        archive_key(name, version)
    )
}
