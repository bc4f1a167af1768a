//! Package directory -> `{version}.tar.gz`.
//!
//! Entries are stored relative to the package root (`lib/foo.dart`, not
//! `./lib/foo.dart` or an absolute path), matching what `tar -czf x *` run
//! inside the package directory would produce.

use crate::error::{DeployError, Result};
use flate2::Compression;
use flate2::write::GzEncoder;
use mpdeploy_schema::archive_file_name;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Bundle `src_dir` into a gzip-compressed tarball at `dest_archive`.
///
/// Symlinks are stored as links rather than followed. If `dest_archive`
/// lies inside `src_dir` it is skipped. Returns the number of regular
/// files written.
///
/// # Errors
///
/// Returns an I/O error if the tree cannot be walked or the archive cannot
/// be written.
pub fn bundle_directory(src_dir: &Path, dest_archive: &Path) -> std::io::Result<usize> {
    let file = File::create(dest_archive)?;
    let writer = BufWriter::new(file);
    let encoder = GzEncoder::new(writer, Compression::default());
    let mut tar_builder = tar::Builder::new(encoder);
    tar_builder.follow_symlinks(false);

    let mut files = 0;
    for entry in WalkDir::new(src_dir)
        .min_depth(1)
        .follow_links(false)
        .sort_by_file_name()
    {
        let entry = entry?;
        let path = entry.path();
        if path == dest_archive {
            continue;
        }
        let rel = path
            .strip_prefix(src_dir)
            .map_err(std::io::Error::other)?;

        if entry.file_type().is_dir() {
            tar_builder.append_dir(rel, path)?;
        } else {
            tar_builder.append_path_with_name(path, rel)?;
            if entry.file_type().is_file() {
                files += 1;
            }
        }
    }

    let encoder = tar_builder.into_inner()?;
    let mut writer = encoder.finish()?;
    writer.flush()?;

    Ok(files)
}

/// Archive `package_path` into `{temp_dir}/{version}.tar.gz`.
///
/// Runs on the blocking pool; the returned path is absolute.
///
/// # Errors
///
/// Returns [`DeployError::Archive`] if bundling fails.
pub async fn make_archive(package_path: &Path, temp_dir: &Path, version: &str) -> Result<PathBuf> {
    tokio::fs::create_dir_all(temp_dir).await?;
    let src_dir = tokio::fs::canonicalize(package_path).await?;
    let dest = tokio::fs::canonicalize(temp_dir)
        .await?
        .join(archive_file_name(version));

    let task_src = src_dir.clone();
    let task_dest = dest.clone();
    let files = tokio::task::spawn_blocking(move || bundle_directory(&task_src, &task_dest))
        .await
        .map_err(std::io::Error::other)
        .and_then(|r| r)
        .map_err(|source| DeployError::Archive {
            path: dest.clone(),
            source,
        })?;

    tracing::debug!(
        "Archived {files} files from {} into {}",
        src_dir.display(),
        dest.display()
    );
    Ok(dest)
}
