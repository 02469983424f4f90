//! Tarball download and staged extraction.
//!
//! A package is first extracted into a hidden temp directory inside the
//! store (same filesystem as the final entry), optionally prepared there,
//! and only then renamed into its cache path. A half-written entry is never
//! visible under the canonical name.

use super::error::PkgError;
use bytes::Bytes;
use flate2::read::GzDecoder;
use reqwest::Client;
use std::fs::{self, File};
use std::io;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;
use tar::Archive;
use tracing::{debug, warn};

/// Maximum tarball size (200 MB).
pub const MAX_TARBALL_SIZE: u64 = 200 * 1024 * 1024;

/// Download timeout in seconds.
const DOWNLOAD_TIMEOUT_SECS: u64 = 60;

/// Prefix of staging directories inside a store.
pub const STAGE_PREFIX: &str = ".tmp-";

/// Download a tarball from a URL.
///
/// # Errors
/// Returns an error if the download fails or exceeds the size limit.
pub async fn download_tarball(client: &Client, url: &str, max_bytes: u64) -> Result<Bytes, PkgError> {
    let response = client
        .get(url)
        .timeout(Duration::from_secs(DOWNLOAD_TIMEOUT_SECS))
        .send()
        .await
        .map_err(|e| PkgError::download_failed(format!("Failed to download '{url}': {e}")))?;

    if !response.status().is_success() {
        return Err(PkgError::download_failed(format!(
            "Download failed with status {} for '{url}'",
            response.status()
        )));
    }

    if let Some(len) = response.content_length() {
        if len > max_bytes {
            return Err(PkgError::download_failed(format!(
                "Tarball too large: {len} bytes (max: {max_bytes})"
            )));
        }
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| PkgError::download_failed(format!("Failed to read response body: {e}")))?;

    if bytes.len() as u64 > max_bytes {
        return Err(PkgError::download_failed(format!(
            "Tarball too large: {} bytes (max: {max_bytes})",
            bytes.len()
        )));
    }

    debug!(url, bytes = bytes.len(), "Downloaded tarball");
    Ok(bytes)
}

/// An extracted package waiting to be published into the store.
///
/// Dropping it without calling [`StagedPackage::commit`] removes the staging
/// directory.
#[derive(Debug)]
pub struct StagedPackage {
    temp_dir: PathBuf,
    package_dir: PathBuf,
}

impl StagedPackage {
    /// Directory holding the extracted package contents.
    #[must_use]
    pub fn package_dir(&self) -> &Path {
        &self.package_dir
    }

    /// Move the staged package to `dest`.
    ///
    /// If `dest` already exists (another process won the race) the staged
    /// copy is discarded and this succeeds.
    ///
    /// # Errors
    /// Returns an error if the package can be neither renamed nor copied.
    pub fn commit(self, dest: &Path) -> Result<(), PkgError> {
        if dest.exists() {
            return Ok(());
        }
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }

        match fs::rename(&self.package_dir, dest) {
            Ok(()) => Ok(()),
            Err(_) if dest.exists() => Ok(()),
            Err(rename_err) => {
                // Cross-device stores fall back to a copy.
                blink_util::fs::copy_dir_all(&self.package_dir, dest).map_err(|copy_err| {
                    let _ = fs::remove_dir_all(dest);
                    PkgError::extract_failed(format!(
                        "Failed to move or copy extracted package: rename={rename_err}, copy={copy_err}"
                    ))
                })?;
                Ok(())
            }
        }
    }
}

impl Drop for StagedPackage {
    fn drop(&mut self) {
        if self.temp_dir.exists() {
            if let Err(e) = fs::remove_dir_all(&self.temp_dir) {
                warn!(path = %self.temp_dir.display(), "Failed to remove staging dir: {e}");
            }
        }
    }
}

/// Extract a gzipped tarball into a fresh staging directory under `store_dir`.
///
/// npm tarballs carry a single top-level directory (usually `package/`); the
/// returned [`StagedPackage`] points at it.
///
/// # Errors
/// Returns an error if the tarball is invalid or contains unsafe paths.
pub fn stage_tgz(bytes: &[u8], store_dir: &Path) -> Result<StagedPackage, PkgError> {
    fs::create_dir_all(store_dir)?;

    let temp_dir = store_dir.join(format!(
        "{STAGE_PREFIX}{}-{}",
        std::process::id(),
        rand_u32()
    ));
    if temp_dir.exists() {
        let _ = fs::remove_dir_all(&temp_dir);
    }
    fs::create_dir_all(&temp_dir)?;

    let mut staged = StagedPackage {
        package_dir: temp_dir.clone(),
        temp_dir,
    };
    extract_tgz_to(bytes, &staged.temp_dir)?;
    staged.package_dir = find_extracted_root(&staged.temp_dir)?;
    Ok(staged)
}

fn find_extracted_root(temp_dir: &Path) -> Result<PathBuf, PkgError> {
    let package_dir = temp_dir.join("package");
    if package_dir.is_dir() {
        return Ok(package_dir);
    }

    let entries: Vec<_> = fs::read_dir(temp_dir)
        .map_err(|e| PkgError::extract_failed(format!("Failed to read extracted dir: {e}")))?
        .filter_map(Result::ok)
        .filter(|e| {
            e.file_type().is_ok_and(|ft| ft.is_dir())
                && !e.file_name().to_string_lossy().starts_with('.')
        })
        .collect();

    match entries.as_slice() {
        [only] => Ok(only.path()),
        [] => Err(PkgError::extract_failed(
            "Tarball does not contain any top-level directory",
        )),
        many => Err(PkgError::extract_failed(format!(
            "Tarball contains {} top-level directories, expected 1",
            many.len()
        ))),
    }
}

fn extract_tgz_to(bytes: &[u8], dest: &Path) -> Result<(), PkgError> {
    let mut archive = Archive::new(GzDecoder::new(bytes));

    for entry in archive
        .entries()
        .map_err(|e| PkgError::extract_failed(format!("Failed to read tarball entries: {e}")))?
    {
        let mut entry = entry
            .map_err(|e| PkgError::extract_failed(format!("Failed to read tarball entry: {e}")))?;

        let path = entry
            .path()
            .map_err(|e| PkgError::extract_failed(format!("Failed to read entry path: {e}")))?
            .into_owned();

        if path.is_absolute()
            || path
                .components()
                .any(|c| matches!(c, Component::ParentDir | Component::Prefix(_)))
        {
            return Err(PkgError::extract_failed(format!(
                "Tarball entry escapes destination: {}",
                path.display()
            )));
        }

        let dest_path = dest.join(&path);
        if let Some(parent) = dest_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let entry_type = entry.header().entry_type();
        if entry_type.is_dir() {
            fs::create_dir_all(&dest_path)?;
        } else if entry_type.is_file() {
            let mut file = File::create(&dest_path)?;
            io::copy(&mut entry, &mut file)?;

            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                if let Ok(mode) = entry.header().mode() {
                    let _ = fs::set_permissions(&dest_path, fs::Permissions::from_mode(mode));
                }
            }
        }
        // Links and special entries are skipped.
    }

    Ok(())
}

#[allow(clippy::cast_possible_truncation)]
fn rand_u32() -> u32 {
    use std::collections::hash_map::RandomState;
    use std::hash::{BuildHasher, Hasher};

    let mut hasher = RandomState::new().build_hasher();
    hasher.write_u64(
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0),
    );
    hasher.finish() as u32
}

#[cfg(test)]
pub(crate) mod test_support {
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;
    use tar::Builder;

    /// Build a `.tgz` with the given `(path, contents)` entries.
    pub fn make_tgz(files: &[(&str, &[u8])]) -> Vec<u8> {
        let mut tar_bytes = Vec::new();
        {
            let mut builder = Builder::new(&mut tar_bytes);
            for (path, data) in files {
                let mut header = tar::Header::new_gnu();
                header.set_path(path).unwrap();
                header.set_size(data.len() as u64);
                header.set_mode(0o644);
                header.set_cksum();
                builder.append(&header, *data).unwrap();
            }
            builder.finish().unwrap();
        }

        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&tar_bytes).unwrap();
        encoder.finish().unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::make_tgz;
    use super::*;
    use tempfile::tempdir;

    fn demo_tgz() -> Vec<u8> {
        make_tgz(&[
            ("package/package.json", br#"{"name":"demo","version":"1.0.0","main":"index.js"}"#),
            ("package/index.js", b"module.exports = () => {};"),
            ("package/template/README.md", b"# {{ name }}"),
        ])
    }

    fn staging_dirs(store: &Path) -> usize {
        fs::read_dir(store)
            .unwrap()
            .flatten()
            .filter(|e| e.file_name().to_string_lossy().starts_with(STAGE_PREFIX))
            .count()
    }

    #[test]
    fn test_stage_then_commit() {
        let dir = tempdir().unwrap();
        let store = dir.path().join("node_modules");
        let dest = store.join("_demo@1.0.0@demo");

        let staged = stage_tgz(&demo_tgz(), &store).unwrap();
        assert!(staged.package_dir().join("package.json").exists());
        assert!(!dest.exists());

        staged.commit(&dest).unwrap();
        assert!(dest.join("index.js").exists());
        assert!(dest.join("template").join("README.md").exists());
        assert_eq!(staging_dirs(&store), 0);
    }

    #[test]
    fn test_commit_creates_scoped_parent() {
        let dir = tempdir().unwrap();
        let store = dir.path().join("node_modules");
        let dest = store.join("_@blink-cli_init@1.0.0@@blink-cli").join("init");

        stage_tgz(&demo_tgz(), &store).unwrap().commit(&dest).unwrap();
        assert!(dest.join("package.json").exists());
    }

    #[test]
    fn test_dropped_stage_leaves_nothing() {
        let dir = tempdir().unwrap();
        let store = dir.path().join("node_modules");

        let staged = stage_tgz(&demo_tgz(), &store).unwrap();
        assert_eq!(staging_dirs(&store), 1);
        drop(staged);
        assert_eq!(staging_dirs(&store), 0);
    }

    #[test]
    fn test_commit_when_destination_exists() {
        let dir = tempdir().unwrap();
        let store = dir.path().join("node_modules");
        let dest = store.join("_demo@1.0.0@demo");
        fs::create_dir_all(&dest).unwrap();
        fs::write(dest.join("marker"), "first").unwrap();

        stage_tgz(&demo_tgz(), &store).unwrap().commit(&dest).unwrap();
        assert_eq!(fs::read_to_string(dest.join("marker")).unwrap(), "first");
        assert_eq!(staging_dirs(&store), 0);
    }

    #[test]
    fn test_non_package_prefix() {
        let tgz = make_tgz(&[("node/index.d.ts", b"export {};")]);
        let dir = tempdir().unwrap();
        let staged = stage_tgz(&tgz, dir.path()).unwrap();
        assert!(staged.package_dir().join("index.d.ts").exists());
    }

    #[test]
    fn test_reject_empty_tarball() {
        let tgz = make_tgz(&[]);
        let dir = tempdir().unwrap();
        let err = stage_tgz(&tgz, dir.path()).unwrap_err();
        assert_eq!(err.code(), super::super::error::codes::PKG_EXTRACT_FAILED);
        assert_eq!(staging_dirs(dir.path()), 0);
    }

    #[test]
    fn test_reject_garbage() {
        let dir = tempdir().unwrap();
        assert!(stage_tgz(b"not a tarball", dir.path()).is_err());
        assert_eq!(staging_dirs(dir.path()), 0);
    }
}
