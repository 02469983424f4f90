//! `package.json` lookup and entry-point resolution.

use super::error::PkgError;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

pub const MANIFEST_FILE: &str = "package.json";

/// The fields of `package.json` the tool reads.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct PackageManifest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub main: Option<String>,
    #[serde(default)]
    pub dependencies: BTreeMap<String, String>,
}

impl PackageManifest {
    /// Declared `main`, ignoring blank values.
    #[must_use]
    pub fn main(&self) -> Option<&str> {
        self.main.as_deref().map(str::trim).filter(|m| !m.is_empty())
    }

    #[must_use]
    pub fn has_dependencies(&self) -> bool {
        !self.dependencies.is_empty()
    }
}

/// Find the nearest directory at or above `start` that contains `package.json`.
#[must_use]
pub fn find_package_root(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .find(|dir| dir.join(MANIFEST_FILE).is_file())
        .map(Path::to_path_buf)
}

/// Read and parse `<dir>/package.json`.
///
/// # Errors
/// Returns an error if the file cannot be read or is not valid JSON.
pub fn read_manifest(dir: &Path) -> Result<PackageManifest, PkgError> {
    let path = dir.join(MANIFEST_FILE);
    let content = fs::read_to_string(&path)
        .map_err(|e| PkgError::manifest_invalid(format!("Cannot read {}: {e}", path.display())))?;
    serde_json::from_str(&content)
        .map_err(|e| PkgError::manifest_invalid(format!("Invalid {}: {e}", path.display())))
}

/// Resolve the entry point of the package rooted at or above `root`.
///
/// Returns `Ok(None)` when no manifest is found or it declares no `main`.
///
/// # Errors
/// Returns an error if a manifest exists but cannot be parsed.
pub fn entry_point(root: &Path) -> Result<Option<PathBuf>, PkgError> {
    let Some(package_root) = find_package_root(root) else {
        return Ok(None);
    };
    let manifest = read_manifest(&package_root)?;
    Ok(manifest
        .main()
        .map(|main| normalize_entry(&package_root.join(main))))
}

/// Make an entry path absolute and normalized for the host platform.
///
/// `dunce` strips the `\\?\` prefix on Windows; separators are then unified
/// to `/` so the path is safe to embed in a JSON payload for node.
#[must_use]
pub fn normalize_entry(path: &Path) -> PathBuf {
    let resolved = dunce::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
    if cfg!(windows) {
        PathBuf::from(resolved.to_string_lossy().replace('\\', "/"))
    } else {
        resolved
    }
}
