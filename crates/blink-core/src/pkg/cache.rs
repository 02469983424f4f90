//! Cache path math.
//!
//! Every cached package lives at
//! `<cache_root>/node_modules/_<sanitized>@<version>@<name>`, where `sanitized`
//! is the name with path separators replaced by `_`. The sanitized prefix keeps
//! the top-level entry flat; the trailing raw name keeps `a/b` and `a_b` apart.
//! For scoped names the trailing `@scope/name` nests one level below that
//! unique entry, matching the npminstall store layout.

use std::path::{Path, PathBuf};

/// Directory under the cache root that holds store entries.
pub const STORE_DIR: &str = "node_modules";

/// Directory under the cache root that holds install lock files.
pub const LOCKS_DIR: &str = ".locks";

/// Replace every path separator in `name` with `_`.
#[must_use]
pub fn sanitize_name(name: &str) -> String {
    name.replace(['/', '\\'], "_")
}

/// The store directory for a cache root.
#[must_use]
pub fn store_dir(cache_root: &Path) -> PathBuf {
    cache_root.join(STORE_DIR)
}

/// The store entry id for one package version.
#[must_use]
pub fn store_entry_name(name: &str, version: &str) -> String {
    format!("_{}@{version}@{name}", sanitize_name(name))
}

/// Canonical cache path of `name@version` under `cache_root`.
///
/// Pure: no I/O, identical inputs always give identical output.
#[must_use]
pub fn locate(cache_root: &Path, name: &str, version: &str) -> PathBuf {
    store_dir(cache_root).join(store_entry_name(name, version))
}

/// Whether `name@version` has a store entry on disk.
#[must_use]
pub fn is_cached(cache_root: &Path, name: &str, version: &str) -> bool {
    locate(cache_root, name, version).is_dir()
}

/// List `(name, version)` pairs present in a store.
///
/// Entries that do not follow the naming scheme are ignored.
#[must_use]
pub fn list_cached(cache_root: &Path) -> Vec<(String, String)> {
    let Ok(entries) = std::fs::read_dir(store_dir(cache_root)) else {
        return Vec::new();
    };

    let mut result: Vec<(String, String)> = entries
        .flatten()
        .filter_map(|entry| {
            let file_name = entry.file_name();
            let id = file_name.to_string_lossy();
            let (sanitized, rest) = id.strip_prefix('_')?.split_once('@')?;
            // Scoped sanitized names start with '@'; re-split past it.
            let (sanitized, rest) = if sanitized.is_empty() {
                let (s, r) = rest.split_once('@')?;
                (format!("@{s}"), r)
            } else {
                (sanitized.to_string(), rest)
            };
            let (version, name_head) = rest.split_once('@')?;
            if sanitized.starts_with('@') {
                // `_@scope_pkg@1.0.0@@scope` holds a `pkg` directory.
                let scope = format!("@{}", name_head.trim_start_matches('@'));
                let pkg = std::fs::read_dir(entry.path())
                    .ok()?
                    .flatten()
                    .find(|e| e.path().is_dir())?;
                let name = format!("{scope}/{}", pkg.file_name().to_string_lossy());
                (sanitize_name(&name) == sanitized).then(|| (name, version.to_string()))
            } else {
                entry
                    .path()
                    .is_dir()
                    .then(|| (name_head.to_string(), version.to_string()))
            }
        })
        .collect();

    result.sort();
    result
}
