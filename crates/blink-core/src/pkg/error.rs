//! Package engine error types.

use std::fmt;
use std::io;
use std::path::Path;

/// Package engine error codes.
pub mod codes {
    // Resolution
    pub const PKG_SPEC_INVALID: &str = "PKG_SPEC_INVALID";
    pub const PKG_NOT_FOUND: &str = "PKG_NOT_FOUND";
    pub const PKG_REGISTRY_ERROR: &str = "PKG_REGISTRY_ERROR";

    // Install
    pub const PKG_DOWNLOAD_FAILED: &str = "PKG_DOWNLOAD_FAILED";
    pub const PKG_EXTRACT_FAILED: &str = "PKG_EXTRACT_FAILED";
    pub const PKG_INSTALL_FAILED: &str = "PKG_INSTALL_FAILED";
    pub const PKG_INSTALL_TIMEOUT: &str = "PKG_INSTALL_TIMEOUT";
    pub const PKG_LOCK_FAILED: &str = "PKG_LOCK_FAILED";

    // Entry point
    pub const PKG_NO_ENTRY_POINT: &str = "PKG_NO_ENTRY_POINT";

    // Cache / manifest
    pub const PKG_CACHE_ERROR: &str = "PKG_CACHE_ERROR";
    pub const PKG_MANIFEST_INVALID: &str = "PKG_MANIFEST_INVALID";
    pub const PKG_VERSION_NOT_PINNED: &str = "PKG_VERSION_NOT_PINNED";
}

/// Which stage of the package lifecycle failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PkgErrorKind {
    /// Name or version could not be resolved.
    Resolution,
    /// The install primitive failed.
    Install,
    /// The manifest is missing or declares no main file.
    NoEntryPoint,
    /// Local filesystem trouble around the cache.
    Cache,
}

/// Package engine error.
#[derive(Debug)]
pub struct PkgError {
    code: &'static str,
    message: String,
}

impl PkgError {
    /// Create a new error with the given code and message.
    #[must_use]
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Get the error code.
    #[must_use]
    pub fn code(&self) -> &'static str {
        self.code
    }

    /// Get the error message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    #[must_use]
    pub fn kind(&self) -> PkgErrorKind {
        match self.code {
            codes::PKG_SPEC_INVALID | codes::PKG_NOT_FOUND | codes::PKG_REGISTRY_ERROR => {
                PkgErrorKind::Resolution
            }
            codes::PKG_DOWNLOAD_FAILED
            | codes::PKG_EXTRACT_FAILED
            | codes::PKG_INSTALL_FAILED
            | codes::PKG_INSTALL_TIMEOUT
            | codes::PKG_LOCK_FAILED => PkgErrorKind::Install,
            codes::PKG_NO_ENTRY_POINT => PkgErrorKind::NoEntryPoint,
            _ => PkgErrorKind::Cache,
        }
    }

    pub fn spec_invalid(msg: impl Into<String>) -> Self {
        Self::new(codes::PKG_SPEC_INVALID, msg)
    }

    #[must_use]
    pub fn not_found(name: &str) -> Self {
        Self::new(codes::PKG_NOT_FOUND, format!("Package not found: {name}"))
    }

    pub fn registry(msg: impl Into<String>) -> Self {
        Self::new(codes::PKG_REGISTRY_ERROR, msg)
    }

    pub fn download_failed(msg: impl Into<String>) -> Self {
        Self::new(codes::PKG_DOWNLOAD_FAILED, msg)
    }

    pub fn extract_failed(msg: impl Into<String>) -> Self {
        Self::new(codes::PKG_EXTRACT_FAILED, msg)
    }

    pub fn install_failed(msg: impl Into<String>) -> Self {
        Self::new(codes::PKG_INSTALL_FAILED, msg)
    }

    #[must_use]
    pub fn install_timeout(name: &str, version: &str, secs: u64) -> Self {
        Self::new(
            codes::PKG_INSTALL_TIMEOUT,
            format!("Installing {name}@{version} did not finish within {secs}s"),
        )
    }

    pub fn lock_failed(msg: impl Into<String>) -> Self {
        Self::new(codes::PKG_LOCK_FAILED, msg)
    }

    #[must_use]
    pub fn no_entry_point(package_dir: &Path) -> Self {
        Self::new(
            codes::PKG_NO_ENTRY_POINT,
            format!(
                "No entry point: package.json missing or has no \"main\" under {}",
                package_dir.display()
            ),
        )
    }

    pub fn cache_error(msg: impl Into<String>) -> Self {
        Self::new(codes::PKG_CACHE_ERROR, msg)
    }

    pub fn manifest_invalid(msg: impl Into<String>) -> Self {
        Self::new(codes::PKG_MANIFEST_INVALID, msg)
    }

    #[must_use]
    pub fn version_not_pinned(name: &str) -> Self {
        Self::new(
            codes::PKG_VERSION_NOT_PINNED,
            format!("Version of {name} has not been resolved yet"),
        )
    }
}

impl fmt::Display for PkgError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for PkgError {}

impl From<io::Error> for PkgError {
    fn from(e: io::Error) -> Self {
        Self::new(codes::PKG_CACHE_ERROR, e.to_string())
    }
}

impl From<reqwest::Error> for PkgError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::new(codes::PKG_REGISTRY_ERROR, format!("Request timed out: {e}"))
        } else if e.is_connect() {
            Self::new(codes::PKG_REGISTRY_ERROR, format!("Connection failed: {e}"))
        } else {
            Self::new(codes::PKG_REGISTRY_ERROR, e.to_string())
        }
    }
}

impl From<serde_json::Error> for PkgError {
    fn from(e: serde_json::Error) -> Self {
        Self::new(codes::PKG_REGISTRY_ERROR, format!("Invalid JSON: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_format() {
        let err = PkgError::spec_invalid("bad spec");
        assert_eq!(err.code(), codes::PKG_SPEC_INVALID);
        assert!(err.to_string().contains(codes::PKG_SPEC_INVALID));
    }

    #[test]
    fn test_kinds() {
        assert_eq!(PkgError::not_found("x").kind(), PkgErrorKind::Resolution);
        assert_eq!(PkgError::registry("x").kind(), PkgErrorKind::Resolution);
        assert_eq!(PkgError::download_failed("x").kind(), PkgErrorKind::Install);
        assert_eq!(
            PkgError::install_timeout("x", "1.0.0", 5).kind(),
            PkgErrorKind::Install
        );
        assert_eq!(
            PkgError::no_entry_point(Path::new("/p")).kind(),
            PkgErrorKind::NoEntryPoint
        );
        assert_eq!(PkgError::cache_error("x").kind(), PkgErrorKind::Cache);
    }

    #[test]
    fn test_error_codes_uppercase() {
        let all_codes = [
            codes::PKG_SPEC_INVALID,
            codes::PKG_NOT_FOUND,
            codes::PKG_REGISTRY_ERROR,
            codes::PKG_DOWNLOAD_FAILED,
            codes::PKG_EXTRACT_FAILED,
            codes::PKG_INSTALL_FAILED,
            codes::PKG_INSTALL_TIMEOUT,
            codes::PKG_LOCK_FAILED,
            codes::PKG_NO_ENTRY_POINT,
            codes::PKG_CACHE_ERROR,
            codes::PKG_MANIFEST_INVALID,
            codes::PKG_VERSION_NOT_PINNED,
        ];

        for code in all_codes {
            assert!(
                code.chars().all(|c| c.is_uppercase() || c == '_'),
                "Error code '{code}' should be SCREAMING_SNAKE_CASE"
            );
        }
    }
}
