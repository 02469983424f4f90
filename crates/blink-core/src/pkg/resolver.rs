//! The "name → latest version" boundary.

use super::error::PkgError;
use async_trait::async_trait;

/// Resolves a package name to its latest published version.
#[async_trait]
pub trait VersionResolver: Send + Sync {
    /// Return the concrete version currently tagged `latest`.
    ///
    /// # Errors
    /// Fails with a resolution error if the registry is unreachable or the
    /// name is unknown.
    async fn latest_version(&self, name: &str) -> Result<String, PkgError>;
}
