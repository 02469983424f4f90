//! The install primitive.
//!
//! [`Installer`] is the boundary the store calls to materialize packages;
//! [`RegistryInstaller`] fetches tarballs from an npm registry and publishes
//! them into the store atomically.

use super::cache;
use super::error::PkgError;
use super::manifest::read_manifest;
use super::registry::{get_tarball_url, RegistryClient};
use super::tarball::{download_tarball, stage_tgz, StagedPackage, MAX_TARBALL_SIZE};
use crate::process::{ProcessRunner, SpawnOptions, StdioMode};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

/// Client timeout for installer requests; tarball downloads set their own.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// One package to install at a concrete version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallTarget {
    pub name: String,
    pub version: String,
}

impl InstallTarget {
    #[must_use]
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }
}

/// Materializes packages into a cache store.
#[async_trait]
pub trait Installer: Send + Sync {
    /// Install every target under `root`, with entries placed in `store_dir`.
    ///
    /// On success each target exists at its cache path.
    ///
    /// # Errors
    /// Fails with an install-kind error; nothing partial is left at the cache path.
    async fn install_into(
        &self,
        root: &Path,
        store_dir: &Path,
        registry: &Url,
        pkgs: &[InstallTarget],
    ) -> Result<(), PkgError>;
}

/// Installs packages straight from an npm registry.
#[derive(Debug, Clone)]
pub struct RegistryInstaller {
    /// Run `npm install` for packages that declare dependencies.
    install_deps: bool,
    npm: String,
}

impl Default for RegistryInstaller {
    fn default() -> Self {
        Self::new(true)
    }
}

impl RegistryInstaller {
    #[must_use]
    pub fn new(install_deps: bool) -> Self {
        Self {
            install_deps,
            npm: "npm".to_string(),
        }
    }

    async fn install_one(
        &self,
        client: &RegistryClient,
        root: &Path,
        store_dir: &Path,
        target: &InstallTarget,
    ) -> Result<PathBuf, PkgError> {
        let dest = cache::locate(root, &target.name, &target.version);
        if dest.is_dir() {
            debug!(path = %dest.display(), "Already installed");
            return Ok(dest);
        }

        let packument = client.fetch_packument(&target.name).await?;
        let tarball_url = get_tarball_url(&packument, &target.version).ok_or_else(|| {
            PkgError::not_found(&format!("{}@{}", target.name, target.version))
        })?;

        debug!(url = %tarball_url, "Downloading tarball");
        let bytes = download_tarball(client.http(), tarball_url, MAX_TARBALL_SIZE).await?;

        let store = store_dir.to_path_buf();
        let staged = tokio::task::spawn_blocking(move || stage_tgz(&bytes, &store))
            .await
            .map_err(|e| PkgError::extract_failed(format!("Extract task failed: {e}")))??;

        if self.install_deps {
            self.install_dependencies(&staged, client.base_url()).await?;
        }

        staged.commit(&dest)?;
        info!(name = %target.name, version = %target.version, "Installed package");
        Ok(dest)
    }

    async fn install_dependencies(
        &self,
        staged: &StagedPackage,
        registry: &Url,
    ) -> Result<(), PkgError> {
        let manifest = read_manifest(staged.package_dir())?;
        if !manifest.has_dependencies() {
            return Ok(());
        }

        debug!(
            count = manifest.dependencies.len(),
            "Installing package dependencies"
        );
        let args: Vec<String> = [
            "install",
            "--omit=dev",
            "--no-package-lock",
            "--registry",
            registry.as_str(),
        ]
        .into_iter()
        .map(String::from)
        .collect();
        let opts = SpawnOptions::new()
            .cwd(staged.package_dir())
            .stdio(StdioMode::Null);

        let code = ProcessRunner::new()
            .run_to_completion(&self.npm, &args, &opts)
            .await
            .map_err(|e| PkgError::install_failed(e.to_string()))?;
        if code == 0 {
            Ok(())
        } else {
            Err(PkgError::install_failed(format!(
                "`{} install` exited with code {code}",
                self.npm
            )))
        }
    }
}

#[async_trait]
impl Installer for RegistryInstaller {
    async fn install_into(
        &self,
        root: &Path,
        store_dir: &Path,
        registry: &Url,
        pkgs: &[InstallTarget],
    ) -> Result<(), PkgError> {
        let client = RegistryClient::with_timeout(registry.as_str(), REQUEST_TIMEOUT)?;
        for target in pkgs {
            self.install_one(&client, root, store_dir, target)
                .await
                .map_err(|e| match e.kind() {
                    super::error::PkgErrorKind::Install => e,
                    _ => PkgError::install_failed(format!(
                        "Installing {}@{} failed: {e}",
                        target.name, target.version
                    )),
                })?;
        }
        Ok(())
    }
}
