//! Lifecycle of one package: existence check, install, update, entry point.

use super::cache;
use super::error::PkgError;
use super::install::{InstallTarget, Installer, RegistryInstaller};
use super::lock::CacheLock;
use super::manifest;
use super::registry::RegistryClient;
use super::resolver::VersionResolver;
use super::spec::{check_version, PackageSpec, VersionReq, LATEST};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

/// Where a package lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PackageLocation {
    /// A developer-specified directory. Never installed or updated.
    Local(PathBuf),
    /// A versioned entry inside a shared cache.
    Cached { cache_root: PathBuf },
}

/// One requested package and its on-disk state.
///
/// The concrete version is resolved at most once per store and reused by
/// every later call; only `update()` looks the latest version up again.
pub struct PackageStore {
    location: PackageLocation,
    spec: PackageSpec,
    registry: Url,
    resolver: Arc<dyn VersionResolver>,
    installer: Arc<dyn Installer>,
    install_timeout: Duration,
    pinned: Option<String>,
}

impl std::fmt::Debug for PackageStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PackageStore")
            .field("location", &self.location)
            .field("spec", &self.spec)
            .field("registry", &self.registry.as_str())
            .field("pinned", &self.pinned)
            .finish_non_exhaustive()
    }
}

impl PackageStore {
    #[must_use]
    pub fn new(
        location: PackageLocation,
        spec: PackageSpec,
        registry: Url,
        resolver: Arc<dyn VersionResolver>,
        installer: Arc<dyn Installer>,
    ) -> Self {
        Self {
            location,
            spec,
            registry,
            resolver,
            installer,
            install_timeout: Duration::from_secs(crate::config::DEFAULT_INSTALL_TIMEOUT_SECS),
            pinned: None,
        }
    }

    #[must_use]
    pub fn with_install_timeout(mut self, timeout: Duration) -> Self {
        self.install_timeout = timeout;
        self
    }

    #[must_use]
    pub fn spec(&self) -> &PackageSpec {
        &self.spec
    }

    #[must_use]
    pub fn is_local(&self) -> bool {
        matches!(self.location, PackageLocation::Local(_))
    }

    /// The resolved version, once known.
    #[must_use]
    pub fn pinned_version(&self) -> Option<&str> {
        self.pinned.as_deref()
    }

    /// Whether the package is present.
    ///
    /// Local packages only check their directory and never consult the registry.
    pub async fn exists(&mut self) -> Result<bool, PkgError> {
        if let PackageLocation::Local(path) = &self.location {
            return Ok(path.exists());
        }
        self.pin().await?;
        Ok(self.cache_path()?.is_dir())
    }

    /// Install the pinned version into the cache. No-op for local packages.
    pub async fn install(&mut self) -> Result<(), PkgError> {
        if self.is_local() {
            return Ok(());
        }
        let version = self.pin().await?;
        self.install_version(&version).await
    }

    /// Move a `latest` request to the newest published version.
    ///
    /// Pinned requests and local packages are left untouched, so they never
    /// reach the registry here.
    pub async fn update(&mut self) -> Result<(), PkgError> {
        if self.is_local() || !self.spec.version.is_latest() {
            return Ok(());
        }

        let latest = self.resolve_latest().await?;
        let cache_root = self.cache_root()?;
        if cache::is_cached(cache_root, &self.spec.name, &latest) {
            debug!(name = %self.spec.name, version = %latest, "Already up to date");
        } else {
            info!(name = %self.spec.name, version = %latest, "Updating package");
            self.install_version(&latest).await?;
        }
        self.pinned = Some(latest);
        Ok(())
    }

    /// `exists()` then `update()`, or `install()` when absent. No-op for local packages.
    pub async fn ensure_installed(&mut self) -> Result<(), PkgError> {
        if self.is_local() {
            return Ok(());
        }
        if self.exists().await? {
            self.update().await
        } else {
            self.install().await
        }
    }

    /// Cache path of the pinned version.
    ///
    /// # Errors
    /// Fails for local packages and before the version is pinned.
    pub fn cache_path(&self) -> Result<PathBuf, PkgError> {
        let cache_root = self.cache_root()?;
        let version = self
            .pinned
            .as_deref()
            .ok_or_else(|| PkgError::version_not_pinned(&self.spec.name))?;
        Ok(cache::locate(cache_root, &self.spec.name, version))
    }

    /// Directory the package's files live in.
    pub fn package_dir(&self) -> Result<PathBuf, PkgError> {
        match &self.location {
            PackageLocation::Local(path) => Ok(path.clone()),
            PackageLocation::Cached { .. } => self.cache_path(),
        }
    }

    /// Absolute path of the manifest's `main`, or `None` if it declares none.
    pub fn entry_point(&self) -> Result<Option<PathBuf>, PkgError> {
        manifest::entry_point(&self.package_dir()?)
    }

    fn cache_root(&self) -> Result<&Path, PkgError> {
        match &self.location {
            PackageLocation::Cached { cache_root } => Ok(cache_root),
            PackageLocation::Local(path) => Err(PkgError::cache_error(format!(
                "{} is a local package at {}",
                self.spec.name,
                path.display()
            ))),
        }
    }

    async fn pin(&mut self) -> Result<String, PkgError> {
        if let Some(version) = &self.pinned {
            return Ok(version.clone());
        }
        let version = match &self.spec.version {
            VersionReq::Exact(v) => v.clone(),
            VersionReq::Latest => self.resolve_latest().await?,
        };
        debug!(name = %self.spec.name, %version, "Pinned version");
        self.pinned = Some(version.clone());
        Ok(version)
    }

    async fn resolve_latest(&self) -> Result<String, PkgError> {
        let version = self.resolver.latest_version(&self.spec.name).await?;
        let version = version.trim();
        if version.is_empty() || version == LATEST {
            return Err(PkgError::registry(format!(
                "Registry returned no concrete latest version for {}",
                self.spec.name
            )));
        }
        check_version(version).map_err(|msg| {
            PkgError::registry(format!("Registry latest for {}: {msg}", self.spec.name))
        })?;
        Ok(version.to_string())
    }

    async fn install_version(&self, version: &str) -> Result<(), PkgError> {
        let cache_root = self.cache_root()?;
        let store_dir = cache::store_dir(cache_root);
        tokio::fs::create_dir_all(&store_dir).await?;

        let entry = cache::store_entry_name(&self.spec.name, version);
        let _lock = CacheLock::acquire(cache_root, &entry).await?;

        let dest = cache::locate(cache_root, &self.spec.name, version);
        if dest.is_dir() {
            debug!(path = %dest.display(), "Installed by another process");
            return Ok(());
        }

        let targets = [InstallTarget::new(&self.spec.name, version)];
        let install = self
            .installer
            .install_into(cache_root, &store_dir, &self.registry, &targets);
        tokio::time::timeout(self.install_timeout, install)
            .await
            .map_err(|_| {
                PkgError::install_timeout(&self.spec.name, version, self.install_timeout.as_secs())
            })??;

        if !dest.is_dir() {
            return Err(PkgError::install_failed(format!(
                "Installer reported success but {} is missing",
                dest.display()
            )));
        }
        Ok(())
    }
}

/// Shared registry, resolver and installer for building stores.
#[derive(Clone)]
pub struct StoreFactory {
    registry: Url,
    resolver: Arc<dyn VersionResolver>,
    installer: Arc<dyn Installer>,
    install_timeout: Duration,
}

impl StoreFactory {
    #[must_use]
    pub fn new(
        registry: Url,
        resolver: Arc<dyn VersionResolver>,
        installer: Arc<dyn Installer>,
    ) -> Self {
        Self {
            registry,
            resolver,
            installer,
            install_timeout: Duration::from_secs(crate::config::DEFAULT_INSTALL_TIMEOUT_SECS),
        }
    }

    /// Real registry client and installer as configured.
    ///
    /// # Errors
    /// Returns an error if the registry URL is invalid.
    pub fn from_config(config: &crate::Config) -> Result<Self, PkgError> {
        let client = RegistryClient::new(&config.registry)?;
        let registry = client.base_url().clone();
        Ok(Self::new(
            registry,
            Arc::new(client),
            Arc::new(RegistryInstaller::new(config.install_package_deps)),
        )
        .with_install_timeout(config.install_timeout()))
    }

    #[must_use]
    pub fn with_install_timeout(mut self, timeout: Duration) -> Self {
        self.install_timeout = timeout;
        self
    }

    #[must_use]
    pub fn store(&self, location: PackageLocation, spec: PackageSpec) -> PackageStore {
        PackageStore::new(
            location,
            spec,
            self.registry.clone(),
            self.resolver.clone(),
            self.installer.clone(),
        )
        .with_install_timeout(self.install_timeout)
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use tempfile::tempdir;

    const MANIFEST: &str = r#"{"name":"demo-template","version":"1.2.0","main":"index.js"}"#;

    fn cached_store(
        root: &Path,
        spec: &str,
        resolver: &Arc<MockResolver>,
        installer: &Arc<MockInstaller>,
    ) -> PackageStore {
        PackageStore::new(
            PackageLocation::Cached {
                cache_root: root.to_path_buf(),
            },
            PackageSpec::parse(spec).unwrap(),
            registry(),
            resolver.clone(),
            installer.clone(),
        )
    }

    #[tokio::test]
    async fn test_fresh_install_then_entry_point() {
        let dir = tempdir().unwrap();
        let resolver = MockResolver::new("1.2.0");
        let installer = MockInstaller::new(MANIFEST);
        let mut store = cached_store(dir.path(), "demo-template@latest", &resolver, &installer);

        assert!(!store.exists().await.unwrap());
        store.install().await.unwrap();
        assert!(store.exists().await.unwrap());

        let entry = store.entry_point().unwrap().unwrap();
        assert!(entry.ends_with("index.js"));
        assert!(entry.starts_with(
            dunce::canonicalize(cache::locate(dir.path(), "demo-template", "1.2.0")).unwrap()
        ));
        assert_eq!(installer.calls(), 1);
        // Pinned once for the whole chain.
        assert_eq!(resolver.calls(), 1);
    }

    #[tokio::test]
    async fn test_update_when_current_installs_nothing() {
        let dir = tempdir().unwrap();
        let resolver = MockResolver::new("1.2.0");
        let installer = MockInstaller::new(MANIFEST);
        cached_store(dir.path(), "demo-template", &resolver, &installer)
            .install()
            .await
            .unwrap();
        assert_eq!(installer.calls(), 1);

        let mut store = cached_store(dir.path(), "demo-template", &resolver, &installer);
        assert!(store.exists().await.unwrap());
        store.update().await.unwrap();
        store.update().await.unwrap();
        assert_eq!(installer.calls(), 1);
    }

    #[tokio::test]
    async fn test_update_moves_to_new_latest() {
        let dir = tempdir().unwrap();
        let resolver = MockResolver::new("1.2.0");
        let installer = MockInstaller::new(MANIFEST);
        let mut store = cached_store(dir.path(), "demo-template", &resolver, &installer);
        store.install().await.unwrap();

        resolver.set_latest("1.3.0");
        assert!(store.exists().await.unwrap());
        store.update().await.unwrap();

        assert_eq!(installer.calls(), 2);
        assert_eq!(store.pinned_version(), Some("1.3.0"));
        let new_root =
            dunce::canonicalize(cache::locate(dir.path(), "demo-template", "1.3.0")).unwrap();
        let entry = store.entry_point().unwrap().unwrap();
        assert!(entry.starts_with(&new_root));
        assert!(!entry.to_string_lossy().contains("1.2.0"));
    }

    #[tokio::test]
    async fn test_repeated_update_installs_at_most_once() {
        let dir = tempdir().unwrap();
        let resolver = MockResolver::new("2.0.0");
        let installer = MockInstaller::new(MANIFEST);
        let mut store = cached_store(dir.path(), "demo-template", &resolver, &installer);

        store.update().await.unwrap();
        store.update().await.unwrap();
        assert_eq!(installer.calls(), 1);
    }

    #[tokio::test]
    async fn test_pinned_request_never_resolves() {
        let dir = tempdir().unwrap();
        let resolver = MockResolver::new("9.9.9");
        let installer = MockInstaller::new(MANIFEST);
        let mut store = cached_store(dir.path(), "demo-template@1.2.0", &resolver, &installer);

        assert!(!store.exists().await.unwrap());
        store.install().await.unwrap();
        store.update().await.unwrap();
        assert_eq!(resolver.calls(), 0);
        assert_eq!(store.pinned_version(), Some("1.2.0"));
    }

    #[tokio::test]
    async fn test_local_store_skips_registry() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("package.json"), MANIFEST).unwrap();
        let resolver = MockResolver::new("1.0.0");
        let installer = MockInstaller::new(MANIFEST);
        let mut store = PackageStore::new(
            PackageLocation::Local(dir.path().to_path_buf()),
            PackageSpec::parse("@blink-cli/init").unwrap(),
            registry(),
            resolver.clone(),
            installer.clone(),
        );

        assert!(store.exists().await.unwrap());
        store.install().await.unwrap();
        store.update().await.unwrap();
        store.ensure_installed().await.unwrap();
        assert_eq!(resolver.calls(), 0);
        assert_eq!(installer.calls(), 0);
        assert_eq!(store.package_dir().unwrap(), dir.path());
        assert!(store.cache_path().is_err());
    }

    #[tokio::test]
    async fn test_latest_never_reaches_a_path() {
        let dir = tempdir().unwrap();
        let resolver = MockResolver::new("1.2.0");
        let installer = MockInstaller::new(MANIFEST);
        let mut store = cached_store(dir.path(), "@blink-cli/init@latest", &resolver, &installer);
        store.ensure_installed().await.unwrap();

        for path in installer.installed.lock().unwrap().iter() {
            assert!(!path.to_string_lossy().contains("latest"));
        }
        assert!(!store.cache_path().unwrap().to_string_lossy().contains("latest"));
    }

    #[tokio::test]
    async fn test_resolver_returning_sentinel_is_error() {
        let dir = tempdir().unwrap();
        let resolver = MockResolver::new("latest");
        let installer = MockInstaller::new(MANIFEST);
        let mut store = cached_store(dir.path(), "demo-template", &resolver, &installer);
        assert!(store.exists().await.is_err());
        assert_eq!(installer.calls(), 0);
    }

    #[tokio::test]
    async fn test_registry_version_with_path_parts_is_rejected() {
        let dir = tempdir().unwrap();
        let resolver = MockResolver::new("1.0.0/../../../escaped");
        let installer = MockInstaller::new(MANIFEST);
        let mut store = cached_store(dir.path(), "demo-template", &resolver, &installer);

        let err = store.ensure_installed().await.unwrap_err();
        assert_eq!(err.code(), super::super::error::codes::PKG_REGISTRY_ERROR);
        assert_eq!(installer.calls(), 0);
        assert!(store.pinned_version().is_none());
        assert!(!dir.path().join("escaped").exists());
        assert!(!dir.path().parent().unwrap().join("escaped").exists());
    }

    #[tokio::test]
    async fn test_missing_main_is_no_entry_point() {
        let dir = tempdir().unwrap();
        let resolver = MockResolver::new("1.0.0");
        let installer = MockInstaller::new(r#"{"name":"demo-template"}"#);
        let mut store = cached_store(dir.path(), "demo-template", &resolver, &installer);
        store.ensure_installed().await.unwrap();
        assert_eq!(store.entry_point().unwrap(), None);
    }

    #[tokio::test]
    async fn test_cache_path_requires_pin() {
        let dir = tempdir().unwrap();
        let resolver = MockResolver::new("1.0.0");
        let installer = MockInstaller::new(MANIFEST);
        let store = cached_store(dir.path(), "demo-template", &resolver, &installer);
        let err = store.cache_path().unwrap_err();
        assert_eq!(err.code(), super::super::error::codes::PKG_VERSION_NOT_PINNED);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_concurrent_installs_share_one_install() {
        let dir = tempdir().unwrap();
        let resolver = MockResolver::new("1.0.0");
        let installer = MockInstaller::slow(Duration::from_millis(200));

        let mut first = cached_store(dir.path(), "demo-template", &resolver, &installer);
        let mut second = cached_store(dir.path(), "demo-template", &resolver, &installer);
        let (a, b) = tokio::join!(
            tokio::spawn(async move { first.install().await }),
            tokio::spawn(async move { second.install().await }),
        );
        a.unwrap().unwrap();
        b.unwrap().unwrap();
        assert_eq!(installer.calls(), 1);
    }

    #[tokio::test]
    async fn test_install_timeout() {
        let dir = tempdir().unwrap();
        let resolver = MockResolver::new("1.0.0");
        let installer = MockInstaller::slow(Duration::from_secs(5));
        let mut store = cached_store(dir.path(), "demo-template", &resolver, &installer)
            .with_install_timeout(Duration::from_millis(50));

        let err = store.install().await.unwrap_err();
        assert_eq!(err.code(), super::super::error::codes::PKG_INSTALL_TIMEOUT);
        assert_eq!(err.kind(), super::super::error::PkgErrorKind::Install);
    }
}
