//! Package resolution and caching engine.
//!
//! Packages are fetched from an npm registry into a versioned store:
//! `<cache_root>/node_modules/_<sanitized>@<version>@<name>`. A
//! [`PackageStore`] drives one package through existence checks, installs
//! and updates, then locates its entry point for dispatch.

pub mod cache;
pub mod error;
pub mod install;
pub mod lock;
pub mod manifest;
pub mod registry;
pub mod resolver;
pub mod spec;
pub mod store;
pub mod tarball;

pub use cache::{list_cached, locate, sanitize_name, store_dir, store_entry_name};
pub use error::{codes as pkg_codes, PkgError, PkgErrorKind};
pub use install::{InstallTarget, Installer, RegistryInstaller};
pub use lock::CacheLock;
pub use manifest::{find_package_root, read_manifest, PackageManifest};
pub use registry::{RegistryClient, DEFAULT_REGISTRY};
pub use resolver::VersionResolver;
pub use spec::{PackageSpec, VersionReq, LATEST};
pub use store::{PackageLocation, PackageStore, StoreFactory};
