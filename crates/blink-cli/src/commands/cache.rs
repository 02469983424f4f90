//! `blink cache ls` command implementation.

use blink_core::pkg::list_cached;
use blink_core::{Config, Error};
use serde::Serialize;
use std::path::Path;

#[derive(Serialize)]
struct CachedPackage {
    name: String,
    version: String,
}

#[derive(Serialize)]
struct CacheListing {
    path: String,
    packages: Vec<CachedPackage>,
}

#[derive(Serialize)]
struct CacheReport {
    dependencies: CacheListing,
    templates: CacheListing,
}

fn listing(root: &Path) -> CacheListing {
    CacheListing {
        path: root.to_string_lossy().to_string(),
        packages: list_cached(root)
            .into_iter()
            .map(|(name, version)| CachedPackage { name, version })
            .collect(),
    }
}

/// List what the dependency and template caches hold.
pub fn list(config: &Config, json: bool) -> Result<i32, Error> {
    let report = CacheReport {
        dependencies: listing(&config.dependencies_path),
        templates: listing(&config.templates_path),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(0);
    }

    for (title, section) in [
        ("Commands", &report.dependencies),
        ("Templates", &report.templates),
    ] {
        println!("{title} ({}):", section.path);
        if section.packages.is_empty() {
            println!("  (empty)");
        }
        for pkg in &section.packages {
            println!("  {}@{}", pkg.name, pkg.version);
        }
    }
    Ok(0)
}
