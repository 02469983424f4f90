//! Startup check for a newer published CLI.

use crate::pkg::VersionResolver;
use crate::version::{CLI_PACKAGE_NAME, VERSION};
use semver::Version;
use tracing::{debug, warn};

/// Outcome of comparing the running version with the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateStatus {
    UpToDate,
    Available { current: String, latest: String },
}

/// Compare `current` with `latest`; unparsable versions never report an update.
#[must_use]
pub fn compare(current: &str, latest: &str) -> UpdateStatus {
    match (Version::parse(current), Version::parse(latest)) {
        (Ok(c), Ok(l)) if l > c => UpdateStatus::Available {
            current: current.to_string(),
            latest: latest.to_string(),
        },
        _ => UpdateStatus::UpToDate,
    }
}

/// Ask the registry for the latest CLI and warn if it is newer than this build.
///
/// Failures are logged at debug level and otherwise ignored.
pub async fn check(resolver: &dyn VersionResolver) -> Option<UpdateStatus> {
    let latest = match resolver.latest_version(CLI_PACKAGE_NAME).await {
        Ok(latest) => latest,
        Err(e) => {
            debug!("Update check skipped: {e}");
            return None;
        }
    };

    let status = compare(VERSION, &latest);
    if let UpdateStatus::Available { current, latest } = &status {
        warn!(
            "A newer version is available: {current} -> {latest}. Run `npm install -g {CLI_PACKAGE_NAME}` to upgrade."
        );
    }
    Some(status)
}
