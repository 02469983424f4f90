use std::fmt::Write;

/// The current version, read from Cargo.toml at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Name under which the CLI itself is published on the registry.
pub const CLI_PACKAGE_NAME: &str = "@blink-cli/core";

/// Returns a formatted version string including build metadata if available.
#[must_use]
pub fn version_string() -> String {
    let mut s = format!("blink {VERSION}");

    if let Some(hash) = option_env!("BLINK_BUILD_GIT_HASH") {
        let _ = write!(s, " ({hash})");
    }

    s
}
