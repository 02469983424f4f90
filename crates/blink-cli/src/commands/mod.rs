//! Command handlers.
//!
//! Handlers return the process exit code or a core error; `main` turns
//! errors into a rendered report and an exit code via [`report`].

pub mod cache;
pub mod config;
pub mod create;
pub mod dispatch;
pub mod version;

use blink_core::pkg::{pkg_codes, RegistryClient};
use blink_core::process::EXIT_FAILURE;
use blink_core::{update_check, Config, Error};
use miette::{MietteDiagnostic, Report};
use std::time::Duration;

/// Exit code for invocation errors, matching clap's own parse failures.
pub const EXIT_USAGE: i32 = 2;

const UPDATE_CHECK_TIMEOUT: Duration = Duration::from_secs(3);

/// Print `err` for the user and return the exit code it maps to.
///
/// With `json` the error goes to stdout as `{"ok":false,"error":{...}}`;
/// otherwise it is rendered through miette on stderr.
pub fn report(err: &Error, json: bool) -> i32 {
    if json {
        let out = serde_json::json!({
            "ok": false,
            "error": { "code": err.code(), "message": err.to_string() },
        });
        println!("{out}");
    } else {
        let mut diagnostic = MietteDiagnostic::new(err.to_string()).with_code(err.code());
        if let Some(help) = help_for(err) {
            diagnostic = diagnostic.with_help(help);
        }
        eprintln!("{:?}", Report::new(diagnostic));
    }

    if err.is_usage() {
        EXIT_USAGE
    } else {
        EXIT_FAILURE
    }
}

fn help_for(err: &Error) -> Option<&'static str> {
    match err {
        Error::HomeNotFound { .. } => Some("Set BLINK_HOME to an existing directory"),
        Error::Pkg(e) if e.code() == pkg_codes::PKG_NOT_FOUND => {
            Some("Check the package name and BLINK_NPM_REGISTRY")
        }
        Error::Pkg(e) if e.code() == pkg_codes::PKG_NO_ENTRY_POINT => {
            Some("Add a \"main\" field to the package's package.json")
        }
        _ => None,
    }
}

/// Warn when the registry has a newer CLI; never fails the command.
pub async fn check_for_update(config: &Config) {
    if !config.update_check {
        return;
    }
    match RegistryClient::with_timeout(&config.registry, UPDATE_CHECK_TIMEOUT) {
        Ok(client) => {
            update_check::check(&client).await;
        }
        Err(e) => tracing::debug!("Update check skipped: {e}"),
    }
}
