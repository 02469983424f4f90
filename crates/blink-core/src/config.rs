//! Runtime configuration.
//!
//! Built once at startup from the environment snapshot and passed by reference
//! to everything below the CLI. Nothing else reads environment variables.

use crate::env::EnvVars;
use crate::error::Error;
use crate::pkg::registry::DEFAULT_REGISTRY;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable names.
pub mod vars {
    pub const HOME: &str = "BLINK_HOME";
    pub const CLI_HOME: &str = "BLINK_CLI_HOME";
    pub const DEPENDENCIES_PATH: &str = "BLINK_DEPENDENCIES_PATH";
    pub const TEMPLATE_PATH: &str = "BLINK_TEMPLATE_PATH";
    pub const TARGET_PATH: &str = "BLINK_TARGET_PATH";
    pub const LOG_LEVEL: &str = "BLINK_LOG_LEVEL";
    pub const NPM_REGISTRY: &str = "BLINK_NPM_REGISTRY";
    pub const NODE: &str = "BLINK_NODE";
    pub const INSTALL_TIMEOUT_SECS: &str = "BLINK_INSTALL_TIMEOUT_SECS";
    pub const CHILD_TIMEOUT_SECS: &str = "BLINK_CHILD_TIMEOUT_SECS";
    pub const NO_UPDATE_CHECK: &str = "BLINK_NO_UPDATE_CHECK";
    pub const SKIP_PACKAGE_DEPS: &str = "BLINK_SKIP_PACKAGE_DEPS";
}

/// Default tool directory under the home root.
pub const DEFAULT_CLI_HOME: &str = ".blink-cli";

/// Default install timeout.
pub const DEFAULT_INSTALL_TIMEOUT_SECS: u64 = 300;

/// Runtime configuration for the blink CLI.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Current working directory.
    pub cwd: PathBuf,

    /// Home root (`BLINK_HOME` or the OS home directory).
    pub home: PathBuf,

    /// Tool directory, `<home>/.blink-cli` by default.
    pub cli_home: PathBuf,

    /// Cache root for dispatched command packages.
    pub dependencies_path: PathBuf,

    /// Cache root for template packages.
    pub templates_path: PathBuf,

    /// Local package override; enables local mode for dispatch.
    pub target_path: Option<PathBuf>,

    /// Registry base URL.
    pub registry: String,

    /// Node executable used to run entry points.
    pub node: String,

    /// Verbosity level (0 = INFO, 1 = DEBUG, 2+ = TRACE).
    pub verbosity: u8,

    /// Whether to emit JSON logs.
    pub json_logs: bool,

    pub install_timeout_secs: u64,

    pub child_timeout_secs: Option<u64>,

    /// Compare the CLI version against the registry at startup.
    pub update_check: bool,

    /// Run `npm install` for dependencies of fetched packages.
    pub install_package_deps: bool,
}

impl Config {
    /// Load configuration from the process environment.
    ///
    /// # Errors
    /// Returns an error if no home directory can be found or a value is malformed.
    pub fn load(cwd: PathBuf) -> Result<Self, Error> {
        let os_home = dirs_next::home_dir();
        let env = EnvVars::capture(os_home.as_deref());
        Self::from_env(cwd, &env, os_home)
    }

    /// Build configuration from an environment snapshot.
    ///
    /// Relative cache paths are resolved against the home root; a relative
    /// target path is resolved against `cwd`.
    ///
    /// # Errors
    /// Returns an error if the home root does not exist or a value is malformed.
    pub fn from_env(cwd: PathBuf, env: &EnvVars, os_home: Option<PathBuf>) -> Result<Self, Error> {
        let home = env
            .get(vars::HOME)
            .map(PathBuf::from)
            .or(os_home)
            .ok_or(Error::HomeNotFound { path: None })?;
        if !home.is_dir() {
            return Err(Error::HomeNotFound { path: Some(home) });
        }

        let cli_home = home.join(env.get(vars::CLI_HOME).unwrap_or(DEFAULT_CLI_HOME));

        let dependencies_path = env
            .get(vars::DEPENDENCIES_PATH)
            .map_or_else(|| cli_home.join("dependencies"), |p| home.join(p));
        let templates_path = env
            .get(vars::TEMPLATE_PATH)
            .map_or_else(|| cli_home.join("template"), |p| home.join(p));

        let target_path = env.get(vars::TARGET_PATH).map(|p| cwd.join(p));

        let registry = env
            .get(vars::NPM_REGISTRY)
            .unwrap_or(DEFAULT_REGISTRY)
            .to_string();
        let node = env.get(vars::NODE).unwrap_or("node").to_string();

        let verbosity = env
            .get(vars::LOG_LEVEL)
            .map(parse_log_level)
            .transpose()?
            .unwrap_or(0);

        let install_timeout_secs = parse_secs(env, vars::INSTALL_TIMEOUT_SECS)?
            .unwrap_or(DEFAULT_INSTALL_TIMEOUT_SECS);
        let child_timeout_secs = parse_secs(env, vars::CHILD_TIMEOUT_SECS)?;

        Ok(Self {
            cwd,
            home,
            cli_home,
            dependencies_path,
            templates_path,
            target_path,
            registry,
            node,
            verbosity,
            json_logs: false,
            install_timeout_secs,
            child_timeout_secs,
            update_check: !env.flag(vars::NO_UPDATE_CHECK),
            install_package_deps: !env.flag(vars::SKIP_PACKAGE_DEPS),
        })
    }

    /// Raise verbosity; flags never lower what the environment asked for.
    #[must_use]
    pub fn with_verbosity(mut self, verbosity: u8) -> Self {
        self.verbosity = self.verbosity.max(verbosity);
        self
    }

    /// Set JSON log output.
    #[must_use]
    pub fn with_json_logs(mut self, json: bool) -> Self {
        self.json_logs = json;
        self
    }

    /// Override the local package path (from `--target-path`).
    #[must_use]
    pub fn with_target_path(mut self, target: Option<&Path>) -> Self {
        if let Some(target) = target {
            self.target_path = Some(self.cwd.join(target));
        }
        self
    }

    #[must_use]
    pub fn install_timeout(&self) -> Duration {
        Duration::from_secs(self.install_timeout_secs)
    }

    #[must_use]
    pub fn child_timeout(&self) -> Option<Duration> {
        self.child_timeout_secs.map(Duration::from_secs)
    }
}

fn parse_log_level(value: &str) -> Result<u8, Error> {
    match value.to_ascii_lowercase().as_str() {
        "info" | "log" | "notice" | "warn" | "error" => Ok(0),
        "verbose" | "debug" => Ok(1),
        "trace" | "silly" => Ok(2),
        other => Err(Error::ConfigValue {
            key: vars::LOG_LEVEL,
            message: format!("unknown level '{other}'"),
        }),
    }
}

fn parse_secs(env: &EnvVars, key: &'static str) -> Result<Option<u64>, Error> {
    env.get(key)
        .map(|v| {
            v.trim().parse::<u64>().map_err(|e| Error::ConfigValue {
                key,
                message: format!("'{v}' is not a number of seconds: {e}"),
            })
        })
        .transpose()
}
