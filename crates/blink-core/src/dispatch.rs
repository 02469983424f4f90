//! Command dispatch.
//!
//! A logical command (`init`) maps to an npm package. The dispatcher makes
//! sure the package is present, finds its entry point and runs it in a
//! child `node` process through a fixed loader script:
//!
//! ```text
//! node -e <LOADER> <entry_path> '{"abi":1,"args":[...positional, {options}]}'
//! ```
//!
//! The loader requires the entry, calls the export with `args` and exits
//! with status 1 if the call throws or its promise rejects.

use crate::config::Config;
use crate::error::Error;
use crate::pkg::{PackageLocation, PackageSpec, PkgError, StoreFactory};
use crate::process::{ProcessRunner, SpawnOptions};
use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Version of the argument payload understood by [`LOADER`].
pub const ENTRY_ABI: u32 = 1;

/// Variable set for every entry-point child.
pub const ENTRY_ABI_ENV: &str = "BLINK_ENTRY_ABI";

/// Node script that loads an entry point and applies the payload to it.
///
/// Kept on one line and free of shell metacharacters so the argument reaches
/// `node` intact on every platform.
pub const LOADER: &str = concat!(
    "const [entry, payload] = process.argv.slice(1); ",
    "function fail(err) { console.error(err instanceof Error ? err.message : String(err)); process.exit(1); } ",
    "try { ",
    "const { abi, args } = JSON.parse(payload); ",
    "if (abi !== 1) throw new Error('unsupported entry ABI ' + abi); ",
    "Promise.resolve(require(entry).apply(null, args)).catch(fail); ",
    "} catch (err) { fail(err); }",
);

/// Logical commands and the packages that implement them.
pub const COMMANDS: &[(&str, &str)] = &[("init", "@blink-cli/init@latest")];

/// Look up the package for a command name.
///
/// # Errors
/// Returns `Error::UnknownCommand` listing the available commands.
pub fn command_package(name: &str) -> Result<PackageSpec, Error> {
    let (_, spec) = COMMANDS
        .iter()
        .find(|(command, _)| *command == name)
        .ok_or_else(|| Error::UnknownCommand {
            name: name.to_string(),
            available: COMMANDS
                .iter()
                .map(|(command, _)| *command)
                .collect::<Vec<_>>()
                .join(", "),
        })?;
    Ok(PackageSpec::parse(spec)?)
}

/// Drop parser internals from an options record before it crosses the
/// process boundary: keys starting with `_` and the key `parent`.
#[must_use]
pub fn sanitize_options(options: Map<String, Value>) -> Map<String, Value> {
    options
        .into_iter()
        .filter(|(key, _)| !key.starts_with('_') && key != "parent")
        .collect()
}

/// The JSON payload handed to the loader.
#[must_use]
pub fn entry_payload(args: &[Value]) -> Value {
    json!({ "abi": ENTRY_ABI, "args": args })
}

/// A fully-built child invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
    pub cwd: PathBuf,
    pub timeout: Option<Duration>,
}

impl Invocation {
    /// Run `entry` under `node` with the given call arguments.
    ///
    /// # Errors
    /// Returns an error if the payload cannot be serialized.
    pub fn for_entry(node: &str, entry: &Path, args: &[Value], cwd: &Path) -> Result<Self, Error> {
        let payload = serde_json::to_string(&entry_payload(args))?;
        Ok(Self {
            program: node.to_string(),
            args: vec![
                "-e".to_string(),
                LOADER.to_string(),
                entry.to_string_lossy().into_owned(),
                payload,
            ],
            env: vec![(ENTRY_ABI_ENV.to_string(), ENTRY_ABI.to_string())],
            cwd: cwd.to_path_buf(),
            timeout: None,
        })
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// The serialized payload argument.
    #[must_use]
    pub fn payload(&self) -> Option<&str> {
        self.args.get(3).map(String::as_str)
    }

    #[must_use]
    pub fn spawn_options(&self) -> SpawnOptions {
        let mut opts = SpawnOptions::new()
            .cwd(&self.cwd)
            .timeout(self.timeout)
            .direct();
        opts.env.clone_from(&self.env);
        opts
    }
}

/// Runs a built invocation and reports the exit code to use.
#[async_trait]
pub trait Launcher: Send + Sync {
    async fn launch(&self, invocation: &Invocation) -> i32;
}

#[async_trait]
impl Launcher for ProcessRunner {
    async fn launch(&self, invocation: &Invocation) -> i32 {
        self.run_and_propagate(
            &invocation.program,
            &invocation.args,
            &invocation.spawn_options(),
        )
        .await
    }
}

/// Resolves commands to packages and runs them.
pub struct Dispatcher<'a> {
    config: &'a Config,
    stores: StoreFactory,
    launcher: Arc<dyn Launcher>,
}

impl<'a> Dispatcher<'a> {
    /// Dispatcher backed by the configured registry and real child processes.
    ///
    /// # Errors
    /// Returns an error if the registry URL is invalid.
    pub fn new(config: &'a Config) -> Result<Self, Error> {
        Ok(Self::with_components(
            config,
            StoreFactory::from_config(config)?,
            Arc::new(ProcessRunner::new()),
        ))
    }

    #[must_use]
    pub fn with_components(
        config: &'a Config,
        stores: StoreFactory,
        launcher: Arc<dyn Launcher>,
    ) -> Self {
        Self {
            config,
            stores,
            launcher,
        }
    }

    /// Where the package for `spec` comes from under the current config.
    #[must_use]
    pub fn location(&self) -> PackageLocation {
        match &self.config.target_path {
            Some(path) => PackageLocation::Local(path.clone()),
            None => PackageLocation::Cached {
                cache_root: self.config.dependencies_path.clone(),
            },
        }
    }

    /// Run `command` with positional arguments and an options record.
    ///
    /// Returns the child's exit code. Every failure before the child starts
    /// is returned as an error and no child is spawned.
    pub async fn dispatch(
        &self,
        command: &str,
        positional: Vec<Value>,
        options: Map<String, Value>,
    ) -> Result<i32, Error> {
        let spec = command_package(command)?;
        let mut store = self.stores.store(self.location(), spec);

        if store.is_local() {
            debug!(path = ?store.package_dir().ok(), "Using local package");
        } else {
            store.ensure_installed().await?;
        }

        let package_dir = store.package_dir()?;
        let entry = store
            .entry_point()?
            .ok_or_else(|| PkgError::no_entry_point(&package_dir))?;
        debug!(entry = %entry.display(), "Resolved entry point");

        let mut args = positional;
        args.push(Value::Object(sanitize_options(options)));
        let invocation = Invocation::for_entry(&self.config.node, &entry, &args, &self.config.cwd)?
            .with_timeout(self.config.child_timeout());

        info!(command, package = %store.spec().name, version = ?store.pinned_version(), "Running command");
        Ok(self.launcher.launch(&invocation).await)
    }
}
