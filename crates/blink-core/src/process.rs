//! Child process execution.
//!
//! Every external program (entry-point loader, template install and serve
//! commands, `npm install` for fetched packages) goes through
//! [`ProcessRunner`], which normalizes the platform shell wrapper and maps
//! exit statuses to plain integer codes.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::process::{Child, Command};
use tracing::{debug, error};

/// Exit code reported when the child could not be started or was killed by a signal.
pub const EXIT_FAILURE: i32 = 1;

/// Errors from running a child process.
#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("Failed to start `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed waiting for `{program}`: {source}")]
    Wait {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{program}` did not exit within {secs}s and was killed")]
    Timeout { program: String, secs: u64 },
}

impl ProcessError {
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Spawn { .. } => "PROCESS_SPAWN_FAILED",
            Self::Wait { .. } => "PROCESS_WAIT_FAILED",
            Self::Timeout { .. } => "PROCESS_TIMEOUT",
        }
    }
}

/// How the child's standard streams are connected.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StdioMode {
    /// Share the parent's terminal.
    #[default]
    Inherit,
    /// Discard all output and give the child no stdin.
    Null,
}

/// Options for one child process.
#[derive(Debug, Clone, Default)]
pub struct SpawnOptions {
    pub cwd: Option<PathBuf>,
    /// Variables added on top of the inherited environment.
    pub env: Vec<(String, String)>,
    pub stdio: StdioMode,
    /// Upper bound for `run_to_completion`; the child is killed when it elapses.
    pub timeout: Option<Duration>,
    /// Start the program itself, skipping the platform shell wrapper.
    pub direct: bool,
}

impl SpawnOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    #[must_use]
    pub fn stdio(mut self, stdio: StdioMode) -> Self {
        self.stdio = stdio;
        self
    }

    #[must_use]
    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Only for real executables; `.cmd` shims need the wrapper on Windows.
    #[must_use]
    pub fn direct(mut self) -> Self {
        self.direct = true;
        self
    }
}

/// Wrap a program for the host platform.
///
/// On Windows the program runs under `cmd /c` so `.cmd` shims such as
/// `npm.cmd` resolve; elsewhere it runs directly.
#[must_use]
pub fn platform_command(program: &str, args: &[String]) -> (String, Vec<String>) {
    if cfg!(windows) {
        let mut wrapped = Vec::with_capacity(args.len() + 2);
        wrapped.push("/c".to_string());
        wrapped.push(program.to_string());
        wrapped.extend(args.iter().cloned());
        ("cmd".to_string(), wrapped)
    } else {
        (program.to_string(), args.to_vec())
    }
}

/// Split a command line like `npm run dev` into program and arguments.
///
/// Returns `None` for a blank line. Quoting is not interpreted.
#[must_use]
pub fn split_command_line(line: &str) -> Option<(String, Vec<String>)> {
    let mut parts = line.split_whitespace().map(str::to_string);
    let program = parts.next()?;
    Some((program, parts.collect()))
}

/// Spawns and awaits child processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner;

impl ProcessRunner {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Start a child process.
    ///
    /// # Errors
    /// Returns `ProcessError::Spawn` if the program cannot be started.
    pub fn spawn(
        &self,
        program: &str,
        args: &[String],
        opts: &SpawnOptions,
    ) -> Result<Child, ProcessError> {
        let (program, args) = if opts.direct {
            (program.to_string(), args.to_vec())
        } else {
            platform_command(program, args)
        };
        debug!(%program, ?args, cwd = ?opts.cwd, "Spawning child");

        let mut cmd = Command::new(&program);
        cmd.args(&args).envs(opts.env.iter().map(|(k, v)| (k, v)));
        if let Some(cwd) = &opts.cwd {
            cmd.current_dir(cwd);
        }
        match opts.stdio {
            StdioMode::Inherit => {
                cmd.stdin(Stdio::inherit())
                    .stdout(Stdio::inherit())
                    .stderr(Stdio::inherit());
            }
            StdioMode::Null => {
                cmd.stdin(Stdio::null())
                    .stdout(Stdio::null())
                    .stderr(Stdio::null());
            }
        }
        cmd.kill_on_drop(true);

        cmd.spawn()
            .map_err(|source| ProcessError::Spawn { program, source })
    }

    /// Run a child to completion and return its exit code.
    ///
    /// A child terminated by a signal reports [`EXIT_FAILURE`].
    ///
    /// # Errors
    /// Returns an error if the child cannot be started, cannot be awaited, or
    /// outlives `opts.timeout`.
    pub async fn run_to_completion(
        &self,
        program: &str,
        args: &[String],
        opts: &SpawnOptions,
    ) -> Result<i32, ProcessError> {
        let mut child = self.spawn(program, args, opts)?;

        let waited = match opts.timeout {
            Some(limit) => {
                let bounded = tokio::time::timeout(limit, child.wait()).await;
                if let Ok(status) = bounded {
                    status
                } else {
                    let _ = child.kill().await;
                    return Err(ProcessError::Timeout {
                        program: program.to_string(),
                        secs: limit.as_secs(),
                    });
                }
            }
            None => child.wait().await,
        };
        let status = waited.map_err(|source| ProcessError::Wait {
            program: program.to_string(),
            source,
        })?;

        let code = status.code().unwrap_or(EXIT_FAILURE);
        debug!(program, code, "Child exited");
        Ok(code)
    }

    /// Run a child and return the code the tool should exit with.
    ///
    /// Start and wait failures are logged and reported as [`EXIT_FAILURE`].
    pub async fn run_and_propagate(
        &self,
        program: &str,
        args: &[String],
        opts: &SpawnOptions,
    ) -> i32 {
        match self.run_to_completion(program, args, opts).await {
            Ok(code) => code,
            Err(e) => {
                error!("{e}");
                EXIT_FAILURE
            }
        }
    }
}
