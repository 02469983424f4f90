use crate::pkg::PkgError;
use crate::process::ProcessError;
use std::path::PathBuf;
use thiserror::Error;

/// Core error type for blink operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Pkg(#[from] PkgError),

    #[error(transparent)]
    Process(#[from] ProcessError),

    #[error("Home directory not found{}", .path.as_ref().map(|p| format!(": {}", p.display())).unwrap_or_default())]
    HomeNotFound { path: Option<PathBuf> },

    #[error("Invalid value for {key}: {message}")]
    ConfigValue { key: &'static str, message: String },

    #[error("Unknown command '{name}' (available: {available})")]
    UnknownCommand { name: String, available: String },

    #[error("Directory is not empty: {0} (use --force to clear it)")]
    DirectoryNotEmpty(PathBuf),

    #[error("Invalid project {field}: {message}")]
    InvalidProjectInfo {
        field: &'static str,
        message: String,
    },

    #[error("Template package has no template directory at {0}")]
    TemplateDirMissing(PathBuf),

    #[error("Template does not declare a {0} command")]
    MissingCommand(&'static str),

    #[error("`{command}` exited with code {code}")]
    CommandFailed { command: String, code: i32 },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl Error {
    #[must_use]
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    /// Whether the error stems from how the tool was invoked.
    #[must_use]
    pub fn is_usage(&self) -> bool {
        matches!(self, Self::UnknownCommand { .. })
    }

    /// Stable machine-readable code for JSON output.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Io(_) => "IO_ERROR",
            Self::Pkg(e) => e.code(),
            Self::Process(e) => e.code(),
            Self::HomeNotFound { .. } => "HOME_NOT_FOUND",
            Self::ConfigValue { .. } => "CONFIG_INVALID",
            Self::UnknownCommand { .. } => "UNKNOWN_COMMAND",
            Self::DirectoryNotEmpty(_) => "DIRECTORY_NOT_EMPTY",
            Self::InvalidProjectInfo { .. } => "PROJECT_INFO_INVALID",
            Self::TemplateDirMissing(_) => "TEMPLATE_DIR_MISSING",
            Self::MissingCommand(_) => "TEMPLATE_COMMAND_MISSING",
            Self::CommandFailed { .. } => "COMMAND_FAILED",
            Self::Json(_) => "JSON_ERROR",
            Self::Other(_) => "INTERNAL_ERROR",
        }
    }
}
