#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::return_self_not_must_use)]

pub mod config;
pub mod dispatch;
pub mod env;
pub mod error;
pub mod pkg;
pub mod process;
pub mod scaffold;
pub mod update_check;
pub mod version;

pub use config::Config;
pub use dispatch::{Dispatcher, Invocation, Launcher};
pub use error::Error;
pub use process::{ProcessError, ProcessRunner, SpawnOptions};
pub use version::VERSION;
