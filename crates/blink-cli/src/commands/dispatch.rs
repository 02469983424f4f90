//! Commands served by registry packages (`blink init`, unknown names).

use blink_core::{Config, Dispatcher, Error};
use serde_json::{Map, Value};
use tracing::Instrument;

/// Resolve `command` to its package and run it; returns the child's exit code.
pub async fn run(
    config: &Config,
    command: &str,
    positional: Vec<Value>,
    options: Map<String, Value>,
) -> Result<i32, Error> {
    let span = tracing::info_span!("dispatch", cmd = command);
    Dispatcher::new(config)?
        .dispatch(command, positional, options)
        .instrument(span)
        .await
}
