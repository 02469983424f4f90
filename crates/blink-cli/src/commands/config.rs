//! `blink config`: print the configuration this invocation resolved.

use blink_core::{Config, Error};

pub fn run(config: &Config) -> Result<i32, Error> {
    println!("{}", serde_json::to_string_pretty(config)?);
    Ok(0)
}
