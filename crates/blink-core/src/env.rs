//! Environment snapshot for configuration.
//!
//! Variables come from two layers: `<home>/.env` and the process environment.
//! Process variables already set take precedence over the file.

use std::collections::HashMap;
use std::path::Path;

/// Name of the dotenv file read from the home directory.
pub const HOME_ENV_FILE: &str = ".env";

/// An immutable view of the variables the tool reads.
#[derive(Debug, Clone, Default)]
pub struct EnvVars {
    vars: HashMap<String, String>,
}

impl EnvVars {
    /// Build from explicit pairs (tests and embedding callers).
    #[must_use]
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Snapshot the process environment, layered over `<home>/.env` when present.
    #[must_use]
    pub fn capture(home: Option<&Path>) -> Self {
        let mut vars = home.map(load_home_env).unwrap_or_default();
        vars.extend(std::env::vars());
        Self { vars }
    }

    /// Get a variable, treating empty values as unset.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    /// Whether a flag variable is set to anything other than `0`/`false`.
    #[must_use]
    pub fn flag(&self, key: &str) -> bool {
        self.get(key)
            .is_some_and(|v| !matches!(v.to_ascii_lowercase().as_str(), "0" | "false" | "no"))
    }
}

/// Read `<home>/.env`, returning an empty map if it is missing or unreadable.
#[must_use]
pub fn load_home_env(home: &Path) -> HashMap<String, String> {
    std::fs::read_to_string(home.join(HOME_ENV_FILE))
        .map(|content| parse_env_file(&content))
        .unwrap_or_default()
}

/// Parse a `.env` file's contents into key-value pairs.
///
/// Lines are `[export ]KEY=value`; values may be bare (a ` #` starts a
/// comment), `'literal'` or `"escaped"` (`\n`, `\t`, `\\`, `\"`). Blank
/// lines, `#` comments and lines without `=` are ignored.
#[must_use]
pub fn parse_env_file(content: &str) -> HashMap<String, String> {
    content.lines().filter_map(parse_assignment).collect()
}

fn parse_assignment(line: &str) -> Option<(String, String)> {
    let line = line.trim();
    if line.starts_with('#') {
        return None;
    }
    let (key, value) = line.split_once('=')?;
    let key = key.trim();
    let key = key.strip_prefix("export ").map_or(key, str::trim_start);
    if key.is_empty() {
        return None;
    }
    Some((key.to_string(), env_value(value.trim())))
}

fn env_value(raw: &str) -> String {
    if let Some(body) = raw.strip_prefix('"') {
        unescape(body)
    } else if let Some(body) = raw.strip_prefix('\'') {
        body.split('\'').next().unwrap_or_default().to_string()
    } else {
        raw.split(" #").next().unwrap_or_default().trim_end().to_string()
    }
}

/// Body of a double-quoted value, up to the closing quote.
fn unescape(body: &str) -> String {
    let mut out = String::with_capacity(body.len());
    let mut escaped = false;
    for c in body.chars() {
        if escaped {
            match c {
                'n' => out.push('\n'),
                't' => out.push('\t'),
                '\\' | '"' => out.push(c),
                other => {
                    out.push('\\');
                    out.push(other);
                }
            }
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if c == '"' {
            break;
        } else {
            out.push(c);
        }
    }
    out
}
