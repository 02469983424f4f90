//! Built-in template catalogue.

use crate::pkg::LATEST;
use serde::{Deserialize, Serialize};

/// How a template package turns into a project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemplateKind {
    /// Copy `template/`, render it, then run the install and serve commands.
    Normal,
    /// Hand the project over to the package's own entry point.
    Custom,
}

/// A template that can be scaffolded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateInfo {
    pub name: String,
    pub npm_name: String,
    pub version: String,
    #[serde(rename = "type")]
    pub kind: TemplateKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub install_command: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub serve_command: Option<String>,
}

const MIRROR_INSTALL: &str = "npm install --registry=http://registry.npm.taobao.org/";

fn custom(name: &str, npm_name: &str, serve: &str) -> TemplateInfo {
    TemplateInfo {
        name: name.to_string(),
        npm_name: npm_name.to_string(),
        version: LATEST.to_string(),
        kind: TemplateKind::Custom,
        install_command: Some(MIRROR_INSTALL.to_string()),
        serve_command: Some(serve.to_string()),
    }
}

/// The templates offered by `blink create`, first entry is the default.
#[must_use]
pub fn catalogue() -> Vec<TemplateInfo> {
    vec![
        custom(
            "Vue 3 admin template",
            "@blink-cli/template-admin",
            "npm run dev",
        ),
        custom(
            "Data screen template",
            "@blink-daye/template-screen",
            "npm run serve",
        ),
        custom(
            "Console template",
            "@blink-daye/template-console",
            "npm run serve",
        ),
        custom(
            "Mobile template",
            "@blink-daye/template-mobile",
            "npm run start",
        ),
    ]
}

/// Pick a template by npm name, display name, or 1-based catalogue index.
///
/// Any other value is taken as the npm name of a normal template package,
/// optionally with an `@version` suffix.
#[must_use]
pub fn find_template(query: &str) -> TemplateInfo {
    let query = query.trim();
    let templates = catalogue();

    if let Ok(index) = query.parse::<usize>() {
        if let Some(found) = index.checked_sub(1).and_then(|i| templates.get(i)) {
            return found.clone();
        }
    }
    if let Some(found) = templates
        .iter()
        .find(|t| t.npm_name == query || t.name.eq_ignore_ascii_case(query))
    {
        return found.clone();
    }

    let (npm_name, version) = split_version(query);
    TemplateInfo {
        name: npm_name.to_string(),
        npm_name: npm_name.to_string(),
        version: version.to_string(),
        kind: TemplateKind::Normal,
        install_command: Some("npm install".to_string()),
        serve_command: Some("npm run dev".to_string()),
    }
}

fn split_version(query: &str) -> (&str, &str) {
    let from = usize::from(query.starts_with('@'));
    match query[from..].find('@') {
        Some(rel) => (&query[..from + rel], &query[from + rel + 1..]),
        None => (query, LATEST),
    }
}
