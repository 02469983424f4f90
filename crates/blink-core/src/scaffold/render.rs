//! Variable substitution in copied template files.

use super::project::ProjectInfo;
use crate::error::Error;
use glob::Pattern;
use std::fs;
use std::path::Path;
use tera::{Context, Tera};
use tracing::debug;
use walkdir::WalkDir;

/// Paths under the project root that are never rendered.
pub const RENDER_IGNORE: &[&str] = &["node_modules/**", "public/**"];

/// Render every text file under `root` with the project info as context.
///
/// Files matching [`RENDER_IGNORE`], files that are not UTF-8, and files
/// whose contents are not a valid template for this context (for example
/// Vue mustache bindings) are left untouched. Returns the number of files
/// rewritten.
pub fn render_dir(root: &Path, info: &ProjectInfo) -> Result<usize, Error> {
    let ignore = RENDER_IGNORE
        .iter()
        .map(|p| Pattern::new(p))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| Error::other(format!("Invalid ignore pattern: {e}")))?;
    let context = Context::from_serialize(info)
        .map_err(|e| Error::other(format!("Cannot build template context: {e}")))?;

    let mut rendered = 0;
    for entry in WalkDir::new(root).min_depth(1) {
        let entry = entry.map_err(|e| Error::other(format!("Cannot walk {}: {e}", root.display())))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let Ok(relative) = path.strip_prefix(root) else {
            continue;
        };
        let relative = relative.to_string_lossy().replace('\\', "/");
        if ignore.iter().any(|p| p.matches(&relative)) {
            continue;
        }

        let Ok(content) = fs::read_to_string(path) else {
            debug!(file = %relative, "Skipping non-UTF-8 file");
            continue;
        };
        if !content.contains("{{") && !content.contains("{%") {
            continue;
        }

        match Tera::one_off(&content, &context, false) {
            Ok(output) => {
                if output != content {
                    fs::write(path, output)?;
                    rendered += 1;
                }
            }
            Err(e) => debug!(file = %relative, "Left unrendered: {e}"),
        }
    }

    debug!(root = %root.display(), rendered, "Rendered template files");
    Ok(rendered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scaffold::templates::catalogue;
    use tempfile::tempdir;

    fn info() -> ProjectInfo {
        ProjectInfo {
            name: "shop".to_string(),
            version: "1.2.3".to_string(),
            description: "A shop".to_string(),
            template: catalogue()[0].clone(),
        }
    }

    #[test]
    fn test_renders_and_skips() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        fs::write(
            root.join("package.json"),
            r#"{"name":"{{ name }}","version":"{{ version }}","description":"{{ description }}"}"#,
        )
        .unwrap();
        fs::create_dir_all(root.join("src")).unwrap();
        fs::write(root.join("src/App.vue"), "<p>{{ msg }}</p>").unwrap();
        fs::write(root.join("src/main.js"), "createApp(App)").unwrap();
        fs::create_dir_all(root.join("public")).unwrap();
        fs::write(root.join("public/index.html"), "<title>{{ name }}</title>").unwrap();
        fs::create_dir_all(root.join("node_modules/x")).unwrap();
        fs::write(root.join("node_modules/x/index.js"), "{{ name }}").unwrap();
        fs::write(root.join("logo.png"), [0x89, 0x50, 0xff, 0xfe, b'{', b'{']).unwrap();

        let count = render_dir(root, &info()).unwrap();
        assert_eq!(count, 1);

        assert_eq!(
            fs::read_to_string(root.join("package.json")).unwrap(),
            r#"{"name":"shop","version":"1.2.3","description":"A shop"}"#
        );
        assert_eq!(fs::read_to_string(root.join("src/App.vue")).unwrap(), "<p>{{ msg }}</p>");
        assert_eq!(
            fs::read_to_string(root.join("public/index.html")).unwrap(),
            "<title>{{ name }}</title>"
        );
        assert_eq!(
            fs::read_to_string(root.join("node_modules/x/index.js")).unwrap(),
            "{{ name }}"
        );
    }

    #[test]
    fn test_template_fields_are_available() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("README.md"), "# {{ name }} ({{ template.npmName }})").unwrap();
        render_dir(dir.path(), &info()).unwrap();
        assert_eq!(
            fs::read_to_string(dir.path().join("README.md")).unwrap(),
            "# shop (@blink-cli/template-admin)"
        );
    }
}
