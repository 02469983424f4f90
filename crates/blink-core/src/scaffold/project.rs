//! Project information: prompting, validation and normalization.

use super::templates::{catalogue, find_template, TemplateInfo};
use crate::error::Error;
use regex_lite::Regex;
use serde::Serialize;
use std::io::{self, BufRead, Write};
use std::path::Path;

const NAME_PATTERN: &str = r"^[a-zA-Z]+[\w-]*[a-zA-Z0-9]$";

/// Default version offered for new projects.
pub const DEFAULT_PROJECT_VERSION: &str = "1.0.0";

/// Everything the template needs to know about the new project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectInfo {
    pub name: String,
    pub version: String,
    pub description: String,
    pub template: TemplateInfo,
}

/// Answers supplied on the command line.
#[derive(Debug, Clone, Default)]
pub struct ProjectAnswers {
    pub name: Option<String>,
    pub version: Option<String>,
    pub description: Option<String>,
    pub template: Option<String>,
    /// Accept defaults instead of prompting.
    pub yes: bool,
}

/// Interactive question source.
pub trait Prompt {
    /// Ask for a line of text; `None` means the user accepted the default.
    fn ask(&mut self, message: &str, default: Option<&str>) -> io::Result<Option<String>>;

    /// Ask a yes/no question.
    fn confirm(&mut self, message: &str, default: bool) -> io::Result<bool> {
        let hint = if default { "Y/n" } else { "y/N" };
        Ok(match self.ask(&format!("{message} ({hint})"), None)? {
            Some(answer) => matches!(answer.to_ascii_lowercase().as_str(), "y" | "yes"),
            None => default,
        })
    }

    /// Print a line for the user (choices, rejected answers).
    fn say(&mut self, message: &str) -> io::Result<()>;
}

/// Line-based prompt over any reader and writer.
pub struct LinePrompt<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> LinePrompt<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }
}

/// Prompt on the terminal: questions on stderr, answers from stdin.
#[must_use]
pub fn terminal_prompt() -> LinePrompt<io::StdinLock<'static>, io::Stderr> {
    LinePrompt::new(io::stdin().lock(), io::stderr())
}

impl<R: BufRead, W: Write> Prompt for LinePrompt<R, W> {
    fn ask(&mut self, message: &str, default: Option<&str>) -> io::Result<Option<String>> {
        match default {
            Some(d) if !d.is_empty() => write!(self.output, "? {message} ({d}): ")?,
            _ => write!(self.output, "? {message}: ")?,
        }
        self.output.flush()?;

        let mut input = String::new();
        if self.input.read_line(&mut input)? == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "input closed while prompting",
            ));
        }
        let trimmed = input.trim();
        Ok((!trimmed.is_empty()).then(|| trimmed.to_string()))
    }

    fn say(&mut self, message: &str) -> io::Result<()> {
        writeln!(self.output, ">> {message}")
    }
}

/// Check a raw project name: starts with a letter, ends with a letter or
/// digit, and otherwise uses only word characters and `-`.
pub fn validate_name(name: &str) -> Result<(), Error> {
    let re = Regex::new(NAME_PATTERN).map_err(|e| Error::other(e.to_string()))?;
    if re.is_match(name) {
        Ok(())
    } else {
        Err(Error::InvalidProjectInfo {
            field: "name",
            message: format!(
                "'{name}' must start with a letter, end with a letter or digit and contain only letters, digits, '_' or '-'"
            ),
        })
    }
}

/// `MyApp` → `my-app`; a leading dash produced by a leading capital is dropped.
#[must_use]
pub fn kebab_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for c in name.chars() {
        if c.is_ascii_uppercase() {
            out.push('-');
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    match out.strip_prefix('-') {
        Some(rest) => rest.to_string(),
        None => out,
    }
}

/// Validate a semver version and return its canonical form (`v1.2.3` → `1.2.3`).
pub fn normalize_version(version: &str) -> Result<String, Error> {
    let trimmed = version.trim();
    let bare = trimmed
        .strip_prefix('=')
        .unwrap_or(trimmed)
        .trim_start_matches(['v', 'V']);
    semver::Version::parse(bare)
        .map(|v| v.to_string())
        .map_err(|e| Error::InvalidProjectInfo {
            field: "version",
            message: format!("'{version}' is not a valid version such as 1.0.0: {e}"),
        })
}

fn validate_description(description: &str) -> Result<String, Error> {
    let description = description.trim();
    if description.is_empty() {
        Err(Error::InvalidProjectInfo {
            field: "description",
            message: "a description is required".to_string(),
        })
    } else {
        Ok(description.to_string())
    }
}

/// Take a flag value as given, or prompt until the answer validates.
fn answer<T>(
    prompt: &mut dyn Prompt,
    given: Option<&str>,
    yes: bool,
    message: &str,
    default: Option<&str>,
    check: impl Fn(&str) -> Result<T, Error>,
) -> Result<T, Error> {
    if let Some(value) = given {
        return check(value);
    }
    if yes {
        return check(default.unwrap_or_default());
    }
    loop {
        let value = prompt.ask(message, default)?;
        let value = value.as_deref().or(default).unwrap_or_default();
        match check(value) {
            Ok(v) => return Ok(v),
            Err(e) => prompt.say(&e.to_string())?,
        }
    }
}

/// Collect and validate project information.
///
/// Missing values are prompted; with `yes` the defaults are taken (project
/// name from `cwd`, version `1.0.0`, description equal to the name, first
/// catalogue template).
pub fn collect(
    answers: &ProjectAnswers,
    cwd: &Path,
    prompt: &mut dyn Prompt,
) -> Result<ProjectInfo, Error> {
    let dir_name = cwd
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let name = answer(
        prompt,
        answers.name.as_deref(),
        answers.yes,
        "Project name",
        Some(dir_name.as_str()),
        |v| validate_name(v.trim()).map(|()| v.trim().to_string()),
    )?;

    let version = answer(
        prompt,
        answers.version.as_deref(),
        answers.yes,
        "Project version",
        Some(DEFAULT_PROJECT_VERSION),
        normalize_version,
    )?;

    let description = answer(
        prompt,
        answers.description.as_deref(),
        answers.yes,
        "Project description",
        answers.yes.then_some(name.as_str()),
        validate_description,
    )?;

    let template = match answers.template.as_deref() {
        Some(query) => find_template(query),
        None if answers.yes => find_template("1"),
        None => {
            for (i, t) in catalogue().iter().enumerate() {
                prompt.say(&format!("{}) {} [{}]", i + 1, t.name, t.npm_name))?;
            }
            let choice = prompt.ask("Project template", Some("1"))?;
            find_template(choice.as_deref().unwrap_or("1"))
        }
    };

    Ok(ProjectInfo {
        name: kebab_case(&name),
        version,
        description,
        template,
    })
}
