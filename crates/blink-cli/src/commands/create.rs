//! `blink create` command implementation.
//!
//! Scaffolds a project from a template into the working directory.

use blink_core::scaffold::{
    terminal_prompt, CreateOptions, CreateOutcome, ProjectAnswers, ProjectInfo, Scaffold,
};
use blink_core::{Config, Error};
use serde::Serialize;

#[derive(Serialize)]
struct CreateResult<'a> {
    ok: bool,
    path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    project: Option<&'a ProjectInfo>,
    aborted: bool,
}

/// Build scaffold options from the command-line flags.
pub fn options(
    name: Option<String>,
    template: Option<String>,
    project_version: Option<String>,
    description: Option<String>,
    force: bool,
    yes: bool,
) -> CreateOptions {
    CreateOptions {
        answers: ProjectAnswers {
            name,
            version: project_version,
            description,
            template,
            yes,
        },
        force,
    }
}

/// Run the create command.
pub async fn run(config: &Config, opts: &CreateOptions, json: bool) -> Result<i32, Error> {
    let scaffold = Scaffold::new(config)?;
    let mut prompt = terminal_prompt();
    let outcome = scaffold.run(opts, &mut prompt).await?;

    let path = scaffold.target().to_string_lossy().to_string();
    let project = match &outcome {
        CreateOutcome::Created(info) => Some(info),
        CreateOutcome::Aborted => None,
    };

    if json {
        let result = CreateResult {
            ok: true,
            path,
            project,
            aborted: project.is_none(),
        };
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else if let Some(info) = project {
        println!();
        println!("Created {} ({}) at: {}", info.name, info.template.name, path);
    } else {
        eprintln!("Aborted: {path} was left untouched");
    }
    Ok(0)
}
