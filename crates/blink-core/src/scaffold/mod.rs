//! Project scaffolding (`blink create`).
//!
//! 1. Prepare the working directory (must be empty, or cleared with `--force`).
//! 2. Collect project information.
//! 3. Download the template package into the template cache.
//! 4. Install it: copy and render `template/` then run the template's
//!    install and serve commands, or hand over to the package's own entry point.

pub mod project;
pub mod render;
pub mod templates;

pub use project::{collect, terminal_prompt, LinePrompt, ProjectAnswers, ProjectInfo, Prompt};
pub use templates::{catalogue, find_template, TemplateInfo, TemplateKind};

use crate::config::Config;
use crate::dispatch::Invocation;
use crate::error::Error;
use crate::pkg::{PackageLocation, PackageSpec, PackageStore, PkgError, StoreFactory};
use crate::process::{split_command_line, ProcessRunner, SpawnOptions};
use serde_json::json;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Directory inside a template package holding the project files.
pub const TEMPLATE_DIR: &str = "template";

/// Options for one `blink create` run.
#[derive(Debug, Clone, Default)]
pub struct CreateOptions {
    pub answers: ProjectAnswers,
    /// Clear a non-empty target directory.
    pub force: bool,
}

/// How a scaffold run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateOutcome {
    Created(ProjectInfo),
    /// The user declined to clear the target directory.
    Aborted,
}

/// Drives the scaffold flow against a target directory.
pub struct Scaffold<'a> {
    config: &'a Config,
    stores: StoreFactory,
    runner: ProcessRunner,
    target: PathBuf,
}

impl<'a> Scaffold<'a> {
    /// Scaffold into the working directory using the configured registry.
    ///
    /// # Errors
    /// Returns an error if the registry URL is invalid.
    pub fn new(config: &'a Config) -> Result<Self, Error> {
        Ok(Self::with_stores(config, StoreFactory::from_config(config)?))
    }

    #[must_use]
    pub fn with_stores(config: &'a Config, stores: StoreFactory) -> Self {
        Self {
            config,
            stores,
            runner: ProcessRunner::new(),
            target: config.cwd.clone(),
        }
    }

    #[must_use]
    pub fn target(&self) -> &Path {
        &self.target
    }

    /// Run the whole flow.
    pub async fn run(
        &self,
        opts: &CreateOptions,
        prompt: &mut dyn Prompt,
    ) -> Result<CreateOutcome, Error> {
        if !self.prepare_directory(opts.force, opts.answers.yes, prompt)? {
            return Ok(CreateOutcome::Aborted);
        }

        let info = collect(&opts.answers, &self.target, prompt)?;
        debug!(?info, "Project info");

        let store = self.download_template(&info.template).await?;
        self.install_template(&info, &store).await?;
        info!(name = %info.name, template = %info.template.npm_name, "Project created");
        Ok(CreateOutcome::Created(info))
    }

    /// Make sure the target directory can receive the project.
    ///
    /// Returns `false` if the user declined to clear it.
    ///
    /// # Errors
    /// `DirectoryNotEmpty` when the directory has files and `force` is off.
    pub fn prepare_directory(
        &self,
        force: bool,
        yes: bool,
        prompt: &mut dyn Prompt,
    ) -> Result<bool, Error> {
        if blink_util::fs::is_dir_empty(&self.target)? {
            return Ok(true);
        }
        if !force {
            return Err(Error::DirectoryNotEmpty(self.target.clone()));
        }
        if !yes
            && !prompt.confirm(
                &format!(
                    "Clear every file in {}? This cannot be undone",
                    self.target.display()
                ),
                false,
            )?
        {
            return Ok(false);
        }

        info!(path = %self.target.display(), "Clearing target directory");
        blink_util::fs::empty_dir(&self.target)?;
        Ok(true)
    }

    /// Fetch or refresh the template package in the template cache.
    pub async fn download_template(&self, template: &TemplateInfo) -> Result<PackageStore, Error> {
        let spec = PackageSpec::new(&template.npm_name, &template.version)?;
        let mut store = self.stores.store(
            PackageLocation::Cached {
                cache_root: self.config.templates_path.clone(),
            },
            spec,
        );

        if store.exists().await? {
            info!(template = %template.npm_name, "Checking template for updates");
            store.update().await?;
        } else {
            info!(template = %template.npm_name, "Downloading template");
            store.install().await?;
        }
        debug!(path = ?store.package_dir().ok(), "Template ready");
        Ok(store)
    }

    /// Install a downloaded template into the target directory.
    pub async fn install_template(
        &self,
        info: &ProjectInfo,
        store: &PackageStore,
    ) -> Result<(), Error> {
        match info.template.kind {
            TemplateKind::Normal => self.install_normal(info, store).await,
            TemplateKind::Custom => self.install_custom(info, store).await,
        }
    }

    async fn install_normal(&self, info: &ProjectInfo, store: &PackageStore) -> Result<(), Error> {
        let template_dir = store.package_dir()?.join(TEMPLATE_DIR);
        if !template_dir.is_dir() {
            return Err(Error::TemplateDirMissing(template_dir));
        }

        let copied = blink_util::fs::copy_dir_all(&template_dir, &self.target)?;
        debug!(copied, "Copied template files");
        render::render_dir(&self.target, info)?;

        let install = info
            .template
            .install_command
            .as_deref()
            .ok_or(Error::MissingCommand("install"))?;
        info!("Installing dependencies");
        self.run_command(install).await?;

        let serve = info
            .template
            .serve_command
            .as_deref()
            .ok_or(Error::MissingCommand("serve"))?;
        info!("Starting dev server");
        self.run_command(serve).await
    }

    async fn install_custom(&self, info: &ProjectInfo, store: &PackageStore) -> Result<(), Error> {
        let package_dir = store.package_dir()?;
        let entry = store
            .entry_point()?
            .filter(|e| e.exists())
            .ok_or_else(|| PkgError::no_entry_point(&package_dir))?;
        let template_dir = package_dir.join(TEMPLATE_DIR);
        if !template_dir.is_dir() {
            return Err(Error::TemplateDirMissing(template_dir));
        }

        let options = json!({
            "projectInfo": info,
            "targetPath": self.target,
            "templatePath": template_dir,
        });
        let invocation = Invocation::for_entry(&self.config.node, &entry, &[options], &self.target)?
            .with_timeout(self.config.child_timeout());

        info!(entry = %entry.display(), "Running custom template installer");
        let code = self
            .runner
            .run_to_completion(
                &invocation.program,
                &invocation.args,
                &invocation.spawn_options(),
            )
            .await?;
        if code == 0 {
            Ok(())
        } else {
            Err(Error::CommandFailed {
                command: format!("{} {}", invocation.program, entry.display()),
                code,
            })
        }
    }

    async fn run_command(&self, line: &str) -> Result<(), Error> {
        let (program, args) = split_command_line(line).ok_or_else(|| Error::CommandFailed {
            command: line.to_string(),
            code: 1,
        })?;
        let opts = SpawnOptions::new()
            .cwd(&self.target)
            .timeout(self.config.child_timeout());
        let code = self.runner.run_to_completion(&program, &args, &opts).await?;
        if code == 0 {
            Ok(())
        } else {
            Err(Error::CommandFailed {
                command: line.to_string(),
                code,
            })
        }
    }
}
