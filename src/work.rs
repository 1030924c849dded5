//! Build runner, choosing and executing tasks as determined by out of date
//! sources.
//!
//! Each wanted task moves through the states Checked, Rebuilding and
//! Verified, or ends in Failed, which stops the whole build.  Tasks run one
//! at a time in artifact order, which is already dependency order.

use crate::artifact::{Artifact, CommandSpec, TaskDescriptor};
use crate::cache::CacheStore;
use crate::eval::{self, Vars};
use crate::hash;
use crate::progress::Progress;
use crate::shared::SharedSources;
use crate::task::{run_command, unbuffered, ScriptRunner};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    /// A command exited unsuccessfully or could not be run at all; for the
    /// latter `output` holds the error.
    #[error("task {task}: command failed: {command}")]
    CommandFailed {
        task: String,
        command: String,
        output: String,
    },
    #[error("task {task}: command succeeded but did not produce {}", .missing.join(", "))]
    MissingTargets { task: String, missing: Vec<String> },
    #[error("unknown task {0:?}")]
    UnknownTask(String),
    #[error("task {task}: {context}")]
    Io {
        task: String,
        context: String,
        #[source]
        source: std::io::Error,
    },
}

impl BuildError {
    pub fn task(&self) -> &str {
        match self {
            BuildError::CommandFailed { task, .. }
            | BuildError::MissingTargets { task, .. }
            | BuildError::Io { task, .. } => task.as_str(),
            BuildError::UnknownTask(name) => name.as_str(),
        }
    }
}

/// A command that could not be started fails the same way as one that exited
/// unsuccessfully, with the error as its output.
fn not_started(
    progress: &mut dyn Progress,
    task: &str,
    command: &str,
    err: anyhow::Error,
) -> BuildError {
    let output = format!("{:#}", err);
    progress.log(&format!("failed: {}", command));
    progress.log(&output);
    BuildError::CommandFailed {
        task: task.to_owned(),
        command: command.to_owned(),
        output,
    }
}

fn io_error(task: &str, context: String) -> impl FnOnce(std::io::Error) -> BuildError + '_ {
    move |source| BuildError::Io {
        task: task.to_owned(),
        context,
        source,
    }
}

/// What happened to a task that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    UpToDate,
    Rebuilt,
    /// The task has no command.
    Stub,
}

pub struct Work<'a> {
    artifact: &'a Artifact,
    vars: Vars,
    cache: &'a mut CacheStore,
    progress: &'a mut dyn Progress,
    scripts: &'a mut dyn ScriptRunner,
    shared: &'a dyn SharedSources,
    force: bool,
    /// Indexes into artifact.tasks of the tasks to run.
    want: HashSet<usize>,
}

impl<'a> Work<'a> {
    pub fn new(
        artifact: &'a Artifact,
        vars: Vars,
        cache: &'a mut CacheStore,
        progress: &'a mut dyn Progress,
        scripts: &'a mut dyn ScriptRunner,
        shared: &'a dyn SharedSources,
    ) -> Self {
        Work {
            artifact,
            vars,
            cache,
            progress,
            scripts,
            shared,
            force: false,
            want: HashSet::new(),
        }
    }

    /// Rebuild every planned task regardless of the cache.
    pub fn set_force(&mut self, force: bool) {
        self.force = force;
    }

    fn cwd(&self) -> &Path {
        &self.vars.cwd
    }

    fn task_index(&self, name: &str) -> Result<usize, BuildError> {
        self.artifact
            .tasks
            .iter()
            .position(|t| t.name == name)
            .ok_or_else(|| BuildError::UnknownTask(name.to_owned()))
    }

    /// Plans a task and, transitively, everything it depends on.
    pub fn want_task(&mut self, name: &str) -> Result<(), BuildError> {
        let mut stack = vec![self.task_index(name)?];
        while let Some(id) = stack.pop() {
            if !self.want.insert(id) {
                continue;
            }
            for dep in &self.artifact.tasks[id].depends_on {
                stack.push(self.task_index(dep)?);
            }
        }
        Ok(())
    }

    /// Names of the planned tasks, in the order they will run.
    pub fn planned(&self) -> Vec<&str> {
        self.artifact
            .tasks
            .iter()
            .enumerate()
            .filter(|(id, _)| self.want.contains(id))
            .map(|(_, t)| t.name.as_str())
            .collect()
    }

    /// Whether any planned task refers to the project name.
    pub fn needs_project_name(&self) -> bool {
        self.artifact
            .tasks
            .iter()
            .enumerate()
            .any(|(id, t)| self.want.contains(&id) && t.mentions_project_name())
    }

    fn expand(&self, template: &str) -> String {
        eval::expand(template, &self.vars)
    }

    fn source_paths(&self, task: &TaskDescriptor) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = task
            .sources
            .paths()
            .iter()
            .map(|p| PathBuf::from(self.expand(p)))
            .collect();
        // Shared sources start from the project's main file.
        if task.sources.uses_shared() && !self.vars.project_name.is_empty() {
            for path in self.shared.shared_sources(&self.vars.project_name) {
                if !paths.contains(&path) {
                    paths.push(path);
                }
            }
        }
        paths
    }

    fn targets(&self, task: &TaskDescriptor) -> Vec<String> {
        task.targets.iter().map(|t| self.expand(t)).collect()
    }

    fn run_commands(&mut self, task: &TaskDescriptor) -> Result<(), BuildError> {
        let project_env = [("PROJECT_NAME", self.vars.project_name.as_str())];
        let env: &[(&str, &str)] = if self.vars.project_name.is_empty() {
            &[]
        } else {
            &project_env
        };
        match &task.command {
            CommandSpec::Process { commands } => {
                for command in commands {
                    let cmdline = unbuffered(&self.expand(command));
                    self.progress.command_started(&cmdline);
                    let result = run_command(&cmdline, self.cwd(), env).map_err(|err| {
                        not_started(&mut *self.progress, &task.name, &cmdline, err)
                    })?;
                    self.progress.command_finished(&cmdline, &result);
                    if !result.success() {
                        return Err(BuildError::CommandFailed {
                            task: task.name.clone(),
                            command: cmdline,
                            output: String::from_utf8_lossy(&result.output).into_owned(),
                        });
                    }
                }
                Ok(())
            }
            CommandSpec::Deferred { script, args } => {
                let args: Vec<String> = args.iter().map(|a| self.expand(a)).collect();
                let cmdline = self.scripts.describe(script, &args);
                self.progress.command_started(&cmdline);
                let result = self
                    .scripts
                    .run_script(script, &args, &self.vars.project_name, &self.vars.cwd)
                    .map_err(|err| {
                        not_started(&mut *self.progress, &task.name, &cmdline, err)
                    })?;
                self.progress.command_finished(&cmdline, &result);
                if !result.success() {
                    return Err(BuildError::CommandFailed {
                        task: task.name.clone(),
                        command: cmdline,
                        output: String::from_utf8_lossy(&result.output).into_owned(),
                    });
                }
                Ok(())
            }
            CommandSpec::NotImplemented => Ok(()),
        }
    }

    fn run_task(&mut self, task: &TaskDescriptor) -> Result<Outcome, BuildError> {
        self.progress.task_started(&task.name, &task.description);
        if task.command == CommandSpec::NotImplemented {
            warn!(task = %task.name, "task has no runnable");
            self.progress
                .log(&format!("  task {} is not implemented yet", task.name));
            return Ok(Outcome::Stub);
        }

        // Checked.
        let sources = self.source_paths(task);
        let current = hash::hash_sources(&sources, self.cwd())
            .map_err(io_error(&task.name, "hash sources".to_owned()))?;
        let targets = self.targets(task);
        if !self.cache.needs_rebuild(&task.name, &current, self.force) {
            self.progress.task_skipped(&task.name, &targets);
            return Ok(Outcome::UpToDate);
        }
        // The entry is written before the command runs: an interrupted run
        // leaves the task looking up to date until its sources change.
        self.cache.record(&task.name, current);
        self.cache.commit().map_err(io_error(
            &task.name,
            format!("write {}", self.cache.path().display()),
        ))?;

        // Rebuilding.
        let mut deleted = Vec::new();
        for target in &targets {
            let path = self.cwd().join(target);
            if path.is_file() {
                std::fs::remove_file(&path)
                    .map_err(io_error(&task.name, format!("remove {}", path.display())))?;
                deleted.push(target.clone());
            }
        }
        self.progress.task_rebuilding(&task.name, &deleted);
        self.run_commands(task)?;

        // Verified.
        let missing: Vec<String> = targets
            .iter()
            .filter(|t| !self.cwd().join(t).exists())
            .cloned()
            .collect();
        if !missing.is_empty() {
            return Err(BuildError::MissingTargets {
                task: task.name.clone(),
                missing,
            });
        }
        self.progress.task_finished(&task.name, &targets);
        Ok(Outcome::Rebuilt)
    }

    /// Runs the planned tasks.  Returns the number of tasks that were rebuilt;
    /// the first failure stops the build.
    pub fn run(&mut self) -> Result<usize, BuildError> {
        let artifact = self.artifact;
        let mut rebuilt = 0;
        for (id, task) in artifact.tasks.iter().enumerate() {
            if !self.want.contains(&id) {
                continue;
            }
            match self.run_task(task) {
                Ok(outcome) => {
                    debug!(task = %task.name, ?outcome, "done");
                    if outcome == Outcome::Rebuilt {
                        rebuilt += 1;
                    }
                }
                Err(err) => {
                    self.progress.task_failed(&task.name, &err);
                    return Err(err);
                }
            }
        }
        Ok(rebuilt)
    }
}
