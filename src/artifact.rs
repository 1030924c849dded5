//! The generated artifact: resolved task descriptors plus the aggregate
//! tasks, serialized as JSON between `generate` and `build`.
//!
//! Paths and commands are templates; `{PROJECT_NAME}` and `{CWD}` are only
//! expanded when the artifact is built.

use crate::eval;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const FORMAT_VERSION: u32 = 1;

/// Names of the aggregate tasks.
pub const STATUS: &str = "status";
pub const CLEAN: &str = "clean";
pub const CLEAN_ALL: &str = "clean_all";
pub const ALL: &str = "all";
pub const INFO: &str = "info";
pub const AGGREGATES: [&str; 5] = [STATUS, CLEAN, CLEAN_ALL, ALL, INFO];

/// The files a task reads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "paths", rename_all = "snake_case")]
pub enum SourceExpr {
    /// Only the listed paths.
    Paths(Vec<String>),
    /// The listed paths followed by the project's shared sources.
    PathsAndShared(Vec<String>),
    /// Only the project's shared sources.
    Shared,
}

impl SourceExpr {
    pub fn paths(&self) -> &[String] {
        match self {
            SourceExpr::Paths(paths) | SourceExpr::PathsAndShared(paths) => paths,
            SourceExpr::Shared => &[],
        }
    }

    pub fn uses_shared(&self) -> bool {
        !matches!(self, SourceExpr::Paths(_))
    }
}

/// How a task produces its targets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CommandSpec {
    /// Shell command lines run in order.
    Process { commands: Vec<String> },
    /// A pipeline script run through the configured interpreter.
    Deferred { script: String, args: Vec<String> },
    /// The task has no runnable; running it does nothing.
    NotImplemented,
}

impl CommandSpec {
    /// The command as a single line of text, for messages.
    pub fn display(&self) -> String {
        match self {
            CommandSpec::Process { commands } => commands.join(" && "),
            CommandSpec::Deferred { script, args } => {
                let mut s = script.clone();
                for arg in args {
                    s.push(' ');
                    s.push_str(arg);
                }
                s
            }
            CommandSpec::NotImplemented => "(not implemented)".to_owned(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskDescriptor {
    pub name: String,
    pub description: String,
    /// Tasks that must run first, by name.
    pub depends_on: Vec<String>,
    pub sources: SourceExpr,
    pub targets: Vec<String>,
    pub command: CommandSpec,
}

impl TaskDescriptor {
    /// Whether running the task needs the project name: a source, target or
    /// command refers to `{PROJECT_NAME}`.
    pub fn mentions_project_name(&self) -> bool {
        let command: Vec<&String> = match &self.command {
            CommandSpec::Process { commands } => commands.iter().collect(),
            CommandSpec::Deferred { args, .. } => args.iter().collect(),
            CommandSpec::NotImplemented => Vec::new(),
        };
        self.sources
            .paths()
            .iter()
            .chain(&self.targets)
            .chain(command)
            .any(|t| eval::mentions(t, eval::PROJECT_NAME))
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileCategory {
    Input,
    Output,
    Export,
}

impl FileCategory {
    pub fn name(self) -> &'static str {
        match self {
            FileCategory::Input => "Input",
            FileCategory::Output => "Output",
            FileCategory::Export => "Export",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusEntry {
    pub category: FileCategory,
    pub description: String,
    pub path: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatusDescriptor {
    pub files: Vec<StatusEntry>,
}

/// Files deleted by a clean task; the build cache is always removed too.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CleanDescriptor {
    pub files: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AllDescriptor {
    pub depends_on: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InfoEntry {
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InfoDescriptor {
    pub source: String,
    pub tasks: Vec<InfoEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    pub version: u32,
    /// The diagram this was generated from.
    pub source: String,
    /// Pipeline tasks in dependency order.
    pub tasks: Vec<TaskDescriptor>,
    pub status: StatusDescriptor,
    pub clean: CleanDescriptor,
    pub clean_all: CleanDescriptor,
    pub all: AllDescriptor,
    pub info: InfoDescriptor,
}

impl Artifact {
    pub fn task(&self, name: &str) -> Option<&TaskDescriptor> {
        self.tasks.iter().find(|t| t.name == name)
    }

    pub fn load(path: &Path) -> anyhow::Result<Artifact> {
        let text = std::fs::read_to_string(path).with_context(|| {
            format!(
                "read {} (generate it first with `mmdbuild generate`)",
                path.display()
            )
        })?;
        let artifact: Artifact =
            serde_json::from_str(&text).with_context(|| format!("parse {}", path.display()))?;
        if artifact.version != FORMAT_VERSION {
            anyhow::bail!(
                "{}: artifact format {} is not supported (expected {}); regenerate it",
                path.display(),
                artifact.version,
                FORMAT_VERSION
            );
        }
        Ok(artifact)
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let mut text = serde_json::to_string_pretty(self)?;
        text.push('\n');
        std::fs::write(path, text).with_context(|| format!("write {}", path.display()))
    }
}
