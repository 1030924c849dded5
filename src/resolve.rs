//! Dependency resolution: turns task nodes of the graph into executable
//! descriptors.
//!
//! Only these edge kinds carry meaning; every other edge is ignored:
//!   Input -> Task, Output -> Task, Task -> Task,
//!   Task -> Runnable, Runnable -> Output, Runnable -> Export.

use crate::artifact::{CommandSpec, SourceExpr};
use crate::config::Config;
use crate::eval;
use crate::graph::{Graph, Node, NodeKind};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::warn;

/// The parts of the configuration that shape resolution.
#[derive(Debug, Clone)]
pub struct ResolveConfig {
    pub placeholder: String,
    pub script_prefix: String,
    pub include_dir: Option<PathBuf>,
    pub include_mount: String,
    pub shared_extensions: Vec<String>,
}

impl From<&Config> for ResolveConfig {
    fn from(config: &Config) -> Self {
        ResolveConfig {
            placeholder: config.placeholder.clone(),
            script_prefix: config.script_prefix.clone(),
            include_dir: config.include_dir.clone(),
            include_mount: config.include_mount.clone(),
            shared_extensions: config.shared_extensions.clone(),
        }
    }
}

impl Default for ResolveConfig {
    fn default() -> Self {
        ResolveConfig::from(&Config::default())
    }
}

/// A dependency cycle was broken by emitting `task` before its dependencies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleWarning {
    pub task: String,
}

fn output_flag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"(?:^|\s)-o\s+["']?([^\s"']+)"#).expect("valid -o regex"))
}

fn push_unique(v: &mut Vec<String>, s: String) {
    if !v.contains(&s) {
        v.push(s);
    }
}

pub struct Resolver<'a> {
    graph: &'a Graph,
    config: &'a ResolveConfig,
}

impl<'a> Resolver<'a> {
    pub fn new(graph: &'a Graph, config: &'a ResolveConfig) -> Self {
        Resolver { graph, config }
    }

    /// Replaces the placeholder token with a deferred project name reference.
    pub fn substitute(&self, text: &str) -> String {
        if self.config.placeholder.is_empty() {
            return text.to_owned();
        }
        text.replace(
            &self.config.placeholder,
            &format!("{{{}}}", eval::PROJECT_NAME),
        )
    }

    /// Task nodes in declaration order.
    pub fn tasks(&self) -> Vec<&'a Node> {
        self.graph.nodes_of_kind(NodeKind::Task).collect()
    }

    fn task_name(&self, id: &str) -> Option<String> {
        self.graph.node(id).map(|node| node.content.clone())
    }

    /// The runnable a task maps to.  A task should have exactly one; if it
    /// has several, the first declared edge wins.
    pub fn runnable(&self, task_id: &str) -> Option<&'a Node> {
        self.graph
            .edges_from(task_id)
            .filter(|e| e.is(NodeKind::Task, NodeKind::Runnable))
            .find_map(|e| self.graph.node(&e.to))
    }

    /// Names of the tasks that must run before `task_id`: tasks with a direct
    /// edge into it, and tasks whose runnable produces an output it reads.
    pub fn direct_dependencies(&self, task_id: &str) -> Vec<String> {
        let graph = self.graph;
        let mut deps = Vec::new();
        for edge in graph.edges_into(task_id) {
            if edge.is(NodeKind::Task, NodeKind::Task) {
                if let Some(name) = self.task_name(&edge.from) {
                    push_unique(&mut deps, name);
                }
            }
        }
        for edge in graph.edges_into(task_id) {
            if !edge.is(NodeKind::Output, NodeKind::Task) {
                continue;
            }
            for producer in graph.edges_into(&edge.from) {
                if producer.from_kind != NodeKind::Runnable {
                    continue;
                }
                for owner in graph.edges_into(&producer.from) {
                    if owner.from_kind == NodeKind::Task {
                        if let Some(name) = self.task_name(&owner.from) {
                            push_unique(&mut deps, name);
                        }
                    }
                }
            }
        }
        deps
    }

    fn is_shared_trigger(&self, path: &str) -> bool {
        match Path::new(path).extension().and_then(|e| e.to_str()) {
            Some(ext) => self.config.shared_extensions.iter().any(|s| s == ext),
            None => false,
        }
    }

    /// Files the task reads: every input or output node with an edge into it.
    pub fn sources(&self, task_id: &str) -> SourceExpr {
        let mut paths = Vec::new();
        for edge in self.graph.edges_into(task_id) {
            if !matches!(edge.from_kind, NodeKind::Input | NodeKind::Output) {
                continue;
            }
            if let Some(node) = self.graph.node(&edge.from) {
                push_unique(&mut paths, self.substitute(&node.content));
            }
        }
        let shared = paths.iter().any(|p| self.is_shared_trigger(p));
        match (paths.is_empty(), shared) {
            (true, true) => SourceExpr::Shared,
            (false, true) => SourceExpr::PathsAndShared(paths),
            (_, false) => SourceExpr::Paths(paths),
        }
    }

    /// Files the task produces: the outputs and exports of its runnable.
    /// Without any, a script call falls back to its `-o <file>` argument,
    /// which is only a heuristic.  For other commands `-o` may be a basename
    /// or a directory, so it is ignored.
    pub fn targets(&self, task_id: &str) -> Vec<String> {
        let mut targets = Vec::new();
        let runnable = match self.runnable(task_id) {
            Some(r) => r,
            None => return targets,
        };
        for edge in self.graph.edges_from(&runnable.id) {
            if !matches!(edge.to_kind, NodeKind::Output | NodeKind::Export) {
                continue;
            }
            if let Some(node) = self.graph.node(&edge.to) {
                push_unique(&mut targets, self.substitute(&node.content));
            }
        }
        if targets.is_empty() && self.is_script_call(runnable) {
            let command = self.substitute(&runnable.content);
            if let Some(cap) = output_flag_re().captures(&command) {
                targets.push(cap[1].to_owned());
            }
        }
        targets
    }

    fn is_script_call(&self, runnable: &Node) -> bool {
        runnable
            .content
            .trim()
            .starts_with(self.config.script_prefix.as_str())
    }

    fn is_containerized(command: &str) -> bool {
        let lower = command.to_lowercase();
        lower.contains("docker") && lower.contains("run")
    }

    /// The command a task runs, from the content of its runnable.
    pub fn command(&self, task_id: &str) -> CommandSpec {
        let runnable = match self.runnable(task_id) {
            Some(r) => r,
            None => return CommandSpec::NotImplemented,
        };
        let content = runnable.content.trim();

        if let Some(rest) = content.strip_prefix(&self.config.script_prefix) {
            let mut parts = rest.split_whitespace();
            let script = parts.next().unwrap_or("").to_owned();
            if script.is_empty() {
                warn!(task = task_id, "runnable {} names no script", runnable.id);
                return CommandSpec::NotImplemented;
            }
            let args = parts.map(|arg| self.substitute(arg)).collect();
            return CommandSpec::Deferred { script, args };
        }

        let mut command = self.substitute(content);
        if Self::is_containerized(&command) {
            command = command.replace("PWD", &format!("{{{}}}", eval::CWD));
            let mount = &self.config.include_mount;
            if let Some(dir) = &self.config.include_dir {
                command = command.replacen(
                    "docker run",
                    &format!("docker run -v {}:{}", dir.display(), mount),
                    1,
                );
            }
            command = command.replace("INCLUDES", &format!("-I {}", mount));
        }
        CommandSpec::Process {
            commands: vec![command],
        }
    }

    /// Orders tasks so each comes after its dependencies.  Each round emits
    /// every remaining task whose dependencies were all emitted in earlier
    /// rounds, in declaration order.  When no task is ready the graph has a
    /// cycle: the first remaining task is emitted anyway and a warning is
    /// recorded, so ordering always terminates.
    pub fn topological_order(&self, tasks: &[&'a Node]) -> (Vec<&'a Node>, Vec<CycleWarning>) {
        let deps: Vec<Vec<String>> = tasks
            .iter()
            .map(|t| self.direct_dependencies(&t.id))
            .collect();
        let mut remaining: Vec<usize> = (0..tasks.len()).collect();
        let mut emitted: Vec<&str> = Vec::new();
        let mut order = Vec::with_capacity(tasks.len());
        let mut warnings = Vec::new();

        while !remaining.is_empty() {
            let mut ready: Vec<usize> = remaining
                .iter()
                .copied()
                .filter(|&i| deps[i].iter().all(|d| emitted.contains(&d.as_str())))
                .collect();
            if ready.is_empty() {
                let forced = remaining[0];
                warn!(
                    task = %tasks[forced].content,
                    "potential dependency cycle, ordering task before its dependencies"
                );
                warnings.push(CycleWarning {
                    task: tasks[forced].content.clone(),
                });
                ready.push(forced);
            }
            for &i in &ready {
                emitted.push(&tasks[i].content);
                order.push(tasks[i]);
            }
            remaining.retain(|i| !ready.contains(i));
        }
        (order, warnings)
    }

    /// Tasks whose runnable produces an export, in export declaration order.
    pub fn final_tasks(&self) -> Vec<String> {
        let graph = self.graph;
        let mut finals = Vec::new();
        for export in graph.nodes_of_kind(NodeKind::Export) {
            let producer = graph
                .edges_into(&export.id)
                .find(|e| e.from_kind == NodeKind::Runnable);
            let producer = match producer {
                Some(e) => e,
                None => continue,
            };
            let owner = graph
                .edges_into(&producer.from)
                .find(|e| e.from_kind == NodeKind::Task);
            if let Some(name) = owner.and_then(|e| self.task_name(&e.from)) {
                push_unique(&mut finals, name);
            }
        }
        finals
    }
}
