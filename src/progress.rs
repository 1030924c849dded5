//! Build progress tracking and reporting, for the purpose of display to the
//! user.

use crate::task::{TaskResult, Termination};
use crate::work::BuildError;
use std::io::Write;

/// Trait for build progress notifications.
pub trait Progress {
    /// Called when the engine reaches a task, before deciding anything.
    fn task_started(&mut self, name: &str, description: &str);

    /// Called when a task's sources are unchanged.
    fn task_skipped(&mut self, name: &str, targets: &[String]);

    /// Called when a task will run; `deleted` are the stale targets removed.
    fn task_rebuilding(&mut self, name: &str, deleted: &[String]);

    /// Called before each command of a task runs.
    fn command_started(&mut self, cmdline: &str);

    /// Called when a command completes, successfully or not.
    fn command_finished(&mut self, cmdline: &str, result: &TaskResult);

    /// Called when a task ran and produced all of its targets.
    fn task_finished(&mut self, name: &str, generated: &[String]);

    /// Called when a task fails; the build stops afterwards.
    fn task_failed(&mut self, name: &str, err: &BuildError);

    /// Log a line of output.
    fn log(&mut self, msg: &str);
}

/// Progress implementation for a plain console, without any overprinting.
pub struct ConsoleProgress<W: Write = std::io::Stdout> {
    out: W,
}

impl ConsoleProgress {
    pub fn new() -> Self {
        ConsoleProgress {
            out: std::io::stdout(),
        }
    }
}

impl Default for ConsoleProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl<W: Write> ConsoleProgress<W> {
    pub fn with_writer(out: W) -> Self {
        ConsoleProgress { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn line(&mut self, msg: &str) {
        // Write errors are ignored.
        let _ = writeln!(self.out, "{}", msg);
    }

    fn list(&mut self, label: &str, files: &[String]) {
        if files.is_empty() {
            return;
        }
        self.line(&format!("  {}:", label));
        for f in files {
            self.line(&format!("    {}", f));
        }
    }
}

impl<W: Write> Progress for ConsoleProgress<W> {
    fn task_started(&mut self, name: &str, description: &str) {
        if description.is_empty() || description == name {
            self.line(&format!("[{}]", name));
        } else {
            self.line(&format!("[{}] {}", name, description));
        }
    }

    fn task_skipped(&mut self, _name: &str, targets: &[String]) {
        self.line("  up to date");
        self.list("targets", targets);
    }

    fn task_rebuilding(&mut self, _name: &str, deleted: &[String]) {
        self.list("deleted", deleted);
    }

    fn command_started(&mut self, cmdline: &str) {
        self.line(&format!("  $ {}", cmdline));
    }

    fn command_finished(&mut self, cmdline: &str, result: &TaskResult) {
        match result.termination {
            Termination::Success => {}
            Termination::Interrupted => self.line(&format!("interrupted: {}", cmdline)),
            Termination::Failure => self.line(&format!("failed: {}", cmdline)),
        }
        if !result.output.is_empty() {
            let _ = self.out.write_all(&result.output);
            if !result.output.ends_with(b"\n") {
                let _ = self.out.write_all(b"\n");
            }
        }
    }

    fn task_finished(&mut self, _name: &str, generated: &[String]) {
        self.list("generated", generated);
    }

    fn task_failed(&mut self, _name: &str, err: &BuildError) {
        if let BuildError::MissingTargets { missing, .. } = err {
            self.list("missing", missing);
        }
        self.line("  failed");
    }

    fn log(&mut self, msg: &str) {
        self.line(msg);
    }
}
