//! Runs task commands: shell command lines and interpreter scripts.
//! Unaware of the cache or of task ordering; just command execution.

use anyhow::{anyhow, Context};
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    Success,
    Interrupted,
    Failure,
}

/// The result of executing one command.
#[derive(Debug, Clone)]
pub struct TaskResult {
    pub termination: Termination,
    /// Console output, stdout followed by stderr.
    pub output: Vec<u8>,
}

impl TaskResult {
    pub fn success(&self) -> bool {
        self.termination == Termination::Success
    }
}

/// Python buffers its output when not attached to a terminal, so a plain
/// `python3 x.py` would only show its output once it finishes.
pub fn unbuffered(cmdline: &str) -> String {
    match cmdline.strip_prefix("python3 ") {
        Some(rest) if !rest.trim_start().starts_with("-u") => format!("python3 -u {}", rest),
        _ => cmdline.to_owned(),
    }
}

fn finish(out: std::process::Output) -> TaskResult {
    let mut output = out.stdout;
    output.extend_from_slice(&out.stderr);
    let termination = if out.status.success() {
        Termination::Success
    } else {
        signal_termination(&out.status, &mut output)
    };
    TaskResult {
        termination,
        output,
    }
}

#[cfg(unix)]
fn signal_termination(status: &std::process::ExitStatus, output: &mut Vec<u8>) -> Termination {
    use std::os::unix::process::ExitStatusExt;
    match status.signal() {
        Some(libc::SIGINT) => {
            output.extend_from_slice(b"interrupted");
            Termination::Interrupted
        }
        Some(sig) => {
            output.extend_from_slice(format!("signal {}", sig).as_bytes());
            Termination::Failure
        }
        None => Termination::Failure,
    }
}

#[cfg(not(unix))]
fn signal_termination(_status: &std::process::ExitStatus, _output: &mut Vec<u8>) -> Termination {
    Termination::Failure
}

/// Runs a command line through the shell in `cwd`, waiting for it to finish.
/// Returns an Err() only if the process could not be started.
pub fn run_command(cmdline: &str, cwd: &Path, env: &[(&str, &str)]) -> anyhow::Result<TaskResult> {
    debug!(cmdline, "spawn");
    let mut cmd = if cfg!(windows) {
        let mut cmd = std::process::Command::new("cmd");
        cmd.arg("/C").arg(cmdline);
        cmd
    } else {
        let mut cmd = std::process::Command::new("/bin/sh");
        cmd.arg("-c").arg(cmdline);
        cmd
    };
    cmd.current_dir(cwd);
    for (key, value) in env {
        cmd.env(key, value);
    }
    let out = cmd.output().with_context(|| format!("spawn {:?}", cmdline))?;
    Ok(finish(out))
}

/// Executes the deferred script calls of a pipeline.
pub trait ScriptRunner {
    /// Runs `script` with `args`.  An Err() means the script could not be
    /// run at all; a failing script is a result with a failed termination.
    fn run_script(
        &mut self,
        script: &str,
        args: &[String],
        project_name: &str,
        cwd: &Path,
    ) -> anyhow::Result<TaskResult>;

    /// The command line shown for a script call.
    fn describe(&self, script: &str, args: &[String]) -> String {
        let mut s = script.to_owned();
        for arg in args {
            s.push(' ');
            s.push_str(arg);
        }
        s
    }
}

/// Runs scripts from a directory through an interpreter, unbuffered.
pub struct InterpreterScripts {
    pub interpreter: String,
    pub scripts_dir: PathBuf,
}

impl InterpreterScripts {
    pub fn new(interpreter: impl Into<String>, scripts_dir: impl Into<PathBuf>) -> Self {
        InterpreterScripts {
            interpreter: interpreter.into(),
            scripts_dir: scripts_dir.into(),
        }
    }
}

impl ScriptRunner for InterpreterScripts {
    fn run_script(
        &mut self,
        script: &str,
        args: &[String],
        project_name: &str,
        cwd: &Path,
    ) -> anyhow::Result<TaskResult> {
        let path = self.scripts_dir.join(script);
        if !path.is_file() {
            return Err(anyhow!("script {} not found", path.display()));
        }
        debug!(script = %path.display(), ?args, "run script");
        let mut cmd = std::process::Command::new(&self.interpreter);
        cmd.arg("-u").arg(&path).args(args).current_dir(cwd);
        if !project_name.is_empty() {
            cmd.env("PROJECT_NAME", project_name);
        }
        let out = cmd
            .output()
            .with_context(|| format!("spawn {}", self.interpreter))?;
        Ok(finish(out))
    }

    fn describe(&self, script: &str, args: &[String]) -> String {
        let mut s = format!(
            "{} -u {}",
            self.interpreter,
            self.scripts_dir.join(script).display()
        );
        for arg in args {
            s.push(' ');
            s.push_str(arg);
        }
        s
    }
}
