//! Support code for e2e tests, which run mmdbuild as a binary.

mod build;
mod generate;
mod meta;

pub fn mmdbuild_binary() -> std::path::PathBuf {
    std::env::current_exe()
        .expect("test binary path")
        .parent()
        .expect("test binary directory")
        .parent()
        .expect("binary directory")
        .join("mmdbuild")
}

/// A command for the binary, with a fixed project name so detection does
/// not depend on the temp directory.
pub fn mmdbuild_command(args: Vec<&str>) -> std::process::Command {
    let mut cmd = std::process::Command::new(mmdbuild_binary());
    cmd.args(args);
    cmd.env("PROJECT_NAME", "bwv1");
    cmd.env_remove("MMDBUILD_LOG");
    cmd
}

fn print_output(out: &std::process::Output) {
    // Gross: use print! instead of writing to stdout so Rust test
    // framework can capture it.
    print!("{}", String::from_utf8_lossy(&out.stdout));
    print!("{}", String::from_utf8_lossy(&out.stderr));
}

pub fn assert_output_contains(out: &std::process::Output, text: &str) {
    let out = String::from_utf8_lossy(&out.stdout);
    if !out.contains(text) {
        panic!(
            "assertion failed; expected output to contain {:?} but got:\n{}",
            text, out
        );
    }
}

pub fn assert_stderr_contains(out: &std::process::Output, text: &str) {
    let err = String::from_utf8_lossy(&out.stderr);
    if !err.contains(text) {
        panic!(
            "assertion failed; expected stderr to contain {:?} but got:\n{}",
            text, err
        );
    }
}

/// Manages a temporary directory for invoking mmdbuild.
pub struct TestSpace {
    dir: tempfile::TempDir,
}

impl TestSpace {
    pub fn new() -> anyhow::Result<Self> {
        let dir = tempfile::tempdir()?;
        Ok(TestSpace { dir })
    }

    pub fn path(&self) -> &std::path::Path {
        self.dir.path()
    }

    /// Write a file into the working space, creating parent directories.
    pub fn write(&self, path: &str, content: &str) -> std::io::Result<()> {
        let path = self.dir.path().join(path);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)
    }

    /// Read a file from the working space.
    pub fn read(&self, path: &str) -> std::io::Result<Vec<u8>> {
        std::fs::read(self.dir.path().join(path))
    }

    pub fn exists(&self, path: &str) -> bool {
        self.dir.path().join(path).exists()
    }

    pub fn remove(&self, path: &str) -> std::io::Result<()> {
        std::fs::remove_file(self.dir.path().join(path))
    }

    /// Invoke mmdbuild, returning process output.
    pub fn run(&self, cmd: &mut std::process::Command) -> std::io::Result<std::process::Output> {
        cmd.current_dir(self.dir.path()).output()
    }

    /// Like run, but also print output if the command failed.
    pub fn run_expect(
        &self,
        cmd: &mut std::process::Command,
    ) -> anyhow::Result<std::process::Output> {
        let out = self.run(cmd)?;
        if !out.status.success() {
            print_output(&out);
            anyhow::bail!("mmdbuild failed, status {}", out.status);
        }
        Ok(out)
    }

    /// Writes `tasks.mmd` and generates `tasks.json` from it.
    pub fn generate(&self, diagram: &str) -> anyhow::Result<()> {
        self.write("tasks.mmd", diagram)?;
        self.run_expect(&mut mmdbuild_command(vec![
            "generate", "-i", "tasks.mmd", "-o", "tasks.json",
        ]))?;
        Ok(())
    }

    /// The parsed build cache.
    pub fn cache(&self) -> anyhow::Result<serde_json::Value> {
        let bytes = self.read(".build_cache.json")?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Persist the temp dir locally and abort the test.  Debugging helper.
    #[allow(dead_code)]
    pub fn eject(self) -> ! {
        panic!("ejected at {:?}", self.dir.into_path());
    }
}
