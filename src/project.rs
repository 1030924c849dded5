//! Works out the project identifier substituted for `{PROJECT_NAME}`.

use crate::config::Config;
use std::path::Path;
use tracing::{debug, info};

fn git_toplevel_name(dir: &Path) -> Option<String> {
    let out = std::process::Command::new("git")
        .args(["rev-parse", "--show-toplevel"])
        .current_dir(dir)
        .output()
        .ok()?;
    if !out.status.success() {
        return None;
    }
    let top = String::from_utf8(out.stdout).ok()?;
    Path::new(top.trim())
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
}

/// Resolves the project name: an explicit setting wins, then the git
/// repository name, then the directory name.  A detected name only counts if
/// `<name>.<marker>` exists in `dir`.
pub fn detect(config: &Config, dir: &Path) -> anyhow::Result<String> {
    if let Some(name) = &config.project_name {
        return Ok(name.clone());
    }

    let marker = &config.project_marker_extension;
    let has_marker = |name: &str| dir.join(format!("{}.{}", name, marker)).exists();

    match git_toplevel_name(dir) {
        Some(name) if has_marker(&name) => {
            info!(project = %name, "detected project from git");
            return Ok(name);
        }
        Some(name) => debug!(
            project = %name,
            "git repository name has no matching .{} file",
            marker
        ),
        None => debug!("not in a git repository"),
    }

    let dir_name = dir
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    if !dir_name.is_empty() && has_marker(&dir_name) {
        info!(project = %dir_name, "detected project from directory name");
        return Ok(dir_name);
    }

    anyhow::bail!(
        "cannot determine project name: no {}.{} in {}; set PROJECT_NAME or project_name in mmdbuild.toml",
        dir_name,
        marker,
        dir.display()
    )
}
