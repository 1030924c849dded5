//! Settings read from `mmdbuild.toml`, all optional.

use anyhow::Context;
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const CONFIG_FILE: &str = "mmdbuild.toml";

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Token in diagram labels standing for the project name.
    pub placeholder: String,
    pub cache_file: String,
    /// Prefix marking a runnable as a deferred script call.
    pub script_prefix: String,
    pub interpreter: String,
    pub scripts_dir: PathBuf,
    /// Host directory mounted into containerized commands.
    pub include_dir: Option<PathBuf>,
    pub include_mount: String,
    /// Source extensions that pull in the shared include sources.
    pub shared_extensions: Vec<String>,
    /// Input extensions treated as generated files by status and clean.
    pub generated_input_extensions: Vec<String>,
    pub project_marker_extension: String,
    pub project_name: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            placeholder: "BWV000".to_owned(),
            cache_file: ".build_cache.json".to_owned(),
            script_prefix: "bwv_script:".to_owned(),
            interpreter: "python3".to_owned(),
            scripts_dir: PathBuf::from("python"),
            include_dir: None,
            include_mount: "/work/includes".to_owned(),
            shared_extensions: vec!["ly".to_owned()],
            generated_input_extensions: vec!["csv".to_owned()],
            project_marker_extension: "ly".to_owned(),
            project_name: None,
        }
    }
}

impl Config {
    /// Loads `mmdbuild.toml` from `dir`, falling back to defaults when the
    /// file does not exist.  Relative directories in the file are resolved
    /// against `dir`.
    pub fn load(dir: &Path) -> anyhow::Result<Config> {
        let path = dir.join(CONFIG_FILE);
        let mut cfg = if path.exists() {
            let s = std::fs::read_to_string(&path)
                .with_context(|| format!("read {}", path.display()))?;
            toml::from_str::<Config>(&s).with_context(|| format!("parse {}", path.display()))?
        } else {
            Config::default()
        };

        if cfg.scripts_dir.is_relative() {
            cfg.scripts_dir = dir.join(&cfg.scripts_dir);
        }
        if let Some(include_dir) = &cfg.include_dir {
            if include_dir.is_relative() {
                cfg.include_dir = Some(dir.join(include_dir));
            }
        }

        if let Ok(v) = std::env::var("PROJECT_NAME") {
            if !v.trim().is_empty() {
                cfg.project_name = Some(v.trim().to_owned());
            }
        }
        Ok(cfg)
    }

    pub fn cache_path(&self, dir: &Path) -> PathBuf {
        dir.join(&self.cache_file)
    }
}
