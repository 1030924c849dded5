//! Shared sources: files every score-compiling task depends on without the
//! diagram naming them, found by following `\include` directives.

use regex::Regex;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::warn;

/// Resolves the auxiliary sources of a project.
pub trait SharedSources {
    fn shared_sources(&self, project_name: &str) -> Vec<PathBuf>;
}

fn include_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"\\include\s+"([^"]+)""#).expect("valid include regex"))
}

/// Follows `\include "file"` directives starting at `<project>.<ext>`.
pub struct IncludeScanner {
    pub root: PathBuf,
    pub extension: String,
}

impl IncludeScanner {
    pub fn new(root: impl Into<PathBuf>, extension: impl Into<String>) -> Self {
        IncludeScanner {
            root: root.into(),
            extension: extension.into(),
        }
    }

    fn visit(&self, path: &Path, seen: &mut HashSet<PathBuf>, out: &mut Vec<PathBuf>) {
        if !seen.insert(path.to_path_buf()) {
            return;
        }
        out.push(path.to_path_buf());
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(err) => {
                warn!("could not read {}: {}", path.display(), err);
                return;
            }
        };
        let parent = path.parent().unwrap_or(Path::new(""));
        for cap in include_re().captures_iter(&text) {
            let include = Path::new(&cap[1]);
            let include = if include.is_absolute() {
                include.to_path_buf()
            } else {
                parent.join(include)
            };
            if !include.exists() {
                continue;
            }
            let follow = matches!(
                include.extension().and_then(|e| e.to_str()),
                Some("ly") | Some("ily")
            );
            if follow {
                self.visit(&include, seen, out);
            } else if seen.insert(include.clone()) {
                out.push(include);
            }
        }
    }
}

impl SharedSources for IncludeScanner {
    fn shared_sources(&self, project_name: &str) -> Vec<PathBuf> {
        let main = self
            .root
            .join(format!("{}.{}", project_name, self.extension));
        if !main.exists() {
            return Vec::new();
        }
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        self.visit(&main, &mut seen, &mut out);
        out
    }
}
