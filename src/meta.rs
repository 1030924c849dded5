//! Bodies of the aggregate tasks: status, clean, clean_all, all and info.

use crate::artifact::{self, CleanDescriptor, InfoDescriptor, StatusDescriptor};
use crate::cache::CacheStore;
use crate::eval::{self, Vars};
use chrono::{DateTime, Local};
use std::io::Write;
use std::path::Path;
use std::time::SystemTime;

struct FileInfo<'a> {
    category: &'static str,
    description: &'a str,
    path: String,
    /// None when the file is missing.
    stat: Option<(u64, SystemTime)>,
}

/// Pipelines that never mention the project may run without one.
fn project_line(out: &mut dyn Write, label: &str, vars: &Vars) -> std::io::Result<()> {
    if vars.project_name.is_empty() {
        return Ok(());
    }
    writeln!(out, "{}{}", label, vars.project_name)
}

fn format_mtime(mtime: SystemTime) -> String {
    DateTime::<Local>::from(mtime)
        .format("%Y-%m-%d %H:%M:%S")
        .to_string()
}

/// Prints every tracked file, oldest first; missing files come before all
/// existing ones.
pub fn status(
    desc: &StatusDescriptor,
    vars: &Vars,
    cwd: &Path,
    out: &mut dyn Write,
) -> std::io::Result<()> {
    project_line(out, "project: ", vars)?;
    let mut infos: Vec<FileInfo> = desc
        .files
        .iter()
        .map(|entry| {
            let path = eval::expand(&entry.path, vars);
            let stat = std::fs::metadata(cwd.join(&path))
                .ok()
                .and_then(|m| Some((m.len(), m.modified().ok()?)));
            FileInfo {
                category: entry.category.name(),
                description: &entry.description,
                path,
                stat,
            }
        })
        .collect();
    infos.sort_by_key(|info| info.stat.map(|(_, mtime)| mtime));

    writeln!(out, "build status:")?;
    for info in &infos {
        let detail = match info.stat {
            Some((size, mtime)) => format!("{} bytes, {}", size, format_mtime(mtime)),
            None => "missing".to_owned(),
        };
        writeln!(
            out,
            "  {:<6} {:<20} {:<40} ({})",
            info.category, info.description, info.path, detail
        )?;
    }
    Ok(())
}

/// Deletes the listed files that exist and the build cache.  Returns the
/// deleted paths.
pub fn clean(
    label: &str,
    desc: &CleanDescriptor,
    vars: &Vars,
    cwd: &Path,
    cache: &mut CacheStore,
    out: &mut dyn Write,
) -> anyhow::Result<Vec<String>> {
    project_line(out, "project: ", vars)?;
    let mut deleted = Vec::new();
    for file in &desc.files {
        let path = eval::expand(file, vars);
        let full = cwd.join(&path);
        if full.is_file() {
            std::fs::remove_file(&full)
                .map_err(|err| anyhow::anyhow!("remove {}: {}", full.display(), err))?;
            deleted.push(path);
        }
    }
    if deleted.is_empty() {
        writeln!(out, "deleted {}: ∅", label)?;
    } else {
        writeln!(out, "deleted {}:", label)?;
        for path in &deleted {
            writeln!(out, "  {}", path)?;
        }
    }
    if cache.remove()? {
        writeln!(out, "deleted build cache {}", cache.path().display())?;
    }
    Ok(deleted)
}

pub fn all_done(vars: &Vars, out: &mut dyn Write) -> std::io::Result<()> {
    if vars.project_name.is_empty() {
        writeln!(out, "all pipeline outputs are complete")
    } else {
        writeln!(out, "all pipeline outputs of {} are complete", vars.project_name)
    }
}

pub fn info(desc: &InfoDescriptor, vars: &Vars, out: &mut dyn Write) -> std::io::Result<()> {
    project_line(out, "project:  ", vars)?;
    writeln!(out, "pipeline: {}", desc.source)?;
    writeln!(out, "tasks:")?;
    let aggregates = [
        (artifact::STATUS, "show file status"),
        (artifact::CLEAN, "delete intermediate files"),
        (artifact::CLEAN_ALL, "delete all generated files"),
        (artifact::ALL, "build all final outputs"),
        (artifact::INFO, "this information"),
    ];
    for (name, what) in aggregates {
        writeln!(out, "  {:<20} {}", name, what)?;
    }
    writeln!(out, "pipeline tasks ({}):", desc.source)?;
    for task in &desc.tasks {
        writeln!(out, "  {:<20} {}", task.name, task.description)?;
    }
    Ok(())
}
