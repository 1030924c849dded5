//! Artifact generation: resolves every task of a diagram and adds the
//! aggregate tasks.

use crate::artifact::{
    AllDescriptor, Artifact, CleanDescriptor, FileCategory, InfoDescriptor, InfoEntry,
    StatusDescriptor, StatusEntry, TaskDescriptor, FORMAT_VERSION,
};
use crate::config::Config;
use crate::extract::{self, Document};
use crate::graph::{Node, NodeKind};
use crate::resolve::{ResolveConfig, Resolver};
use std::path::Path;
use tracing::{info, warn};

/// "make_pdf" -> "Make Pdf".
pub fn title_case(name: &str) -> String {
    name.split('_')
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

fn is_generated_input(config: &Config, node: &Node) -> bool {
    let path = Path::new(&node.content);
    let ext_match = match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => config.generated_input_extensions.iter().any(|g| g == ext),
        None => false,
    };
    ext_match || node.content.to_lowercase().contains("generated")
}

struct FileSets {
    exports: Vec<StatusEntry>,
    outputs: Vec<StatusEntry>,
    generated_inputs: Vec<StatusEntry>,
}

fn file_sets(doc: &Document, resolver: &Resolver, config: &Config) -> FileSets {
    let entry = |category: FileCategory, node: &Node| StatusEntry {
        category,
        description: if node.description.is_empty() {
            node.content.clone()
        } else {
            node.description.clone()
        },
        path: resolver.substitute(&node.content),
    };
    let graph = &doc.graph;
    FileSets {
        exports: graph
            .nodes_of_kind(NodeKind::Export)
            .map(|n| entry(FileCategory::Export, n))
            .collect(),
        outputs: graph
            .nodes_of_kind(NodeKind::Output)
            .map(|n| entry(FileCategory::Output, n))
            .collect(),
        generated_inputs: graph
            .nodes_of_kind(NodeKind::Input)
            .filter(|n| is_generated_input(config, n))
            .map(|n| entry(FileCategory::Input, n))
            .collect(),
    }
}

fn paths(lists: &[&[StatusEntry]]) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for entry in lists.iter().flat_map(|list| list.iter()) {
        if !out.contains(&entry.path) {
            out.push(entry.path.clone());
        }
    }
    out
}

/// Builds the artifact for an extracted document.
pub fn generate(doc: &Document, source: &str, config: &Config) -> Artifact {
    let resolve_config = ResolveConfig::from(config);
    let resolver = Resolver::new(&doc.graph, &resolve_config);

    let tasks = resolver.tasks();
    info!("found {} task nodes", tasks.len());
    let (ordered, cycles) = resolver.topological_order(&tasks);
    if !cycles.is_empty() {
        warn!("{} dependency cycle(s) broken by declaration order", cycles.len());
    }

    let descriptors: Vec<TaskDescriptor> = ordered
        .iter()
        .map(|node| TaskDescriptor {
            name: node.content.clone(),
            description: if node.description.is_empty() {
                title_case(&node.content)
            } else {
                node.description.clone()
            },
            depends_on: resolver.direct_dependencies(&node.id),
            sources: resolver.sources(&node.id),
            targets: resolver.targets(&node.id),
            command: resolver.command(&node.id),
        })
        .collect();

    let files = file_sets(doc, &resolver, config);
    let status = StatusDescriptor {
        files: files
            .exports
            .iter()
            .chain(&files.outputs)
            .chain(&files.generated_inputs)
            .cloned()
            .collect(),
    };
    let clean = CleanDescriptor {
        files: paths(&[files.outputs.as_slice(), files.generated_inputs.as_slice()]),
    };
    let clean_all = CleanDescriptor {
        files: paths(&[
            files.exports.as_slice(),
            files.outputs.as_slice(),
            files.generated_inputs.as_slice(),
        ]),
    };
    let info = InfoDescriptor {
        source: source.to_owned(),
        tasks: descriptors
            .iter()
            .map(|t| InfoEntry {
                name: t.name.clone(),
                description: t.description.clone(),
            })
            .collect(),
    };

    Artifact {
        version: FORMAT_VERSION,
        source: source.to_owned(),
        tasks: descriptors,
        status,
        clean,
        clean_all,
        all: AllDescriptor {
            depends_on: resolver.final_tasks(),
        },
        info,
    }
}

fn check_extension(path: &Path, expected: &[&str], what: &str) {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    if !expected.contains(&ext) {
        warn!("{} file {} does not have a {:?} extension", what, path.display(), expected);
    }
}

/// The `generate` command: diagram file in, artifact file out.
pub fn generate_file(input: &Path, output: &Path, config: &Config) -> anyhow::Result<Artifact> {
    check_extension(input, &["mmd", "mermaid"], "input");
    check_extension(output, &["json"], "output");
    if !input.exists() {
        anyhow::bail!("input file {} not found", input.display());
    }
    let doc = extract::load(input)?;
    if doc.skipped > 0 {
        warn!("{} declaration(s) skipped in {}", doc.skipped, input.display());
    }
    let source = input
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| input.display().to_string());
    let artifact = generate(&doc, &source, config);
    artifact.save(output)?;
    Ok(artifact)
}
