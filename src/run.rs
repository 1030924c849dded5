use anyhow::anyhow;
use argh::FromArgs;
use std::path::{Path, PathBuf};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::{
    artifact::{self, Artifact},
    cache::CacheStore,
    config::Config,
    eval::{self, Vars},
    extract, generate, meta,
    progress::ConsoleProgress,
    project,
    shared::IncludeScanner,
    task::InterpreterScripts,
    work::Work,
};

/// Incremental build engine for pipelines drawn as flowchart diagrams.
#[derive(FromArgs)]
struct Args {
    /// chdir before running
    #[argh(option, short = 'C')]
    chdir: Option<String>,

    /// print debug logging
    #[argh(switch, short = 'v')]
    verbose: bool,

    #[argh(subcommand)]
    command: Command,
}

#[derive(FromArgs)]
#[argh(subcommand)]
enum Command {
    Generate(GenerateArgs),
    Build(BuildArgs),
    Show(ShowArgs),
}

/// Resolve a diagram into a task artifact.
#[derive(FromArgs)]
#[argh(subcommand, name = "generate")]
struct GenerateArgs {
    /// diagram file to read
    #[argh(option, short = 'i')]
    input: String,

    /// artifact file to write
    #[argh(option, short = 'o')]
    output: String,
}

/// Run a task of a generated artifact and everything it depends on.
#[derive(FromArgs)]
#[argh(subcommand, name = "build")]
struct BuildArgs {
    /// artifact file [default=tasks.json]
    #[argh(option, short = 'f', default = "String::from(\"tasks.json\")")]
    file: String,

    /// rebuild even if sources are unchanged
    #[argh(switch)]
    force: bool,

    /// task to run [default=all]
    #[argh(positional)]
    task: Option<String>,
}

/// Print the analysed graph of a diagram.
#[derive(FromArgs)]
#[argh(subcommand, name = "show")]
struct ShowArgs {
    /// diagram file to read
    #[argh(option, short = 'i')]
    input: String,
}

fn init_logging(verbose: bool) {
    let filter = EnvFilter::try_from_env("MMDBUILD_LOG")
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "warn" }));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .try_init()
        .ok();
}

fn run_aggregate(
    name: &str,
    manifest: &Artifact,
    vars: &Vars,
    cache: &mut CacheStore,
) -> anyhow::Result<()> {
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    match name {
        artifact::STATUS => meta::status(&manifest.status, vars, &vars.cwd, &mut out)?,
        artifact::CLEAN => {
            meta::clean(
                "intermediate files",
                &manifest.clean,
                vars,
                &vars.cwd,
                cache,
                &mut out,
            )?;
        }
        artifact::CLEAN_ALL => {
            meta::clean(
                "all generated files",
                &manifest.clean_all,
                vars,
                &vars.cwd,
                cache,
                &mut out,
            )?;
        }
        artifact::INFO => meta::info(&manifest.info, vars, &mut out)?,
        _ => unreachable!("not an aggregate: {}", name),
    }
    Ok(())
}

/// Whether an aggregate task touches paths named after the project.
fn aggregate_needs_project_name(name: &str, manifest: &Artifact) -> bool {
    let mentions = |path: &String| eval::mentions(path, eval::PROJECT_NAME);
    match name {
        artifact::STATUS => manifest.status.files.iter().any(|f| mentions(&f.path)),
        artifact::CLEAN => manifest.clean.files.iter().any(mentions),
        artifact::CLEAN_ALL => manifest.clean_all.files.iter().any(mentions),
        _ => false,
    }
}

fn build(cwd: &Path, config: &Config, args: &BuildArgs) -> anyhow::Result<i32> {
    let manifest = Artifact::load(&cwd.join(&args.file))?;
    // A missing project name only matters once something planned refers to
    // it.
    let (project_name, mut undetected) = match project::detect(config, cwd) {
        Ok(name) => (name, None),
        Err(err) => {
            debug!("no project name: {:#}", err);
            (String::new(), Some(err))
        }
    };
    let vars = Vars {
        project_name: project_name.clone(),
        cwd: cwd.to_path_buf(),
    };
    let mut cache = CacheStore::open(&config.cache_path(cwd));

    let name = match args.task.as_deref() {
        None => artifact::ALL,
        Some("clean-all") => artifact::CLEAN_ALL,
        Some(name) => name,
    };
    if name != artifact::ALL && artifact::AGGREGATES.contains(&name) {
        if aggregate_needs_project_name(name, &manifest) {
            if let Some(err) = undetected.take() {
                return Err(err);
            }
        }
        run_aggregate(name, &manifest, &vars, &mut cache)?;
        return Ok(0);
    }

    let mut progress = ConsoleProgress::new();
    let mut scripts = InterpreterScripts::new(&config.interpreter, &config.scripts_dir);
    let shared = IncludeScanner::new(cwd, &config.project_marker_extension);
    let mut work = Work::new(
        &manifest,
        vars.clone(),
        &mut cache,
        &mut progress,
        &mut scripts,
        &shared,
    );
    work.set_force(args.force);
    if name == artifact::ALL {
        for task in &manifest.all.depends_on {
            work.want_task(task)?;
        }
    } else {
        work.want_task(name)?;
    }
    if work.needs_project_name() {
        if let Some(err) = undetected.take() {
            return Err(err);
        }
    }
    if name == artifact::ALL {
        if project_name.is_empty() {
            println!("building all outputs");
        } else {
            println!("building all outputs for project {}", project_name);
        }
    }
    debug!(planned = ?work.planned(), "build plan");

    let rebuilt = work.run()?;
    if rebuilt == 0 {
        // Special case: don't print numbers when no work done.
        println!("mmdbuild: no work to do");
    } else {
        println!("mmdbuild: ran {} tasks, now up to date", rebuilt);
    }
    if name == artifact::ALL {
        meta::all_done(&vars, &mut std::io::stdout())?;
    }
    Ok(0)
}

fn run_impl(args: Args) -> anyhow::Result<i32> {
    if let Some(dir) = &args.chdir {
        let dir = Path::new(dir);
        std::env::set_current_dir(dir).map_err(|err| anyhow!("chdir {:?}: {}", dir, err))?;
    }
    let cwd = std::env::current_dir()?;
    let config = Config::load(&cwd)?;

    match args.command {
        Command::Generate(gen_args) => {
            let output = PathBuf::from(&gen_args.output);
            let manifest = generate::generate_file(Path::new(&gen_args.input), &output, &config)?;
            println!(
                "mmdbuild: wrote {} ({} tasks)",
                output.display(),
                manifest.tasks.len()
            );
            Ok(0)
        }
        Command::Show(show) => {
            let doc = extract::load(Path::new(&show.input))?;
            extract::display(&doc, &mut std::io::stdout().lock())?;
            Ok(0)
        }
        Command::Build(build_args) => build(&cwd, &config, &build_args),
    }
}

pub fn run() -> anyhow::Result<i32> {
    let args: Args = argh::from_env();
    init_logging(args.verbose);
    run_impl(args)
}
