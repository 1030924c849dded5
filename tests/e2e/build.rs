use crate::e2e::*;
use sha2::{Digest, Sha256};

const COMPILE: &str = "graph TD
I1[a.ly] --> T1[compile]; T1 --> R1[cp a.ly a.pdf]; R1 --> O1[a.pdf]
";

/// Two tasks chained through an intermediate file, exported at the end.
const PIPELINE: &str = "graph TD
I1[BWV000.ly] --> T1[render<br/>Render the score]
T1 --> R1[cp BWV000.ly BWV000.svg]
R1 --> O1[BWV000.svg]
O1 --> T2[publish]
T2 --> R2[cp BWV000.svg BWV000_final.svg]
R2 --> E1[BWV000_final.svg]
";

#[cfg(unix)]
#[test]
fn build_compile_task() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write("a.ly", "notes")?;
    space.generate(COMPILE)?;

    let out = space.run_expect(&mut mmdbuild_command(vec!["build", "compile"]))?;
    assert_output_contains(&out, "[compile]");
    assert_output_contains(&out, "$ cp a.ly a.pdf");
    assert_output_contains(&out, "mmdbuild: ran 1 tasks, now up to date");
    assert_eq!(space.read("a.pdf")?, b"notes");

    let cache = space.cache()?;
    let entry = cache["compile"].as_object().unwrap();
    assert_eq!(entry.len(), 1);
    let (path, hash) = entry.iter().next().unwrap();
    assert!(path.ends_with("/a.ly"), "{}", path);
    assert_eq!(hash, &format!("{:x}", Sha256::digest(b"notes")));
    Ok(())
}

#[cfg(unix)]
#[test]
fn build_without_project_name() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write("a.ly", "notes")?;
    space.generate(COMPILE)?;

    let mut cmd = mmdbuild_command(vec!["build"]);
    cmd.env_remove("PROJECT_NAME");
    let out = space.run_expect(&mut cmd)?;
    assert_output_contains(&out, "mmdbuild: ran 1 tasks, now up to date");
    assert_output_contains(&out, "all pipeline outputs are complete");
    assert_eq!(space.read("a.pdf")?, b"notes");

    let mut cmd = mmdbuild_command(vec!["build", "status"]);
    cmd.env_remove("PROJECT_NAME");
    space.run_expect(&mut cmd)?;

    // A pipeline naming its files after the project still needs one.
    space.generate(PIPELINE)?;
    let mut cmd = mmdbuild_command(vec!["build", "render"]);
    cmd.env_remove("PROJECT_NAME");
    let out = space.run(&mut cmd)?;
    assert_eq!(out.status.code(), Some(1));
    assert_stderr_contains(&out, "cannot determine project name");
    Ok(())
}

#[cfg(unix)]
#[test]
fn second_build_does_nothing() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write("a.ly", "notes")?;
    space.generate(COMPILE)?;
    space.run_expect(&mut mmdbuild_command(vec!["build", "compile"]))?;

    let out = space.run_expect(&mut mmdbuild_command(vec!["build", "compile"]))?;
    assert_output_contains(&out, "up to date");
    assert_output_contains(&out, "mmdbuild: no work to do");

    space.write("a.ly", "more notes")?;
    let out = space.run_expect(&mut mmdbuild_command(vec!["build", "compile"]))?;
    assert_output_contains(&out, "mmdbuild: ran 1 tasks, now up to date");
    assert_eq!(space.read("a.pdf")?, b"more notes");

    let out = space.run_expect(&mut mmdbuild_command(vec!["build", "--force", "compile"]))?;
    assert_output_contains(&out, "mmdbuild: ran 1 tasks, now up to date");
    Ok(())
}

#[cfg(unix)]
#[test]
fn deleting_cache_rebuilds_identically() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write("bwv1.ly", "score")?;
    space.generate(PIPELINE)?;
    space.run_expect(&mut mmdbuild_command(vec!["build"]))?;
    let first = space.read("bwv1_final.svg")?;

    space.remove(".build_cache.json")?;
    let out = space.run_expect(&mut mmdbuild_command(vec!["build"]))?;
    assert_output_contains(&out, "mmdbuild: ran 2 tasks, now up to date");
    assert_eq!(space.read("bwv1_final.svg")?, first);
    Ok(())
}

#[cfg(unix)]
#[test]
fn all_runs_pipeline_in_order() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write("bwv1.ly", "score")?;
    space.generate(PIPELINE)?;

    let out = space.run_expect(&mut mmdbuild_command(vec!["build"]))?;
    let stdout = String::from_utf8_lossy(&out.stdout);
    let render = stdout.find("[render] Render the score").unwrap();
    let publish = stdout.find("[publish] Publish").unwrap();
    assert!(render < publish, "{}", stdout);
    assert_output_contains(&out, "all pipeline outputs of bwv1 are complete");
    assert_eq!(space.read("bwv1_final.svg")?, b"score");
    Ok(())
}

#[cfg(unix)]
#[test]
fn requested_task_pulls_in_dependencies() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write("bwv1.ly", "score")?;
    space.generate(PIPELINE)?;

    // Only render runs for "render".
    let out = space.run_expect(&mut mmdbuild_command(vec!["build", "render"]))?;
    assert_output_contains(&out, "mmdbuild: ran 1 tasks, now up to date");
    assert!(!space.exists("bwv1_final.svg"));

    space.remove("bwv1.svg")?;
    space.remove(".build_cache.json")?;
    let out = space.run_expect(&mut mmdbuild_command(vec!["build", "publish"]))?;
    assert_output_contains(&out, "mmdbuild: ran 2 tasks, now up to date");
    assert!(space.exists("bwv1_final.svg"));
    Ok(())
}

#[cfg(unix)]
#[test]
fn failing_command_halts_build() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write("in.txt", "x")?;
    space.write("out.txt", "stale")?;
    space.generate(
        "graph TD
I1[in.txt] --> T1[first]
T1 --> R1[echo broken >&2 && exit 3]
R1 --> O1[out.txt]
O1 --> T2[second]
T2 --> R2[touch second.txt]
R2 --> E1[second.txt]
",
    )?;
    let out = space.run(&mut mmdbuild_command(vec!["build"]))?;
    assert_eq!(out.status.code(), Some(1));
    assert_output_contains(&out, "broken");
    assert_stderr_contains(
        &out,
        "mmdbuild: error: task first: command failed: echo broken >&2 && exit 3",
    );
    // The stale target was deleted before running and the next task never ran.
    assert!(!space.exists("out.txt"));
    assert!(!space.exists("second.txt"));
    // The cache entry is written before the command runs.
    assert!(space.cache()?.get("first").is_some());
    Ok(())
}

#[cfg(unix)]
#[test]
fn missing_target_is_an_error() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.generate(
        "graph TD
T1[lazy] --> R1[true]
R1 --> O1[never.txt]
",
    )?;
    let out = space.run(&mut mmdbuild_command(vec!["build", "lazy"]))?;
    assert_eq!(out.status.code(), Some(1));
    assert_stderr_contains(
        &out,
        "mmdbuild: error: task lazy: command succeeded but did not produce never.txt",
    );
    Ok(())
}

#[test]
fn unknown_task() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.generate(COMPILE)?;
    let out = space.run(&mut mmdbuild_command(vec!["build", "nope"]))?;
    assert_eq!(out.status.code(), Some(1));
    assert_stderr_contains(&out, "unknown task \"nope\"");
    Ok(())
}

#[test]
fn build_without_artifact() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    let out = space.run(&mut mmdbuild_command(vec!["build"]))?;
    assert_eq!(out.status.code(), Some(1));
    assert_stderr_contains(&out, "generate it first");
    Ok(())
}

#[test]
fn stub_task_is_skipped() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.generate("graph TD\nI1[a.txt] --> T1[someday]\n")?;
    let out = space.run_expect(&mut mmdbuild_command(vec!["build", "someday"]))?;
    assert_output_contains(&out, "task someday is not implemented yet");
    assert_output_contains(&out, "mmdbuild: no work to do");
    assert!(!space.exists(".build_cache.json"));
    Ok(())
}
