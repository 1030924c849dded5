use crate::e2e::*;

const PIPELINE: &str = "graph TD
I1[BWV000.ly] --> T1[render]
T1 --> R1[cp BWV000.ly BWV000.svg]
R1 --> O1[BWV000.svg<br/>Rendered score]
O1 --> T2[ties]
T2 --> R2[cp BWV000.svg BWV000_ties.csv]
R2 --> O2[BWV000_ties.csv]
O2 --> T3[publish<br/>Publish the score]
T3 --> R3[cp BWV000.svg BWV000_final.svg]
R3 --> E1[BWV000_final.svg]
";

#[cfg(unix)]
#[test]
fn clean_keeps_exports() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write("bwv1.ly", "score")?;
    space.generate(PIPELINE)?;
    space.run_expect(&mut mmdbuild_command(vec!["build"]))?;

    let out = space.run_expect(&mut mmdbuild_command(vec!["build", "clean"]))?;
    assert_output_contains(&out, "deleted intermediate files:\n  bwv1.svg\n  bwv1_ties.csv\n");
    assert_output_contains(&out, "deleted build cache");
    assert!(space.exists("bwv1_final.svg"));
    assert!(space.exists("bwv1.ly"));
    assert!(!space.exists("bwv1.svg"));
    assert!(!space.exists(".build_cache.json"));

    let out = space.run_expect(&mut mmdbuild_command(vec!["build", "clean"]))?;
    assert_output_contains(&out, "deleted intermediate files: ∅");
    Ok(())
}

#[cfg(unix)]
#[test]
fn clean_all_deletes_exports() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write("bwv1.ly", "score")?;
    space.generate(PIPELINE)?;
    space.run_expect(&mut mmdbuild_command(vec!["build"]))?;

    let out = space.run_expect(&mut mmdbuild_command(vec!["build", "clean-all"]))?;
    assert_output_contains(&out, "bwv1_final.svg");
    assert!(!space.exists("bwv1_final.svg"));
    assert!(!space.exists("bwv1_ties.csv"));
    assert!(space.exists("bwv1.ly"));
    Ok(())
}

#[test]
fn status_lists_missing_files() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.generate(PIPELINE)?;
    space.write("bwv1.svg", "svg")?;
    let out = space.run_expect(&mut mmdbuild_command(vec!["build", "status"]))?;
    assert_output_contains(&out, "project: bwv1");
    let stdout = String::from_utf8_lossy(&out.stdout);
    let missing = stdout.find("bwv1_final.svg").unwrap();
    let present = stdout.find("Rendered score").unwrap();
    assert!(missing < present, "{}", stdout);
    assert_output_contains(&out, "(3 bytes, ");
    Ok(())
}

#[test]
fn info_lists_tasks() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.generate(PIPELINE)?;
    let out = space.run_expect(&mut mmdbuild_command(vec!["build", "info"]))?;
    assert_output_contains(&out, "pipeline: tasks.mmd");
    assert_output_contains(&out, "  publish              Publish the score\n");
    assert_output_contains(&out, "  ties                 Ties\n");
    Ok(())
}
