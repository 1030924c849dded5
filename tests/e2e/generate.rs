use crate::e2e::*;

#[test]
fn generate_writes_artifact() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write(
        "tasks.mmd",
        "graph TD\nI1[a.ly] --> T1[compile]; T1 --> R1[lilypond a.ly]; R1 --> O1[a.pdf]\n",
    )?;
    let out = space.run_expect(&mut mmdbuild_command(vec![
        "generate",
        "--input",
        "tasks.mmd",
        "--output",
        "tasks.json",
    ]))?;
    assert_output_contains(&out, "mmdbuild: wrote tasks.json (1 tasks)");

    let json: serde_json::Value = serde_json::from_slice(&space.read("tasks.json")?)?;
    let task = &json["tasks"][0];
    assert_eq!(task["name"], "compile");
    assert_eq!(task["sources"]["paths"], serde_json::json!(["a.ly"]));
    assert_eq!(task["targets"], serde_json::json!(["a.pdf"]));
    assert_eq!(task["depends_on"], serde_json::json!([]));
    assert_eq!(task["command"]["kind"], "process");
    Ok(())
}

#[test]
fn missing_input_fails() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    let out = space.run(&mut mmdbuild_command(vec![
        "generate", "-i", "nope.mmd", "-o", "tasks.json",
    ]))?;
    assert_eq!(out.status.code(), Some(1));
    assert_stderr_contains(&out, "mmdbuild: error: input file nope.mmd not found");
    assert!(!space.exists("tasks.json"));
    Ok(())
}

#[test]
fn parse_error_fails() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write("tasks.mmd", "sequenceDiagram\nA->>B: hi\n")?;
    let out = space.run(&mut mmdbuild_command(vec![
        "generate", "-i", "tasks.mmd", "-o", "tasks.json",
    ]))?;
    assert_eq!(out.status.code(), Some(1));
    assert_stderr_contains(&out, "tasks.mmd:1:");
    assert!(!space.exists("tasks.json"));
    Ok(())
}

#[test]
fn unwritable_output_fails() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write("tasks.mmd", "graph TD\nT1[a]\n")?;
    let out = space.run(&mut mmdbuild_command(vec![
        "generate",
        "-i",
        "tasks.mmd",
        "-o",
        "missing/dir/tasks.json",
    ]))?;
    assert_eq!(out.status.code(), Some(1));
    Ok(())
}

#[test]
fn malformed_declarations_are_skipped() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.generate(
        "graph TD
T1[first] --> R1[touch a]
T2[broken
R1 --> O1[a]
",
    )?;
    let json: serde_json::Value = serde_json::from_slice(&space.read("tasks.json")?)?;
    let tasks = json["tasks"].as_array().unwrap();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0]["targets"], serde_json::json!(["a"]));
    Ok(())
}

#[test]
fn show_prints_analysis() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write(
        "tasks.mmd",
        "graph LR\nI1[a.ly<br/>Score] --> T1[compile]\nT1 --> R1[lilypond a.ly]\nR1 --> E1[a.pdf]\n",
    )?;
    let out = space.run_expect(&mut mmdbuild_command(vec!["show", "-i", "tasks.mmd"]))?;
    assert_output_contains(&out, "direction: LR");
    assert_output_contains(&out, "a.ly");
    assert_output_contains(&out, "Score");
    Ok(())
}
