use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::json;
use std::fs;
use tempfile::TempDir;

const TOKENS: &[&str] = &["<unk>", "<eos>", "<pad>", "<c-begin>", "The", "sky", "was", "blue", "."];

/// Workspace holding an empty config file and a model that continues with "was blue."
fn workspace() -> TempDir {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("config.toml"), "").unwrap();

    let model = dir.path().join("model");
    fs::create_dir(&model).unwrap();
    fs::write(
        model.join("vocab.json"),
        json!({ "tokens": TOKENS, "eos_token": "<eos>", "pad_token": "<pad>" }).to_string(),
    )
    .unwrap();
    fs::write(
        model.join("config.json"),
        json!({ "vocab_size": TOKENS.len(), "max_position_embeddings": 64 }).to_string(),
    )
    .unwrap();
    fs::write(
        model.join("bigram.json"),
        json!({
            "smoothing": 0.01,
            "transitions": {
                "3": { "6": 100.0 },
                "5": { "6": 100.0 },
                "6": { "7": 100.0 },
                "7": { "8": 100.0 },
                "8": { "1": 100.0 }
            }
        })
        .to_string(),
    )
    .unwrap();
    dir
}

fn quill(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("quill").unwrap();
    cmd.env("QUILL_CONFIG", dir.path().join("config.toml"));
    cmd
}

#[test]
fn help_mentions_subcommands() {
    Command::cargo_bin("quill")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("generate").and(predicate::str::contains("info")));
}

#[test]
fn unknown_family_fails_before_touching_files() {
    let dir = workspace();
    // A broken config file would fail to load if it were read first.
    fs::write(dir.path().join("config.toml"), "not = [valid").unwrap();
    let output = dir.path().join("results.tsv");

    quill(&dir)
        .args(["generate", "--model-type", "bert", "--model"])
        .arg(dir.path().join("missing-model"))
        .arg("--prompt-file")
        .arg(dir.path().join("missing.tsv"))
        .arg("--output-file")
        .arg(&output)
        .assert()
        .failure()
        .stderr(predicate::str::contains("not supported"));

    assert!(!output.exists());
}

#[test]
fn batch_writes_one_row_per_prompt() {
    let dir = workspace();
    let input = dir.path().join("prompts.tsv");
    let output = dir.path().join("results.tsv");
    fs::write(&input, "title\tcontent\nThe sky\tThe sky was blue.\nThe\tref\n").unwrap();

    quill(&dir)
        .args(["generate", "--model-type", "GPT2", "--stop-token", "<eos>", "--model"])
        .arg(dir.path().join("model"))
        .arg("--prompt-file")
        .arg(&input)
        .arg("--output-file")
        .arg(&output)
        .assert()
        .success();

    let content = fs::read_to_string(&output).unwrap();
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(
        lines,
        vec![
            "prompt\tref_fact\tref\tgen\tstyle_label",
            "The sky\tThe sky\tThe sky was blue.\twas blue.\t1",
            "The\tThe\tref\twas blue.\t1",
        ]
    );
}

#[test]
fn missing_prompt_file_fails_without_output() {
    let dir = workspace();
    let output = dir.path().join("results.tsv");

    quill(&dir)
        .args(["generate", "--model-type", "gpt2", "--model"])
        .arg(dir.path().join("model"))
        .arg("--prompt-file")
        .arg(dir.path().join("missing.tsv"))
        .arg("--output-file")
        .arg(&output)
        .assert()
        .failure();

    assert!(!output.exists());
}

#[test]
fn interactive_session_ends_on_sentinel() {
    let dir = workspace();

    quill(&dir)
        .args(["generate", "--model-type", "gpt2", "--no-file", "--model"])
        .arg(dir.path().join("model"))
        .write_stdin("The sky\nexit\nThe sky\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("Prompt Text>> The sky was blue. <eos>").and(
            predicate::str::contains("Prompt Text>> ").count(2),
        ));
}

#[test]
fn interactive_json_summary_counts_tokens() {
    let dir = workspace();

    let output = quill(&dir)
        .args(["--json", "generate", "--model-type", "gpt2", "--no-file", "--model"])
        .arg(dir.path().join("model"))
        .write_stdin("The sky\n")
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let stdout = String::from_utf8(output).unwrap();
    let summary = &stdout[stdout.find('{').unwrap()..];
    let summary: serde_json::Value = serde_json::from_str(summary).unwrap();
    assert_eq!(summary["mode"], "interactive");
    assert_eq!(summary["prompts"], 1);
    assert_eq!(summary["generated_tokens"], 4);
}

#[test]
fn info_reports_resolved_length() {
    let dir = workspace();

    let output = quill(&dir)
        .args(["--json", "info", "--model-type", "xlnet", "--length", "-1", "--model"])
        .arg(dir.path().join("model"))
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let info: serde_json::Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(info["family"], "xlnet");
    assert_eq!(info["preprocessing"], "padding_dependent");
    assert_eq!(info["capacity"], 64);
    assert_eq!(info["resolved_length"], 64);
    assert_eq!(info["vocab_size"], TOKENS.len());
}
