#![cfg(unix)]

use std::fs;
use std::path::Path;

use assert_cmd::Command;
use serde_json::Value;
use tempfile::tempdir;

const REPLY: &str = r#"{"batchResult":[{"data":{"findManyWeeklySlot":[{"id":"s1"}]}},{"errors":[{"error":"raw","user_facing_error":{"error_code":"P2025","message":"Record not found"}}]}]}"#;

fn write_engine_config(dir: &Path) -> std::path::PathBuf {
    let script = dir.join("engine.sh");
    fs::write(
        &script,
        format!("while read -r line; do printf '%s\\n' '{REPLY}'; done\n"),
    )
    .unwrap();
    let config = dir.join("client.toml");
    fs::write(
        &config,
        format!(
            "[engine]\npath = \"sh\"\nargs = [\"{}\"]\n\n[coalescer]\nwindow_ms = 0\n",
            script.display()
        ),
    )
    .unwrap();
    config
}

fn slotbook(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("slotbook").unwrap();
    cmd.env("XDG_CONFIG_HOME", dir)
        .env_remove("SLOTBOOK_ENGINE")
        .env_remove("SLOTBOOK_WINDOW_MS")
        .env_remove("SLOTBOOK_LOG")
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn run_prints_one_line_per_query() {
    let dir = tempdir().unwrap();
    let config = write_engine_config(dir.path());
    let queries = dir.path().join("queries.jsonl");
    fs::write(
        &queries,
        concat!(
            "{\"modelName\":\"WeeklySlot\",\"action\":\"findMany\",\"query\":{\"where\":{\"weekday\":\"MONDAY\"}}}\n",
            "\n",
            "// lookup by id\n",
            "{\"modelName\":\"Booking\",\"action\":\"findUnique\",\"query\":{\"where\":{\"id\":\"b404\"}}}\n",
        ),
    )
    .unwrap();

    let output = slotbook(dir.path())
        .arg("--config")
        .arg(&config)
        .arg("run")
        .arg("--queries")
        .arg(&queries)
        .arg("--stats")
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));

    let stdout = String::from_utf8(output.stdout).unwrap();
    let lines: Vec<Value> = stdout
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0]["ok"][0]["id"], "s1");
    assert_eq!(lines[1]["error"]["kind"], "engine");
    assert_eq!(lines[1]["error"]["code"], "P2025");

    let stderr = String::from_utf8(output.stderr).unwrap();
    let stats: Value = stderr
        .lines()
        .filter_map(|line| serde_json::from_str(line).ok())
        .last()
        .unwrap();
    assert_eq!(stats["batches_flushed"], 1);
    assert_eq!(stats["max_batch_size"], 2);
}

#[test]
fn run_rejects_malformed_document() {
    let dir = tempdir().unwrap();
    let config = write_engine_config(dir.path());
    let queries = dir.path().join("bad.jsonl");
    fs::write(&queries, "{\"action\":\"fly\"}\n").unwrap();

    let output = slotbook(dir.path())
        .arg("--config")
        .arg(&config)
        .arg("run")
        .arg("--queries")
        .arg(&queries)
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.contains("bad.jsonl:1"), "{stderr}");
}

#[test]
fn run_without_engine_fails() {
    let dir = tempdir().unwrap();
    let queries = dir.path().join("q.jsonl");
    fs::write(&queries, "").unwrap();
    let output = slotbook(dir.path())
        .arg("run")
        .arg("--queries")
        .arg(&queries)
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8(output.stderr)
        .unwrap()
        .contains("no query engine configured"));
}

#[test]
fn config_prints_resolved_values() {
    let dir = tempdir().unwrap();
    let config = write_engine_config(dir.path());
    let output = slotbook(dir.path())
        .env("SLOTBOOK_WINDOW_MS", "7")
        .arg("--config")
        .arg(&config)
        .arg("config")
        .output()
        .unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    let parsed: toml::Value = toml::from_str(&stdout).unwrap();
    assert_eq!(parsed["coalescer"]["window_ms"].as_integer(), Some(7));
    assert_eq!(parsed["engine"]["path"].as_str(), Some("sh"));
}
