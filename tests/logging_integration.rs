use serde_json::Value;
use std::fs;
use std::net::TcpListener;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::time::{SystemTime, UNIX_EPOCH};

fn closed_port_base_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind should succeed");
    let addr = listener.local_addr().expect("address should be available");
    drop(listener);
    format!("http://{addr}/v1")
}

fn run_with_logging_env(
    config_dir: &Path,
    log_output: &str,
    log_format: &str,
    log_file_path: Option<&Path>,
) -> Output {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_parley"));
    cmd.arg("hi")
        .env("PARLEY_CONFIG_DIR", config_dir)
        .env("API_KEY", "sk-logging-test")
        .env("API_BASE_URL", closed_port_base_url())
        .env_remove("MODEL")
        .env("RUST_LOG", "parley=info")
        .env("LOG_OUTPUT", log_output)
        .env("LOG_FORMAT", log_format);

    if let Some(path) = log_file_path {
        cmd.env("LOG_FILE_PATH", path);
    } else {
        cmd.env_remove("LOG_FILE_PATH");
    }

    cmd.output().expect("failed to run parley binary")
}

fn unique_temp_dir(suffix: &str) -> PathBuf {
    let stamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock should be after unix epoch")
        .as_nanos();
    let dir = std::env::temp_dir().join(format!(
        "parley-logging-{suffix}-{stamp}-{}",
        std::process::id()
    ));
    fs::create_dir_all(&dir).expect("failed to create temp directory");
    dir
}

fn find_rotated_log_file(dir: &Path, base_file_name: &str) -> PathBuf {
    let expected_prefix = format!("{base_file_name}.");
    let mut matches: Vec<PathBuf> = fs::read_dir(dir)
        .expect("failed to read temp directory")
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.file_name()
                .and_then(|name| name.to_str())
                .map(|name| name.starts_with(&expected_prefix))
                .unwrap_or(false)
        })
        .collect();

    matches.sort();
    matches
        .pop()
        .expect("expected a rotated log file to be created")
}

fn assert_sentinel_reply(output: &Output) {
    assert!(
        output.status.success(),
        "remote failure should not fail the command: {:?}",
        output
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout.trim(), "Error: Unable to fetch response");
}

#[test]
fn json_format_emits_json_log_lines_on_stderr() {
    let dir = unique_temp_dir("json");
    let output = run_with_logging_env(&dir, "stderr", "json", None);
    assert_sentinel_reply(&output);

    let stderr = String::from_utf8_lossy(&output.stderr);
    let json_lines: Vec<&str> = stderr
        .lines()
        .filter(|line| line.trim_start().starts_with('{'))
        .collect();
    assert!(
        !json_lines.is_empty(),
        "expected at least one JSON log line, got stderr:\n{stderr}"
    );

    let parsed: Vec<Value> = json_lines
        .iter()
        .map(|line| serde_json::from_str::<Value>(line).expect("line should be valid JSON"))
        .collect();
    assert!(
        parsed.iter().any(|entry| {
            entry
                .get("fields")
                .and_then(|fields| fields.get("message"))
                .and_then(Value::as_str)
                == Some("resolved runtime configuration")
        }),
        "expected startup log message in JSON output, got stderr:\n{stderr}"
    );
    assert!(
        !stderr.contains("sk-logging-test"),
        "API key leaked into logs:\n{stderr}"
    );

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn file_output_writes_logs_to_rotated_file() {
    let dir = unique_temp_dir("file");
    let log_path = dir.join("parley.log");
    let output = run_with_logging_env(&dir, "file", "pretty", Some(&log_path));
    assert_sentinel_reply(&output);

    let rotated = find_rotated_log_file(&dir, "parley.log");
    let file_contents = fs::read_to_string(&rotated).expect("failed to read rotated log file");
    assert!(
        file_contents.contains("resolved runtime configuration"),
        "expected startup log message in file, got:\n{file_contents}"
    );
    assert!(
        file_contents.contains("chat completion failed"),
        "expected remote failure in file, got:\n{file_contents}"
    );

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        !stderr.contains("resolved runtime configuration"),
        "did not expect normal logs on stderr for file-only mode:\n{stderr}"
    );

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn both_output_writes_logs_to_stderr_and_file() {
    let dir = unique_temp_dir("both");
    let log_path = dir.join("parley.log");
    let output = run_with_logging_env(&dir, "both", "pretty", Some(&log_path));
    assert_sentinel_reply(&output);

    let rotated = find_rotated_log_file(&dir, "parley.log");
    let file_contents = fs::read_to_string(&rotated).expect("failed to read rotated log file");
    assert!(
        file_contents.contains("resolved runtime configuration"),
        "expected startup log message in file, got:\n{file_contents}"
    );

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("resolved runtime configuration"),
        "expected startup log message on stderr, got:\n{stderr}"
    );

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn invalid_file_path_falls_back_to_stderr_logging() {
    let dir = unique_temp_dir("fallback");
    let blocking_file = dir.join("not-a-directory");
    fs::write(&blocking_file, "block").expect("failed to create blocking file");
    let log_path = blocking_file.join("parley.log");

    let output = run_with_logging_env(&dir, "file", "pretty", Some(&log_path));
    assert_sentinel_reply(&output);

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("failed to initialize LOG_OUTPUT=file"),
        "expected fallback warning, got:\n{stderr}"
    );
    assert!(
        stderr.contains("using stderr instead"),
        "expected stderr fallback message, got:\n{stderr}"
    );
    assert!(
        stderr.contains("resolved runtime configuration"),
        "expected logs to continue on stderr after fallback, got:\n{stderr}"
    );

    let _ = fs::remove_dir_all(&dir);
}
