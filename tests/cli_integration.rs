mod support;

use std::fs;
use std::io::Write;
use std::process::Stdio;

use serde_json::Value;
use support::{FakeApi, gptbot, refused_base_url};

fn request_body(raw: &str) -> Value {
    let (_, body) = raw
        .split_once("\r\n\r\n")
        .expect("request should have a body");
    serde_json::from_str(body).expect("request body should be JSON")
}

fn user_contents(body: &Value) -> Vec<String> {
    body["messages"]
        .as_array()
        .expect("messages array")
        .iter()
        .filter(|message| message["role"] == "user")
        .filter_map(|message| message["content"].as_str().map(str::to_string))
        .collect()
}

#[test]
fn single_response_prints_reply_and_statistics() {
    let dir = tempfile::tempdir().expect("temp dir");
    let api = FakeApi::completion("Hi there!", 12, 3);

    let output = gptbot(&api.base_url, dir.path())
        .args(["--stats", "Hello"])
        .output()
        .expect("failed to run gptbot binary");
    let request = api.request();

    assert!(output.status.success(), "stderr:\n{}", String::from_utf8_lossy(&output.stderr));
    let stdout = String::from_utf8_lossy(&output.stdout);
    let mut lines = stdout.lines();
    assert_eq!(lines.next(), Some("Hi there!"));
    assert_eq!(lines.next(), Some("Completed Successfully: true"));
    let duration = lines.next().expect("duration line");
    assert!(duration.starts_with("Duration: ") && duration.ends_with("ms"), "{duration}");
    assert_eq!(lines.next(), Some("Tokens Sent: 12"));
    assert_eq!(lines.next(), Some("Tokens Received: 3"));
    assert_eq!(lines.next(), None);

    assert!(request.starts_with("POST /v1/chat/completions "), "{request}");
    assert!(request.to_ascii_lowercase().contains("authorization: bearer sk-test"));
    assert!(!request.to_ascii_lowercase().contains("openai-organization"));

    let body = request_body(&request);
    assert_eq!(body["model"], "gpt-3.5-turbo");
    assert_eq!(body["stream"], false);
    assert_eq!(body["messages"][0]["role"], "system");
    assert_eq!(user_contents(&body), vec!["Hello".to_string()]);
    let max_tokens = body["max_tokens"].as_u64().expect("max_tokens");
    assert!(max_tokens > 0 && max_tokens < 4096);
}

#[test]
fn streaming_prints_chunks_then_newline() {
    let dir = tempfile::tempdir().expect("temp dir");
    let api = FakeApi::streamed(&["Hel", "lo"]);

    let output = gptbot(&api.base_url, dir.path())
        .args(["--stream", "--org", "org-42", "Say hello"])
        .output()
        .expect("failed to run gptbot binary");
    let request = api.request();

    assert!(output.status.success(), "stderr:\n{}", String::from_utf8_lossy(&output.stderr));
    assert_eq!(String::from_utf8_lossy(&output.stdout), "Hello\n");
    assert!(request.to_ascii_lowercase().contains("openai-organization: org-42"));
    assert_eq!(request_body(&request)["stream"], true);
}

#[test]
fn output_file_replaces_stale_contents() {
    let dir = tempfile::tempdir().expect("temp dir");
    let out = dir.path().join("answer.txt");
    fs::write(&out, "an older and much longer answer").expect("seed output file");
    let api = FakeApi::streamed(&["Hel", "", "lo"]);

    let output = gptbot(&api.base_url, dir.path())
        .arg("--stream")
        .arg("-o")
        .arg(&out)
        .arg("Hello")
        .output()
        .expect("failed to run gptbot binary");
    api.request();

    assert!(output.status.success(), "stderr:\n{}", String::from_utf8_lossy(&output.stderr));
    assert_eq!(fs::read_to_string(&out).expect("read output file"), "Hello");
    assert!(output.stdout.is_empty());
}

#[test]
fn input_files_and_stdin_become_user_messages_before_the_prompt() {
    let dir = tempfile::tempdir().expect("temp dir");
    let notes = dir.path().join("notes.txt");
    fs::write(&notes, "from a file").expect("write input file");
    let api = FakeApi::completion("ok", 20, 1);

    let mut child = gptbot(&api.base_url, dir.path())
        .arg("-i")
        .arg(&notes)
        .args(["-i", "stdin", "Summarize"])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("failed to spawn gptbot binary");
    child
        .stdin
        .take()
        .expect("stdin should be piped")
        .write_all(b"from stdin")
        .expect("write stdin");
    let output = child.wait_with_output().expect("wait for gptbot");
    let request = api.request();

    assert!(output.status.success(), "stderr:\n{}", String::from_utf8_lossy(&output.stderr));
    assert_eq!(
        user_contents(&request_body(&request)),
        vec!["from a file", "from stdin", "Summarize"]
    );
}

#[test]
fn system_prompt_file_replaces_the_default() {
    let dir = tempfile::tempdir().expect("temp dir");
    let system = dir.path().join("system.txt");
    fs::write(&system, "Answer in French.").expect("write system prompt");
    let api = FakeApi::completion("Bonjour", 10, 1);

    let output = gptbot(&api.base_url, dir.path())
        .arg("-s")
        .arg(&system)
        .arg("Hello")
        .output()
        .expect("failed to run gptbot binary");
    let request = api.request();

    assert!(output.status.success(), "stderr:\n{}", String::from_utf8_lossy(&output.stderr));
    let body = request_body(&request);
    assert_eq!(body["messages"][0]["content"], "Answer in French.");
}

#[test]
fn missing_api_key_fails_without_calling_the_api() {
    let dir = tempfile::tempdir().expect("temp dir");

    let output = gptbot(&refused_base_url(), dir.path())
        .env_remove("OPENAI_API_KEY")
        .arg("Hello")
        .output()
        .expect("failed to run gptbot binary");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("OPENAI_API_KEY environment variable not set"),
        "stderr:\n{stderr}"
    );
    assert!(output.stdout.is_empty());
}

#[test]
fn out_of_range_temperature_is_rejected() {
    let dir = tempfile::tempdir().expect("temp dir");

    let output = gptbot(&refused_base_url(), dir.path())
        .args(["--temperature", "1.5", "Hello"])
        .output()
        .expect("failed to run gptbot binary");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Temperature (1.5) must be between 0 and 1"), "stderr:\n{stderr}");
}

#[test]
fn missing_prompt_is_rejected() {
    let dir = tempfile::tempdir().expect("temp dir");

    let output = gptbot(&refused_base_url(), dir.path())
        .output()
        .expect("failed to run gptbot binary");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("must be specified"), "stderr:\n{stderr}");
}

#[test]
fn api_error_status_fails_the_run() {
    let dir = tempfile::tempdir().expect("temp dir");
    let api = FakeApi::respond(
        "401 Unauthorized",
        "application/json",
        r#"{"error":{"message":"Incorrect API key provided"}}"#,
    );

    let output = gptbot(&api.base_url, dir.path())
        .arg("Hello")
        .output()
        .expect("failed to run gptbot binary");
    api.request();

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("401"), "stderr:\n{stderr}");
    assert!(stderr.contains("Incorrect API key provided"), "stderr:\n{stderr}");
    assert!(output.stdout.is_empty());
}

#[test]
fn unknown_flag_is_a_usage_error() {
    let dir = tempfile::tempdir().expect("temp dir");

    let output = gptbot(&refused_base_url(), dir.path())
        .args(["--no-such-flag", "Hello"])
        .output()
        .expect("failed to run gptbot binary");

    assert_eq!(output.status.code(), Some(2));
}
