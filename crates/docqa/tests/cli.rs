//! End-to-end tests for the `docqa` binary.
//!
//! Embedding (Ollama protocol) and generation (chat completions) are served
//! by wiremock. Every document embeds to `[0, 0]`; questions mentioning
//! "weather" embed to `[9, 9]` and must abstain.

use std::path::{Path, PathBuf};
use std::process::Output;

use tempfile::TempDir;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const FALLBACK: &str = "I don't know based on the provided documents.";
const KEY_ENV: &str = "DOCQA_CLI_TEST_KEY";

fn docqa_binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_docqa"))
}

struct Workspace {
    dir: TempDir,
}

impl Workspace {
    fn new(server_uri: &str) -> Self {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        std::fs::create_dir_all(root.join("config")).unwrap();
        std::fs::create_dir_all(root.join("docs")).unwrap();

        std::fs::write(
            root.join("config/docqa.toml"),
            format!(
                r#"[chunking]
chunk_size = 50
overlap = 10

[retrieval]
top_k = 3
distance_threshold = 1.5

[embedding]
provider = "ollama"
model = "test-embed"
dims = 2
url = "{uri}"
max_retries = 0

[generation]
provider = "groq"
base_url = "{uri}/v1"
api_key_env = "{key}"
"#,
                uri = server_uri,
                key = KEY_ENV
            ),
        )
        .unwrap();

        std::fs::write(
            root.join("docs/policy.txt"),
            "Refunds are accepted within 30 days of purchase with a receipt.",
        )
        .unwrap();
        std::fs::write(root.join("docs/logo.png"), [0x89u8, 0x50, 0x4e, 0x47]).unwrap();
        std::fs::write(root.join("notes.xlsx"), [0u8, 1, 2, 3]).unwrap();

        Self { dir }
    }

    fn path(&self, rel: &str) -> PathBuf {
        self.dir.path().join(rel)
    }

    async fn run(&self, args: &[&str]) -> Output {
        run_in(self.dir.path(), args).await
    }
}

async fn run_in(cwd: &Path, args: &[&str]) -> Output {
    tokio::process::Command::new(docqa_binary())
        .args(args)
        .current_dir(cwd)
        .env(KEY_ENV, "test-key")
        .env_remove("RUST_LOG")
        .output()
        .await
        .unwrap()
}

async fn mock_backends() -> MockServer {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .and(body_string_contains("weather"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({"embeddings": [[9.0, 9.0]]})),
        )
        .with_priority(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({"embeddings": [[0.0, 0.0]]})),
        )
        .mount(&server)
        .await;

    server
}

async fn mock_chat(server: &MockServer, template: ResponseTemplate, calls: u64) {
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(template)
        .expect(calls)
        .mount(server)
        .await;
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[tokio::test]
async fn index_dry_run_reports_each_file() {
    let server = mock_backends().await;
    let ws = Workspace::new(&server.uri());

    let output = ws.run(&["index", "docs", "notes.xlsx", "--dry-run"]).await;
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));

    let out = stdout(&output);
    assert!(out.contains("ok policy.txt: 1 chunks"), "{}", out);
    assert!(out.contains("skip notes.xlsx: unsupported file type: .xlsx"), "{}", out);
    assert!(!out.contains("logo.png"), "{}", out);
    assert!(out.contains("(dry-run) indexed 1 of 2 files, 1 chunks"), "{}", out);
}

#[cfg(unix)]
#[tokio::test]
async fn index_skips_unreadable_entry_and_keeps_the_rest() {
    let server = mock_backends().await;
    let ws = Workspace::new(&server.uri());
    std::os::unix::fs::symlink(ws.path("docs/missing.txt"), ws.path("docs/broken.txt")).unwrap();

    let output = ws.run(&["index", "docs"]).await;
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));

    let out = stdout(&output);
    assert!(out.contains("skip broken.txt: "), "{}", out);
    assert!(out.contains("ok policy.txt: 1 chunks"), "{}", out);
    assert!(out.contains("indexed 1 of 2 files, 1 chunks"), "{}", out);
}

#[tokio::test]
async fn index_embeds_documents() {
    let server = mock_backends().await;
    let ws = Workspace::new(&server.uri());

    let output = ws.run(&["index", "docs"]).await;
    assert!(output.status.success());
    assert!(stdout(&output).contains("indexed 1 of 1 files, 1 chunks"));
}

#[tokio::test]
async fn ask_answers_from_close_evidence() {
    let server = mock_backends().await;
    mock_chat(
        &server,
        ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "choices": [{"message": {"role": "assistant", "content": "Within 30 days."}}]
        })),
        1,
    )
    .await;
    let ws = Workspace::new(&server.uri());

    let output = ws
        .run(&["ask", "How long do refunds take?", "--docs", "docs"])
        .await;
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));

    let out = stdout(&output);
    assert!(out.starts_with("Within 30 days."), "{}", out);
    assert!(out.contains("- policy.txt, chunk 0, distance 0.0000"), "{}", out);
}

#[tokio::test]
async fn ask_abstains_without_calling_the_model() {
    let server = mock_backends().await;
    mock_chat(&server, ResponseTemplate::new(200), 0).await;
    let ws = Workspace::new(&server.uri());

    let output = ws
        .run(&["ask", "What is the weather tomorrow?", "--docs", "docs"])
        .await;
    assert!(output.status.success());
    assert_eq!(stdout(&output).trim(), FALLBACK);
}

#[tokio::test]
async fn ask_json_reports_generation_failure() {
    let server = mock_backends().await;
    mock_chat(
        &server,
        ResponseTemplate::new(500).set_body_string("upstream overloaded"),
        1,
    )
    .await;
    let ws = Workspace::new(&server.uri());

    let output = ws
        .run(&["ask", "How long do refunds take?", "--docs", "docs", "--json"])
        .await;
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(json["answer"]["status"], "failed");
    let message = json["message"].as_str().unwrap();
    assert!(message.starts_with("Generation error:"), "{}", message);
    assert!(message.contains("upstream overloaded"), "{}", message);
}

#[tokio::test]
async fn ask_without_indexable_documents_asks_for_upload() {
    let server = mock_backends().await;
    let ws = Workspace::new(&server.uri());

    let output = ws
        .run(&["ask", "Anything?", "--docs", ws.path("notes.xlsx").to_str().unwrap()])
        .await;
    assert!(output.status.success());
    assert_eq!(stdout(&output).trim(), "Upload and index documents first.");
    assert!(String::from_utf8_lossy(&output.stderr).contains("skip notes.xlsx"));
}

#[tokio::test]
async fn out_of_range_threshold_is_rejected() {
    let server = mock_backends().await;
    let ws = Workspace::new(&server.uri());

    let output = ws
        .run(&["ask", "q", "--docs", "docs", "--threshold", "9"])
        .await;
    assert!(!output.status.success());
}

#[tokio::test]
async fn explicit_config_flag_is_used() {
    let server = mock_backends().await;
    let ws = Workspace::new(&server.uri());
    let elsewhere = TempDir::new().unwrap();
    let config = ws.path("config/docqa.toml");

    let output = run_in(
        elsewhere.path(),
        &[
            "--config",
            config.to_str().unwrap(),
            "index",
            ws.path("docs").to_str().unwrap(),
            "--dry-run",
        ],
    )
    .await;
    assert!(output.status.success());
    assert!(stdout(&output).contains("ok policy.txt: 1 chunks"));
}
