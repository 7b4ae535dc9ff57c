#![allow(deprecated)]

use assert_cmd::Command;
use predicates::prelude::*;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::runtime::Runtime;

/// Nothing in here needs a network call: local and container references
/// are judged from the text alone.
const CLEAN: &str = "\
name: ci
on: push
jobs:
  build:
    runs-on: ubuntu-latest
    steps:
      - uses: ./.github/actions/setup
      - uses: docker://node:20
";

const LATEST_IMAGE: &str = "\
name: ci
on: push
jobs:
  build:
    runs-on: ubuntu-latest
    steps:
      - uses: docker://alpine:latest
";

const ACTION_REF: &str = "\
name: ci
jobs:
  build:
    steps:
      - uses: org/action@v1
";

const BRANCH_REF: &str = "\
name: ci
jobs:
  build:
    steps:
      - uses: org/action@feature
";

const PINNED_REF: &str = "\
name: ci
jobs:
  build:
    steps:
      - uses: org/action@feedbee
";

/// Minimal GitHub API: `org/action` with a `feature` branch. Every other
/// path answers 404.
const ROUTES: &[(&str, &str)] = &[
    (
        "/repos/org/action",
        r#"{"name":"action","owner":{"login":"org"},"default_branch":"main","fork":false}"#,
    ),
    (
        "/repos/org/action/git/ref/heads/feature",
        r#"{"ref":"refs/heads/feature","object":{"sha":"feedbee1234567890feedbee1234567890abcdef","type":"commit"}}"#,
    ),
];

/// HTTP stub serving `ROUTES` on a loopback port until dropped.
struct StubApi {
    url: String,
    _runtime: Runtime,
}

fn stub_api() -> StubApi {
    let runtime = Runtime::new().unwrap();
    let listener = runtime
        .block_on(TcpListener::bind("127.0.0.1:0"))
        .unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    runtime.spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            tokio::spawn(respond(socket));
        }
    });
    StubApi {
        url,
        _runtime: runtime,
    }
}

async fn respond(mut socket: TcpStream) {
    let mut request = Vec::new();
    let mut chunk = [0u8; 1024];
    while !request.windows(4).any(|w| w == b"\r\n\r\n") {
        match socket.read(&mut chunk).await {
            Ok(0) | Err(_) => return,
            Ok(n) => request.extend_from_slice(&chunk[..n]),
        }
    }
    let request = String::from_utf8_lossy(&request);
    let path = request.split_whitespace().nth(1).unwrap_or_default();
    let (status, body) = match ROUTES.iter().find(|(route, _)| *route == path) {
        Some((_, body)) => ("200 OK", *body),
        None => ("404 Not Found", r#"{"message":"Not Found"}"#),
    };
    let response = format!(
        "HTTP/1.1 {status}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
        body.len()
    );
    let _ = socket.write_all(response.as_bytes()).await;
    let _ = socket.shutdown().await;
}

fn scan_against(api: &StubApi, path: &Path) -> Command {
    let mut cmd = scan(path);
    for var in ["HTTP_PROXY", "http_proxy", "HTTPS_PROXY", "https_proxy", "ALL_PROXY", "all_proxy"] {
        cmd.env_remove(var);
    }
    cmd.arg("--api-url").arg(&api.url);
    cmd
}

fn pinwarden_cmd() -> Command {
    let mut cmd = Command::cargo_bin("pinwarden").expect("binary should be built");
    cmd.env_remove("GITHUB_TOKEN")
        .env_remove("PINWARDEN_API_URL")
        .env_remove("PINWARDEN_CACHE")
        .env_remove("RUST_LOG");
    cmd
}

fn workflow(dir: &TempDir, text: &str) -> PathBuf {
    let path = dir.path().join("ci.yml");
    std::fs::write(&path, text).unwrap();
    path
}

fn scan(path: &Path) -> Command {
    let mut cmd = pinwarden_cmd();
    cmd.arg("scan").arg(path).arg("--no-cache");
    cmd
}

#[test]
fn clean_workflow_exits_0() {
    let dir = TempDir::new().unwrap();
    scan(&workflow(&dir, CLEAN))
        .assert()
        .code(0)
        .stdout(predicate::str::contains("No recommendations found!"));
}

#[test]
fn latest_image_exits_1_and_is_listed() {
    let dir = TempDir::new().unwrap();
    scan(&workflow(&dir, LATEST_IMAGE))
        .assert()
        .code(1)
        .stdout(predicate::str::contains("[unstable-docker-tag] line 7"));
}

#[test]
fn json_output_is_valid() {
    let dir = TempDir::new().unwrap();
    let output = scan(&workflow(&dir, LATEST_IMAGE))
        .arg("--format")
        .arg("json")
        .output()
        .expect("command should run");

    assert_eq!(output.status.code(), Some(1));
    let parsed: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("stdout should be valid JSON");

    assert!(parsed.get("schema_version").is_some());
    assert_eq!(parsed["tool"]["name"], "pinwarden-cli");
    assert_eq!(parsed["summary"]["total"], 1);
    assert_eq!(parsed["issues"][0]["check"], "unstable-docker-tag");
    assert_eq!(parsed["issues"][0]["can_remediate"], false);
    assert_eq!(parsed["document"]["hash"]["algorithm"], "sha256");
}

#[test]
fn quiet_prints_nothing() {
    let dir = TempDir::new().unwrap();
    scan(&workflow(&dir, LATEST_IMAGE))
        .arg("--quiet")
        .assert()
        .code(1)
        .stdout(predicate::str::is_empty());
}

#[test]
fn non_remediable_issue_leaves_file_untouched() {
    let dir = TempDir::new().unwrap();
    let path = workflow(&dir, LATEST_IMAGE);
    scan(&path).assert().code(1);
    assert_eq!(std::fs::read_to_string(&path).unwrap(), LATEST_IMAGE);
}

#[test]
fn check_filter_skips_other_checks() {
    let dir = TempDir::new().unwrap();
    scan(&workflow(&dir, LATEST_IMAGE))
        .arg("--check")
        .arg("unstable-github-ref")
        .assert()
        .code(0);
}

#[test]
fn unknown_check_exits_2() {
    let dir = TempDir::new().unwrap();
    scan(&workflow(&dir, CLEAN))
        .arg("--check")
        .arg("no-such-check")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("unknown check \"no-such-check\""));
}

#[test]
fn missing_file_exits_2() {
    pinwarden_cmd()
        .arg("scan")
        .arg("definitely/not/here.yml")
        .arg("--no-cache")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("failed to read workflow"));
}

#[test]
fn invalid_yaml_exits_2() {
    let dir = TempDir::new().unwrap();
    scan(&workflow(&dir, "jobs: [\n"))
        .assert()
        .code(2)
        .stderr(predicate::str::contains("failed to parse workflow"));
}

#[test]
fn unreachable_provider_exits_2_naming_the_check() {
    let dir = TempDir::new().unwrap();
    let path = workflow(&dir, ACTION_REF);
    scan(&path)
        .arg("--api-url")
        .arg("http://127.0.0.1:9")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("failed to run unfork-action check"));
    assert_eq!(std::fs::read_to_string(&path).unwrap(), ACTION_REF);
}

#[test]
fn branch_ref_is_pinned_in_place() {
    let api = stub_api();
    let dir = TempDir::new().unwrap();
    let path = workflow(&dir, BRANCH_REF);

    scan_against(&api, &path)
        .assert()
        .code(1)
        .stdout(predicate::str::contains("[unstable-github-ref] line 5"))
        .stdout(predicate::str::contains("org/action@feature -> org/action@feedbee"));

    assert_eq!(std::fs::read_to_string(&path).unwrap(), PINNED_REF);
}

#[test]
fn out_writes_elsewhere_and_keeps_the_original() {
    let api = stub_api();
    let dir = TempDir::new().unwrap();
    let path = workflow(&dir, BRANCH_REF);
    let out = dir.path().join("pinned.yml");

    scan_against(&api, &path).arg("--out").arg(&out).assert().code(1);

    assert_eq!(std::fs::read_to_string(&out).unwrap(), PINNED_REF);
    assert_eq!(std::fs::read_to_string(&path).unwrap(), BRANCH_REF);
}

#[test]
fn show_diff_prints_hunk_without_writing() {
    let api = stub_api();
    let dir = TempDir::new().unwrap();
    let path = workflow(&dir, BRANCH_REF);

    scan_against(&api, &path)
        .arg("--show-diff")
        .assert()
        .code(1)
        .stdout(predicate::str::contains(
            "@@ line 5 @@\n-      - uses: org/action@feature\n+      - uses: org/action@feedbee\n",
        ));

    assert_eq!(std::fs::read_to_string(&path).unwrap(), BRANCH_REF);
}

#[test]
fn dry_run_never_writes() {
    let api = stub_api();
    let dir = TempDir::new().unwrap();
    let path = workflow(&dir, BRANCH_REF);
    let out = dir.path().join("pinned.yml");

    scan_against(&api, &path)
        .arg("--dry-run")
        .arg("--out")
        .arg(&out)
        .assert()
        .code(1);

    assert_eq!(std::fs::read_to_string(&path).unwrap(), BRANCH_REF);
    assert!(!out.exists());
}

#[test]
fn cache_file_is_not_written_without_lookups() {
    let dir = TempDir::new().unwrap();
    let cache = dir.path().join("state").join("cache.json");
    pinwarden_cmd()
        .arg("scan")
        .arg(workflow(&dir, CLEAN))
        .arg("--cache-path")
        .arg(&cache)
        .assert()
        .code(0);
    // Nothing was classified through the provider, so nothing was stored.
    assert!(!cache.exists());
}

#[test]
fn version_flag() {
    pinwarden_cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("pinwarden"));
}
