//! Loading, templating and merging of test plan documents.

use load_testplan::config::{InputType, RunContext, Settings};
use load_testplan::emit::{Emitter, GithubSink};
use load_testplan::loader::Loader;
use load_testplan::value::{ConfigValue, Mapping};
use load_testplan::Error;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

const DEFAULTS: &str = "\
string: String
number: 42
array:
  - 1
  - 2
root:
  branch:
    leaf: A small leaf
    other: kept
";

const OVERWRITE_STRING_WITH_STRUCTURE: &str = "\
string:
  nested: X
root:
  branch:
    leaf: Overwritten
";

fn write(dir: &TempDir, name: &str, content: &str) -> String {
    let path = dir.path().join(name);
    std::fs::write(&path, content).expect("Failed to write fixture");
    path.display().to_string()
}

fn context(files: Vec<String>, env: &[(&str, &str)]) -> RunContext {
    let settings = Settings {
        files,
        ..Settings::default()
    };
    let env: BTreeMap<String, String> = env
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    RunContext::with_env(settings, env).expect("Failed to build run context")
}

async fn load(ctx: &RunContext) -> load_testplan::Result<Mapping> {
    Loader::new(ctx)?.load_all().await
}

/// Load, then emit every key as a step output into `output`.
async fn load_and_emit(ctx: &RunContext, output: &Path) -> load_testplan::Result<()> {
    let tree = load(ctx).await?;
    let mut step = GithubSink::new(Some(output.to_path_buf()), None);
    Emitter::new(&ctx.settings, &mut step).emit(&tree)?;
    Ok(())
}

fn at<'a>(tree: &'a Mapping, path: &[&str]) -> Option<&'a ConfigValue> {
    let (first, rest) = path.split_first()?;
    tree.get(*first)?.pointer(rest)
}

/// Minimal HTTP/1.1 responder. Serves `body` with `status` for every request
/// and records the request targets.
async fn serve(status: u16, body: &'static str) -> (String, Arc<Mutex<Vec<String>>>) {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind listener");
    let addr = listener.local_addr().expect("Listener has no address");
    let requests = Arc::new(Mutex::new(Vec::new()));
    let seen = Arc::clone(&requests);

    tokio::spawn(async move {
        while let Ok((mut stream, _)) = listener.accept().await {
            let mut buf = Vec::new();
            let mut chunk = [0u8; 1024];
            while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
                match stream.read(&mut chunk).await {
                    Ok(0) | Err(_) => break,
                    Ok(n) => buf.extend_from_slice(&chunk[..n]),
                }
            }
            let head = String::from_utf8_lossy(&buf);
            if let Some(target) = head.split_whitespace().nth(1) {
                seen.lock().unwrap().push(target.to_string());
            }
            let reason = if status == 200 { "OK" } else { "Not Found" };
            let response = format!(
                "HTTP/1.1 {} {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status,
                reason,
                body.len(),
                body
            );
            let _ = stream.write_all(response.as_bytes()).await;
            let _ = stream.shutdown().await;
        }
    });

    (format!("http://{}", addr), requests)
}

#[tokio::test]
async fn later_documents_override_earlier_ones() {
    let dir = tempfile::tempdir().unwrap();
    let files = vec![
        write(&dir, "defaults.yaml", DEFAULTS),
        write(&dir, "overwrite_string_with_structure.yaml", OVERWRITE_STRING_WITH_STRUCTURE),
    ];
    let tree = load(&context(files, &[])).await.expect("Failed to load");

    assert_eq!(at(&tree, &["string", "nested"]), Some(&ConfigValue::from("X")));
    assert_eq!(at(&tree, &["number"]), Some(&ConfigValue::from(42_i64)));
    assert_eq!(
        at(&tree, &["root", "branch", "leaf"]),
        Some(&ConfigValue::from("Overwritten"))
    );
    assert_eq!(
        at(&tree, &["root", "branch", "other"]),
        Some(&ConfigValue::from("kept"))
    );

    let keys: Vec<&str> = tree.keys().map(String::as_str).collect();
    assert_eq!(keys, vec!["string", "number", "array", "root"]);
}

#[tokio::test]
async fn document_order_decides_precedence() {
    let dir = tempfile::tempdir().unwrap();
    let a = write(&dir, "a.yaml", "value: a\n");
    let b = write(&dir, "b.yaml", "value: b\n");

    let ab = load(&context(vec![a.clone(), b.clone()], &[])).await.unwrap();
    let ba = load(&context(vec![b, a], &[])).await.unwrap();
    assert_eq!(ab["value"], ConfigValue::from("b"));
    assert_eq!(ba["value"], ConfigValue::from("a"));
}

#[tokio::test]
async fn json_and_yaml_documents_mix() {
    let dir = tempfile::tempdir().unwrap();
    let files = vec![
        write(&dir, "base.yml", "service:\n  port: 80\n  host: localhost\n"),
        write(&dir, "override.json", r#"{"service": {"port": 8080}}"#),
    ];
    let tree = load(&context(files, &[])).await.unwrap();
    assert_eq!(at(&tree, &["service", "port"]), Some(&ConfigValue::from(8080_i64)));
    assert_eq!(
        at(&tree, &["service", "host"]),
        Some(&ConfigValue::from("localhost"))
    );
}

#[tokio::test]
async fn templates_see_job_context_and_environment() {
    let dir = tempfile::tempdir().unwrap();
    let files = vec![write(
        &dir,
        "with_template.yaml",
        "repository: '{{ .Github.Repository }}'\n\
         home: '{{ .Env.HOME }}'\n\
         missing: '{{ .Env.NOT_SET }}'\n\
         separator: '{{ .Separator }}'\n",
    )];
    let ctx = context(
        files,
        &[
            ("GITHUB_REPOSITORY", "joernott/load_testplan"),
            ("HOME", "/home/runner"),
        ],
    );
    let tree = load(&ctx).await.unwrap();

    assert_eq!(tree["repository"], ConfigValue::from("joernott/load_testplan"));
    assert_eq!(tree["home"], ConfigValue::from("/home/runner"));
    assert_eq!(tree["missing"], ConfigValue::from(""));
    assert_eq!(tree["separator"], ConfigValue::from("_"));
}

#[tokio::test]
async fn unknown_template_field_fails() {
    let dir = tempfile::tempdir().unwrap();
    let files = vec![write(&dir, "bad_template.yaml", "x: '{{ .NoSuchField }}'\n")];
    let err = load(&context(files, &[])).await.unwrap_err();
    assert!(matches!(err, Error::Template { .. }), "{err}");
}

#[tokio::test]
async fn broken_yaml_aborts_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let files = vec![
        write(&dir, "defaults.yaml", DEFAULTS),
        write(&dir, "broken.yaml", "key: [unclosed\n"),
    ];
    let err = load(&context(files, &[])).await.unwrap_err();
    assert!(matches!(err, Error::Parse { .. }), "{err}");
}

#[tokio::test]
async fn missing_file_is_source_unavailable() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("nope.yaml");
    let err = load(&context(vec![missing.display().to_string()], &[]))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::SourceUnavailable { .. }), "{err}");
}

#[tokio::test]
async fn unknown_suffix_needs_explicit_type() {
    let dir = tempfile::tempdir().unwrap();
    let file = write(&dir, "plan.txt", "a: 1\n");

    let err = load(&context(vec![file.clone()], &[])).await.unwrap_err();
    assert!(matches!(err, Error::Parse { .. }), "{err}");

    let mut ctx = context(vec![file], &[]);
    ctx.settings.input_type = InputType::Yaml;
    let tree = load(&ctx).await.unwrap();
    assert_eq!(tree["a"], ConfigValue::from(1_i64));
}

#[tokio::test]
async fn no_files_is_missing_input() {
    let err = load(&context(Vec::new(), &[])).await.unwrap_err();
    assert!(matches!(err, Error::MissingInput));
}

#[tokio::test]
async fn remote_documents_are_fetched_with_token() {
    let (base, requests) = serve(200, "remote: true\nnumber: 7\n").await;
    let dir = tempfile::tempdir().unwrap();
    let files = vec![
        write(&dir, "defaults.yaml", DEFAULTS),
        format!("{}/plans/remote.yaml", base),
    ];
    let mut ctx = context(files, &[]);
    ctx.settings.token = Some("s3cret".into());

    let tree = load(&ctx).await.expect("Failed to load remote document");
    assert_eq!(tree["remote"], ConfigValue::from(true));
    assert_eq!(tree["number"], ConfigValue::from(7_i64));
    assert_eq!(tree["string"], ConfigValue::from("String"));

    let requests = requests.lock().unwrap();
    assert_eq!(requests.as_slice(), ["/plans/remote.yaml?token=s3cret"]);
}

#[tokio::test]
async fn non_ok_status_is_source_unavailable() {
    let (base, _) = serve(404, "not here").await;
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("github_output");
    let files = vec![
        write(&dir, "defaults.yaml", DEFAULTS),
        format!("{}/missing.yaml", base),
    ];
    let mut ctx = context(files, &[]);
    ctx.settings.sinks.set_output = true;

    let err = load_and_emit(&ctx, &output).await.unwrap_err();
    match err {
        Error::SourceUnavailable { reason, .. } => assert!(reason.contains("404"), "{reason}"),
        other => panic!("unexpected error: {other}"),
    }
    assert!(!output.exists(), "no output may be written after a failed load");
}

#[tokio::test]
async fn unreachable_url_is_source_unavailable() {
    // Bind and drop to get a port nothing listens on.
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap().port()
    };
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("github_output");
    let mut ctx = context(vec![format!("http://127.0.0.1:{}/plan.yaml", port)], &[]);
    ctx.settings.sinks.set_output = true;

    let err = load_and_emit(&ctx, &output).await.unwrap_err();
    assert!(matches!(err, Error::SourceUnavailable { .. }), "{err}");
    assert!(!output.exists(), "no output may be written after a failed load");
}
