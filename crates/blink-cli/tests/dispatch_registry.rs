//! End-to-end `blink init` against a mock npm registry.
//!
//! The registry serves `@blink-cli/init`; a shell script stands in for node
//! and records the loader arguments it receives.

#![cfg(unix)]

use axum::{
    body::Body,
    extract::{Path as UrlPath, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use flate2::write::GzEncoder;
use flate2::Compression;
use std::io::Write;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tar::Builder;
use tempfile::{tempdir, TempDir};

const PACKAGE: &str = "@blink-cli/init";

struct Registry {
    base_url: String,
    latest: Mutex<String>,
    downloads: AtomicUsize,
}

type Shared = Arc<Registry>;

fn cargo_bin() -> Command {
    let mut cmd = Command::new(env!("CARGO"));
    cmd.args(["run", "-q", "-p", "blink-cli", "--bin", "blink", "--"]);
    cmd
}

fn create_test_tarball(version: &str) -> Vec<u8> {
    let pkg_json =
        format!(r#"{{"name":"{PACKAGE}","version":"{version}","main":"lib/init.js"}}"#);
    let init_js = b"module.exports = function (name, opts) {};";

    let mut tar_bytes = Vec::new();
    {
        let mut builder = Builder::new(&mut tar_bytes);
        for (path, data) in [
            ("package/package.json", pkg_json.as_bytes()),
            ("package/lib/init.js", &init_js[..]),
        ] {
            let mut header = tar::Header::new_gnu();
            header.set_path(path).unwrap();
            header.set_size(data.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder.append(&header, data).unwrap();
        }
        builder.finish().unwrap();
    }

    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&tar_bytes).unwrap();
    encoder.finish().unwrap()
}

async fn handle_packument(UrlPath(name): UrlPath<String>, State(registry): State<Shared>) -> Response {
    if name != PACKAGE {
        return (StatusCode::NOT_FOUND, "Not found").into_response();
    }
    let latest = registry.latest.lock().unwrap().clone();
    let mut versions = serde_json::Map::new();
    for version in ["1.0.0", "1.1.0"] {
        versions.insert(
            version.to_string(),
            serde_json::json!({
                "name": PACKAGE,
                "version": version,
                "dist": { "tarball": format!("{}/tarballs/init-{version}.tgz", registry.base_url) }
            }),
        );
    }
    let packument = serde_json::json!({
        "name": PACKAGE,
        "dist-tags": { "latest": latest },
        "versions": versions,
    });
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/json")],
        packument.to_string(),
    )
        .into_response()
}

async fn handle_tarball(UrlPath(file): UrlPath<String>, State(registry): State<Shared>) -> Response {
    let Some(version) = file
        .strip_prefix("init-")
        .and_then(|f| f.strip_suffix(".tgz"))
    else {
        return (StatusCode::NOT_FOUND, "Not found").into_response();
    };
    registry.downloads.fetch_add(1, Ordering::SeqCst);
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/gzip")],
        Body::from(create_test_tarball(version)),
    )
        .into_response()
}

async fn start_mock_registry(latest: &str) -> Shared {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let registry = Arc::new(Registry {
        base_url: format!("http://{addr}"),
        latest: Mutex::new(latest.to_string()),
        downloads: AtomicUsize::new(0),
    });

    let app = Router::new()
        .route("/:name", get(handle_packument))
        .route("/tarballs/:file", get(handle_tarball))
        .with_state(registry.clone());
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    registry
}

/// A fake node that records `<entry>` and `<payload>` and exits with `code`.
fn fake_node(dir: &Path, code: i32) -> PathBuf {
    let script = dir.join("fake-node");
    std::fs::write(
        &script,
        format!(
            "#!/bin/sh\n\
             out=\"$(dirname \"$0\")\"\n\
             printf '%s' \"$3\" > \"$out/entry.txt\"\n\
             printf '%s' \"$4\" > \"$out/payload.txt\"\n\
             printf '%s' \"$BLINK_ENTRY_ABI\" > \"$out/abi.txt\"\n\
             exit {code}\n"
        ),
    )
    .unwrap();
    std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
    script
}

struct Env {
    home: TempDir,
    project: TempDir,
    bin: TempDir,
}

impl Env {
    fn new() -> Self {
        Self {
            home: tempdir().unwrap(),
            project: tempdir().unwrap(),
            bin: tempdir().unwrap(),
        }
    }

    fn read(&self, file: &str) -> String {
        std::fs::read_to_string(self.bin.path().join(file)).unwrap()
    }
}

async fn blink_init(env: &Env, registry: &Registry, code: i32, args: &[&str]) -> Output {
    let mut cmd = cargo_bin();
    cmd.env("BLINK_HOME", env.home.path())
        .env("BLINK_NPM_REGISTRY", &registry.base_url)
        .env("BLINK_NODE", fake_node(env.bin.path(), code))
        .env("BLINK_NO_UPDATE_CHECK", "1")
        .env("BLINK_SKIP_PACKAGE_DEPS", "1")
        .env_remove("BLINK_TARGET_PATH")
        .env_remove("BLINK_DEPENDENCIES_PATH")
        .arg("--cwd")
        .arg(env.project.path())
        .arg("init")
        .args(args);
    tokio::task::spawn_blocking(move || cmd.output().expect("Failed to run blink"))
        .await
        .unwrap()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_init_installs_and_runs_entry() {
    let registry = start_mock_registry("1.0.0").await;
    let env = Env::new();

    let output = blink_init(&env, &registry, 0, &["my-app", "--force"]).await;
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert_eq!(registry.downloads.load(Ordering::SeqCst), 1);

    let entry = env.read("entry.txt");
    assert!(
        entry.ends_with("_@blink-cli_init@1.0.0@@blink-cli/init/lib/init.js"),
        "entry: {entry}"
    );

    let payload: serde_json::Value = serde_json::from_str(&env.read("payload.txt")).unwrap();
    assert_eq!(
        payload,
        serde_json::json!({ "abi": 1, "args": ["my-app", { "force": true }] })
    );
    assert_eq!(env.read("abi.txt"), "1");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_init_propagates_exit_code_and_reuses_cache() {
    let registry = start_mock_registry("1.0.0").await;
    let env = Env::new();

    let output = blink_init(&env, &registry, 3, &[]).await;
    assert_eq!(output.status.code(), Some(3));

    // Same latest: served from the cache.
    let output = blink_init(&env, &registry, 0, &[]).await;
    assert!(output.status.success());
    assert_eq!(registry.downloads.load(Ordering::SeqCst), 1);

    let payload: serde_json::Value = serde_json::from_str(&env.read("payload.txt")).unwrap();
    assert_eq!(payload["args"], serde_json::json!([null, { "force": false }]));

    // New latest: installed next to the old version and used.
    *registry.latest.lock().unwrap() = "1.1.0".to_string();
    let output = blink_init(&env, &registry, 0, &[]).await;
    assert!(output.status.success());
    assert_eq!(registry.downloads.load(Ordering::SeqCst), 2);
    assert!(env.read("entry.txt").contains("@1.1.0@"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_init_registry_down_spawns_nothing() {
    let env = Env::new();
    let registry = Registry {
        base_url: "http://127.0.0.1:1".to_string(),
        latest: Mutex::new(String::new()),
        downloads: AtomicUsize::new(0),
    };

    let output = blink_init(&env, &registry, 0, &[]).await;
    assert_eq!(output.status.code(), Some(1));
    assert!(!env.bin.path().join("payload.txt").exists());
}
