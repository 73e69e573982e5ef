//! SPDX-License-Identifier: MIT

//! End-to-end exercises of the public API against a `UnixListener` test
//! double that speaks raw BSER, since there is no real Watchman service to
//! dial in CI.

use std::sync::{Mutex, OnceLock};

use bser_client::cfg::config::ClientConfig;
use bser_client::{Client, ClientError, Object, Value};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::UnixListener;

/// `WATCHMAN_SOCK` is process-global; tests that set it are serialized
/// behind this guard instead of racing each other.
fn sock_env_guard() -> &'static Mutex<()> {
    static GUARD: OnceLock<Mutex<()>> = OnceLock::new();
    GUARD.get_or_init(|| Mutex::new(()))
}

fn temp_socket_path(tag: &str) -> std::path::PathBuf {
    std::env::temp_dir().join(format!(
        "bser-client-integration-{tag}-{:?}.sock",
        std::thread::current().id()
    ))
}

fn spawn_one_shot_server<F>(path: std::path::PathBuf, respond: F) -> tokio::task::JoinHandle<()>
where
    F: FnOnce(Value) -> Vec<u8> + Send + 'static,
{
    let _ = std::fs::remove_file(&path);
    let listener = UnixListener::bind(&path).expect("bind mock socket");
    tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.expect("accept");
        let mut decoder = bser_client::bser::Decoder::new();
        let mut buf = [0u8; 1024];
        loop {
            let n = match stream.read(&mut buf).await {
                Ok(0) | Err(_) => break,
                Ok(n) => n,
            };
            decoder.feed(&buf[..n]);
            if let Ok(Some(value)) = decoder.try_decode_one() {
                let out = respond(value);
                let _ = stream.write_all(&out).await;
                break;
            }
        }
        let _ = std::fs::remove_file(&path);
    })
}

#[tokio::test]
async fn capability_check_synthesizes_from_version_on_old_server() {
    let _lock = sock_env_guard().lock().unwrap_or_else(|e| e.into_inner());
    let path = temp_socket_path("capability-old-server");
    // SAFETY: serialized by `sock_env_guard` above.
    unsafe { std::env::set_var("WATCHMAN_SOCK", &path) };

    let _server = spawn_one_shot_server(path, |_req| {
        // An old server: no `capabilities` field in the "version" reply.
        let mut obj = Object::new();
        obj.insert("version".to_owned(), Value::from("3.1.0"));
        bser_client::bser::encode(&Value::Object(obj)).expect("encode")
    });

    let client = Client::with_default_config();
    let result = client
        .capability_check(&[], &["cmd-watch-project", "cmd-watch-del-all"])
        .await;

    // cmd-watch-del-all needs 3.1.1; the server reports 3.1.0, so the
    // required capability is missing and the check fails by name.
    match result {
        Err(bser_client::CapabilityError::Unsupported(name)) => {
            assert_eq!(name, "cmd-watch-del-all");
        },
        other => panic!("expected Unsupported(\"cmd-watch-del-all\"), got {other:?}"),
    }

    unsafe { std::env::remove_var("WATCHMAN_SOCK") };
}

#[tokio::test]
async fn capability_check_succeeds_when_all_required_are_met() {
    let _lock = sock_env_guard().lock().unwrap_or_else(|e| e.into_inner());
    let path = temp_socket_path("capability-ok");
    unsafe { std::env::set_var("WATCHMAN_SOCK", &path) };

    let _server = spawn_one_shot_server(path, |_req| {
        let mut obj = Object::new();
        obj.insert("version".to_owned(), Value::from("4.9.0"));
        bser_client::bser::encode(&Value::Object(obj)).expect("encode")
    });

    let client = Client::with_default_config();
    let result = client
        .capability_check(&[], &["wildmatch", "relative_root"])
        .await
        .expect("capability check");

    assert_eq!(result.version, "4.9.0");
    assert_eq!(result.capabilities.get("wildmatch"), Some(&true));
    assert_eq!(result.capabilities.get("relative_root"), Some(&true));

    unsafe { std::env::remove_var("WATCHMAN_SOCK") };
}

#[tokio::test]
async fn end_is_idempotent_and_fails_new_commands() {
    let _lock = sock_env_guard().lock().unwrap_or_else(|e| e.into_inner());
    let path = temp_socket_path("end-idempotent");
    unsafe { std::env::set_var("WATCHMAN_SOCK", &path) };

    let _server = spawn_one_shot_server(path, |_req| {
        let mut obj = Object::new();
        obj.insert("version".to_owned(), Value::from("2024.01.01.00"));
        bser_client::bser::encode(&Value::Object(obj)).expect("encode")
    });

    let client = Client::with_default_config();
    client
        .command(Value::array([Value::from("version")]))
        .await
        .expect("first command");

    client.end().await;
    client.end().await;

    let result = client.command(Value::array([Value::from("version")])).await;
    assert!(matches!(result, Err(ClientError::Ended)));

    unsafe { std::env::remove_var("WATCHMAN_SOCK") };
}

#[test]
fn custom_binary_path_config_is_trimmed() {
    let cfg = ClientConfig::with_binary_path("  /opt/bin/watchman  ");
    assert_eq!(cfg.watchman_binary_path, "/opt/bin/watchman");
}
