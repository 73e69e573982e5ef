//! SPDX-License-Identifier: MIT

//! Socket discovery: find the service's Unix-domain socket path, either
//! from `WATCHMAN_SOCK` or by spawning the service's CLI.

use std::process::Stdio;

use tokio::process::Command;

use super::error::DiscoveryError;
use crate::{cfg::config::ClientConfig, value::Value};

/// Resolves the socket path to connect to.
///
/// If `WATCHMAN_SOCK` is set, its value is used verbatim and discovery is
/// skipped entirely. Otherwise spawns `<binary> --no-pretty get-sockname`
/// and parses its JSON stdout.
pub(crate) async fn discover_socket_path(config: &ClientConfig) -> Result<String, DiscoveryError> {
    if let Ok(path) = std::env::var(crate::cfg::config::WATCHMAN_SOCK_ENV) {
        return Ok(path);
    }

    let binary = config.watchman_binary_path.as_str();
    let argv = vec![
        binary.to_owned(),
        "--no-pretty".to_owned(),
        "get-sockname".to_owned(),
    ];

    let mut command = Command::new(binary);
    command
        .arg("--no-pretty")
        .arg("get-sockname")
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let child = command.spawn().map_err(translate_spawn_error)?;

    let output = tokio::time::timeout(config.discovery_timeout, child.wait_with_output())
        .await
        .map_err(|_| DiscoveryError::TimedOut { argv: argv.clone() })?
        .map_err(|e| DiscoveryError::Io(e.to_string()))?;

    if !output.status.success() {
        return Err(DiscoveryError::NonZeroExit {
            argv,
            code: output.status.code(),
            signal: exit_signal(&output.status),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        });
    }

    parse_get_sockname_output(&output.stdout)
}

fn translate_spawn_error(e: std::io::Error) -> DiscoveryError {
    match e.kind() {
        std::io::ErrorKind::NotFound => DiscoveryError::NotFound,
        std::io::ErrorKind::PermissionDenied => DiscoveryError::PermissionDenied,
        _ => DiscoveryError::Io(e.to_string()),
    }
}

#[cfg(unix)]
fn exit_signal(status: &std::process::ExitStatus) -> Option<i32> {
    use std::os::unix::process::ExitStatusExt;
    status.signal()
}

#[cfg(not(unix))]
fn exit_signal(_status: &std::process::ExitStatus) -> Option<i32> {
    None
}

fn parse_get_sockname_output(stdout: &[u8]) -> Result<String, DiscoveryError> {
    let text = String::from_utf8_lossy(stdout);
    let json: serde_json::Value = serde_json::from_str(&text)
        .map_err(|e| DiscoveryError::InvalidResponse(e.to_string()))?;

    if let Some(message) = json.get("error").and_then(|v| v.as_str()) {
        return Err(DiscoveryError::ServiceError {
            message: message.to_owned(),
            response: Value::from(json),
        });
    }

    json.get("sockname")
        .and_then(|v| v.as_str())
        .map(str::to_owned)
        .ok_or_else(|| DiscoveryError::InvalidResponse("missing `sockname` field".to_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_sockname_from_stdout() {
        let stdout = br#"{"version":"2024.01.01.00","sockname":"/tmp/watchman.sock"}"#;
        let path = parse_get_sockname_output(stdout).expect("parse");
        assert_eq!(path, "/tmp/watchman.sock");
    }

    #[test]
    fn service_error_field_fails_with_diagnostic_response() {
        let stdout = br#"{"error":"could not start watchman"}"#;
        let err = parse_get_sockname_output(stdout).expect_err("should fail");
        match err {
            DiscoveryError::ServiceError { message, response } => {
                assert_eq!(message, "could not start watchman");
                assert_eq!(response.get("error").and_then(Value::as_str), Some("could not start watchman"));
            },
            other => panic!("unexpected error variant: {other:?}"),
        }
    }

    #[test]
    fn missing_sockname_is_invalid_response() {
        let stdout = br#"{"version":"2024.01.01.00"}"#;
        assert!(parse_get_sockname_output(stdout).is_err());
    }

    #[test]
    fn malformed_json_is_invalid_response() {
        let stdout = b"not json";
        assert!(parse_get_sockname_output(stdout).is_err());
    }
}
