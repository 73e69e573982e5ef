//! SPDX-License-Identifier: MIT

//! Error taxonomy for the command client.

use thiserror::Error;

use crate::{bser::DecodeError, bser::EncodeError, value::Value};

/// Failures raised while discovering the service's socket path.
#[derive(Debug, Clone, Error)]
pub enum DiscoveryError {
    /// Spawn failed with `ENOENT`. Message text is part of the external
    /// contract.
    #[error(
        "Watchman was not found in PATH. See \
         https://facebook.github.io/watchman/docs/install.html for \
         installation instructions"
    )]
    NotFound,

    /// Spawn failed with `EACCES`. Message text is part of the external
    /// contract.
    #[error(
        "The Watchman CLI is installed but cannot be spawned because of a \
         permission problem"
    )]
    PermissionDenied,

    /// The discovery subprocess exited non-zero.
    #[error("`{argv:?}` exited with code {code:?} (signal {signal:?}): {stderr}")]
    NonZeroExit {
        argv: Vec<String>,
        code: Option<i32>,
        signal: Option<i32>,
        stderr: String,
    },

    /// The discovery subprocess ran past its configured timeout.
    #[error("`{argv:?}` did not complete within the discovery timeout")]
    TimedOut { argv: Vec<String> },

    /// `stdout` did not parse as JSON, or lacked a `sockname` field.
    #[error("failed to parse get-sockname output: {0}")]
    InvalidResponse(String),

    /// The service's own JSON response carried an `error` field.
    #[error("{message}")]
    ServiceError { message: String, response: Value },

    /// Any other I/O failure spawning or waiting on the subprocess.
    #[error("I/O error during socket discovery: {0}")]
    Io(String),
}

/// Failures raised by the command client's public API.
#[derive(Debug, Clone, Error)]
pub enum ClientError {
    /// `end()` was called while this command was queued or in flight.
    #[error("The client was ended")]
    Ended,

    /// The connection closed (or never opened) while this command was
    /// queued or in flight.
    #[error("The watchman connection was closed")]
    ConnectionClosed,

    /// The decoded response carried an `error` field. `response` is the
    /// full response, attached as diagnostic data.
    #[error("{message}")]
    Protocol { message: String, response: Value },

    #[error(transparent)]
    Discovery(#[from] DiscoveryError),

    #[error(transparent)]
    Encode(#[from] EncodeError),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// A transport-level socket failure other than the filtered
    /// "operation canceled" artifact of local close.
    #[error("transport error: {0}")]
    Io(String),
}

/// Failures raised by [`crate::client::Client::capability_check`].
#[derive(Debug, Clone, Error)]
pub enum CapabilityError {
    #[error("required capability `{0}` is not supported by this watchman")]
    Unsupported(String),

    #[error(transparent)]
    Client(#[from] ClientError),
}
