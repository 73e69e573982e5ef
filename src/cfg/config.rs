//! SPDX-License-Identifier: MIT

use std::{fs, path::Path, time::Duration};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Name of the environment variable that, when set, short-circuits socket
/// discovery.
pub const WATCHMAN_SOCK_ENV: &str = "WATCHMAN_SOCK";

/// Default bare binary name resolved via `PATH` when no override is given.
pub const DEFAULT_WATCHMAN_BINARY: &str = "watchman";

/// Default size of a single inbound socket read; left tunable since the
/// wire protocol does not mandate a particular chunk size.
const DEFAULT_READ_CHUNK_BYTES: usize = 1024;

/// Configuration knobs for a [`crate::client::client::Client`]: the binary
/// path used for socket discovery, plus the ambient discovery timeout and
/// read chunk size.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Path or bare name of the Watchman CLI binary used for socket
    /// discovery. Surrounding whitespace is trimmed at construction time.
    pub watchman_binary_path: String,

    /// How many bytes to request per inbound socket read while draining
    /// the connection.
    pub read_chunk_bytes: usize,

    /// Upper bound on how long the `get-sockname` discovery subprocess may
    /// run before it's treated as a discovery failure.
    #[serde(with = "serde_secs")]
    pub discovery_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            watchman_binary_path: DEFAULT_WATCHMAN_BINARY.to_owned(),
            read_chunk_bytes: DEFAULT_READ_CHUNK_BYTES,
            discovery_timeout: Duration::from_secs(30),
        }
    }
}

impl ClientConfig {
    /// Builds a config overriding the Watchman binary path, trimmed of
    /// surrounding whitespace.
    pub fn with_binary_path(path: impl Into<String>) -> Self {
        ClientConfig {
            watchman_binary_path: path.into().trim().to_owned(),
            ..Self::default()
        }
    }

    /// Loads a config from a YAML file, for integration tests and
    /// downstream binaries that want their Watchman client tuned
    /// alongside the rest of their configuration.
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        let mut cfg: ClientConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("failed to parse config file: {}", path.display()))?;
        cfg.watchman_binary_path = cfg.watchman_binary_path.trim().to_owned();
        Ok(cfg)
    }
}

mod serde_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = u64::deserialize(d)?;
        Ok(Duration::from_secs(secs))
    }
}
