//! Configuration for the console federation pipeline.
//!
//! Settings are loaded from a `config.json` file. Every field is optional and
//! falls back to the production endpoints, so an absent file is the normal
//! case on a freshly provisioned instance.
//!
//! # config.json Format
//!
//! ```json
//! {
//!   "issuer": "awsconsole",
//!   "refresh_interval_secs": 36000,
//!   "retry_ceiling": 2,
//!   "max_restarts": null
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

pub const METADATA_CREDENTIALS_URL: &str =
    "http://169.254.169.254/latest/meta-data/iam/security-credentials/";
pub const FEDERATION_URL: &str = "https://signin.aws.amazon.com/federation";
pub const CONSOLE_URL: &str = "https://console.aws.amazon.com/";
pub const LOGOUT_URL: &str = "https://console.aws.amazon.com/console/logout!doLogout";
pub const DEFAULT_ISSUER: &str = "awsconsole";

/// 12 hours, the longest session the federation endpoint grants.
pub const SESSION_DURATION_SECS: u64 = 43_200;

/// 10 hours between background refreshes.
pub const REFRESH_INTERVAL_SECS: u64 = 10 * 60 * 60;

pub const RETRY_CEILING: u32 = 2;

/// Pipeline endpoints and retry policy.
///
/// Immutable once loaded; every run borrows the same shared instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsoleConfig {
    /// Role listing endpoint; the role name is appended to fetch credentials.
    pub metadata_url: String,

    pub federation_url: String,

    /// Console destination opened after a foreground run.
    pub console_url: String,

    /// Requested whenever a hop answers with a stale-session status.
    pub logout_url: String,

    /// Issuer reported to the federation endpoint on login.
    pub issuer: String,

    pub session_duration_secs: u64,

    pub refresh_interval_secs: u64,

    /// Highest attempt index a hop may reach before the run restarts from
    /// the first hop. A ceiling of 2 allows three tries per hop.
    pub retry_ceiling: u32,

    /// Whole-pipeline restarts allowed per run. `None` never gives up.
    pub max_restarts: Option<u32>,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            metadata_url: METADATA_CREDENTIALS_URL.to_string(),
            federation_url: FEDERATION_URL.to_string(),
            console_url: CONSOLE_URL.to_string(),
            logout_url: LOGOUT_URL.to_string(),
            issuer: DEFAULT_ISSUER.to_string(),
            session_duration_secs: SESSION_DURATION_SECS,
            refresh_interval_secs: REFRESH_INTERVAL_SECS,
            retry_ceiling: RETRY_CEILING,
            max_restarts: None,
        }
    }
}

impl ConsoleConfig {
    /// Default location: `<config dir>/awsconsole/config.json`.
    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "", "awsconsole")
            .map(|dirs| dirs.config_dir().join("config.json"))
    }

    /// Load from an explicit path, or from the default location when `path`
    /// is `None`. Falls back to defaults when nothing usable is found.
    pub fn load(path: Option<&Path>) -> Self {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => match Self::default_path() {
                Some(p) => p,
                None => {
                    debug!("No config directory available, using defaults");
                    return Self::default();
                }
            },
        };

        Self::load_from_path(&path).unwrap_or_default()
    }

    /// Load configuration from a specific path.
    ///
    /// Returns None if the file doesn't exist or is invalid.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Option<Self> {
        let path = path.as_ref();

        if !path.exists() {
            debug!("No config.json found at {:?}", path);
            return None;
        }

        match std::fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str::<ConsoleConfig>(&contents) {
                Ok(config) => {
                    debug!(
                        "Loaded config: issuer={}, refresh={}s, retry_ceiling={}, max_restarts={:?}",
                        config.issuer,
                        config.refresh_interval_secs,
                        config.retry_ceiling,
                        config.max_restarts
                    );
                    Some(config)
                }
                Err(e) => {
                    warn!("Failed to parse {:?}: {}", path, e);
                    None
                }
            },
            Err(e) => {
                warn!("Failed to read {:?}: {}", path, e);
                None
            }
        }
    }

    /// Never zero; a zero interval would make the scheduler spin.
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs.max(1))
    }
}
