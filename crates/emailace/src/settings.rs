//! Persistent settings.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use emailace_api::DEFAULT_BASE_URL;
use emailace_core::DashboardConfig;
use serde::{Deserialize, Serialize};

/// Settings that persist across runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Backend service root.
    pub api_url: String,
    /// Per-request timeout.
    pub request_timeout_secs: u64,
    /// Email list refresh period; 0 disables polling.
    pub inbox_poll_secs: u64,
    /// Analytics refresh period; 0 disables polling.
    pub analytics_poll_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_BASE_URL.to_string(),
            request_timeout_secs: emailace_api::DEFAULT_TIMEOUT.as_secs(),
            inbox_poll_secs: emailace_core::DEFAULT_INBOX_POLL.as_secs(),
            analytics_poll_secs: emailace_core::DEFAULT_ANALYTICS_POLL.as_secs(),
        }
    }
}

impl Settings {
    /// Applies command-line and environment overrides on top of the file.
    ///
    /// `api_url` already folds the flag over `EMAILACE_API_URL`.
    #[must_use]
    pub fn with_overrides(mut self, api_url: Option<String>, timeout_secs: Option<u64>) -> Self {
        if let Some(api_url) = api_url {
            self.api_url = api_url;
        }
        if let Some(timeout_secs) = timeout_secs {
            self.request_timeout_secs = timeout_secs;
        }
        self
    }

    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub const fn dashboard_config(&self) -> DashboardConfig {
        DashboardConfig {
            inbox_poll: Duration::from_secs(self.inbox_poll_secs),
            analytics_poll: Duration::from_secs(self.analytics_poll_secs),
        }
    }
}

/// Default settings location: `<config dir>/emailace/settings.json`.
pub fn settings_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("emailace")
        .join("settings.json")
}

/// Loads settings, falling back to defaults when the file does not exist.
pub async fn load_settings(path: &Path) -> anyhow::Result<Settings> {
    if !path.exists() {
        return Ok(Settings::default());
    }

    let contents = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;

    serde_json::from_str(&contents).with_context(|| format!("parsing {}", path.display()))
}

/// Writes settings as pretty JSON, creating the directory if needed.
pub async fn save_settings(path: &Path, settings: &Settings) -> anyhow::Result<()> {
    if let Some(dir) = path.parent() {
        tokio::fs::create_dir_all(dir)
            .await
            .with_context(|| format!("creating {}", dir.display()))?;
    }

    let contents = serde_json::to_string_pretty(settings)?;
    tokio::fs::write(path, contents)
        .await
        .with_context(|| format!("writing {}", path.display()))?;

    tracing::info!("Settings saved to {}", path.display());
    Ok(())
}
