use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, anyhow, bail};
use upt_core::ConnectionParams;

use crate::sync::{ChangeDetection, SyncOptions};

const DEFAULT_REMOTE_ROOT: &str = "disk:/upt";
const DEFAULT_API_URL: &str = "https://cloud-api.yandex.net";
const DEFAULT_TIMEOUT_SECS: u64 = 60;

#[derive(Clone, Debug)]
pub struct SyncConfig {
    pub local_dir: PathBuf,
    pub remote_root: String,
    pub api_url: String,
    pub token: String,
    pub timeout: Duration,
    pub change_detection: ChangeDetection,
}

impl SyncConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the config from `lookup`, which maps a variable name to its value.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let local_dir = match read("UPT_LOCAL_DIR") {
            Some(value) if value == "~" || value.starts_with("~/") => {
                let home = dirs::home_dir().context("home directory is unavailable")?;
                expand_with_home(&value, &home)
            }
            Some(value) => PathBuf::from(value),
            None => bail!("UPT_LOCAL_DIR is not set"),
        };
        let token = read("UPT_TOKEN").context("UPT_TOKEN is not set")?;
        let remote_root = read("UPT_REMOTE_ROOT").unwrap_or_else(|| DEFAULT_REMOTE_ROOT.to_string());
        let api_url = read("UPT_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string());
        let timeout = Duration::from_secs(
            read("UPT_TIMEOUT_SECS")
                .and_then(|value| value.trim().parse::<u64>().ok())
                .filter(|value| *value > 0)
                .unwrap_or(DEFAULT_TIMEOUT_SECS),
        );
        let change_detection = match read("UPT_CHANGE_DETECTION") {
            Some(value) => value
                .parse::<ChangeDetection>()
                .map_err(|err| anyhow!("invalid UPT_CHANGE_DETECTION: {err}"))?,
            None => ChangeDetection::default(),
        };

        Ok(Self {
            local_dir,
            remote_root,
            api_url,
            token,
            timeout,
            change_detection,
        })
    }

    pub fn connection_params(&self) -> ConnectionParams {
        ConnectionParams::new(self.token.clone())
            .with_base_url(self.api_url.clone())
            .with_timeout(self.timeout)
    }

    pub fn sync_options(&self) -> SyncOptions {
        SyncOptions {
            change_detection: self.change_detection,
        }
    }
}

fn expand_with_home(value: &str, home: &Path) -> PathBuf {
    if value == "~" {
        return home.to_path_buf();
    }
    if let Some(rest) = value.strip_prefix("~/") {
        return home.join(rest);
    }
    PathBuf::from(value)
}
