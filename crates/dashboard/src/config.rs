use anyhow::Context;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "http://127.0.0.1:3000";
const DEFAULT_STATE_DIR: &str = "~/.crm-dashboard";
const DEFAULT_STATUS_INTERVAL_MS: u64 = 5_000;
const DEFAULT_ELAPSED_TICK_MS: u64 = 1_000;
const DEFAULT_CHAT_INTERVAL_MS: u64 = 3_000;
const DEFAULT_PROGRESS_STEP_MS: u64 = 100;
const DEFAULT_PROGRESS_HIDE_DELAY_MS: u64 = 1_500;
const DEFAULT_LOG_MAX_CHARS: usize = 9_000;
const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 15_000;

#[derive(Debug, Default, Deserialize)]
pub(crate) struct DashboardConfig {
    pub(crate) base_url: Option<String>,
    pub(crate) state_dir: Option<String>,
    pub(crate) polling: Option<PollingConfig>,
    pub(crate) campaign: Option<CampaignConfig>,
    pub(crate) log: Option<LogConfig>,
    pub(crate) http: Option<HttpConfig>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct PollingConfig {
    pub(crate) status_interval_ms: Option<u64>,
    pub(crate) elapsed_tick_ms: Option<u64>,
    pub(crate) chat_interval_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct CampaignConfig {
    pub(crate) progress_step_ms: Option<u64>,
    pub(crate) progress_hide_delay_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct LogConfig {
    pub(crate) max_chars: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct HttpConfig {
    pub(crate) connect_timeout_ms: Option<u64>,
    pub(crate) request_timeout_ms: Option<u64>,
}

/// Timer and buffer sizes the runtime works with, all defaults resolved.
#[derive(Clone, Debug)]
pub(crate) struct RuntimeSettings {
    pub(crate) status_interval: Duration,
    pub(crate) elapsed_tick: Duration,
    pub(crate) chat_interval: Duration,
    pub(crate) progress_step: Duration,
    pub(crate) progress_hide_delay: Duration,
    pub(crate) log_max_chars: usize,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            status_interval: Duration::from_millis(DEFAULT_STATUS_INTERVAL_MS),
            elapsed_tick: Duration::from_millis(DEFAULT_ELAPSED_TICK_MS),
            chat_interval: Duration::from_millis(DEFAULT_CHAT_INTERVAL_MS),
            progress_step: Duration::from_millis(DEFAULT_PROGRESS_STEP_MS),
            progress_hide_delay: Duration::from_millis(DEFAULT_PROGRESS_HIDE_DELAY_MS),
            log_max_chars: DEFAULT_LOG_MAX_CHARS,
        }
    }
}

#[derive(Clone, Debug)]
pub(crate) struct HttpSettings {
    pub(crate) connect_timeout: Duration,
    pub(crate) request_timeout: Duration,
}

#[derive(Clone, Debug)]
pub(crate) struct ResolvedConfig {
    pub(crate) base_url: String,
    pub(crate) state_dir: PathBuf,
    pub(crate) runtime: RuntimeSettings,
    pub(crate) http: HttpSettings,
}

pub(crate) fn load_dashboard_config(path: &Path) -> anyhow::Result<DashboardConfig> {
    if !path.exists() {
        tracing::debug!(config = %path.display(), "config file missing, using defaults");
        return Ok(DashboardConfig::default());
    }
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    let config: DashboardConfig = toml::from_str(&raw)
        .with_context(|| format!("failed to parse config {}", path.display()))?;
    Ok(config)
}

impl DashboardConfig {
    pub(crate) fn resolve(self, base_url_override: Option<String>) -> anyhow::Result<ResolvedConfig> {
        let base_url = base_url_override
            .or(self.base_url)
            .map(|value| value.trim().trim_end_matches('/').to_string())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            anyhow::bail!("base_url must start with http:// or https://, got {base_url}");
        }

        let state_dir = expand_tilde(self.state_dir.as_deref().unwrap_or(DEFAULT_STATE_DIR));

        let polling = self.polling.unwrap_or_default();
        let campaign = self.campaign.unwrap_or_default();
        let log = self.log.unwrap_or_default();
        let http = self.http.unwrap_or_default();

        let log_max_chars = log.max_chars.unwrap_or(DEFAULT_LOG_MAX_CHARS);
        if log_max_chars == 0 {
            anyhow::bail!("log.max_chars must be greater than zero");
        }

        Ok(ResolvedConfig {
            base_url,
            state_dir,
            runtime: RuntimeSettings {
                status_interval: millis(polling.status_interval_ms, DEFAULT_STATUS_INTERVAL_MS)?,
                elapsed_tick: millis(polling.elapsed_tick_ms, DEFAULT_ELAPSED_TICK_MS)?,
                chat_interval: millis(polling.chat_interval_ms, DEFAULT_CHAT_INTERVAL_MS)?,
                progress_step: millis(campaign.progress_step_ms, DEFAULT_PROGRESS_STEP_MS)?,
                progress_hide_delay: Duration::from_millis(
                    campaign
                        .progress_hide_delay_ms
                        .unwrap_or(DEFAULT_PROGRESS_HIDE_DELAY_MS),
                ),
                log_max_chars,
            },
            http: HttpSettings {
                connect_timeout: millis(http.connect_timeout_ms, DEFAULT_CONNECT_TIMEOUT_MS)?,
                request_timeout: millis(http.request_timeout_ms, DEFAULT_REQUEST_TIMEOUT_MS)?,
            },
        })
    }
}

fn millis(value: Option<u64>, default: u64) -> anyhow::Result<Duration> {
    let value = value.unwrap_or(default);
    if value == 0 {
        anyhow::bail!("intervals and timeouts must be greater than zero");
    }
    Ok(Duration::from_millis(value))
}

pub(crate) fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = std::env::var_os("HOME") {
            return PathBuf::from(home).join(rest);
        }
    }
    PathBuf::from(path)
}
