use clap::{Args, Parser, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Clone, Debug, Parser)]
#[command(version, about, long_about = None)]
pub struct Config {
    #[command(flatten)]
    pub api: ApiConfig,

    #[command(flatten)]
    pub session: SessionConfig,

    #[command(flatten)]
    pub realtime: RealtimeConfig,

    #[command(flatten)]
    pub telemetry: TelemetryConfig,
}

#[derive(Clone, Debug, Args)]
pub struct ApiConfig {
    /// Base URL of the console API, e.g. <https://api.example.com>
    #[arg(long = "api-url", env = "CONSOLE_API_URL", default_value = "http://localhost:5000")]
    pub base_url: String,

    /// Per-request timeout in seconds
    #[arg(long, env = "CONSOLE_REQUEST_TIMEOUT_SECS", default_value_t = 30)]
    pub request_timeout_secs: u64,

    /// How many times a transient failure is retried
    #[arg(long, env = "CONSOLE_MAX_RETRIES", default_value_t = 2)]
    pub max_retries: usize,

    /// Initial retry backoff in milliseconds
    #[arg(long, env = "CONSOLE_MIN_BACKOFF_MS", default_value_t = 200)]
    pub min_backoff_ms: u64,

    /// Maximum retry backoff in milliseconds
    #[arg(long, env = "CONSOLE_MAX_BACKOFF_MS", default_value_t = 2_000)]
    pub max_backoff_ms: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000".to_string(),
            request_timeout_secs: 30,
            max_retries: 2,
            min_backoff_ms: 200,
            max_backoff_ms: 2_000,
        }
    }
}

impl ApiConfig {
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[derive(Clone, Debug, Args)]
pub struct SessionConfig {
    /// Directory holding the persisted session and locale preference
    #[arg(long, env = "CONSOLE_STATE_DIR", default_value = ".console-session")]
    pub state_dir: PathBuf,

    /// Seconds before `exp` at which an access token is already treated as expired
    #[arg(long, env = "CONSOLE_EXPIRY_BUFFER_SECS", default_value_t = 30)]
    pub expiry_buffer_secs: u64,

    /// Minutes before `exp` at which an access token counts as expiring soon
    #[arg(long, env = "CONSOLE_EXPIRING_SOON_MINUTES", default_value_t = 3)]
    pub expiring_soon_minutes: u64,

    /// How long the manageable agents list is served from cache
    #[arg(long, env = "CONSOLE_AGENTS_TTL_SECS", default_value_t = 300)]
    pub agents_ttl_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            state_dir: PathBuf::from(".console-session"),
            expiry_buffer_secs: 30,
            expiring_soon_minutes: 3,
            agents_ttl_secs: 300,
        }
    }
}

impl SessionConfig {
    #[must_use]
    pub const fn expiry_buffer(&self) -> Duration {
        Duration::from_secs(self.expiry_buffer_secs)
    }

    #[must_use]
    pub const fn expiring_soon_window(&self) -> Duration {
        Duration::from_secs(self.expiring_soon_minutes * 60)
    }

    #[must_use]
    pub const fn agents_ttl(&self) -> Duration {
        Duration::from_secs(self.agents_ttl_secs)
    }
}

#[derive(Clone, Debug, Args)]
pub struct RealtimeConfig {
    /// WebSocket URL of the realtime service; realtime is disabled when unset
    #[arg(long = "realtime-url", env = "CONSOLE_REALTIME_URL")]
    pub url: Option<String>,

    /// Public API key sent with the realtime connection
    #[arg(long = "realtime-api-key", env = "CONSOLE_REALTIME_API_KEY")]
    pub api_key: Option<String>,

    /// Heartbeat interval for the realtime socket
    #[arg(long, env = "CONSOLE_REALTIME_HEARTBEAT_SECS", default_value_t = 25)]
    pub heartbeat_interval_secs: u64,

    /// Capacity of each topic's event channel
    #[arg(long, env = "CONSOLE_REALTIME_CHANNEL_CAPACITY", default_value_t = 64)]
    pub channel_capacity: usize,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self { url: None, api_key: None, heartbeat_interval_secs: 25, channel_capacity: 64 }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Clone, Debug, Default, Args)]
pub struct TelemetryConfig {
    /// Log output format
    #[arg(long, env = "CONSOLE_LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    /// OTLP collector endpoint; traces and metrics are exported only when set
    #[arg(long, env = "CONSOLE_OTLP_ENDPOINT")]
    pub otlp_endpoint: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api: ApiConfig::default(),
            session: SessionConfig::default(),
            realtime: RealtimeConfig::default(),
            telemetry: TelemetryConfig::default(),
        }
    }
}

impl Config {
    #[must_use]
    pub fn load() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults_match_default_impls() {
        let parsed = Config::try_parse_from(["console-session"]).unwrap();
        let defaults = Config::default();
        assert_eq!(parsed.api.max_retries, defaults.api.max_retries);
        assert_eq!(parsed.session.expiry_buffer(), Duration::from_secs(30));
        assert_eq!(parsed.session.expiring_soon_window(), Duration::from_secs(180));
        assert_eq!(parsed.realtime.heartbeat_interval_secs, defaults.realtime.heartbeat_interval_secs);
        assert_eq!(parsed.telemetry.log_format, LogFormat::Text);
    }

    #[test]
    fn test_flags_override() {
        let parsed = Config::try_parse_from([
            "console-session",
            "--api-url",
            "https://api.example.com",
            "--max-retries",
            "0",
            "--log-format",
            "json",
        ])
        .unwrap();
        assert_eq!(parsed.api.base_url, "https://api.example.com");
        assert_eq!(parsed.api.max_retries, 0);
        assert_eq!(parsed.telemetry.log_format, LogFormat::Json);
    }
}
