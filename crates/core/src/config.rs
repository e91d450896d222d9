//! Configuration: `watchpost.toml` parsing and runtime settings.
//!
//! [`WatchpostConfig`] is the top-level structure. Each component reads only
//! its own section.
//!
//! # Load order
//! 1. CLI flags (highest)
//! 2. Environment variables (`WATCHPOST_{SECTION}_{FIELD}`)
//! 3. Config file (`watchpost.toml`)
//! 4. Defaults (`Default` impls)
//!
//! # Example
//! ```no_run
//! # async fn example() -> Result<(), watchpost_core::error::WatchpostError> {
//! use watchpost_core::config::WatchpostConfig;
//!
//! // file + environment overrides
//! let config = WatchpostConfig::load("watchpost.toml").await?;
//!
//! // inline TOML
//! let config = WatchpostConfig::parse("[general]\nlog_level = \"debug\"")?;
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use chrono::FixedOffset;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, WatchpostError};

/// Watchpost configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WatchpostConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub query: QueryConfig,
    #[serde(default)]
    pub analytics: AnalyticsConfig,
    #[serde(default)]
    pub lifecycle: LifecycleConfig,
    #[serde(default)]
    pub notifier: NotifierConfig,
    #[serde(default)]
    pub analysis: AnalysisConfig,
}

impl WatchpostConfig {
    /// Loads the file, applies environment overrides and validates.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, WatchpostError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Loads the file without environment overrides.
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, WatchpostError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                WatchpostError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                WatchpostError::Io(e)
            }
        })?;
        let config = Self::parse(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Parses a TOML string. Missing sections and fields take their defaults.
    pub fn parse(toml_str: &str) -> Result<Self, WatchpostError> {
        toml::from_str(toml_str).map_err(|e| {
            WatchpostError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// Applies `WATCHPOST_{SECTION}_{FIELD}` environment overrides.
    ///
    /// Unparsable values are logged and ignored.
    pub fn apply_env_overrides(&mut self) {
        // General
        override_string(&mut self.general.log_level, "WATCHPOST_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "WATCHPOST_GENERAL_LOG_FORMAT");
        override_string(&mut self.general.data_dir, "WATCHPOST_GENERAL_DATA_DIR");
        override_string(&mut self.general.operator, "WATCHPOST_GENERAL_OPERATOR");

        // Ingest
        override_parsed(
            &mut self.ingest.max_lines_per_file,
            "WATCHPOST_INGEST_MAX_LINES_PER_FILE",
        );
        override_csv(
            &mut self.ingest.accepted_extensions,
            "WATCHPOST_INGEST_ACCEPTED_EXTENSIONS",
        );

        // Query
        override_parsed(&mut self.query.page_size, "WATCHPOST_QUERY_PAGE_SIZE");
        override_parsed(
            &mut self.query.source_list_limit,
            "WATCHPOST_QUERY_SOURCE_LIST_LIMIT",
        );

        // Analytics
        override_parsed(
            &mut self.analytics.window_days,
            "WATCHPOST_ANALYTICS_WINDOW_DAYS",
        );
        override_string(
            &mut self.analytics.bucket_timezone,
            "WATCHPOST_ANALYTICS_BUCKET_TIMEZONE",
        );

        // Lifecycle
        override_parsed(
            &mut self.lifecycle.transition_policy,
            "WATCHPOST_LIFECYCLE_TRANSITION_POLICY",
        );

        // Notifier
        override_parsed(
            &mut self.notifier.channel_capacity,
            "WATCHPOST_NOTIFIER_CHANNEL_CAPACITY",
        );

        // Analysis
        override_string(&mut self.analysis.endpoint, "WATCHPOST_ANALYSIS_ENDPOINT");
        override_string(&mut self.analysis.api_key, "WATCHPOST_ANALYSIS_API_KEY");
        override_parsed(&mut self.analysis.max_logs, "WATCHPOST_ANALYSIS_MAX_LOGS");
        override_parsed(
            &mut self.analysis.max_threats,
            "WATCHPOST_ANALYSIS_MAX_THREATS",
        );
        override_parsed(
            &mut self.analysis.timeout_secs,
            "WATCHPOST_ANALYSIS_TIMEOUT_SECS",
        );
    }

    /// Validates every section.
    pub fn validate(&self) -> Result<(), WatchpostError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(invalid(
                "general.log_level",
                format!("must be one of: {}", valid_levels.join(", ")),
            ));
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.general.log_format.as_str()) {
            return Err(invalid(
                "general.log_format",
                format!("must be one of: {}", valid_formats.join(", ")),
            ));
        }

        if self.general.data_dir.trim().is_empty() {
            return Err(invalid("general.data_dir", "must not be empty"));
        }

        if self.ingest.max_lines_per_file == 0 {
            return Err(invalid("ingest.max_lines_per_file", "must be greater than 0"));
        }

        if self.ingest.accepted_extensions.is_empty() {
            return Err(invalid(
                "ingest.accepted_extensions",
                "at least one extension is required",
            ));
        }

        if self.query.page_size == 0 {
            return Err(invalid("query.page_size", "must be greater than 0"));
        }

        if self.query.source_list_limit == 0 {
            return Err(invalid("query.source_list_limit", "must be greater than 0"));
        }

        if self.analytics.window_days == 0 || self.analytics.window_days > 366 {
            return Err(invalid("analytics.window_days", "must be between 1 and 366"));
        }

        self.analytics.bucket_zone()?;

        if self.notifier.channel_capacity == 0 {
            return Err(invalid("notifier.channel_capacity", "must be greater than 0"));
        }

        let endpoint = self.analysis.endpoint.trim();
        if !endpoint.is_empty()
            && !endpoint.starts_with("http://")
            && !endpoint.starts_with("https://")
        {
            return Err(invalid(
                "analysis.endpoint",
                "must be an http:// or https:// URL",
            ));
        }

        if self.analysis.max_logs == 0 || self.analysis.max_threats == 0 {
            return Err(invalid(
                "analysis.max_logs",
                "snapshot limits must be greater than 0",
            ));
        }

        if self.analysis.timeout_secs == 0 {
            return Err(invalid("analysis.timeout_secs", "must be greater than 0"));
        }

        Ok(())
    }
}

fn invalid(field: &str, reason: impl Into<String>) -> WatchpostError {
    ConfigError::InvalidValue {
        field: field.to_owned(),
        reason: reason.into(),
    }
    .into()
}

/// General settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// trace, debug, info, warn, error
    pub log_level: String,
    /// json, pretty
    pub log_format: String,
    /// Directory holding the state snapshot
    pub data_dir: String,
    /// Operator identity used for audited actions. Empty means anonymous.
    pub operator: String,
}

impl GeneralConfig {
    /// The configured operator, if any.
    pub fn operator(&self) -> Option<&str> {
        let operator = self.operator.trim();
        (!operator.is_empty()).then_some(operator)
    }
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "pretty".to_owned(),
            data_dir: "./watchpost-data".to_owned(),
            operator: String::new(),
        }
    }
}

/// Ingestion pipeline settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Non-blank lines classified per file; the rest is ignored
    pub max_lines_per_file: usize,
    /// Accepted file extensions, without the dot
    pub accepted_extensions: Vec<String>,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            max_lines_per_file: 100,
            accepted_extensions: ["txt", "log", "json", "csv"]
                .into_iter()
                .map(str::to_owned)
                .collect(),
        }
    }
}

/// Filter engine settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    /// Maximum rows returned by a log search
    pub page_size: usize,
    /// Number of recent entries scanned to list distinct sources
    pub source_list_limit: usize,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            page_size: 100,
            source_list_limit: 1000,
        }
    }
}

/// Aggregation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyticsConfig {
    /// Length of the time series window, in days
    pub window_days: u32,
    /// `"local"` or a fixed offset such as `"+09:00"`
    pub bucket_timezone: String,
}

impl AnalyticsConfig {
    /// Resolves the configured bucketing zone.
    pub fn bucket_zone(&self) -> Result<BucketZone, ConfigError> {
        self.bucket_timezone
            .parse()
            .map_err(|reason| ConfigError::InvalidValue {
                field: "analytics.bucket_timezone".to_owned(),
                reason,
            })
    }
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            window_days: 7,
            bucket_timezone: "local".to_owned(),
        }
    }
}

/// Time zone whose calendar days define time series buckets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BucketZone {
    /// The host's local zone
    Local,
    Fixed(FixedOffset),
}

impl FromStr for BucketZone {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("local") {
            return Ok(BucketZone::Local);
        }
        if s.eq_ignore_ascii_case("utc") || s == "Z" {
            return Ok(BucketZone::Fixed(FixedOffset::east_opt(0).ok_or("invalid offset")?));
        }
        parse_offset(s)
            .map(BucketZone::Fixed)
            .ok_or_else(|| format!("expected \"local\", \"utc\" or an offset like +09:00, got '{s}'"))
    }
}

impl fmt::Display for BucketZone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BucketZone::Local => f.write_str("local"),
            BucketZone::Fixed(offset) => write!(f, "{offset}"),
        }
    }
}

/// Parses `+HH:MM` / `-HH:MM`.
fn parse_offset(s: &str) -> Option<FixedOffset> {
    let (sign, rest) = match s.as_bytes().first()? {
        b'+' => (1, &s[1..]),
        b'-' => (-1, &s[1..]),
        _ => return None,
    };
    let (hours, minutes) = rest.split_once(':')?;
    if hours.len() != 2 || minutes.len() != 2 {
        return None;
    }
    let hours: i32 = hours.parse().ok()?;
    let minutes: i32 = minutes.parse().ok()?;
    if hours > 14 || minutes > 59 {
        return None;
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

/// Lifecycle settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LifecycleConfig {
    pub transition_policy: TransitionPolicy,
}

/// Whether direct status writes are checked against the lifecycle table.
///
/// Standard actions are always checked.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransitionPolicy {
    /// Only table transitions and same-state no-ops are accepted
    #[default]
    Strict,
    /// Any status may be written; off-table writes are logged
    Permissive,
}

impl FromStr for TransitionPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "strict" => Ok(TransitionPolicy::Strict),
            "permissive" => Ok(TransitionPolicy::Permissive),
            other => Err(format!("unknown transition policy '{other}'")),
        }
    }
}

impl fmt::Display for TransitionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransitionPolicy::Strict => f.write_str("strict"),
            TransitionPolicy::Permissive => f.write_str("permissive"),
        }
    }
}

/// Change notifier settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifierConfig {
    /// Capacity of the change feed's broadcast channel
    pub channel_capacity: usize,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            channel_capacity: crate::event::DEFAULT_FEED_CAPACITY,
        }
    }
}

/// Inference endpoint settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Endpoint URL. Empty disables analysis.
    pub endpoint: String,
    /// Bearer token sent with each request
    pub api_key: String,
    /// Most recent log entries included in a request
    pub max_logs: usize,
    /// Most recent alerts included in a request
    pub max_threats: usize,
    pub timeout_secs: u64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            api_key: String::new(),
            max_logs: 20,
            max_threats: 10,
            timeout_secs: 30,
        }
    }
}

// --- environment override helpers ---

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
    }
}

fn override_parsed<T: FromStr>(target: &mut T, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<T>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                expected = std::any::type_name::<T>(),
                "failed to parse env var, ignoring"
            ),
        }
    }
}

fn override_csv(target: &mut Vec<String>, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val
            .split(',')
            .map(|s| s.trim().to_owned())
            .filter(|s| !s.is_empty())
            .collect();
    }
}
