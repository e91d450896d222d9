//! Triage settings
//!
//! [`TriageConfig`] gathers the sections of
//! [`WatchpostConfig`](watchpost_core::config::WatchpostConfig) used by the
//! triage components, with the bucketing zone already resolved.
//!
//! ```ignore
//! use watchpost_core::config::WatchpostConfig;
//! use watchpost_triage::config::TriageConfig;
//!
//! let config = TriageConfig::from_core(&WatchpostConfig::default())?;
//! ```

use watchpost_core::config::{BucketZone, TransitionPolicy, WatchpostConfig};

use crate::error::TriageError;

/// Settings shared by the triage components
#[derive(Debug, Clone)]
pub struct TriageConfig {
    /// Non-blank lines classified per uploaded file
    pub max_lines_per_file: usize,
    /// Accepted upload extensions, lowercase, without the dot
    pub accepted_extensions: Vec<String>,
    /// Rows returned by a log search
    pub page_size: usize,
    /// Recent entries scanned for the source selector
    pub source_list_limit: usize,
    /// Most recent alerts shown in the alert list
    pub alert_list_limit: usize,
    /// Time series window in days
    pub window_days: u32,
    pub bucket_zone: BucketZone,
    pub transition_policy: TransitionPolicy,
    /// Bounded notice queue length
    pub notice_capacity: usize,
}

impl Default for TriageConfig {
    fn default() -> Self {
        Self {
            max_lines_per_file: 100,
            accepted_extensions: ["txt", "log", "json", "csv"]
                .into_iter()
                .map(str::to_owned)
                .collect(),
            page_size: 100,
            source_list_limit: 1000,
            alert_list_limit: 50,
            window_days: 7,
            bucket_zone: BucketZone::Local,
            transition_policy: TransitionPolicy::Strict,
            notice_capacity: 32,
        }
    }
}

impl TriageConfig {
    /// Builds the triage settings from the loaded configuration.
    ///
    /// Fields without a counterpart in the file keep their defaults.
    pub fn from_core(core: &WatchpostConfig) -> Result<Self, TriageError> {
        let bucket_zone = core
            .analytics
            .bucket_zone()
            .map_err(|e| TriageError::Config {
                field: "analytics.bucket_timezone".to_owned(),
                reason: e.to_string(),
            })?;

        let config = Self {
            max_lines_per_file: core.ingest.max_lines_per_file,
            accepted_extensions: core
                .ingest
                .accepted_extensions
                .iter()
                .map(|ext| ext.trim_start_matches('.').to_ascii_lowercase())
                .collect(),
            page_size: core.query.page_size,
            source_list_limit: core.query.source_list_limit,
            window_days: core.analytics.window_days,
            bucket_zone,
            transition_policy: core.lifecycle.transition_policy,
            ..Self::default()
        };
        config.validate()?;
        Ok(config)
    }

    pub fn builder() -> TriageConfigBuilder {
        TriageConfigBuilder::new()
    }

    /// True when `file_name` has one of the accepted extensions.
    pub fn accepts(&self, file_name: &str) -> bool {
        std::path::Path::new(file_name)
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| {
                let ext = ext.to_ascii_lowercase();
                self.accepted_extensions.iter().any(|a| *a == ext)
            })
    }

    pub fn validate(&self) -> Result<(), TriageError> {
        let positive = [
            ("max_lines_per_file", self.max_lines_per_file),
            ("page_size", self.page_size),
            ("source_list_limit", self.source_list_limit),
            ("alert_list_limit", self.alert_list_limit),
            ("notice_capacity", self.notice_capacity),
        ];
        for (field, value) in positive {
            if value == 0 {
                return Err(TriageError::Config {
                    field: field.to_owned(),
                    reason: "must be greater than 0".to_owned(),
                });
            }
        }

        if self.window_days == 0 {
            return Err(TriageError::Config {
                field: "window_days".to_owned(),
                reason: "must be greater than 0".to_owned(),
            });
        }

        if self.accepted_extensions.is_empty() {
            return Err(TriageError::Config {
                field: "accepted_extensions".to_owned(),
                reason: "at least one extension is required".to_owned(),
            });
        }

        Ok(())
    }
}

/// Builder for [`TriageConfig`]
#[derive(Default)]
pub struct TriageConfigBuilder {
    config: TriageConfig,
}

impl TriageConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_lines_per_file(mut self, lines: usize) -> Self {
        self.config.max_lines_per_file = lines;
        self
    }

    pub fn accepted_extensions(mut self, extensions: Vec<String>) -> Self {
        self.config.accepted_extensions = extensions;
        self
    }

    pub fn page_size(mut self, size: usize) -> Self {
        self.config.page_size = size;
        self
    }

    pub fn source_list_limit(mut self, limit: usize) -> Self {
        self.config.source_list_limit = limit;
        self
    }

    pub fn alert_list_limit(mut self, limit: usize) -> Self {
        self.config.alert_list_limit = limit;
        self
    }

    pub fn window_days(mut self, days: u32) -> Self {
        self.config.window_days = days;
        self
    }

    pub fn bucket_zone(mut self, zone: BucketZone) -> Self {
        self.config.bucket_zone = zone;
        self
    }

    pub fn transition_policy(mut self, policy: TransitionPolicy) -> Self {
        self.config.transition_policy = policy;
        self
    }

    pub fn notice_capacity(mut self, capacity: usize) -> Self {
        self.config.notice_capacity = capacity;
        self
    }

    /// Validates and returns the configuration.
    pub fn build(self) -> Result<TriageConfig, TriageError> {
        self.config.validate()?;
        Ok(self.config)
    }
}
