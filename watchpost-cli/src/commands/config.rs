//! `watchpost config` command handler

use std::io::Write;
use std::path::Path;

use serde::Serialize;
use tracing::info;

use watchpost_core::config::WatchpostConfig;

use crate::cli::{ConfigAction, ConfigArgs};
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

const SECTIONS: [&str; 7] = [
    "general",
    "ingest",
    "query",
    "analytics",
    "lifecycle",
    "notifier",
    "analysis",
];

const REDACTED: &str = "***REDACTED***";

/// Execute the `config` command.
///
/// `loaded` is the effective configuration as resolved at startup (file,
/// environment and flag overrides).
pub async fn execute(
    args: ConfigArgs,
    config_path: &Path,
    loaded: Result<WatchpostConfig, CliError>,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    match args.action {
        ConfigAction::Validate => execute_validate(config_path, writer).await,
        ConfigAction::Show { section } => {
            execute_show(config_path, loaded?, section.as_deref(), writer)
        }
    }
}

/// Loads the file strictly and reports every problem found.
///
/// # Errors
///
/// Returns `CliError::Config` if the file is missing, unparsable or invalid.
async fn execute_validate(config_path: &Path, writer: &OutputWriter) -> Result<(), CliError> {
    info!(path = %config_path.display(), "validating configuration");

    let report = match WatchpostConfig::load(config_path).await {
        Ok(_) => ConfigValidationReport {
            source: config_path.display().to_string(),
            valid: true,
            errors: Vec::new(),
        },
        Err(e) => ConfigValidationReport {
            source: config_path.display().to_string(),
            valid: false,
            errors: vec![e.to_string()],
        },
    };

    writer.render(&report)?;

    if !report.valid {
        return Err(CliError::Config("configuration is invalid".to_owned()));
    }
    Ok(())
}

fn execute_show(
    config_path: &Path,
    mut config: WatchpostConfig,
    section: Option<&str>,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    if !config.analysis.api_key.is_empty() {
        config.analysis.api_key = REDACTED.to_owned();
    }

    let report = match section {
        None => ConfigReport::new(config_path, None, &config)?,
        Some("general") => ConfigReport::new(config_path, section, &config.general)?,
        Some("ingest") => ConfigReport::new(config_path, section, &config.ingest)?,
        Some("query") => ConfigReport::new(config_path, section, &config.query)?,
        Some("analytics") => ConfigReport::new(config_path, section, &config.analytics)?,
        Some("lifecycle") => ConfigReport::new(config_path, section, &config.lifecycle)?,
        Some("notifier") => ConfigReport::new(config_path, section, &config.notifier)?,
        Some("analysis") => ConfigReport::new(config_path, section, &config.analysis)?,
        Some(other) => {
            return Err(CliError::Command(format!(
                "unknown section: {other} (expected: {})",
                SECTIONS.join(", ")
            )));
        }
    };

    writer.render(&report)
}

/// Configuration display report.
///
/// JSON output carries the structured values; text output the TOML form.
#[derive(Serialize)]
pub struct ConfigReport {
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
    pub config: serde_json::Value,
    #[serde(skip)]
    pub config_toml: String,
}

impl ConfigReport {
    fn new<T: Serialize>(
        config_path: &Path,
        section: Option<&str>,
        value: &T,
    ) -> Result<Self, CliError> {
        let config_toml = toml::to_string_pretty(value)
            .map_err(|e| CliError::Command(format!("cannot render configuration: {e}")))?;
        Ok(Self {
            source: config_path.display().to_string(),
            section: section.map(str::to_owned),
            config: serde_json::to_value(value)?,
            config_toml,
        })
    }
}

impl Render for ConfigReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        match &self.section {
            Some(section) => writeln!(
                w,
                "Configuration {} (source: {})",
                format!("[{section}]").bold(),
                self.source
            )?,
            None => writeln!(w, "Configuration (source: {})", self.source.bold())?,
        }
        writeln!(w)?;
        write!(w, "{}", self.config_toml)?;
        Ok(())
    }
}

/// Configuration validation report.
#[derive(Serialize)]
pub struct ConfigValidationReport {
    pub source: String,
    pub valid: bool,
    /// Empty when valid
    pub errors: Vec<String>,
}

impl Render for ConfigValidationReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        writeln!(w, "Config Validation: {}", self.source.bold())?;
        if self.valid {
            writeln!(w, "  Result: {}", "VALID".green().bold())?;
        } else {
            writeln!(w, "  Result: {}", "INVALID".red().bold())?;
            for err in &self.errors {
                writeln!(w, "  Error: {}", err.red())?;
            }
        }
        Ok(())
    }
}
