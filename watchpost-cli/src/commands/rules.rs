//! `watchpost rules` command handler

use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use watchpost_core::error::WatchpostError;
use watchpost_core::store::Datastore;
use watchpost_core::types::AlertSeverity;
use watchpost_triage::Detector;

use crate::cli::{RulesAction, RulesArgs};
use crate::context::AppContext;
use crate::error::CliError;
use crate::output::{OutputWriter, Render, severity_label, truncate};

/// Execute the `rules` command.
pub async fn execute(
    args: RulesArgs,
    ctx: &AppContext,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    match args.action {
        RulesAction::List => execute_list(ctx, writer).await,
        RulesAction::Load { path } => execute_load(ctx, &path, writer).await,
    }
}

async fn execute_list(ctx: &AppContext, writer: &OutputWriter) -> Result<(), CliError> {
    let rules = ctx.store.list_rules().await.map_err(WatchpostError::from)?;
    let report = RuleListReport {
        total: rules.len(),
        rules: rules
            .into_iter()
            .map(|r| RuleEntry {
                id: r.id,
                name: r.name,
                severity: r.severity,
                enabled: r.enabled,
                pattern: r.pattern,
            })
            .collect(),
    };
    writer.render(&report)
}

async fn execute_load(ctx: &AppContext, path: &Path, writer: &OutputWriter) -> Result<(), CliError> {
    info!(path = %path.display(), "loading detection rules");

    let mut detector = Detector::from_store(Arc::clone(&ctx.store)).await?;
    let loaded = detector.load_directory(path).await?;
    ctx.persist().await?;

    writer.render(&RuleLoadReport {
        path: path.display().to_string(),
        loaded,
        enabled: detector.scanner().enabled_count(),
    })
}

#[derive(Serialize)]
pub struct RuleListReport {
    pub total: usize,
    pub rules: Vec<RuleEntry>,
}

#[derive(Serialize)]
pub struct RuleEntry {
    pub id: Uuid,
    pub name: String,
    pub severity: AlertSeverity,
    pub enabled: bool,
    pub pattern: String,
}

impl Render for RuleListReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        writeln!(w, "Detection Rules ({} total)", self.total)?;
        writeln!(w)?;
        if self.rules.is_empty() {
            writeln!(w, "No rules stored. Use `watchpost rules load <dir>`.")?;
            return Ok(());
        }
        writeln!(w, "{:<28} {:<8} {:<8} Pattern", "Name", "Severity", "Enabled")?;
        writeln!(w, "{}", "-".repeat(80))?;
        for rule in &self.rules {
            let enabled = if rule.enabled {
                "yes".green()
            } else {
                "no".yellow()
            };
            writeln!(
                w,
                "{:<28} {} {:<8} {}",
                truncate(&rule.name, 28),
                severity_label(rule.severity),
                enabled,
                truncate(&rule.pattern, 40)
            )?;
        }
        Ok(())
    }
}

#[derive(Serialize)]
pub struct RuleLoadReport {
    pub path: String,
    pub loaded: usize,
    /// Enabled rules after the load, including ones stored earlier
    pub enabled: usize,
}

impl Render for RuleLoadReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        writeln!(w, "Loaded {} rule(s) from {}", self.loaded, self.path)?;
        writeln!(w, "{} rule(s) enabled", self.enabled)?;
        Ok(())
    }
}
