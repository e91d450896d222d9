//! `watchpost analytics` command handler

use std::io::Write;
use std::sync::Arc;

use colored::Colorize;

use watchpost_triage::{AnalyticsEngine, AnalyticsSnapshot, Share};

use crate::context::AppContext;
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Execute the `analytics` command.
pub async fn execute(ctx: &AppContext, writer: &OutputWriter) -> Result<(), CliError> {
    let engine = AnalyticsEngine::new(Arc::clone(&ctx.store), &ctx.triage);
    let snapshot = engine.snapshot().await?;
    writer.render(&AnalyticsReport(snapshot))
}

#[derive(serde::Serialize)]
#[serde(transparent)]
pub struct AnalyticsReport(pub AnalyticsSnapshot);

fn write_shares(w: &mut dyn Write, title: &str, shares: &[Share]) -> std::io::Result<()> {
    writeln!(w, "{}", title.bold())?;
    if shares.is_empty() {
        writeln!(w, "  (no data)")?;
    }
    for share in shares {
        writeln!(w, "  {:<20} {:>8} {:>4}%", share.name, share.count, share.percent)?;
    }
    Ok(())
}

impl Render for AnalyticsReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        let snap = &self.0;
        writeln!(w, "Total entries: {}", snap.total_logs)?;
        writeln!(w)?;
        write_shares(w, "Levels", &snap.level_distribution)?;
        writeln!(w)?;
        write_shares(w, "Sources", &snap.source_distribution)?;
        writeln!(w)?;

        writeln!(w, "{}", "Daily activity".bold())?;
        writeln!(w, "  {:<12} {:>8} {:>8}", "Day", "Logs", "Threats")?;
        for (logs, threats) in snap.log_timeline.iter().zip(&snap.threat_timeline) {
            writeln!(w, "  {:<12} {:>8} {:>8}", logs.day, logs.total(), threats.total())?;
        }
        Ok(())
    }
}
