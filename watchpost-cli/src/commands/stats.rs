//! `watchpost stats` command handler

use std::io::Write;

use watchpost_triage::StatsOverview;

use crate::context::AppContext;
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Execute the `stats` command.
pub async fn execute(ctx: &AppContext, writer: &OutputWriter) -> Result<(), CliError> {
    let overview = StatsOverview::collect(ctx.store.as_ref()).await?;
    writer.render(&StatsReport(overview))
}

#[derive(serde::Serialize)]
#[serde(transparent)]
pub struct StatsReport(pub StatsOverview);

impl Render for StatsReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        let s = &self.0;
        writeln!(w, "{:<20} {}", "Logs processed", s.logs_processed)?;
        writeln!(w, "{:<20} {}", "Active threats", s.active_threats)?;
        writeln!(w, "{:<20} {}", "Threats resolved", s.threats_resolved)?;
        writeln!(w, "{:<20} {}", "Active sources", s.active_sources)?;
        Ok(())
    }
}
