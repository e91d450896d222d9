//! `watchpost report` command handler

use std::io::Write;

use serde::Serialize;

use watchpost_triage::{ReportRequest, ReportTicket};

use crate::cli::ReportArgs;
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Execute the `report` command.
pub async fn execute(args: ReportArgs, writer: &OutputWriter) -> Result<(), CliError> {
    let request = ReportRequest {
        kind: args.kind,
        format: args.format,
        start: args.start,
        end: args.end,
    };
    let ticket = request.generate()?;
    writer.render(&ReportReceipt(ticket))
}

#[derive(Serialize)]
#[serde(transparent)]
pub struct ReportReceipt(pub ReportTicket);

impl Render for ReportReceipt {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        let t = &self.0;
        writeln!(w, "Report {} accepted", t.id)?;
        writeln!(w, "  Kind:   {}", t.kind)?;
        writeln!(w, "  Format: {}", t.format)?;
        writeln!(
            w,
            "  Range:  {} .. {}",
            t.start.format("%Y-%m-%d %H:%M"),
            t.end.format("%Y-%m-%d %H:%M")
        )?;
        Ok(())
    }
}
