//! `watchpost incidents` command handler

use std::io::Write;
use std::sync::Arc;

use colored::Colorize;
use serde::Serialize;

use watchpost_core::types::Incident;
use watchpost_triage::{IncidentLifecycle, NewIncident};

use crate::cli::{IncidentsAction, IncidentsArgs};
use crate::context::AppContext;
use crate::error::CliError;
use crate::output::{OutputWriter, Render, severity_label, truncate};

/// Execute the `incidents` command.
///
/// Creating an incident and adding notes use the configured operator
/// identity (`--operator` or `general.operator`).
pub async fn execute(
    args: IncidentsArgs,
    ctx: &AppContext,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    let lifecycle = IncidentLifecycle::new(Arc::clone(&ctx.store), &ctx.triage);

    let incident = match args.action {
        IncidentsAction::List => {
            let incidents = lifecycle.list().await?;
            return writer.render(&IncidentList { incidents });
        }
        IncidentsAction::Create {
            title,
            severity,
            description,
            alerts,
        } => {
            let new = NewIncident {
                title,
                description,
                severity,
                alert_ids: alerts,
            };
            lifecycle.create(ctx.operator(), new).await?
        }
        IncidentsAction::SetStatus { id, status } => lifecycle.set_status(id, status).await?,
        IncidentsAction::Assign { id, to } => lifecycle.assign(id, to).await?,
        IncidentsAction::Note { id, text } => lifecycle.add_note(id, ctx.operator(), &text).await?,
        IncidentsAction::Link { id, alerts } => lifecycle.link_alerts(id, &alerts).await?,
    };

    ctx.persist().await?;
    writer.render(&IncidentDetail(incident))
}

#[derive(Serialize)]
pub struct IncidentList {
    pub incidents: Vec<Incident>,
}

impl Render for IncidentList {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        if self.incidents.is_empty() {
            writeln!(w, "No incidents.")?;
            return Ok(());
        }
        writeln!(
            w,
            "{:<36} {:<8} {:<11} {:<12} Title",
            "ID", "Severity", "Status", "Assigned"
        )?;
        writeln!(w, "{}", "-".repeat(100))?;
        for incident in &self.incidents {
            writeln!(
                w,
                "{:<36} {} {:<11} {:<12} {}",
                incident.id,
                severity_label(incident.severity),
                incident.status.as_str(),
                truncate(incident.assigned_to.as_deref().unwrap_or("-"), 12),
                truncate(&incident.title, 40)
            )?;
        }
        Ok(())
    }
}

#[derive(Serialize)]
#[serde(transparent)]
pub struct IncidentDetail(pub Incident);

impl Render for IncidentDetail {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        let i = &self.0;
        writeln!(w, "{} {}", i.title.bold(), format!("({})", i.id).dimmed())?;
        writeln!(w, "  Severity:   {}", severity_label(i.severity).trim_end())?;
        writeln!(w, "  Status:     {}", i.status)?;
        writeln!(w, "  Created by: {}", i.created_by)?;
        writeln!(w, "  Assigned:   {}", i.assigned_to.as_deref().unwrap_or("-"))?;
        writeln!(w, "  Alerts:     {}", i.alert_ids.len())?;
        if let Some(resolved) = i.resolved_at {
            writeln!(w, "  Resolved:   {}", resolved.format("%Y-%m-%d %H:%M:%S"))?;
        }
        if !i.notes.is_empty() {
            writeln!(w)?;
            for line in i.notes.lines() {
                writeln!(w, "  {line}")?;
            }
        }
        Ok(())
    }
}
