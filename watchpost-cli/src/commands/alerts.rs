//! `watchpost alerts` command handler

use std::io::Write;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use colored::Colorize;
use serde::Serialize;

use watchpost_core::types::ThreatAlert;
use watchpost_triage::{AlertAction, AlertLifecycle, NewAlert};

use crate::cli::{AlertsAction, AlertsArgs};
use crate::context::AppContext;
use crate::error::CliError;
use crate::output::{OutputWriter, Render, severity_label, truncate};

/// Execute the `alerts` command.
///
/// Every mutating action writes the state file back.
pub async fn execute(
    args: AlertsArgs,
    ctx: &AppContext,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    let lifecycle = AlertLifecycle::new(Arc::clone(&ctx.store), &ctx.triage);

    let alert = match args.action {
        AlertsAction::List => {
            let alerts = lifecycle.list().await?;
            return writer.render(&AlertList { alerts });
        }
        AlertsAction::Create {
            title,
            severity,
            source,
            description,
            systems,
        } => {
            lifecycle
                .create(NewAlert {
                    severity,
                    title,
                    description,
                    source,
                    affected_systems: systems,
                    ..Default::default()
                })
                .await?
        }
        AlertsAction::Investigate { id } => lifecycle.apply(id, AlertAction::Investigate).await?,
        AlertsAction::Resolve { id } => lifecycle.apply(id, AlertAction::Resolve).await?,
        AlertsAction::FalsePositive { id } => {
            lifecycle.apply(id, AlertAction::MarkFalsePositive).await?
        }
        AlertsAction::SetStatus { id, status } => lifecycle.set_status(id, status).await?,
        AlertsAction::Assign { id, to } => lifecycle.assign(id, to).await?,
    };

    ctx.persist().await?;
    writer.render(&AlertDetail(alert))
}

#[derive(Serialize)]
pub struct AlertList {
    pub alerts: Vec<ThreatAlert>,
}

impl Render for AlertList {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        if self.alerts.is_empty() {
            writeln!(w, "No alerts.")?;
            return Ok(());
        }
        writeln!(
            w,
            "{:<36} {:<8} {:<15} {:<16} Title",
            "ID", "Severity", "Status", "Created"
        )?;
        writeln!(w, "{}", "-".repeat(100))?;
        for alert in &self.alerts {
            writeln!(
                w,
                "{:<36} {} {:<15} {:<16} {}",
                alert.id,
                severity_label(alert.severity),
                alert.status.as_str(),
                alert.created_at.format("%Y-%m-%d %H:%M"),
                truncate(&alert.title, 40)
            )?;
        }
        Ok(())
    }
}

#[derive(Serialize)]
#[serde(transparent)]
pub struct AlertDetail(pub ThreatAlert);

fn stamp(at: Option<DateTime<Utc>>) -> String {
    at.map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "-".to_owned())
}

impl Render for AlertDetail {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        let a = &self.0;
        writeln!(w, "{} {}", a.title.bold(), format!("({})", a.id).dimmed())?;
        writeln!(w, "  Severity:  {}", severity_label(a.severity).trim_end())?;
        writeln!(w, "  Status:    {}", a.status)?;
        writeln!(w, "  Source:    {}", a.source)?;
        writeln!(w, "  Assigned:  {}", a.assigned_to.as_deref().unwrap_or("-"))?;
        if !a.affected_systems.is_empty() {
            writeln!(w, "  Systems:   {}", a.affected_systems.join(", "))?;
        }
        writeln!(w, "  Resolved:  {}", stamp(a.resolved_at))?;
        if !a.description.is_empty() {
            writeln!(w)?;
            writeln!(w, "  {}", a.description)?;
        }
        Ok(())
    }
}
