//! `watchpost search` command handler

use std::io::Write;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use watchpost_core::types::{LogEntry, LogLevel};
use watchpost_triage::{FilterEngine, FilterSpec};

use crate::cli::SearchArgs;
use crate::context::AppContext;
use crate::error::CliError;
use crate::output::{OutputWriter, Render, level_label, truncate};

const MESSAGE_WIDTH: usize = 80;

/// Execute the `search` command.
pub async fn execute(
    args: SearchArgs,
    ctx: &AppContext,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    let engine = FilterEngine::new(Arc::clone(&ctx.store), &ctx.triage);

    if args.list_sources {
        let sources = engine.distinct_sources().await?;
        return writer.render(&SourceNames { sources });
    }

    let spec = FilterSpec {
        query: args.query,
        level: args.level.map(|l| l.as_str().to_owned()),
        source: args.source,
        ip: args.ip,
        start: args.since,
        end: args.until,
    };
    let entries = engine.search(&spec).await?;

    writer.render(&SearchResult {
        count: entries.len(),
        entries: entries.into_iter().map(LogRow::from).collect(),
    })
}

#[derive(Serialize)]
pub struct SearchResult {
    pub count: usize,
    pub entries: Vec<LogRow>,
}

#[derive(Serialize)]
pub struct LogRow {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub source: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
}

impl From<LogEntry> for LogRow {
    fn from(entry: LogEntry) -> Self {
        Self {
            id: entry.id.to_string(),
            timestamp: entry.timestamp,
            level: entry.level,
            source: entry.source_name,
            message: entry.message,
            ip_address: entry.ip_address.map(|ip| ip.to_string()),
        }
    }
}

impl Render for SearchResult {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        if self.entries.is_empty() {
            writeln!(w, "No matching log entries.")?;
            return Ok(());
        }
        for row in &self.entries {
            writeln!(
                w,
                "{} {} {:<20} {}",
                row.timestamp.format("%Y-%m-%d %H:%M:%S"),
                level_label(row.level),
                truncate(&row.source, 20),
                truncate(&row.message, MESSAGE_WIDTH)
            )?;
        }
        writeln!(w)?;
        writeln!(w, "{} entries", self.count)?;
        Ok(())
    }
}

#[derive(Serialize)]
pub struct SourceNames {
    pub sources: Vec<String>,
}

impl Render for SourceNames {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        for name in &self.sources {
            writeln!(w, "{name}")?;
        }
        Ok(())
    }
}
