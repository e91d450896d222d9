//! `watchpost sources` command handler

use std::io::Write;

use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

use watchpost_core::error::WatchpostError;
use watchpost_core::store::Datastore;
use watchpost_core::types::{LogSource, SourceStatus};

use crate::cli::{SourcesAction, SourcesArgs};
use crate::context::AppContext;
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Execute the `sources` command.
pub async fn execute(
    args: SourcesArgs,
    ctx: &AppContext,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    match args.action {
        SourcesAction::List => {
            let sources = ctx.store.list_sources().await.map_err(WatchpostError::from)?;
            writer.render(&SourceList { sources })
        }
        SourcesAction::Add {
            name,
            source_type,
            description,
            inactive,
        } => {
            let name = name.trim();
            if name.is_empty() {
                return Err(CliError::Command("source name must not be empty".to_owned()));
            }
            let source = LogSource {
                id: Uuid::new_v4(),
                name: name.to_owned(),
                source_type,
                description: description.filter(|d| !d.trim().is_empty()),
                connection_config: None,
                status: if inactive {
                    SourceStatus::Inactive
                } else {
                    SourceStatus::Active
                },
                last_sync: None,
                created_at: Utc::now(),
            };
            ctx.store.insert_source(source.clone()).await.map_err(WatchpostError::from)?;
            ctx.persist().await?;
            tracing::info!(source_id = %source.id, name = %source.name, "log source registered");
            writer.render(&SourceList {
                sources: vec![source],
            })
        }
    }
}

#[derive(Serialize)]
pub struct SourceList {
    pub sources: Vec<LogSource>,
}

impl Render for SourceList {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        if self.sources.is_empty() {
            writeln!(w, "No log sources registered.")?;
            return Ok(());
        }
        writeln!(w, "{:<36} {:<24} {:<9} Status", "ID", "Name", "Type")?;
        writeln!(w, "{}", "-".repeat(80))?;
        for source in &self.sources {
            writeln!(
                w,
                "{:<36} {:<24} {:<9} {}",
                source.id, source.name, source.source_type, source.status
            )?;
        }
        Ok(())
    }
}
