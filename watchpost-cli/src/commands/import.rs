//! `watchpost import` command handler

use std::io::Write;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::mpsc;

use watchpost_triage::{Detector, FileReport, IngestPipelineBuilder, IngestProgress, UploadFile};

use crate::cli::ImportArgs;
use crate::context::AppContext;
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Execute the `import` command.
///
/// Progress goes to stderr. State is saved even when the upload aborts, so
/// files committed before the failure are kept.
pub async fn execute(
    args: ImportArgs,
    ctx: &AppContext,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    let mut files = Vec::with_capacity(args.files.len());
    for path in &args.files {
        files.push(UploadFile::from_path(path).await?);
    }

    let (tx, rx) = mpsc::channel(16);
    let progress = tokio::spawn(print_progress(rx));
    let pipeline = IngestPipelineBuilder::new(Arc::clone(&ctx.store))
        .config(ctx.triage.clone())
        .progress_sender(tx)
        .build()?;

    let committed_before = ctx.store.snapshot().await.logs.len();
    let outcome = pipeline.upload(files).await;
    drop(pipeline);
    if let Err(e) = progress.await {
        tracing::warn!(error = %e, "progress printer ended abnormally");
    }

    ctx.persist().await?;
    let upload = outcome?;

    let alerts_raised = if args.detect {
        let imported = ctx.store.snapshot().await.logs.split_off(committed_before);
        let detector = Detector::from_store(Arc::clone(&ctx.store)).await?;
        let alerts = detector.detect(&imported).await?;
        ctx.persist().await?;
        Some(alerts.len())
    } else {
        None
    };

    writer.render(&ImportReport {
        files: upload.files,
        total_entries: upload.total_entries,
        alerts_raised,
    })?;
    Ok(())
}

async fn print_progress(mut rx: mpsc::Receiver<IngestProgress>) {
    while let Some(p) = rx.recv().await {
        eprintln!(
            "[{:>3}%] {} ({} entries, {}/{})",
            p.percent(),
            p.file,
            p.entries,
            p.completed,
            p.total
        );
    }
}

#[derive(Serialize)]
struct ImportReport {
    files: Vec<FileReport>,
    total_entries: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    alerts_raised: Option<usize>,
}

impl Render for ImportReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        for file in &self.files {
            writeln!(w, "{:<40} {:>6} entries", file.name, file.entries)?;
        }
        writeln!(
            w,
            "Imported {} entries from {} file(s)",
            self.total_entries,
            self.files.len()
        )?;
        if let Some(alerts) = self.alerts_raised {
            writeln!(w, "Detection raised {alerts} alert(s)")?;
        }
        Ok(())
    }
}
