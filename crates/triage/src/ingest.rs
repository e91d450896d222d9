//! Ingestion pipeline.
//!
//! Uploads are processed strictly in order. For each file only the first
//! `max_lines_per_file` non-blank lines are classified, and the resulting
//! batch is written with one atomic insert. Progress is reported after each
//! file's insert. An insert failure stops the upload; files committed before
//! it stay committed.
//!
//! ```text
//! files -> extension check -> split lines -> drop blanks -> take N
//!       -> LineClassifier -> Datastore::insert_logs -> progress
//! ```

use std::path::Path;
use std::sync::Arc;

use bytes::Bytes;
use serde::Serialize;
use tokio::sync::mpsc;

use watchpost_core::metrics as m;
use watchpost_core::pipeline::LineClassifier;
use watchpost_core::store::Datastore;

use crate::classifier::KeywordClassifier;
use crate::config::TriageConfig;
use crate::error::TriageError;

/// One uploaded file.
#[derive(Debug, Clone)]
pub struct UploadFile {
    /// File name, also used as the entries' source name
    pub name: String,
    pub contents: Bytes,
}

impl UploadFile {
    pub fn new(name: impl Into<String>, contents: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            contents: contents.into(),
        }
    }

    /// Reads a file from disk, naming it after its final path component.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, TriageError> {
        let path = path.as_ref();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| {
                TriageError::Validation(format!("not a file path: {}", path.display()))
            })?;
        let contents = tokio::fs::read(path).await?;
        Ok(Self::new(name, contents))
    }
}

/// Progress after one file was committed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestProgress {
    /// Files committed so far
    pub completed: usize,
    pub total: usize,
    /// File just committed
    pub file: String,
    /// Entries stored from that file
    pub entries: usize,
}

impl IngestProgress {
    /// Completion percentage, rounded.
    pub fn percent(&self) -> u8 {
        if self.total == 0 {
            return 100;
        }
        ((self.completed as f64 / self.total as f64) * 100.0).round() as u8
    }
}

/// Per-file outcome of a finished upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileReport {
    pub name: String,
    pub entries: usize,
}

/// Outcome of a finished upload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    pub files: Vec<FileReport>,
    pub total_entries: usize,
}

/// Splits `text` into at most `cap` non-blank lines.
///
/// A trailing `\r` is dropped from each line.
pub fn non_blank_lines(text: &str, cap: usize) -> Vec<&str> {
    text.split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line))
        .filter(|line| !line.trim().is_empty())
        .take(cap)
        .collect()
}

/// Drives a [`LineClassifier`] over uploaded files.
pub struct IngestPipeline<S, C = KeywordClassifier> {
    store: Arc<S>,
    classifier: C,
    config: TriageConfig,
    progress_tx: Option<mpsc::Sender<IngestProgress>>,
}

impl<S: Datastore, C: LineClassifier> IngestPipeline<S, C> {
    /// Number of lines classified per file.
    pub fn max_lines_per_file(&self) -> usize {
        self.config.max_lines_per_file
    }

    /// Classifies and stores `files` in order.
    ///
    /// # Errors
    /// - `Validation` when no file is given or a file has an unaccepted
    ///   extension. Nothing is written in that case.
    /// - `UploadAborted` when an insert fails. Earlier files stay committed
    ///   and later files are not processed.
    pub async fn upload(&self, files: Vec<UploadFile>) -> Result<IngestReport, TriageError> {
        if files.is_empty() {
            return Err(TriageError::Validation("no files selected".to_owned()));
        }
        if let Some(rejected) = files.iter().find(|f| !self.config.accepts(&f.name)) {
            return Err(TriageError::Validation(format!(
                "unsupported file type: {} (accepted: {})",
                rejected.name,
                self.config.accepted_extensions.join(", ")
            )));
        }

        let total = files.len();
        let mut report = IngestReport::default();

        for (index, file) in files.into_iter().enumerate() {
            let text = String::from_utf8_lossy(&file.contents);
            let entries: Vec<_> = non_blank_lines(&text, self.config.max_lines_per_file)
                .into_iter()
                .map(|line| self.classifier.classify(line, &file.name))
                .collect();

            let stored = if entries.is_empty() {
                0
            } else {
                match self.store.insert_logs(entries).await {
                    Ok(n) => n,
                    Err(reason) => {
                        metrics::counter!(m::INGEST_FAILURES_TOTAL).increment(1);
                        tracing::warn!(
                            file = %file.name,
                            committed_files = index,
                            error = %reason,
                            "insert failed, aborting upload"
                        );
                        return Err(TriageError::UploadAborted {
                            file: file.name,
                            committed_files: index,
                            reason,
                        });
                    }
                }
            };

            metrics::counter!(m::INGEST_FILES_TOTAL).increment(1);
            metrics::counter!(m::INGEST_ENTRIES_TOTAL).increment(stored as u64);
            tracing::debug!(file = %file.name, entries = stored, "file committed");

            let progress = IngestProgress {
                completed: index + 1,
                total,
                file: file.name.clone(),
                entries: stored,
            };
            if let Some(tx) = &self.progress_tx {
                // a closed receiver only means nobody is watching
                let _ = tx.send(progress).await;
            }

            report.total_entries += stored;
            report.files.push(FileReport {
                name: file.name,
                entries: stored,
            });
        }

        tracing::info!(
            files = report.files.len(),
            entries = report.total_entries,
            classifier = self.classifier.name(),
            "upload complete"
        );
        Ok(report)
    }
}

/// Builder for [`IngestPipeline`]
pub struct IngestPipelineBuilder<S, C = KeywordClassifier> {
    store: Arc<S>,
    classifier: C,
    config: TriageConfig,
    progress_tx: Option<mpsc::Sender<IngestProgress>>,
}

impl<S: Datastore> IngestPipelineBuilder<S, KeywordClassifier> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            classifier: KeywordClassifier::new(),
            config: TriageConfig::default(),
            progress_tx: None,
        }
    }
}

impl<S: Datastore, C: LineClassifier> IngestPipelineBuilder<S, C> {
    pub fn config(mut self, config: TriageConfig) -> Self {
        self.config = config;
        self
    }

    /// Replaces the default keyword classifier.
    pub fn classifier<C2: LineClassifier>(self, classifier: C2) -> IngestPipelineBuilder<S, C2> {
        IngestPipelineBuilder {
            store: self.store,
            classifier,
            config: self.config,
            progress_tx: self.progress_tx,
        }
    }

    /// Channel receiving one [`IngestProgress`] per committed file.
    pub fn progress_sender(mut self, tx: mpsc::Sender<IngestProgress>) -> Self {
        self.progress_tx = Some(tx);
        self
    }

    pub fn build(self) -> Result<IngestPipeline<S, C>, TriageError> {
        self.config.validate()?;
        Ok(IngestPipeline {
            store: self.store,
            classifier: self.classifier,
            config: self.config,
            progress_tx: self.progress_tx,
        })
    }
}
