//! `watchpost analyze` command handler

use std::io::Write;
use std::sync::Arc;

use colored::Colorize;
use serde::Serialize;

use watchpost_triage::{AnalysisResult, Analyzer, HttpInferenceEndpoint, Preset, TriageError};

use crate::cli::{AnalyzeArgs, PresetArg};
use crate::context::AppContext;
use crate::error::CliError;
use crate::output::{OutputWriter, Render, severity_label};

impl From<PresetArg> for Preset {
    fn from(arg: PresetArg) -> Self {
        match arg {
            PresetArg::Anomalies => Preset::Anomalies,
            PresetArg::ThreatSummary => Preset::ThreatSummary,
            PresetArg::SecurityPosture => Preset::SecurityPosture,
            PresetArg::Recommendations => Preset::Recommendations,
        }
    }
}

/// Execute the `analyze` command.
///
/// A blank question is rejected before the endpoint configuration is
/// looked at.
pub async fn execute(
    args: AnalyzeArgs,
    ctx: &AppContext,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    let query = match (args.preset, args.query) {
        (Some(preset), _) => Preset::from(preset).query().to_owned(),
        (None, Some(query)) => query,
        (None, None) => String::new(),
    };
    if query.trim().is_empty() {
        return Err(TriageError::Validation("analysis query must not be empty".to_owned()).into());
    }

    let endpoint = HttpInferenceEndpoint::from_config(&ctx.config.analysis)?;
    let analyzer = Analyzer::new(Arc::clone(&ctx.store), endpoint, &ctx.config.analysis);
    let result = analyzer.analyze(&query).await?;

    writer.render(&AnalysisReport { query, result })
}

#[derive(Serialize)]
pub struct AnalysisReport {
    pub query: String,
    #[serde(flatten)]
    pub result: AnalysisResult,
}

impl Render for AnalysisReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        writeln!(w, "{}", self.query.bold())?;
        writeln!(w)?;
        if self.result.insights.is_empty() && self.result.issues.is_empty() {
            writeln!(w, "No findings.")?;
            return Ok(());
        }
        for insight in &self.result.insights {
            writeln!(w, "  * {insight}")?;
        }
        if !self.result.issues.is_empty() {
            writeln!(w)?;
            writeln!(w, "{}", "Issues".bold())?;
            for issue in &self.result.issues {
                writeln!(w, "  {} {}", severity_label(issue.severity), issue.title)?;
                if !issue.description.is_empty() {
                    writeln!(w, "           {}", issue.description.dimmed())?;
                }
            }
        }
        Ok(())
    }
}
