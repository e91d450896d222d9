//! Command handlers, one module per subcommand.

pub mod alerts;
pub mod analytics;
pub mod analyze;
pub mod config;
pub mod import;
pub mod incidents;
pub mod report;
pub mod rules;
pub mod search;
pub mod sources;
pub mod stats;

use crate::cli::Commands;
use crate::context::AppContext;
use crate::error::CliError;
use crate::output::OutputWriter;

/// Runs every command that works on the stored state.
pub async fn dispatch(
    command: Commands,
    ctx: &AppContext,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    match command {
        Commands::Import(args) => import::execute(args, ctx, writer).await,
        Commands::Search(args) => search::execute(args, ctx, writer).await,
        Commands::Analytics => analytics::execute(ctx, writer).await,
        Commands::Stats => stats::execute(ctx, writer).await,
        Commands::Alerts(args) => alerts::execute(args, ctx, writer).await,
        Commands::Incidents(args) => incidents::execute(args, ctx, writer).await,
        Commands::Sources(args) => sources::execute(args, ctx, writer).await,
        Commands::Rules(args) => rules::execute(args, ctx, writer).await,
        Commands::Analyze(args) => analyze::execute(args, ctx, writer).await,
        Commands::Report(args) => report::execute(args, writer).await,
        Commands::Config(_) => Err(CliError::Command(
            "config commands do not use the stored state".to_owned(),
        )),
    }
}
