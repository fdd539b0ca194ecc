//! The `sweep` subcommand.

use super::{build_context, load_or_scan};
use chrono::Utc;
use librgc::{Result, RgcError};
use std::path::Path;

/// Scans (or loads) the graph, prints the delete candidate set as a JSON
/// array, then persists the new sweep state.
///
/// The candidate set is printed before the state file is touched so a
/// failed state write still reports the result.
pub async fn run(
    config_path: Option<&Path>,
    graph_file: Option<&Path>,
    save: Option<&Path>,
    age: Option<&str>,
) -> Result<()> {
    let rgc = build_context(config_path)?;
    // Reject a bad --age before doing any network work.
    let engine = rgc.sweep_engine(age)?;

    let graph = load_or_scan(&rgc, graph_file, save).await?;
    let plan = engine.plan(&graph, Utc::now())?;

    let output = serde_json::to_string_pretty(&plan.candidates)
        .map_err(|e| RgcError::parse_with_source("Failed to format candidate set", e))?;
    println!("{}", output);

    if plan.candidates.is_empty() {
        tracing::debug!(pending = plan.pending(), "no expired candidates");
    }

    engine.commit(&plan)
}
