//! The `history` subcommand.

use super::{build_context, load_or_scan};
use librgc::{Result, RgcError};
use std::path::Path;

/// Scans (or loads) the graph and prints the ordered history of a layer
/// as JSON.
pub async fn run(
    config_path: Option<&Path>,
    graph_file: Option<&Path>,
    save: Option<&Path>,
    image: &str,
) -> Result<()> {
    let rgc = build_context(config_path)?;
    let graph = load_or_scan(&rgc, graph_file, save).await?;

    let entries = rgc.history(&graph, image).await?;
    let output = serde_json::to_string_pretty(&entries)
        .map_err(|e| RgcError::parse_with_source("Failed to format history", e))?;
    println!("{}", output);

    Ok(())
}
