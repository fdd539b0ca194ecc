//! Subcommand handlers.

use librgc::{Config, LayerGraph, Result, Rgc, RgcError};
use std::path::Path;

pub mod history;
pub mod sweep;

#[cfg(test)]
mod tests;

/// Maps an error to the process exit code.
///
/// 2: configuration, 4: graph or sweep-state file I/O, 3: everything the
/// registry can throw at us.
pub fn exit_code(error: &RgcError) -> i32 {
    match error {
        RgcError::Config { .. } => 2,
        RgcError::State { .. } => 4,
        _ => 3,
    }
}

/// Builds the garbage collector context from an optional config file.
pub fn build_context(config_path: Option<&Path>) -> Result<Rgc> {
    let config = Config::load(config_path)?;
    Rgc::new(config)
}

/// Obtains the annotated graph: loaded from a file when given, scanned
/// otherwise. Saves it afterwards when requested.
pub async fn load_or_scan(
    rgc: &Rgc,
    graph_file: Option<&Path>,
    save: Option<&Path>,
) -> Result<LayerGraph> {
    let graph = match graph_file {
        Some(path) => {
            tracing::debug!(path = %path.display(), "loading saved graph");
            LayerGraph::load(path)?
        }
        None => {
            let (graph, counters) = rgc.scan().await?;
            tracing::debug!(
                images = counters.images,
                repositories = counters.repositories,
                tags = counters.tags,
                missing_layers = counters.missing_layers,
                "registry scan finished"
            );
            graph
        }
    };

    if let Some(path) = save {
        graph.save(path)?;
        tracing::debug!(path = %path.display(), "graph saved");
    }

    Ok(graph)
}
