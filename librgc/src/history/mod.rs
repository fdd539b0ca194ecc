//! Image history reporting.
//!
//! Derives the ordered ancestry history of a layer from the scanned
//! graph, enriched with per-layer manifest metadata.

use crate::driver::Driver;
use crate::error::{Result, RgcError};
use crate::graph::LayerGraph;
use serde::Serialize;

#[cfg(test)]
mod tests;

/// One layer in a history listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistoryEntry {
    pub id: String,
    /// Space-joined command the layer was built from, when recorded.
    pub command: Option<String>,
    pub size: u64,
    #[serde(rename = "ref")]
    pub refs: u64,
    pub tags: Vec<String>,
    pub created: String,
}

/// Builds the history of `id`: the reachable subgraph in topological
/// order, one record per layer.
///
/// Read-only; any manifest fetch failure aborts with that error.
pub async fn history<D: Driver>(
    driver: &D,
    graph: &LayerGraph,
    id: &str,
) -> Result<Vec<HistoryEntry>> {
    if !graph.contains(id) {
        return Err(RgcError::graph(format!("Layer {} is not in the graph", id)));
    }

    let tree = graph.dfs_tree(id);
    let order = tree.topo_sort(None)?;

    let mut entries = Vec::with_capacity(order.len());
    for layer_id in order {
        let info = driver.image_info(&layer_id).await?;
        let node = tree.node(&layer_id).expect("topo_sort returned unknown node");
        entries.push(HistoryEntry {
            id: layer_id,
            command: info
                .container_config
                .and_then(|config| config.cmd)
                .map(|cmd| cmd.join(" ")),
            size: info.size.unwrap_or(0),
            refs: node.refs,
            tags: node.tags.clone(),
            created: info.created,
        });
    }

    Ok(entries)
}
