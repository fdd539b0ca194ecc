//! Sweep engine.
//!
//! A layer becomes a delete candidate only after it has been observed
//! unreferenced on two runs separated by at least the minimum age. The
//! engine persists a `{layer id -> first seen unreferenced}` map between
//! runs; a tag repoint that briefly unreferences a layer mid-scan can
//! therefore never cause deletion on a single pass.

use crate::error::{Result, RgcError};
use crate::graph::LayerGraph;
use chrono::{DateTime, Duration, Utc};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};


/// Persisted sweep state: first-seen-unreferenced timestamps.
pub type SweepState = BTreeMap<String, DateTime<Utc>>;

/// The outcome of one sweep computation.
///
/// Candidates are ordered descendants-first so a downstream delete
/// executor can remove layers from the leaves up.
#[derive(Debug)]
pub struct SweepPlan {
    /// Layers unreferenced for longer than the minimum age.
    pub candidates: Vec<String>,
    /// State to persist: currently-unreferenced layers that are not yet
    /// old enough.
    next_state: SweepState,
}

impl SweepPlan {
    /// Number of layers currently unreferenced but not yet candidates.
    pub fn pending(&self) -> usize {
        self.next_state.len()
    }
}

/// Computes and persists sweep state against an annotated graph.
pub struct SweepEngine {
    min_age: Duration,
    state_path: PathBuf,
}

impl SweepEngine {
    pub fn new(min_age: Duration, state_path: &Path) -> Self {
        Self {
            min_age,
            state_path: state_path.to_path_buf(),
        }
    }

    /// Loads the previous sweep state.
    ///
    /// An absent or unreadable file is treated as empty state (first
    /// run).
    pub fn load_state(&self) -> SweepState {
        let contents = match std::fs::read_to_string(&self.state_path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(
                    path = %self.state_path.display(),
                    "no previous sweep state, starting fresh"
                );
                return SweepState::new();
            }
            Err(e) => {
                tracing::warn!(
                    path = %self.state_path.display(),
                    error = %e,
                    "sweep state unreadable, treating as first run"
                );
                return SweepState::new();
            }
        };

        match serde_json::from_str(&contents) {
            Ok(state) => state,
            Err(e) => {
                tracing::warn!(
                    path = %self.state_path.display(),
                    error = %e,
                    "sweep state malformed, treating as first run"
                );
                SweepState::new()
            }
        }
    }

    /// Computes the delete candidate set at `now`.
    ///
    /// Refuses to sweep a cyclic graph: ancestry cycles mean the
    /// registry's metadata cannot be trusted.
    pub fn plan(&self, graph: &LayerGraph, now: DateTime<Utc>) -> Result<SweepPlan> {
        let unreferenced: HashSet<String> = graph
            .nodes()
            .filter(|node| node.refs < 1)
            .map(|node| node.id.clone())
            .collect();

        let ordered = graph.topo_sort(Some(&unreferenced))?;
        let previous = self.load_state();

        let mut candidates = Vec::new();
        let mut next_state = SweepState::new();
        for id in ordered {
            match previous.get(&id) {
                Some(&first_seen) if now - first_seen > self.min_age => {
                    candidates.push(id);
                }
                Some(&first_seen) => {
                    next_state.insert(id, first_seen);
                }
                None => {
                    next_state.insert(id, now);
                }
            }
        }

        tracing::debug!(
            candidates = candidates.len(),
            pending = next_state.len(),
            "sweep planned"
        );
        Ok(SweepPlan {
            candidates,
            next_state,
        })
    }

    /// Persists the plan's next state.
    ///
    /// The file is replaced atomically; on failure the previous state is
    /// left untouched.
    pub fn commit(&self, plan: &SweepPlan) -> Result<()> {
        let json = serde_json::to_string_pretty(&plan.next_state)
            .map_err(|e| RgcError::state_with_source("Failed to serialize sweep state", e))?;

        let tmp = self.state_path.with_extension("tmp");
        std::fs::write(&tmp, &json).map_err(|e| {
            RgcError::state_with_source(
                format!("Failed to write sweep state {}", tmp.display()),
                e,
            )
        })?;
        std::fs::rename(&tmp, &self.state_path).map_err(|e| {
            RgcError::state_with_source(
                format!(
                    "Failed to replace sweep state {}",
                    self.state_path.display()
                ),
                e,
            )
        })
    }
}
