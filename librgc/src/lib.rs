//! rgc - Registry Garbage Collector Library
//!
//! This library discovers the layers and repositories of a v1 Docker
//! registry stored in an S3-compatible bucket, reconstructs the
//! layer-parent graph with tag reachability annotations, and computes
//! which layers have been unreferenced long enough to delete safely.

#![warn(clippy::all)]

// Module dependency order:
// error → age, store → driver, graph → scanner, sweep, history → config → rgc

pub mod age;
pub mod config;
pub mod driver;
pub mod error;
pub mod graph;
pub mod history;
pub mod rgc;
pub mod scanner;
pub mod store;
pub mod sweep;

pub use config::Config;
pub use error::{Result, RgcError};
pub use graph::{LayerGraph, LayerNode};
pub use history::HistoryEntry;
pub use rgc::Rgc;
pub use scanner::ScanCounters;
pub use sweep::{SweepEngine, SweepPlan};
