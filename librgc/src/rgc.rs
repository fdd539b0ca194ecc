//! High-level API for the rgc library.
//!
//! [`Rgc`] wires configuration to the object store and registry driver
//! and exposes the three top-level operations: scan, sweep, and history.
//! All state is explicit; tests can instantiate several `Rgc` values
//! against different registries in one process.
//!
//! # Examples
//!
//! ```no_run
//! use librgc::{Config, Rgc};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load(None)?;
//!     let rgc = Rgc::new(config)?;
//!
//!     let (graph, counters) = rgc.scan().await?;
//!     println!("scanned {} layers", graph.len());
//!     println!("imported {} tags", counters.tags);
//!
//!     let engine = rgc.sweep_engine(Some("1d"))?;
//!     let plan = engine.plan(&graph, chrono::Utc::now())?;
//!     for id in &plan.candidates {
//!         println!("{}", id);
//!     }
//!     engine.commit(&plan)?;
//!     Ok(())
//! }
//! ```

use crate::config::Config;
use crate::driver::S3Driver;
use crate::error::{Result, RgcError};
use crate::graph::LayerGraph;
use crate::history::{self, HistoryEntry};
use crate::scanner::{ScanCounters, Scanner};
use crate::store::{ObjectStore, StoreConfig};
use crate::sweep::SweepEngine;
use std::path::Path;

/// The garbage collector context: configuration plus a connected driver.
pub struct Rgc {
    config: Config,
    driver: S3Driver,
}

impl Rgc {
    /// Builds a context from a resolved configuration.
    ///
    /// Fails with a configuration error for unknown storage drivers and
    /// with an authentication error when credentials are missing.
    pub fn new(config: Config) -> Result<Self> {
        if config.registry.driver != "s3" {
            return Err(RgcError::config(
                format!(
                    "Unsupported registry driver '{}'; only 's3' is available",
                    config.registry.driver
                ),
                None,
            ));
        }

        let store = ObjectStore::new(StoreConfig {
            bucket: config.registry.bucket.clone(),
            region: config.registry.region.clone(),
            access_key: config.registry.access_key.clone(),
            secret_key: config.registry.secret_key.clone(),
            secure: config.registry.secure,
            endpoint: config.registry.endpoint.clone(),
            timeout_seconds: config.network.timeout,
            max_retries: config.network.retries,
            retry_step_seconds: config.network.retry_step,
        })?;
        let driver = S3Driver::new(store, &config.registry.path);

        Ok(Self { config, driver })
    }

    /// The resolved configuration this context runs with.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Scans the registry into an annotated graph.
    pub async fn scan(&self) -> Result<(LayerGraph, ScanCounters)> {
        let mut scanner = Scanner::new(&self.driver, &self.config.scan);
        let graph = scanner.scan().await?;
        let counters = scanner.counters().clone();
        Ok((graph, counters))
    }

    /// Creates a sweep engine for the given age specification, falling
    /// back to the configured default age.
    pub fn sweep_engine(&self, age: Option<&str>) -> Result<SweepEngine> {
        let spec = age.unwrap_or(&self.config.sweep.default_age);
        let min_age = crate::age::parse_age(spec)?;
        Ok(SweepEngine::new(
            min_age,
            Path::new(&self.config.sweep.state_file),
        ))
    }

    /// Builds the ordered history of a layer against a scanned graph.
    pub async fn history(&self, graph: &LayerGraph, id: &str) -> Result<Vec<HistoryEntry>> {
        history::history(&self.driver, graph, id).await
    }
}
