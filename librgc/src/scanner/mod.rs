//! Registry scanner.
//!
//! Builds the annotated layer graph in two sequential passes:
//!
//! 1. **Ancestry import** - every image id becomes a node and its
//!    ancestry becomes a chain of parent edges.
//! 2. **Repository/tag import** - repository indexes and tags annotate
//!    the finished DAG and propagate the reachability count along each
//!    tag head's ancestry.
//!
//! Each pass drains a FIFO queue through a bounded window of in-flight
//! fetches (default 25). All graph mutation happens on the scanner's own
//! task between polls, so the graph needs no lock. Failed items re-enter
//! the queue; a run of identical failures aborts the pass.

use crate::config::Scan;
use crate::driver::Driver;
use crate::error::{Result, RgcError};
use crate::graph::LayerGraph;
use futures_util::StreamExt;
use futures_util::stream::FuturesUnordered;
use std::collections::{HashSet, VecDeque};
use std::path::PathBuf;


/// Per-scan statistics.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ScanCounters {
    /// Images whose ancestry was imported.
    pub images: u64,
    /// Ancestry fetches that failed and were re-enqueued.
    pub ancestry_retries: u64,
    /// Repositories annotated into the graph.
    pub repositories: u64,
    /// Repository fetches that failed and were re-enqueued.
    pub repository_retries: u64,
    /// Tags applied to head layers.
    pub tags: u64,
    /// Indexed or tagged layers absent from the graph.
    pub missing_layers: u64,
}

/// A queued work item with its dispatch count.
struct Work {
    item: String,
    attempts: usize,
}

/// Aborts a pass after a run of identical failures.
struct DeadLetter {
    limit: usize,
    streak: usize,
    last: Option<String>,
}

impl DeadLetter {
    fn new(limit: usize) -> Self {
        Self {
            limit: limit.max(1),
            streak: 0,
            last: None,
        }
    }

    fn success(&mut self) {
        self.streak = 0;
        self.last = None;
    }

    /// Records a failure; returns the error back for re-enqueue handling,
    /// or fails when the streak reaches the limit.
    fn observe(&mut self, err: RgcError) -> Result<RgcError> {
        let message = err.to_string();
        if self.last.as_deref() == Some(message.as_str()) {
            self.streak += 1;
        } else {
            self.streak = 1;
            self.last = Some(message);
        }
        if self.streak >= self.limit {
            return Err(err);
        }
        Ok(err)
    }
}

/// Two-pass graph builder over a registry driver.
pub struct Scanner<'a, D: Driver> {
    driver: &'a D,
    concurrency: usize,
    dead_letter: usize,
    snapshot_path: Option<PathBuf>,
    counters: ScanCounters,
}

impl<'a, D: Driver> Scanner<'a, D> {
    pub fn new(driver: &'a D, options: &Scan) -> Self {
        Self {
            driver,
            concurrency: options.concurrency.max(1),
            dead_letter: options.dead_letter,
            snapshot_path: options.snapshot_path.as_ref().map(PathBuf::from),
            counters: ScanCounters::default(),
        }
    }

    /// Statistics accumulated by [`scan`](Self::scan).
    pub fn counters(&self) -> &ScanCounters {
        &self.counters
    }

    /// Builds the full annotated graph.
    ///
    /// Tag import only starts once ancestry import has drained, so the
    /// reachability traversal always runs against the final DAG.
    pub async fn scan(&mut self) -> Result<LayerGraph> {
        let mut graph = LayerGraph::new();

        self.import_ancestry(&mut graph).await?;
        if let Some(path) = self.snapshot_path.clone() {
            tracing::debug!(path = %path.display(), "writing intermediate graph snapshot");
            graph.save(&path)?;
        }
        self.import_repositories(&mut graph).await?;

        tracing::debug!(
            images = self.counters.images,
            repositories = self.counters.repositories,
            tags = self.counters.tags,
            "scan complete"
        );
        Ok(graph)
    }

    /// Pass 1: import every image's ancestry as nodes and parent edges.
    async fn import_ancestry(&mut self, graph: &mut LayerGraph) -> Result<()> {
        let mut ids = Vec::new();
        self.driver.enumerate_images(&mut |id| ids.push(id)).await?;
        tracing::debug!(count = ids.len(), "enumerated images");

        let mut queue: VecDeque<Work> = ids
            .into_iter()
            .map(|item| Work { item, attempts: 0 })
            .collect();
        let mut in_flight = FuturesUnordered::new();
        let mut dead_letter = DeadLetter::new(self.dead_letter);

        loop {
            while in_flight.len() < self.concurrency {
                let Some(work) = queue.pop_front() else { break };
                graph.add_node(&work.item);
                let driver = self.driver;
                in_flight.push(async move {
                    let result = driver.image_ancestry(&work.item).await;
                    (work, result)
                });
            }

            let Some((mut work, result)) = in_flight.next().await else {
                break;
            };
            match result {
                Ok(ancestry) => {
                    dead_letter.success();
                    graph.add_path(&ancestry);
                    self.counters.images += 1;
                }
                Err(e) => {
                    let e = dead_letter.observe(e)?;
                    work.attempts += 1;
                    if work.attempts > self.dead_letter {
                        return Err(e);
                    }
                    tracing::warn!(
                        image = %work.item,
                        attempts = work.attempts,
                        error = %e,
                        "ancestry import failed, re-enqueueing"
                    );
                    self.counters.ancestry_retries += 1;
                    queue.push_back(work);
                }
            }
        }

        Ok(())
    }

    /// Pass 2: annotate repositories and tags, propagating `ref` counts.
    ///
    /// A repository is fetched in full before any mutation and marked
    /// processed first, so a re-enqueued repository can never apply its
    /// annotations twice.
    async fn import_repositories(&mut self, graph: &mut LayerGraph) -> Result<()> {
        let mut repos = Vec::new();
        self.driver
            .enumerate_repositories(&mut |repo| repos.push(repo))
            .await?;
        tracing::debug!(count = repos.len(), "enumerated repositories");

        let mut queue: VecDeque<Work> = repos
            .into_iter()
            .map(|item| Work { item, attempts: 0 })
            .collect();
        let mut in_flight = FuturesUnordered::new();
        let mut dead_letter = DeadLetter::new(self.dead_letter);
        let mut processed: HashSet<String> = HashSet::new();

        loop {
            while in_flight.len() < self.concurrency {
                let Some(work) = queue.pop_front() else { break };
                if processed.contains(&work.item) {
                    continue;
                }
                let driver = self.driver;
                in_flight.push(async move {
                    let result = async {
                        let index = driver.repository_index(&work.item).await?;
                        let tags = driver.repository_tags(&work.item).await?;
                        Ok::<_, RgcError>((index, tags))
                    }
                    .await;
                    (work, result)
                });
            }

            let Some((mut work, result)) = in_flight.next().await else {
                break;
            };
            match result {
                Ok((index, tags)) => {
                    dead_letter.success();
                    if !processed.insert(work.item.clone()) {
                        continue;
                    }
                    self.annotate_repository(graph, &work.item, index, tags);
                    self.counters.repositories += 1;
                }
                Err(e) => {
                    let e = dead_letter.observe(e)?;
                    work.attempts += 1;
                    if work.attempts > self.dead_letter {
                        return Err(e);
                    }
                    tracing::warn!(
                        repository = %work.item,
                        attempts = work.attempts,
                        error = %e,
                        "repository import failed, re-enqueueing"
                    );
                    self.counters.repository_retries += 1;
                    queue.push_back(work);
                }
            }
        }

        Ok(())
    }

    fn annotate_repository(
        &mut self,
        graph: &mut LayerGraph,
        repo: &str,
        index: Vec<String>,
        tags: std::collections::HashMap<String, String>,
    ) {
        for id in index {
            match graph.node_mut(&id) {
                Some(node) => node.repos.push(repo.to_string()),
                None => {
                    self.counters.missing_layers += 1;
                    tracing::warn!(
                        repository = repo,
                        layer = %id,
                        "repository index references a layer missing from the graph"
                    );
                }
            }
        }

        // Sort for a stable annotation order across runs.
        let mut tags: Vec<(String, String)> = tags.into_iter().collect();
        tags.sort();
        for (tag, head) in tags {
            if !graph.contains(&head) {
                self.counters.missing_layers += 1;
                tracing::warn!(
                    repository = repo,
                    tag = %tag,
                    layer = %head,
                    "tag points at a layer missing from the graph"
                );
                continue;
            }
            graph
                .node_mut(&head)
                .expect("head checked above")
                .tags
                .push(format!("{}:{}", repo, tag));
            for id in graph.dfs(&head) {
                graph.node_mut(&id).expect("dfs returned unknown node").refs += 1;
            }
            self.counters.tags += 1;
        }
    }
}
