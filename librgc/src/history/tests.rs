use super::*;
use crate::driver::{ContainerConfig, ImageInfo};
use std::collections::HashMap;

struct MockDriver {
    infos: HashMap<String, ImageInfo>,
}

impl MockDriver {
    fn new(infos: &[(&str, Option<&str>, Option<u64>)]) -> Self {
        let infos = infos
            .iter()
            .map(|(id, cmd, size)| {
                (
                    id.to_string(),
                    ImageInfo {
                        created: "2014-03-20T17:00:00Z".to_string(),
                        size: *size,
                        container_config: cmd.map(|c| ContainerConfig {
                            cmd: Some(c.split(' ').map(String::from).collect()),
                        }),
                    },
                )
            })
            .collect();
        Self { infos }
    }
}

impl Driver for MockDriver {
    async fn enumerate_images(
        &self,
        _emit: &mut dyn FnMut(String),
    ) -> crate::error::Result<()> {
        Ok(())
    }

    async fn enumerate_repositories(
        &self,
        _emit: &mut dyn FnMut(String),
    ) -> crate::error::Result<()> {
        Ok(())
    }

    async fn image_ancestry(&self, _id: &str) -> crate::error::Result<Vec<String>> {
        Ok(Vec::new())
    }

    async fn image_info(&self, id: &str) -> crate::error::Result<ImageInfo> {
        self.infos
            .get(id)
            .cloned()
            .ok_or_else(|| RgcError::store("no such manifest", 404))
    }

    async fn repository_index(&self, _repo: &str) -> crate::error::Result<Vec<String>> {
        Ok(Vec::new())
    }

    async fn repository_tags(
        &self,
        _repo: &str,
    ) -> crate::error::Result<HashMap<String, String>> {
        Ok(HashMap::new())
    }
}

/// Annotated A -> B graph with a detached C, as after an S1 scan.
fn annotated_graph() -> LayerGraph {
    let mut g = LayerGraph::new();
    g.add_path(&["A".to_string(), "B".to_string()]);
    g.add_node("C");
    g.node_mut("A").unwrap().refs = 1;
    g.node_mut("A").unwrap().tags.push("r1:latest".to_string());
    g.node_mut("B").unwrap().refs = 1;
    g
}

/// S5: history of A lists A then B with annotations attached.
#[tokio::test]
async fn test_history_in_topological_order() {
    let driver = MockDriver::new(&[
        ("A", Some("/bin/sh -c echo hi"), Some(1024)),
        ("B", None, None),
    ]);
    let graph = annotated_graph();

    let entries = history(&driver, &graph, "A").await.unwrap();

    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].id, "A");
    assert_eq!(entries[0].command.as_deref(), Some("/bin/sh -c echo hi"));
    assert_eq!(entries[0].size, 1024);
    assert_eq!(entries[0].refs, 1);
    assert_eq!(entries[0].tags, vec!["r1:latest"]);
    assert_eq!(entries[0].created, "2014-03-20T17:00:00Z");

    assert_eq!(entries[1].id, "B");
    assert_eq!(entries[1].command, None);
    assert_eq!(entries[1].size, 0);
    assert!(entries[1].tags.is_empty());
}

#[tokio::test]
async fn test_history_excludes_unreachable_layers() {
    let driver = MockDriver::new(&[("A", None, None), ("B", None, None)]);
    let graph = annotated_graph();

    let entries = history(&driver, &graph, "A").await.unwrap();
    assert!(entries.iter().all(|e| e.id != "C"));
}

#[tokio::test]
async fn test_history_of_leaf_layer() {
    let driver = MockDriver::new(&[("B", None, Some(7))]);
    let graph = annotated_graph();

    let entries = history(&driver, &graph, "B").await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].id, "B");
    assert_eq!(entries[0].size, 7);
}

#[tokio::test]
async fn test_history_unknown_layer_is_graph_error() {
    let driver = MockDriver::new(&[]);
    let graph = annotated_graph();

    let err = history(&driver, &graph, "ghost").await.unwrap_err();
    assert!(matches!(err, RgcError::Graph { .. }));
}

#[tokio::test]
async fn test_history_fetch_failure_aborts() {
    // B's manifest is missing from the driver.
    let driver = MockDriver::new(&[("A", None, None)]);
    let graph = annotated_graph();

    let err = history(&driver, &graph, "A").await.unwrap_err();
    assert!(matches!(err, RgcError::Store { status_code: 404, .. }));
}

#[test]
fn test_history_entry_serializes_ref_field() {
    let entry = HistoryEntry {
        id: "A".to_string(),
        command: None,
        size: 0,
        refs: 2,
        tags: vec!["r1:latest".to_string()],
        created: "2014-03-20T17:00:00Z".to_string(),
    };

    let value = serde_json::to_value(&entry).unwrap();
    assert_eq!(value["ref"], 2);
    assert_eq!(value["command"], serde_json::Value::Null);
}
