use super::*;

fn test_rgc() -> Rgc {
    let config = Config::from_yaml_str(
        "registry:\n  bucket: bkt\n  access_key: ak\n  secret_key: sk\n",
    )
    .unwrap();
    Rgc::new(config).unwrap()
}

fn sample_graph_json() -> &'static str {
    r#"{
  "directed": true,
  "nodes": [
    {"id": "A", "tags": ["r1:latest"], "repos": ["r1"], "ref": 1},
    {"id": "B", "tags": [], "repos": ["r1"], "ref": 1}
  ],
  "links": [{"source": "A", "target": "B"}]
}"#
}

#[test]
fn test_exit_code_mapping() {
    assert_eq!(exit_code(&RgcError::config("bad", None)), 2);
    assert_eq!(exit_code(&RgcError::state("unwritable")), 4);
    assert_eq!(exit_code(&RgcError::transport("down")), 3);
    assert_eq!(exit_code(&RgcError::store("oops", 500)), 3);
    assert_eq!(exit_code(&RgcError::auth("no keys")), 3);
    assert_eq!(exit_code(&RgcError::parse("bad json")), 3);
    assert_eq!(exit_code(&RgcError::graph("cycle")), 3);
}

#[test]
fn test_build_context_with_missing_config_file() {
    let result = build_context(Some(std::path::Path::new("/nonexistent/rgc.yml")));
    assert!(matches!(result, Err(RgcError::Config { .. })));
}

#[tokio::test]
async fn test_load_or_scan_from_graph_file() {
    let dir = tempfile::tempdir().unwrap();
    let graph_path = dir.path().join("graph.json");
    std::fs::write(&graph_path, sample_graph_json()).unwrap();

    let rgc = test_rgc();
    let graph = load_or_scan(&rgc, Some(&graph_path), None).await.unwrap();

    assert_eq!(graph.len(), 2);
    assert_eq!(graph.node("A").unwrap().refs, 1);
    assert_eq!(graph.node("A").unwrap().tags, vec!["r1:latest"]);
}

#[tokio::test]
async fn test_load_or_scan_saves_copy() {
    let dir = tempfile::tempdir().unwrap();
    let graph_path = dir.path().join("graph.json");
    let save_path = dir.path().join("copy.json");
    std::fs::write(&graph_path, sample_graph_json()).unwrap();

    let rgc = test_rgc();
    let original = load_or_scan(&rgc, Some(&graph_path), Some(&save_path))
        .await
        .unwrap();

    let copy = LayerGraph::load(&save_path).unwrap();
    assert_eq!(original, copy);
}

#[tokio::test]
async fn test_load_or_scan_missing_graph_file() {
    let rgc = test_rgc();
    let missing = std::path::Path::new("/nonexistent/graph.json");

    let result = load_or_scan(&rgc, Some(missing), None).await;
    assert!(matches!(result, Err(RgcError::State { .. })));
}
