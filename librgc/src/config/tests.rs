use super::*;

#[test]
fn test_default_config() {
    let config = Config::default();

    assert_eq!(config.registry.driver, "s3");
    assert_eq!(config.registry.region, "us-east-1");
    assert!(config.registry.secure);
    assert!(config.registry.endpoint.is_none());

    assert_eq!(config.network.timeout, 30);
    assert_eq!(config.network.retries, 3);
    assert_eq!(config.network.retry_step, 2);

    assert_eq!(config.scan.concurrency, 25);
    assert_eq!(config.scan.dead_letter, 5);
    assert!(config.scan.snapshot_path.is_none());

    assert_eq!(config.sweep.state_file, "delete.json");
    assert_eq!(config.sweep.default_age, "1d");
}

#[test]
fn test_from_str_empty_yaml() {
    let config = Config::from_yaml_str("").unwrap();
    assert_eq!(config, Config::default());
}

#[test]
fn test_from_str_partial_yaml() {
    let yaml = r#"
registry:
  bucket: prod-registry
  path: registry/v1
network:
  timeout: 60
"#;
    let config = Config::from_yaml_str(yaml).unwrap();

    assert_eq!(config.registry.bucket, "prod-registry");
    assert_eq!(config.registry.path, "registry/v1");
    assert_eq!(config.network.timeout, 60);

    // Unspecified values keep their defaults
    assert_eq!(config.registry.driver, "s3");
    assert_eq!(config.scan.concurrency, 25);
}

#[test]
fn test_from_str_full_yaml() {
    let yaml = r#"
registry:
  driver: s3
  bucket: images
  path: prod/registry
  access_key: AKIDEXAMPLE
  secret_key: sekrit
  region: eu-west-1
  secure: false
  endpoint: "http://localhost:9000"
network:
  timeout: 10
  retries: 5
  retry_step: 1
scan:
  concurrency: 8
  dead_letter: 3
  snapshot_path: /tmp/temp.json
sweep:
  state_file: /var/lib/rgc/delete.json
  default_age: 2w
"#;
    let config = Config::from_yaml_str(yaml).unwrap();

    assert_eq!(config.registry.bucket, "images");
    assert_eq!(config.registry.access_key, "AKIDEXAMPLE");
    assert_eq!(config.registry.region, "eu-west-1");
    assert!(!config.registry.secure);
    assert_eq!(
        config.registry.endpoint.as_deref(),
        Some("http://localhost:9000")
    );
    assert_eq!(config.network.retries, 5);
    assert_eq!(config.scan.concurrency, 8);
    assert_eq!(config.scan.snapshot_path.as_deref(), Some("/tmp/temp.json"));
    assert_eq!(config.sweep.state_file, "/var/lib/rgc/delete.json");
    assert_eq!(config.sweep.default_age, "2w");
}

#[test]
fn test_from_str_invalid_yaml() {
    let result = Config::from_yaml_str("network: { timeout: not-a-number }");
    assert!(result.is_err());
}

#[test]
fn test_load_missing_path_is_default() {
    let config = Config::load(None).unwrap();
    assert_eq!(config, Config::default());
}

#[test]
fn test_load_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("rgc.yml");
    std::fs::write(&path, "registry:\n  bucket: from-file\n").unwrap();

    let config = Config::load(Some(&path)).unwrap();
    assert_eq!(config.registry.bucket, "from-file");
}

#[test]
fn test_load_nonexistent_file_fails() {
    let result = Config::load(Some(Path::new("/nonexistent/rgc.yml")));
    assert!(matches!(result, Err(RgcError::Config { .. })));
}
