use librgc::{Config, Rgc, RgcError};

fn credentialed_config(driver: &str) -> Config {
    let yaml = format!(
        "registry:\n  driver: {}\n  bucket: bkt\n  access_key: ak\n  secret_key: sk\n",
        driver
    );
    Config::from_yaml_str(&yaml).unwrap()
}

#[test]
fn test_rgc_new_with_s3_driver() {
    let rgc = Rgc::new(credentialed_config("s3")).unwrap();
    assert_eq!(rgc.config().registry.bucket, "bkt");
}

#[test]
fn test_rgc_new_rejects_unknown_driver() {
    let result = Rgc::new(credentialed_config("swift"));
    assert!(matches!(result, Err(RgcError::Config { .. })));
}

#[test]
fn test_rgc_new_requires_credentials() {
    let result = Rgc::new(Config::default());
    assert!(matches!(result, Err(RgcError::Auth { .. })));
}

#[test]
fn test_sweep_engine_rejects_bad_age() {
    let rgc = Rgc::new(credentialed_config("s3")).unwrap();
    assert!(rgc.sweep_engine(Some("nonsense")).is_err());
    assert!(rgc.sweep_engine(Some("2w")).is_ok());
    // Falls back to the configured default age.
    assert!(rgc.sweep_engine(None).is_ok());
}
