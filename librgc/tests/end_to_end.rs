//! End-to-end scan and sweep against a faked S3 registry.

use chrono::{Duration, Utc};
use mockito::Matcher;
use librgc::{Config, Rgc};

fn list_xml(prefixes: &[&str], keys: &[&str]) -> String {
    let mut body = String::from(
        r#"<?xml version="1.0" encoding="UTF-8"?><ListBucketResult><IsTruncated>false</IsTruncated>"#,
    );
    for key in keys {
        body.push_str(&format!("<Contents><Key>{}</Key></Contents>", key));
    }
    for prefix in prefixes {
        body.push_str(&format!(
            "<CommonPrefixes><Prefix>{}</Prefix></CommonPrefixes>",
            prefix
        ));
    }
    body.push_str("</ListBucketResult>");
    body
}

/// Mounts the S1 registry: images aaa (parent bbb), bbb, ccc; repository
/// webapp indexing {aaa, bbb} with latest -> aaa.
async fn mount_s1(server: &mut mockito::Server) {
    server
        .mock("GET", "/bkt/")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("delimiter".into(), "/".into()),
            Matcher::UrlEncoded("prefix".into(), "registry/images/".into()),
        ]))
        .with_body(list_xml(
            &[
                "registry/images/aaa/",
                "registry/images/bbb/",
                "registry/images/ccc/",
            ],
            &[],
        ))
        .create_async()
        .await;

    for (id, ancestry) in [
        ("aaa", r#"["aaa", "bbb"]"#),
        ("bbb", r#"["bbb"]"#),
        ("ccc", r#"["ccc"]"#),
    ] {
        server
            .mock("GET", format!("/bkt/registry/images/{}/ancestry", id).as_str())
            .with_body(ancestry)
            .create_async()
            .await;
    }

    server
        .mock("GET", "/bkt/")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("delimiter".into(), "/".into()),
            Matcher::UrlEncoded("prefix".into(), "registry/repositories/library/".into()),
        ]))
        .with_body(list_xml(&["registry/repositories/library/webapp/"], &[]))
        .create_async()
        .await;

    server
        .mock(
            "GET",
            "/bkt/registry/repositories/library/webapp/_index_images",
        )
        .with_body(r#"[{"id": "aaa"}, {"id": "bbb"}]"#)
        .create_async()
        .await;

    server
        .mock("GET", "/bkt/")
        .match_query(Matcher::AllOf(vec![Matcher::UrlEncoded(
            "prefix".into(),
            "registry/repositories/library/webapp/tag_".into(),
        )]))
        .with_body(list_xml(
            &[],
            &["registry/repositories/library/webapp/tag_latest"],
        ))
        .create_async()
        .await;

    server
        .mock("GET", "/bkt/registry/repositories/library/webapp/tag_latest")
        .with_body(r#""aaa""#)
        .create_async()
        .await;
}

fn rgc_for(server: &mockito::Server, state_file: &std::path::Path) -> Rgc {
    let yaml = format!(
        r#"
registry:
  bucket: bkt
  path: registry
  access_key: ak
  secret_key: sk
  secure: false
  endpoint: "{}"
network:
  retries: 0
sweep:
  state_file: "{}"
"#,
        server.url(),
        state_file.display()
    );
    Rgc::new(Config::from_yaml_str(&yaml).unwrap()).unwrap()
}

#[tokio::test]
async fn test_scan_and_sweep_lifecycle() {
    let mut server = mockito::Server::new_async().await;
    mount_s1(&mut server).await;

    let dir = tempfile::tempdir().unwrap();
    let state_file = dir.path().join("delete.json");
    let rgc = rgc_for(&server, &state_file);

    let (graph, counters) = rgc.scan().await.unwrap();

    assert_eq!(graph.len(), 3);
    assert_eq!(graph.node("aaa").unwrap().refs, 1);
    assert_eq!(graph.node("bbb").unwrap().refs, 1);
    assert_eq!(graph.node("ccc").unwrap().refs, 0);
    assert_eq!(graph.node("aaa").unwrap().tags, vec!["webapp:latest"]);
    assert_eq!(counters.images, 3);
    assert_eq!(counters.tags, 1);

    // First sweep records ccc but deletes nothing.
    let engine = rgc.sweep_engine(Some("1d")).unwrap();
    let t0 = Utc::now();
    let first = engine.plan(&graph, t0).unwrap();
    assert!(first.candidates.is_empty());
    engine.commit(&first).unwrap();

    // A day later, with the registry unchanged, ccc expires.
    let second = engine.plan(&graph, t0 + Duration::hours(25)).unwrap();
    assert_eq!(second.candidates, vec!["ccc"]);
}

#[tokio::test]
async fn test_scan_then_history() {
    let mut server = mockito::Server::new_async().await;
    mount_s1(&mut server).await;

    for (id, body) in [
        (
            "aaa",
            r#"{"created": "2014-03-20T17:19:49Z", "Size": 512,
                "container_config": {"Cmd": ["/bin/sh", "-c", "echo hi"]}}"#,
        ),
        ("bbb", r#"{"created": "2014-03-19T10:00:00Z"}"#),
    ] {
        server
            .mock("GET", format!("/bkt/registry/images/{}/json", id).as_str())
            .with_body(body)
            .create_async()
            .await;
    }

    let dir = tempfile::tempdir().unwrap();
    let rgc = rgc_for(&server, &dir.path().join("delete.json"));

    let (graph, _) = rgc.scan().await.unwrap();
    let entries = rgc.history(&graph, "aaa").await.unwrap();

    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].id, "aaa");
    assert_eq!(entries[0].command.as_deref(), Some("/bin/sh -c echo hi"));
    assert_eq!(entries[0].size, 512);
    assert_eq!(entries[0].tags, vec!["webapp:latest"]);
    assert_eq!(entries[1].id, "bbb");
    assert_eq!(entries[1].size, 0);
}
