//! Registry driver: v1 registry semantics over object storage.
//!
//! A v1 registry lays its data out under a root prefix:
//!
//! ```text
//! <root>/images/<id>/json                          image manifest
//! <root>/images/<id>/ancestry                      ["<id>", "<parent>", ...]
//! <root>/repositories/library/<repo>/_index_images [{"id": ...}, ...]
//! <root>/repositories/library/<repo>/tag_<name>    "<head layer id>"
//! ```
//!
//! The [`Driver`] trait is the seam between registry semantics and the
//! scanner; [`S3Driver`] is the object-store implementation.

use crate::error::{Result, RgcError};
use crate::store::ObjectStore;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};


/// Image manifest fields the collector consumes.
#[derive(Debug, Clone, Deserialize)]
pub struct ImageInfo {
    /// ISO-8601 creation timestamp.
    pub created: String,
    #[serde(rename = "Size", default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub container_config: Option<ContainerConfig>,
}

/// The container configuration block of an image manifest.
#[derive(Debug, Clone, Deserialize)]
pub struct ContainerConfig {
    #[serde(rename = "Cmd", default)]
    pub cmd: Option<Vec<String>>,
}

/// Registry operations the scanner and history reporter are built on.
///
/// Enumeration emits each previously-unseen name through the callback so
/// paging stays decoupled from the consumer's work queue.
#[allow(async_fn_in_trait)]
pub trait Driver {
    async fn enumerate_images(&self, emit: &mut dyn FnMut(String)) -> Result<()>;
    async fn enumerate_repositories(&self, emit: &mut dyn FnMut(String)) -> Result<()>;
    async fn image_ancestry(&self, id: &str) -> Result<Vec<String>>;
    async fn image_info(&self, id: &str) -> Result<ImageInfo>;
    async fn repository_index(&self, repo: &str) -> Result<Vec<String>>;
    async fn repository_tags(&self, repo: &str) -> Result<HashMap<String, String>>;
}

#[derive(Deserialize)]
struct IndexEntry {
    id: String,
}

/// Registry driver backed by an S3-compatible object store.
pub struct S3Driver {
    store: ObjectStore,
    /// Normalized root prefix, empty or ending in `/`.
    root: String,
}

impl S3Driver {
    pub fn new(store: ObjectStore, root: &str) -> Self {
        let trimmed = root.trim_matches('/');
        let root = if trimmed.is_empty() {
            String::new()
        } else {
            format!("{}/", trimmed)
        };
        Self { store, root }
    }

    fn images_prefix(&self) -> String {
        format!("{}images/", self.root)
    }

    fn repositories_prefix(&self) -> String {
        format!("{}repositories/library/", self.root)
    }

    /// Pages through a delimited LIST, emitting each previously-unseen
    /// common prefix with the leading prefix and trailing `/` stripped.
    async fn enumerate_prefixes(
        &self,
        prefix: &str,
        emit: &mut dyn FnMut(String),
    ) -> Result<()> {
        let mut marker: Option<String> = None;
        let mut seen = HashSet::new();

        loop {
            let page = self.store.list(prefix, Some("/"), marker.as_deref()).await?;

            for common in &page.common_prefixes {
                let name = common
                    .strip_prefix(prefix)
                    .unwrap_or(common)
                    .trim_end_matches('/')
                    .to_string();
                if !name.is_empty() && seen.insert(name.clone()) {
                    emit(name);
                }
            }

            if !page.is_truncated {
                return Ok(());
            }
            marker = page
                .next_marker
                .or_else(|| page.common_prefixes.last().cloned())
                .or_else(|| page.contents.last().cloned());
            if marker.is_none() {
                // Truncated page with nothing to resume from; stop rather
                // than loop forever.
                tracing::warn!(prefix, "truncated LIST without a resume marker");
                return Ok(());
            }
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, key: &str, what: &str) -> Result<T> {
        let body = self.store.get(key).await?;
        serde_json::from_slice(&body)
            .map_err(|e| RgcError::parse_with_source(format!("Malformed {} at {}", what, key), e))
    }
}

impl Driver for S3Driver {
    async fn enumerate_images(&self, emit: &mut dyn FnMut(String)) -> Result<()> {
        self.enumerate_prefixes(&self.images_prefix(), emit).await
    }

    async fn enumerate_repositories(&self, emit: &mut dyn FnMut(String)) -> Result<()> {
        self.enumerate_prefixes(&self.repositories_prefix(), emit)
            .await
    }

    async fn image_ancestry(&self, id: &str) -> Result<Vec<String>> {
        let key = format!("{}{}/ancestry", self.images_prefix(), id);
        let ancestry: Vec<String> = self.get_json(&key, "ancestry").await?;

        if ancestry.first().map(String::as_str) != Some(id) {
            return Err(RgcError::parse(format!(
                "Ancestry for {} does not start with the layer itself",
                id
            )));
        }
        Ok(ancestry)
    }

    async fn image_info(&self, id: &str) -> Result<ImageInfo> {
        let key = format!("{}{}/json", self.images_prefix(), id);
        self.get_json(&key, "image manifest").await
    }

    async fn repository_index(&self, repo: &str) -> Result<Vec<String>> {
        let key = format!("{}{}/_index_images", self.repositories_prefix(), repo);
        let entries: Vec<IndexEntry> = self.get_json(&key, "repository index").await?;
        Ok(entries.into_iter().map(|e| e.id).collect())
    }

    async fn repository_tags(&self, repo: &str) -> Result<HashMap<String, String>> {
        let tag_prefix = format!("{}{}/tag_", self.repositories_prefix(), repo);
        let mut tag_keys = Vec::new();
        let mut marker: Option<String> = None;

        loop {
            let page = self
                .store
                .list(&tag_prefix, None, marker.as_deref())
                .await?;
            tag_keys.extend(page.contents);

            if !page.is_truncated {
                break;
            }
            marker = page.next_marker.or_else(|| tag_keys.last().cloned());
            if marker.is_none() {
                break;
            }
        }

        let mut tags = HashMap::new();
        for key in tag_keys {
            let Some(name) = key.strip_prefix(&tag_prefix) else {
                continue;
            };
            let body = self.store.get(&key).await?;
            let head = String::from_utf8_lossy(&body)
                .trim()
                .trim_matches('"')
                .to_string();
            if head.is_empty() {
                return Err(RgcError::parse(format!("Empty tag body at {}", key)));
            }
            tags.insert(name.to_string(), head);
        }

        Ok(tags)
    }
}
