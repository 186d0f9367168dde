//! Template metadata and blob storage seams.
//!
//! Both stores are external collaborators; the in-memory backends exist for
//! development and tests, the filesystem blob store for single-node
//! deployments.

use std::path::PathBuf;

use async_trait::async_trait;
use dashmap::DashMap;

use crate::error::{AppError, Result};

use super::types::{Template, TemplateKey};

/// Keyed lookup of template metadata by (tenant, channel).
#[async_trait]
pub trait TemplateStore: Send + Sync {
    async fn get(&self, key: &TemplateKey) -> Result<Option<Template>>;
}

/// Raw template body bytes by (folder, path).
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn get(&self, folder: &str, path: &str) -> Result<Option<Vec<u8>>>;
}

/// In-memory template store, seedable from a JSON file at startup.
#[derive(Default)]
pub struct MemoryTemplateStore {
    templates: DashMap<(String, String), Template>,
}

impl MemoryTemplateStore {
    pub fn new() -> Self {
        Self {
            templates: DashMap::new(),
        }
    }

    /// Load template metadata from a JSON array file.
    pub async fn from_file(path: &str) -> Result<Self> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| AppError::Storage(format!("Cannot read templates file {}: {}", path, e)))?;
        let templates: Vec<Template> = serde_json::from_slice(&bytes)
            .map_err(|e| AppError::Storage(format!("Invalid templates file {}: {}", path, e)))?;

        let store = Self::new();
        for template in templates {
            store.insert(template);
        }
        tracing::info!(count = store.count(), file = %path, "Loaded template metadata");
        Ok(store)
    }

    pub fn insert(&self, template: Template) {
        let key = (
            template.tenant.clone(),
            template.channel.trim().to_string(),
        );
        self.templates.insert(key, template);
    }

    pub fn count(&self) -> usize {
        self.templates.len()
    }
}

#[async_trait]
impl TemplateStore for MemoryTemplateStore {
    async fn get(&self, key: &TemplateKey) -> Result<Option<Template>> {
        Ok(self
            .templates
            .get(&(key.tenant.clone(), key.channel.clone()))
            .map(|t| t.clone()))
    }
}

/// In-memory blob store for tests and development.
#[derive(Default)]
pub struct MemoryBlobStore {
    blobs: DashMap<(String, String), Vec<u8>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self {
            blobs: DashMap::new(),
        }
    }

    pub fn put(&self, folder: &str, path: &str, bytes: impl Into<Vec<u8>>) {
        self.blobs
            .insert((folder.to_string(), path.to_string()), bytes.into());
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn get(&self, folder: &str, path: &str) -> Result<Option<Vec<u8>>> {
        Ok(self
            .blobs
            .get(&(folder.to_string(), path.to_string()))
            .map(|b| b.clone()))
    }
}

/// Filesystem-backed blob store rooted at a local directory.
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn get(&self, folder: &str, path: &str) -> Result<Option<Vec<u8>>> {
        let full = self.root.join(folder).join(path);
        match tokio::fs::read(&full).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::Storage(format!(
                "Cannot read blob {}: {}",
                full.display(),
                e
            ))),
        }
    }
}
