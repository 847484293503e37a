use std::path::Path as FsPath;
use std::sync::Arc;

use async_trait::async_trait;
use object_store::aws::AmazonS3Builder;
use object_store::local::LocalFileSystem;
use object_store::memory::InMemory;
use object_store::path::Path;
use object_store::{Attribute, AttributeValue, Attributes, ObjectStore, PutOptions, PutPayload};
use tracing::debug;
use url::Url;

use shipyard_application::ArtifactStore;
use shipyard_core::{AppError, AppResult};

/// Artifact store backed by any `object_store` backend.
#[derive(Debug, Clone)]
pub struct ObjectStoreArtifactStore {
    store: Arc<dyn ObjectStore>,
    prefix: Option<Path>,
    content_types: bool,
}

impl ObjectStoreArtifactStore {
    /// Wraps an existing object store.
    #[must_use]
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self {
            store,
            prefix: None,
            content_types: true,
        }
    }

    /// Builds a store from `s3://bucket[/prefix]` or a local directory path.
    ///
    /// S3 credentials and region come from the standard `AWS_*` variables.
    pub async fn from_location(location: &str) -> AppResult<Self> {
        let location = location.trim();
        if location.is_empty() {
            return Err(AppError::Validation(
                "artifact store location must not be empty".to_owned(),
            ));
        }

        if location.starts_with("s3://") {
            return Self::s3(location);
        }

        let directory = FsPath::new(location);
        tokio::fs::create_dir_all(directory).await.map_err(|error| {
            AppError::Internal(format!(
                "failed to create artifact directory '{location}': {error}"
            ))
        })?;
        let store = LocalFileSystem::new_with_prefix(directory).map_err(|error| {
            AppError::Validation(format!("invalid artifact directory '{location}': {error}"))
        })?;

        // Local files carry no object attributes.
        Ok(Self {
            content_types: false,
            ..Self::new(Arc::new(store))
        })
    }

    /// Builds a process-local store.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemory::new()))
    }

    /// Stores every artifact under `prefix`.
    #[must_use]
    pub fn with_prefix(mut self, prefix: Path) -> Self {
        self.prefix = Some(prefix);
        self
    }

    /// Returns the stored bytes of one artifact.
    pub async fn get_artifact(&self, key: &str) -> AppResult<Vec<u8>> {
        let path = self.qualify(key)?;
        let result = self.store.get(&path).await.map_err(|error| match error {
            object_store::Error::NotFound { .. } => {
                AppError::NotFound(format!("artifact '{key}' does not exist"))
            }
            other => AppError::Unavailable(format!("failed to read artifact '{key}': {other}")),
        })?;
        let bytes = result.bytes().await.map_err(|error| {
            AppError::Unavailable(format!("failed to read artifact '{key}': {error}"))
        })?;

        Ok(bytes.to_vec())
    }

    fn s3(location: &str) -> AppResult<Self> {
        let url = Url::parse(location).map_err(|error| {
            AppError::Validation(format!("invalid artifact store url '{location}': {error}"))
        })?;
        let bucket = url.host_str().filter(|bucket| !bucket.is_empty()).ok_or_else(|| {
            AppError::Validation(format!("artifact store url '{location}' has no bucket"))
        })?;

        let store = AmazonS3Builder::from_env()
            .with_bucket_name(bucket)
            .build()
            .map_err(|error| {
                AppError::Validation(format!("invalid s3 artifact store '{location}': {error}"))
            })?;

        let prefix = url.path().trim_matches('/');
        let artifact_store = Self::new(Arc::new(store));
        if prefix.is_empty() {
            return Ok(artifact_store);
        }

        let prefix = Path::parse(prefix).map_err(|error| {
            AppError::Validation(format!("invalid artifact prefix '{prefix}': {error}"))
        })?;
        Ok(artifact_store.with_prefix(prefix))
    }

    fn qualify(&self, key: &str) -> AppResult<Path> {
        let path = Path::parse(key).map_err(|error| {
            AppError::Validation(format!("invalid artifact key '{key}': {error}"))
        })?;
        if path.parts().next().is_none() {
            return Err(AppError::Validation(
                "artifact key must not be empty".to_owned(),
            ));
        }

        Ok(match &self.prefix {
            Some(prefix) => prefix.parts().chain(path.parts()).collect(),
            None => path,
        })
    }
}

#[async_trait]
impl ArtifactStore for ObjectStoreArtifactStore {
    async fn put_artifact(&self, key: &str, body: Vec<u8>) -> AppResult<()> {
        let path = self.qualify(key)?;
        let size = body.len();
        let content_type = content_type_for(key);
        let options = if self.content_types {
            PutOptions {
                attributes: Attributes::from_iter([(
                    Attribute::ContentType,
                    AttributeValue::from(content_type.clone()),
                )]),
                ..Default::default()
            }
        } else {
            PutOptions::default()
        };

        self.store
            .put_opts(&path, PutPayload::from(body), options)
            .await
            .map_err(|error| {
                AppError::Unavailable(format!("failed to upload artifact '{path}': {error}"))
            })?;

        debug!(path = %path, size, content_type = %content_type, "uploaded artifact");
        Ok(())
    }
}

/// Guesses the `Content-Type` of an artifact from its file extension.
fn content_type_for(key: &str) -> String {
    mime_guess::from_path(key)
        .first_or_octet_stream()
        .essence_str()
        .to_owned()
}
