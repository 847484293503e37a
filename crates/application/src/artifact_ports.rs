use async_trait::async_trait;
use shipyard_core::AppResult;

/// Object storage for build outputs.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Stores one artifact under `key`, replacing any previous object.
    async fn put_artifact(&self, key: &str, body: Vec<u8>) -> AppResult<()>;
}
