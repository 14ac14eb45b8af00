use std::path::{Path, PathBuf};

use async_trait::async_trait;

use super::domain::Subscriber;

#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    #[error("unable to read subscriber snapshot {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid subscriber snapshot: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("subscriber directory unavailable: {0}")]
    Unavailable(String),
}

/// Source of active subscribers, read once at the start of a run.
#[async_trait]
pub trait SubscriberDirectory: Send + Sync {
    async fn active_subscribers(&self) -> Result<Vec<Subscriber>, DirectoryError>;
}

/// JSON array of subscribers exported from the account store.
#[derive(Debug, Clone)]
pub struct JsonSubscriberDirectory {
    path: PathBuf,
}

impl JsonSubscriberDirectory {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn parse(raw: &str) -> Result<Vec<Subscriber>, DirectoryError> {
        Ok(serde_json::from_str(raw)?)
    }
}

#[async_trait]
impl SubscriberDirectory for JsonSubscriberDirectory {
    async fn active_subscribers(&self) -> Result<Vec<Subscriber>, DirectoryError> {
        let raw = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|source| DirectoryError::Io {
                path: self.path.clone(),
                source,
            })?;
        Self::parse(&raw)
    }
}
