use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, info};

use linkweave_core::{CoreError, IriResolver, StatePersistence, UploadState};

/// File-backed state persistence, one JSON document per batch.
///
/// Saves write a temporary file next to the target and rename it over the
/// previous state, so a crash never leaves a half-written document behind.
#[derive(Debug, Clone)]
pub struct FileStatePersistence {
    path: PathBuf,
}

impl FileStatePersistence {
    /// Store the state of `batch_key` inside `dir`
    pub fn new(dir: impl AsRef<Path>, batch_key: &str) -> Self {
        let file_name = format!("{}.upload-state.json", sanitize(batch_key));
        Self {
            path: dir.as_ref().join(file_name),
        }
    }

    /// Location of the state document
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn tmp_path(&self) -> PathBuf {
        self.path.with_extension("json.tmp")
    }
}

#[async_trait]
impl StatePersistence for FileStatePersistence {
    async fn save(&self, state: &UploadState) -> Result<(), CoreError> {
        let json = state.to_json()?;

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| store_error("create directory", parent, e))?;
        }

        let tmp = self.tmp_path();
        tokio::fs::write(&tmp, json)
            .await
            .map_err(|e| store_error("write", &tmp, e))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| store_error("replace", &self.path, e))?;

        debug!(path = %self.path.display(), "Upload state saved");
        Ok(())
    }

    async fn load(&self) -> Result<Option<UploadState>, CoreError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(json) => UploadState::from_json(&json).map(Some),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(store_error("read", &self.path, e)),
        }
    }

    async fn clear(&self) -> Result<(), CoreError> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => {
                debug!(path = %self.path.display(), "Upload state removed");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(store_error("remove", &self.path, e)),
        }
    }
}

/// Write the id to IRI mapping of a batch as pretty JSON.
///
/// The file is named `<timestamp>_id2iri_mapping_<batch>.json` and placed in
/// `dir`. Returns its path.
pub async fn write_id2iri_mapping(dir: impl AsRef<Path>, batch_key: &str, resolver: &IriResolver) -> Result<PathBuf, CoreError> {
    let timestamp = Utc::now().format("%Y-%m-%d_%H%M%S");
    let path = dir
        .as_ref()
        .join(format!("{}_id2iri_mapping_{}.json", timestamp, sanitize(batch_key)));

    let json = serde_json::to_string_pretty(resolver)?;
    tokio::fs::write(&path, json)
        .await
        .map_err(|e| store_error("write", &path, e))?;

    info!(path = %path.display(), entries = resolver.len(), "Wrote id to IRI mapping");
    Ok(path)
}

fn sanitize(batch_key: &str) -> String {
    batch_key
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') { c } else { '_' })
        .collect()
}

fn store_error(action: &str, path: &Path, error: std::io::Error) -> CoreError {
    CoreError::StateStoreError(format!("Failed to {} {}: {}", action, path.display(), error))
}
