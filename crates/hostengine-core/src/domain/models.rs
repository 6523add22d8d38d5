//! Installed model discovery.

use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

/// File that marks a directory as an installed model.
pub const MODEL_DESCRIPTOR: &str = "config.json";

/// A model folder found in the model directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstalledModel {
    /// Folder name, usable as a model id.
    pub id: String,
    pub path: PathBuf,
}

/// List model folders under `dir` that contain a descriptor file.
///
/// A missing directory yields an empty list. Results are sorted by id.
pub async fn scan_model_directory(dir: &Path) -> io::Result<Vec<InstalledModel>> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!(dir = %dir.display(), "Model directory does not exist");
            return Ok(Vec::new());
        }
        Err(e) => return Err(e),
    };

    let mut models = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if !entry.file_type().await?.is_dir() {
            continue;
        }
        if !tokio::fs::try_exists(path.join(MODEL_DESCRIPTOR))
            .await
            .unwrap_or(false)
        {
            continue;
        }
        models.push(InstalledModel {
            id: entry.file_name().to_string_lossy().into_owned(),
            path,
        });
    }

    models.sort_by(|a, b| a.id.cmp(&b.id));
    Ok(models)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[tokio::test]
    async fn missing_directory_is_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let models = scan_model_directory(&tmp.path().join("absent"))
            .await
            .unwrap();
        assert!(models.is_empty());
    }

    #[tokio::test]
    async fn only_folders_with_descriptor_are_listed() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path();

        fs::create_dir(root.join("qwen-7b")).unwrap();
        fs::write(root.join("qwen-7b").join(MODEL_DESCRIPTOR), "{}").unwrap();
        fs::create_dir(root.join("llama-3b")).unwrap();
        fs::write(root.join("llama-3b").join(MODEL_DESCRIPTOR), "{}").unwrap();
        fs::create_dir(root.join("partial-download")).unwrap();
        fs::write(root.join("stray.json"), "{}").unwrap();

        let models = scan_model_directory(root).await.unwrap();
        let ids: Vec<&str> = models.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, ["llama-3b", "qwen-7b"]);
        assert_eq!(models[1].path, root.join("qwen-7b"));
    }
}
