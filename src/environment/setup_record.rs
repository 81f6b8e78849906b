use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::Path;

/// Contents of the completion marker. Informational only, presence of the
/// file is what counts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetupRecord {
    pub version: String,
    pub image_url: String,
    pub image_sha256: String,
    pub completed_at: String,
}

impl SetupRecord {
    pub fn new(image_url: &str, image_sha256: &str) -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            image_url: image_url.to_string(),
            image_sha256: image_sha256.to_string(),
            completed_at: chrono::Local::now().to_rfc3339(),
        }
    }

    /// Write to a temporary sibling then rename over `path`
    pub fn save_atomic(&self, path: &Path) -> Result<()> {
        let record_json = serde_json::to_string_pretty(self)
            .context("Failed to serialize setup record")?;
        let tmp_path = path.with_file_name(format!(
            ".setup_complete-{}.tmp",
            uuid::Uuid::new_v4().simple()
        ));

        let mut file = std::fs::File::create(&tmp_path).context(format!(
            "Failed to create {}",
            tmp_path.display()
        ))?;
        file.write_all(record_json.as_bytes())
            .and_then(|_| file.sync_all())
            .context(format!("Failed to write {}", tmp_path.display()))?;
        drop(file);

        std::fs::rename(&tmp_path, path).context(format!(
            "Failed to move setup record into place at {}",
            path.display()
        ))?;
        Ok(())
    }

    /// Older markers may be empty, those load as `None`
    pub fn load_from_file(path: &Path) -> Result<Option<Self>> {
        let record_json = std::fs::read_to_string(path)
            .context(format!("Failed to read {}", path.display()))?;
        if record_json.trim().is_empty() {
            return Ok(None);
        }
        let record = serde_json::from_str(&record_json)
            .context(format!("Failed to parse {}", path.display()))?;
        Ok(Some(record))
    }
}
