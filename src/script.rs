use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::errors::SyncError;

// @module: Script document input

/// Script document produced upstream: a JSON object with a `script` field
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScriptDocument {
    #[serde(default)]
    pub script: Option<String>,
}

impl ScriptDocument {
    /// Read and parse a script document
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, SyncError> {
        let path = path.as_ref();
        let invalid = |reason: String| SyncError::InvalidScript {
            path: path.display().to_string(),
            reason,
        };

        let content = fs::read_to_string(path).map_err(|e| invalid(e.to_string()))?;
        serde_json::from_str(&content).map_err(|e| invalid(e.to_string()))
    }

    /// Narration text, or `MissingScriptText` when absent or blank
    pub fn narration(&self, path: &Path) -> Result<&str, SyncError> {
        match self.script.as_deref() {
            Some(text) if !text.trim().is_empty() => Ok(text),
            _ => Err(SyncError::MissingScriptText {
                path: path.display().to_string(),
            }),
        }
    }

    /// Document name derived from the file stem
    pub fn document_name(path: &Path) -> String {
        path.file_stem()
            .map(|stem| stem.to_string_lossy().to_string())
            .unwrap_or_else(|| "narration".to_string())
    }
}
