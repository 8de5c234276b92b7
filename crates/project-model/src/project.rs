//! On-disk project document.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::timeline::{CompositionMeta, ProjectTimeline};

/// Errors loading or saving a project file.
#[derive(Debug, thiserror::Error)]
pub enum ProjectFileError {
    #[error("Project file not found: {0}")]
    NotFound(PathBuf),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Malformed project file: {0}")]
    Json(#[from] serde_json::Error),
}

/// The complete serialized state of an editing project: composition
/// settings plus the timeline (segments, recordings, effects).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub composition: CompositionMeta,

    #[serde(default)]
    pub timeline: ProjectTimeline,
}

impl Project {
    pub fn load(path: &Path) -> Result<Self, ProjectFileError> {
        if !path.exists() {
            return Err(ProjectFileError::NotFound(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn save(&self, path: &Path) -> Result<(), ProjectFileError> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
