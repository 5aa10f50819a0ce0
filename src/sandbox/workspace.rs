//! Per-submission workspace
//!
//! Every submission gets a directory of its own under the temp root. The directory and
//! everything created inside it is removed when the workspace is dropped, whatever path the
//! submission took to get there.

use std::path::Path;

use anyhow::Context;
use chrono::Utc;
use tempfile::TempDir;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::JudgeResult;

pub struct Workspace {
    dir: TempDir,
    id: String,
    timestamp_ms: i64,
}

impl Workspace {
    /// Create a uniquely named workspace under `root`
    pub fn create(root: &Path) -> JudgeResult<Self> {
        std::fs::create_dir_all(root)
            .with_context(|| format!("Failed to create temp root {:?}", root))?;

        let id = Uuid::new_v4().simple().to_string();
        let timestamp_ms = Utc::now().timestamp_millis();

        let dir = tempfile::Builder::new()
            .prefix(&format!("judge_{}_{}_", timestamp_ms, id))
            .tempdir_in(root)
            .with_context(|| format!("Failed to create workspace under {:?}", root))?;

        debug!("Created workspace {:?}", dir.path());

        Ok(Self {
            dir,
            id,
            timestamp_ms,
        })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Machine-generated file stem for sources and executables
    pub fn stem(&self) -> String {
        format!("prog_{}_{}", self.timestamp_ms, &self.id[..12])
    }

    /// Remove the workspace now, logging instead of failing if removal goes wrong
    pub fn close(self) {
        let path = self.dir.path().to_path_buf();
        match self.dir.close() {
            Ok(()) => debug!("Removed workspace {:?}", path),
            Err(e) => warn!("Failed to remove workspace {:?}: {}", path, e),
        }
    }
}
