//! Session context shared between views: the active health center and the
//! patient picked for a similar-patients lookup.
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{PortalError, Result};
use crate::record::RecordId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectedPatient {
    pub id: RecordId,
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionContext {
    #[serde(default)]
    health_center_id: Option<RecordId>,
    #[serde(default)]
    selected_patient: Option<SelectedPatient>,
}

impl SessionContext {
    pub fn new(health_center_id: Option<RecordId>) -> Self {
        Self {
            health_center_id,
            selected_patient: None,
        }
    }

    pub fn health_center_id(&self) -> Option<&RecordId> {
        self.health_center_id.as_ref()
    }

    pub fn set_health_center(&mut self, id: RecordId) {
        self.health_center_id = Some(id);
    }

    pub fn selected_patient(&self) -> Option<&SelectedPatient> {
        self.selected_patient.as_ref()
    }

    pub fn select_patient(&mut self, id: RecordId, name: impl Into<String>) {
        self.selected_patient = Some(SelectedPatient {
            id,
            name: name.into(),
        });
    }

    pub fn clear_selection(&mut self) {
        self.selected_patient = None;
    }
}

/// JSON file backing a [`SessionContext`]. Without a path nothing is persisted.
#[derive(Debug, Clone, Default)]
pub struct SessionStore {
    path: Option<PathBuf>,
}

impl SessionStore {
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
        }
    }

    pub fn in_memory() -> Self {
        Self { path: None }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// A missing file is an empty context.
    pub async fn load(&self) -> Result<SessionContext> {
        let Some(path) = &self.path else {
            return Ok(SessionContext::default());
        };
        let raw = match tokio::fs::read(path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "portal.session.missing");
                return Ok(SessionContext::default());
            }
            Err(e) => {
                return Err(PortalError::session(format!(
                    "reading {}: {e}",
                    path.display()
                )));
            }
        };
        serde_json::from_slice(&raw)
            .map_err(|e| PortalError::session(format!("parsing {}: {e}", path.display())))
    }

    pub async fn save(&self, ctx: &SessionContext) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(dir) = path.parent() {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|e| PortalError::session(format!("creating {}: {e}", dir.display())))?;
        }
        let body = serde_json::to_vec_pretty(ctx)
            .map_err(|e| PortalError::session(format!("encoding session: {e}")))?;
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, body)
            .await
            .map_err(|e| PortalError::session(format!("writing {}: {e}", tmp.display())))?;
        tokio::fs::rename(&tmp, path)
            .await
            .map_err(|e| PortalError::session(format!("replacing {}: {e}", path.display())))?;
        debug!(path = %path.display(), "portal.session.saved");
        Ok(())
    }
}
