//! Single-use handoff file between stage processes.
//!
//! One stage deposits the session context; the next stage collects it exactly
//! once. Collection first claims the file by renaming it, so two readers can
//! never both get the same context. The claimed file is deleted whether or not
//! it parses.

use std::ffi::OsString;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use toolgate_core::SessionContext;
use tracing::{debug, info, warn};

use crate::error::{StorageError, StorageResult};

/// File mailbox holding at most one [`SessionContext`].
#[derive(Debug, Clone)]
pub struct HandoffMailbox {
    path: PathBuf,
}

impl HandoffMailbox {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether a context is waiting.
    pub fn is_pending(&self) -> bool {
        self.path.exists()
    }

    /// Write the context, replacing any previous one.
    ///
    /// The file is written beside the mailbox and renamed into place, so a
    /// reader never sees a partial write.
    pub fn deposit(&self, context: &SessionContext) -> StorageResult<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let staging = self.sibling(".tmp");
        fs::write(&staging, serde_json::to_vec_pretty(context)?)?;
        fs::rename(&staging, &self.path)?;
        debug!(path = %self.path.display(), session = %context.session_id(), "Handoff deposited");
        Ok(())
    }

    /// Take the waiting context and delete the file.
    ///
    /// # Errors
    ///
    /// - `StorageError::HandoffMissing` if nothing is waiting
    /// - `StorageError::HandoffCorrupt` if the file does not hold a context
    pub fn collect(&self) -> StorageResult<SessionContext> {
        let claimed = self.sibling(&format!(".claimed-{}", std::process::id()));
        match fs::rename(&self.path, &claimed) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(StorageError::HandoffMissing {
                    path: self.path.clone(),
                });
            }
            Err(e) => return Err(e.into()),
        }

        let text = fs::read_to_string(&claimed);
        if let Err(e) = fs::remove_file(&claimed) {
            warn!(path = %claimed.display(), "Failed to delete claimed handoff file: {}", e);
        }

        let context: SessionContext = serde_json::from_str(&text?)
            .map_err(|e| StorageError::handoff_corrupt(&self.path, e.to_string()))?;
        debug!(path = %self.path.display(), session = %context.session_id(), "Handoff collected");
        Ok(context)
    }

    /// Take the waiting context, or fall back to [`SessionContext::unknown`].
    pub fn collect_or_default(&self) -> SessionContext {
        match self.collect() {
            Ok(context) => context,
            Err(StorageError::HandoffMissing { path }) => {
                info!(path = %path.display(), "No handoff waiting, using unknown session");
                SessionContext::unknown()
            }
            Err(e) => {
                warn!("Handoff unreadable, using unknown session: {}", e);
                SessionContext::unknown()
            }
        }
    }

    fn sibling(&self, suffix: &str) -> PathBuf {
        let mut name = OsString::from(self.path.as_os_str());
        name.push(suffix);
        PathBuf::from(name)
    }
}
