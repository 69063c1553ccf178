use std::{path::PathBuf, sync::Arc};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::LibraryError;
use crate::library::{RelabelOutcome, SharedLibrary};

/// How a correction naming an unknown ship is reported to the caller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrectionMode {
    /// Always report success, as existing clients expect.
    #[default]
    Lenient,
    /// Report unknown ships as not found.
    Strict,
}

/// Applies corrections to the shared library and writes them through to disk.
#[derive(Debug, Clone)]
pub struct CorrectionHandler {
    library: SharedLibrary,
    path: PathBuf,
    writer: Arc<Mutex<()>>,
}

impl CorrectionHandler {
    pub fn new(library: SharedLibrary, path: impl Into<PathBuf>) -> Self {
        Self {
            library,
            path: path.into(),
            writer: Arc::new(Mutex::new(())),
        }
    }

    /// Relabels `wrong` as `correct` and persists the result.
    ///
    /// The change is applied to a copy which is written to disk first; the
    /// shared library is only swapped once the write succeeded, so matchers see
    /// either the old library or the new one and are never held up by the
    /// disk write. Corrections run one at a time. Blocks on file I/O.
    pub fn relabel(&self, wrong: &str, correct: &str) -> Result<RelabelOutcome, LibraryError> {
        let _writer = self.writer.lock();
        let mut updated = self.library.read().clone();
        let outcome = updated.relabel(wrong, correct)?;

        match outcome {
            RelabelOutcome::Relabeled {
                moved_tokens,
                created_target,
            } => {
                updated.persist(&self.path)?;
                *self.library.write() = updated;
                info!(
                    wrong,
                    correct,
                    moved_tokens,
                    created_target,
                    "applied ship correction"
                );
            }
            RelabelOutcome::Unchanged => {
                debug!(wrong, correct, "correction names the same ship; nothing to do");
            }
            RelabelOutcome::NotFound => {
                debug!(wrong, correct, "correction names an unknown ship");
            }
        }

        Ok(outcome)
    }
}
