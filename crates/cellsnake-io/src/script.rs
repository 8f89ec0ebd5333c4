//! Session scripts: the operator's actions on one image, recorded as
//! JSON so they can be replayed.
//!
//! ```json
//! [
//!   {"action": "refine", "points": [[12, 10], [30, 11], [28, 33], [11, 30]]},
//!   {"action": "delete_last"},
//!   {"action": "finalize"}
//! ]
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use cellsnake_pipeline::Boundary;

/// One operator trigger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    /// Refine a rough boundary and record it.
    Refine {
        /// The rough boundary, as vertices in image pixels.
        #[serde(rename = "points")]
        boundary: Boundary,
    },
    /// Remove the newest recorded boundary.
    DeleteLast,
    /// Summarize the recorded boundaries and store the record.
    Finalize,
}

/// Errors that can occur when loading a script.
#[derive(Debug, thiserror::Error)]
pub enum ScriptError {
    /// The script file could not be read.
    #[error("failed to read script {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The script is not a valid action list.
    #[error("invalid script: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Parse a JSON action list.
///
/// # Errors
///
/// Returns [`ScriptError::Parse`] when `text` is not an array of actions.
pub fn parse_script(text: &str) -> Result<Vec<Action>, ScriptError> {
    Ok(serde_json::from_str(text)?)
}

/// Read and parse the script at `path`.
///
/// # Errors
///
/// [`ScriptError::Read`] when the file is unreadable,
/// [`ScriptError::Parse`] when its content is invalid.
pub fn load_script(path: &Path) -> Result<Vec<Action>, ScriptError> {
    let text = std::fs::read_to_string(path).map_err(|source| ScriptError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let actions = parse_script(&text)?;
    log::debug!("loaded {} actions from {}", actions.len(), path.display());
    Ok(actions)
}
