//! Working-directory preparation and cleanup.

use std::fs;
use std::io;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::LifecycleError;
use crate::key::TargetPath;

const WORKSPACE_TARGET: &str = "nosqlkit_lifecycle::workspace";

/// Empties `target`, creating it (and its parents) when missing.
///
/// # Errors
///
/// Returns [`LifecycleError::Workspace`] when the directory cannot be removed
/// or recreated.
pub fn reset_directory(target: &TargetPath) -> Result<(), LifecycleError> {
    remove_tree(target).map_err(|source| workspace_error(target, source))?;
    fs::create_dir_all(target.as_std_path()).map_err(|source| workspace_error(target, source))?;
    debug!(target: WORKSPACE_TARGET, path = %target, "working directory reset");
    Ok(())
}

/// Removes `target` and everything below it, logging failures instead of
/// returning them.
pub fn cleanup_directory(target: &TargetPath) {
    match remove_tree(target) {
        Ok(()) => debug!(target: WORKSPACE_TARGET, path = %target, "working directory removed"),
        Err(error) => warn!(
            target: WORKSPACE_TARGET,
            path = %target,
            %error,
            "failed to remove working directory"
        ),
    }
}

fn remove_tree(target: &TargetPath) -> io::Result<()> {
    match fs::remove_dir_all(target.as_std_path()) {
        Err(error) if error.kind() != io::ErrorKind::NotFound => Err(error),
        Ok(()) | Err(_) => Ok(()),
    }
}

fn workspace_error(target: &TargetPath, source: io::Error) -> LifecycleError {
    LifecycleError::Workspace {
        path: target.as_path().to_path_buf(),
        source: Arc::new(source),
    }
}
