use std::fs;
use std::io;
use std::path::Path;

use log::{info, warn};

use crate::error::CollectError;

/// Replace whatever is at `path` with a fresh empty directory.
pub fn prepare_work_dir(path: &Path) -> Result<(), CollectError> {
    let wrap = |source: io::Error| CollectError::WorkDir {
        path: path.to_path_buf(),
        source,
    };

    match fs::symlink_metadata(path) {
        Ok(metadata) if metadata.is_dir() => {
            warn!("Removing stale working directory {}", path.display());
            fs::remove_dir_all(path).map_err(wrap)?;
        }
        Ok(_) => fs::remove_file(path).map_err(wrap)?,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(wrap(e)),
    }

    fs::create_dir_all(path).map_err(wrap)?;
    info!("Working directory: {}", path.display());
    Ok(())
}
