use std::fs;
use std::io;
use std::path::Path;

use tracing::{debug, info};

/// Write `contents` to `path` unless the file already holds exactly that.
///
/// Returns whether the file was written. Missing parent directories are
/// created.
pub fn write_if_changed(path: &Path, contents: &str) -> io::Result<bool> {
    match fs::read(path) {
        Ok(existing) if existing == contents.as_bytes() => {
            debug!(path = %path.display(), "output unchanged");
            return Ok(false);
        }
        Ok(_) => {}
        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
        Err(err) => return Err(err),
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, contents)?;
    info!(path = %path.display(), bytes = contents.len(), "wrote generated routes");
    Ok(true)
}
