use fs2::FileExt;
use std::fs::File;
use std::path::{Path, PathBuf};

const DISCOVERY_LOCK: &str = "btmgr-discovery.lock";

fn lock_path() -> PathBuf {
    let mut path = dirs::runtime_dir()
        .or_else(dirs::data_local_dir)
        .unwrap_or_else(std::env::temp_dir);
    path.push(DISCOVERY_LOCK);
    path
}

/// Takes the per-user discovery lock.
///
/// Only one `btmgr` process may drive discovery at a time. The lock is held
/// until the returned file is dropped.
pub fn acquire_discovery_lock() -> Result<File, String> {
    lock_at(&lock_path())
}

fn lock_at(path: &Path) -> Result<File, String> {
    let file = File::create(path).map_err(|e| format!("Failed to create lock file: {e}"))?;

    // Exclusive lock; fails if another instance holds it
    file.try_lock_exclusive()
        .map_err(|_| "Another btmgr instance is already scanning or watching".to_string())?;

    Ok(file)
}
