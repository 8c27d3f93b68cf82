//! Temp-file guard for unit tests. The file is removed on drop, so a failing
//! assertion does not leave databases behind in the temp dir.

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

pub(crate) struct TempPath {
    path: PathBuf,
}

impl TempPath {
    pub(crate) fn new(tag: &str, ext: &str) -> Self {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system time before UNIX_EPOCH")
            .as_nanos();
        let path = std::env::temp_dir().join(format!(
            "mailvault-{tag}-{}-{}.{ext}",
            std::process::id(),
            nanos
        ));
        Self { path }
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TempPath {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}
