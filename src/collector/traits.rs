//! `/proc` access behind a trait, so host sampling runs against an
//! in-memory tree in tests.

use std::io;
use std::path::Path;

/// The two filesystem calls host sampling needs.
pub trait FileSystem {
    /// Whole file as text (`stat`, `io`, `meminfo`, `loadavg`).
    fn read_to_string(&self, path: &Path) -> io::Result<String>;

    /// Whether a file or directory is present, e.g. `/proc/<pid>`.
    fn exists(&self, path: &Path) -> bool;
}

/// The local filesystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct RealFs;

impl RealFs {
    pub fn new() -> Self {
        Self
    }
}

impl FileSystem for RealFs {
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        std::fs::read_to_string(path)
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_a_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("loadavg");
        std::fs::write(&path, "0.10 0.20 0.30 1/100 42\n").unwrap();

        let fs = RealFs::new();
        assert!(fs.exists(dir.path()));
        assert!(fs.exists(&path));
        assert!(fs.read_to_string(&path).unwrap().starts_with("0.10"));
    }

    #[test]
    fn missing_pid_directory() {
        let dir = tempfile::tempdir().unwrap();
        let fs = RealFs::new();
        assert!(!fs.exists(&dir.path().join("999999")));
        assert!(fs.read_to_string(&dir.path().join("999999/stat")).is_err());
    }
}
