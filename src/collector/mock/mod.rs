//! In-memory filesystem for testing `/proc` readers without Linux.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};

use super::traits::FileSystem;

/// Map of path to file content.
#[derive(Debug, Clone, Default)]
pub struct MockFs {
    files: HashMap<PathBuf, String>,
}

impl MockFs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_file(&mut self, path: impl AsRef<Path>, content: impl Into<String>) {
        self.files
            .insert(path.as_ref().to_path_buf(), content.into());
    }

    /// Adds `/proc/[pid]/stat` and, when given, `/proc/[pid]/io`.
    pub fn add_process(&mut self, pid: i32, stat: &str, io: Option<&str>) {
        self.add_file(format!("/proc/{}/stat", pid), stat);
        if let Some(io) = io {
            self.add_file(format!("/proc/{}/io", pid), io);
        }
    }

    /// A host with 16 GiB of memory and one postgres backend (pid 4242).
    pub fn typical_host() -> Self {
        let mut fs = Self::new();
        fs.add_file(
            "/proc/meminfo",
            "MemTotal:       16777216 kB\n\
             MemFree:         8388608 kB\n\
             Buffers:          524288 kB\n\
             Cached:          2097152 kB\n\
             SwapCached:            0 kB\n\
             SwapTotal:       4194304 kB\n\
             SwapFree:        4194304 kB\n",
        );
        fs.add_file("/proc/loadavg", "0.52 0.58 0.59 2/1024 12345\n");
        fs.add_process(4242, &stat_line(4242, 'S', 150, 50, 900_000, 2048), Some(&io_text(4096, 8192)));
        fs
    }
}

/// Builds a `/proc/[pid]/stat` line with the fields the collector reads.
pub fn stat_line(pid: i32, state: char, utime: u64, stime: u64, starttime: u64, rss_pages: i64) -> String {
    let mut fields: Vec<String> = vec![
        state.to_string(),
        "1".into(), // ppid
        pid.to_string(),
        pid.to_string(),
        "0".into(),
        "-1".into(),
        "4194560".into(),
        "100".into(),
        "0".into(),
        "0".into(),
        "0".into(),
        utime.to_string(),
        stime.to_string(),
        "0".into(),
        "0".into(),
        "20".into(),
        "0".into(),
        "1".into(),
        "0".into(),
        starttime.to_string(),
        "230000000".into(),
        rss_pages.to_string(),
    ];
    fields.resize(44, "0".to_string());
    format!("{} (postgres) {}", pid, fields.join(" "))
}

pub fn io_text(read_bytes: u64, write_bytes: u64) -> String {
    format!(
        "rchar: 0\nwchar: 0\nsyscr: 0\nsyscw: 0\nread_bytes: {}\nwrite_bytes: {}\ncancelled_write_bytes: 0\n",
        read_bytes, write_bytes
    )
}

impl FileSystem for MockFs {
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        self.files.get(path).cloned().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("mock file not found: {}", path.display()),
            )
        })
    }

    fn exists(&self, path: &Path) -> bool {
        self.files.contains_key(path) || self.files.keys().any(|p| p.starts_with(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_not_found() {
        let fs = MockFs::new();
        let err = fs.read_to_string(Path::new("/proc/1/io")).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn directories_exist_through_their_files() {
        let fs = MockFs::typical_host();
        assert!(fs.exists(Path::new("/proc/4242")));
        assert!(fs.exists(Path::new("/proc/meminfo")));
        assert!(!fs.exists(Path::new("/proc/1")));
    }
}
