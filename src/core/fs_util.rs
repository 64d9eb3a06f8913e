//! Utility functions for filesystem operations with CIFS compatibility.
//!
//! Provides helpers to perform file copy operations that avoid POSIX metadata
//! copy which may not be supported on CIFS (SMB) filesystems.

use std::fs::File;
use std::io::{self, copy};
use std::path::{Path, PathBuf};

use crate::domain::model::TaskKind;

/// Build a task's scratch directory path: `<tasks_dir>/<YYYYMMDD>/<HHMM>-<short_task_id>-<kind>`
/// (§6 filesystem layout), grounded on
/// `original_source/.../domain/workflows/base.py::get_task_dir_path`.
pub fn task_dir_path(
    tasks_dir: &Path,
    created_at: chrono::DateTime<chrono::Utc>,
    task_id: &str,
    kind: TaskKind,
) -> PathBuf {
    let day = created_at.format("%Y%m%d");
    let slot = created_at.format("%H%M");
    let short_id = &task_id[..task_id.len().min(8)];
    let kind_str = match kind {
        TaskKind::Video => "video",
        TaskKind::Document => "document",
        TaskKind::Reprocess => "reprocess",
    };
    tasks_dir
        .join(day.to_string())
        .join(format!("{slot}-{short_id}-{kind_str}"))
}

/// Copies file contents from `source` to `destination` without copying metadata.
///
/// This function opens the source file and creates/truncates the destination file,
/// then copies the data stream. It avoids POSIX permission copy to maintain
/// compatibility with CIFS filesystems where metadata operations may fail.
///
/// # Errors
///
/// Returns an `io::Error` if reading from source or writing to destination fails.
pub fn copy_file_cifs_safe(source: &Path, destination: &Path) -> io::Result<u64> {
    let mut src = File::open(source)?;
    let mut dst = File::create(destination)?;
    copy(&mut src, &mut dst)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_copy_file_cifs_safe() -> io::Result<()> {
        let temp = TempDir::new()?;
        let src_path = temp.path().join("src.txt");
        let dst_path = temp.path().join("dst.txt");
        let content = b"hello cifs safe copy";
        fs::write(&src_path, content)?;
        let bytes = copy_file_cifs_safe(&src_path, &dst_path)?;
        assert_eq!(bytes as usize, content.len());
        let copied = fs::read(&dst_path)?;
        assert_eq!(copied, content);
        Ok(())
    }

    #[test]
    fn task_dir_path_matches_the_layout_convention() {
        use chrono::TimeZone;
        let created_at = chrono::Utc.with_ymd_and_hms(2026, 7, 28, 14, 5, 0).unwrap();
        let path = task_dir_path(Path::new("tasks"), created_at, "abcd1234-ef56", TaskKind::Video);
        assert_eq!(path, Path::new("tasks/20260728/1405-abcd1234-video"));
    }
}
