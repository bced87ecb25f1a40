use std::{
    fs, io,
    path::{Path, PathBuf},
};
use tracing::{debug, warn};

use crate::months::MonthId;

/// The run's scratch directory. Emptied on creation; removed by
/// [`ScratchDir::remove`] or, failing that, when dropped.
#[derive(Debug)]
pub struct ScratchDir {
    path: PathBuf,
    removed: bool,
}

impl ScratchDir {
    /// Wipe whatever is at `path` and recreate it empty. The stored path is
    /// absolute, so staged-file URIs built from it are too. It is never in
    /// the `\\?\` verbatim form `canonicalize` gives on Windows, which
    /// `PUT` cannot read.
    pub fn prepare(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            debug!(path = %path.display(), "clearing stale scratch directory");
            fs::remove_dir_all(path)?;
        }
        fs::create_dir_all(path)?;
        let path = std::path::absolute(path)?;
        Ok(Self {
            path,
            removed: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Local file for `month`.
    pub fn file_for(&self, month: MonthId) -> PathBuf {
        self.path.join(month.file_name())
    }

    pub fn remove(mut self) -> io::Result<()> {
        self.removed = true;
        match fs::remove_dir_all(&self.path) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        if self.removed {
            return;
        }
        if let Err(e) = fs::remove_dir_all(&self.path) {
            if e.kind() != io::ErrorKind::NotFound {
                warn!(path = %self.path.display(), error = %e, "could not remove scratch directory");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::warehouse::LoadStatement;
    use tempfile::tempdir;

    #[test]
    fn prepare_clears_previous_contents() {
        let tmp = tempdir().unwrap();
        let dir = tmp.path().join("temp_data");
        fs::create_dir_all(dir.join("nested")).unwrap();
        fs::write(dir.join("yellow_tripdata_2023-12.parquet"), b"stale").unwrap();

        let scratch = ScratchDir::prepare(&dir).unwrap();
        assert!(scratch.path().is_absolute());
        assert_eq!(fs::read_dir(scratch.path()).unwrap().count(), 0);
        scratch.remove().unwrap();
        assert!(!dir.exists());
    }

    #[test]
    fn drop_removes_directory() {
        let tmp = tempdir().unwrap();
        let dir = tmp.path().join("temp_data");
        {
            let scratch = ScratchDir::prepare(&dir).unwrap();
            fs::write(scratch.file_for("2024-01".parse().unwrap()), b"x").unwrap();
        }
        assert!(!dir.exists());
    }

    #[test]
    fn file_names_follow_month() {
        let tmp = tempdir().unwrap();
        let scratch = ScratchDir::prepare(tmp.path().join("s")).unwrap();
        let f = scratch.file_for("2025-11".parse().unwrap());
        assert_eq!(
            f.file_name().unwrap().to_string_lossy(),
            "yellow_tripdata_2025-11.parquet"
        );
        assert_eq!(f.parent().unwrap(), scratch.path());
    }

    #[test]
    fn put_statement_uses_plain_absolute_path() {
        let tmp = tempdir().unwrap();
        let scratch = ScratchDir::prepare(tmp.path().join("temp_data")).unwrap();
        let file = scratch.file_for("2024-01".parse().unwrap());
        assert!(file.is_absolute());

        let sql = LoadStatement::put(&file, "RAW.MY_INTERNAL_STAGE").to_string();
        let expected = format!(
            "file://{}",
            file.display().to_string().replace('\\', "/")
        );
        assert!(sql.starts_with(&format!("PUT {expected} ")), "{sql}");
        assert!(!sql.contains("//?/"), "{sql}");
        assert!(!sql.contains('\\'), "{sql}");
        assert!(sql.contains("/temp_data/yellow_tripdata_2024-01.parquet"));
    }

    #[test]
    fn remove_tolerates_already_missing_directory() {
        let tmp = tempdir().unwrap();
        let dir = tmp.path().join("s");
        let scratch = ScratchDir::prepare(&dir).unwrap();
        fs::remove_dir_all(&dir).unwrap();
        assert!(scratch.remove().is_ok());
    }
}
