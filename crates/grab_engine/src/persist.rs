use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use tempfile::NamedTempFile;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("output directory missing or not writable: {0}")]
    OutputDir(String),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

const MAX_NAME_COPIES: u32 = 1000;

/// Ensure the directory exists and is a directory; create it if missing.
pub fn ensure_output_dir(dir: &Path) -> Result<(), PersistError> {
    match fs::metadata(dir) {
        Ok(meta) if meta.is_dir() => Ok(()),
        Ok(_) => Err(PersistError::OutputDir(format!(
            "{} is not a directory",
            dir.display()
        ))),
        Err(err) if err.kind() == io::ErrorKind::NotFound => fs::create_dir_all(dir)
            .map_err(|e| PersistError::OutputDir(format!("{}: {e}", dir.display()))),
        Err(err) => Err(PersistError::OutputDir(format!("{}: {err}", dir.display()))),
    }
}

/// Writes whole files into one directory through a temp file and a rename,
/// so readers never observe a half-written file.
#[derive(Debug, Clone)]
pub struct AtomicFileWriter {
    dir: PathBuf,
}

impl AtomicFileWriter {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    /// Writes `filename`, replacing any file of that name.
    pub fn write(&self, filename: &str, content: impl AsRef<[u8]>) -> Result<PathBuf, PersistError> {
        ensure_output_dir(&self.dir)?;

        let target = self.dir.join(filename);
        let tmp = self.stage(content.as_ref())?;

        // Windows refuses to rename over an existing file.
        if target.exists() {
            fs::remove_file(&target)?;
        }
        tmp.persist(&target).map_err(|e| PersistError::Io(e.error))?;
        Ok(target)
    }

    /// Writes `filename` without touching existing files: a taken name gets a
    /// ` (n)` suffix before the extension. Returns the path actually used.
    pub fn write_new(
        &self,
        filename: &str,
        content: impl AsRef<[u8]>,
    ) -> Result<PathBuf, PersistError> {
        ensure_output_dir(&self.dir)?;

        let mut tmp = self.stage(content.as_ref())?;
        for copy in 0..MAX_NAME_COPIES {
            let target = self.dir.join(numbered_name(filename, copy));
            match tmp.persist_noclobber(&target) {
                Ok(_) => return Ok(target),
                Err(err) if err.error.kind() == io::ErrorKind::AlreadyExists => tmp = err.file,
                Err(err) => return Err(PersistError::Io(err.error)),
            }
        }
        Err(PersistError::OutputDir(format!(
            "{}: no free name left for {filename}",
            self.dir.display()
        )))
    }

    fn stage(&self, content: &[u8]) -> Result<NamedTempFile, PersistError> {
        let mut tmp = tempfile::Builder::new()
            .prefix(".instagrab-")
            .suffix(".part")
            .tempfile_in(&self.dir)?;
        tmp.write_all(content)?;
        tmp.flush()?;
        tmp.as_file_mut().sync_all()?;
        Ok(tmp)
    }

    pub fn write_json<T: Serialize + ?Sized>(
        &self,
        filename: &str,
        value: &T,
    ) -> Result<PathBuf, PersistError> {
        let content = serde_json::to_vec_pretty(value)?;
        self.write(filename, content)
    }
}

/// `photo.jpg` for copy 0, `photo (2).jpg` for copy 2.
fn numbered_name(filename: &str, copy: u32) -> String {
    if copy == 0 {
        return filename.to_string();
    }
    match filename.rsplit_once('.') {
        Some((stem, extension)) if !stem.is_empty() => format!("{stem} ({copy}).{extension}"),
        _ => format!("{filename} ({copy})"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn copies_are_numbered_before_the_extension() {
        assert_eq!(numbered_name("instagram_image_1.jpg", 0), "instagram_image_1.jpg");
        assert_eq!(numbered_name("instagram_image_1.jpg", 1), "instagram_image_1 (1).jpg");
        assert_eq!(
            numbered_name("instagram_media_2024-03-01_3items.zip", 2),
            "instagram_media_2024-03-01_3items (2).zip"
        );
        assert_eq!(numbered_name("README", 1), "README (1)");
        assert_eq!(numbered_name(".hidden", 1), ".hidden (1)");
    }
}
