//! Working-directory layout and archive extraction.
//!
//! Each run owns a scratch tree under the media root:
//!
//! ```text
//! <media_root>/temp_ocr/            purged and recreated per run
//!   upload/                         the uploaded archive itself
//!   extracted/                      unpacked archive contents
//!   preview_imgs/obj_<n>/           per-record field crops
//! <media_root>/imgs/<date>/<name>/  retained photos (opt-in)
//! ```

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use freightscan_core::RunError;

/// Scratch and output directories for one pipeline run.
#[derive(Debug, Clone)]
pub struct WorkDirs {
    pub media_root: PathBuf,
    pub base: PathBuf,
    pub upload: PathBuf,
    pub extracted: PathBuf,
    pub previews: PathBuf,
    pub imgs_root: PathBuf,
}

impl WorkDirs {
    pub fn new(media_root: impl Into<PathBuf>) -> Self {
        let media_root = media_root.into();
        let base = media_root.join("temp_ocr");
        Self {
            upload: base.join("upload"),
            extracted: base.join("extracted"),
            previews: base.join("preview_imgs"),
            imgs_root: media_root.join("imgs"),
            base,
            media_root,
        }
    }

    /// Throw away the previous run's scratch tree and recreate it.
    /// The retained-photos root survives across runs.
    pub fn prepare(&self) -> io::Result<()> {
        if self.base.exists() {
            tracing::info!("purging previous scratch tree: {}", self.base.display());
            fs::remove_dir_all(&self.base)?;
        }
        fs::create_dir_all(&self.upload)?;
        fs::create_dir_all(&self.extracted)?;
        fs::create_dir_all(&self.previews)?;
        fs::create_dir_all(&self.imgs_root)?;
        Ok(())
    }

    /// Preview crop directory for the record at `idx`.
    pub fn preview_dir(&self, idx: usize) -> PathBuf {
        self.previews.join(format!("obj_{idx}"))
    }

    /// Retained-photo directory for one driver on one date.
    pub fn person_dir(&self, date_folder: &str, surname: &str) -> PathBuf {
        self.imgs_root.join(date_folder).join(surname)
    }

    /// Path of an image relative to the media root, with forward
    /// slashes, as the preview layer expects.
    pub fn relative(&self, path: &Path) -> String {
        path.strip_prefix(&self.media_root)
            .unwrap_or(path)
            .to_string_lossy()
            .replace('\\', "/")
    }
}

/// Unpack a zip archive into `dest`. Truncated or non-zip input maps
/// to [`RunError::Archive`] with the underlying reason.
pub fn extract_zip(archive_path: &Path, dest: &Path) -> Result<(), RunError> {
    let file = File::open(archive_path)?;
    let mut zip = zip::ZipArchive::new(file)
        .map_err(|e| RunError::Archive(format!("cannot read archive: {e}")))?;
    zip.extract(dest)
        .map_err(|e| RunError::Archive(format!("cannot extract archive: {e}")))?;
    tracing::info!("extracted {} entries to {}", zip.len(), dest.display());
    Ok(())
}

/// Every regular file under `root`, recursively, in sorted order so a
/// run is deterministic regardless of filesystem enumeration order.
pub fn walk_files(root: &Path) -> io::Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        let mut entries: Vec<PathBuf> = fs::read_dir(&dir)?
            .collect::<Result<Vec<_>, _>>()?
            .into_iter()
            .map(|e| e.path())
            .collect();
        entries.sort();
        for path in entries {
            if path.is_dir() {
                stack.push(path);
            } else {
                out.push(path);
            }
        }
    }
    out.sort();
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn prepare_purges_previous_run() {
        let tmp = tempfile::tempdir().unwrap();
        let dirs = WorkDirs::new(tmp.path());
        dirs.prepare().unwrap();

        let stale = dirs.extracted.join("старый.pdf");
        fs::write(&stale, b"x").unwrap();
        let kept = dirs.imgs_root.join("kept.png");
        fs::write(&kept, b"x").unwrap();

        dirs.prepare().unwrap();
        assert!(!stale.exists());
        assert!(kept.exists());
        assert!(dirs.upload.is_dir() && dirs.extracted.is_dir() && dirs.previews.is_dir());
    }

    #[test]
    fn relative_paths_use_forward_slashes() {
        let tmp = tempfile::tempdir().unwrap();
        let dirs = WorkDirs::new(tmp.path());
        let p = dirs.previews.join("obj_0").join("fio.png");
        assert_eq!(dirs.relative(&p), "temp_ocr/preview_imgs/obj_0/fio.png");
    }

    #[test]
    fn extract_zip_round_trip() {
        let tmp = tempfile::tempdir().unwrap();
        let zip_path = tmp.path().join("upload.zip");
        {
            let file = File::create(&zip_path).unwrap();
            let mut w = zip::ZipWriter::new(file);
            let opts = zip::write::SimpleFileOptions::default();
            w.start_file("папка/1.pdf", opts).unwrap();
            w.write_all(b"%PDF-1.4").unwrap();
            w.start_file("ЭСФ Иванов.pdf", opts).unwrap();
            w.write_all(b"%PDF-1.4").unwrap();
            w.finish().unwrap();
        }

        let dest = tmp.path().join("out");
        fs::create_dir_all(&dest).unwrap();
        extract_zip(&zip_path, &dest).unwrap();

        let files = walk_files(&dest).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap().to_string())
            .collect();
        assert!(names.contains(&"1.pdf".to_string()));
        assert!(names.contains(&"ЭСФ Иванов.pdf".to_string()));
    }

    #[test]
    fn extract_zip_rejects_garbage() {
        let tmp = tempfile::tempdir().unwrap();
        let bad = tmp.path().join("upload.zip");
        fs::write(&bad, b"not a zip").unwrap();
        let err = extract_zip(&bad, tmp.path()).unwrap_err();
        assert!(matches!(err, RunError::Archive(_)));
    }
}
