use std::{
    fs, io,
    path::{Path, PathBuf},
};

use image::{ImageFormat, RgbImage};
use tempfile::{Builder, NamedTempFile};
use uuid::Uuid;

use crate::errors::{ColorizeError, Result};

/// A request-scoped file on local storage.
///
/// The file lives exactly as long as the guard: dropping it removes the file,
/// whatever path the request took to get there.
#[derive(Debug)]
pub struct TransientFile {
    file: NamedTempFile,
}

impl TransientFile {
    /// Creates an empty file in `dir` whose name starts with `request_id`.
    pub fn create(dir: &Path, request_id: &Uuid, suffix: &str) -> Result<TransientFile> {
        fs::create_dir_all(dir)?;
        let file = Builder::new()
            .prefix(&format!("{}-", request_id))
            .suffix(suffix)
            .tempfile_in(dir)?;
        Ok(TransientFile { file })
    }

    /// Creates a transient PNG holding `pixels`.
    pub fn with_png(dir: &Path, request_id: &Uuid, pixels: &RgbImage) -> Result<TransientFile> {
        let transient = TransientFile::create(dir, request_id, ".png")?;
        pixels
            .save_with_format(transient.path(), ImageFormat::Png)
            .map_err(ColorizeError::Encode)?;
        Ok(transient)
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    pub fn to_path_buf(&self) -> PathBuf {
        self.file.path().to_path_buf()
    }

    /// Removes the file now and reports whether that worked.
    pub fn close(self) -> io::Result<()> {
        self.file.close()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn file_is_removed_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let path = {
            let transient = TransientFile::create(dir.path(), &Uuid::new_v4(), ".png").unwrap();
            assert!(transient.path().exists());
            transient.to_path_buf()
        };
        assert!(!path.exists());
    }

    #[test]
    fn file_is_removed_on_close() {
        let dir = tempfile::tempdir().unwrap();
        let transient = TransientFile::create(dir.path(), &Uuid::new_v4(), ".png").unwrap();
        let path = transient.to_path_buf();
        transient.close().unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn name_carries_request_id() {
        let dir = tempfile::tempdir().unwrap();
        let id = Uuid::new_v4();
        let transient = TransientFile::create(dir.path(), &id, ".png").unwrap();
        let name = transient.path().file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with(&id.to_string()));
        assert!(name.ends_with(".png"));
    }

    #[test]
    fn png_contents_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let pixels = RgbImage::from_pixel(3, 2, Rgb([9, 8, 7]));
        let transient = TransientFile::with_png(dir.path(), &Uuid::new_v4(), &pixels).unwrap();
        let read = image::open(transient.path()).unwrap().to_rgb8();
        assert_eq!(read, pixels);
    }
}
