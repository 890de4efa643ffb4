use std::fs;
use std::path::{Path, PathBuf};

use image::{DynamicImage, RgbaImage};
use serde::{Deserialize, Serialize};

use crate::catalog::visible_file_names;
use crate::error::{AnnotateError, Result};
use crate::geometry::BBox;

pub const RECORD_SUFFIX: &str = ".json";
pub const PREVIEW_PREFIX: &str = "bbox_";

#[derive(Clone, Debug, Serialize, Deserialize)]
struct AnnotationRecord {
    image: String,
    boxes: Vec<BBox>,
}

/// One JSON record per image plus a rendered preview, each in its own
/// directory.
#[derive(Clone, Debug)]
pub struct BoxStore {
    record_dir: PathBuf,
    preview_dir: PathBuf,
}

impl BoxStore {
    /// Creates both output directories when they do not exist yet.
    pub fn open(record_dir: impl Into<PathBuf>, preview_dir: impl Into<PathBuf>) -> Result<Self> {
        let store = Self {
            record_dir: record_dir.into(),
            preview_dir: preview_dir.into(),
        };
        for dir in [&store.record_dir, &store.preview_dir] {
            fs::create_dir_all(dir).map_err(|e| AnnotateError::io(dir, e))?;
        }
        Ok(store)
    }

    pub fn record_path(&self, image_id: &str) -> PathBuf {
        self.record_dir.join(format!("{image_id}{RECORD_SUFFIX}"))
    }

    pub fn preview_path(&self, image_id: &str) -> PathBuf {
        self.preview_dir.join(format!("{PREVIEW_PREFIX}{image_id}"))
    }

    pub fn exists(&self, image_id: &str) -> bool {
        self.record_path(image_id).is_file()
    }

    pub fn load(&self, image_id: &str) -> Result<Vec<BBox>> {
        if !self.exists(image_id) {
            return Err(AnnotateError::NotFound(image_id.to_string()));
        }
        let path = self.record_path(image_id);
        let data = fs::read_to_string(&path).map_err(|e| AnnotateError::io(&path, e))?;
        let record: AnnotationRecord =
            serde_json::from_str(&data).map_err(|source| AnnotateError::Json { path, source })?;
        Ok(record.boxes)
    }

    /// Overwrites the record for `image_id`, then the preview. The two
    /// files are not written as a unit: a failed preview surfaces as
    /// `AnnotateError::Preview` with the record already in place.
    pub fn save(&self, image_id: &str, boxes: &[BBox], preview: &RgbaImage) -> Result<()> {
        self.save_record(image_id, boxes)?;
        self.save_preview(image_id, preview)
    }

    /// Writes the record through a temp file so a crash never leaves it
    /// truncated.
    fn save_record(&self, image_id: &str, boxes: &[BBox]) -> Result<()> {
        let path = self.record_path(image_id);
        let record = AnnotationRecord {
            image: image_id.to_string(),
            boxes: boxes.to_vec(),
        };
        let data = serde_json::to_string_pretty(&record).map_err(|source| AnnotateError::Json {
            path: path.clone(),
            source,
        })?;
        write_replace(&path, data.as_bytes())
    }

    fn save_preview(&self, image_id: &str, preview: &RgbaImage) -> Result<()> {
        let preview_path = self.preview_path(image_id);
        // jpeg has no alpha channel
        DynamicImage::ImageRgba8(preview.clone())
            .to_rgb8()
            .save(&preview_path)
            .map_err(|source| AnnotateError::Preview {
                path: preview_path,
                source,
            })
    }

    /// Image names that already have a record, sorted.
    pub fn annotated_images(&self) -> Result<Vec<String>> {
        Ok(visible_file_names(&self.record_dir)?
            .into_iter()
            .filter_map(|name| name.strip_suffix(RECORD_SUFFIX).map(str::to_string))
            .collect())
    }
}

fn write_replace(path: &Path, data: &[u8]) -> Result<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    fs::write(&tmp, data).map_err(|e| AnnotateError::io(&tmp, e))?;
    fs::rename(&tmp, path).map_err(|e| AnnotateError::io(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> (tempfile::TempDir, BoxStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = BoxStore::open(dir.path().join("records"), dir.path().join("previews")).unwrap();
        (dir, store)
    }

    #[test]
    fn save_then_load_keeps_order() {
        let (_dir, store) = store();
        let boxes = vec![
            BBox::new((50, 50), (10, 10)),
            BBox::new((0, 0), (3, 4)),
            BBox::new((7, 7), (7, 7)),
            BBox::new((-20, 5), (900, 900)),
        ];
        store.save("a.png", &boxes, &RgbaImage::new(8, 8)).unwrap();
        assert!(store.exists("a.png"));
        assert_eq!(store.load("a.png").unwrap(), boxes);
        assert!(store.preview_path("a.png").ends_with("bbox_a.png"));
        assert!(store.preview_path("a.png").is_file());
    }

    #[test]
    fn empty_list_round_trips() {
        let (_dir, store) = store();
        store.save("e.png", &[], &RgbaImage::new(2, 2)).unwrap();
        assert_eq!(store.load("e.png").unwrap(), Vec::<BBox>::new());
    }

    #[test]
    fn save_overwrites_previous_record() {
        let (_dir, store) = store();
        let img = RgbaImage::new(4, 4);
        store.save("a.png", &[BBox::new((1, 1), (2, 2)), BBox::new((3, 3), (4, 4))], &img).unwrap();
        store.save("a.png", &[BBox::new((9, 9), (1, 1))], &img).unwrap();
        assert_eq!(store.load("a.png").unwrap(), vec![BBox::new((9, 9), (1, 1))]);
    }

    #[test]
    fn load_without_record_is_not_found() {
        let (_dir, store) = store();
        assert!(!store.exists("missing.png"));
        assert!(matches!(store.load("missing.png"), Err(AnnotateError::NotFound(name)) if name == "missing.png"));
    }

    #[test]
    fn record_survives_failed_preview_write() {
        let (_dir, store) = store();
        // no encoder for this extension
        let err = store.save("scan.unknownext", &[BBox::new((1, 2), (3, 4))], &RgbaImage::new(2, 2));
        assert!(matches!(err, Err(AnnotateError::Preview { .. })));
        assert_eq!(store.load("scan.unknownext").unwrap(), vec![BBox::new((1, 2), (3, 4))]);
    }

    #[test]
    fn annotated_images_strip_suffix() {
        let (_dir, store) = store();
        let img = RgbaImage::new(2, 2);
        store.save("b.png", &[], &img).unwrap();
        store.save("a.jpg", &[], &img).unwrap();
        assert_eq!(store.annotated_images().unwrap(), vec!["a.jpg", "b.png"]);
    }
}
