use std::path::{Path, PathBuf};

use image::RgbaImage;
use serde::{Deserialize, Serialize};

use crate::catalog::ImageSet;
use crate::error::{AnnotateError, Result};
use crate::report::Reporter;
use crate::session::{EventSource, Outcome, Session, Surface};
use crate::store::BoxStore;

/// What to do with images that already have a record. Fixed for a run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchMode {
    #[default]
    Skip,
    Edit,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Disposition {
    New,
    Skip,
    Edit,
}

pub fn classify(image_id: &str, images: &ImageSet, mode: BatchMode) -> Disposition {
    match (images.is_annotated(image_id), mode) {
        (false, _) => Disposition::New,
        (true, BatchMode::Skip) => Disposition::Skip,
        (true, BatchMode::Edit) => Disposition::Edit,
    }
}

#[derive(Clone, Debug)]
pub struct BatchConfig {
    pub raw_dir: PathBuf,
    pub mode: BatchMode,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub opened: usize,
    pub saved: usize,
    pub skipped: usize,
    pub aborted: bool,
}

pub fn load_image(path: &Path) -> Result<RgbaImage> {
    Ok(image::open(path)
        .map_err(|e| AnnotateError::image(path, e))?
        .to_rgba8())
}

type Loader<'a> = Box<dyn Fn(&Path) -> Result<RgbaImage> + 'a>;

pub struct BatchDriver<'a> {
    config: BatchConfig,
    store: &'a BoxStore,
    reporter: &'a dyn Reporter,
    loader: Loader<'a>,
}

impl<'a> BatchDriver<'a> {
    pub fn new(config: BatchConfig, store: &'a BoxStore, reporter: &'a dyn Reporter) -> Self {
        Self {
            config,
            store,
            reporter,
            loader: Box::new(load_image),
        }
    }

    #[cfg(test)]
    pub fn with_loader(mut self, loader: impl Fn(&Path) -> Result<RgbaImage> + 'a) -> Self {
        self.loader = Box::new(loader);
        self
    }

    /// Walks `images.raw` in order until the list runs out or a session
    /// aborts. An image that cannot be decoded or a record that cannot be
    /// reloaded ends the batch with an error.
    pub fn run(
        &self,
        images: &ImageSet,
        events: &mut dyn EventSource,
        surface: &mut dyn Surface,
    ) -> Result<BatchSummary> {
        let mut summary = BatchSummary::default();
        for image_id in &images.raw {
            let boxes = match classify(image_id, images, self.config.mode) {
                Disposition::Skip => {
                    self.reporter.skipped(image_id);
                    summary.skipped += 1;
                    continue;
                }
                Disposition::New => {
                    self.reporter.new_image(image_id);
                    Vec::new()
                }
                Disposition::Edit => {
                    let boxes = self.store.load(image_id)?;
                    self.reporter.editing(image_id, boxes.len());
                    boxes
                }
            };

            let canvas = (self.loader)(&self.config.raw_dir.join(image_id))?;
            let session = Session::new(image_id.as_str(), canvas, boxes, self.store, self.reporter);
            summary.opened += 1;
            match session.run(events, surface) {
                Outcome::Continue => summary.saved += 1,
                Outcome::Abort => {
                    summary.aborted = true;
                    break;
                }
            }
        }
        Ok(summary)
    }
}
