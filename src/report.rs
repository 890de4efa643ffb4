use crate::geometry::Point;

/// Operator-facing notices raised by the batch and its sessions.
pub trait Reporter {
    fn new_image(&self, image_id: &str);
    fn skipped(&self, image_id: &str);
    fn editing(&self, image_id: &str, boxes: usize);
    fn pointer(&self, what: &str, p: Point);
    fn nothing_to_undo(&self, image_id: &str);
    fn saved(&self, image_id: &str, boxes: usize);
    fn save_failed(&self, image_id: &str, err: &dyn std::error::Error);
}

/// Forwards everything to the `log` facade.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogReporter;

impl Reporter for LogReporter {
    fn new_image(&self, image_id: &str) {
        log::info!("new: {image_id}");
    }

    fn skipped(&self, image_id: &str) {
        log::info!("skipping: {image_id} is already annotated");
    }

    fn editing(&self, image_id: &str, boxes: usize) {
        log::info!("edit: {image_id} is already annotated ({boxes} boxes)");
    }

    fn pointer(&self, what: &str, p: Point) {
        log::debug!("{what}: {}, {}", p.x, p.y);
    }

    fn nothing_to_undo(&self, image_id: &str) {
        log::info!("no bounding boxes to delete on {image_id}");
    }

    fn saved(&self, image_id: &str, boxes: usize) {
        log::info!("saved {boxes} boxes for {image_id}");
    }

    fn save_failed(&self, image_id: &str, err: &dyn std::error::Error) {
        log::error!("saving {image_id} failed: {err}");
    }
}
