use std::sync::Arc;

use image::RgbaImage;

use crate::draw::DrawState;
use crate::error::AnnotateError;
use crate::geometry::{BBox, Point};
use crate::render::{overlay, COMMITTED_COLOR};
use crate::report::Reporter;
use crate::store::BoxStore;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    Undo,
    Save,
    Quit,
}

/// Input delivered to a session, already in image pixel coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Event {
    Press(Point),
    Move(Point),
    Release(Point),
    Command(Command),
    Other,
}

/// How a session ended: go on with the next image, or stop the batch.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    Continue,
    Abort,
}

/// Everything a surface needs to draw one frame.
#[derive(Clone, Debug)]
pub struct Scene {
    pub image_id: String,
    pub image: Arc<RgbaImage>,
    pub committed: Vec<BBox>,
    pub draft: Option<BBox>,
}

pub trait Surface {
    fn present(&mut self, scene: Scene);
}

pub trait EventSource {
    /// Blocks until the next event is available.
    fn next_event(&mut self) -> Event;
}

pub struct Session<'a> {
    image_id: String,
    image: Arc<RgbaImage>,
    boxes: Vec<BBox>,
    draw: DrawState,
    store: &'a BoxStore,
    reporter: &'a dyn Reporter,
}

impl<'a> Session<'a> {
    pub fn new(
        image_id: impl Into<String>,
        image: RgbaImage,
        boxes: Vec<BBox>,
        store: &'a BoxStore,
        reporter: &'a dyn Reporter,
    ) -> Self {
        Self {
            image_id: image_id.into(),
            image: Arc::new(image),
            boxes,
            draw: DrawState::default(),
            store,
            reporter,
        }
    }

    #[cfg(test)]
    pub fn boxes(&self) -> &[BBox] {
        &self.boxes
    }

    #[cfg(test)]
    pub fn draft(&self) -> Option<BBox> {
        self.draw.draft()
    }

    pub fn scene(&self) -> Scene {
        Scene {
            image_id: self.image_id.clone(),
            image: Arc::clone(&self.image),
            committed: self.boxes.clone(),
            draft: self.draw.draft(),
        }
    }

    /// The image with every committed box drawn on it.
    pub fn preview(&self) -> RgbaImage {
        overlay(&self.image, &self.boxes, COMMITTED_COLOR, 1)
    }

    /// Applies one event. Returns the outcome once the session is over.
    pub fn handle(&mut self, event: Event) -> Option<Outcome> {
        match event {
            Event::Press(p) => {
                self.reporter.pointer("DOWN", p);
                self.draw.press(p);
            }
            Event::Move(p) => self.draw.move_to(p),
            Event::Release(p) => {
                if let Some(b) = self.draw.release(p) {
                    self.reporter.pointer("UP", p);
                    self.boxes.push(b);
                }
            }
            Event::Command(Command::Undo) => {
                self.draw.reset();
                if self.boxes.pop().is_none() {
                    self.reporter.nothing_to_undo(&self.image_id);
                }
            }
            Event::Command(Command::Save) => {
                match self.store.save(&self.image_id, &self.boxes, &self.preview()) {
                    Ok(()) => {}
                    // the record is in place, so the image counts as done
                    Err(e @ AnnotateError::Preview { .. }) => {
                        self.reporter.save_failed(&self.image_id, &e)
                    }
                    // nothing persisted, keep the list so the operator can retry
                    Err(e) => {
                        self.reporter.save_failed(&self.image_id, &e);
                        return None;
                    }
                }
                self.reporter.saved(&self.image_id, self.boxes.len());
                self.boxes.clear();
                self.draw.reset();
                return Some(Outcome::Continue);
            }
            Event::Command(Command::Quit) => {
                self.draw.reset();
                return Some(Outcome::Abort);
            }
            Event::Other => {}
        }
        None
    }

    pub fn run(mut self, events: &mut dyn EventSource, surface: &mut dyn Surface) -> Outcome {
        loop {
            surface.present(self.scene());
            if let Some(outcome) = self.handle(events.next_event()) {
                return outcome;
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::cell::RefCell;
    use std::collections::VecDeque;

    use super::*;

    /// Replays a fixed script, then behaves like a closed window.
    pub struct ScriptedEvents(pub VecDeque<Event>);

    impl ScriptedEvents {
        pub fn new(events: impl IntoIterator<Item = Event>) -> Self {
            Self(events.into_iter().collect())
        }
    }

    impl EventSource for ScriptedEvents {
        fn next_event(&mut self) -> Event {
            self.0.pop_front().unwrap_or(Event::Command(Command::Quit))
        }
    }

    #[derive(Default)]
    pub struct RecordingSurface {
        pub scenes: Vec<Scene>,
    }

    impl RecordingSurface {
        /// The first scene shown for each image, in order.
        pub fn openings(&self) -> Vec<(String, Vec<BBox>)> {
            let mut out: Vec<(String, Vec<BBox>)> = Vec::new();
            for s in &self.scenes {
                if out.last().map(|(id, _)| id != &s.image_id).unwrap_or(true) {
                    out.push((s.image_id.clone(), s.committed.clone()));
                }
            }
            out
        }
    }

    impl Surface for RecordingSurface {
        fn present(&mut self, scene: Scene) {
            self.scenes.push(scene);
        }
    }

    #[derive(Default)]
    pub struct RecordingReporter {
        pub lines: RefCell<Vec<String>>,
    }

    impl RecordingReporter {
        pub fn contains(&self, line: &str) -> bool {
            self.lines.borrow().iter().any(|l| l == line)
        }
    }

    impl Reporter for RecordingReporter {
        fn new_image(&self, image_id: &str) {
            self.lines.borrow_mut().push(format!("new {image_id}"));
        }
        fn skipped(&self, image_id: &str) {
            self.lines.borrow_mut().push(format!("skip {image_id}"));
        }
        fn editing(&self, image_id: &str, boxes: usize) {
            self.lines.borrow_mut().push(format!("edit {image_id} {boxes}"));
        }
        fn pointer(&self, _what: &str, _p: Point) {}
        fn nothing_to_undo(&self, image_id: &str) {
            self.lines.borrow_mut().push(format!("empty undo {image_id}"));
        }
        fn saved(&self, image_id: &str, boxes: usize) {
            self.lines.borrow_mut().push(format!("saved {image_id} {boxes}"));
        }
        fn save_failed(&self, image_id: &str, _err: &dyn std::error::Error) {
            self.lines.borrow_mut().push(format!("save failed {image_id}"));
        }
    }
}
