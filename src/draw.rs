use crate::geometry::{BBox, Point};

/// Single-box drafting driven by primary-button pointer events.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DrawState {
    #[default]
    Idle,
    Dragging { start: Point, end: Point },
}

impl DrawState {
    pub fn press(&mut self, p: Point) {
        *self = DrawState::Dragging { start: p, end: p };
    }

    pub fn move_to(&mut self, p: Point) {
        if let DrawState::Dragging { end, .. } = self {
            *end = p;
        }
    }

    /// Finishes the drag at `p` and hands back the completed box.
    /// Returns `None` when no drag is in progress.
    pub fn release(&mut self, p: Point) -> Option<BBox> {
        match *self {
            DrawState::Dragging { start, .. } => {
                *self = DrawState::Idle;
                Some(BBox { start, end: p })
            }
            DrawState::Idle => None,
        }
    }

    pub fn reset(&mut self) {
        *self = DrawState::Idle;
    }

    pub fn draft(&self) -> Option<BBox> {
        match *self {
            DrawState::Dragging { start, end } => Some(BBox { start, end }),
            DrawState::Idle => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drag_commits_press_and_release_points() {
        let mut d = DrawState::default();
        d.press(Point::new(10, 10));
        for p in [(12, 14), (30, 2), (-5, 70)] {
            d.move_to(p.into());
        }
        assert_eq!(d.draft(), Some(BBox::new((10, 10), (-5, 70))));
        let b = d.release(Point::new(50, 50));
        assert_eq!(b, Some(BBox::new((10, 10), (50, 50))));
        assert_eq!(d, DrawState::Idle);
        assert_eq!(d.draft(), None);
    }

    #[test]
    fn move_and_release_ignored_when_idle() {
        let mut d = DrawState::default();
        d.move_to(Point::new(3, 3));
        assert_eq!(d, DrawState::Idle);
        assert_eq!(d.release(Point::new(3, 3)), None);
    }

    #[test]
    fn press_while_dragging_restarts_the_draft() {
        let mut d = DrawState::default();
        d.press(Point::new(1, 1));
        d.move_to(Point::new(9, 9));
        d.press(Point::new(20, 20));
        assert_eq!(d.draft(), Some(BBox::new((20, 20), (20, 20))));
    }

    #[test]
    fn click_without_motion_yields_zero_area_box() {
        let mut d = DrawState::default();
        d.press(Point::new(7, 7));
        assert_eq!(d.release(Point::new(7, 7)), Some(BBox::new((7, 7), (7, 7))));
    }
}
