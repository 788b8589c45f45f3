// THEORY:
// The `RegionEditor` is the operator's hand on the region collection. It consumes
// discrete pointer events and turns them into region creation and region moves.
//
// State machine (no terminal state):
//
//   Idle --down on region--> Dragging(id, last) --move--> Dragging(id, pos)
//     |                          |
//     |                          +--up--> Idle
//     +--down elsewhere--> Drawing(start, current) --move--> Drawing(start, pos)
//                                |
//                                +--up--> Idle, region added
//
// Key architectural principles:
// 1.  **Geometry Only**: The editor never touches progression flags. Dragging
//     rewrites both corners through `RegionStore::update_geometry`; drawing only
//     creates a region on release.
// 2.  **Incremental Drags**: Each move translates the region by the offset since
//     the previous pointer position, then remembers the new position, so the
//     region follows the pointer exactly however many moves arrive.
// 3.  **Provisional Preview**: While drawing, the rectangle under construction is
//     exposed through `provisional()` for rendering, but nothing is stored until
//     the pointer is released.
// 4.  **Stray Events**: A pointer-down while a gesture is already in progress, and
//     a move or release while idle, are ignored.

use crate::core_modules::region::{Point, Rect, RegionId};
use crate::core_modules::region_store::RegionStore;
use crate::error::WatchResult;
use tracing::{debug, info};

/// A discrete pointer event in frame pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerEvent {
    Down(Point),
    Move(Point),
    Up(Point),
}

/// Where the editor is within a gesture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EditorState {
    #[default]
    Idle,
    Drawing { start: Point, current: Point },
    Dragging { region: RegionId, last: Point },
}

/// The observable effect of one pointer event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditOutcome {
    Unchanged,
    DrawStarted(Point),
    Created(RegionId),
    Grabbed(RegionId),
    Moved(RegionId),
    /// A drag ended. The region's geometry may have changed.
    Released(RegionId),
}

#[derive(Debug, Default)]
pub struct RegionEditor {
    state: EditorState,
}

impl RegionEditor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> EditorState {
        self.state
    }

    /// The rectangle being drawn, for rendering only.
    pub fn provisional(&self) -> Option<Rect> {
        match self.state {
            EditorState::Drawing { start, current } => Some(Rect::from_corners(start, current)),
            _ => None,
        }
    }

    /// The region currently being dragged, if any.
    pub fn selected(&self) -> Option<RegionId> {
        match self.state {
            EditorState::Dragging { region, .. } => Some(region),
            _ => None,
        }
    }

    /// Feeds one pointer event through the state machine.
    pub fn handle(&mut self, event: PointerEvent, store: &mut RegionStore) -> WatchResult<EditOutcome> {
        match (self.state, event) {
            (EditorState::Idle, PointerEvent::Down(pos)) => match store.hit_test(pos) {
                Some(region) => {
                    self.state = EditorState::Dragging { region, last: pos };
                    debug!(%region, x = pos.x, y = pos.y, "region grabbed");
                    Ok(EditOutcome::Grabbed(region))
                }
                None => {
                    self.state = EditorState::Drawing {
                        start: pos,
                        current: pos,
                    };
                    Ok(EditOutcome::DrawStarted(pos))
                }
            },

            (EditorState::Drawing { start, .. }, PointerEvent::Move(pos)) => {
                self.state = EditorState::Drawing {
                    start,
                    current: pos,
                };
                Ok(EditOutcome::Unchanged)
            }

            (EditorState::Drawing { start, .. }, PointerEvent::Up(pos)) => {
                self.state = EditorState::Idle;
                let region = store.add((start, pos));
                info!(%region, bounds = ?Rect::from_corners(start, pos), "region created");
                Ok(EditOutcome::Created(region))
            }

            (EditorState::Dragging { region, last }, PointerEvent::Move(pos)) => {
                let (dx, dy) = last.delta_to(pos);
                if dx == 0 && dy == 0 {
                    return Ok(EditOutcome::Unchanged);
                }
                let corners = match store.get(region) {
                    Ok(current) => current.translated_corners(dx, dy),
                    Err(error) => {
                        self.state = EditorState::Idle;
                        return Err(error);
                    }
                };
                store.update_geometry(region, corners)?;
                self.state = EditorState::Dragging { region, last: pos };
                Ok(EditOutcome::Moved(region))
            }

            (EditorState::Dragging { region, .. }, PointerEvent::Up(_)) => {
                self.state = EditorState::Idle;
                if let Ok(current) = store.get(region) {
                    debug!(%region, bounds = ?current.bounds(), "region released");
                }
                Ok(EditOutcome::Released(region))
            }

            _ => Ok(EditOutcome::Unchanged),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_modules::region::SignalColor;
    use crate::error::WatchError;

    fn p(x: i32, y: i32) -> Point {
        Point::new(x, y)
    }

    #[test]
    fn draw_gesture_creates_one_region_on_release() {
        let mut store = RegionStore::new();
        let mut editor = RegionEditor::new();

        assert_eq!(
            editor.handle(PointerEvent::Down(p(10, 10)), &mut store).unwrap(),
            EditOutcome::DrawStarted(p(10, 10))
        );
        editor.handle(PointerEvent::Move(p(30, 20)), &mut store).unwrap();
        assert_eq!(editor.provisional(), Some(Rect::new(10, 10, 20, 10)));
        assert!(store.is_empty());

        let outcome = editor.handle(PointerEvent::Up(p(50, 25)), &mut store).unwrap();
        let EditOutcome::Created(id) = outcome else {
            panic!("expected a created region, got {outcome:?}");
        };
        let region = store.get(id).unwrap();
        assert_eq!(region.corners, (p(10, 10), p(50, 25)));
        assert_eq!(region.flags.stage(), 0);
        assert_eq!(editor.state(), EditorState::Idle);
        assert_eq!(editor.provisional(), None);
    }

    #[test]
    fn backwards_draw_keeps_raw_corners() {
        let mut store = RegionStore::new();
        let mut editor = RegionEditor::new();
        editor.handle(PointerEvent::Down(p(50, 40)), &mut store).unwrap();
        editor.handle(PointerEvent::Up(p(10, 10)), &mut store).unwrap();
        let region = &store.list()[0];
        assert_eq!(region.corners, (p(50, 40), p(10, 10)));
        assert_eq!(region.bounds(), Rect::new(10, 10, 40, 30));
    }

    #[test]
    fn drag_accumulates_moves_and_preserves_flags() {
        let mut store = RegionStore::new();
        let id = store.add((p(10, 10), p(50, 25)));
        store.update_flags(id, |flags| flags.mark(SignalColor::Red)).unwrap();
        let mut editor = RegionEditor::new();

        assert_eq!(
            editor.handle(PointerEvent::Down(p(20, 15)), &mut store).unwrap(),
            EditOutcome::Grabbed(id)
        );
        assert_eq!(editor.selected(), Some(id));
        editor.handle(PointerEvent::Move(p(25, 15)), &mut store).unwrap();
        editor.handle(PointerEvent::Move(p(27, 22)), &mut store).unwrap();
        assert_eq!(
            editor.handle(PointerEvent::Up(p(27, 22)), &mut store).unwrap(),
            EditOutcome::Released(id)
        );

        let region = store.get(id).unwrap();
        assert_eq!(region.corners, (p(17, 17), p(57, 32)));
        assert!(region.flags.red_logged());
        assert_eq!(region.flags.stage(), 1);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn stationary_move_is_unchanged() {
        let mut store = RegionStore::new();
        store.add((p(0, 0), p(20, 20)));
        let mut editor = RegionEditor::new();
        editor.handle(PointerEvent::Down(p(5, 5)), &mut store).unwrap();
        assert_eq!(
            editor.handle(PointerEvent::Move(p(5, 5)), &mut store).unwrap(),
            EditOutcome::Unchanged
        );
    }

    #[test]
    fn stray_events_are_ignored() {
        let mut store = RegionStore::new();
        let mut editor = RegionEditor::new();
        assert_eq!(
            editor.handle(PointerEvent::Up(p(1, 1)), &mut store).unwrap(),
            EditOutcome::Unchanged
        );
        assert_eq!(
            editor.handle(PointerEvent::Move(p(2, 2)), &mut store).unwrap(),
            EditOutcome::Unchanged
        );

        editor.handle(PointerEvent::Down(p(0, 0)), &mut store).unwrap();
        assert_eq!(
            editor.handle(PointerEvent::Down(p(9, 9)), &mut store).unwrap(),
            EditOutcome::Unchanged
        );
        assert_eq!(
            editor.state(),
            EditorState::Drawing { start: p(0, 0), current: p(0, 0) }
        );
        assert!(store.is_empty());
    }

    #[test]
    fn first_region_in_store_order_is_grabbed_on_overlap() {
        let mut store = RegionStore::new();
        let first = store.add((p(0, 0), p(40, 40)));
        let second = store.add((p(20, 20), p(60, 60)));
        let mut editor = RegionEditor::new();
        editor.handle(PointerEvent::Down(p(30, 30)), &mut store).unwrap();
        editor.handle(PointerEvent::Move(p(35, 30)), &mut store).unwrap();
        assert_eq!(store.get(first).unwrap().corners, (p(5, 0), p(45, 40)));
        assert_eq!(store.get(second).unwrap().corners, (p(20, 20), p(60, 60)));
    }

    #[test]
    fn dragging_a_vanished_region_reports_not_found_and_resets() {
        let mut store = RegionStore::new();
        store.add((p(0, 0), p(20, 20)));
        let mut editor = RegionEditor::new();
        editor.handle(PointerEvent::Down(p(5, 5)), &mut store).unwrap();

        // Swap in a store that never saw the grabbed region.
        let mut other = RegionStore::new();
        let result = editor.handle(PointerEvent::Move(p(8, 8)), &mut other);
        assert!(matches!(result, Err(WatchError::RegionNotFound(_))));
        assert_eq!(editor.state(), EditorState::Idle);
    }
}
