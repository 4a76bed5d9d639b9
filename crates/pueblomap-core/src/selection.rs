//! Marquee rectangle and the set of selected elements.

use crate::elements::ElementKey;
use crate::transform::PixelPoint;
use kurbo::Rect;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Marquees smaller than this on either axis are treated as clicks.
pub const MARQUEE_MIN_SIZE: f64 = 5.0;

/// Rubber-band rectangle in pixel space for one gesture.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionBox {
    pub start_x: f64,
    pub start_y: f64,
    pub end_x: f64,
    pub end_y: f64,
    pub visible: bool,
}

impl SelectionBox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Anchor a new marquee at `point`.
    pub fn start(&mut self, point: PixelPoint) {
        *self = Self {
            start_x: point.x,
            start_y: point.y,
            end_x: point.x,
            end_y: point.y,
            visible: true,
        };
    }

    /// Move the free corner. Ignored when no marquee is shown.
    pub fn update(&mut self, point: PixelPoint) {
        if self.visible {
            self.end_x = point.x;
            self.end_y = point.y;
        }
    }

    /// End the gesture, returning the normalized rectangle unless it is
    /// smaller than [`MARQUEE_MIN_SIZE`] on either axis.
    pub fn finish(&mut self) -> Option<Rect> {
        self.finish_with_threshold(MARQUEE_MIN_SIZE)
    }

    pub fn finish_with_threshold(&mut self, min_size: f64) -> Option<Rect> {
        if !self.visible {
            return None;
        }
        let rect = self.rect();
        self.visible = false;
        if rect.width() < min_size || rect.height() < min_size {
            log::debug!("Marquee discarded ({}x{})", rect.width(), rect.height());
            return None;
        }
        Some(rect)
    }

    pub fn cancel(&mut self) {
        self.visible = false;
    }

    pub fn is_active(&self) -> bool {
        self.visible
    }

    /// Current rectangle with ordered corners.
    pub fn rect(&self) -> Rect {
        Rect::new(self.start_x, self.start_y, self.end_x, self.end_y).abs()
    }
}

/// Selected and hovered elements.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectionSet {
    selected: BTreeSet<ElementKey>,
    hovered: Option<ElementKey>,
}

impl SelectionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Select a single element (clears other selections).
    pub fn select(&mut self, id: ElementKey) {
        self.selected.clear();
        self.selected.insert(id);
    }

    pub fn add(&mut self, id: ElementKey) {
        self.selected.insert(id);
    }

    /// Flip membership. Returns whether the element is now selected.
    pub fn toggle(&mut self, id: ElementKey) -> bool {
        if self.selected.remove(&id) {
            false
        } else {
            self.selected.insert(id);
            true
        }
    }

    pub fn deselect(&mut self, id: &ElementKey) {
        self.selected.remove(id);
    }

    pub fn clear(&mut self) {
        self.selected.clear();
    }

    /// Replace the whole selection, e.g. with a marquee result.
    pub fn replace(&mut self, ids: impl IntoIterator<Item = ElementKey>) {
        self.selected = ids.into_iter().collect();
    }

    /// Forget an element that no longer exists.
    pub fn remove(&mut self, id: &ElementKey) {
        self.selected.remove(id);
        if self.hovered.as_ref() == Some(id) {
            self.hovered = None;
        }
    }

    pub fn is_selected(&self, id: &ElementKey) -> bool {
        self.selected.contains(id)
    }

    /// Selected elements in key order.
    pub fn selected(&self) -> impl Iterator<Item = &ElementKey> {
        self.selected.iter()
    }

    pub fn len(&self) -> usize {
        self.selected.len()
    }

    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }

    pub fn hovered(&self) -> Option<&ElementKey> {
        self.hovered.as_ref()
    }

    pub fn set_hovered(&mut self, id: Option<ElementKey>) {
        self.hovered = id;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kurbo::Point;

    #[test]
    fn test_marquee_normalizes_corners() {
        let mut marquee = SelectionBox::new();
        marquee.start(Point::new(100.0, 80.0));
        marquee.update(Point::new(20.0, 10.0));
        assert!(marquee.is_active());

        let rect = marquee.finish().unwrap();
        assert_eq!(rect, Rect::new(20.0, 10.0, 100.0, 80.0));
        assert!(!marquee.is_active());
    }

    #[test]
    fn test_small_marquee_discarded() {
        let mut marquee = SelectionBox::new();
        marquee.start(Point::new(10.0, 10.0));
        // Wide but only 4px tall.
        marquee.update(Point::new(200.0, 14.0));
        assert_eq!(marquee.finish(), None);
        assert!(!marquee.is_active());

        marquee.start(Point::new(10.0, 10.0));
        marquee.update(Point::new(15.0, 15.0));
        assert!(marquee.finish().is_some());
    }

    #[test]
    fn test_update_without_start_ignored() {
        let mut marquee = SelectionBox::new();
        marquee.update(Point::new(50.0, 50.0));
        assert_eq!(marquee, SelectionBox::default());
        assert_eq!(marquee.finish(), None);
    }

    #[test]
    fn test_cancel() {
        let mut marquee = SelectionBox::new();
        marquee.start(Point::new(0.0, 0.0));
        marquee.update(Point::new(50.0, 50.0));
        marquee.cancel();
        assert_eq!(marquee.finish(), None);
    }

    #[test]
    fn test_selection_set() {
        let mut selection = SelectionSet::new();
        selection.select(ElementKey::building("1"));
        selection.add(ElementKey::npc("2"));
        assert_eq!(selection.len(), 2);

        selection.select(ElementKey::zone("3"));
        assert_eq!(selection.selected().collect::<Vec<_>>(), vec![&ElementKey::zone("3")]);

        assert!(selection.toggle(ElementKey::npc("2")));
        assert!(!selection.toggle(ElementKey::npc("2")));
        assert!(!selection.is_selected(&ElementKey::npc("2")));
    }

    #[test]
    fn test_remove_clears_hover() {
        let mut selection = SelectionSet::new();
        selection.select(ElementKey::npc("2"));
        selection.set_hovered(Some(ElementKey::npc("2")));
        selection.remove(&ElementKey::npc("2"));
        assert!(selection.is_empty());
        assert_eq!(selection.hovered(), None);
    }
}
