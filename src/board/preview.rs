//! Hover preview — a detail card that appears after the pointer rests on an
//! item for a short delay.
//!
//! Time is passed in explicitly so the state stays synchronous; the caller
//! supplies `Instant::now()`.

use std::time::{Duration, Instant};

use super::model::{Item, ItemId};

pub const DEFAULT_HOVER_PREVIEW_DELAY: Duration = Duration::from_millis(400);

#[derive(Debug, Clone)]
pub struct HoverPreview {
    delay: Duration,
    /// Item waiting to become visible, with the instant it was hovered.
    pending: Option<(Item, Instant)>,
    shown: Option<Item>,
}

impl Default for HoverPreview {
    fn default() -> Self {
        Self::new(DEFAULT_HOVER_PREVIEW_DELAY)
    }
}

impl HoverPreview {
    #[must_use]
    pub fn new(delay: Duration) -> Self {
        Self { delay, pending: None, shown: None }
    }

    /// Schedule a preview. Ignored while a drag is in progress. Hovering a
    /// different item restarts the delay.
    pub fn hover_start(&mut self, item: Item, now: Instant, dragging: bool) {
        if dragging {
            return;
        }
        self.shown = None;
        self.pending = Some((item, now));
    }

    pub fn hover_end(&mut self) {
        self.pending = None;
        self.shown = None;
    }

    /// Drop pending and visible previews at the start of a drag.
    pub fn suspend(&mut self) {
        self.hover_end();
    }

    /// Forget any preview of an item that left the board.
    pub fn forget(&mut self, item_id: ItemId) {
        if self.pending.as_ref().is_some_and(|(item, _)| item.id == item_id) {
            self.pending = None;
        }
        if self.shown.as_ref().is_some_and(|item| item.id == item_id) {
            self.shown = None;
        }
    }

    /// The visible preview at `now`, promoting a pending one whose delay has
    /// elapsed.
    pub fn visible(&mut self, now: Instant) -> Option<&Item> {
        if let Some((_, since)) = &self.pending {
            if now.saturating_duration_since(*since) >= self.delay {
                self.shown = self.pending.take().map(|(item, _)| item);
            }
        }
        self.shown.as_ref()
    }
}
