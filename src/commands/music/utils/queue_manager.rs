use std::collections::VecDeque;

use tracing::debug;

use super::playable::PlayableItem;

/// Result of `PlaybackQueue::advance`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    /// The front was removed and another item is now at the front.
    Next,
    /// The front was removed and nothing is left.
    Drained,
    /// There was nothing to remove.
    Empty,
}

/// FIFO of playable items for one guild.
///
/// The front item, if any, is the one playing or about to play. Items inside the
/// prefetch window start downloading as soon as they get there.
#[derive(Debug)]
pub struct PlaybackQueue {
    items: VecDeque<PlayableItem>,
    prefetch: usize,
}

impl PlaybackQueue {
    pub fn new(prefetch: usize) -> Self {
        Self {
            items: VecDeque::new(),
            prefetch: prefetch.max(1),
        }
    }

    /// Appends an item and returns its zero-based position.
    pub fn enqueue(&mut self, item: PlayableItem) -> usize {
        self.items.push_back(item);
        self.prefetch_window();
        self.items.len() - 1
    }

    /// Inserts items directly behind the front, keeping their order.
    pub fn insert_next(&mut self, items: impl IntoIterator<Item = PlayableItem>) {
        let at = self.items.len().min(1);
        for (offset, item) in items.into_iter().enumerate() {
            self.items.insert(at + offset, item);
        }
        self.prefetch_window();
    }

    /// Removes the front item, releasing its resources.
    pub fn advance(&mut self) -> Advance {
        let Some(mut finished) = self.items.pop_front() else {
            return Advance::Empty;
        };
        debug!("Finished with '{}'", finished.display_name());
        finished.cleanup();

        if self.items.is_empty() {
            Advance::Drained
        } else {
            self.prefetch_window();
            Advance::Next
        }
    }

    /// Removes every item, including the front. Returns how many were removed.
    pub fn clear(&mut self) -> usize {
        let removed = self.items.len();
        self.items.clear();
        removed
    }

    /// Removes everything behind the front. Returns how many were removed.
    pub fn clear_pending(&mut self) -> usize {
        if self.items.len() <= 1 {
            return 0;
        }
        self.items.drain(1..).count()
    }

    /// The first `limit` entries rendered as `"<position>. <displayName>"`.
    pub fn peek(&self, limit: usize) -> Vec<String> {
        self.items
            .iter()
            .take(limit)
            .enumerate()
            .map(|(index, item)| format!("{}. {}", index + 1, item.display_name()))
            .collect()
    }

    pub fn front(&self) -> Option<&PlayableItem> {
        self.items.front()
    }

    pub fn front_mut(&mut self) -> Option<&mut PlayableItem> {
        self.items.front_mut()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    fn prefetch_window(&mut self) {
        for item in self.items.iter_mut().take(self.prefetch) {
            item.prepare();
        }
    }
}
