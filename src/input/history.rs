//! Run-length compressed display history.

use std::collections::VecDeque;

use super::buttons::CanonicalButtons;

pub const DISPLAY_SATURATION: u32 = 99;

/// A contiguous run of frames sharing the same `(direction, canonical_down)`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct InputHistoryEntry {
    pub direction: u8,
    pub canonical_down: CanonicalButtons,
    pub start_frame: u32,
    pub end_frame: u32,
    pub length: u32,
    pub saturated: bool,
}

impl InputHistoryEntry {
    /// The value a UI should show: the true run length, clamped at 99.
    pub fn display_length(&self) -> u32 {
        self.length.min(DISPLAY_SATURATION)
    }

    fn new(direction: u8, canonical_down: CanonicalButtons, frame: u32) -> Self {
        InputHistoryEntry {
            direction,
            canonical_down,
            start_frame: frame,
            end_frame: frame,
            length: 1,
            saturated: false,
        }
    }

    fn extend(&mut self, frame: u32) {
        self.end_frame = frame;
        self.length += 1;
        self.saturated = self.length >= DISPLAY_SATURATION;
    }

    fn matches(&self, direction: u8, canonical_down: CanonicalButtons) -> bool {
        self.direction == direction && self.canonical_down == canonical_down
    }
}

/// Run-length-compressed history of `(direction, canonical_down)` pairs,
/// FIFO-capped at `max_entries`.
#[derive(Clone, Debug)]
pub struct InputHistory {
    entries: VecDeque<InputHistoryEntry>,
    max_entries: usize,
}

impl InputHistory {
    pub fn new(max_entries: usize) -> Self {
        InputHistory {
            entries: VecDeque::new(),
            max_entries,
        }
    }

    pub fn entries(&self) -> &VecDeque<InputHistoryEntry> {
        &self.entries
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn append(&mut self, frame: u32, direction: u8, canonical_down: CanonicalButtons) {
        let extend_tail = matches!(self.entries.back(), Some(tail) if tail.matches(direction, canonical_down));
        if extend_tail {
            self.entries.back_mut().unwrap().extend(frame);
        } else {
            self.entries.push_back(InputHistoryEntry::new(direction, canonical_down, frame));
            while self.entries.len() > self.max_entries {
                self.entries.pop_front();
            }
        }
    }
}
