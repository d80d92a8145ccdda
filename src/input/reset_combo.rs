//! Reset combo detection: a configured physical-button chord that signals
//! "start the trial over".
//!
//! The engine itself is unaware of this; a host wires `triggered` to its
//! `reset()` call (see [`crate::trial::engine`]).

use super::buttons::PhysicalButtons;
use super::snapshot::InputFrame;

/// Watches a fixed physical-button chord and edges `triggered` once per
/// fresh activation, never while the chord is merely held.
#[derive(Clone, Debug)]
pub struct ResetComboDetector {
    combo: PhysicalButtons,
    was_active: bool,
}

impl ResetComboDetector {
    /// `combo` empty means the detector never triggers.
    pub fn new(combo: PhysicalButtons) -> Self {
        ResetComboDetector {
            combo,
            was_active: false,
        }
    }

    /// Feed the next physical frame. Returns `true` on the frame the combo
    /// transitions from inactive to active, provided that frame itself
    /// pressed at least one physical button -- a player already holding the
    /// exact combo at session start must not spuriously trigger a reset.
    pub fn observe(&mut self, frame: &InputFrame) -> bool {
        let active = !self.combo.is_empty() && frame.physical_down == self.combo;
        let triggered = active && !self.was_active && !frame.physical_pressed.is_empty();
        self.was_active = active;
        triggered
    }
}
