//! `TrialStepExpectation`: the compiled, per-step input requirement a
//! [`super::matcher`] resolves against the frame history.

use crate::input::{CanonicalButton, MotionCode};

/// What a single trial step demands of the player. The four facets
/// (direction / motion / buttons / any-two-from) are independent optional
/// requirements, not a tagged union: a step may combine a motion with a
/// button (e.g. 236 + LP).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TrialStepExpectation {
    pub direction: Option<u8>,
    pub motion: Option<MotionCode>,
    pub buttons: Vec<CanonicalButton>,
    pub any_two_buttons_from: Option<Vec<CanonicalButton>>,
    pub simultaneous_within_frames: Option<u32>,
}

impl TrialStepExpectation {
    pub fn requires_buttons(&self) -> bool {
        !self.buttons.is_empty() || self.any_two_buttons_from.is_some()
    }
}
