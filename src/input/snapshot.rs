//! Per-frame snapshot and the input frame builder.

use super::buttons::{CanonicalButton, CanonicalButtons, PhysicalButton, PhysicalButtons, canonical_members, physical_members};
use crate::error::{KumiteError, KumiteResult};

pub const NEUTRAL_DIRECTION: u8 = 5;

/// Already-resolved per-frame state handed to the frame builder. The caller
/// is responsible for running C2 (`map_physical_to_canonical`) before
/// constructing this: `canonical_down` is the result, not raw controller
/// state.
#[derive(Clone, Debug, PartialEq)]
pub struct InputSnapshot {
    pub timestamp_ms: f64,
    pub direction: u8,
    pub physical_down: Vec<PhysicalButton>,
    pub canonical_down: Vec<CanonicalButton>,
}

impl InputSnapshot {
    pub fn new(timestamp_ms: f64, direction: u8, physical_down: Vec<PhysicalButton>, canonical_down: Vec<CanonicalButton>) -> Self {
        InputSnapshot {
            timestamp_ms,
            direction,
            physical_down,
            canonical_down,
        }
    }

    fn physical_set(&self) -> KumiteResult<PhysicalButtons> {
        to_unique_set(&self.physical_down, |b| b.flag())
    }

    fn canonical_set(&self) -> KumiteResult<CanonicalButtons> {
        to_unique_set(&self.canonical_down, |b| b.flag())
    }
}

fn to_unique_set<T: Copy + PartialEq, F: Fn(T) -> B, B: std::ops::BitOr<Output = B> + Default>(
    items: &[T],
    flag: F,
) -> KumiteResult<B> {
    for (i, a) in items.iter().enumerate() {
        for b in &items[i + 1..] {
            if a == b {
                return Err(KumiteError::Invariant(
                    "duplicate entry in input snapshot".to_string(),
                ));
            }
        }
    }
    Ok(items.iter().fold(B::default(), |acc, &x| acc | flag(x)))
}

/// An immutable, differentiated frame: what's held, and what changed since
/// the previous frame. Equality is by frame index.
#[derive(Clone, Debug)]
pub struct InputFrame {
    pub frame: u32,
    pub timestamp_ms: f64,
    pub direction: u8,
    pub canonical_down: CanonicalButtons,
    pub canonical_pressed: CanonicalButtons,
    pub canonical_released: CanonicalButtons,
    pub physical_down: PhysicalButtons,
    pub physical_pressed: PhysicalButtons,
    pub physical_released: PhysicalButtons,
}

impl PartialEq for InputFrame {
    fn eq(&self, other: &Self) -> bool {
        self.frame == other.frame
    }
}
impl Eq for InputFrame {}

impl InputFrame {
    pub fn canonical_down_sorted(&self) -> Vec<CanonicalButton> {
        canonical_members(self.canonical_down)
    }

    pub fn physical_down_sorted(&self) -> Vec<PhysicalButton> {
        physical_members(self.physical_down)
    }

    pub fn is_neutral(&self) -> bool {
        self.direction == NEUTRAL_DIRECTION && self.canonical_down.is_empty()
    }
}

/// Build the next `InputFrame` from a new snapshot and the previous frame
/// (if any). Total except for a duplicate-entry invariant violation in the
/// snapshot's held sets.
pub fn build_frame(frame: u32, prev: Option<&InputFrame>, snapshot: &InputSnapshot) -> KumiteResult<InputFrame> {
    let canonical_down = snapshot.canonical_set()?;
    let physical_down = snapshot.physical_set()?;

    let (prev_canonical, prev_physical) = match prev {
        Some(p) => (p.canonical_down, p.physical_down),
        None => (CanonicalButtons::empty(), PhysicalButtons::empty()),
    };

    Ok(InputFrame {
        frame,
        timestamp_ms: snapshot.timestamp_ms,
        direction: snapshot.direction,
        canonical_down,
        canonical_pressed: canonical_down & !prev_canonical,
        canonical_released: prev_canonical & !canonical_down,
        physical_down,
        physical_pressed: physical_down & !prev_physical,
        physical_released: prev_physical & !physical_down,
    })
}
