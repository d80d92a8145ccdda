//! Direction mirroring for right-side play.

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DirectionMode {
    Normal,
    Mirrored,
}

/// Involution on the 1..9 numpad directions: swaps (1,3), (4,6), (7,9);
/// fixes 2, 5, 8.
pub fn mirror_direction(direction: u8) -> u8 {
    match direction {
        1 => 3,
        3 => 1,
        4 => 6,
        6 => 4,
        7 => 9,
        9 => 7,
        other => other,
    }
}

/// Applies `mode` to `direction`; held buttons are untouched by the mirror.
pub fn apply_direction_mode(direction: u8, mode: DirectionMode) -> u8 {
    match mode {
        DirectionMode::Normal => direction,
        DirectionMode::Mirrored => mirror_direction(direction),
    }
}
