//! The input pipeline: per-frame snapshot to differential frame to
//! compressed history, plus the mirror and motion detector that sit on top
//! of it.

pub mod buttons;
pub mod history;
pub mod mirror;
pub mod motion;
pub mod reset_combo;
pub mod snapshot;

pub use buttons::{
    canonical_members, default_bindings, map_physical_to_canonical, physical_members, AttackAction, ButtonBindings,
    CanonicalButton, CanonicalButtons, PhysicalButton, PhysicalButtons, ALL_ATTACK_ACTIONS,
};
pub use history::{InputHistory, InputHistoryEntry};
pub use mirror::{apply_direction_mode, mirror_direction, DirectionMode};
pub use motion::{detect as detect_motion, MotionCode, MotionMatch};
pub use reset_combo::ResetComboDetector;
pub use snapshot::{build_frame, InputFrame, InputSnapshot, NEUTRAL_DIRECTION};
