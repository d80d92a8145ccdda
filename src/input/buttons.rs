//! Canonical/physical button sets, attack actions, and the button mapping
//! between them.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// The six attack buttons, in canonical enumeration order.
    #[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default)]
    pub struct CanonicalButtons: u8 {
        const LP = 0b0000_0001;
        const MP = 0b0000_0010;
        const HP = 0b0000_0100;
        const LK = 0b0000_1000;
        const MK = 0b0001_0000;
        const HK = 0b0010_0000;
    }
}

/// Enumeration order used for sorting and display, matching [`CanonicalButtons`].
pub const CANONICAL_BUTTON_ORDER: [CanonicalButton; 6] = [
    CanonicalButton::Lp,
    CanonicalButton::Mp,
    CanonicalButton::Hp,
    CanonicalButton::Lk,
    CanonicalButton::Mk,
    CanonicalButton::Hk,
];

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum CanonicalButton {
    Lp,
    Mp,
    Hp,
    Lk,
    Mk,
    Hk,
}

impl CanonicalButton {
    pub fn flag(self) -> CanonicalButtons {
        match self {
            CanonicalButton::Lp => CanonicalButtons::LP,
            CanonicalButton::Mp => CanonicalButtons::MP,
            CanonicalButton::Hp => CanonicalButtons::HP,
            CanonicalButton::Lk => CanonicalButtons::LK,
            CanonicalButton::Mk => CanonicalButtons::MK,
            CanonicalButton::Hk => CanonicalButtons::HK,
        }
    }
}

/// Returns the members of `set`, sorted by [`CANONICAL_BUTTON_ORDER`].
pub fn canonical_members(set: CanonicalButtons) -> Vec<CanonicalButton> {
    CANONICAL_BUTTON_ORDER
        .iter()
        .copied()
        .filter(|b| set.contains(b.flag()))
        .collect()
}

bitflags! {
    /// The 16-entry physical controller enumeration.
    #[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default)]
    pub struct PhysicalButtons: u16 {
        const FACE_NORTH  = 0b0000_0000_0000_0001;
        const FACE_SOUTH  = 0b0000_0000_0000_0010;
        const FACE_EAST   = 0b0000_0000_0000_0100;
        const FACE_WEST   = 0b0000_0000_0000_1000;
        const L1          = 0b0000_0000_0001_0000;
        const R1          = 0b0000_0000_0010_0000;
        const L2          = 0b0000_0000_0100_0000;
        const R2          = 0b0000_0000_1000_0000;
        const THUMB_L     = 0b0000_0001_0000_0000;
        const THUMB_R     = 0b0000_0010_0000_0000;
        const DPAD_UP     = 0b0000_0100_0000_0000;
        const DPAD_DOWN   = 0b0000_1000_0000_0000;
        const DPAD_LEFT   = 0b0001_0000_0000_0000;
        const DPAD_RIGHT  = 0b0010_0000_0000_0000;
        const SELECT      = 0b0100_0000_0000_0000;
        const START       = 0b1000_0000_0000_0000;
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PhysicalButton {
    FaceNorth,
    FaceSouth,
    FaceEast,
    FaceWest,
    L1,
    R1,
    L2,
    R2,
    ThumbL,
    ThumbR,
    DpadUp,
    DpadDown,
    DpadLeft,
    DpadRight,
    Select,
    Start,
}

pub const PHYSICAL_BUTTON_ORDER: [PhysicalButton; 16] = [
    PhysicalButton::FaceNorth,
    PhysicalButton::FaceSouth,
    PhysicalButton::FaceEast,
    PhysicalButton::FaceWest,
    PhysicalButton::L1,
    PhysicalButton::R1,
    PhysicalButton::L2,
    PhysicalButton::R2,
    PhysicalButton::ThumbL,
    PhysicalButton::ThumbR,
    PhysicalButton::DpadUp,
    PhysicalButton::DpadDown,
    PhysicalButton::DpadLeft,
    PhysicalButton::DpadRight,
    PhysicalButton::Select,
    PhysicalButton::Start,
];

impl PhysicalButton {
    pub fn flag(self) -> PhysicalButtons {
        match self {
            PhysicalButton::FaceNorth => PhysicalButtons::FACE_NORTH,
            PhysicalButton::FaceSouth => PhysicalButtons::FACE_SOUTH,
            PhysicalButton::FaceEast => PhysicalButtons::FACE_EAST,
            PhysicalButton::FaceWest => PhysicalButtons::FACE_WEST,
            PhysicalButton::L1 => PhysicalButtons::L1,
            PhysicalButton::R1 => PhysicalButtons::R1,
            PhysicalButton::L2 => PhysicalButtons::L2,
            PhysicalButton::R2 => PhysicalButtons::R2,
            PhysicalButton::ThumbL => PhysicalButtons::THUMB_L,
            PhysicalButton::ThumbR => PhysicalButtons::THUMB_R,
            PhysicalButton::DpadUp => PhysicalButtons::DPAD_UP,
            PhysicalButton::DpadDown => PhysicalButtons::DPAD_DOWN,
            PhysicalButton::DpadLeft => PhysicalButtons::DPAD_LEFT,
            PhysicalButton::DpadRight => PhysicalButtons::DPAD_RIGHT,
            PhysicalButton::Select => PhysicalButtons::SELECT,
            PhysicalButton::Start => PhysicalButtons::START,
        }
    }
}

pub fn physical_members(set: PhysicalButtons) -> Vec<PhysicalButton> {
    PHYSICAL_BUTTON_ORDER
        .iter()
        .copied()
        .filter(|b| set.contains(b.flag()))
        .collect()
}

/// The 17 attack actions: six singles, three same-column pairs, two
/// same-type triples, and six cross pairs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AttackAction {
    Lp,
    Mp,
    Hp,
    Lk,
    Mk,
    Hk,
    LpLk,
    MpMk,
    HpHk,
    LpMpHp,
    LkMkHk,
    LpHk,
    HpLk,
    MpHk,
    HpMk,
    LpMk,
    MpLk,
}

pub const ALL_ATTACK_ACTIONS: [AttackAction; 17] = [
    AttackAction::Lp,
    AttackAction::Mp,
    AttackAction::Hp,
    AttackAction::Lk,
    AttackAction::Mk,
    AttackAction::Hk,
    AttackAction::LpLk,
    AttackAction::MpMk,
    AttackAction::HpHk,
    AttackAction::LpMpHp,
    AttackAction::LkMkHk,
    AttackAction::LpHk,
    AttackAction::HpLk,
    AttackAction::MpHk,
    AttackAction::HpMk,
    AttackAction::LpMk,
    AttackAction::MpLk,
];

impl AttackAction {
    /// The canonical buttons this action resolves to when held.
    pub fn canonical_buttons(self) -> CanonicalButtons {
        use CanonicalButtons as C;
        match self {
            AttackAction::Lp => C::LP,
            AttackAction::Mp => C::MP,
            AttackAction::Hp => C::HP,
            AttackAction::Lk => C::LK,
            AttackAction::Mk => C::MK,
            AttackAction::Hk => C::HK,
            AttackAction::LpLk => C::LP | C::LK,
            AttackAction::MpMk => C::MP | C::MK,
            AttackAction::HpHk => C::HP | C::HK,
            AttackAction::LpMpHp => C::LP | C::MP | C::HP,
            AttackAction::LkMkHk => C::LK | C::MK | C::HK,
            AttackAction::LpHk => C::LP | C::HK,
            AttackAction::HpLk => C::HP | C::LK,
            AttackAction::MpHk => C::MP | C::HK,
            AttackAction::HpMk => C::HP | C::MK,
            AttackAction::LpMk => C::LP | C::MK,
            AttackAction::MpLk => C::MP | C::LK,
        }
    }
}

/// Mapping from [`AttackAction`] to an optional bound [`PhysicalButton`].
///
/// Invariant: no `PhysicalButton` is referenced by more than one action.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct ButtonBindings {
    bindings: [Option<PhysicalButton>; 17],
}

fn action_index(action: AttackAction) -> usize {
    ALL_ATTACK_ACTIONS
        .iter()
        .position(|a| *a == action)
        .expect("AttackAction is always present in ALL_ATTACK_ACTIONS")
}

impl ButtonBindings {
    pub fn get(&self, action: AttackAction) -> Option<PhysicalButton> {
        self.bindings[action_index(action)]
    }

    fn set_raw(&mut self, action: AttackAction, physical: Option<PhysicalButton>) {
        self.bindings[action_index(action)] = physical;
    }

    /// Bind `action` to `physical`, clearing any other action that
    /// previously owned the same physical button. Passing `None` unbinds
    /// `action` without touching anyone else's binding.
    pub fn set_binding(&self, action: AttackAction, physical: Option<PhysicalButton>) -> ButtonBindings {
        let mut next = self.clone();
        if let Some(p) = physical {
            for other in ALL_ATTACK_ACTIONS {
                if other != action && next.get(other) == Some(p) {
                    next.set_raw(other, None);
                }
            }
        }
        next.set_raw(action, physical);
        next
    }
}

/// The initial mapping used when no user preference exists: each of the six
/// singles bound to one face/shoulder button, combo actions left unbound so
/// a player opts into macro buttons explicitly.
pub fn default_bindings() -> ButtonBindings {
    let mut b = ButtonBindings::default();
    b = b.set_binding(AttackAction::Lp, Some(PhysicalButton::FaceWest));
    b = b.set_binding(AttackAction::Mp, Some(PhysicalButton::FaceNorth));
    b = b.set_binding(AttackAction::Hp, Some(PhysicalButton::R1));
    b = b.set_binding(AttackAction::Lk, Some(PhysicalButton::FaceSouth));
    b = b.set_binding(AttackAction::Mk, Some(PhysicalButton::FaceEast));
    b = b.set_binding(AttackAction::Hk, Some(PhysicalButton::R2));
    b
}

/// Translate a held physical-button set into the canonical buttons it
/// expands to under `bindings`. This is the only place multi-button aliases
/// are introduced; everything downstream just sees a `CanonicalButtons` set.
pub fn map_physical_to_canonical(held_physical: PhysicalButtons, bindings: &ButtonBindings) -> CanonicalButtons {
    let mut out = CanonicalButtons::empty();
    for action in ALL_ATTACK_ACTIONS {
        if let Some(physical) = bindings.get(action) {
            if held_physical.contains(physical.flag()) {
                out |= action.canonical_buttons();
            }
        }
    }
    out
}
