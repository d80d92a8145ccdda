//! Move database wire format consumed by the trial compiler.

use serde::Deserialize;

use crate::input::CanonicalButton;

/// An ordered list of moves, keyed by `id` at lookup time.
#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MoveDatabase {
    pub moves: Vec<Move>,
}

impl MoveDatabase {
    pub fn find(&self, id: &str) -> Option<&Move> {
        self.moves.iter().find(|m| m.id == id)
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Move {
    pub id: String,
    #[serde(default)]
    pub official: Option<OfficialInfo>,
    pub command: Command,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct OfficialInfo {
    #[serde(default)]
    pub move_name: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Command {
    pub tokens: Vec<CommandToken>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase", deny_unknown_fields)]
pub enum CommandToken {
    Text { value: String },
    Icon { file: String },
}

/// What a single icon token means once classified against the fixed icon
/// vocabulary.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IconKind {
    Direction(u8),
    Button(CanonicalButton),
    GenericPunch,
    GenericKick,
    /// `arrow_3.png`: everything before the last one is prefix notation,
    /// not part of the executable command.
    Continuation,
    /// `key-or.png`: disjunction between two generic icons.
    Or,
    Other,
}

pub fn classify_icon(file: &str) -> IconKind {
    match file {
        "icon_punch_l.png" => IconKind::Button(CanonicalButton::Lp),
        "icon_punch_m.png" => IconKind::Button(CanonicalButton::Mp),
        "icon_punch_h.png" => IconKind::Button(CanonicalButton::Hp),
        "icon_kick_l.png" => IconKind::Button(CanonicalButton::Lk),
        "icon_kick_m.png" => IconKind::Button(CanonicalButton::Mk),
        "icon_kick_h.png" => IconKind::Button(CanonicalButton::Hk),
        "icon_punch.png" => IconKind::GenericPunch,
        "icon_kick.png" => IconKind::GenericKick,
        "arrow_3.png" => IconKind::Continuation,
        "key-or.png" => IconKind::Or,
        other => parse_direction_icon(other).map(IconKind::Direction).unwrap_or(IconKind::Other),
    }
}

/// Direction icons follow `icon_dir_<1..9>.png`; anything else with a
/// trailing 1-9 digit before `.png` is accepted too, since the pack's move
/// databases are not consistent about the prefix.
fn parse_direction_icon(file: &str) -> Option<u8> {
    let stem = file.strip_suffix(".png")?;
    let digits = stem.rsplit('_').next().unwrap_or(stem);
    digits.parse::<u8>().ok().filter(|d| (1..=9).contains(d))
}
