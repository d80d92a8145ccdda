//! The trial compiler: turns a declarative trial document plus a move
//! database into a `CompiledTrial` with fully resolved per-step
//! expectations and timing windows.
//!
//! Pure and deterministic: no I/O. Deserializing the trial document and
//! move database from JSON is the caller's job (see [`crate::trial::load`]).

use serde::Deserialize;

use crate::error::{KumiteError, KumiteResult};
use crate::input::CanonicalButton;

use super::expectation::TrialStepExpectation;
use super::moves::{classify_icon, CommandToken, IconKind, Move, MoveDatabase};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectKind {
    Link,
    Cancel,
    Chain,
    Target,
}

/// The cancel sub-kind (e.g. `"dr"` for drive rush), carried verbatim. Only
/// `"dr"` changes the default window; other values are accepted but fall
/// back to the plain cancel default.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct CancelKind(pub String);

impl CancelKind {
    fn is_dr(&self) -> bool {
        self.0 == "dr"
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WindowOverrideDef {
    #[serde(default)]
    pub min: Option<i64>,
    pub max: i64,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct MoveStepDef {
    #[serde(rename = "move")]
    pub move_id: String,
    #[serde(default)]
    pub connect: Option<ConnectKind>,
    #[serde(default)]
    pub cancel_kind: Option<CancelKind>,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub window: Option<WindowOverrideDef>,
    /// Per-step override of the Stepper timeout (`stepper.timeoutFrames`).
    /// Timeline ignores this.
    #[serde(default)]
    pub stepper_timeout_frames: Option<u32>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WaitStepDef {
    pub wait: u32,
    #[serde(default)]
    pub reason: Option<String>,
}

/// A step is either a move (matched against the input stream) or a wait
/// (pure delay). The wire format has no explicit tag; the two shapes are
/// distinguished by their fields.
#[derive(Clone, Debug, Deserialize)]
#[serde(untagged)]
pub enum StepDef {
    Move(MoveStepDef),
    Wait(WaitStepDef),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineMode {
    Timeline,
    Stepper,
}

#[derive(Clone, Copy, Debug, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct StepperRulesDef {
    #[serde(default)]
    pub default_timeout_frames: Option<u32>,
    #[serde(default = "default_true")]
    pub require_release_before_reuse: bool,
    #[serde(default)]
    pub require_neutral_before_step: bool,
}

fn default_true() -> bool {
    true
}

impl Default for StepperRulesDef {
    fn default() -> Self {
        StepperRulesDef {
            default_timeout_frames: None,
            require_release_before_reuse: true,
            require_neutral_before_step: false,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct TrialRulesDef {
    #[serde(default)]
    pub default_mode: Option<EngineMode>,
    #[serde(default)]
    pub allow_mode_override: bool,
    #[serde(default)]
    pub stepper: Option<StepperRulesDef>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TrialDocument {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub notes: Option<String>,
    pub steps: Vec<StepDef>,
    #[serde(default)]
    pub rules: Option<TrialRulesDef>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WindowProvenance {
    InlineOverride,
    Default,
}

#[derive(Clone, Debug, PartialEq)]
pub struct CompiledStepWindow {
    pub min_after_prev_frames: u32,
    pub max_after_prev_frames: u32,
    pub connect: ConnectKind,
    pub cancel_kind: Option<CancelKind>,
    pub provenance: WindowProvenance,
}

#[derive(Clone, Debug, PartialEq)]
pub enum CompiledStepKind {
    Move { move_id: String, expectation: TrialStepExpectation },
    Delay { frames: u32, reason: Option<String> },
}

#[derive(Clone, Debug, PartialEq)]
pub struct CompiledTrialStep {
    pub id: String,
    pub label: String,
    pub kind: CompiledStepKind,
    /// `None` for the first step and for delay steps whose timing is
    /// carried directly on `kind`.
    pub window: Option<CompiledStepWindow>,
    /// Stepper-only per-step timeout override; `None` defers to the trial
    /// default, then `closeAfterPrevFrames`, then the 60-frame fallback.
    pub stepper_timeout_frames: Option<u32>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct CompiledTrialRules {
    pub default_mode: EngineMode,
    pub allow_mode_override: bool,
    pub stepper_default_timeout_frames: Option<u32>,
    pub stepper_require_release_before_reuse: bool,
    pub stepper_require_neutral_before_step: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct CompiledTrial {
    pub id: String,
    pub name: String,
    pub notes: Option<String>,
    pub rules: CompiledTrialRules,
    pub steps: Vec<CompiledTrialStep>,
}

/// Compile `doc` against `moves`. Pure: the same inputs always produce a
/// structurally equal `CompiledTrial`.
pub fn compile(doc: &TrialDocument, moves: &MoveDatabase) -> KumiteResult<CompiledTrial> {
    if doc.steps.is_empty() {
        return Err(KumiteError::Validation("trial has no steps".to_string()));
    }

    let rules = compile_rules(doc.rules.as_ref());
    let mut steps = Vec::with_capacity(doc.steps.len());

    for (index, step_def) in doc.steps.iter().enumerate() {
        let id = format!("s{}", index);
        match step_def {
            StepDef::Wait(wait) => {
                if index == 0 {
                    return Err(KumiteError::Validation(
                        "a wait step is not supported as the first step".to_string(),
                    ));
                }
                steps.push(CompiledTrialStep {
                    id,
                    label: wait.reason.clone().unwrap_or_else(|| "wait".to_string()),
                    kind: CompiledStepKind::Delay {
                        frames: wait.wait,
                        reason: wait.reason.clone(),
                    },
                    window: None,
                    stepper_timeout_frames: None,
                });
            }
            StepDef::Move(move_step) => {
                if index > 0 && move_step.connect.is_none() {
                    return Err(KumiteError::Validation(format!("step {} is missing connect", index)));
                }
                if move_step.cancel_kind.is_some() && move_step.connect != Some(ConnectKind::Cancel) {
                    return Err(KumiteError::Validation(format!(
                        "step {} has cancelKind without connect=cancel",
                        index
                    )));
                }
                let mv = moves
                    .find(&move_step.move_id)
                    .ok_or_else(|| KumiteError::Validation(format!("unknown move id {}", move_step.move_id)))?;
                let expectation = parse_expectation(mv)?;
                let window = if index == 0 { None } else { Some(compile_window(move_step)?) };
                let label = move_step
                    .label
                    .clone()
                    .or_else(|| mv.official.as_ref().and_then(|o| o.move_name.clone()))
                    .unwrap_or_else(|| move_step.move_id.clone());
                steps.push(CompiledTrialStep {
                    id,
                    label,
                    kind: CompiledStepKind::Move {
                        move_id: move_step.move_id.clone(),
                        expectation,
                    },
                    window,
                    stepper_timeout_frames: move_step.stepper_timeout_frames,
                });
            }
        }
    }

    Ok(CompiledTrial {
        id: doc.id.clone(),
        name: doc.name.clone(),
        notes: doc.notes.clone(),
        rules,
        steps,
    })
}

fn compile_rules(rules: Option<&TrialRulesDef>) -> CompiledTrialRules {
    let stepper = rules.and_then(|r| r.stepper.clone()).unwrap_or_default();
    CompiledTrialRules {
        default_mode: rules.and_then(|r| r.default_mode).unwrap_or(EngineMode::Timeline),
        allow_mode_override: rules.map_or(false, |r| r.allow_mode_override),
        stepper_default_timeout_frames: stepper.default_timeout_frames,
        stepper_require_release_before_reuse: stepper.require_release_before_reuse,
        stepper_require_neutral_before_step: stepper.require_neutral_before_step,
    }
}

fn compile_window(step: &MoveStepDef) -> KumiteResult<CompiledStepWindow> {
    let connect = step.connect.expect("non-first move steps always carry connect");
    let is_dr = step.cancel_kind.as_ref().map_or(false, CancelKind::is_dr);
    let default_max: i64 = match connect {
        ConnectKind::Link => 24,
        ConnectKind::Cancel => {
            if is_dr {
                12
            } else {
                40
            }
        }
        ConnectKind::Chain => 20,
        ConnectKind::Target => 20,
    };

    let (min, max, provenance) = match &step.window {
        Some(w) => {
            let min = w.min.unwrap_or(0);
            if w.max < min {
                return Err(KumiteError::Validation("window.max < window.min".to_string()));
            }
            (min, w.max, WindowProvenance::InlineOverride)
        }
        None => (0, default_max, WindowProvenance::Default),
    };

    Ok(CompiledStepWindow {
        min_after_prev_frames: min as u32,
        max_after_prev_frames: max as u32,
        connect,
        cancel_kind: step.cancel_kind.clone(),
        provenance,
    })
}

/// Slice the token list from the last continuation icon (`arrow_3.png`)
/// onward; everything before it is notation prefix, not the executable
/// input.
fn relevant_tokens(tokens: &[CommandToken]) -> &[CommandToken] {
    let last_continuation = tokens.iter().rposition(|t| match t {
        CommandToken::Icon { file } => classify_icon(file) == IconKind::Continuation,
        CommandToken::Text { .. } => false,
    });
    match last_continuation {
        Some(idx) => &tokens[idx + 1..],
        None => tokens,
    }
}

fn motion_from_directions(directions: &[u8]) -> Option<crate::input::MotionCode> {
    use crate::input::MotionCode;
    match directions {
        [2, 3, 6] => Some(MotionCode::M236),
        [2, 1, 4] => Some(MotionCode::M214),
        [6, 2, 3] => Some(MotionCode::M623),
        [2, 2] => Some(MotionCode::M22),
        _ => None,
    }
}

fn parse_expectation(mv: &Move) -> KumiteResult<TrialStepExpectation> {
    let tokens = relevant_tokens(&mv.command.tokens);
    let icons: Vec<IconKind> = tokens
        .iter()
        .filter_map(|t| match t {
            CommandToken::Icon { file } => Some(classify_icon(file)),
            CommandToken::Text { .. } => None,
        })
        .collect();

    let directions: Vec<u8> = icons
        .iter()
        .filter_map(|k| if let IconKind::Direction(d) = k { Some(*d) } else { None })
        .collect();
    let specific_buttons: Vec<CanonicalButton> = icons
        .iter()
        .filter_map(|k| if let IconKind::Button(b) = k { Some(*b) } else { None })
        .collect();
    let generic_punch = icons.iter().filter(|k| matches!(k, IconKind::GenericPunch)).count();
    let generic_kick = icons.iter().filter(|k| matches!(k, IconKind::GenericKick)).count();

    if !specific_buttons.is_empty() && (generic_punch > 0 || generic_kick > 0) {
        return Err(KumiteError::Validation(format!(
            "move {} mixes specific and generic button icons",
            mv.id
        )));
    }
    if generic_punch > 0 && generic_kick > 0 {
        return Err(KumiteError::Validation(format!(
            "move {} mixes generic punch and generic kick icons",
            mv.id
        )));
    }
    if generic_punch == 1 || generic_kick == 1 {
        return Err(KumiteError::Validation(format!(
            "move {} has a single generic button icon with no derivable expectation",
            mv.id
        )));
    }

    let motion = motion_from_directions(&directions);
    if motion.is_none() && directions.len() > 1 {
        return Err(KumiteError::Validation(format!(
            "move {} has an unrecognized multi-direction sequence",
            mv.id
        )));
    }
    let direction = if motion.is_none() && directions.len() == 1 {
        Some(directions[0])
    } else {
        None
    };

    let mut buttons = Vec::new();
    let mut any_two_buttons_from = None;
    if !specific_buttons.is_empty() {
        for b in specific_buttons {
            if !buttons.contains(&b) {
                buttons.push(b);
            }
        }
    } else if generic_punch >= 2 {
        any_two_buttons_from = Some(vec![CanonicalButton::Lp, CanonicalButton::Mp, CanonicalButton::Hp]);
    } else if generic_kick >= 2 {
        any_two_buttons_from = Some(vec![CanonicalButton::Lk, CanonicalButton::Mk, CanonicalButton::Hk]);
    }

    if motion.is_none() && direction.is_none() && buttons.is_empty() && any_two_buttons_from.is_none() {
        return Err(KumiteError::Validation(format!("move {} has no derivable expectation", mv.id)));
    }

    let simultaneous_within_frames = if motion.is_some() && (!buttons.is_empty() || any_two_buttons_from.is_some()) {
        Some(2)
    } else if buttons.len() > 1 {
        Some(2)
    } else {
        None
    };

    Ok(TrialStepExpectation {
        direction,
        motion,
        buttons,
        any_two_buttons_from,
        simultaneous_within_frames,
    })
}
