//! The engine factory: picks Timeline or Stepper and builds it against a
//! validated trial.

use std::rc::Rc;

use log::{info, warn};

use crate::error::{KumiteError, KumiteResult};
use crate::input::{DirectionMode, InputFrame};
use crate::settings::EngineSettings;

use super::assessment::TrialEngineSnapshot;
use super::compiler::{compile, CompiledTrial, EngineMode, TrialDocument};
use super::moves::MoveDatabase;
use super::stepper::StepperEngine;
use super::timeline::TimelineEngine;

/// Either engine variant, advanced identically by the host. Carrying the
/// mode as a tagged enum (rather than a trait object) keeps `advance` and
/// `reset` monomorphic and matches the rest of the crate's sum-type style.
pub enum TrialEngine {
    Timeline(TimelineEngine),
    Stepper(StepperEngine),
}

impl TrialEngine {
    pub fn advance(&mut self, frame: &InputFrame) -> TrialEngineSnapshot {
        match self {
            TrialEngine::Timeline(e) => e.advance(frame),
            TrialEngine::Stepper(e) => e.advance(frame),
        }
    }

    /// Restore all mutable state: assessments to pending, event log
    /// cleared, frame counter and start frame reset to none. Total;
    /// idempotent when already reset.
    pub fn reset(&mut self) {
        match self {
            TrialEngine::Timeline(e) => e.reset(),
            TrialEngine::Stepper(e) => e.reset(),
        }
    }

    pub fn mode(&self) -> EngineMode {
        match self {
            TrialEngine::Timeline(_) => EngineMode::Timeline,
            TrialEngine::Stepper(_) => EngineMode::Stepper,
        }
    }
}

/// Resolve the mode to build: explicit override (only honored if the
/// trial's rules allow it) beats the trial's own default, which beats
/// `EngineMode::Timeline`. The compiler already defaults an absent
/// `rules.defaultMode` to `Timeline`, so the third tier is really just
/// documentation of that fallback.
fn resolve_mode(trial: &CompiledTrial, mode_override: Option<EngineMode>) -> EngineMode {
    match mode_override {
        Some(m) if trial.rules.allow_mode_override => m,
        Some(_) | None => trial.rules.default_mode,
    }
}

/// Compile `doc` against `moves` and build the resolved engine in one step.
/// Compilation failures are logged at `warn` before propagating.
pub fn build_from_document(
    doc: &TrialDocument,
    moves: &MoveDatabase,
    mode_override: Option<EngineMode>,
    settings: EngineSettings,
    direction_mode: DirectionMode,
) -> KumiteResult<TrialEngine> {
    let compiled = compile(doc, moves).map_err(|e| {
        warn!("trial {} failed validation: {}", doc.id, e);
        e
    })?;
    Ok(build(Rc::new(compiled), mode_override, settings, direction_mode))
}

/// Build an engine from an already-compiled, already-validated trial.
pub fn build(
    trial: Rc<CompiledTrial>,
    mode_override: Option<EngineMode>,
    settings: EngineSettings,
    direction_mode: DirectionMode,
) -> TrialEngine {
    let mode = resolve_mode(&trial, mode_override);
    info!(
        "engine factory: trial {} resolved to {:?} mode, {} step(s)",
        trial.id,
        mode,
        trial.steps.len()
    );
    match mode {
        EngineMode::Timeline => TrialEngine::Timeline(TimelineEngine::new(trial, settings, direction_mode)),
        EngineMode::Stepper => TrialEngine::Stepper(StepperEngine::new(trial, settings, direction_mode)),
    }
}

/// Convenience used by hosts that keep the raw JSON around; mirrors
/// `build_from_document` but takes wire bytes directly.
pub fn build_from_json(
    trial_json: &str,
    moves_json: &str,
    mode_override: Option<EngineMode>,
    settings: EngineSettings,
    direction_mode: DirectionMode,
) -> KumiteResult<TrialEngine> {
    let doc: TrialDocument = serde_json::from_str(trial_json).map_err(KumiteError::from)?;
    let moves: MoveDatabase = serde_json::from_str(moves_json).map_err(KumiteError::from)?;
    build_from_document(&doc, &moves, mode_override, settings, direction_mode)
}
