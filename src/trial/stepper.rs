//! The Stepper engine: a step state machine driven by timeouts, release
//! gates, and retry semantics.

use std::collections::VecDeque;
use std::rc::Rc;

use log::{debug, info};

use crate::input::{apply_direction_mode, DirectionMode, InputFrame, NEUTRAL_DIRECTION};
use crate::settings::EngineSettings;

use super::assessment::{
    EventLog, ModeEvent, ModeEventType, StepAssessment, StepResult, TrialEngineSnapshot, TrialStatus, WindowBounds,
};
use super::compiler::{CompiledStepKind, CompiledTrial, CompiledTrialStep, EngineMode};
use super::expectation::TrialStepExpectation;
use super::matcher::{self, MatcherSettings};

pub struct StepperEngine {
    trial: Rc<CompiledTrial>,
    settings: EngineSettings,
    direction_mode: DirectionMode,
    history: VecDeque<InputFrame>,
    start_frame: Option<u32>,
    current_step_index: usize,
    status: TrialStatus,
    last_matched_input_frame: Option<u32>,
    assessments: Vec<StepAssessment>,
    events: EventLog,
    current_window: Option<WindowBounds>,

    step_start_frame: Option<u32>,
    release_gate_satisfied: bool,
    neutral_observed: bool,
    last_resolved_for_current_step: Option<u32>,
    /// The expectation of the step that preceded the current one, fixed at
    /// step-entry time; used to re-derive the release gate on retry without
    /// mistaking the current step for its own predecessor.
    previous_step_expectation: Option<TrialStepExpectation>,
}

impl StepperEngine {
    pub fn new(trial: Rc<CompiledTrial>, settings: EngineSettings, direction_mode: DirectionMode) -> Self {
        let assessments = trial
            .steps
            .iter()
            .enumerate()
            .map(|(i, s)| StepAssessment::pending(i, s.id.clone()))
            .collect();
        info!("stepper engine built: {} step(s)", trial.steps.len());
        StepperEngine {
            trial,
            settings,
            direction_mode,
            history: VecDeque::new(),
            start_frame: None,
            current_step_index: 0,
            status: TrialStatus::Running,
            last_matched_input_frame: None,
            assessments,
            events: EventLog::default(),
            current_window: None,
            step_start_frame: None,
            release_gate_satisfied: true,
            neutral_observed: false,
            last_resolved_for_current_step: None,
            previous_step_expectation: None,
        }
    }

    pub fn reset(&mut self) {
        self.history.clear();
        self.start_frame = None;
        self.current_step_index = 0;
        self.status = TrialStatus::Running;
        self.last_matched_input_frame = None;
        self.assessments = self
            .trial
            .steps
            .iter()
            .enumerate()
            .map(|(i, s)| StepAssessment::pending(i, s.id.clone()))
            .collect();
        self.events.clear();
        self.current_window = None;
        self.step_start_frame = None;
        self.release_gate_satisfied = true;
        self.neutral_observed = false;
        self.last_resolved_for_current_step = None;
        self.previous_step_expectation = None;
    }

    fn matcher_settings(&self) -> MatcherSettings {
        MatcherSettings {
            motion_max_window_frames: self.settings.motion.max_window_frames,
            motion_to_button_gap_frames: self.settings.motion.motion_to_button_gap_frames,
        }
    }

    fn current_step(&self) -> Option<&CompiledTrialStep> {
        self.trial.steps.get(self.current_step_index)
    }

    fn current_step_expectation(&self) -> Option<&TrialStepExpectation> {
        match &self.current_step()?.kind {
            CompiledStepKind::Move { expectation, .. } => Some(expectation),
            CompiledStepKind::Delay { .. } => None,
        }
    }

    /// `stepper.timeoutFrames` on step ≫ trial default ≫ `closeAfterPrevFrames` ≫ 60.
    fn timeout_for_current_step(&self) -> u32 {
        let step = match self.current_step() {
            Some(s) => s,
            None => return self.settings.stepper.default_timeout_frames,
        };
        step.stepper_timeout_frames
            .or(self.trial.rules.stepper_default_timeout_frames)
            .or(step.window.as_ref().map(|w| w.max_after_prev_frames))
            .unwrap_or(self.settings.stepper.default_timeout_frames)
    }

    /// Configure the release/neutral gates for whichever step is now current.
    /// `previous_expectation` is fixed at the call site: the step that
    /// immediately preceded this one, not recomputed from `current_step`
    /// (which would be wrong on a same-step retry).
    fn configure_gates_for_step_entry(&mut self, previous_expectation: Option<TrialStepExpectation>) {
        let needs_release_gate = self.trial.rules.stepper_require_release_before_reuse
            && self
                .current_step_expectation()
                .map(|e| e.requires_buttons())
                .unwrap_or(false)
            && previous_expectation
                .as_ref()
                .map(|prev| buttons_overlap(prev, self.current_step_expectation()))
                .unwrap_or(false);
        self.release_gate_satisfied = !needs_release_gate;
        self.neutral_observed = false;
        self.previous_step_expectation = previous_expectation;
    }

    pub fn advance(&mut self, frame: &InputFrame) -> TrialEngineSnapshot {
        let mut mirrored = frame.clone();
        mirrored.direction = apply_direction_mode(frame.direction, self.direction_mode);

        self.history.push_back(mirrored.clone());
        while self.history.len() > self.settings.history.timeline_cap_frames {
            self.history.pop_front();
        }

        if mirrored.direction == NEUTRAL_DIRECTION && mirrored.canonical_down.is_empty() {
            self.neutral_observed = true;
        }
        if !self.release_gate_satisfied {
            let expectation = self.current_step_expectation();
            let none_held = expectation
                .map(|e| !buttons_currently_held(e, &mirrored))
                .unwrap_or(true);
            if none_held {
                self.release_gate_satisfied = true;
            }
        }

        if self.start_frame.is_none() {
            let first_expectation = self.current_step_expectation().cloned();
            let starts = first_expectation
                .as_ref()
                .map(|e| matcher::should_start_trial(e, &mirrored))
                .unwrap_or(false);
            if starts {
                self.start_frame = Some(mirrored.frame);
                self.step_start_frame = Some(mirrored.frame);
                self.configure_gates_for_step_entry(None);
            } else {
                return self.snapshot(mirrored.frame);
            }
        }

        if self.status == TrialStatus::Running {
            self.resolve_current_step(&mirrored);
        }

        if self.current_step_index == self.trial.steps.len() && self.status != TrialStatus::Success {
            self.status = TrialStatus::Success;
            let frame_no = mirrored.frame;
            info!("stepper trial {} completed at frame {}", self.trial.id, frame_no);
            self.events.push(ModeEvent {
                event_type: ModeEventType::Success,
                mode: EngineMode::Stepper,
                frame: frame_no,
                step_index: self.trial.steps.len().saturating_sub(1),
                step_id: self.trial.steps.last().map(|s| s.id.clone()).unwrap_or_default(),
                message: "trial complete".to_string(),
            });
        }

        self.snapshot(mirrored.frame)
    }

    fn resolve_current_step(&mut self, mirrored: &InputFrame) {
        let step_index = self.current_step_index;
        let step_start = self.step_start_frame.unwrap_or(mirrored.frame);
        let step = match self.current_step() {
            Some(s) => s.clone(),
            None => return,
        };

        match &step.kind {
            CompiledStepKind::Delay { frames, .. } => {
                let target = step_start + frames;
                self.current_window = Some(WindowBounds { open: target, close: target });
                if mirrored.frame >= target {
                    self.complete_current_step(step_index, &step, target);
                }
                return;
            }
            CompiledStepKind::Move { .. } => {}
        }

        let timeout = self.timeout_for_current_step();
        self.current_window = Some(WindowBounds {
            open: step_start,
            close: step_start + timeout,
        });

        let elapsed = mirrored.frame.saturating_sub(step_start);
        if elapsed > timeout {
            self.assessments[step_index].result = StepResult::Retried;
            self.assessments[step_index].attempts += 1;
            self.assessments[step_index].notes.push(format!("timeout ({}F)", timeout));
            debug!("stepper step {} retry at frame {} (timeout {}F)", step.id, mirrored.frame, timeout);
            self.events.push(ModeEvent {
                event_type: ModeEventType::StepRetry,
                mode: EngineMode::Stepper,
                frame: mirrored.frame,
                step_index,
                step_id: step.id.clone(),
                message: format!("timeout ({}F)", timeout),
            });
            self.step_start_frame = Some(mirrored.frame);
            self.last_resolved_for_current_step = None;
            let previous_expectation = self.previous_step_expectation.clone();
            self.configure_gates_for_step_entry(previous_expectation);
            return;
        }

        let expectation = match &step.kind {
            CompiledStepKind::Move { expectation, .. } => expectation,
            CompiledStepKind::Delay { .. } => return,
        };
        let resolved = matcher::resolve(expectation, &self.history, &self.matcher_settings());

        let Some(m) = resolved else { return };

        // Strict: a resolution from literally the step's entry frame is the
        // common "one press both opens and satisfies the step" case and must
        // count; only resolutions that predate the step's own start are stale.
        if m.input_frame < step_start {
            return;
        }
        if let Some(last) = self.last_resolved_for_current_step {
            if m.input_frame <= last {
                return;
            }
        }
        if expectation.requires_buttons() && mirrored.canonical_pressed.is_empty() {
            self.last_resolved_for_current_step = Some(m.input_frame);
            return;
        }
        if !self.release_gate_satisfied {
            return;
        }
        if self.trial.rules.stepper_require_neutral_before_step && !self.neutral_observed {
            return;
        }
        let direction_only = expectation.motion.is_none() && !expectation.requires_buttons() && expectation.direction.is_some();
        if direction_only
            && self.trial.rules.stepper_require_neutral_before_step
            && mirrored.direction != NEUTRAL_DIRECTION
        {
            let previous_direction = self.history.iter().rev().nth(1).map(|f| f.direction);
            if previous_direction != Some(NEUTRAL_DIRECTION) {
                self.last_resolved_for_current_step = Some(m.input_frame);
                return;
            }
        }

        self.complete_current_step(step_index, &step, m.input_frame);
    }

    fn complete_current_step(&mut self, step_index: usize, step: &CompiledTrialStep, actual_frame: u32) {
        self.assessments[step_index].result = StepResult::Matched;
        self.assessments[step_index].actual_frame = Some(actual_frame);
        self.assessments[step_index].target_frame = None;
        self.assessments[step_index].delta_frames = None;
        self.assessments[step_index].attempts += 1;
        debug!("stepper step {} matched at frame {}", step.id, actual_frame);
        self.events.push(ModeEvent {
            event_type: ModeEventType::StepMatched,
            mode: EngineMode::Stepper,
            frame: actual_frame,
            step_index,
            step_id: step.id.clone(),
            message: "matched".to_string(),
        });
        self.last_matched_input_frame = Some(actual_frame);

        let previous_expectation = match &step.kind {
            CompiledStepKind::Move { expectation, .. } => Some(expectation.clone()),
            CompiledStepKind::Delay { .. } => None,
        };
        self.current_step_index += 1;
        self.step_start_frame = Some(actual_frame);
        self.last_resolved_for_current_step = None;
        self.configure_gates_for_step_entry(previous_expectation);
    }

    fn snapshot(&self, current_frame: u32) -> TrialEngineSnapshot {
        TrialEngineSnapshot {
            mode: EngineMode::Stepper,
            status: self.status,
            current_step_index: self.current_step_index,
            current_frame,
            current_window: self.current_window,
            last_matched_input_frame: self.last_matched_input_frame,
            last_matched_commit_frame: self.last_matched_input_frame,
            assessments: self.assessments.clone(),
            events: self.events.to_vec(),
        }
    }
}

fn buttons_overlap(prev: &TrialStepExpectation, current: Option<&TrialStepExpectation>) -> bool {
    let current = match current {
        Some(c) => c,
        None => return false,
    };
    let prev_set: Vec<_> = prev
        .buttons
        .iter()
        .copied()
        .chain(prev.any_two_buttons_from.iter().flatten().copied())
        .collect();
    let current_set: Vec<_> = current
        .buttons
        .iter()
        .copied()
        .chain(current.any_two_buttons_from.iter().flatten().copied())
        .collect();
    prev_set.iter().any(|b| current_set.contains(b))
}

fn buttons_currently_held(expectation: &TrialStepExpectation, frame: &InputFrame) -> bool {
    let candidates: Vec<_> = expectation
        .buttons
        .iter()
        .copied()
        .chain(expectation.any_two_buttons_from.iter().flatten().copied())
        .collect();
    candidates.iter().any(|b| frame.canonical_down.contains(b.flag()))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::input::{build_frame, CanonicalButton, InputSnapshot};
    use crate::trial::compiler::{compile, MoveStepDef, StepDef, StepperRulesDef, TrialDocument, TrialRulesDef};
    use crate::trial::moves::MoveDatabase;

    fn moves() -> MoveDatabase {
        serde_json::from_str(
            r#"{"moves": [
                {"id": "mv_lp", "command": {"tokens": [{"type": "icon", "file": "icon_punch_l.png"}]}},
                {"id": "mv_mp", "command": {"tokens": [{"type": "icon", "file": "icon_punch_m.png"}]}}
            ]}"#,
        )
        .unwrap()
    }

    fn build(doc: TrialDocument, settings: EngineSettings) -> StepperEngine {
        let compiled = compile(&doc, &moves()).unwrap();
        StepperEngine::new(Rc::new(compiled), settings, DirectionMode::Normal)
    }

    fn tick(engine: &mut StepperEngine, prev: Option<&InputFrame>, n: u32, canon: Vec<CanonicalButton>) -> (InputFrame, TrialEngineSnapshot) {
        let snap = InputSnapshot::new(n as f64 / 60.0, 5, vec![], canon);
        let f = build_frame(n, prev, &snap).unwrap();
        let snapshot = engine.advance(&f);
        (f, snapshot)
    }

    #[test]
    fn release_gate_blocks_reuse_until_button_released() {
        let doc = TrialDocument {
            id: "t".to_string(),
            name: "release gate".to_string(),
            notes: None,
            steps: vec![
                StepDef::Move(MoveStepDef {
                    move_id: "mv_lp".to_string(),
                    connect: None,
                    cancel_kind: None,
                    label: None,
                    window: None,
                    stepper_timeout_frames: None,
                }),
                StepDef::Move(MoveStepDef {
                    move_id: "mv_lp".to_string(),
                    connect: Some(crate::trial::compiler::ConnectKind::Link),
                    cancel_kind: None,
                    label: None,
                    window: None,
                    stepper_timeout_frames: None,
                }),
            ],
            rules: Some(TrialRulesDef {
                default_mode: Some(EngineMode::Stepper),
                allow_mode_override: false,
                stepper: Some(StepperRulesDef::default()),
            }),
        };
        let mut engine = build(doc, EngineSettings::defaults());

        let (f0, s0) = tick(&mut engine, None, 0, vec![CanonicalButton::Lp]);
        assert_eq!(s0.assessments[0].result, StepResult::Matched);
        assert_eq!(s0.current_step_index, 1);

        // LP still held: step 1 should not match yet, release gate unsatisfied.
        let (f1, s1) = tick(&mut engine, Some(&f0), 1, vec![CanonicalButton::Lp]);
        assert_eq!(s1.assessments[1].result, StepResult::Pending);

        // release, then a fresh press
        let (f2, _) = tick(&mut engine, Some(&f1), 2, vec![]);
        let (_, s3) = tick(&mut engine, Some(&f2), 3, vec![CanonicalButton::Lp]);
        assert_eq!(s3.assessments[1].result, StepResult::Matched);
        assert_eq!(s3.status, TrialStatus::Success);
    }

    #[test]
    fn timeout_retries_then_matches() {
        let doc = TrialDocument {
            id: "t".to_string(),
            name: "timeout retry".to_string(),
            notes: None,
            steps: vec![StepDef::Move(MoveStepDef {
                move_id: "mv_mp".to_string(),
                connect: None,
                cancel_kind: None,
                label: None,
                window: None,
                stepper_timeout_frames: Some(2),
            })],
            rules: Some(TrialRulesDef {
                default_mode: Some(EngineMode::Stepper),
                allow_mode_override: false,
                stepper: None,
            }),
        };
        let mut engine = build(doc, EngineSettings::defaults());

        // wrong button starts the trial (any activity does) but never resolves mv_mp.
        let (f0, s0) = tick(&mut engine, None, 0, vec![CanonicalButton::Lp]);
        assert_eq!(s0.assessments[0].result, StepResult::Pending);

        let (f1, s1) = tick(&mut engine, Some(&f0), 1, vec![]);
        assert_eq!(s1.assessments[0].attempts, 0);

        let (f2, s2) = tick(&mut engine, Some(&f1), 2, vec![]);
        assert_eq!(s2.assessments[0].attempts, 0);

        // elapsed (3) > timeout (2) at frame 3: retry fires.
        let (f3, s3) = tick(&mut engine, Some(&f2), 3, vec![]);
        assert_eq!(s3.assessments[0].result, StepResult::Retried);
        assert_eq!(s3.assessments[0].attempts, 1);

        let (_, s4) = tick(&mut engine, Some(&f3), 4, vec![CanonicalButton::Mp]);
        assert_eq!(s4.assessments[0].result, StepResult::Matched);
        assert_eq!(s4.status, TrialStatus::Success);
    }

    #[test]
    fn no_activity_never_starts_the_trial() {
        let doc = TrialDocument {
            id: "t".to_string(),
            name: "idle".to_string(),
            notes: None,
            steps: vec![StepDef::Move(MoveStepDef {
                move_id: "mv_mp".to_string(),
                connect: None,
                cancel_kind: None,
                label: None,
                window: None,
                stepper_timeout_frames: Some(2),
            })],
            rules: Some(TrialRulesDef {
                default_mode: Some(EngineMode::Stepper),
                allow_mode_override: false,
                stepper: None,
            }),
        };
        let mut engine = build(doc, EngineSettings::defaults());

        let (_, s0) = tick(&mut engine, None, 0, vec![]);
        assert_eq!(s0.assessments[0].result, StepResult::Pending);
        assert_eq!(engine.start_frame, None);
    }

    #[test]
    fn never_emits_missed() {
        let doc = TrialDocument {
            id: "t".to_string(),
            name: "no miss".to_string(),
            notes: None,
            steps: vec![StepDef::Move(MoveStepDef {
                move_id: "mv_mp".to_string(),
                connect: None,
                cancel_kind: None,
                label: None,
                window: None,
                stepper_timeout_frames: Some(1),
            })],
            rules: Some(TrialRulesDef {
                default_mode: Some(EngineMode::Stepper),
                allow_mode_override: false,
                stepper: None,
            }),
        };
        let mut engine = build(doc, EngineSettings::defaults());

        let mut prev: Option<InputFrame> = None;
        for n in 0..20u32 {
            let canon = if n == 0 { vec![CanonicalButton::Lp] } else { vec![] };
            let (f, s) = tick(&mut engine, prev.as_ref(), n, canon);
            assert_ne!(s.assessments[0].result, StepResult::Missed);
            prev = Some(f);
        }
    }
}
