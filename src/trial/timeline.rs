//! The Timeline engine: a step state machine driven by absolute target
//! frames computed relative to the previous resolved frame.

use std::collections::VecDeque;
use std::rc::Rc;

use log::{debug, info};

use crate::input::{apply_direction_mode, DirectionMode, InputFrame};
use crate::settings::EngineSettings;

use super::assessment::{
    EventLog, ModeEvent, ModeEventType, StepAssessment, StepResult, TrialEngineSnapshot, TrialStatus, WindowBounds,
};
use super::compiler::{CompiledStepKind, CompiledTrial, CompiledTrialStep, EngineMode};
use super::matcher::{self, MatcherSettings};

pub struct TimelineEngine {
    trial: Rc<CompiledTrial>,
    settings: EngineSettings,
    direction_mode: DirectionMode,
    history: VecDeque<InputFrame>,
    start_frame: Option<u32>,
    current_step_index: usize,
    status: TrialStatus,
    last_matched_input_frame: Option<u32>,
    previous_resolved_frame: Option<u32>,
    assessments: Vec<StepAssessment>,
    events: EventLog,
    current_window: Option<WindowBounds>,
    last_resolved_for_current_step: Option<u32>,
}

impl TimelineEngine {
    pub fn new(trial: Rc<CompiledTrial>, settings: EngineSettings, direction_mode: DirectionMode) -> Self {
        let assessments = trial
            .steps
            .iter()
            .enumerate()
            .map(|(i, s)| StepAssessment::pending(i, s.id.clone()))
            .collect();
        info!("timeline engine built: {} step(s)", trial.steps.len());
        TimelineEngine {
            trial,
            settings,
            direction_mode,
            history: VecDeque::new(),
            start_frame: None,
            current_step_index: 0,
            status: TrialStatus::Running,
            last_matched_input_frame: None,
            previous_resolved_frame: None,
            assessments,
            events: EventLog::default(),
            current_window: None,
            last_resolved_for_current_step: None,
        }
    }

    pub fn reset(&mut self) {
        self.history.clear();
        self.start_frame = None;
        self.current_step_index = 0;
        self.status = TrialStatus::Running;
        self.last_matched_input_frame = None;
        self.previous_resolved_frame = None;
        self.assessments = self
            .trial
            .steps
            .iter()
            .enumerate()
            .map(|(i, s)| StepAssessment::pending(i, s.id.clone()))
            .collect();
        self.events.clear();
        self.current_window = None;
        self.last_resolved_for_current_step = None;
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

    fn base_frame(&self) -> u32 {
        if self.current_step_index == 0 {
            self.start_frame.unwrap_or(0)
        } else {
            self.previous_resolved_frame.unwrap_or_else(|| self.start_frame.unwrap_or(0))
        }
    }

    pub fn advance(&mut self, frame: &InputFrame) -> TrialEngineSnapshot {
        let mut mirrored = frame.clone();
        mirrored.direction = apply_direction_mode(frame.direction, self.direction_mode);

        self.history.push_back(mirrored.clone());
        while self.history.len() > self.settings.history.timeline_cap_frames {
            self.history.pop_front();
        }

        if self.start_frame.is_none() {
            let first_expectation = self.trial.steps.first().and_then(|s| match &s.kind {
                CompiledStepKind::Move { expectation, .. } => Some(expectation.clone()),
                CompiledStepKind::Delay { .. } => None,
            });
            let starts = first_expectation
                .as_ref()
                .map(|e| matcher::should_start_trial(e, &mirrored))
                .unwrap_or(false);
            if starts {
                self.start_frame = Some(mirrored.frame);
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
            info!("timeline trial {} completed at frame {}", self.trial.id, frame_no);
            self.events.push(ModeEvent {
                event_type: ModeEventType::Success,
                mode: EngineMode::Timeline,
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
        let base = self.base_frame();
        let step = match self.current_step() {
            Some(s) => s.clone(),
            None => return,
        };

        match &step.kind {
            CompiledStepKind::Delay { frames, .. } => {
                let target = base + frames;
                self.current_window = Some(WindowBounds { open: target, close: target });
                if mirrored.frame >= target {
                    self.assessments[step_index].result = StepResult::Matched;
                    self.assessments[step_index].target_frame = Some(target);
                    self.assessments[step_index].actual_frame = Some(target);
                    self.assessments[step_index].delta_frames = Some(0);
                    self.assessments[step_index].attempts += 1;
                    debug!("timeline step {} (delay) matched at frame {}", step.id, target);
                    self.events.push(ModeEvent {
                        event_type: ModeEventType::StepMatched,
                        mode: EngineMode::Timeline,
                        frame: mirrored.frame,
                        step_index,
                        step_id: step.id.clone(),
                        message: "delay elapsed".to_string(),
                    });
                    self.previous_resolved_frame = Some(target);
                    self.current_step_index += 1;
                    self.last_resolved_for_current_step = None;
                }
            }
            CompiledStepKind::Move { expectation, .. } => {
                let window = step.window.as_ref();
                let resolved = matcher::resolve(expectation, &self.history, &self.matcher_settings());

                match window {
                    None => {
                        self.current_window = None;
                        if let Some(m) = resolved {
                            self.assessments[step_index].result = StepResult::Matched;
                            self.assessments[step_index].target_frame = None;
                            self.assessments[step_index].actual_frame = Some(m.input_frame);
                            self.assessments[step_index].delta_frames = Some(0);
                            self.assessments[step_index].attempts += 1;
                            debug!("timeline step {} matched at frame {} (no window)", step.id, m.input_frame);
                            self.events.push(ModeEvent {
                                event_type: ModeEventType::StepMatched,
                                mode: EngineMode::Timeline,
                                frame: mirrored.frame,
                                step_index,
                                step_id: step.id.clone(),
                                message: "matched".to_string(),
                            });
                            self.last_matched_input_frame = Some(m.input_frame);
                            self.previous_resolved_frame = Some(m.input_frame);
                            self.current_step_index += 1;
                            self.last_resolved_for_current_step = None;
                        }
                    }
                    Some(w) => {
                        let open = base + w.min_after_prev_frames;
                        let close = base + w.max_after_prev_frames;
                        let target = close;
                        self.current_window = Some(WindowBounds { open, close });

                        let is_new = resolved
                            .map(|m| self.last_resolved_for_current_step.map_or(true, |last| m.input_frame > last))
                            .unwrap_or(false);

                        if let Some(m) = resolved.filter(|_| is_new) {
                            if m.input_frame >= open && m.input_frame <= close {
                                self.assessments[step_index].result = StepResult::Matched;
                                self.assessments[step_index].target_frame = Some(target);
                                self.assessments[step_index].actual_frame = Some(m.input_frame);
                                self.assessments[step_index].delta_frames = Some(m.input_frame as i64 - target as i64);
                                self.assessments[step_index].attempts += 1;
                                debug!("timeline step {} matched at frame {} (window [{},{}])", step.id, m.input_frame, open, close);
                                self.events.push(ModeEvent {
                                    event_type: ModeEventType::StepMatched,
                                    mode: EngineMode::Timeline,
                                    frame: mirrored.frame,
                                    step_index,
                                    step_id: step.id.clone(),
                                    message: "matched".to_string(),
                                });
                                self.last_matched_input_frame = Some(m.input_frame);
                                self.previous_resolved_frame = Some(m.input_frame);
                                self.current_step_index += 1;
                                self.last_resolved_for_current_step = None;
                                return;
                            }
                            self.last_resolved_for_current_step = Some(m.input_frame);
                        }

                        if mirrored.frame > close {
                            self.assessments[step_index].result = StepResult::Missed;
                            self.assessments[step_index].target_frame = Some(target);
                            self.assessments[step_index].attempts += 1;
                            self.assessments[step_index].notes.push("timed_out".to_string());
                            debug!("timeline step {} missed, close={}", step.id, close);
                            self.events.push(ModeEvent {
                                event_type: ModeEventType::StepMissed,
                                mode: EngineMode::Timeline,
                                frame: mirrored.frame,
                                step_index,
                                step_id: step.id.clone(),
                                message: "timed out".to_string(),
                            });
                            self.previous_resolved_frame = Some(close);
                            self.current_step_index += 1;
                            self.last_resolved_for_current_step = None;
                        }
                    }
                }
            }
        }
    }

    fn snapshot(&self, current_frame: u32) -> TrialEngineSnapshot {
        TrialEngineSnapshot {
            mode: EngineMode::Timeline,
            status: self.status,
            current_step_index: self.current_step_index,
            current_frame,
            current_window: self.current_window,
            last_matched_input_frame: self.last_matched_input_frame,
            last_matched_commit_frame: self.previous_resolved_frame,
            assessments: self.assessments.clone(),
            events: self.events.to_vec(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::input::InputSnapshot;
    use crate::settings::EngineSettings;
    use crate::trial::compiler::{compile, EngineMode as Mode};
    use crate::trial::moves::MoveDatabase;

    fn step_expectation_trial_json() -> &'static str {
        r#"{
            "id": "t1",
            "name": "two-step",
            "steps": [
                {"move": "mv_lk", "label": "LK"},
                {"move": "mv_236lp", "connect": "cancel", "cancelKind": "dr", "label": "236 LP"}
            ]
        }"#
    }

    fn moves_json() -> &'static str {
        r#"{
            "moves": [
                {
                    "id": "mv_lk",
                    "command": {"tokens": [{"type": "icon", "file": "icon_kick_l.png"}]}
                },
                {
                    "id": "mv_236lp",
                    "command": {"tokens": [
                        {"type": "icon", "file": "icon_dir_2.png"},
                        {"type": "icon", "file": "icon_dir_3.png"},
                        {"type": "icon", "file": "icon_dir_6.png"},
                        {"type": "icon", "file": "icon_punch_l.png"}
                    ]}
                }
            ]
        }"#
    }

    fn build_engine() -> TimelineEngine {
        let doc = serde_json::from_str(step_expectation_trial_json()).unwrap();
        let db: MoveDatabase = serde_json::from_str(moves_json()).unwrap();
        let compiled = compile(&doc, &db).unwrap();
        assert_eq!(compiled.rules.default_mode, Mode::Timeline);
        TimelineEngine::new(Rc::new(compiled), EngineSettings::defaults(), DirectionMode::Normal)
    }

    fn frame(engine: &mut TimelineEngine, prev: Option<&InputFrame>, n: u32, dir: u8, canon: Vec<crate::input::CanonicalButton>) -> (InputFrame, TrialEngineSnapshot) {
        let snap = InputSnapshot::new(n as f64 / 60.0, dir, vec![], canon);
        let f = crate::input::build_frame(n, prev, &snap).unwrap();
        let snapshot = engine.advance(&f);
        (f, snapshot)
    }

    #[test]
    fn two_step_combo_matches_within_default_cancel_window() {
        let mut engine = build_engine();
        let (f0, s0) = frame(&mut engine, None, 0, 5, vec![crate::input::CanonicalButton::Lk]);
        assert_eq!(s0.current_step_index, 1);
        assert_eq!(s0.assessments[0].result, StepResult::Matched);

        let (f1, _) = frame(&mut engine, Some(&f0), 1, 2, vec![]);
        let (f2, _) = frame(&mut engine, Some(&f1), 2, 3, vec![]);
        let (f3, _) = frame(&mut engine, Some(&f2), 3, 6, vec![]);
        let (_, s4) = frame(&mut engine, Some(&f3), 4, 6, vec![crate::input::CanonicalButton::Lp]);

        assert_eq!(s4.status, TrialStatus::Success);
        assert_eq!(s4.assessments[1].result, StepResult::Matched);
        assert_eq!(s4.assessments[1].actual_frame, Some(4));
    }

    #[test]
    fn miss_then_continue_still_advances_past_the_step() {
        let mut engine = build_engine();
        let (f0, _) = frame(&mut engine, None, 0, 5, vec![crate::input::CanonicalButton::Lk]);
        // step 1 window is base(=0)+0 .. base+12 (dr cancel shortens default to 12); let it time out.
        let mut prev = f0;
        for n in 1..=13u32 {
            let (f, s) = frame(&mut engine, Some(&prev), n, 5, vec![]);
            prev = f;
            if n == 13 {
                assert_eq!(s.assessments[1].result, StepResult::Missed);
                assert_eq!(s.current_step_index, 2);
            }
        }
    }
}
