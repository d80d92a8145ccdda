//! The trial compiler and engines: turning a declarative trial document
//! into a per-frame matcher and reporting per-step results.

pub mod assessment;
pub mod compiler;
pub mod engine;
pub mod expectation;
pub mod matcher;
pub mod moves;
pub mod stepper;
pub mod timeline;

pub use assessment::{
    EventLog, ModeEvent, ModeEventType, StepAssessment, StepResult, TrialEngineSnapshot, TrialStatus, WindowBounds,
};
pub use compiler::{
    compile, CancelKind, CompiledStepKind, CompiledStepWindow, CompiledTrial, CompiledTrialRules, CompiledTrialStep,
    ConnectKind, EngineMode, MoveStepDef, StepDef, StepperRulesDef, TrialDocument, TrialRulesDef, WaitStepDef,
    WindowOverrideDef, WindowProvenance,
};
pub use engine::{build, build_from_document, build_from_json, TrialEngine};
pub use expectation::TrialStepExpectation;
pub use matcher::{resolve, should_start_trial, MatcherSettings, StepMatch};
pub use moves::{classify_icon, Command, CommandToken, IconKind, Move, MoveDatabase, OfficialInfo};
pub use stepper::StepperEngine;
pub use timeline::TimelineEngine;

#[cfg(test)]
mod test {
    //! Scenarios that replay the real compiler + engine-factory path
    //! (`build_from_document`) frame-by-frame, rather than poking a single
    //! engine's internals directly.
    use super::*;
    use crate::input::{build_frame, CanonicalButton, CanonicalButtons, DirectionMode, InputFrame, InputHistory, InputSnapshot};
    use crate::settings::EngineSettings;

    fn moves(json: &str) -> MoveDatabase {
        serde_json::from_str(json).unwrap()
    }

    fn doc(json: &str) -> TrialDocument {
        serde_json::from_str(json).unwrap()
    }

    fn push(prev: Option<&InputFrame>, n: u32, dir: u8, canon: Vec<CanonicalButton>) -> InputFrame {
        let snap = InputSnapshot::new(n as f64 / 60.0, dir, vec![], canon);
        build_frame(n, prev, &snap).unwrap()
    }

    /// A button-only opener canceled into a motion + button special, within
    /// the `cancel` connect's `dr` window (12 frames).
    #[test]
    fn scenario_opener_cancels_into_motion_special() {
        let moves = moves(
            r#"{"moves": [
                {"id": "mv_lk", "command": {"tokens": [{"type": "icon", "file": "icon_kick_l.png"}]}},
                {"id": "mv_236lp", "command": {"tokens": [
                    {"type": "icon", "file": "icon_dir_2.png"},
                    {"type": "icon", "file": "icon_dir_3.png"},
                    {"type": "icon", "file": "icon_dir_6.png"},
                    {"type": "icon", "file": "icon_punch_l.png"}
                ]}}
            ]}"#,
        );
        let doc = doc(
            r#"{
                "id": "t1",
                "name": "opener into special",
                "steps": [
                    {"move": "mv_lk"},
                    {"move": "mv_236lp", "connect": "cancel", "cancelKind": "dr"}
                ]
            }"#,
        );
        let mut engine = build_from_document(&doc, &moves, None, EngineSettings::defaults(), DirectionMode::Normal).unwrap();

        let f0 = push(None, 0, 5, vec![CanonicalButton::Lk]);
        let s0 = engine.advance(&f0);
        assert_eq!(s0.assessments[0].result, StepResult::Matched);
        assert_eq!(s0.assessments[0].actual_frame, Some(0));
        assert_eq!(s0.current_step_index, 1);

        let f1 = push(Some(&f0), 1, 2, vec![]);
        engine.advance(&f1);
        let f2 = push(Some(&f1), 2, 3, vec![]);
        engine.advance(&f2);
        let f3 = push(Some(&f2), 3, 6, vec![]);
        engine.advance(&f3);
        let f4 = push(Some(&f3), 4, 6, vec![CanonicalButton::Lp]);
        let s4 = engine.advance(&f4);

        assert_eq!(s4.status, TrialStatus::Success);
        assert_eq!(s4.assessments[1].result, StepResult::Matched);
        assert_eq!(s4.assessments[1].actual_frame, Some(4));
        assert_eq!(s4.assessments[1].delta_frames, Some(-8));
    }

    /// A tight inline window forces a miss mid-trial; the engine still
    /// advances past the missed step and a later step can match using the
    /// miss boundary as its own base frame.
    #[test]
    fn scenario_timeline_miss_then_continue() {
        let moves = moves(
            r#"{"moves": [
                {"id": "mv_a", "command": {"tokens": [{"type": "icon", "file": "icon_punch_l.png"}]}},
                {"id": "mv_b", "command": {"tokens": [{"type": "icon", "file": "icon_punch_h.png"}]}},
                {"id": "mv_c", "command": {"tokens": [{"type": "icon", "file": "icon_kick_h.png"}]}}
            ]}"#,
        );
        let doc = doc(
            r#"{
                "id": "t2",
                "name": "miss then continue",
                "steps": [
                    {"move": "mv_a"},
                    {"move": "mv_b", "connect": "link", "window": {"min": 0, "max": 2}},
                    {"move": "mv_c", "connect": "link"}
                ]
            }"#,
        );
        let mut engine = build_from_document(&doc, &moves, None, EngineSettings::defaults(), DirectionMode::Normal).unwrap();

        let mut prev = push(None, 0, 5, vec![CanonicalButton::Lp]);
        let mut snap = engine.advance(&prev);
        assert_eq!(snap.assessments[0].result, StepResult::Matched);
        assert_eq!(snap.assessments[0].actual_frame, Some(0));

        for n in 1..=5u32 {
            let canon = if n == 6 { vec![CanonicalButton::Hk] } else { vec![] };
            let f = push(Some(&prev), n, 5, canon);
            snap = engine.advance(&f);
            prev = f;
        }
        assert_eq!(snap.assessments[1].result, StepResult::Missed);
        assert_eq!(snap.assessments[1].target_frame, Some(2));
        assert_eq!(snap.current_step_index, 2);

        let f6 = push(Some(&prev), 6, 5, vec![CanonicalButton::Hk]);
        let s6 = engine.advance(&f6);

        assert_eq!(s6.status, TrialStatus::Success);
        assert_eq!(s6.assessments[2].result, StepResult::Matched);
        assert_eq!(s6.assessments[2].actual_frame, Some(6));
        assert_eq!(s6.assessments[2].delta_frames, Some(-20));
    }

    /// Stepper's release gate rejects reuse of a held button until it's
    /// actually released and re-pressed.
    #[test]
    fn scenario_stepper_release_gate_blocks_reuse() {
        let moves = moves(r#"{"moves": [{"id": "mv_lp", "command": {"tokens": [{"type": "icon", "file": "icon_punch_l.png"}]}}]}"#);
        let doc = doc(
            r#"{
                "id": "t3",
                "name": "release gate",
                "steps": [
                    {"move": "mv_lp"},
                    {"move": "mv_lp", "connect": "link"}
                ],
                "rules": {"defaultMode": "stepper", "allowModeOverride": false}
            }"#,
        );
        let mut engine = build_from_document(&doc, &moves, None, EngineSettings::defaults(), DirectionMode::Normal).unwrap();

        let f0 = push(None, 0, 5, vec![CanonicalButton::Lp]);
        let s0 = engine.advance(&f0);
        assert_eq!(s0.assessments[0].result, StepResult::Matched);

        let f1 = push(Some(&f0), 1, 5, vec![CanonicalButton::Lp]);
        let s1 = engine.advance(&f1);
        assert_eq!(s1.assessments[1].result, StepResult::Pending);

        let f2 = push(Some(&f1), 2, 5, vec![CanonicalButton::Lp]);
        let s2 = engine.advance(&f2);
        assert_eq!(s2.assessments[1].result, StepResult::Pending, "holding LP must not satisfy reuse");

        let f3 = push(Some(&f2), 3, 5, vec![]);
        engine.advance(&f3);
        let f4 = push(Some(&f3), 4, 5, vec![CanonicalButton::Lp]);
        let s4 = engine.advance(&f4);

        assert_eq!(s4.assessments[1].result, StepResult::Matched);
        assert_eq!(s4.assessments[1].actual_frame, Some(4));
        assert_eq!(s4.status, TrialStatus::Success);
    }

    /// Stepper retries on timeout instead of missing, and keeps retrying
    /// until the expectation is finally satisfied.
    #[test]
    fn scenario_stepper_timeout_then_retry_then_match() {
        let moves = moves(r#"{"moves": [{"id": "mv_mp", "command": {"tokens": [{"type": "icon", "file": "icon_punch_m.png"}]}}]}"#);
        let doc = doc(
            r#"{
                "id": "t4",
                "name": "timeout retry",
                "steps": [{"move": "mv_mp", "stepperTimeoutFrames": 2}],
                "rules": {"defaultMode": "stepper", "allowModeOverride": false}
            }"#,
        );
        let mut engine = build_from_document(&doc, &moves, None, EngineSettings::defaults(), DirectionMode::Normal).unwrap();

        // wrong-button activity starts the trial but never resolves the step.
        let f0 = push(None, 0, 6, vec![]);
        engine.advance(&f0);
        let f1 = push(Some(&f0), 1, 5, vec![]);
        engine.advance(&f1);
        let f2 = push(Some(&f1), 2, 5, vec![]);
        engine.advance(&f2);
        // elapsed (3) > timeout (2): retry fires at frame 3.
        let f3 = push(Some(&f2), 3, 5, vec![]);
        let s3 = engine.advance(&f3);
        assert_eq!(s3.assessments[0].result, StepResult::Retried);
        assert_eq!(s3.assessments[0].attempts, 1);

        let f4 = push(Some(&f3), 4, 5, vec![CanonicalButton::Mp]);
        let s4 = engine.advance(&f4);
        assert_eq!(s4.assessments[0].result, StepResult::Matched);
        assert!(s4.assessments[0].attempts >= 2);
        assert_eq!(s4.status, TrialStatus::Success);
    }

    /// With direction mode mirrored, a raw 1-4-4 sequence reads as the 236
    /// motion (1->3, 4->6) and still matches within the motion-to-button gap.
    #[test]
    fn scenario_mirrored_motion_plus_button() {
        let moves = moves(
            r#"{"moves": [{"id": "mv_236lp", "command": {"tokens": [
                {"type": "icon", "file": "icon_dir_2.png"},
                {"type": "icon", "file": "icon_dir_3.png"},
                {"type": "icon", "file": "icon_dir_6.png"},
                {"type": "icon", "file": "icon_punch_l.png"}
            ]}}]}"#,
        );
        let doc = doc(r#"{"id": "t5", "name": "mirrored fireball", "steps": [{"move": "mv_236lp"}]}"#);
        let mut engine = build_from_document(&doc, &moves, None, EngineSettings::defaults(), DirectionMode::Mirrored).unwrap();

        let f0 = push(None, 0, 5, vec![]);
        engine.advance(&f0);
        let f1 = push(Some(&f0), 1, 2, vec![]);
        engine.advance(&f1);
        let f2 = push(Some(&f1), 2, 1, vec![]); // mirrors to 3
        engine.advance(&f2);
        let f3 = push(Some(&f2), 3, 4, vec![]); // mirrors to 6
        engine.advance(&f3);
        let f4 = push(Some(&f3), 4, 4, vec![CanonicalButton::Lp]); // mirrors to 6
        let s4 = engine.advance(&f4);

        assert_eq!(s4.status, TrialStatus::Success);
        assert_eq!(s4.assessments[0].actual_frame, Some(4));
    }

    /// 120 consecutive neutral frames compress into a single saturated
    /// history entry, displayed at the 99 cap.
    #[test]
    fn scenario_history_saturates_at_99() {
        let mut history = InputHistory::new(512);
        for f in 0..120u32 {
            history.append(f, 5, CanonicalButtons::empty());
        }
        assert_eq!(history.entries().len(), 1);
        let entry = history.entries()[0];
        assert_eq!(entry.length, 120);
        assert!(entry.saturated);
        assert_eq!(entry.display_length(), 99);
    }

    #[allow(dead_code)]
    fn assert_engine_is_running(engine: &TrialEngine) {
        let _ = engine.mode();
    }
}
