//! The input matcher: resolves a compiled step expectation against the
//! recent frame history.

use std::collections::VecDeque;

use crate::input::{detect_motion, CanonicalButton, InputFrame, NEUTRAL_DIRECTION};

use super::expectation::TrialStepExpectation;

/// Tunables the matcher needs but the expectation itself doesn't carry.
#[derive(Clone, Copy, Debug)]
pub struct MatcherSettings {
    pub motion_max_window_frames: u32,
    pub motion_to_button_gap_frames: u32,
}

/// The frame at which an expectation became satisfied, and (if a motion was
/// involved) the frame the motion itself completed on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StepMatch {
    pub input_frame: u32,
    pub motion_completion_frame: Option<u32>,
}

/// Resolve `expectation` against `history`, whose last entry is the current
/// frame. Returns `None` if the expectation is not yet satisfied as of the
/// current frame.
pub fn resolve(
    expectation: &TrialStepExpectation,
    history: &VecDeque<InputFrame>,
    settings: &MatcherSettings,
) -> Option<StepMatch> {
    let current = history.back()?;

    if let Some(d) = expectation.direction {
        if current.direction != d {
            return None;
        }
    }

    let tolerance = expectation.simultaneous_within_frames.unwrap_or(0);
    let window_start = current.frame.saturating_sub(tolerance);

    let button_resolved = if !expectation.buttons.is_empty() {
        Some(resolve_all_buttons(&expectation.buttons, history, window_start, current.frame)?)
    } else if let Some(allowed) = &expectation.any_two_buttons_from {
        Some(resolve_any_two(allowed, history, window_start, current.frame, tolerance)?)
    } else {
        None
    };

    if let Some(code) = expectation.motion {
        let search_end = button_resolved.unwrap_or(current.frame);
        let gap = settings.motion_to_button_gap_frames;
        let earliest_end = search_end.saturating_sub(gap);
        let found = detect_motion(history, code, search_end, settings.motion_max_window_frames)
            .filter(|m| m.end_frame >= earliest_end)?;
        let resolved = button_resolved.unwrap_or(found.end_frame);
        Some(StepMatch {
            input_frame: resolved,
            motion_completion_frame: Some(found.end_frame),
        })
    } else if let Some(resolved) = button_resolved {
        Some(StepMatch {
            input_frame: resolved,
            motion_completion_frame: None,
        })
    } else {
        Some(StepMatch {
            input_frame: current.frame,
            motion_completion_frame: None,
        })
    }
}

/// `should_start_trial`: gates the first advance that counts as trial
/// activation.
pub fn should_start_trial(first_expectation: &TrialStepExpectation, frame: &InputFrame) -> bool {
    let has_activity = frame.direction != NEUTRAL_DIRECTION || !frame.canonical_down.is_empty();
    if !has_activity {
        return false;
    }
    let pre_hold_direction = matches!(first_expectation.direction, Some(1) | Some(2) | Some(3));
    if first_expectation.requires_buttons() && pre_hold_direction {
        return !frame.canonical_pressed.is_empty();
    }
    true
}

fn latest_press_frame(history: &VecDeque<InputFrame>, button: CanonicalButton, start: u32, end: u32) -> Option<u32> {
    history
        .iter()
        .rev()
        .filter(|f| f.frame >= start && f.frame <= end)
        .find(|f| f.canonical_pressed.contains(button.flag()))
        .map(|f| f.frame)
}

fn resolve_all_buttons(buttons: &[CanonicalButton], history: &VecDeque<InputFrame>, start: u32, end: u32) -> Option<u32> {
    let mut frames = Vec::with_capacity(buttons.len());
    for &b in buttons {
        frames.push(latest_press_frame(history, b, start, end)?);
    }
    frames.into_iter().max()
}

fn resolve_any_two(allowed: &[CanonicalButton], history: &VecDeque<InputFrame>, start: u32, end: u32, tolerance: u32) -> Option<u32> {
    let mut presses: Vec<(CanonicalButton, u32)> = Vec::new();
    for f in history.iter().filter(|f| f.frame >= start && f.frame <= end) {
        for &b in allowed {
            if f.canonical_pressed.contains(b.flag()) {
                presses.push((b, f.frame));
            }
        }
    }

    let mut best: Option<u32> = None;
    for i in 0..presses.len() {
        for j in (i + 1)..presses.len() {
            let (b1, f1) = presses[i];
            let (b2, f2) = presses[j];
            if b1 == b2 {
                continue;
            }
            let dist = f1.max(f2) - f1.min(f2);
            if dist <= tolerance {
                let resolved = f1.max(f2);
                best = Some(best.map_or(resolved, |b| b.max(resolved)));
            }
        }
    }
    best
}
