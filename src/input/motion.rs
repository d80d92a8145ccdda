//! Motion command detection over a bounded recent history.

use std::collections::VecDeque;

use super::snapshot::InputFrame;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MotionCode {
    /// Quarter-circle forward: down, down-forward, forward.
    M236,
    /// Quarter-circle back: down, down-back, back.
    M214,
    /// Dragon punch: forward, down, down-forward.
    M623,
    /// Double tap down.
    M22,
}

impl MotionCode {
    fn pattern(self) -> &'static [u8] {
        match self {
            MotionCode::M236 => &[2, 3, 6],
            MotionCode::M214 => &[2, 1, 4],
            MotionCode::M623 => &[6, 2, 3],
            MotionCode::M22 => &[2, 2],
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MotionMatch {
    pub start_frame: u32,
    pub end_frame: u32,
}

const NEUTRAL: u8 = 5;

/// Directional event: the first frame of a run of a constant direction
/// within the search window.
struct DirEvent {
    frame: u32,
    direction: u8,
}

fn compress_window(frames: &VecDeque<InputFrame>, window_start: u32, window_end: u32) -> Vec<DirEvent> {
    let mut events = Vec::new();
    let mut last_dir: Option<u8> = None;
    for f in frames.iter() {
        if f.frame < window_start || f.frame > window_end {
            continue;
        }
        if last_dir != Some(f.direction) {
            events.push(DirEvent {
                frame: f.frame,
                direction: f.direction,
            });
            last_dir = Some(f.direction);
        }
    }
    events
}

/// Search for `code` ending no later than `end_frame`, over the last
/// `max_window_frames` frames. Returns the latest (largest end frame) match.
pub fn detect(frames: &VecDeque<InputFrame>, code: MotionCode, end_frame: u32, max_window_frames: u32) -> Option<MotionMatch> {
    let window_start = end_frame.saturating_sub(max_window_frames.saturating_sub(1));
    let events = compress_window(frames, window_start, end_frame);
    let pattern = code.pattern();

    let mut best: Option<MotionMatch> = None;
    for (i, start_event) in events.iter().enumerate() {
        if start_event.direction != pattern[0] {
            continue;
        }
        let mut pattern_idx = 1;
        let mut last_matched = start_event.direction;
        let mut end = start_event.frame;
        let mut failed = false;

        for ev in &events[i + 1..] {
            if pattern_idx == pattern.len() {
                break;
            }
            if ev.direction == NEUTRAL {
                continue;
            }
            if ev.direction == pattern[pattern_idx] {
                last_matched = ev.direction;
                end = ev.frame;
                pattern_idx += 1;
                continue;
            }
            if ev.direction == last_matched {
                continue;
            }
            failed = true;
            break;
        }

        if !failed && pattern_idx == pattern.len() {
            let candidate = MotionMatch {
                start_frame: start_event.frame,
                end_frame: end,
            };
            if best.map_or(true, |m| candidate.end_frame >= m.end_frame) {
                best = Some(candidate);
            }
        }
    }
    best
}
