//! Shared per-advance reporting types returned by both engine variants:
//! assessments, events, and the engine snapshot.

use std::collections::VecDeque;

use super::compiler::EngineMode;

pub const MAX_EVENTS: usize = 80;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StepResult {
    Pending,
    Matched,
    Missed,
    Retried,
}

#[derive(Clone, Debug, PartialEq)]
pub struct StepAssessment {
    pub step_index: usize,
    pub step_id: String,
    pub result: StepResult,
    pub target_frame: Option<u32>,
    pub actual_frame: Option<u32>,
    pub delta_frames: Option<i64>,
    pub attempts: u32,
    pub notes: Vec<String>,
}

impl StepAssessment {
    pub fn pending(step_index: usize, step_id: String) -> Self {
        StepAssessment {
            step_index,
            step_id,
            result: StepResult::Pending,
            target_frame: None,
            actual_frame: None,
            delta_frames: None,
            attempts: 0,
            notes: Vec::new(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModeEventType {
    StepMatched,
    StepMissed,
    StepRetry,
    Success,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ModeEvent {
    pub event_type: ModeEventType,
    pub mode: EngineMode,
    pub frame: u32,
    pub step_index: usize,
    pub step_id: String,
    pub message: String,
}

/// FIFO-capped event log shared by both engine variants.
#[derive(Clone, Debug, Default)]
pub struct EventLog(VecDeque<ModeEvent>);

impl EventLog {
    pub fn push(&mut self, event: ModeEvent) {
        self.0.push_back(event);
        while self.0.len() > MAX_EVENTS {
            self.0.pop_front();
        }
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    pub fn to_vec(&self) -> Vec<ModeEvent> {
        self.0.iter().cloned().collect()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TrialStatus {
    Running,
    Success,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WindowBounds {
    pub open: u32,
    pub close: u32,
}

/// A deep-copied view of engine state, safe for the caller to retain across
/// frames.
#[derive(Clone, Debug, PartialEq)]
pub struct TrialEngineSnapshot {
    pub mode: EngineMode,
    pub status: TrialStatus,
    pub current_step_index: usize,
    pub current_frame: u32,
    pub current_window: Option<WindowBounds>,
    pub last_matched_input_frame: Option<u32>,
    pub last_matched_commit_frame: Option<u32>,
    pub assessments: Vec<StepAssessment>,
    pub events: Vec<ModeEvent>,
}
