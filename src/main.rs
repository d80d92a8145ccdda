//! Demo driver: stands in for the external host that samples a controller
//! and owns an engine. Feeds a fixture input log and a fixture trial/
//! move-database through the library and prints the resulting per-frame
//! snapshots.

use serde::Deserialize;

use kumite::error::KumiteResult;
use kumite::input::{
    build_frame, canonical_members, default_bindings, map_physical_to_canonical, DirectionMode, InputSnapshot,
    PhysicalButton, PhysicalButtons, ResetComboDetector,
};
use kumite::settings::{self, EngineSettings};
use kumite::trial::{self, TrialDocument};
use kumite::logging;

#[derive(Deserialize)]
struct FixtureFrame {
    direction: u8,
    #[serde(default)]
    physical: Vec<PhysicalButton>,
}

fn main() -> KumiteResult<()> {
    let settings = settings::read().unwrap_or_default();
    logging::setup(&settings.logging).expect("logging setup");

    let moves = serde_json::from_str(include_str!("../demos/moves.json"))?;
    let doc: TrialDocument = serde_json::from_str(include_str!("../demos/trial.json"))?;
    let frames: Vec<FixtureFrame> = serde_json::from_str(include_str!("../demos/input_log.json"))?;

    let mut engine = trial::build_from_document(&doc, &moves, None, EngineSettings::defaults(), DirectionMode::Normal)?;

    let bindings = default_bindings();
    // Select+Start is a conventional reset chord; this fixture log never holds it.
    let reset_combo = PhysicalButton::Select.flag() | PhysicalButton::Start.flag();
    let mut reset_detector = ResetComboDetector::new(reset_combo);

    let mut prev = None;
    let mut last_snapshot = None;
    for (n, fixture) in frames.iter().enumerate() {
        let physical_flags = fixture.physical.iter().fold(PhysicalButtons::empty(), |acc, b| acc | b.flag());
        let canonical_flags = map_physical_to_canonical(physical_flags, &bindings);
        let snapshot = InputSnapshot::new(
            n as f64 * 1000.0 / 60.0,
            fixture.direction,
            fixture.physical.clone(),
            canonical_members(canonical_flags),
        );
        let frame = build_frame(n as u32, prev.as_ref(), &snapshot)?;

        if reset_detector.observe(&frame) {
            println!("frame {}: reset combo triggered", n);
            engine.reset();
        }

        let snap = engine.advance(&frame);
        println!(
            "frame {}: step={} status={:?} window={:?} events={}",
            n,
            snap.current_step_index,
            snap.status,
            snap.current_window,
            snap.events.len()
        );

        prev = Some(frame);
        last_snapshot = Some(snap);
    }

    println!();
    println!("final assessments:");
    for a in &last_snapshot.expect("at least one frame").assessments {
        println!(
            "  {} [{}] result={:?} target={:?} actual={:?} delta={:?} attempts={}",
            a.step_id, a.step_index, a.result, a.target_frame, a.actual_frame, a.delta_frames, a.attempts
        );
    }

    Ok(())
}
