//! Combo-training input pipeline, trial compiler, and trial engines for a
//! 60 Hz fighting game.
//!
//! The crate is a pure, synchronous transformer: a host samples a
//! controller once per frame, turns it into an [`input::InputSnapshot`],
//! and feeds it through [`input::build_frame`] and a [`trial::TrialEngine`]
//! built by [`trial::build`]. Nothing here performs I/O; deserializing
//! trial documents and move databases from JSON is the caller's job.

pub mod error;
pub mod input;
pub mod logging;
pub mod settings;
pub mod trial;

pub use error::{KumiteError, KumiteResult};
