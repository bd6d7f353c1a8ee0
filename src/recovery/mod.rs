//! Crash recovery: append-only checkpoint log and resume-point detection.
//!
//! A manager instance is either a writer (bound to one experiment's
//! planning-through-writing lifecycle) or a reader (bound to the resumption
//! path); the two roles never share an instance.

pub mod log;
pub mod resume;

pub use log::{ExperimentHeader, Manifest, RecoveredState, RecoveryWriter};
pub use resume::{classify, ResumePoint};
