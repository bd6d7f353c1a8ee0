//! # Partwise
//!
//! Explores fixed-size subsets of a dataset's columns ("partitions"),
//! classifies over each subset, and collects comparable quality statistics,
//! so a column subset can be picked trading off privacy (few columns
//! revealed) against utility (classification quality retained).
//!
//! ## Modules
//!
//! - `partition` - Combination generators (dictionary and random), canonical
//!   ordering, budget trimming, and generator selection
//! - `dataset` - Cleaned-table abstraction, fragment builder, CSV loader
//! - `classify` - Classification oracle trait, learner registry, reference
//!   learners, and cross-validation metrics
//! - `pipeline` - Two-stage bounded experiment pipeline with progress
//!   monitoring and abort support
//! - `recovery` - Append-only checkpoint log and resume-point detection
//! - `report` - Result artifact emission
//! - `plan` - Experiment plan types and validation
pub mod classify;
pub mod cli;
pub mod dataset;
pub mod error;
pub mod partition;
pub mod pipeline;
pub mod plan;
pub mod recovery;
pub mod report;
pub mod stats;

pub use error::{Error, Result};
