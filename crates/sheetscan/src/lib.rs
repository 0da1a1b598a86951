//! High-level facade crate for the `sheetscan-*` workspace.
//!
//! This crate provides:
//! - re-exports of the stage crates (recovery, reader, grading) and the shared core
//! - (feature-gated) an end-to-end [`pipeline`] from scan files to an answer table
//! - JSON documents for a problem set ([`io::SheetSetConfig`]) and its reports
//! - the `sheetscan` command line tool (feature `cli`)
//!
//! ## Quickstart
//!
//! ```no_run
//! use std::sync::Arc;
//! use sheetscan::core::LayoutReference;
//! use sheetscan::io::PipelineParams;
//! use sheetscan::pipeline::SheetPipeline;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let layout = Arc::new(LayoutReference::load_json("layout.json")?);
//! let pipeline = SheetPipeline::new(layout, &PipelineParams::default(), None)?;
//!
//! let scan = image::open("scan.png")?.to_luma8();
//! let sheet = pipeline.process_sheet(&scan)?;
//! println!("{}: {:?}", sheet.code(), sheet.recognized.answers());
//! # Ok(())
//! # }
//! ```
//!
//! ## API map
//! - `sheetscan::core`: images, affine model, layout, answer/score tables, logger.
//! - `sheetscan::recovery`: QR anchors and rectification.
//! - `sheetscan::reader`: cell extraction and classifiers.
//! - `sheetscan::grading`: sort/match/mark problems and the evaluator.
//! - `sheetscan::pipeline` (feature `image`): scans on disk → answers.

pub use sheetscan_core as core;
pub use sheetscan_grading as grading;
pub use sheetscan_reader as reader;
pub use sheetscan_recovery as recovery;

pub use sheetscan_core::{AnswerTable, LayoutReference, ScoreTable};
pub use sheetscan_grading::{Evaluator, ProblemSpec};

mod error;
mod grade;
pub mod io;

#[cfg(feature = "image")]
pub mod pipeline;

pub use error::{PipelineError, SheetError};
pub use grade::run_grade;
