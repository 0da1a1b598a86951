//! Scoring of recognized answer strings.
//!
//! * [`SortProblem`]: the answer is an ordering; points follow the share of
//!   reference pairs whose relative order the answer reproduces.
//! * [`MatchProblem`]: the answer assigns options to positions; points follow
//!   the share of correctly placed options.
//! * [`MarkProblem`]: one option, all or nothing.
//!
//! [`Evaluator`] applies one problem per answer column to a whole
//! [`AnswerTable`](sheetscan_core::AnswerTable).

mod evaluator;
mod problem;

pub use evaluator::{Evaluator, RejectedRow, ScoreFailure, ScoreReport};
pub use problem::{
    ordered_pairs, ConfigurationError, MarkProblem, MatchProblem, Problem, ProblemKind,
    ProblemSpec, SortProblem, ValidationError,
};
