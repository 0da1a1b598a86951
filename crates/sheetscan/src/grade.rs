use crate::core::AnswerTable;
use crate::error::PipelineError;
use crate::grading::{Evaluator, ScoreReport};
use crate::io::SheetSetConfig;

/// Run the `grade` stage of a config: answer table on disk → score report on disk.
///
/// The problem list is validated before any answer is read.
pub fn run_grade(config: &SheetSetConfig) -> Result<ScoreReport, PipelineError> {
    let evaluator = Evaluator::from_specs(&config.problems)?;
    let answers = AnswerTable::load_json(config.answers_path())?;
    let report = evaluator.eval_table(&answers)?;

    for failure in &report.failures {
        log::warn!(
            "sheet {} {}: not scored ({})",
            failure.code,
            failure.column,
            failure.error
        );
    }
    crate::core::io::write_json_pretty(config.scores_path(), &report)?;
    Ok(report)
}
