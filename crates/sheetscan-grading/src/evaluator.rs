use crate::problem::{ConfigurationError, Problem, ProblemSpec, ValidationError};
use serde::{Deserialize, Serialize};
use sheetscan_core::{AnswerTable, ScoreTable, TableError};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// A question whose scoring was halted for one sheet.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreFailure {
    pub code: String,
    pub column: String,
    pub answer: String,
    pub error: ValidationError,
}

/// A sheet whose answer row could not be scored at all.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectedRow {
    pub code: String,
    pub error: String,
}

/// Score table plus the answers that could not be scored.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScoreReport {
    pub scores: ScoreTable,
    pub failures: Vec<ScoreFailure>,
    /// Rows whose width does not match the problem list.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rejected: Vec<RejectedRow>,
}

/// Applies one problem per answer column.
#[derive(Clone, Debug, PartialEq)]
pub struct Evaluator {
    problems: Vec<Problem>,
}

impl Evaluator {
    pub fn new(problems: Vec<Problem>) -> Self {
        Self { problems }
    }

    /// Validate every spec; the first invalid one aborts setup.
    pub fn from_specs(specs: &[ProblemSpec]) -> Result<Self, ConfigurationError> {
        let problems = specs
            .iter()
            .map(Problem::from_spec)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(problems))
    }

    #[inline]
    pub fn problems(&self) -> &[Problem] {
        &self.problems
    }

    /// Score one sheet's answers, in problem order, after trimming whitespace.
    pub fn eval_row<S: AsRef<str>>(&self, answers: &[S]) -> Vec<Result<u32, ValidationError>> {
        self.problems
            .iter()
            .zip(answers)
            .map(|(p, a)| p.evaluate(a.as_ref().trim()))
            .collect()
    }

    /// Score a whole answer table; columns and row order are preserved.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "info", skip(self, answers), fields(sheets = answers.len()))
    )]
    pub fn eval_table(&self, answers: &AnswerTable) -> Result<ScoreReport, ConfigurationError> {
        if answers.columns.len() != self.problems.len() {
            return Err(ConfigurationError::ColumnCount {
                problems: self.problems.len(),
                columns: answers.columns.len(),
            });
        }

        let mut scores = ScoreTable::new(answers.columns.clone());
        let mut failures = Vec::new();
        let mut rejected = Vec::new();
        for (code, row) in &answers.rows {
            if row.len() != answers.columns.len() {
                let error = TableError::RowWidth {
                    code: code.clone(),
                    expected: answers.columns.len(),
                    got: row.len(),
                };
                log::error!("sheet {code}: {error}; not scored");
                rejected.push(RejectedRow {
                    code: code.clone(),
                    error: error.to_string(),
                });
                continue;
            }
            let points = self
                .eval_row(row.as_slice())
                .into_iter()
                .enumerate()
                .map(|(i, r)| match r {
                    Ok(pts) => Some(pts),
                    Err(error) => {
                        let failure = ScoreFailure {
                            code: code.clone(),
                            column: answers.columns[i].clone(),
                            answer: row[i].clone(),
                            error,
                        };
                        log::warn!(
                            "sheet {} {}: {} (answer `{}`)",
                            failure.code,
                            failure.column,
                            failure.error,
                            failure.answer
                        );
                        failures.push(failure);
                        None
                    }
                })
                .collect::<Vec<_>>();
            if let Err(err) = scores.insert_row(code.clone(), points) {
                log::error!("sheet {code}: {err}; not scored");
                rejected.push(RejectedRow {
                    code: code.clone(),
                    error: err.to_string(),
                });
            }
        }

        log::debug!(
            "scored {} sheets, {} halted answers",
            scores.len(),
            failures.len()
        );
        Ok(ScoreReport {
            scores,
            failures,
            rejected,
        })
    }
}
