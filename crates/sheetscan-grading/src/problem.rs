//! Question kinds and their scoring rules.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Fatal setup errors: the problem set cannot be graded at all.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ConfigurationError {
    #[error("unknown problem kind `{0}` (expected sort, match or mark)")]
    UnknownKind(String),
    #[error("reference answer is empty")]
    EmptyReference,
    #[error("sort reference `{0}` has no ordered pair of distinct options")]
    NoOrderedPairs(String),
    #[error("min_share must be in [0, 1), got {0}")]
    MinShare(f64),
    #[error("{problems} problems configured for {columns} answer columns")]
    ColumnCount { problems: usize, columns: usize },
}

/// Scoring halted for one answer of one question.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationError {
    #[error("answer has {got} options, reference has only {max}")]
    AnswerTooLong { got: usize, max: usize },
}

/// Question kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProblemKind {
    /// Reconstruct an ordering; scored by agreeing pairwise order.
    Sort,
    /// Assign options to positions; scored per position.
    Match,
    /// Single answer; all or nothing.
    Mark,
}

impl ProblemKind {
    /// Case-insensitive parse of `sort`, `match` or `mark`.
    pub fn parse(raw: &str) -> Result<Self, ConfigurationError> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "sort" => Ok(Self::Sort),
            "match" => Ok(Self::Match),
            "mark" | "single" => Ok(Self::Mark),
            _ => Err(ConfigurationError::UnknownKind(raw.to_string())),
        }
    }
}

impl fmt::Display for ProblemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ProblemKind::Sort => "sort",
            ProblemKind::Match => "match",
            ProblemKind::Mark => "mark",
        })
    }
}

fn default_max_pts() -> u32 {
    5
}

fn default_min_share() -> f64 {
    0.5
}

/// One question as written in a problem-set document.
///
/// `{"ans": "ABCDE", "type": "SORT"}` and
/// `{"reference": "ABCDE", "kind": "sort", "max_pts": 10}` are both accepted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProblemSpec {
    #[serde(alias = "ans", alias = "referenceAnswer")]
    pub reference: String,
    /// Kept as text so that an unknown kind is a configuration error, not a parse error.
    #[serde(alias = "type")]
    pub kind: String,
    #[serde(default = "default_max_pts")]
    pub max_pts: u32,
    #[serde(default = "default_min_share")]
    pub min_share: f64,
}

impl ProblemSpec {
    pub fn new(reference: impl Into<String>, kind: ProblemKind) -> Self {
        Self {
            reference: reference.into(),
            kind: kind.to_string(),
            max_pts: default_max_pts(),
            min_share: default_min_share(),
        }
    }

    pub fn with_max_pts(mut self, max_pts: u32) -> Self {
        self.max_pts = max_pts;
        self
    }

    pub fn with_min_share(mut self, min_share: f64) -> Self {
        self.min_share = min_share;
        self
    }
}

/// Round half to even, then clamp into `[0, max]`.
fn round_points(pts: f64, max: u32) -> u32 {
    if !pts.is_finite() || pts <= 0.0 {
        return 0;
    }
    (pts.round_ties_even() as u32).min(max)
}

/// Unordered-pair set of a sequence: every `(s[i], s[j])` with `i < j`,
/// minus self-pairs and minus both members of any pair whose reverse is present.
pub fn ordered_pairs(seq: &[char]) -> BTreeSet<(char, char)> {
    let mut all = BTreeSet::new();
    for (i, &a) in seq.iter().enumerate() {
        for &b in &seq[i + 1..] {
            if a != b {
                all.insert((a, b));
            }
        }
    }
    all.iter()
        .filter(|&&(a, b)| !all.contains(&(b, a)))
        .copied()
        .collect()
}

/// Ordering question.
#[derive(Clone, Debug, PartialEq)]
pub struct SortProblem {
    reference: Vec<char>,
    reference_pairs: BTreeSet<(char, char)>,
    max_pts: u32,
    min_share: f64,
}

impl SortProblem {
    pub fn new(reference: &str, max_pts: u32, min_share: f64) -> Result<Self, ConfigurationError> {
        let reference: Vec<char> = reference.trim().chars().collect();
        if reference.is_empty() {
            return Err(ConfigurationError::EmptyReference);
        }
        if !(0.0..1.0).contains(&min_share) {
            return Err(ConfigurationError::MinShare(min_share));
        }
        let reference_pairs = ordered_pairs(&reference);
        if reference_pairs.is_empty() {
            return Err(ConfigurationError::NoOrderedPairs(reference.iter().collect()));
        }
        Ok(Self {
            reference,
            reference_pairs,
            max_pts,
            min_share,
        })
    }

    /// Fraction of the reference's ordered pairs that the answer reproduces.
    pub fn evaluate_share(&self, evaluated: &str) -> Result<f64, ValidationError> {
        let evaluated: Vec<char> = evaluated.chars().collect();
        if evaluated.len() > self.reference.len() {
            return Err(ValidationError::AnswerTooLong {
                got: evaluated.len(),
                max: self.reference.len(),
            });
        }
        let hits = ordered_pairs(&evaluated)
            .intersection(&self.reference_pairs)
            .count();
        Ok(hits as f64 / self.reference_pairs.len() as f64)
    }

    /// Points: the share above `min_share`, rescaled to `[0, max_pts]`.
    pub fn evaluate(&self, evaluated: &str) -> Result<u32, ValidationError> {
        let share = self.evaluate_share(evaluated)?;
        let pts = (share - self.min_share) / (1.0 - self.min_share) * self.max_pts as f64;
        Ok(round_points(pts, self.max_pts))
    }

    #[inline]
    pub fn max_pts(&self) -> u32 {
        self.max_pts
    }
}

/// Positional assignment question.
///
/// Each position scores when it holds the reference letter, unless that
/// letter is used more often than the reference uses it; such an ambiguous
/// assignment scores nowhere.
#[derive(Clone, Debug, PartialEq)]
pub struct MatchProblem {
    reference: Vec<char>,
    occurrences: BTreeMap<char, usize>,
    max_pts: u32,
}

impl MatchProblem {
    pub fn new(reference: &str, max_pts: u32) -> Result<Self, ConfigurationError> {
        let reference: Vec<char> = reference.trim().chars().collect();
        if reference.is_empty() {
            return Err(ConfigurationError::EmptyReference);
        }
        Ok(Self {
            occurrences: count_letters(&reference),
            reference,
            max_pts,
        })
    }

    /// Indicator table: `1` where `letter` sits at `position` in the reference.
    pub fn indicator(&self, letter: char, position: usize) -> u32 {
        u32::from(self.reference.get(position) == Some(&letter))
    }

    /// Number of correctly placed, unambiguous letters.
    pub fn evaluate_hits(&self, evaluated: &str) -> u32 {
        let evaluated: Vec<char> = evaluated.chars().collect();
        let used = count_letters(&evaluated);
        evaluated
            .iter()
            .enumerate()
            .filter(|&(_, c)| used.get(c) <= self.occurrences.get(c))
            .map(|(i, &c)| self.indicator(c, i))
            .sum()
    }

    pub fn evaluate(&self, evaluated: &str) -> Result<u32, ValidationError> {
        let hits = self.evaluate_hits(evaluated);
        let pts = hits as f64 / self.reference.len() as f64 * self.max_pts as f64;
        Ok(round_points(pts, self.max_pts))
    }

    #[inline]
    pub fn max_pts(&self) -> u32 {
        self.max_pts
    }
}

fn count_letters(seq: &[char]) -> BTreeMap<char, usize> {
    let mut counts = BTreeMap::new();
    for &c in seq {
        *counts.entry(c).or_insert(0) += 1;
    }
    counts
}

/// Single-answer question.
#[derive(Clone, Debug, PartialEq)]
pub struct MarkProblem {
    reference: String,
    max_pts: u32,
}

impl MarkProblem {
    pub fn new(reference: &str, max_pts: u32) -> Result<Self, ConfigurationError> {
        let reference = reference.trim();
        if reference.is_empty() {
            return Err(ConfigurationError::EmptyReference);
        }
        Ok(Self {
            reference: reference.to_string(),
            max_pts,
        })
    }

    pub fn evaluate(&self, evaluated: &str) -> Result<u32, ValidationError> {
        Ok(if evaluated.trim() == self.reference {
            self.max_pts
        } else {
            0
        })
    }

    #[inline]
    pub fn max_pts(&self) -> u32 {
        self.max_pts
    }
}

/// A configured question of any kind.
#[derive(Clone, Debug, PartialEq)]
pub enum Problem {
    Sort(SortProblem),
    Match(MatchProblem),
    Mark(MarkProblem),
}

impl Problem {
    /// Validate a document entry.
    pub fn from_spec(spec: &ProblemSpec) -> Result<Self, ConfigurationError> {
        Ok(match ProblemKind::parse(&spec.kind)? {
            ProblemKind::Sort => {
                Problem::Sort(SortProblem::new(&spec.reference, spec.max_pts, spec.min_share)?)
            }
            ProblemKind::Match => Problem::Match(MatchProblem::new(&spec.reference, spec.max_pts)?),
            ProblemKind::Mark => Problem::Mark(MarkProblem::new(&spec.reference, spec.max_pts)?),
        })
    }

    pub fn kind(&self) -> ProblemKind {
        match self {
            Problem::Sort(_) => ProblemKind::Sort,
            Problem::Match(_) => ProblemKind::Match,
            Problem::Mark(_) => ProblemKind::Mark,
        }
    }

    pub fn max_pts(&self) -> u32 {
        match self {
            Problem::Sort(p) => p.max_pts(),
            Problem::Match(p) => p.max_pts(),
            Problem::Mark(p) => p.max_pts(),
        }
    }

    /// Points for one recognized answer, in `[0, max_pts]`.
    pub fn evaluate(&self, evaluated: &str) -> Result<u32, ValidationError> {
        match self {
            Problem::Sort(p) => p.evaluate(evaluated),
            Problem::Match(p) => p.evaluate(evaluated),
            Problem::Mark(p) => p.evaluate(evaluated),
        }
    }
}
