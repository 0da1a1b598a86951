//! Reference layout of a printed answer sheet.
//!
//! The layout document is produced by the blank generator and read here
//! without modification. It is validated once at load time; everything
//! downstream works with the typed [`LayoutReference`].

use crate::io::{read_json, write_json_pretty, JsonIoError};
use crate::{PixelRect, MAX_OPTIONS};
use nalgebra::Point2;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

/// Corner of the sheet that carries an anchor marker.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnchorPosition {
    Tl,
    Tr,
    Bl,
}

impl AnchorPosition {
    /// Order in which anchors contribute correspondences to rectification.
    pub const PRIORITY: [AnchorPosition; 3] =
        [AnchorPosition::Bl, AnchorPosition::Tl, AnchorPosition::Tr];

    pub fn as_str(&self) -> &'static str {
        match self {
            AnchorPosition::Tl => "tl",
            AnchorPosition::Tr => "tr",
            AnchorPosition::Bl => "bl",
        }
    }

    pub fn parse(tag: &str) -> Option<Self> {
        match tag {
            "tl" => Some(AnchorPosition::Tl),
            "tr" => Some(AnchorPosition::Tr),
            "bl" => Some(AnchorPosition::Bl),
            _ => None,
        }
    }

    #[inline]
    fn index(&self) -> usize {
        match self {
            AnchorPosition::Tl => 0,
            AnchorPosition::Tr => 1,
            AnchorPosition::Bl => 2,
        }
    }
}

impl fmt::Display for AnchorPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Box given by two corners: `[[x1, y1], [x2, y2]]`, top-left then bottom-right.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoxCorners(pub [[i64; 2]; 2]);

impl BoxCorners {
    pub fn new(x1: i64, y1: i64, x2: i64, y2: i64) -> Self {
        Self([[x1, y1], [x2, y2]])
    }

    #[inline]
    pub fn x1(&self) -> i64 {
        self.0[0][0]
    }
    #[inline]
    pub fn y1(&self) -> i64 {
        self.0[0][1]
    }
    #[inline]
    pub fn x2(&self) -> i64 {
        self.0[1][0]
    }
    #[inline]
    pub fn y2(&self) -> i64 {
        self.0[1][1]
    }

    #[inline]
    pub fn width(&self) -> i64 {
        self.x2() - self.x1()
    }

    #[inline]
    pub fn height(&self) -> i64 {
        self.y2() - self.y1()
    }

    #[inline]
    pub fn rect(&self) -> PixelRect {
        PixelRect::from_corners(self.x1(), self.y1(), self.x2(), self.y2())
    }

    /// First corner (`index == 0`) or second corner (`index == 1`) as a point.
    #[inline]
    pub fn corner(&self, index: usize) -> Point2<f32> {
        let [x, y] = self.0[index.min(1)];
        Point2::new(x as f32, y as f32)
    }
}

/// Per-question drawing metadata.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionMetadata {
    /// Stroke thickness of the drawn cell borders, in pixels.
    pub thickness: i64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QuestionLayout {
    #[serde(rename = "Metadata")]
    pub metadata: QuestionMetadata,
    #[serde(rename = "Cells")]
    pub cells: Vec<BoxCorners>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SectionLayout {
    #[serde(rename = "Questions")]
    pub questions: Vec<QuestionLayout>,
}

/// Raster size every scan is normalized to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Canvas {
    pub width: usize,
    pub height: usize,
}

impl Default for Canvas {
    /// A4 at 150 dpi.
    fn default() -> Self {
        Self {
            width: 1240,
            height: 1754,
        }
    }
}

/// Layout document exactly as the generator writes it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LayoutDocument {
    #[serde(rename = "Sections")]
    pub sections: Vec<SectionLayout>,
    #[serde(rename = "Codes")]
    pub anchors: BTreeMap<String, BoxCorners>,
    #[serde(rename = "Page", default)]
    pub canvas: Canvas,
}

/// Layout validation errors.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum LayoutError {
    #[error("canvas must be non-empty (got {width}x{height})")]
    EmptyCanvas { width: usize, height: usize },
    #[error("unknown anchor position `{0}` (expected tl, tr or bl)")]
    UnknownAnchor(String),
    #[error("anchor `{0}` is missing")]
    MissingAnchor(AnchorPosition),
    #[error("anchor `{position}` box is degenerate or outside the canvas")]
    InvalidAnchorBox { position: AnchorPosition },
    #[error("layout has no questions")]
    NoQuestions,
    #[error("section {section} question {question} has no cells")]
    EmptyQuestion { section: usize, question: usize },
    #[error("section {section} question {question} has {cells} cells, at most {max} can be labelled")]
    TooManyCells {
        section: usize,
        question: usize,
        cells: usize,
        max: usize,
    },
    #[error("section {section} question {question}: thickness must be > 0 (got {thickness})")]
    InvalidThickness {
        section: usize,
        question: usize,
        thickness: i64,
    },
    #[error("section {section} question {question} cell {cell}: box is degenerate or outside the canvas")]
    InvalidCellBox {
        section: usize,
        question: usize,
        cell: usize,
    },
}

#[derive(thiserror::Error, Debug)]
pub enum LayoutLoadError {
    #[error(transparent)]
    Io(#[from] JsonIoError),
    #[error(transparent)]
    Layout(#[from] LayoutError),
}

/// One markable answer box with its position in the layout.
///
/// Indices are zero-based.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Cell {
    pub section: usize,
    pub question: usize,
    pub index: usize,
    pub bounds: BoxCorners,
    pub thickness: i64,
}

impl Cell {
    /// Margin searched around the nominal box for its drawn border.
    #[inline]
    pub fn search_margin(&self) -> i64 {
        3 * self.thickness
    }

    #[inline]
    pub fn nominal_area(&self) -> i64 {
        self.bounds.width() * self.bounds.height()
    }
}

/// Position of one question in the layout (zero-based).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QuestionId {
    pub section: usize,
    pub question: usize,
}

impl QuestionId {
    /// Column name used in answer and score tables, e.g. `S1Q3`.
    pub fn column_name(&self) -> String {
        format!("S{}Q{}", self.section + 1, self.question + 1)
    }
}

/// Validated, immutable sheet geometry.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "LayoutDocument", into = "LayoutDocument")]
pub struct LayoutReference {
    canvas: Canvas,
    anchors: [BoxCorners; 3],
    sections: Vec<SectionLayout>,
}

fn box_inside(b: &BoxCorners, canvas: Canvas) -> bool {
    b.x2() > b.x1()
        && b.y2() > b.y1()
        && b.x1() >= 0
        && b.y1() >= 0
        && b.x2() <= canvas.width as i64
        && b.y2() <= canvas.height as i64
}

impl LayoutReference {
    /// Validate a generator document.
    pub fn new(doc: LayoutDocument) -> Result<Self, LayoutError> {
        let canvas = doc.canvas;
        if canvas.width == 0 || canvas.height == 0 {
            return Err(LayoutError::EmptyCanvas {
                width: canvas.width,
                height: canvas.height,
            });
        }

        let mut anchors: [Option<BoxCorners>; 3] = [None; 3];
        for (tag, b) in &doc.anchors {
            let pos = AnchorPosition::parse(tag)
                .ok_or_else(|| LayoutError::UnknownAnchor(tag.clone()))?;
            if !box_inside(b, canvas) {
                return Err(LayoutError::InvalidAnchorBox { position: pos });
            }
            anchors[pos.index()] = Some(*b);
        }
        let anchor = |pos: AnchorPosition| anchors[pos.index()].ok_or(LayoutError::MissingAnchor(pos));
        let anchors = [
            anchor(AnchorPosition::Tl)?,
            anchor(AnchorPosition::Tr)?,
            anchor(AnchorPosition::Bl)?,
        ];

        let mut total_questions = 0usize;
        for (s, section) in doc.sections.iter().enumerate() {
            for (q, question) in section.questions.iter().enumerate() {
                total_questions += 1;
                if question.cells.is_empty() {
                    return Err(LayoutError::EmptyQuestion {
                        section: s,
                        question: q,
                    });
                }
                if question.cells.len() > MAX_OPTIONS {
                    return Err(LayoutError::TooManyCells {
                        section: s,
                        question: q,
                        cells: question.cells.len(),
                        max: MAX_OPTIONS,
                    });
                }
                let thickness = question.metadata.thickness;
                if thickness <= 0 {
                    return Err(LayoutError::InvalidThickness {
                        section: s,
                        question: q,
                        thickness,
                    });
                }
                for (c, b) in question.cells.iter().enumerate() {
                    if !box_inside(b, canvas) {
                        return Err(LayoutError::InvalidCellBox {
                            section: s,
                            question: q,
                            cell: c,
                        });
                    }
                }
            }
        }
        if total_questions == 0 {
            return Err(LayoutError::NoQuestions);
        }

        Ok(Self {
            canvas,
            anchors,
            sections: doc.sections,
        })
    }

    pub fn from_json_str(raw: &str) -> Result<Self, LayoutLoadError> {
        let doc: LayoutDocument = serde_json::from_str(raw).map_err(JsonIoError::from)?;
        Ok(Self::new(doc)?)
    }

    /// Load and validate a layout document from disk.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, LayoutLoadError> {
        let doc: LayoutDocument = read_json(path)?;
        Ok(Self::new(doc)?)
    }

    /// Write the layout in the generator's document format.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), JsonIoError> {
        write_json_pretty(path, &self.to_document())
    }

    pub fn to_document(&self) -> LayoutDocument {
        let anchors = [AnchorPosition::Tl, AnchorPosition::Tr, AnchorPosition::Bl]
            .into_iter()
            .map(|p| (p.as_str().to_string(), self.anchor(p)))
            .collect();
        LayoutDocument {
            sections: self.sections.clone(),
            anchors,
            canvas: self.canvas,
        }
    }

    #[inline]
    pub fn canvas(&self) -> Canvas {
        self.canvas
    }

    /// Reference box of the anchor at `pos`.
    #[inline]
    pub fn anchor(&self, pos: AnchorPosition) -> BoxCorners {
        self.anchors[pos.index()]
    }

    #[inline]
    pub fn sections(&self) -> &[SectionLayout] {
        &self.sections
    }

    /// All questions in section-major order.
    pub fn questions(&self) -> impl Iterator<Item = (QuestionId, &QuestionLayout)> + '_ {
        self.sections.iter().enumerate().flat_map(|(s, section)| {
            section.questions.iter().enumerate().map(move |(q, question)| {
                (
                    QuestionId {
                        section: s,
                        question: q,
                    },
                    question,
                )
            })
        })
    }

    /// Cells of one question, in drawing order.
    pub fn question_cells(&self, id: QuestionId) -> Vec<Cell> {
        let Some(question) = self
            .sections
            .get(id.section)
            .and_then(|s| s.questions.get(id.question))
        else {
            return Vec::new();
        };
        question
            .cells
            .iter()
            .enumerate()
            .map(|(index, bounds)| Cell {
                section: id.section,
                question: id.question,
                index,
                bounds: *bounds,
                thickness: question.metadata.thickness,
            })
            .collect()
    }

    pub fn question_count(&self) -> usize {
        self.sections.iter().map(|s| s.questions.len()).sum()
    }

    /// Table column names, one per question, in layout order.
    pub fn column_names(&self) -> Vec<String> {
        self.questions().map(|(id, _)| id.column_name()).collect()
    }
}

impl TryFrom<LayoutDocument> for LayoutReference {
    type Error = LayoutError;

    fn try_from(doc: LayoutDocument) -> Result<Self, Self::Error> {
        LayoutReference::new(doc)
    }
}

impl From<LayoutReference> for LayoutDocument {
    fn from(layout: LayoutReference) -> Self {
        layout.to_document()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = r#"{
        "Sections": [
            {"Questions": [
                {"Metadata": {"thickness": 4}, "Cells": [[[300, 400], [370, 470]], [[390, 400], [460, 470]]]},
                {"Metadata": {"thickness": 4}, "Cells": [[[300, 530], [370, 600]]]}
            ]},
            {"Questions": [
                {"Metadata": {"thickness": 2}, "Cells": [[[300, 700], [340, 740]]]}
            ]}
        ],
        "Codes": {
            "bl": [[80, 1485], [269, 1674]],
            "tl": [[80, 80], [269, 269]],
            "tr": [[971, 80], [1160, 269]]
        }
    }"#;

    #[test]
    fn parses_generator_document() {
        let layout = LayoutReference::from_json_str(DOC).expect("layout");
        assert_eq!(layout.canvas(), Canvas::default());
        assert_eq!(layout.anchor(AnchorPosition::Tr), BoxCorners::new(971, 80, 1160, 269));
        assert_eq!(layout.question_count(), 3);
        assert_eq!(layout.column_names(), vec!["S1Q1", "S1Q2", "S2Q1"]);

        let cells = layout.question_cells(QuestionId {
            section: 0,
            question: 0,
        });
        assert_eq!(cells.len(), 2);
        assert_eq!(cells[1].bounds.x1(), 390);
        assert_eq!(cells[1].search_margin(), 12);
        assert_eq!(cells[1].nominal_area(), 70 * 70);
    }

    #[test]
    fn missing_anchor_is_rejected() {
        let raw = DOC.replace(r#""bl": [[80, 1485], [269, 1674]],"#, "");
        let err = LayoutReference::from_json_str(&raw).unwrap_err();
        assert!(matches!(
            err,
            LayoutLoadError::Layout(LayoutError::MissingAnchor(AnchorPosition::Bl))
        ));
    }

    #[test]
    fn cell_outside_canvas_is_rejected() {
        let raw = DOC.replace("[[300, 700], [340, 740]]", "[[300, 1750], [340, 1790]]");
        let err = LayoutReference::from_json_str(&raw).unwrap_err();
        assert!(matches!(
            err,
            LayoutLoadError::Layout(LayoutError::InvalidCellBox {
                section: 1,
                question: 0,
                cell: 0
            })
        ));
    }

    #[test]
    fn question_wider_than_the_label_alphabet_is_rejected() {
        let cells: Vec<String> = (0..14)
            .map(|i| format!("[[{}, 700], [{}, 740]]", 100 + 60 * i, 140 + 60 * i))
            .collect();
        let raw = DOC.replace("[[300, 700], [340, 740]]", &cells.join(", "));
        let err = LayoutReference::from_json_str(&raw).unwrap_err();
        assert!(matches!(
            err,
            LayoutLoadError::Layout(LayoutError::TooManyCells {
                section: 1,
                question: 0,
                cells: 14,
                max: 13
            })
        ));
    }

    #[test]
    fn zero_thickness_is_rejected() {
        let raw = DOC.replace(r#""thickness": 2"#, r#""thickness": 0"#);
        assert!(LayoutReference::from_json_str(&raw).is_err());
    }

    #[test]
    fn serde_round_trip_goes_through_validation() {
        let layout = LayoutReference::from_json_str(DOC).expect("layout");
        let json = serde_json::to_string(&layout).expect("serialize");
        let back: LayoutReference = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, layout);

        let bad = json.replace(r#""thickness":4"#, r#""thickness":-1"#);
        assert!(serde_json::from_str::<LayoutReference>(&bad).is_err());
    }
}
