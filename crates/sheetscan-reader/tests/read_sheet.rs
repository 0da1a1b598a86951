use sheetscan_core::{BoxCorners, GrayImage, LayoutReference, PixelRect, LABELS};
use sheetscan_reader::{
    Classifier, ClassifierKind, ClassifyError, ExtractedPatch, ExtractionFailure, PatchModel,
    RegionExtractor, SheetReader,
};
use std::sync::Arc;

const LAYOUT: &str = r#"{
    "Sections": [
        {"Questions": [
            {"Metadata": {"thickness": 2},
             "Cells": [[[40, 40], [80, 80]], [[100, 40], [140, 80]], [[160, 40], [200, 80]], [[220, 40], [260, 80]]]},
            {"Metadata": {"thickness": 2},
             "Cells": [[[40, 120], [80, 160]], [[100, 120], [140, 160]], [[160, 120], [200, 160]]]}
        ]},
        {"Questions": [
            {"Metadata": {"thickness": 2},
             "Cells": [[[40, 200], [80, 240]], [[100, 200], [140, 240]]]}
        ]}
    ],
    "Codes": {
        "tl": [[300, 10], [340, 50]],
        "tr": [[350, 10], [390, 50]],
        "bl": [[300, 250], [340, 290]]
    },
    "Page": {"width": 400, "height": 300}
}"#;

fn draw_box(img: &mut GrayImage, b: BoxCorners, thickness: i64) {
    img.fill_rect(b.rect(), 0);
    img.fill_rect(b.rect().inflate(-thickness), 255);
}

/// Layout plus a rendered sheet: S1Q1 has option B marked, S1Q2 is blank and
/// the second cell of S2Q1 was never printed.
fn sheet() -> (Arc<LayoutReference>, GrayImage) {
    let layout = Arc::new(LayoutReference::from_json_str(LAYOUT).expect("layout"));
    let mut img = GrayImage::filled(400, 300, 255);
    for (id, q) in layout.questions() {
        for (i, b) in q.cells.iter().enumerate() {
            if id.section == 1 && i == 1 {
                continue;
            }
            draw_box(&mut img, *b, q.metadata.thickness);
        }
    }
    img.fill_rect(PixelRect::from_corners(108, 48, 132, 72), 0);
    (layout, img)
}

struct InkModel;

impl PatchModel for InkModel {
    fn predict(&self, batch: &[&ExtractedPatch]) -> Result<Vec<Vec<f32>>, ClassifyError> {
        Ok(batch
            .iter()
            .map(|p| {
                let mut probs = vec![0.01; LABELS.len()];
                let hit = if p.mean() > 0.2 { 0 } else { LABELS.len() - 1 };
                probs[hit] = 0.87;
                probs
            })
            .collect())
    }
}

#[test]
fn brightness_reader_picks_marked_option() {
    let (layout, img) = sheet();
    let reader = SheetReader::new(
        layout,
        RegionExtractor::default(),
        Classifier::from_kind(ClassifierKind::Brightness, None).expect("classifier"),
    );
    let sheet = reader.read("09-01", &img.view()).expect("read");

    assert_eq!(sheet.answers(), vec!["B", "_", "_"]);
    let columns: Vec<&str> = sheet.questions.iter().map(|q| q.column.as_str()).collect();
    assert_eq!(columns, vec!["S1Q1", "S1Q2", "S2Q1"]);

    assert_eq!(sheet.warnings.len(), 1);
    let w = &sheet.warnings[0];
    assert_eq!((w.section, w.question, w.cell), (1, 0, 1));
    assert!(matches!(w.failure, ExtractionFailure::NoEnclosingContour { .. }));
    assert_eq!(w.to_string(), "sheet 09-01 S2Q1 cell 2: no contour encloses the nominal area 1600");
}

#[test]
fn model_reader_labels_every_cell() {
    let (layout, img) = sheet();
    let model: Arc<dyn PatchModel> = Arc::new(InkModel);
    let reader = SheetReader::new(
        layout,
        RegionExtractor::default(),
        Classifier::from_kind(ClassifierKind::Model, Some(model)).expect("classifier"),
    );
    let sheet = reader.read("09-02", &img.view()).expect("read");

    assert_eq!(sheet.answers(), vec!["_A__", "___", "__"]);
    let s2q1 = &sheet.questions[2].labels;
    assert!(s2q1.cells[0].is_some());
    assert_eq!(s2q1.cells[1], None);
}

#[test]
fn sheet_report_serializes() {
    let (layout, img) = sheet();
    let reader = SheetReader::new(layout, RegionExtractor::default(), Classifier::Brightness);
    let sheet = reader.read("09-03", &img.view()).expect("read");
    let json = serde_json::to_value(&sheet).expect("json");
    assert_eq!(json["questions"][0]["column"], "S1Q1");
    assert_eq!(json["questions"][0]["answer"], "B");
    assert_eq!(json["warnings"][0]["failure"]["no_enclosing_contour"]["nominal_area"], 1600);
}

const WIDE_LAYOUT: &str = r#"{
    "Sections": [
        {"Questions": [
            {"Metadata": {"thickness": 2},
             "Cells": [[[40, 40], [90, 70]], [[110, 40], [160, 70]], [[180, 40], [230, 70]]]},
            {"Metadata": {"thickness": 2},
             "Cells": [[[40, 110], [90, 140]], [[110, 110], [160, 140]], [[180, 110], [230, 140]]]}
        ]}
    ],
    "Codes": {
        "tl": [[300, 10], [340, 50]],
        "tr": [[350, 10], [390, 50]],
        "bl": [[300, 250], [340, 290]]
    },
    "Page": {"width": 400, "height": 300}
}"#;

/// Rectangular cells: S1Q1 has option C marked, S1Q2 is blank.
fn wide_sheet() -> (Arc<LayoutReference>, GrayImage) {
    let layout = Arc::new(LayoutReference::from_json_str(WIDE_LAYOUT).expect("layout"));
    let mut img = GrayImage::filled(400, 300, 255);
    for (_, q) in layout.questions() {
        for b in &q.cells {
            draw_box(&mut img, *b, q.metadata.thickness);
        }
    }
    img.fill_rect(PixelRect::from_corners(190, 46, 220, 62), 0);
    (layout, img)
}

#[test]
fn rectangular_blank_cells_read_blank_with_either_classifier() {
    let (layout, img) = wide_sheet();

    let brightness = SheetReader::new(layout.clone(), RegionExtractor::default(), Classifier::Brightness)
        .read("10-01", &img.view())
        .expect("read");
    assert_eq!(brightness.answers(), vec!["C", "_"]);
    assert!(brightness.warnings.is_empty());
    assert_eq!(brightness.questions[1].labels.brightness, vec![0.0, 0.0, 0.0]);

    let model: Arc<dyn PatchModel> = Arc::new(InkModel);
    let by_model = SheetReader::new(layout, RegionExtractor::default(), Classifier::Model(model))
        .read("10-01", &img.view())
        .expect("read");
    assert_eq!(by_model.answers(), vec!["__A", "___"]);
}
