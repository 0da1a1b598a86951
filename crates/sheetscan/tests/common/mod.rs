//! Synthetic answer sheets with rendered QR anchors.

#![allow(dead_code)]

use qrcode::{Color, QrCode};
use sheetscan::core::{AnchorPosition, GrayImage, LayoutReference, PixelRect};
use sheetscan::recovery::format_payload;
use std::path::Path;

pub const WIDTH: usize = 600;
pub const HEIGHT: usize = 800;
const MODULE: usize = 4;
const THICKNESS: i64 = 3;
const ORIGINS: [(AnchorPosition, usize, usize); 3] = [
    (AnchorPosition::Tl, 40, 40),
    (AnchorPosition::Tr, 476, 40),
    (AnchorPosition::Bl, 40, 676),
];
/// Top edge of each question row; every question has four 40px cells.
const ROWS: [i64; 2] = [300, 400];
const COLUMNS: [i64; 4] = [200, 260, 320, 380];

fn qr_side(payload: &str) -> usize {
    QrCode::new(payload.as_bytes()).expect("encode").width() * MODULE
}

fn draw_qr(img: &mut GrayImage, payload: &str, x0: usize, y0: usize) {
    let code = QrCode::new(payload.as_bytes()).expect("encode");
    let n = code.width();
    for (i, c) in code.to_colors().into_iter().enumerate() {
        if c == Color::Dark {
            let x = (x0 + (i % n) * MODULE) as i64;
            let y = (y0 + (i / n) * MODULE) as i64;
            img.fill_rect(
                PixelRect::from_corners(x, y, x + MODULE as i64, y + MODULE as i64),
                0,
            );
        }
    }
}

/// Layout of the synthetic sheet; anchor boxes depend on the QR size of `code`.
pub fn layout_json(code: &str) -> String {
    let anchors: Vec<String> = ORIGINS
        .iter()
        .map(|&(pos, x, y)| {
            let side = qr_side(&format_payload(pos, code));
            format!(
                "\"{}\": [[{}, {}], [{}, {}]]",
                pos.as_str(),
                x,
                y,
                x + side,
                y + side
            )
        })
        .collect();
    let questions: Vec<String> = ROWS
        .iter()
        .map(|&y| {
            let cells: Vec<String> = COLUMNS
                .iter()
                .map(|&x| format!("[[{}, {}], [{}, {}]]", x, y, x + 40, y + 40))
                .collect();
            format!(
                r#"{{"Metadata": {{"thickness": {THICKNESS}}}, "Cells": [{}]}}"#,
                cells.join(", ")
            )
        })
        .collect();
    format!(
        r#"{{"Sections": [{{"Questions": [{}]}}], "Codes": {{ {} }}, "Page": {{"width": {WIDTH}, "height": {HEIGHT}}}}}"#,
        questions.join(", "),
        anchors.join(", ")
    )
}

pub fn layout(code: &str) -> LayoutReference {
    LayoutReference::from_json_str(&layout_json(code)).expect("layout")
}

/// Render sheet `code` with one marked option per question (`marks[q]` is the cell index).
pub fn render_sheet(code: &str, marks: &[usize]) -> GrayImage {
    let mut img = GrayImage::filled(WIDTH, HEIGHT, 255);
    for &(pos, x, y) in &ORIGINS {
        draw_qr(&mut img, &format_payload(pos, code), x, y);
    }
    for (q, &y) in ROWS.iter().enumerate() {
        for (i, &x) in COLUMNS.iter().enumerate() {
            let rect = PixelRect::from_corners(x, y, x + 40, y + 40);
            img.fill_rect(rect, 0);
            img.fill_rect(rect.inflate(-THICKNESS), 255);
            if marks.get(q) == Some(&i) {
                img.fill_rect(rect.inflate(-10), 0);
            }
        }
    }
    img
}

pub fn to_image(img: &GrayImage) -> image::GrayImage {
    image::GrayImage::from_raw(img.width as u32, img.height as u32, img.data.clone())
        .expect("buffer size")
}

pub fn save_png(img: &GrayImage, path: &Path) {
    to_image(img).save(path).expect("save png");
}
