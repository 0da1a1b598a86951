use crate::anchor::{AnchorDecoder, AnchorDetection, QrAnchorDecoder};
use crate::RecoveryError;
use ::image::imageops::{self, FilterType};
use nalgebra::Point2;
use serde::{Deserialize, Serialize};
use sheetscan_core::{
    affine_from_3pt, triangle_area2, warp_affine_gray, Affine, AnchorPosition, GrayImage,
    GrayImageView, LayoutReference, MIN_TRIANGLE_AREA2,
};
use std::collections::BTreeMap;
use std::sync::Arc;

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Rectification settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RectifierParams {
    /// Quad corner (TL=0, TR=1, BR=2, BL=3) paired with the anchor box's second point.
    pub primary_corner: usize,
    /// Quad corner paired with the anchor box's first point when only two
    /// anchors resolve and a third correspondence has to be synthesized.
    pub secondary_corner: usize,
    /// Gray value written where the warp samples outside the scan.
    pub background: u8,
    /// Unrecognized payloads tolerated per scan.
    pub max_unrecognized: usize,
}

impl Default for RectifierParams {
    fn default() -> Self {
        Self {
            primary_corner: 2,
            secondary_corner: 0,
            background: 255,
            max_unrecognized: 1,
        }
    }
}

/// One scan → reference point pair.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Correspondence {
    pub position: AnchorPosition,
    pub src: Point2<f32>,
    pub dst: Point2<f32>,
    /// True for the extra pair built from a second corner of an anchor.
    pub synthesized: bool,
}

/// Anchors resolved from one scan, ready for transform estimation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnchorResolution {
    pub code: String,
    pub resolved: Vec<AnchorPosition>,
    pub unrecognized: usize,
    /// Exactly three non-collinear pairs.
    pub correspondences: Vec<Correspondence>,
}

/// A scan mapped into the layout's coordinate frame.
#[derive(Clone, Debug)]
pub struct RectifiedSheet {
    pub code: String,
    pub image: GrayImage,
    /// Maps scan pixels to reference pixels.
    pub transform: Affine,
    pub resolution: AnchorResolution,
    pub warnings: Vec<String>,
}

/// Detects anchors in a scan and warps it onto the reference layout.
pub struct Rectifier {
    layout: Arc<LayoutReference>,
    params: RectifierParams,
    decoder: Box<dyn AnchorDecoder>,
}

impl Rectifier {
    /// Rectifier using the built-in QR decoder.
    pub fn new(layout: Arc<LayoutReference>, params: RectifierParams) -> Self {
        Self::with_decoder(layout, params, Box::new(QrAnchorDecoder))
    }

    pub fn with_decoder(
        layout: Arc<LayoutReference>,
        params: RectifierParams,
        decoder: Box<dyn AnchorDecoder>,
    ) -> Self {
        Self {
            layout,
            params,
            decoder,
        }
    }

    #[inline]
    pub fn layout(&self) -> &LayoutReference {
        &self.layout
    }

    #[inline]
    pub fn params(&self) -> &RectifierParams {
        &self.params
    }

    /// Rectify a scan of any size; it is first resized to the layout canvas.
    pub fn rectify(&self, scan: &::image::GrayImage) -> Result<RectifiedSheet, RecoveryError> {
        let canvas = self.layout.canvas();
        let (w, h) = (canvas.width as u32, canvas.height as u32);
        if scan.dimensions() == (w, h) {
            return self.rectify_view(&gray_view(scan));
        }
        log::debug!(
            "resizing scan {}x{} to canvas {}x{}",
            scan.width(),
            scan.height(),
            w,
            h
        );
        let resized = imageops::resize(scan, w, h, FilterType::Triangle);
        self.rectify_view(&gray_view(&resized))
    }

    /// Rectify a scan that already has the canvas size.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "info", skip(self, scan), fields(width = scan.width, height = scan.height))
    )]
    pub fn rectify_view(&self, scan: &GrayImageView<'_>) -> Result<RectifiedSheet, RecoveryError> {
        let canvas = self.layout.canvas();
        if scan.width != canvas.width || scan.height != canvas.height {
            return Err(RecoveryError::ScanSize {
                width: canvas.width,
                height: canvas.height,
                got_width: scan.width,
                got_height: scan.height,
            });
        }

        let detections = self.decoder.decode_anchors(scan);
        let resolution = self.resolve(&detections)?;
        let transform = self.estimate_transform(&resolution)?;

        let image = warp_affine_gray(
            scan,
            &transform,
            canvas.width,
            canvas.height,
            self.params.background,
        )
        .ok_or_else(|| RecoveryError::DegenerateCorrespondences {
            code: resolution.code.clone(),
        })?;

        let mut warnings = Vec::new();
        if resolution.resolved.len() == 2 {
            let msg = format!("{}: only two anchors found", resolution.code);
            log::warn!("{msg}");
            warnings.push(msg);
        }
        if resolution.unrecognized > 0 {
            let msg = format!(
                "{}: {} unrecognized anchor payload(s)",
                resolution.code, resolution.unrecognized
            );
            log::warn!("{msg}");
            warnings.push(msg);
        }

        Ok(RectifiedSheet {
            code: resolution.code.clone(),
            image,
            transform,
            resolution,
            warnings,
        })
    }

    /// Turn raw detections into the sheet code and three point pairs.
    pub fn resolve(&self, detections: &[AnchorDetection]) -> Result<AnchorResolution, RecoveryError> {
        if detections.is_empty() {
            return Err(RecoveryError::NoAnchors);
        }

        let mut quads: BTreeMap<AnchorPosition, [Point2<f32>; 4]> = BTreeMap::new();
        let mut codes: Vec<String> = Vec::new();
        let mut unrecognized = 0usize;

        for det in detections {
            let Some((position, code)) = det.parsed() else {
                unrecognized += 1;
                continue;
            };
            if !codes.iter().any(|c| c == code) {
                codes.push(code.to_string());
            }
            if quads.contains_key(&position) {
                log::warn!("anchor `{position}` detected more than once; keeping the first");
                continue;
            }
            quads.insert(position, det.quad);
        }

        if unrecognized > self.params.max_unrecognized {
            return Err(RecoveryError::AmbiguousAnchors { unrecognized });
        }
        if codes.len() > 1 {
            return Err(RecoveryError::ConflictingCodes { codes });
        }

        let primary = self.params.primary_corner.min(3);
        let mut correspondences: Vec<Correspondence> = AnchorPosition::PRIORITY
            .iter()
            .filter_map(|&position| {
                let quad = quads.get(&position)?;
                Some(Correspondence {
                    position,
                    src: quad[primary],
                    dst: self.layout.anchor(position).corner(1),
                    synthesized: false,
                })
            })
            .collect();
        let resolved: Vec<AnchorPosition> = correspondences.iter().map(|c| c.position).collect();

        let code = codes.into_iter().next();
        if correspondences.len() < 2 {
            return Err(RecoveryError::InsufficientAnchors {
                found: correspondences.len(),
                code,
            });
        }
        let Some(code) = code else {
            return Err(RecoveryError::InsufficientAnchors { found: 0, code: None });
        };

        if correspondences.len() == 2 {
            let secondary = self.params.secondary_corner.min(3);
            let extra = resolved.iter().find_map(|&position| {
                let candidate = Correspondence {
                    position,
                    src: quads[&position][secondary],
                    dst: self.layout.anchor(position).corner(0),
                    synthesized: true,
                };
                let (a, b) = (&correspondences[0], &correspondences[1]);
                let ok = triangle_area2(a.src, b.src, candidate.src) >= MIN_TRIANGLE_AREA2
                    && triangle_area2(a.dst, b.dst, candidate.dst) >= MIN_TRIANGLE_AREA2;
                ok.then_some(candidate)
            });
            match extra {
                Some(c) => correspondences.push(c),
                None => return Err(RecoveryError::DegenerateCorrespondences { code }),
            }
        }

        log::debug!(
            "sheet {code}: anchors {:?}, {} unrecognized",
            resolved,
            unrecognized
        );

        Ok(AnchorResolution {
            code,
            resolved,
            unrecognized,
            correspondences,
        })
    }

    /// Affine transform mapping scan pixels onto the reference frame.
    pub fn estimate_transform(&self, resolution: &AnchorResolution) -> Result<Affine, RecoveryError> {
        let degenerate = || RecoveryError::DegenerateCorrespondences {
            code: resolution.code.clone(),
        };
        let pairs: &[Correspondence; 3] = resolution
            .correspondences
            .as_slice()
            .try_into()
            .map_err(|_| degenerate())?;
        let src = pairs.map(|c| c.src);
        let dst = pairs.map(|c| c.dst);
        affine_from_3pt(&src, &dst).ok_or_else(degenerate)
    }
}

/// Convert an `image::GrayImage` into the lightweight core view type.
pub fn gray_view(img: &::image::GrayImage) -> GrayImageView<'_> {
    GrayImageView {
        width: img.width() as usize,
        height: img.height() as usize,
        data: img.as_raw(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anchor::format_payload;
    use sheetscan_core::PixelRect;

    const DOC: &str = r#"{
        "Sections": [{"Questions": [
            {"Metadata": {"thickness": 2}, "Cells": [[[150, 200], [180, 230]], [[190, 200], [220, 230]]]}
        ]}],
        "Codes": {
            "tl": [[20, 20], [80, 80]],
            "tr": [[320, 20], [380, 80]],
            "bl": [[20, 420], [80, 480]]
        },
        "Page": {"width": 400, "height": 500}
    }"#;

    struct FixedDecoder(Vec<AnchorDetection>);

    impl AnchorDecoder for FixedDecoder {
        fn decode_anchors(&self, _image: &GrayImageView<'_>) -> Vec<AnchorDetection> {
            self.0.clone()
        }
    }

    fn layout() -> Arc<LayoutReference> {
        Arc::new(LayoutReference::from_json_str(DOC).expect("layout"))
    }

    /// Detections for anchors as they appear after mapping the reference through `scan_from_ref`.
    fn detections(
        layout: &LayoutReference,
        scan_from_ref: &Affine,
        positions: &[AnchorPosition],
        code: &str,
    ) -> Vec<AnchorDetection> {
        positions
            .iter()
            .map(|&p| {
                let b = layout.anchor(p);
                let corners = [
                    Point2::new(b.x1() as f32, b.y1() as f32),
                    Point2::new(b.x2() as f32, b.y1() as f32),
                    Point2::new(b.x2() as f32, b.y2() as f32),
                    Point2::new(b.x1() as f32, b.y2() as f32),
                ];
                AnchorDetection {
                    payload: Some(format_payload(p, code)),
                    quad: corners.map(|c| scan_from_ref.apply(c)),
                }
            })
            .collect()
    }

    fn rectifier(dets: Vec<AnchorDetection>) -> Rectifier {
        Rectifier::with_decoder(
            layout(),
            RectifierParams::default(),
            Box::new(FixedDecoder(dets)),
        )
    }

    fn all() -> [AnchorPosition; 3] {
        [AnchorPosition::Tl, AnchorPosition::Tr, AnchorPosition::Bl]
    }

    #[test]
    fn aligned_scan_reproduces_cell_coordinates() {
        let layout = layout();
        let dets = detections(&layout, &Affine::identity(), &all(), "09-01");
        let r = rectifier(dets);

        let mut scan = GrayImage::filled(400, 500, 255);
        scan.fill_rect(PixelRect::from_corners(150, 200, 180, 230), 0);

        let sheet = r.rectify_view(&scan.view()).expect("rectify");
        assert_eq!(sheet.code, "09-01");
        assert!(sheet.warnings.is_empty());
        for cell in layout.question_cells(sheetscan_core::QuestionId {
            section: 0,
            question: 0,
        }) {
            for k in 0..2 {
                let p = cell.bounds.corner(k);
                let q = sheet.transform.apply(p);
                assert!((p.x - q.x).abs() <= 1.0 && (p.y - q.y).abs() <= 1.0);
            }
        }
        assert_eq!(sheet.image, scan);
    }

    #[test]
    fn rotated_scan_is_restored_from_three_anchors() {
        let layout = layout();
        let (s, c) = (0.03_f64.sin(), 0.03_f64.cos());
        let scan_from_ref = Affine::from_rows([[c, -s, 12.0], [s, c, -7.0]]);
        let r = rectifier(detections(&layout, &scan_from_ref, &all(), "10-02"));

        let res = r
            .resolve(&r.decoder.decode_anchors(&GrayImage::filled(1, 1, 0).view()))
            .expect("resolve");
        assert_eq!(
            res.resolved,
            vec![AnchorPosition::Bl, AnchorPosition::Tl, AnchorPosition::Tr]
        );
        assert!(res.correspondences.iter().all(|c| !c.synthesized));

        let t = r.estimate_transform(&res).expect("transform");
        for p in [Point2::new(150.0_f32, 200.0), Point2::new(390.0, 490.0)] {
            let back = t.apply(scan_from_ref.apply(p));
            approx::assert_abs_diff_eq!(back.x, p.x, epsilon = 1e-2);
            approx::assert_abs_diff_eq!(back.y, p.y, epsilon = 1e-2);
        }
    }

    #[test]
    fn two_anchors_synthesize_a_third_pair() {
        let layout = layout();
        let (s, c) = (0.02_f64.sin(), 0.02_f64.cos());
        let scan_from_ref = Affine::from_rows([[c, -s, 5.0], [s, c, 9.0]]);
        let dets = detections(
            &layout,
            &scan_from_ref,
            &[AnchorPosition::Tr, AnchorPosition::Bl],
            "11-00",
        );
        let r = rectifier(dets.clone());

        let res = r.resolve(&dets).expect("resolve");
        assert_eq!(res.correspondences.len(), 3);
        assert!(res.correspondences[2].synthesized);
        assert_eq!(res.correspondences[2].position, AnchorPosition::Bl);

        let t = r.estimate_transform(&res).expect("transform");
        let p = Point2::new(200.0_f32, 250.0);
        let back = t.apply(scan_from_ref.apply(p));
        approx::assert_abs_diff_eq!(back.x, p.x, epsilon = 1e-2);
        approx::assert_abs_diff_eq!(back.y, p.y, epsilon = 1e-2);

        let sheet = r
            .rectify_view(&GrayImage::filled(400, 500, 255).view())
            .expect("rectify");
        assert_eq!(sheet.warnings.len(), 1);
    }

    #[test]
    fn single_anchor_fails() {
        let layout = layout();
        let dets = detections(&layout, &Affine::identity(), &[AnchorPosition::Tl], "09-01");
        let r = rectifier(dets);
        let err = r
            .rectify_view(&GrayImage::filled(400, 500, 255).view())
            .unwrap_err();
        assert_eq!(
            err,
            RecoveryError::InsufficientAnchors {
                found: 1,
                code: Some("09-01".into())
            }
        );
    }

    #[test]
    fn two_unrecognized_payloads_fail() {
        let layout = layout();
        let mut dets = detections(&layout, &Affine::identity(), &all(), "09-01");
        dets[0].payload = Some("garbage".into());
        dets[1].payload = None;
        let r = rectifier(dets.clone());
        assert_eq!(
            r.resolve(&dets).unwrap_err(),
            RecoveryError::AmbiguousAnchors { unrecognized: 2 }
        );

        // one unrecognized payload is tolerated
        dets[1].payload = Some(format_payload(AnchorPosition::Tr, "09-01"));
        let res = r.resolve(&dets).expect("resolve");
        assert_eq!(res.unrecognized, 1);
        assert_eq!(res.resolved.len(), 2);
    }

    #[test]
    fn conflicting_codes_fail() {
        let layout = layout();
        let mut dets = detections(&layout, &Affine::identity(), &all(), "09-01");
        dets[2].payload = Some(format_payload(AnchorPosition::Bl, "09-02"));
        let r = rectifier(dets.clone());
        assert!(matches!(
            r.resolve(&dets),
            Err(RecoveryError::ConflictingCodes { .. })
        ));
    }

    #[test]
    fn repeated_tag_with_another_code_conflicts() {
        let layout = layout();
        let mut dets = detections(&layout, &Affine::identity(), &all(), "09-01");
        let mut stray = dets[0].clone();
        stray.payload = Some(format_payload(AnchorPosition::Tl, "09-99"));
        dets.insert(1, stray);
        let r = rectifier(dets.clone());
        match r.resolve(&dets) {
            Err(RecoveryError::ConflictingCodes { codes }) => {
                assert_eq!(codes, vec!["09-01".to_string(), "09-99".to_string()]);
            }
            other => panic!("expected conflicting codes, got {other:?}"),
        }
    }

    #[test]
    fn repeated_tag_with_the_same_code_keeps_the_first() {
        let layout = layout();
        let mut dets = detections(&layout, &Affine::identity(), &all(), "09-01");
        let mut echo = dets[0].clone();
        echo.quad = echo.quad.map(|p| Point2::new(p.x + 50.0, p.y + 50.0));
        dets.push(echo);
        let r = rectifier(dets.clone());
        let res = r.resolve(&dets).expect("resolution");
        assert_eq!(res.code, "09-01");
        let tl = res
            .correspondences
            .iter()
            .find(|c| c.position == AnchorPosition::Tl)
            .expect("tl pair");
        assert_eq!(tl.src, dets[0].quad[2]);
    }

    #[test]
    fn no_detections_and_wrong_size_fail() {
        let r = rectifier(Vec::new());
        assert_eq!(
            r.rectify_view(&GrayImage::filled(400, 500, 255).view())
                .unwrap_err(),
            RecoveryError::NoAnchors
        );
        assert!(matches!(
            r.rectify_view(&GrayImage::filled(40, 50, 255).view()),
            Err(RecoveryError::ScanSize { .. })
        ));
    }

    #[test]
    fn rectify_resizes_scans_to_canvas() {
        let layout = layout();
        let r = rectifier(detections(&layout, &Affine::identity(), &all(), "09-01"));
        let scan = ::image::GrayImage::from_pixel(200, 250, ::image::Luma([255u8]));
        let sheet = r.rectify(&scan).expect("rectify");
        assert_eq!((sheet.image.width, sheet.image.height), (400, 500));
    }
}
