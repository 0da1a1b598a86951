//! Anchor markers: payload format and QR decoding.

use nalgebra::Point2;
use serde::{Deserialize, Serialize};
use sheetscan_core::{AnchorPosition, GrayImageView};

/// One anchor symbol found in a scan.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnchorDetection {
    /// Decoded payload, `None` if the symbol was located but could not be decoded.
    pub payload: Option<String>,
    /// Symbol corners in scan pixels: TL, TR, BR, BL (in the symbol's own orientation).
    pub quad: [Point2<f32>; 4],
}

impl AnchorDetection {
    /// Position tag and sheet code, or `None` for an unrecognized payload.
    pub fn parsed(&self) -> Option<(AnchorPosition, &str)> {
        self.payload.as_deref().and_then(parse_payload)
    }
}

/// Parse an anchor payload of the form `"position|code"`.
///
/// The position must be one of `tl`, `tr`, `bl` and the code must be non-empty.
pub fn parse_payload(payload: &str) -> Option<(AnchorPosition, &str)> {
    let (tag, code) = payload.split_once('|')?;
    if code.is_empty() || code.contains('|') {
        return None;
    }
    Some((AnchorPosition::parse(tag)?, code))
}

/// Payload written into the anchor at `position` of sheet `code`.
pub fn format_payload(position: AnchorPosition, code: &str) -> String {
    format!("{}|{}", position.as_str(), code)
}

/// Locates and decodes every anchor symbol in a scan.
pub trait AnchorDecoder: Send + Sync {
    fn decode_anchors(&self, image: &GrayImageView<'_>) -> Vec<AnchorDetection>;
}

/// QR anchor decoder backed by `rqrr`.
#[derive(Clone, Copy, Debug, Default)]
pub struct QrAnchorDecoder;

impl AnchorDecoder for QrAnchorDecoder {
    fn decode_anchors(&self, image: &GrayImageView<'_>) -> Vec<AnchorDetection> {
        let mut prepared =
            rqrr::PreparedImage::prepare_from_greyscale(image.width, image.height, |x, y| {
                image.get(x, y)
            });
        let grids = prepared.detect_grids();
        log::debug!("qr: {} candidate symbols", grids.len());

        grids
            .iter()
            .map(|grid| {
                let b = &grid.bounds;
                let quad = [0, 1, 2, 3].map(|i| Point2::new(b[i].x as f32, b[i].y as f32));
                let payload = match grid.decode() {
                    Ok((_meta, content)) => Some(content),
                    Err(err) => {
                        log::debug!("qr: symbol at ({}, {}) not decoded: {err}", b[0].x, b[0].y);
                        None
                    }
                };
                AnchorDetection { payload, quad }
            })
            .collect()
    }
}
