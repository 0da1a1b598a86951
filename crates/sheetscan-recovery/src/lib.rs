//! Sheet recovery: locate the three QR anchors printed on an answer sheet,
//! read the sheet code they carry, and warp the scan onto the reference
//! layout with an affine transform.
//!
//! ```no_run
//! use std::sync::Arc;
//! use sheetscan_core::LayoutReference;
//! use sheetscan_recovery::{Rectifier, RectifierParams};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let layout = Arc::new(LayoutReference::load_json("layout.json")?);
//! let scan = image::open("scan.png")?.to_luma8();
//! let rectifier = Rectifier::new(layout, RectifierParams::default());
//! let sheet = rectifier.rectify(&scan)?;
//! println!("sheet {}", sheet.code);
//! # Ok(())
//! # }
//! ```

mod anchor;
mod error;
mod rectifier;

pub use anchor::{format_payload, parse_payload, AnchorDecoder, AnchorDetection, QrAnchorDecoder};
pub use error::RecoveryError;
pub use rectifier::{
    gray_view, AnchorResolution, Correspondence, RectifiedSheet, Rectifier, RectifierParams,
};
