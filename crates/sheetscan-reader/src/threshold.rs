//! Global Otsu binarization of a cell search window.

use sheetscan_core::GrayImage;

/// Otsu threshold of a set of intensities.
///
/// Pixels strictly above the returned value belong to the bright class.
pub(crate) fn otsu_threshold(samples: &[u8]) -> u8 {
    if samples.is_empty() {
        return 127;
    }

    let mut hist = [0u32; 256];
    for &v in samples {
        hist[v as usize] += 1;
    }
    let min_v = hist.iter().position(|&h| h > 0).unwrap_or(0);
    let max_v = hist.iter().rposition(|&h| h > 0).unwrap_or(255);
    if min_v == max_v {
        return min_v as u8;
    }
    // two levels only (printed boxes on clean paper): split halfway
    if hist.iter().filter(|&&h| h > 0).count() <= 2 {
        return ((min_v + max_v) / 2) as u8;
    }

    let total = samples.len() as f64;
    let sum_total: f64 = hist
        .iter()
        .enumerate()
        .map(|(i, &h)| i as f64 * h as f64)
        .sum();

    let mut sum_b = 0f64;
    let mut w_b = 0f64;
    let mut best_var = -1f64;
    let mut best_t = 127u8;

    for (t, &h) in hist.iter().enumerate() {
        w_b += h as f64;
        if w_b < 1.0 {
            continue;
        }
        let w_f = total - w_b;
        if w_f < 1.0 {
            break;
        }

        sum_b += t as f64 * h as f64;
        let m_b = sum_b / w_b;
        let m_f = (sum_total - sum_b) / w_f;

        let var_between = w_b * w_f * (m_b - m_f) * (m_b - m_f);
        if var_between > best_var {
            best_var = var_between;
            best_t = t as u8;
        }
    }

    best_t
}

/// Binary mask of `roi` (255 above the Otsu threshold, 0 elsewhere) in the
/// buffer type `imageproc` traces contours on.
pub(crate) fn binarize_otsu(roi: &GrayImage) -> (u8, image::GrayImage) {
    let t = otsu_threshold(&roi.data);
    let data = roi
        .data
        .iter()
        .map(|&v| if v > t { 255 } else { 0 })
        .collect::<Vec<u8>>();
    let mask = image::GrayImage::from_raw(roi.width as u32, roi.height as u32, data)
        .unwrap_or_else(|| image::GrayImage::new(roi.width as u32, roi.height as u32));
    (t, mask)
}
