use crate::{sample_bilinear_u8, GrayImage, GrayImageView};
use nalgebra::{Matrix3, Point2, SMatrix, SVector, Vector3};
use serde::{Deserialize, Serialize};

/// 2×3 affine map stored as the top two rows of a 3×3 matrix (last row `[0, 0, 1]`).
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Affine {
    pub m: Matrix3<f64>,
}

impl Affine {
    pub fn identity() -> Self {
        Self {
            m: Matrix3::identity(),
        }
    }

    pub fn from_rows(rows: [[f64; 3]; 2]) -> Self {
        Self {
            m: Matrix3::new(
                rows[0][0], rows[0][1], rows[0][2], //
                rows[1][0], rows[1][1], rows[1][2], //
                0.0, 0.0, 1.0,
            ),
        }
    }

    /// The 2×3 matrix in row-major form, as OpenCV-style tooling prints it.
    pub fn to_rows(&self) -> [[f64; 3]; 2] {
        [
            [self.m[(0, 0)], self.m[(0, 1)], self.m[(0, 2)]],
            [self.m[(1, 0)], self.m[(1, 1)], self.m[(1, 2)]],
        ]
    }

    #[inline]
    pub fn apply(&self, p: Point2<f32>) -> Point2<f32> {
        let v = self.m * Vector3::new(p.x as f64, p.y as f64, 1.0);
        Point2::new(v[0] as f32, v[1] as f32)
    }

    pub fn inverse(&self) -> Option<Self> {
        let det = self.m[(0, 0)] * self.m[(1, 1)] - self.m[(0, 1)] * self.m[(1, 0)];
        if det.abs() < 1e-12 {
            return None;
        }
        self.m.try_inverse().map(|m| Self { m })
    }

    /// `self ∘ other`: apply `other` first.
    pub fn compose(&self, other: &Affine) -> Affine {
        Affine { m: self.m * other.m }
    }
}

/// Twice the unsigned area of the triangle `abc`.
#[inline]
pub fn triangle_area2(a: Point2<f32>, b: Point2<f32>, c: Point2<f32>) -> f64 {
    let (ax, ay) = (a.x as f64, a.y as f64);
    ((b.x as f64 - ax) * (c.y as f64 - ay) - (b.y as f64 - ay) * (c.x as f64 - ax)).abs()
}

fn hartley_normalization(cx: f64, cy: f64, mean_dist: f64) -> Matrix3<f64> {
    let s = if mean_dist > 1e-12 {
        (2.0_f64).sqrt() / mean_dist
    } else {
        1.0
    };

    Matrix3::<f64>::new(s, 0.0, -s * cx, 0.0, s, -s * cy, 0.0, 0.0, 1.0)
}

fn normalize_points3(pts: &[Point2<f32>; 3]) -> ([Point2<f64>; 3], Matrix3<f64>) {
    // translate to centroid, scale so mean distance = sqrt(2)
    let n = 3.0_f64;
    let mut cx = 0.0_f64;
    let mut cy = 0.0_f64;
    for p in pts {
        cx += p.x as f64;
        cy += p.y as f64;
    }
    cx /= n;
    cy /= n;

    let mut mean_dist = 0.0_f64;
    for p in pts {
        let dx = p.x as f64 - cx;
        let dy = p.y as f64 - cy;
        mean_dist += (dx * dx + dy * dy).sqrt();
    }
    mean_dist /= n;

    let t = hartley_normalization(cx, cy, mean_dist);

    let mut out = [Point2::new(0.0_f64, 0.0_f64); 3];
    for (i, p) in pts.iter().enumerate() {
        let v = t * Vector3::new(p.x as f64, p.y as f64, 1.0);
        out[i] = Point2::new(v[0], v[1]);
    }

    (out, t)
}

/// Minimum triangle area (in px², doubled) accepted as non-collinear.
pub const MIN_TRIANGLE_AREA2: f64 = 1.0;

/// Compute A such that `dst = A * src` from exactly 3 point correspondences.
///
/// Returns `None` if either triangle is degenerate (collinear points).
pub fn affine_from_3pt(src: &[Point2<f32>; 3], dst: &[Point2<f32>; 3]) -> Option<Affine> {
    if triangle_area2(src[0], src[1], src[2]) < MIN_TRIANGLE_AREA2
        || triangle_area2(dst[0], dst[1], dst[2]) < MIN_TRIANGLE_AREA2
    {
        return None;
    }

    // Unknowns: [a11 a12 a13 a21 a22 a23]
    // a11 x + a12 y + a13 = u
    // a21 x + a22 y + a23 = v
    let (src_n, t_src) = normalize_points3(src);
    let (dst_n, t_dst) = normalize_points3(dst);

    let mut a = SMatrix::<f64, 6, 6>::zeros();
    let mut b = SVector::<f64, 6>::zeros();

    for k in 0..3 {
        let x = src_n[k].x;
        let y = src_n[k].y;

        let r0 = 2 * k;
        a[(r0, 0)] = x;
        a[(r0, 1)] = y;
        a[(r0, 2)] = 1.0;
        b[r0] = dst_n[k].x;

        let r1 = 2 * k + 1;
        a[(r1, 3)] = x;
        a[(r1, 4)] = y;
        a[(r1, 5)] = 1.0;
        b[r1] = dst_n[k].y;
    }

    let x = a.lu().solve(&b)?;

    let an = Matrix3::<f64>::new(
        x[0], x[1], x[2], //
        x[3], x[4], x[5], //
        0.0, 0.0, 1.0,
    );

    // Denormalize: A = Td^{-1} * An * Ts
    let t_dst_inv = t_dst.try_inverse()?;
    let mut m = t_dst_inv * an * t_src;
    m[(2, 0)] = 0.0;
    m[(2, 1)] = 0.0;
    m[(2, 2)] = 1.0;

    Some(Affine { m })
}

/// Warp `src` into an `out_w × out_h` raster with `dst_from_src`.
///
/// Each destination pixel is mapped back through the inverse and sampled
/// bilinearly; samples outside `src` read `fill`.
pub fn warp_affine_gray(
    src: &GrayImageView<'_>,
    dst_from_src: &Affine,
    out_w: usize,
    out_h: usize,
    fill: u8,
) -> Option<GrayImage> {
    let src_from_dst = dst_from_src.inverse()?;
    let mut out = vec![fill; out_w * out_h];

    for y in 0..out_h {
        for x in 0..out_w {
            let ps = src_from_dst.apply(Point2::new(x as f32, y as f32));
            out[y * out_w + x] = sample_bilinear_u8(src, ps.x, ps.y, fill);
        }
    }

    Some(GrayImage {
        width: out_w,
        height: out_h,
        data: out,
    })
}
