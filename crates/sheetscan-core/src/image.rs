use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug)]
pub struct GrayImageView<'a> {
    pub width: usize,
    pub height: usize,
    pub data: &'a [u8], // row-major, len = w*h
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GrayImage {
    pub width: usize,
    pub height: usize,
    pub data: Vec<u8>,
}

/// Axis-aligned pixel rectangle `[x, x + width) × [y, y + height)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PixelRect {
    pub x: i64,
    pub y: i64,
    pub width: i64,
    pub height: i64,
}

impl PixelRect {
    pub fn from_corners(x1: i64, y1: i64, x2: i64, y2: i64) -> Self {
        Self {
            x: x1,
            y: y1,
            width: x2 - x1,
            height: y2 - y1,
        }
    }

    #[inline]
    pub fn right(&self) -> i64 {
        self.x + self.width
    }

    #[inline]
    pub fn bottom(&self) -> i64 {
        self.y + self.height
    }

    #[inline]
    pub fn area(&self) -> i64 {
        self.width.max(0) * self.height.max(0)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    /// Grow (positive `delta`) or shrink (negative `delta`) on all four sides.
    pub fn inflate(&self, delta: i64) -> Self {
        Self {
            x: self.x - delta,
            y: self.y - delta,
            width: self.width + 2 * delta,
            height: self.height + 2 * delta,
        }
    }

    /// Intersection with `[0, width) × [0, height)`.
    pub fn clamp_to(&self, width: usize, height: usize) -> Self {
        let x1 = self.x.clamp(0, width as i64);
        let y1 = self.y.clamp(0, height as i64);
        let x2 = self.right().clamp(0, width as i64);
        let y2 = self.bottom().clamp(0, height as i64);
        Self::from_corners(x1, y1, x2.max(x1), y2.max(y1))
    }
}

impl<'a> GrayImageView<'a> {
    #[inline]
    pub fn get(&self, x: usize, y: usize) -> u8 {
        self.data[y * self.width + x]
    }

    /// Copy out the part of `rect` that lies inside the image.
    pub fn crop(&self, rect: PixelRect) -> GrayImage {
        let r = rect.clamp_to(self.width, self.height);
        let (w, h) = (r.width as usize, r.height as usize);
        let mut data = Vec::with_capacity(w * h);
        for y in 0..h {
            let start = (r.y as usize + y) * self.width + r.x as usize;
            data.extend_from_slice(&self.data[start..start + w]);
        }
        GrayImage {
            width: w,
            height: h,
            data,
        }
    }
}

impl GrayImage {
    /// Image filled with a constant value.
    pub fn filled(width: usize, height: usize, value: u8) -> Self {
        Self {
            width,
            height,
            data: vec![value; width * height],
        }
    }

    #[inline]
    pub fn view(&self) -> GrayImageView<'_> {
        GrayImageView {
            width: self.width,
            height: self.height,
            data: &self.data,
        }
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> u8 {
        self.data[y * self.width + x]
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize, v: u8) {
        self.data[y * self.width + x] = v;
    }

    /// Paint the part of `rect` that lies inside the image.
    pub fn fill_rect(&mut self, rect: PixelRect, v: u8) {
        let r = rect.clamp_to(self.width, self.height);
        for y in r.y..r.bottom() {
            for x in r.x..r.right() {
                self.set(x as usize, y as usize, v);
            }
        }
    }
}

#[inline]
fn get_gray_or(src: &GrayImageView<'_>, x: i32, y: i32, fill: u8) -> u8 {
    if x < 0 || y < 0 || x >= src.width as i32 || y >= src.height as i32 {
        return fill;
    }
    src.data[y as usize * src.width + x as usize]
}

/// Bilinear sample at integer-centred coordinates; taps outside the image read `fill`.
#[inline]
pub fn sample_bilinear(src: &GrayImageView<'_>, x: f32, y: f32, fill: u8) -> f32 {
    let x0 = x.floor() as i32;
    let y0 = y.floor() as i32;
    let fx = x - x0 as f32;
    let fy = y - y0 as f32;

    let p00 = get_gray_or(src, x0, y0, fill) as f32;
    let p10 = get_gray_or(src, x0 + 1, y0, fill) as f32;
    let p01 = get_gray_or(src, x0, y0 + 1, fill) as f32;
    let p11 = get_gray_or(src, x0 + 1, y0 + 1, fill) as f32;

    let a = p00 + fx * (p10 - p00);
    let b = p01 + fx * (p11 - p01);
    a + fy * (b - a)
}

#[inline]
pub fn sample_bilinear_u8(src: &GrayImageView<'_>, x: f32, y: f32, fill: u8) -> u8 {
    sample_bilinear(src, x, y, fill).round().clamp(0.0, 255.0) as u8
}
