//! Perspective transformation for display placement
//!
//! This module solves for the projective mapping that takes the display's
//! rectangle onto the template's target quadrilateral, and resamples the
//! display into base-image space with it.
//!
//! The coefficients follow the inverse-map convention: they map a
//! destination (base image) pixel back to its source (display) location,
//! which is what a pull-based resampler needs.

use image::{Rgba, RgbaImage};
use imageproc::geometric_transformations::{warp_into_with, Interpolation};
use nalgebra::{Matrix3, SMatrix, SVector};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{Point, Quad};
use crate::error::{EdvError, EdvResult};

/// Relative area below which three corners count as collinear
const COLLINEAR_EPS: f64 = 1e-9;

/// Smallest usable projective scale / denominator
const PROJECTIVE_EPS: f64 = 1e-12;

/// Corner triples, indexed by the corner each one leaves out
const TRIPLES: [[usize; 3]; 4] = [[1, 2, 3], [0, 2, 3], [0, 1, 3], [0, 1, 2]];

/// The 8 coefficients `(a, b, c, d, e, f, g, h)` of a projective map
///
/// x' = (a*x + b*y + c) / (g*x + h*y + 1)
/// y' = (d*x + e*y + f) / (g*x + h*y + 1)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransformCoefficients([f64; 8]);

impl TransformCoefficients {
    pub fn new(coeffs: [f64; 8]) -> Self {
        Self(coeffs)
    }

    pub fn as_array(&self) -> &[f64; 8] {
        &self.0
    }

    /// The equivalent 3x3 homography, with the last entry fixed to 1
    pub fn to_matrix(&self) -> Matrix3<f64> {
        let c = &self.0;
        Matrix3::new(c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7], 1.0)
    }

    /// Normalise a homography so its last entry is 1
    fn from_matrix(m: &Matrix3<f64>) -> EdvResult<Self> {
        let scale = m[(2, 2)];
        if !scale.is_finite() || scale.abs() < PROJECTIVE_EPS {
            return Err(EdvError::geometry(
                "projective map sends the target origin to infinity",
            ));
        }
        let m = *m / scale;
        let coeffs = [
            m[(0, 0)],
            m[(0, 1)],
            m[(0, 2)],
            m[(1, 0)],
            m[(1, 1)],
            m[(1, 2)],
            m[(2, 0)],
            m[(2, 1)],
        ];
        if coeffs.iter().any(|c| !c.is_finite()) {
            return Err(EdvError::geometry("non-finite transform coefficients"));
        }
        Ok(Self(coeffs))
    }

    /// Map a destination point back to source coordinates
    ///
    /// Returns `None` where the projective denominator vanishes.
    #[inline]
    pub fn map_point(&self, x: f64, y: f64) -> Option<(f64, f64)> {
        let c = &self.0;
        let w = c[6] * x + c[7] * y + 1.0;
        if w.abs() < PROJECTIVE_EPS {
            return None;
        }
        Some((
            (c[0] * x + c[1] * y + c[2]) / w,
            (c[3] * x + c[4] * y + c[5]) / w,
        ))
    }
}

/// Similarity that moves a quad's centroid to the origin and scales its
/// mean corner distance to sqrt(2)
struct Normalization {
    cx: f64,
    cy: f64,
    scale: f64,
}

impl Normalization {
    fn of(quad: &Quad) -> Self {
        let pts = quad.points();
        let cx = pts.iter().map(|p| p.x).sum::<f64>() / 4.0;
        let cy = pts.iter().map(|p| p.y).sum::<f64>() / 4.0;
        let mean = pts
            .iter()
            .map(|p| (p.x - cx).hypot(p.y - cy))
            .sum::<f64>()
            / 4.0;
        Self {
            cx,
            cy,
            scale: std::f64::consts::SQRT_2 / mean,
        }
    }

    #[inline]
    fn apply(&self, p: Point) -> Point {
        Point::new((p.x - self.cx) * self.scale, (p.y - self.cy) * self.scale)
    }

    /// Pixel space -> normalised space
    fn forward(&self) -> Matrix3<f64> {
        let s = self.scale;
        Matrix3::new(s, 0.0, -s * self.cx, 0.0, s, -s * self.cy, 0.0, 0.0, 1.0)
    }

    /// Normalised space -> pixel space
    fn inverse(&self) -> Matrix3<f64> {
        let s = 1.0 / self.scale;
        Matrix3::new(s, 0.0, self.cx, 0.0, s, self.cy, 0.0, 0.0, 1.0)
    }
}

/// Reject quads with non-finite, coincident or collinear corners
fn check_quad(quad: &Quad, role: &str) -> EdvResult<()> {
    let pts = quad.points();
    if pts.iter().any(|p| !p.x.is_finite() || !p.y.is_finite()) {
        return Err(EdvError::geometry(format!(
            "{} quadrilateral has non-finite corners",
            role
        )));
    }

    let (x0, y0, x1, y1) = quad.bounds();
    let extent = (x1 - x0).max(y1 - y0);
    if extent <= 0.0 {
        return Err(EdvError::geometry(format!(
            "{} quadrilateral collapses to a point",
            role
        )));
    }

    // Every triple of corners must span a non-zero area
    let tolerance = COLLINEAR_EPS * extent * extent;
    for (skip, [i, j, k]) in TRIPLES.iter().enumerate() {
        let (a, b, c) = (pts[*i], pts[*j], pts[*k]);
        let area2 = (b.x - a.x) * (c.y - a.y) - (b.y - a.y) * (c.x - a.x);
        if area2.abs() <= tolerance {
            return Err(EdvError::geometry(format!(
                "{} quadrilateral is degenerate: corners other than #{} are collinear",
                role, skip
            )));
        }
    }
    Ok(())
}

/// Compute the inverse projective coefficients that map every `target`
/// corner onto the matching `source` corner
///
/// Each correspondence contributes the rows
/// `[tx, ty, 1, 0, 0, 0, -sx*tx, -sx*ty]` and `[0, 0, 0, tx, ty, 1, -sy*tx, -sy*ty]`
/// with right-hand side `[sx, sy]`. The 8x8 system is solved through its
/// normal equations (AtA) x = At b in normalised coordinates, then mapped
/// back to pixel space.
pub fn solve(source: &Quad, target: &Quad) -> EdvResult<TransformCoefficients> {
    check_quad(source, "source")?;
    check_quad(target, "target")?;

    let src_norm = Normalization::of(source);
    let dst_norm = Normalization::of(target);

    let mut rows = [0.0f64; 64];
    let mut rhs = [0.0f64; 8];
    for (i, (s, t)) in source.points().iter().zip(target.points()).enumerate() {
        let s = src_norm.apply(*s);
        let t = dst_norm.apply(*t);

        let r1 = i * 2;
        let r2 = i * 2 + 1;
        rows[r1 * 8..r1 * 8 + 8]
            .copy_from_slice(&[t.x, t.y, 1.0, 0.0, 0.0, 0.0, -s.x * t.x, -s.x * t.y]);
        rows[r2 * 8..r2 * 8 + 8]
            .copy_from_slice(&[0.0, 0.0, 0.0, t.x, t.y, 1.0, -s.y * t.x, -s.y * t.y]);
        rhs[r1] = s.x;
        rhs[r2] = s.y;
    }

    let a = SMatrix::<f64, 8, 8>::from_row_slice(&rows);
    let b = SVector::<f64, 8>::from_column_slice(&rhs);
    let at = a.transpose();

    let x = (at * a)
        .lu()
        .solve(&(at * b))
        .ok_or_else(|| EdvError::geometry("singular perspective system"))?;
    if x.iter().any(|v| !v.is_finite()) {
        return Err(EdvError::geometry("perspective system has no finite solution"));
    }

    let normalized = Matrix3::new(x[0], x[1], x[2], x[3], x[4], x[5], x[6], x[7], 1.0);
    let coeffs =
        TransformCoefficients::from_matrix(&(src_norm.inverse() * normalized * dst_norm.forward()))?;

    debug!("Solved perspective coefficients: {:?}", coeffs.as_array());
    Ok(coeffs)
}

/// Edge replication around the display, wide enough for the 4x4 bicubic
/// support to stay inside the buffer for every in-display sample
const EDGE_PAD: u32 = 3;

/// Copy of `src` with `EDGE_PAD` pixels of replicated border on each side
fn pad_edges(src: &RgbaImage) -> RgbaImage {
    let (w, h) = src.dimensions();
    RgbaImage::from_fn(w + 2 * EDGE_PAD, h + 2 * EDGE_PAD, |x, y| {
        let sx = x.saturating_sub(EDGE_PAD).min(w - 1);
        let sy = y.saturating_sub(EDGE_PAD).min(h - 1);
        *src.get_pixel(sx, sy)
    })
}

/// Resample `src` into `out` through the inverse map `coeffs`, using
/// bicubic interpolation
///
/// Pixels are mapped through their centres. Destination pixels whose centre
/// lands outside `[0, W) x [0, H)` of `src` are left fully transparent;
/// samples near the display border read replicated edge pixels.
pub fn warp_into(src: &RgbaImage, coeffs: &TransformCoefficients, out: &mut RgbaImage) {
    let (w, h) = src.dimensions();
    if w == 0 || h == 0 {
        out.pixels_mut().for_each(|p| *p = Rgba([0, 0, 0, 0]));
        return;
    }

    let padded = pad_edges(src);
    let (w, h) = (w as f64, h as f64);
    let pad = EDGE_PAD as f64;

    warp_into_with(
        &padded,
        |x, y| match coeffs.map_point(x as f64 + 0.5, y as f64 + 0.5) {
            Some((sx, sy)) if (0.0..w).contains(&sx) && (0.0..h).contains(&sy) => {
                ((sx - 0.5 + pad) as f32, (sy - 0.5 + pad) as f32)
            }
            // Left of the buffer, so the sampler yields the default pixel
            _ => (-10.0, -10.0),
        },
        Interpolation::Bicubic,
        Rgba([0, 0, 0, 0]),
        out,
    );
}

/// Resample `src` into a new transparent image of the given size
pub fn warp(src: &RgbaImage, coeffs: &TransformCoefficients, width: u32, height: u32) -> RgbaImage {
    let mut out = RgbaImage::new(width, height);
    warp_into(src, coeffs, &mut out);
    out
}
