//! Radial (type 3) shadings.
//!
//! The gradient is the family of circles interpolated between
//! `(x0, y0, r0)` and `(x1, y1, r1)`. For a point `p` we look for the
//! largest `s` with `|p - c(s)| = r(s)` and `r(s) >= 0`.

use crate::error::{RenderError, Result};

#[derive(Debug, Clone)]
pub struct Radial {
    /// `[x0 y0 r0 x1 y1 r1]`
    pub coords: [f64; 6],
    pub domain: [f64; 2],
    pub extend: [bool; 2],
    dx: f64,
    dy: f64,
    dr: f64,
    a: f64,
}

impl Radial {
    pub fn new(coords: [f64; 6], domain: [f64; 2], extend: [bool; 2]) -> Result<Self> {
        if coords.iter().chain(&domain).any(|v| !v.is_finite()) {
            return Err(RenderError::InvalidShading("non-finite radial coordinates".into()));
        }
        if coords[2] < 0.0 || coords[5] < 0.0 {
            return Err(RenderError::InvalidShading("negative radius".into()));
        }
        let dx = coords[3] - coords[0];
        let dy = coords[4] - coords[1];
        let dr = coords[5] - coords[2];
        Ok(Self {
            coords,
            domain,
            extend,
            dx,
            dy,
            dr,
            a: dx * dx + dy * dy - dr * dr,
        })
    }

    fn is_degenerate(&self) -> bool {
        self.dx == 0.0 && self.dy == 0.0 && self.dr == 0.0
    }

    fn accepts(&self, s: f64) -> bool {
        if self.coords[2] + s * self.dr < 0.0 {
            return false;
        }
        (0.0..=1.0).contains(&s) || (s > 1.0 && self.extend[1]) || (s < 0.0 && self.extend[0])
    }

    /// The function parameter `t` for a point in shading space.
    pub fn parameter(&self, x: f64, y: f64) -> Option<f64> {
        let [t0, t1] = self.domain;
        if self.is_degenerate() {
            // both circles coincide: nothing to solve
            return (self.extend[0] && self.extend[1]).then_some(t0);
        }
        let [x0, y0, r0, ..] = self.coords;
        let pdx = x - x0;
        let pdy = y - y0;
        // a s^2 - 2 b s + c = 0
        let b = pdx * self.dx + pdy * self.dy + r0 * self.dr;
        let c = pdx * pdx + pdy * pdy - r0 * r0;

        let s = if self.a.abs() < 1e-9 {
            if b.abs() < 1e-12 {
                return None;
            }
            let s = c / (2.0 * b);
            self.accepts(s).then_some(s)?
        } else {
            let disc = b * b - self.a * c;
            if disc < 0.0 {
                return None;
            }
            let sq = disc.sqrt();
            let (hi, lo) = if self.a > 0.0 {
                ((b + sq) / self.a, (b - sq) / self.a)
            } else {
                ((b - sq) / self.a, (b + sq) / self.a)
            };
            if self.accepts(hi) {
                hi
            } else if self.accepts(lo) {
                lo
            } else {
                return None;
            }
        };
        Some(t0 + s.clamp(0.0, 1.0) * (t1 - t0))
    }
}
