//! Axial (type 2) shadings.

use crate::error::{RenderError, Result};

/// Gradient along the axis from `(x0, y0)` to `(x1, y1)`.
#[derive(Debug, Clone)]
pub struct Axial {
    pub coords: [f64; 4],
    /// Parameter interval `[t0, t1]`
    pub domain: [f64; 2],
    pub extend: [bool; 2],
    dx: f64,
    dy: f64,
    denom: f64,
}

impl Axial {
    pub fn new(coords: [f64; 4], domain: [f64; 2], extend: [bool; 2]) -> Result<Self> {
        if coords.iter().chain(&domain).any(|v| !v.is_finite()) {
            return Err(RenderError::InvalidShading("non-finite axial coordinates".into()));
        }
        let dx = coords[2] - coords[0];
        let dy = coords[3] - coords[1];
        Ok(Self {
            coords,
            domain,
            extend,
            dx,
            dy,
            denom: dx * dx + dy * dy,
        })
    }

    /// The function parameter `t` for a point in shading space, or `None`
    /// when the point lies outside the painted part of the gradient.
    pub fn parameter(&self, x: f64, y: f64) -> Option<f64> {
        if self.denom <= f64::EPSILON {
            return None;
        }
        let mut s = ((x - self.coords[0]) * self.dx + (y - self.coords[1]) * self.dy) / self.denom;
        if s < 0.0 {
            if !self.extend[0] {
                return None;
            }
            s = 0.0;
        } else if s > 1.0 {
            if !self.extend[1] {
                return None;
            }
            s = 1.0;
        }
        let [t0, t1] = self.domain;
        Some(t0 + s * (t1 - t0))
    }
}
