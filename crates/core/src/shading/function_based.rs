//! Function-based (type 1) shadings.

use crate::error::{RenderError, Result};
use crate::utils::{Matrix, apply_matrix_pt, invert_matrix};

/// Color defined directly as `f(x, y)` over a rectangular domain.
#[derive(Debug, Clone)]
pub struct FunctionBased {
    /// `[xmin xmax ymin ymax]`
    pub domain: [f64; 4],
    /// Maps the domain into shading space.
    pub matrix: Matrix,
    inverse: Matrix,
}

impl FunctionBased {
    pub fn new(domain: [f64; 4], matrix: Matrix) -> Result<Self> {
        if domain[0] > domain[1] || domain[2] > domain[3] {
            return Err(RenderError::InvalidShading("function shading Domain is inverted".into()));
        }
        let inverse = invert_matrix(matrix)
            .ok_or_else(|| RenderError::InvalidShading("function shading Matrix is singular".into()))?;
        Ok(Self {
            domain,
            matrix,
            inverse,
        })
    }

    /// Function input for a point in shading space, `None` outside the
    /// domain.
    pub fn input(&self, x: f64, y: f64) -> Option<[f64; 2]> {
        let (u, v) = apply_matrix_pt(self.inverse, (x, y));
        let [x0, x1, y0, y1] = self.domain;
        ((x0..=x1).contains(&u) && (y0..=y1).contains(&v)).then_some([u, v])
    }
}
