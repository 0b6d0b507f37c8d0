//! Content stream operator implementations.
//!
//! Operators are grouped by category:
//! - `graphics_state` - State stack and transforms (q, Q, cm, w, J, j, M, d, ri, i, gs)
//! - `color` - Color space and values (G, g, RG, rg, K, k, CS, cs, SC, SCN, sc, scn)
//! - `path` - Path construction and painting (m, l, c, v, y, h, re, S, s, f, F, f\*, B, B\*, b, b\*, n, W, W\*)
//! - `text` - Text state and showing (BT, ET, Tc, Tw, Tz, TL, Tf, Tr, Ts, Td, TD, Tm, T\*, Tj, TJ, ', ")
//! - `xobject` - XObjects and inline images (Do, BI/ID/EI)
//! - `shading` - Shading fills and pattern paints (sh)
//!
//! Each file adds an `impl` block to `PageInterpreter`.

mod color;
mod graphics_state;
mod path;
mod shading;
mod text;
mod xobject;

use crate::error::{RenderError, Result};
use crate::model::objects::PDFObject;
use crate::parser::lexer::Keyword;
use crate::utils::Matrix;

/// Typed access to the operands of one operator.
///
/// Type mismatches surface as `MalformedOperatorSequence` errors naming the
/// operator.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Args<'o> {
    op: &'o Keyword,
    operands: &'o [PDFObject],
}

impl<'o> Args<'o> {
    pub(crate) const fn new(op: &'o Keyword, operands: &'o [PDFObject]) -> Self {
        Self { op, operands }
    }

    pub(crate) fn len(&self) -> usize {
        self.operands.len()
    }

    pub(crate) fn get(&self, i: usize) -> Option<&'o PDFObject> {
        self.operands.get(i)
    }

    pub(crate) fn all(&self) -> &'o [PDFObject] {
        self.operands
    }

    fn mismatch(&self, i: usize, expected: &str) -> RenderError {
        let found = self.operands.get(i).map_or("nothing", PDFObject::type_name);
        RenderError::malformed(
            self.op.as_str(),
            format!("operand {} should be a {expected}, found {found}", i + 1),
        )
    }

    fn operand(&self, i: usize, expected: &str) -> Result<&'o PDFObject> {
        self.operands.get(i).ok_or_else(|| self.mismatch(i, expected))
    }

    pub(crate) fn num(&self, i: usize) -> Result<f64> {
        self.operand(i, "number")?
            .as_num()
            .map_err(|_| self.mismatch(i, "number"))
    }

    pub(crate) fn int(&self, i: usize) -> Result<i64> {
        self.operand(i, "integer")?
            .as_int()
            .map_err(|_| self.mismatch(i, "integer"))
    }

    pub(crate) fn name(&self, i: usize) -> Result<&'o str> {
        self.operand(i, "name")?
            .as_name()
            .map_err(|_| self.mismatch(i, "name"))
    }

    pub(crate) fn string(&self, i: usize) -> Result<&'o [u8]> {
        self.operand(i, "string")?
            .as_string()
            .map_err(|_| self.mismatch(i, "string"))
    }

    pub(crate) fn array(&self, i: usize) -> Result<&'o [PDFObject]> {
        self.operand(i, "array")?
            .as_array()
            .map(Vec::as_slice)
            .map_err(|_| self.mismatch(i, "array"))
    }

    pub(crate) fn num_array(&self, i: usize) -> Result<Vec<f64>> {
        self.array(i)?
            .iter()
            .map(|v| v.as_num().map_err(|_| self.mismatch(i, "number array")))
            .collect()
    }

    /// All operands as numbers (color components).
    pub(crate) fn nums(&self) -> Result<Vec<f64>> {
        (0..self.operands.len()).map(|i| self.num(i)).collect()
    }

    /// Six numbers forming a matrix.
    pub(crate) fn matrix(&self) -> Result<Matrix> {
        Ok((
            self.num(0)?,
            self.num(1)?,
            self.num(2)?,
            self.num(3)?,
            self.num(4)?,
            self.num(5)?,
        ))
    }
}
