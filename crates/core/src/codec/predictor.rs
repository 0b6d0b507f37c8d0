//! Predictor post-processing for FlateDecode streams (`/DecodeParms`).

use crate::error::{RenderError, Result};
use crate::model::objects::PDFDict;

/// Parameters of a `/Predictor` entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PredictorParams {
    pub predictor: i64,
    pub colors: usize,
    pub bits_per_component: usize,
    pub columns: usize,
}

impl PredictorParams {
    /// Read predictor parameters; `None` when no predictor applies.
    pub fn from_dict(parms: &PDFDict) -> Option<Self> {
        let int = |key: &str, default: i64| {
            parms
                .get(key)
                .and_then(|v| v.as_int().ok())
                .unwrap_or(default)
        };
        let predictor = int("Predictor", 1);
        if predictor <= 1 {
            return None;
        }
        Some(Self {
            predictor,
            colors: int("Colors", 1).max(1) as usize,
            bits_per_component: int("BitsPerComponent", 8).max(1) as usize,
            columns: int("Columns", 1).max(1) as usize,
        })
    }

    const fn row_bytes(&self) -> usize {
        (self.colors * self.columns * self.bits_per_component).div_ceil(8)
    }

    const fn pixel_bytes(&self) -> usize {
        let bytes = (self.colors * self.bits_per_component).div_ceil(8);
        if bytes == 0 { 1 } else { bytes }
    }

    /// Undo the prediction on `data`.
    pub fn apply(&self, data: &[u8]) -> Result<Vec<u8>> {
        match self.predictor {
            2 => Ok(self.undo_tiff(data)),
            10..=15 => self.undo_png(data),
            other => Err(RenderError::UnsupportedFeature(format!(
                "predictor {other}"
            ))),
        }
    }

    fn undo_tiff(&self, data: &[u8]) -> Vec<u8> {
        if self.bits_per_component != 8 {
            return data.to_vec();
        }
        let bpp = self.pixel_bytes();
        let mut out = data.to_vec();
        for row in out.chunks_mut(self.row_bytes()) {
            for i in bpp..row.len() {
                row[i] = row[i].wrapping_add(row[i - bpp]);
            }
        }
        out
    }

    fn undo_png(&self, data: &[u8]) -> Result<Vec<u8>> {
        let row_bytes = self.row_bytes();
        let bpp = self.pixel_bytes();
        let mut out = Vec::with_capacity(data.len());
        let mut prev = vec![0u8; row_bytes];
        let mut cur = vec![0u8; row_bytes];

        // a trailing partial row is dropped
        for chunk in data.chunks_exact(row_bytes + 1) {
            let (filter, row) = (chunk[0], &chunk[1..]);
            for i in 0..row_bytes {
                let left = if i >= bpp { cur[i - bpp] } else { 0 };
                let up = prev[i];
                let up_left = if i >= bpp { prev[i - bpp] } else { 0 };
                let pred = match filter {
                    0 => 0,
                    1 => left,
                    2 => up,
                    3 => ((u16::from(left) + u16::from(up)) / 2) as u8,
                    4 => paeth(left, up, up_left),
                    other => {
                        return Err(RenderError::DecodeError(format!(
                            "invalid PNG row filter {other}"
                        )));
                    }
                };
                cur[i] = row[i].wrapping_add(pred);
            }
            out.extend_from_slice(&cur);
            std::mem::swap(&mut prev, &mut cur);
        }
        Ok(out)
    }
}

const fn paeth(a: u8, b: u8, c: u8) -> u8 {
    let p = a as i32 + b as i32 - c as i32;
    let pa = (p - a as i32).abs();
    let pb = (p - b as i32).abs();
    let pc = (p - c as i32).abs();
    if pa <= pb && pa <= pc {
        a
    } else if pb <= pc {
        b
    } else {
        c
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::objects::{PDFObject, dict_from};

    fn params(predictor: i64, colors: i64, columns: i64) -> PredictorParams {
        PredictorParams::from_dict(&dict_from([
            ("Predictor", PDFObject::Int(predictor)),
            ("Colors", PDFObject::Int(colors)),
            ("Columns", PDFObject::Int(columns)),
        ]))
        .unwrap()
    }

    #[test]
    fn test_no_predictor() {
        assert_eq!(PredictorParams::from_dict(&PDFDict::new()), None);
    }

    #[test]
    fn test_png_sub_and_up() {
        let p = params(12, 1, 3);
        // row 1: Sub, row 2: Up
        let data = [1, 10, 1, 1, 2, 5, 5, 5];
        assert_eq!(p.apply(&data).unwrap(), vec![10, 11, 12, 15, 16, 17]);
    }

    #[test]
    fn test_png_paeth_first_row() {
        let p = params(15, 1, 2);
        // with no row above, Paeth predicts from the left neighbour
        assert_eq!(p.apply(&[4, 3, 4]).unwrap(), vec![3, 7]);
    }

    #[test]
    fn test_tiff_horizontal_differencing() {
        let p = params(2, 3, 2);
        assert_eq!(
            p.apply(&[10, 20, 30, 1, 2, 3]).unwrap(),
            vec![10, 20, 30, 11, 22, 33]
        );
    }

    #[test]
    fn test_bad_png_filter() {
        let p = params(10, 1, 1);
        assert!(matches!(p.apply(&[9, 0]), Err(RenderError::DecodeError(_))));
    }
}
