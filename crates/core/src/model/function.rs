//! PDF functions.
//!
//! Supported kinds:
//! - Type 0, sampled: packed sample table with multilinear interpolation
//! - Type 2, exponential interpolation: `C0 + x^N * (C1 - C0)`
//! - Type 3, stitching: a 1-in function split over sub-domains
//! - Function arrays: n functions of 1 input and 1 output evaluated side by
//!   side (shadings and tint transforms may use them)
//!
//! Every evaluation clips its input to `Domain` and its output to `Range`.

use crate::error::{RenderError, Result};
use crate::interp::resources::ResourceResolver;
use crate::model::objects::{PDFDict, PDFObject};
use smallvec::SmallVec;

/// Output buffer for function evaluation.
pub type FunctionOutput = SmallVec<[f64; 8]>;

/// Nesting limit for stitching functions and function arrays.
const MAX_FUNCTION_DEPTH: usize = 16;

/// A parsed PDF function.
#[derive(Debug, Clone)]
pub struct PDFFunction {
    domain: Vec<f64>,
    range: Option<Vec<f64>>,
    kind: FunctionKind,
}

#[derive(Debug, Clone)]
enum FunctionKind {
    Sampled(SampledFunction),
    Exponential(ExponentialFunction),
    Stitching(StitchingFunction),
    Array(Vec<PDFFunction>),
}

#[derive(Debug, Clone)]
struct SampledFunction {
    size: Vec<usize>,
    bits_per_sample: u32,
    encode: Vec<f64>,
    decode: Vec<f64>,
    /// Sample values, `num_outputs` per grid point, first dimension fastest.
    samples: Vec<u32>,
    num_outputs: usize,
}

#[derive(Debug, Clone)]
struct ExponentialFunction {
    c0: Vec<f64>,
    c1: Vec<f64>,
    n: f64,
}

#[derive(Debug, Clone)]
struct StitchingFunction {
    functions: Vec<PDFFunction>,
    bounds: Vec<f64>,
    encode: Vec<f64>,
}

fn invalid(msg: impl Into<String>) -> RenderError {
    RenderError::InvalidFunctionDefinition(msg.into())
}

/// Clip `x` into `[lo, hi]` without panicking on NaN.
#[inline]
fn clip(x: f64, lo: f64, hi: f64) -> f64 {
    if x.is_nan() {
        lo
    } else {
        x.max(lo).min(hi)
    }
}

/// Linear map of `x` from `[xmin, xmax]` to `[ymin, ymax]`.
#[inline]
pub(crate) fn interpolate(x: f64, xmin: f64, xmax: f64, ymin: f64, ymax: f64) -> f64 {
    if xmax == xmin {
        ymin
    } else {
        ymin + (x - xmin) * (ymax - ymin) / (xmax - xmin)
    }
}

fn check_intervals(what: &str, values: &[f64]) -> Result<()> {
    if values.is_empty() || values.len() % 2 != 0 {
        return Err(invalid(format!(
            "{what} must hold min/max pairs, got {} values",
            values.len()
        )));
    }
    if values
        .chunks_exact(2)
        .any(|pair| !pair[0].is_finite() || !pair[1].is_finite() || pair[0] > pair[1])
    {
        return Err(invalid(format!("{what} has an invalid interval")));
    }
    Ok(())
}

impl PDFFunction {
    /// Build a sampled (type 0) function from its parameters and the raw
    /// stream payload.
    pub fn sampled(
        domain: Vec<f64>,
        range: Vec<f64>,
        size: Vec<usize>,
        bits_per_sample: u32,
        encode: Option<Vec<f64>>,
        decode: Option<Vec<f64>>,
        data: &[u8],
    ) -> Result<Self> {
        check_intervals("Domain", &domain)?;
        check_intervals("Range", &range)?;
        let num_inputs = domain.len() / 2;
        let num_outputs = range.len() / 2;
        if size.len() != num_inputs {
            return Err(invalid(format!(
                "Size has {} entries for {num_inputs} inputs",
                size.len()
            )));
        }
        if size.contains(&0) {
            return Err(invalid("Size entries must be positive"));
        }
        if !matches!(bits_per_sample, 1 | 2 | 4 | 8 | 12 | 16 | 24 | 32) {
            return Err(invalid(format!("BitsPerSample {bits_per_sample}")));
        }
        let encode = match encode {
            Some(e) if e.len() == 2 * num_inputs => e,
            Some(e) => {
                return Err(invalid(format!(
                    "Encode has {} values, expected {}",
                    e.len(),
                    2 * num_inputs
                )));
            }
            None => size
                .iter()
                .flat_map(|&s| [0.0, (s - 1) as f64])
                .collect(),
        };
        let decode = match decode {
            Some(d) if d.len() == range.len() => d,
            Some(d) => {
                return Err(invalid(format!(
                    "Decode has {} values, expected {}",
                    d.len(),
                    range.len()
                )));
            }
            None => range.clone(),
        };

        let grid_points = size
            .iter()
            .try_fold(1usize, |acc, &s| acc.checked_mul(s))
            .ok_or_else(|| invalid("sample grid too large"))?;
        let count = grid_points
            .checked_mul(num_outputs)
            .ok_or_else(|| invalid("sample grid too large"))?;
        let samples = unpack_samples(data, bits_per_sample, count)?;

        Ok(Self {
            domain,
            range: Some(range),
            kind: FunctionKind::Sampled(SampledFunction {
                size,
                bits_per_sample,
                encode,
                decode,
                samples,
                num_outputs,
            }),
        })
    }

    /// Build an exponential interpolation (type 2) function.
    pub fn exponential(
        domain: Vec<f64>,
        range: Option<Vec<f64>>,
        c0: Vec<f64>,
        c1: Vec<f64>,
        n: f64,
    ) -> Result<Self> {
        if domain.len() != 2 {
            return Err(invalid("exponential function needs a 1-input Domain"));
        }
        check_intervals("Domain", &domain)?;
        if c0.len() != c1.len() {
            return Err(invalid(format!(
                "C0 has {} values but C1 has {}",
                c0.len(),
                c1.len()
            )));
        }
        if let Some(range) = &range {
            check_intervals("Range", range)?;
            if range.len() != 2 * c0.len() {
                return Err(invalid("Range does not match C0/C1 length"));
            }
        }
        Ok(Self {
            domain,
            range,
            kind: FunctionKind::Exponential(ExponentialFunction { c0, c1, n }),
        })
    }

    /// Build a stitching (type 3) function.
    pub fn stitching(
        domain: Vec<f64>,
        range: Option<Vec<f64>>,
        functions: Vec<PDFFunction>,
        bounds: Vec<f64>,
        encode: Vec<f64>,
    ) -> Result<Self> {
        if domain.len() != 2 {
            return Err(invalid("stitching function needs a 1-input Domain"));
        }
        check_intervals("Domain", &domain)?;
        let k = functions.len();
        if k == 0 {
            return Err(invalid("stitching function without sub-functions"));
        }
        if bounds.len() != k - 1 {
            return Err(invalid(format!(
                "Bounds has {} values for {k} functions",
                bounds.len()
            )));
        }
        if encode.len() != 2 * k {
            return Err(invalid(format!(
                "Encode has {} values for {k} functions",
                encode.len()
            )));
        }
        if bounds.windows(2).any(|w| w[0] > w[1]) {
            return Err(invalid("Bounds must be increasing"));
        }
        let outputs = functions[0].num_outputs();
        if functions
            .iter()
            .any(|f| f.num_inputs() != 1 || f.num_outputs() != outputs)
        {
            return Err(invalid(
                "stitched functions must have 1 input and matching outputs",
            ));
        }
        if let Some(range) = &range {
            check_intervals("Range", range)?;
        }
        Ok(Self {
            domain,
            range,
            kind: FunctionKind::Stitching(StitchingFunction {
                functions,
                bounds,
                encode,
            }),
        })
    }

    /// Compose 1-in/1-out functions into one n-output function.
    pub fn array(functions: Vec<PDFFunction>) -> Result<Self> {
        let Some(first) = functions.first() else {
            return Err(invalid("empty function array"));
        };
        if let Some(bad) = functions
            .iter()
            .position(|f| f.num_inputs() != 1 || f.num_outputs() != 1)
        {
            return Err(invalid(format!(
                "function array member {bad} is not 1-in/1-out"
            )));
        }
        let domain = first.domain.clone();
        Ok(Self {
            domain,
            range: None,
            kind: FunctionKind::Array(functions),
        })
    }

    /// Parse a function dictionary, stream, or array of functions.
    pub fn from_object(obj: &PDFObject, resolver: &dyn ResourceResolver) -> Result<Self> {
        Self::parse(obj, resolver, 0)
    }

    fn parse(obj: &PDFObject, resolver: &dyn ResourceResolver, depth: usize) -> Result<Self> {
        if depth > MAX_FUNCTION_DEPTH {
            return Err(invalid("functions nested too deeply"));
        }
        let obj = resolver.resolve(obj)?;
        if let PDFObject::Array(items) = &obj {
            let functions = items
                .iter()
                .map(|item| Self::parse(item, resolver, depth + 1))
                .collect::<Result<Vec<_>>>()?;
            return Self::array(functions);
        }

        let dict = obj
            .as_dict()
            .map_err(|_| invalid(format!("expected a function, got {}", obj.type_name())))?;
        let function_type = required(dict, "FunctionType", resolver)?
            .as_int()
            .map_err(|_| invalid("FunctionType must be an integer"))?;
        let domain = num_array(dict, "Domain", resolver)?
            .ok_or_else(|| invalid("missing Domain"))?;
        let range = num_array(dict, "Range", resolver)?;

        match function_type {
            0 => {
                let PDFObject::Stream(stream) = &obj else {
                    return Err(invalid("sampled function must be a stream"));
                };
                let range = range.ok_or_else(|| invalid("sampled function without Range"))?;
                let size = num_array(dict, "Size", resolver)?
                    .ok_or_else(|| invalid("sampled function without Size"))?
                    .into_iter()
                    .map(|s| {
                        if s >= 1.0 && s.fract() == 0.0 {
                            Ok(s as usize)
                        } else {
                            Err(invalid(format!("Size entry {s}")))
                        }
                    })
                    .collect::<Result<Vec<_>>>()?;
                let bps = required(dict, "BitsPerSample", resolver)?
                    .as_int()
                    .map_err(|_| invalid("BitsPerSample must be an integer"))?;
                let bps = u32::try_from(bps).map_err(|_| invalid(format!("BitsPerSample {bps}")))?;
                if let Some(order) = dict.get("Order")
                    && resolver.resolve(order)?.as_int().unwrap_or(1) == 3
                {
                    tracing::debug!("cubic sampled function evaluated with linear interpolation");
                }
                let encode = num_array(dict, "Encode", resolver)?;
                let decode = num_array(dict, "Decode", resolver)?;
                let data = resolver.stream_data(stream)?;
                Self::sampled(domain, range, size, bps, encode, decode, &data)
            }
            2 => {
                let c0 = num_array(dict, "C0", resolver)?.unwrap_or_else(|| vec![0.0]);
                let c1 = num_array(dict, "C1", resolver)?.unwrap_or_else(|| vec![1.0]);
                let n = required(dict, "N", resolver)?
                    .as_num()
                    .map_err(|_| invalid("N must be a number"))?;
                Self::exponential(domain, range, c0, c1, n)
            }
            3 => {
                let functions = required(dict, "Functions", resolver)?;
                let functions = functions
                    .as_array()
                    .map_err(|_| invalid("Functions must be an array"))?
                    .iter()
                    .map(|f| Self::parse(f, resolver, depth + 1))
                    .collect::<Result<Vec<_>>>()?;
                let bounds = num_array(dict, "Bounds", resolver)?.unwrap_or_default();
                let encode = num_array(dict, "Encode", resolver)?
                    .ok_or_else(|| invalid("stitching function without Encode"))?;
                Self::stitching(domain, range, functions, bounds, encode)
            }
            4 => Err(RenderError::UnsupportedFeature(
                "PostScript calculator functions".into(),
            )),
            other => Err(invalid(format!("unknown FunctionType {other}"))),
        }
    }

    pub fn num_inputs(&self) -> usize {
        self.domain.len() / 2
    }

    pub fn num_outputs(&self) -> usize {
        match &self.kind {
            FunctionKind::Sampled(s) => s.num_outputs,
            FunctionKind::Exponential(e) => e.c0.len(),
            FunctionKind::Stitching(s) => s.functions[0].num_outputs(),
            FunctionKind::Array(fs) => fs.len(),
        }
    }

    pub fn domain(&self) -> &[f64] {
        &self.domain
    }

    pub fn range(&self) -> Option<&[f64]> {
        self.range.as_deref()
    }

    /// Evaluate into a caller-owned buffer.
    ///
    /// `out` is cleared first and holds `num_outputs()` values afterwards.
    /// Missing inputs default to the domain minimum.
    pub fn evaluate_into(&self, input: &[f64], out: &mut FunctionOutput) {
        out.clear();
        let mut x: SmallVec<[f64; 4]> = SmallVec::with_capacity(self.num_inputs());
        for (i, pair) in self.domain.chunks_exact(2).enumerate() {
            x.push(clip(input.get(i).copied().unwrap_or(pair[0]), pair[0], pair[1]));
        }

        match &self.kind {
            FunctionKind::Sampled(s) => s.evaluate(&x, &self.domain, out),
            FunctionKind::Exponential(e) => e.evaluate(x[0], out),
            FunctionKind::Stitching(s) => s.evaluate(x[0], &self.domain, out),
            FunctionKind::Array(functions) => {
                let mut single = FunctionOutput::new();
                for f in functions {
                    f.evaluate_into(&x, &mut single);
                    out.push(single.first().copied().unwrap_or(0.0));
                }
            }
        }

        if let Some(range) = &self.range {
            for (value, pair) in out.iter_mut().zip(range.chunks_exact(2)) {
                *value = clip(*value, pair[0], pair[1]);
            }
        }
    }

    /// Evaluate and return a fresh output buffer.
    pub fn evaluate(&self, input: &[f64]) -> FunctionOutput {
        let mut out = FunctionOutput::new();
        self.evaluate_into(input, &mut out);
        out
    }
}

impl SampledFunction {
    fn sample(&self, index: usize, output: usize) -> f64 {
        f64::from(self.samples[index * self.num_outputs + output])
    }

    fn evaluate(&self, x: &[f64], domain: &[f64], out: &mut FunctionOutput) {
        let k = self.size.len();
        let mut lower: SmallVec<[usize; 4]> = SmallVec::with_capacity(k);
        let mut frac: SmallVec<[f64; 4]> = SmallVec::with_capacity(k);
        for i in 0..k {
            let max_index = self.size[i] - 1;
            let e = interpolate(
                x[i],
                domain[2 * i],
                domain[2 * i + 1],
                self.encode[2 * i],
                self.encode[2 * i + 1],
            );
            let e = clip(e, 0.0, max_index as f64);
            let floor = e.floor();
            let mut index = floor as usize;
            let mut t = e - floor;
            if index >= max_index {
                index = max_index;
                t = 0.0;
            }
            lower.push(index);
            frac.push(t);
        }

        let sample_max = 2f64.powi(self.bits_per_sample as i32) - 1.0;
        let push_decoded = |j: usize, s: f64, out: &mut FunctionOutput| {
            out.push(interpolate(
                s,
                0.0,
                sample_max,
                self.decode[2 * j],
                self.decode[2 * j + 1],
            ));
        };

        if k == 1 {
            let index = lower[0];
            for j in 0..self.num_outputs {
                let s0 = self.sample(index, j);
                let s = if frac[0] == 0.0 {
                    s0
                } else {
                    s0 + frac[0] * (self.sample(index + 1, j) - s0)
                };
                push_decoded(j, s, out);
            }
            return;
        }

        // Multilinear interpolation over the 2^k corners of the cell.
        let mut acc: SmallVec<[f64; 8]> = SmallVec::from_elem(0.0, self.num_outputs);
        for corner in 0..(1usize << k) {
            let mut weight = 1.0;
            let mut index = 0;
            let mut stride = 1;
            for i in 0..k {
                if corner >> i & 1 == 1 {
                    weight *= frac[i];
                    index += (lower[i] + 1) * stride;
                } else {
                    weight *= 1.0 - frac[i];
                    index += lower[i] * stride;
                }
                if weight == 0.0 {
                    break;
                }
                stride *= self.size[i];
            }
            if weight == 0.0 {
                continue;
            }
            for (j, slot) in acc.iter_mut().enumerate() {
                *slot += weight * self.sample(index, j);
            }
        }
        for (j, s) in acc.into_iter().enumerate() {
            push_decoded(j, s, out);
        }
    }
}

impl ExponentialFunction {
    fn evaluate(&self, x: f64, out: &mut FunctionOutput) {
        let xn = if self.n == 1.0 { x } else { x.powf(self.n) };
        out.extend(
            self.c0
                .iter()
                .zip(&self.c1)
                .map(|(c0, c1)| c0 + xn * (c1 - c0)),
        );
    }
}

impl StitchingFunction {
    /// Index of the sub-function owning `x`.
    fn route(&self, x: f64) -> usize {
        self.bounds
            .iter()
            .position(|&b| x < b)
            .unwrap_or(self.functions.len() - 1)
    }

    fn evaluate(&self, x: f64, domain: &[f64], out: &mut FunctionOutput) {
        let i = self.route(x);
        let lo = if i == 0 { domain[0] } else { self.bounds[i - 1] };
        let hi = if i == self.bounds.len() {
            domain[1]
        } else {
            self.bounds[i]
        };
        let local = interpolate(x, lo, hi, self.encode[2 * i], self.encode[2 * i + 1]);
        self.functions[i].evaluate_into(&[local], out);
    }
}

/// Unpack `count` big-endian samples of `bps` bits each.
fn unpack_samples(data: &[u8], bps: u32, count: usize) -> Result<Vec<u32>> {
    let needed = count
        .checked_mul(bps as usize)
        .ok_or_else(|| invalid("sample grid too large"))?
        .div_ceil(8);
    if data.len() < needed {
        return Err(invalid(format!(
            "sample data has {} bytes, need {needed}",
            data.len()
        )));
    }
    let mut samples = Vec::with_capacity(count);
    let mut bytes = data.iter();
    let mut acc: u64 = 0;
    let mut nbits: u32 = 0;
    let mask: u64 = (1u64 << bps) - 1;
    for _ in 0..count {
        while nbits < bps {
            let byte = bytes.next().copied().unwrap_or(0);
            acc = (acc << 8) | u64::from(byte);
            nbits += 8;
        }
        nbits -= bps;
        samples.push(((acc >> nbits) & mask) as u32);
        acc &= (1u64 << nbits) - 1;
    }
    Ok(samples)
}

fn required(dict: &PDFDict, key: &str, resolver: &dyn ResourceResolver) -> Result<PDFObject> {
    let obj = dict.get(key).ok_or_else(|| invalid(format!("missing {key}")))?;
    resolver.resolve(obj)
}

fn num_array(
    dict: &PDFDict,
    key: &str,
    resolver: &dyn ResourceResolver,
) -> Result<Option<Vec<f64>>> {
    dict.get(key)
        .map(|obj| {
            resolver
                .resolve_num_array(obj)
                .map_err(|_| invalid(format!("{key} must be an array of numbers")))
        })
        .transpose()
}
