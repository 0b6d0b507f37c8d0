//! Image decoding.
//!
//! Images reach the drawing surface as ARGB [`Raster`]s. The interpreter
//! reads the image dictionary into an [`ImageSpec`], resolves the color
//! space, and hands the raw stream bytes to the [`ImageDecoder`] held by the
//! `ResourceManager`. [`BasicImageDecoder`] covers uncompressed sample data
//! behind the generic stream filters; image codecs belong to a richer
//! decoder supplied by the embedding application.

use crate::codec;
use crate::error::{RenderError, Result};
use crate::interp::device::Raster;
use crate::interp::resources::ResourceResolver;
use crate::model::color::{ColorSpace, Components, Rgb};
use crate::model::objects::{PDFDict, PDFObject};

/// Upper bound on decoded image size.
pub const MAX_IMAGE_PIXELS: u64 = 1 << 26;

/// Image dictionary entries needed to decode samples.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageSpec {
    pub width: u32,
    pub height: u32,
    pub bits_per_component: u32,
    pub image_mask: bool,
    /// `/Decode`, two numbers per component.
    pub decode: Option<Vec<f64>>,
    /// Color-key mask ranges (`/Mask` array), two integers per component.
    pub color_key: Option<Vec<i64>>,
    /// `/Filter` and `/DecodeParms` of the image stream.
    pub filters: PDFDict,
    /// Paint color of stencil masks.
    pub mask_color: Rgb,
}

impl ImageSpec {
    pub fn from_dict(dict: &PDFDict, resolver: &dyn ResourceResolver) -> Result<Self> {
        let get = |key: &str| -> Result<Option<PDFObject>> {
            dict.get(key).map(|v| resolver.resolve(v)).transpose()
        };
        let dimension = |key: &str| -> Result<u32> {
            let value = get(key)?
                .ok_or_else(|| RenderError::InvalidXObject(format!("image without /{key}")))?
                .as_int()?;
            u32::try_from(value)
                .ok()
                .filter(|v| *v > 0)
                .ok_or_else(|| RenderError::InvalidXObject(format!("image /{key} {value}")))
        };
        let width = dimension("Width")?;
        let height = dimension("Height")?;
        let image_mask = match get("ImageMask")? {
            Some(v) => v.as_bool()?,
            None => false,
        };
        let bits_per_component = match get("BitsPerComponent")? {
            Some(v) => v.as_int()? as u32,
            None if image_mask => 1,
            None => {
                return Err(RenderError::InvalidXObject(
                    "image without /BitsPerComponent".into(),
                ));
            }
        };
        let decode = dict
            .get("Decode")
            .map(|v| resolver.resolve_num_array(v))
            .transpose()?;
        let color_key = match get("Mask")? {
            Some(PDFObject::Array(items)) => Some(
                items
                    .iter()
                    .map(|v| resolver.resolve(v)?.as_int())
                    .collect::<Result<Vec<_>>>()?,
            ),
            // stencil and soft masks given as streams are not applied
            Some(PDFObject::Stream(_)) => {
                tracing::debug!("ignoring explicit image mask stream");
                None
            }
            _ => None,
        };
        let mut filters = PDFDict::new();
        for key in ["Filter", "DecodeParms"] {
            if let Some(v) = get(key)? {
                filters.insert(key.to_string(), v);
            }
        }
        Ok(Self {
            width,
            height,
            bits_per_component,
            image_mask,
            decode,
            color_key,
            filters,
            mask_color: Rgb::BLACK,
        })
    }

    pub fn with_mask_color(mut self, color: Rgb) -> Self {
        self.mask_color = color;
        self
    }
}

/// Turns image sample data into pixels.
pub trait ImageDecoder {
    /// Decode `data` (raw stream bytes, filters not yet applied).
    ///
    /// `colorspace` is `None` for stencil masks.
    fn decode(
        &self,
        spec: &ImageSpec,
        data: &[u8],
        colorspace: Option<&ColorSpace>,
    ) -> Result<Raster>;
}

/// Decoder for 1, 2, 4, 8 and 16 bit samples behind generic filters.
#[derive(Debug, Clone, Copy, Default)]
pub struct BasicImageDecoder;

/// Reads packed big-endian samples of one row.
struct SampleReader<'a> {
    data: &'a [u8],
    bits: u32,
    pos: usize,
}

impl<'a> SampleReader<'a> {
    const fn new(data: &'a [u8], bits: u32) -> Self {
        Self { data, bits, pos: 0 }
    }

    fn next(&mut self) -> u32 {
        let value = match self.bits {
            16 => {
                let i = self.pos / 8;
                (u32::from(self.data[i]) << 8) | u32::from(self.data[i + 1])
            }
            8 => u32::from(self.data[self.pos / 8]),
            bits => {
                let byte = self.data[self.pos / 8];
                let shift = 8 - bits - (self.pos % 8) as u32;
                (u32::from(byte) >> shift) & ((1 << bits) - 1)
            }
        };
        self.pos += self.bits as usize;
        value
    }
}

impl ImageDecoder for BasicImageDecoder {
    fn decode(
        &self,
        spec: &ImageSpec,
        data: &[u8],
        colorspace: Option<&ColorSpace>,
    ) -> Result<Raster> {
        let bits = spec.bits_per_component;
        if !matches!(bits, 1 | 2 | 4 | 8 | 16) {
            return Err(RenderError::UnsupportedFeature(format!(
                "{bits} bits per image sample"
            )));
        }
        let pixels = u64::from(spec.width) * u64::from(spec.height);
        if pixels > MAX_IMAGE_PIXELS {
            return Err(RenderError::UnsupportedFeature(format!(
                "image of {pixels} pixels"
            )));
        }
        let (samples, rest) = codec::decode_filters(data, &spec.filters)?;
        if let Some(name) = rest.first() {
            return Err(RenderError::UnsupportedFeature(format!("image filter {name}")));
        }

        let ncomp = match (spec.image_mask, colorspace) {
            (true, _) => 1,
            (false, Some(cs)) => cs.ncomponents(),
            (false, None) => {
                return Err(RenderError::InvalidXObject("image without /ColorSpace".into()));
            }
        };
        let stride = (spec.width as usize * ncomp * bits as usize).div_ceil(8);
        let needed = stride * spec.height as usize;
        if samples.len() < needed {
            return Err(RenderError::DecodeError(format!(
                "image data too short: {} < {needed} bytes",
                samples.len()
            )));
        }

        let max = f64::from((1u32 << bits) - 1);
        let ranges: Vec<(f64, f64)> = (0..ncomp)
            .map(|i| match &spec.decode {
                Some(d) if d.len() >= 2 * ncomp => (d[2 * i], d[2 * i + 1]),
                _ if spec.image_mask => (0.0, 1.0),
                _ => match colorspace {
                    Some(ColorSpace::Indexed(_)) => (0.0, max),
                    Some(cs) => cs.component_range(i),
                    None => (0.0, 1.0),
                },
            })
            .collect();

        let mut raster = Raster::new(spec.width, spec.height);
        let mask_argb = spec.mask_color.to_argb(1.0);
        let mut raw = vec![0u32; ncomp];
        let mut comps = Components::new();
        for (row, out) in samples
            .chunks_exact(stride)
            .take(spec.height as usize)
            .zip(raster.pixels.chunks_exact_mut(spec.width as usize))
        {
            let mut reader = SampleReader::new(row, bits);
            for px in out.iter_mut() {
                for slot in raw.iter_mut() {
                    *slot = reader.next();
                }
                if let Some(key) = &spec.color_key
                    && raw
                        .iter()
                        .zip(key.chunks_exact(2))
                        .all(|(&s, r)| (r[0]..=r[1]).contains(&i64::from(s)))
                {
                    continue;
                }
                comps.clear();
                comps.extend(
                    raw.iter()
                        .zip(&ranges)
                        .map(|(&s, &(lo, hi))| lo + f64::from(s) * (hi - lo) / max),
                );
                *px = match colorspace {
                    // a decoded 0 marks painted stencil pixels
                    _ if spec.image_mask => {
                        if comps[0] < 0.5 {
                            mask_argb
                        } else {
                            0
                        }
                    }
                    Some(cs) => cs.to_rgb(&comps)?.to_argb(1.0),
                    None => 0,
                };
            }
        }
        Ok(raster)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interp::resources::ObjectStore;
    use crate::model::color::Indexed;
    use crate::model::objects::dict_from;

    fn spec(pairs: Vec<(&str, PDFObject)>) -> ImageSpec {
        ImageSpec::from_dict(&dict_from(pairs), &ObjectStore::new()).unwrap()
    }

    #[test]
    fn test_gray_8bit() {
        let spec = spec(vec![
            ("Width", PDFObject::Int(2)),
            ("Height", PDFObject::Int(1)),
            ("BitsPerComponent", PDFObject::Int(8)),
        ]);
        let raster = BasicImageDecoder
            .decode(&spec, &[0x00, 0xff], Some(&ColorSpace::DeviceGray))
            .unwrap();
        assert_eq!(raster.pixels, vec![0xFF00_0000, 0xFFFF_FFFF]);
    }

    #[test]
    fn test_rgb_with_hex_filter() {
        let spec = spec(vec![
            ("Width", PDFObject::Int(1)),
            ("Height", PDFObject::Int(1)),
            ("BitsPerComponent", PDFObject::Int(8)),
            ("Filter", PDFObject::name("ASCIIHexDecode")),
        ]);
        let raster = BasicImageDecoder
            .decode(&spec, b"ff0000>", Some(&ColorSpace::DeviceRGB))
            .unwrap();
        assert_eq!(raster.pixels, vec![0xFFFF_0000]);
    }

    #[test]
    fn test_stencil_mask_and_inverted_decode() {
        let base = vec![
            ("Width", PDFObject::Int(4)),
            ("Height", PDFObject::Int(1)),
            ("ImageMask", PDFObject::Bool(true)),
        ];
        let red = Rgb::new(1.0, 0.0, 0.0);
        let plain = spec(base.clone()).with_mask_color(red);
        let raster = BasicImageDecoder.decode(&plain, &[0b0101_0000], None).unwrap();
        assert_eq!(raster.pixels, vec![0xFFFF_0000, 0, 0xFFFF_0000, 0]);

        let mut inverted = base;
        inverted.push((
            "Decode",
            PDFObject::Array(vec![PDFObject::Int(1), PDFObject::Int(0)]),
        ));
        let raster = BasicImageDecoder
            .decode(&spec(inverted).with_mask_color(red), &[0b0101_0000], None)
            .unwrap();
        assert_eq!(raster.pixels, vec![0, 0xFFFF_0000, 0, 0xFFFF_0000]);
    }

    #[test]
    fn test_indexed_2bit_samples() {
        let indexed = Indexed::new(
            ColorSpace::device_rgb(),
            2,
            &[0, 0, 0, 255, 0, 0, 0, 0, 255],
        )
        .unwrap();
        let cs = ColorSpace::Indexed(indexed);
        let spec = spec(vec![
            ("Width", PDFObject::Int(3)),
            ("Height", PDFObject::Int(1)),
            ("BitsPerComponent", PDFObject::Int(2)),
        ]);
        let raster = BasicImageDecoder.decode(&spec, &[0b1001_0000], Some(&cs)).unwrap();
        assert_eq!(raster.pixels, vec![0xFF00_00FF, 0xFFFF_0000, 0xFF00_0000]);
    }

    #[test]
    fn test_color_key_mask() {
        let spec = spec(vec![
            ("Width", PDFObject::Int(2)),
            ("Height", PDFObject::Int(1)),
            ("BitsPerComponent", PDFObject::Int(8)),
            (
                "Mask",
                PDFObject::Array(vec![PDFObject::Int(250), PDFObject::Int(255)]),
            ),
        ]);
        let raster = BasicImageDecoder
            .decode(&spec, &[0x10, 0xfe], Some(&ColorSpace::DeviceGray))
            .unwrap();
        assert_eq!(raster.pixels[1], 0);
        assert_ne!(raster.pixels[0], 0);
    }

    #[test]
    fn test_short_data_and_codecs() {
        let short = spec(vec![
            ("Width", PDFObject::Int(4)),
            ("Height", PDFObject::Int(4)),
            ("BitsPerComponent", PDFObject::Int(8)),
        ]);
        assert!(matches!(
            BasicImageDecoder.decode(&short, &[0; 3], Some(&ColorSpace::DeviceGray)),
            Err(RenderError::DecodeError(_))
        ));
        let jpeg = spec(vec![
            ("Width", PDFObject::Int(1)),
            ("Height", PDFObject::Int(1)),
            ("BitsPerComponent", PDFObject::Int(8)),
            ("Filter", PDFObject::name("DCTDecode")),
        ]);
        let err = BasicImageDecoder
            .decode(&jpeg, &[0xff, 0xd8], Some(&ColorSpace::DeviceGray))
            .unwrap_err();
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_missing_dimensions() {
        let err = ImageSpec::from_dict(
            &dict_from([("Height", PDFObject::Int(1))]),
            &ObjectStore::new(),
        )
        .unwrap_err();
        assert!(matches!(err, RenderError::InvalidXObject(_)));
    }
}
