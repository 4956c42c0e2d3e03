//! Portable encodings for resources.
//!
//! An [`EncodedResource`] pairs a kind tag with a text payload. The tag picks
//! the codec, so new encodings can be added without touching bundle code.

use std::collections::BTreeMap;
use std::fmt;

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use serde::{Deserialize, Serialize};

use crate::error::ResourceError;
use crate::surface::Surface;

const PNG_DATA_URI_PREFIX: &str = "data:image/png;base64,";
const EMPTY_DATA_URI_HEADER: &str = "data:";

/// A resource at rest: `{ "type": <kind>, "data": <payload> }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodedResource {
    #[serde(rename = "type")]
    pub kind: String,
    pub data: String,
}

/// A pure encode/decode pair for one encoding kind.
pub trait ResourceCodec {
    /// The tag stored in [`EncodedResource::kind`].
    fn kind(&self) -> &'static str;

    fn encode(&self, surface: &Surface) -> Result<String, ResourceError>;

    fn decode(&self, data: &str) -> Result<Surface, ResourceError>;
}

/// PNG image wrapped in a base64 data URI, as produced by a browser canvas.
///
/// PNG cannot hold a zero-sized image. A canvas exports one as the empty
/// URI `data:,`; a surface with only one zero side is written `data:,<w>x<h>`
/// so its other dimension survives.
#[derive(Debug, Clone, Copy, Default)]
pub struct CanvasDataUri;

impl CanvasDataUri {
    pub const KIND: &'static str = "canvas-datauri";
}

impl ResourceCodec for CanvasDataUri {
    fn kind(&self) -> &'static str {
        Self::KIND
    }

    fn encode(&self, surface: &Surface) -> Result<String, ResourceError> {
        let (width, height) = (surface.width(), surface.height());
        if width == 0 || height == 0 {
            return Ok(if width == 0 && height == 0 {
                format!("{EMPTY_DATA_URI_HEADER},")
            } else {
                format!("{EMPTY_DATA_URI_HEADER},{width}x{height}")
            });
        }

        let mut png_bytes = Vec::new();
        {
            let mut encoder = png::Encoder::new(&mut png_bytes, width, height);
            encoder.set_color(png::ColorType::Rgba);
            encoder.set_depth(png::BitDepth::Eight);
            let mut writer = encoder.write_header()?;
            writer.write_image_data(surface.as_rgba())?;
            writer.finish()?;
        }
        Ok(format!("{PNG_DATA_URI_PREFIX}{}", BASE64.encode(&png_bytes)))
    }

    fn decode(&self, data: &str) -> Result<Surface, ResourceError> {
        let (header, payload) = data.split_once(',').ok_or_else(|| ResourceError::Malformed {
            kind: Self::KIND,
            reason: "missing ',' in data URI".into(),
        })?;
        if header == EMPTY_DATA_URI_HEADER {
            return Self::decode_empty(payload);
        }
        if !header.starts_with("data:") || !header.ends_with(";base64") {
            return Err(ResourceError::Malformed {
                kind: Self::KIND,
                reason: format!("unexpected data URI header {header:?}"),
            });
        }
        let png_bytes = BASE64.decode(payload.trim())?;

        let mut decoder = png::Decoder::new(png_bytes.as_slice());
        decoder.set_transformations(png::Transformations::EXPAND | png::Transformations::STRIP_16);
        let mut reader = decoder.read_info()?;
        let mut buf = vec![0; reader.output_buffer_size()];
        let info = reader.next_frame(&mut buf)?;
        buf.truncate(info.buffer_size());

        let rgba = match info.color_type {
            png::ColorType::Rgba => buf,
            png::ColorType::Rgb => buf
                .chunks_exact(3)
                .flat_map(|p| [p[0], p[1], p[2], 255])
                .collect(),
            png::ColorType::GrayscaleAlpha => buf
                .chunks_exact(2)
                .flat_map(|p| [p[0], p[0], p[0], p[1]])
                .collect(),
            png::ColorType::Grayscale => buf.iter().flat_map(|&g| [g, g, g, 255]).collect(),
            png::ColorType::Indexed => {
                return Err(ResourceError::Malformed {
                    kind: Self::KIND,
                    reason: "indexed PNG was not expanded".into(),
                });
            }
        };
        Surface::from_rgba(info.width, info.height, rgba)
    }
}

impl CanvasDataUri {
    fn decode_empty(payload: &str) -> Result<Surface, ResourceError> {
        let malformed = |reason: String| ResourceError::Malformed {
            kind: Self::KIND,
            reason,
        };
        let payload = payload.trim();
        if payload.is_empty() {
            return Ok(Surface::new(0, 0));
        }
        let (w, h) = payload
            .split_once('x')
            .ok_or_else(|| malformed(format!("unexpected empty image payload {payload:?}")))?;
        let width: u32 = w.parse().map_err(|_| malformed("bad width".into()))?;
        let height: u32 = h.parse().map_err(|_| malformed("bad height".into()))?;
        if width != 0 && height != 0 {
            return Err(malformed(format!(
                "empty image URI claims {width}x{height} pixels"
            )));
        }
        Surface::from_rgba(width, height, Vec::new())
    }
}

/// Raw RGBA8 bytes as base64, prefixed with the dimensions: `"<w>x<h>;<base64>"`.
#[derive(Debug, Clone, Copy, Default)]
pub struct RawRgba;

impl RawRgba {
    pub const KIND: &'static str = "rgba-base64";
}

impl ResourceCodec for RawRgba {
    fn kind(&self) -> &'static str {
        Self::KIND
    }

    fn encode(&self, surface: &Surface) -> Result<String, ResourceError> {
        Ok(format!(
            "{}x{};{}",
            surface.width(),
            surface.height(),
            BASE64.encode(surface.as_rgba())
        ))
    }

    fn decode(&self, data: &str) -> Result<Surface, ResourceError> {
        let malformed = |reason: &str| ResourceError::Malformed {
            kind: Self::KIND,
            reason: reason.into(),
        };
        let (dims, payload) = data
            .split_once(';')
            .ok_or_else(|| malformed("missing ';' after dimensions"))?;
        let (w, h) = dims
            .split_once('x')
            .ok_or_else(|| malformed("dimensions must look like <w>x<h>"))?;
        let width = w.parse().map_err(|_| malformed("bad width"))?;
        let height = h.parse().map_err(|_| malformed("bad height"))?;
        Surface::from_rgba(width, height, BASE64.decode(payload.trim())?)
    }
}

/// Codecs by kind, plus the kind used when encoding.
pub struct CodecRegistry {
    codecs: BTreeMap<&'static str, Box<dyn ResourceCodec>>,
    default_kind: &'static str,
}

impl Default for CodecRegistry {
    fn default() -> Self {
        let mut registry = Self {
            codecs: BTreeMap::new(),
            default_kind: CanvasDataUri::KIND,
        };
        registry.register(CanvasDataUri);
        registry.register(RawRgba);
        registry
    }
}

impl fmt::Debug for CodecRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CodecRegistry")
            .field("kinds", &self.codecs.keys().collect::<Vec<_>>())
            .field("default_kind", &self.default_kind)
            .finish()
    }
}

impl CodecRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace the codec for its kind.
    pub fn register(&mut self, codec: impl ResourceCodec + 'static) {
        self.codecs.insert(codec.kind(), Box::new(codec));
    }

    /// Choose the kind used by [`encode`](Self::encode).
    pub fn set_default_kind(&mut self, kind: &str) -> Result<(), ResourceError> {
        let (&kind, _) = self
            .codecs
            .get_key_value(kind)
            .ok_or_else(|| ResourceError::UnsupportedEncoding(kind.to_string()))?;
        self.default_kind = kind;
        Ok(())
    }

    pub fn default_kind(&self) -> &'static str {
        self.default_kind
    }

    /// Registered kinds in ascending order.
    pub fn kinds(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.codecs.keys().copied()
    }

    /// Encode with the default kind.
    pub fn encode(&self, surface: &Surface) -> Result<EncodedResource, ResourceError> {
        self.encode_as(self.default_kind, surface)
    }

    pub fn encode_as(&self, kind: &str, surface: &Surface) -> Result<EncodedResource, ResourceError> {
        let codec = self.codec(kind)?;
        Ok(EncodedResource {
            kind: codec.kind().to_string(),
            data: codec.encode(surface)?,
        })
    }

    /// Decode with whichever codec the resource's kind names.
    pub fn decode(&self, encoded: &EncodedResource) -> Result<Surface, ResourceError> {
        self.codec(&encoded.kind)?.decode(&encoded.data)
    }

    fn codec(&self, kind: &str) -> Result<&dyn ResourceCodec, ResourceError> {
        self.codecs
            .get(kind)
            .map(|c| &**c)
            .ok_or_else(|| ResourceError::UnsupportedEncoding(kind.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient(width: u32, height: u32) -> Surface {
        let mut s = Surface::new(width, height);
        for y in 0..height {
            for x in 0..width {
                s.set_pixel(x, y, [(x * 16) as u8, (y * 16) as u8, 128, (x + y) as u8]);
            }
        }
        s
    }

    #[test]
    fn canvas_data_uri_roundtrip_is_pixel_exact() {
        let surface = gradient(9, 5);
        let data = CanvasDataUri.encode(&surface).unwrap();
        assert!(data.starts_with("data:image/png;base64,"));
        assert_eq!(CanvasDataUri.decode(&data).unwrap(), surface);
    }

    #[test]
    fn raw_rgba_roundtrip_is_pixel_exact() {
        let surface = gradient(3, 7);
        let data = RawRgba.encode(&surface).unwrap();
        assert!(data.starts_with("3x7;"));
        assert_eq!(RawRgba.decode(&data).unwrap(), surface);
    }

    #[test]
    fn canvas_decodes_rgb_png_with_opaque_alpha() {
        let mut png_bytes = Vec::new();
        {
            let mut encoder = png::Encoder::new(&mut png_bytes, 2, 1);
            encoder.set_color(png::ColorType::Rgb);
            encoder.set_depth(png::BitDepth::Eight);
            let mut writer = encoder.write_header().unwrap();
            writer.write_image_data(&[1, 2, 3, 4, 5, 6]).unwrap();
        }
        let data = format!("data:image/png;base64,{}", BASE64.encode(&png_bytes));
        let surface = CanvasDataUri.decode(&data).unwrap();
        assert_eq!(surface.pixel(0, 0), Some([1, 2, 3, 255]));
        assert_eq!(surface.pixel(1, 0), Some([4, 5, 6, 255]));
    }

    #[test]
    fn canvas_rejects_garbage() {
        assert!(matches!(
            CanvasDataUri.decode("not a data uri"),
            Err(ResourceError::Malformed { .. })
        ));
        assert!(matches!(
            CanvasDataUri.decode("data:image/png;base64,@@@"),
            Err(ResourceError::Base64(_))
        ));
        let not_png = format!("data:image/png;base64,{}", BASE64.encode(b"hello"));
        assert!(matches!(
            CanvasDataUri.decode(&not_png),
            Err(ResourceError::PngDecode(_))
        ));
    }

    #[test]
    fn zero_sized_surfaces_roundtrip() {
        for (width, height) in [(0, 0), (0, 5), (7, 0)] {
            let surface = Surface::new(width, height);
            for codec in [&CanvasDataUri as &dyn ResourceCodec, &RawRgba] {
                let data = codec.encode(&surface).unwrap();
                let back = codec.decode(&data).unwrap();
                assert_eq!((back.width(), back.height()), (width, height), "{data}");
                assert_eq!(back, surface);
            }
        }
        assert_eq!(CanvasDataUri.encode(&Surface::new(0, 0)).unwrap(), "data:,");
        assert_eq!(CanvasDataUri.encode(&Surface::new(0, 5)).unwrap(), "data:,0x5");
    }

    #[test]
    fn canvas_empty_uri_must_be_empty() {
        assert_eq!(CanvasDataUri.decode("data:,").unwrap(), Surface::new(0, 0));
        for data in ["data:,3x2", "data:,wide", "data:,0xq"] {
            assert!(
                matches!(
                    CanvasDataUri.decode(data),
                    Err(ResourceError::Malformed { .. })
                ),
                "{data}"
            );
        }
    }

    #[test]
    fn raw_rgba_rejects_size_mismatch() {
        let data = format!("2x2;{}", BASE64.encode([0u8; 8]));
        assert!(matches!(
            RawRgba.decode(&data),
            Err(ResourceError::SizeMismatch { .. })
        ));
    }

    #[test]
    fn registry_dispatches_on_kind() {
        let registry = CodecRegistry::default();
        let surface = gradient(4, 4);

        let encoded = registry.encode(&surface).unwrap();
        assert_eq!(encoded.kind, "canvas-datauri");
        assert_eq!(registry.decode(&encoded).unwrap(), surface);

        let raw = registry.encode_as(RawRgba::KIND, &surface).unwrap();
        assert_eq!(raw.kind, "rgba-base64");
        assert_eq!(registry.decode(&raw).unwrap(), surface);
    }

    #[test]
    fn registry_rejects_unknown_kind() {
        let mut registry = CodecRegistry::default();
        let encoded = EncodedResource {
            kind: "svg".into(),
            data: String::new(),
        };
        assert!(matches!(
            registry.decode(&encoded),
            Err(ResourceError::UnsupportedEncoding(k)) if k == "svg"
        ));
        assert!(registry.set_default_kind("svg").is_err());
        assert_eq!(registry.default_kind(), CanvasDataUri::KIND);

        registry.set_default_kind(RawRgba::KIND).unwrap();
        assert_eq!(registry.default_kind(), RawRgba::KIND);
    }

    #[test]
    fn encoded_resource_json_shape() {
        let encoded = EncodedResource {
            kind: "canvas-datauri".into(),
            data: "data:x".into(),
        };
        let json = serde_json::to_value(&encoded).unwrap();
        assert_eq!(json["type"], "canvas-datauri");
        assert_eq!(json["data"], "data:x");
    }
}
