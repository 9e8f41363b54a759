//! Pixel channel I/O: one hidden bit per colour channel, raster order.
//!
//! Cover images are decoded through the `image` crate and normalized to a flat
//! list of `(R, G, B)` triples. Output is always re-encoded as PNG; a lossy
//! re-encode after embedding destroys the LSB plane.

use crate::bits::{from_bits, DelimiterScanner};
use crate::error::StegoError;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use std::io::Cursor;
use std::path::Path;
use tracing::warn;

/// How pixels that are not an integer 3- or 4-tuple are treated on load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PixelMode {
    /// Coerce anything unusual to black `(0, 0, 0)`.
    #[default]
    Lenient,
    /// Reject the image with [`StegoError::CorruptedPixelData`].
    Strict,
}

/// A decoded pixel before normalization.
#[derive(Debug, Clone, PartialEq)]
pub enum PixelValue {
    Rgb([u8; 3]),
    Rgba([u8; 4]),
    Gray(u8),
    GrayAlpha([u8; 2]),
    Float(Vec<f32>),
    Missing,
}

impl PixelValue {
    fn shape(&self) -> String {
        match self {
            PixelValue::Rgb(_) => "rgb".to_string(),
            PixelValue::Rgba(_) => "rgba".to_string(),
            PixelValue::Gray(_) => "grayscale scalar".to_string(),
            PixelValue::GrayAlpha(_) => "grayscale+alpha pair".to_string(),
            PixelValue::Float(v) => format!("{}-channel float", v.len()),
            PixelValue::Missing => "missing".to_string(),
        }
    }
}

/// Map a decoded pixel to the canonical `(R, G, B)` triple.
pub fn normalize_pixel(
    value: &PixelValue,
    mode: PixelMode,
    x: u32,
    y: u32,
) -> Result<[u8; 3], StegoError> {
    match value {
        PixelValue::Rgb(rgb) => Ok(*rgb),
        PixelValue::Rgba([r, g, b, _]) => Ok([*r, *g, *b]),
        other => match mode {
            PixelMode::Lenient => Ok([0, 0, 0]),
            PixelMode::Strict => Err(StegoError::CorruptedPixelData {
                x,
                y,
                shape: other.shape(),
            }),
        },
    }
}

/// Decode every pixel of `image` into a [`PixelValue`], raster order.
fn decoded_pixels(image: &DynamicImage) -> Vec<PixelValue> {
    let narrow = |v: u16| (v >> 8) as u8;
    match image {
        DynamicImage::ImageRgb8(buf) => buf.pixels().map(|p| PixelValue::Rgb(p.0)).collect(),
        DynamicImage::ImageRgba8(buf) => buf.pixels().map(|p| PixelValue::Rgba(p.0)).collect(),
        DynamicImage::ImageLuma8(buf) => buf.pixels().map(|p| PixelValue::Gray(p.0[0])).collect(),
        DynamicImage::ImageLumaA8(buf) => {
            buf.pixels().map(|p| PixelValue::GrayAlpha(p.0)).collect()
        }
        DynamicImage::ImageRgb16(buf) => buf
            .pixels()
            .map(|p| PixelValue::Rgb(p.0.map(narrow)))
            .collect(),
        DynamicImage::ImageRgba16(buf) => buf
            .pixels()
            .map(|p| PixelValue::Rgba(p.0.map(narrow)))
            .collect(),
        DynamicImage::ImageLuma16(buf) => buf
            .pixels()
            .map(|p| PixelValue::Gray(narrow(p.0[0])))
            .collect(),
        DynamicImage::ImageLumaA16(buf) => buf
            .pixels()
            .map(|p| PixelValue::GrayAlpha(p.0.map(narrow)))
            .collect(),
        DynamicImage::ImageRgb32F(buf) => buf
            .pixels()
            .map(|p| PixelValue::Float(p.0.to_vec()))
            .collect(),
        DynamicImage::ImageRgba32F(buf) => buf
            .pixels()
            .map(|p| PixelValue::Float(p.0.to_vec()))
            .collect(),
        _ => vec![PixelValue::Missing; image.width() as usize * image.height() as usize],
    }
}

/// A cover (or stego) image as a flat list of RGB triples in row-major order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoverImage {
    width: u32,
    height: u32,
    pixels: Vec<[u8; 3]>,
}

impl CoverImage {
    /// A solid-colour image, mostly useful as a synthetic cover.
    pub fn new(width: u32, height: u32, fill: [u8; 3]) -> Self {
        Self {
            width,
            height,
            pixels: vec![fill; width as usize * height as usize],
        }
    }

    /// Normalize a decoded image according to `mode`.
    pub fn from_dynamic(image: &DynamicImage, mode: PixelMode) -> Result<Self, StegoError> {
        let width = image.width();
        let height = image.height();
        let decoded = decoded_pixels(image);

        let mut pixels = Vec::with_capacity(decoded.len());
        let mut coerced = 0usize;
        for (i, value) in decoded.iter().enumerate() {
            let x = (i % width.max(1) as usize) as u32;
            let y = (i / width.max(1) as usize) as u32;
            let rgb = normalize_pixel(value, mode, x, y)?;
            if !matches!(value, PixelValue::Rgb(_) | PixelValue::Rgba(_)) {
                coerced += 1;
            }
            pixels.push(rgb);
        }
        if coerced > 0 {
            warn!(coerced, width, height, "coerced non-RGB pixels to black");
        }

        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    /// Wrap an 8-bit RGB buffer without any coercion.
    pub fn from_rgb_image(image: &RgbImage) -> Self {
        Self {
            width: image.width(),
            height: image.height(),
            pixels: image.pixels().map(|p| p.0).collect(),
        }
    }

    /// Decode an image from encoded bytes (PNG, JPEG, ...).
    pub fn from_bytes(bytes: &[u8], mode: PixelMode) -> Result<Self, StegoError> {
        let image = image::load_from_memory(bytes)?;
        Self::from_dynamic(&image, mode)
    }

    /// Decode an image file.
    pub fn open<P: AsRef<Path>>(path: P, mode: PixelMode) -> Result<Self, StegoError> {
        let image = image::open(path)?;
        Self::from_dynamic(&image, mode)
    }

    pub fn to_rgb_image(&self) -> RgbImage {
        RgbImage::from_fn(self.width, self.height, |x, y| {
            Rgb(self.pixels[y as usize * self.width as usize + x as usize])
        })
    }

    /// Encode losslessly as PNG.
    pub fn to_png_bytes(&self) -> Result<Vec<u8>, StegoError> {
        let mut buffer = Vec::new();
        DynamicImage::ImageRgb8(self.to_rgb_image())
            .write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)?;
        Ok(buffer)
    }

    /// Write the image as PNG regardless of the path's extension.
    pub fn save_png<P: AsRef<Path>>(&self, path: P) -> Result<(), StegoError> {
        self.to_rgb_image()
            .save_with_format(path, ImageFormat::Png)?;
        Ok(())
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixel(&self, x: u32, y: u32) -> [u8; 3] {
        self.pixels[y as usize * self.width as usize + x as usize]
    }

    pub fn set_pixel(&mut self, x: u32, y: u32, rgb: [u8; 3]) {
        self.pixels[y as usize * self.width as usize + x as usize] = rgb;
    }

    /// Number of hideable bits: one per channel.
    pub fn capacity_bits(&self) -> usize {
        self.pixels.len() * 3
    }

    pub fn capacity_bytes(&self) -> usize {
        self.capacity_bits() / 8
    }

    /// Overwrite channel LSBs with `bits`, R then G then B, pixel by pixel.
    ///
    /// The capacity check happens before any pixel is touched.
    pub fn embed_bits(&mut self, bits: &[bool]) -> Result<(), StegoError> {
        if bits.len() > self.capacity_bits() {
            return Err(StegoError::CapacityExceeded {
                needed_bits: bits.len(),
                available_bits: self.capacity_bits(),
            });
        }

        for (i, &bit) in bits.iter().enumerate() {
            let channel = &mut self.pixels[i / 3][i % 3];
            *channel = (*channel & !1) | bit as u8;
        }
        Ok(())
    }

    /// All channel LSBs in embedding order.
    pub fn lsb_bits(&self) -> impl Iterator<Item = bool> + '_ {
        self.pixels
            .iter()
            .flat_map(|px| px.iter().map(|channel| channel & 1 == 1))
    }

    /// Collect LSBs until the collected tail equals `delimiter_bits`.
    ///
    /// The returned bits include the delimiter.
    pub fn extract_until(&self, delimiter_bits: &[bool]) -> Result<Vec<bool>, StegoError> {
        let mut scanner = DelimiterScanner::new(delimiter_bits);
        let mut collected = Vec::new();
        for bit in self.lsb_bits() {
            collected.push(bit);
            if scanner.push(bit) {
                return Ok(collected);
            }
        }
        Err(StegoError::NoHiddenDataFound)
    }

    /// The whole LSB plane packed into bytes.
    pub fn read_lsb_bytes(&self) -> Vec<u8> {
        let bits: Vec<bool> = self.lsb_bits().collect();
        from_bits(&bits)
    }
}
