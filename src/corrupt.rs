//! Simulated damage applied to stego images while tuning redundancy

use crate::error::StegoError;
use crate::pixels::{CoverImage, PixelMode};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::{self, FilterType};
use image::ImageFormat;
use rand::rngs::StdRng;
use rand::Rng;

/// A reproducible image corruption
pub trait Corruptor: Send + Sync {
    /// Short label recorded in tuning reports and manifests
    fn name(&self) -> String;

    fn corrupt(&self, image: &CoverImage, rng: &mut StdRng) -> Result<CoverImage, StegoError>;
}

/// Flip the red-channel LSB of randomly chosen pixels (with replacement)
#[derive(Debug, Clone, Copy)]
pub struct LsbFlip {
    pub flips: usize,
}

impl Corruptor for LsbFlip {
    fn name(&self) -> String {
        format!("lsb_flip({})", self.flips)
    }

    fn corrupt(&self, image: &CoverImage, rng: &mut StdRng) -> Result<CoverImage, StegoError> {
        let mut out = image.clone();
        if image.width() == 0 || image.height() == 0 {
            return Ok(out);
        }
        for _ in 0..self.flips {
            let x = rng.gen_range(0..image.width());
            let y = rng.gen_range(0..image.height());
            let mut rgb = out.pixel(x, y);
            rgb[0] ^= 1;
            out.set_pixel(x, y, rgb);
        }
        Ok(out)
    }
}

/// Zero a randomly placed rectangle covering `area_fraction` of the image
#[derive(Debug, Clone, Copy)]
pub struct ZeroRegion {
    pub area_fraction: f64,
}

impl Corruptor for ZeroRegion {
    fn name(&self) -> String {
        format!("zero_region({:.0}%)", self.area_fraction * 100.0)
    }

    fn corrupt(&self, image: &CoverImage, rng: &mut StdRng) -> Result<CoverImage, StegoError> {
        let mut out = image.clone();
        let (width, height) = (image.width(), image.height());
        if width == 0 || height == 0 || self.area_fraction <= 0.0 {
            return Ok(out);
        }

        // sqrt of the area fraction on each axis
        let side = self.area_fraction.min(1.0).sqrt();
        let region_w = ((width as f64 * side).round() as u32).clamp(1, width);
        let region_h = ((height as f64 * side).round() as u32).clamp(1, height);
        let x0 = rng.gen_range(0..=width - region_w);
        let y0 = rng.gen_range(0..=height - region_h);

        for y in y0..y0 + region_h {
            for x in x0..x0 + region_w {
                out.set_pixel(x, y, [0, 0, 0]);
            }
        }
        Ok(out)
    }
}

/// Lossy JPEG encode and decode
#[derive(Debug, Clone, Copy)]
pub struct JpegRecompress {
    pub quality: u8,
}

impl Corruptor for JpegRecompress {
    fn name(&self) -> String {
        format!("jpeg(q{})", self.quality)
    }

    fn corrupt(&self, image: &CoverImage, _rng: &mut StdRng) -> Result<CoverImage, StegoError> {
        let mut encoded = Vec::new();
        JpegEncoder::new_with_quality(&mut encoded, self.quality.clamp(1, 100))
            .encode_image(&image.to_rgb_image())?;
        let decoded = image::load_from_memory_with_format(&encoded, ImageFormat::Jpeg)?;
        CoverImage::from_dynamic(&decoded, PixelMode::Lenient)
    }
}

/// Downscale by `scale` then upscale back to the original size
#[derive(Debug, Clone, Copy)]
pub struct ResizeRoundTrip {
    pub scale: f64,
}

impl Corruptor for ResizeRoundTrip {
    fn name(&self) -> String {
        format!("resize({})", self.scale)
    }

    fn corrupt(&self, image: &CoverImage, _rng: &mut StdRng) -> Result<CoverImage, StegoError> {
        let (width, height) = (image.width(), image.height());
        let small_w = ((width as f64 * self.scale).round() as u32).max(1);
        let small_h = ((height as f64 * self.scale).round() as u32).max(1);

        let small = imageops::resize(&image.to_rgb_image(), small_w, small_h, FilterType::Lanczos3);
        let restored = imageops::resize(&small, width, height, FilterType::Lanczos3);
        Ok(CoverImage::from_rgb_image(&restored))
    }
}

/// Several corruptions applied in sequence
pub struct Chain(pub Vec<Box<dyn Corruptor>>);

impl Corruptor for Chain {
    fn name(&self) -> String {
        self.0
            .iter()
            .map(|step| step.name())
            .collect::<Vec<_>>()
            .join("+")
    }

    fn corrupt(&self, image: &CoverImage, rng: &mut StdRng) -> Result<CoverImage, StegoError> {
        self.0
            .iter()
            .try_fold(image.clone(), |current, step| step.corrupt(&current, rng))
    }
}

/// LSB flips, a 15% zeroed region, JPEG at three qualities and a half-size
/// resize round trip
pub fn default_battery() -> Vec<Box<dyn Corruptor>> {
    vec![
        Box::new(LsbFlip { flips: 300 }),
        Box::new(ZeroRegion {
            area_fraction: 0.15,
        }),
        Box::new(JpegRecompress { quality: 95 }),
        Box::new(JpegRecompress { quality: 85 }),
        Box::new(JpegRecompress { quality: 75 }),
        Box::new(ResizeRoundTrip { scale: 0.5 }),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn gradient(width: u32, height: u32) -> CoverImage {
        let mut image = CoverImage::new(width, height, [0, 0, 0]);
        for y in 0..height {
            for x in 0..width {
                image.set_pixel(x, y, [(x * 4) as u8, (y * 4) as u8, 128]);
            }
        }
        image
    }

    fn lsb_differences(a: &CoverImage, b: &CoverImage) -> usize {
        a.lsb_bits().zip(b.lsb_bits()).filter(|(x, y)| x != y).count()
    }

    #[test]
    fn test_lsb_flip_touches_only_red_lsb() -> Result<(), StegoError> {
        let original = gradient(32, 32);
        let flipped = LsbFlip { flips: 50 }.corrupt(&original, &mut StdRng::seed_from_u64(7))?;

        let changed = lsb_differences(&original, &flipped);
        assert!(changed > 0 && changed <= 50);
        for y in 0..32 {
            for x in 0..32 {
                let (a, b) = (original.pixel(x, y), flipped.pixel(x, y));
                assert_eq!(a[1..], b[1..]);
                assert!(a[0] ^ b[0] <= 1);
            }
        }
        Ok(())
    }

    #[test]
    fn test_zero_region_area() -> Result<(), StegoError> {
        let original = CoverImage::new(100, 100, [255, 255, 255]);
        let damaged = ZeroRegion {
            area_fraction: 0.16,
        }
        .corrupt(&original, &mut StdRng::seed_from_u64(1))?;

        let zeroed = (0..100)
            .flat_map(|y| (0..100).map(move |x| (x, y)))
            .filter(|&(x, y)| damaged.pixel(x, y) == [0, 0, 0])
            .count();
        assert_eq!(zeroed, 40 * 40);
        Ok(())
    }

    #[test]
    fn test_seeded_corruption_is_reproducible() -> Result<(), StegoError> {
        let original = gradient(40, 40);
        let chain = Chain(vec![
            Box::new(LsbFlip { flips: 30 }),
            Box::new(ZeroRegion {
                area_fraction: 0.1,
            }),
        ]);
        let a = chain.corrupt(&original, &mut StdRng::seed_from_u64(99))?;
        let b = chain.corrupt(&original, &mut StdRng::seed_from_u64(99))?;
        assert_eq!(a, b);
        assert_eq!(chain.name(), "lsb_flip(30)+zero_region(10%)");
        Ok(())
    }

    #[test]
    fn test_lossy_variants_keep_dimensions() -> Result<(), StegoError> {
        let original = gradient(48, 32);
        let mut rng = StdRng::seed_from_u64(0);
        for corruptor in default_battery() {
            let damaged = corruptor.corrupt(&original, &mut rng)?;
            assert_eq!((damaged.width(), damaged.height()), (48, 32), "{}", corruptor.name());
        }
        Ok(())
    }
}
