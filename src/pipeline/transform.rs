//! Image transforms
//!
//! Decoding, resizing, normalization, and training-time augmentation.
//! All transforms operate on flattened CHW float buffers so the same
//! code path serves files and in-memory pixel sources.

use image::imageops::FilterType;
use image::{DynamicImage, ImageReader, RgbImage};
use rand::Rng;
use rand_chacha::ChaCha8Rng;

use crate::config::{Normalization, IMAGE_SIZE};
use crate::dataset::provider::ImageSource;
use crate::utils::error::{BeanLeafError, Result};

/// ImageNet channel statistics
const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Decodes and resizes examples into unit-range CHW buffers.
///
/// When `normalization` is `None` the buffer stays in [0, 1] and the
/// model graph is expected to carry its own normalization block.
#[derive(Debug, Clone, Copy)]
pub struct Preprocessor {
    pub normalization: Option<Normalization>,
}

impl Preprocessor {
    pub fn new(normalization: Normalization) -> Self {
        Self {
            normalization: Some(normalization),
        }
    }

    /// Resize and scale only; normalization happens inside the model
    pub fn scale_only() -> Self {
        Self {
            normalization: None,
        }
    }

    /// Decode an image source into a dynamic image
    pub fn decode(source: &ImageSource) -> Result<DynamicImage> {
        match source {
            ImageSource::File(path) => {
                let img = ImageReader::open(path)
                    .map_err(|e| BeanLeafError::Image(path.clone(), e.to_string()))?
                    .decode()
                    .map_err(|e| BeanLeafError::Image(path.clone(), e.to_string()))?;
                Ok(img)
            }
            ImageSource::Pixels {
                width,
                height,
                data,
            } => {
                let buffer =
                    RgbImage::from_raw(*width, *height, data.clone()).ok_or_else(|| {
                        BeanLeafError::Image(
                            std::path::PathBuf::from("<pixels>"),
                            "pixel buffer does not match its dimensions".to_string(),
                        )
                    })?;
                Ok(DynamicImage::ImageRgb8(buffer))
            }
        }
    }

    /// Decode, crop-resize to the model input size, and scale to [0, 1] CHW
    pub fn decode_unit(source: &ImageSource) -> Result<Vec<f32>> {
        let img = Self::decode(source)?
            .resize_to_fill(IMAGE_SIZE as u32, IMAGE_SIZE as u32, FilterType::Triangle)
            .to_rgb8();

        let (width, height) = (IMAGE_SIZE, IMAGE_SIZE);
        let mut chw = vec![0.0f32; 3 * height * width];
        for y in 0..height {
            for x in 0..width {
                let pixel = img.get_pixel(x as u32, y as u32);
                for c in 0..3 {
                    chw[c * height * width + y * width + x] = pixel[c] as f32 / 255.0;
                }
            }
        }
        Ok(chw)
    }

    /// Apply the configured normalization in place, if any
    pub fn finish(&self, chw: &mut [f32]) {
        let Some(normalization) = self.normalization else {
            return;
        };
        normalize_in_place(chw, normalization);
    }
}

/// Normalize a unit-range CHW buffer for the given scheme
pub fn normalize_in_place(chw: &mut [f32], normalization: Normalization) {
    let plane = IMAGE_SIZE * IMAGE_SIZE;
    match normalization {
        Normalization::Scaled => {
            for v in chw.iter_mut() {
                *v = *v * 2.0 - 1.0;
            }
        }
        Normalization::ImageNet => {
            for c in 0..3 {
                let (mean, std) = (IMAGENET_MEAN[c], IMAGENET_STD[c]);
                for v in chw[c * plane..(c + 1) * plane].iter_mut() {
                    *v = (*v - mean) / std;
                }
            }
        }
    }
}

/// Training-time augmentation over unit-range CHW buffers
#[derive(Debug, Clone, Copy)]
pub struct Augmenter {
    /// Maximum rotation in either direction, in turns
    pub max_rotation_turns: f32,
    /// Contrast factor varies in [1 - delta, 1 + delta]
    pub contrast_delta: f32,
}

impl Default for Augmenter {
    fn default() -> Self {
        Self {
            max_rotation_turns: 0.05,
            contrast_delta: 0.2,
        }
    }
}

impl Augmenter {
    /// Apply flip, rotation, and contrast jitter in place
    pub fn apply(&self, chw: &mut Vec<f32>, rng: &mut ChaCha8Rng) {
        if rng.gen_bool(0.5) {
            flip_horizontal(chw);
        }

        let turns = rng.gen_range(-self.max_rotation_turns..=self.max_rotation_turns);
        if turns.abs() > f32::EPSILON {
            rotate(chw, turns * std::f32::consts::TAU);
        }

        let factor = rng.gen_range(1.0 - self.contrast_delta..=1.0 + self.contrast_delta);
        adjust_contrast(chw, factor);
    }
}

fn flip_horizontal(chw: &mut [f32]) {
    let (w, h) = (IMAGE_SIZE, IMAGE_SIZE);
    for c in 0..3 {
        let plane = &mut chw[c * h * w..(c + 1) * h * w];
        for y in 0..h {
            plane[y * w..(y + 1) * w].reverse();
        }
    }
}

/// Nearest-neighbor rotation around the image center, edge-clamped
fn rotate(chw: &mut Vec<f32>, radians: f32) {
    let (w, h) = (IMAGE_SIZE, IMAGE_SIZE);
    let (sin, cos) = radians.sin_cos();
    let (cx, cy) = ((w as f32 - 1.0) / 2.0, (h as f32 - 1.0) / 2.0);

    let src = chw.clone();
    for c in 0..3 {
        let plane_src = &src[c * h * w..(c + 1) * h * w];
        let plane_dst = &mut chw[c * h * w..(c + 1) * h * w];
        for y in 0..h {
            for x in 0..w {
                // Inverse mapping: where did this output pixel come from
                let dx = x as f32 - cx;
                let dy = y as f32 - cy;
                let sx = (cos * dx + sin * dy + cx).round();
                let sy = (-sin * dx + cos * dy + cy).round();
                let sx = sx.clamp(0.0, (w - 1) as f32) as usize;
                let sy = sy.clamp(0.0, (h - 1) as f32) as usize;
                plane_dst[y * w + x] = plane_src[sy * w + sx];
            }
        }
    }
}

/// Scale deviation from the per-channel mean, clamped back to [0, 1]
fn adjust_contrast(chw: &mut [f32], factor: f32) {
    let plane = IMAGE_SIZE * IMAGE_SIZE;
    for c in 0..3 {
        let channel = &mut chw[c * plane..(c + 1) * plane];
        let mean: f32 = channel.iter().sum::<f32>() / plane as f32;
        for v in channel.iter_mut() {
            *v = (mean + (*v - mean) * factor).clamp(0.0, 1.0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn gradient_image() -> Vec<f32> {
        let mut chw = vec![0.0f32; 3 * IMAGE_SIZE * IMAGE_SIZE];
        for c in 0..3 {
            for y in 0..IMAGE_SIZE {
                for x in 0..IMAGE_SIZE {
                    chw[c * IMAGE_SIZE * IMAGE_SIZE + y * IMAGE_SIZE + x] =
                        x as f32 / IMAGE_SIZE as f32;
                }
            }
        }
        chw
    }

    #[test]
    fn test_decode_unit_from_pixels() {
        let source = ImageSource::Pixels {
            width: 8,
            height: 8,
            data: vec![128u8; 8 * 8 * 3],
        };
        let chw = Preprocessor::decode_unit(&source).unwrap();
        assert_eq!(chw.len(), 3 * IMAGE_SIZE * IMAGE_SIZE);
        assert!(chw.iter().all(|&v| (0.0..=1.0).contains(&v)));
    }

    #[test]
    fn test_scaled_normalization_range() {
        let mut chw = vec![0.5f32; 3 * IMAGE_SIZE * IMAGE_SIZE];
        chw[0] = 0.0;
        chw[1] = 1.0;
        normalize_in_place(&mut chw, Normalization::Scaled);
        assert_eq!(chw[0], -1.0);
        assert_eq!(chw[1], 1.0);
        assert!(chw[2].abs() < 1e-6);
    }

    #[test]
    fn test_imagenet_normalization_centers_channels() {
        let mut chw = vec![0.0f32; 3 * IMAGE_SIZE * IMAGE_SIZE];
        let plane = IMAGE_SIZE * IMAGE_SIZE;
        for c in 0..3 {
            for v in chw[c * plane..(c + 1) * plane].iter_mut() {
                *v = IMAGENET_MEAN[c];
            }
        }
        normalize_in_place(&mut chw, Normalization::ImageNet);
        assert!(chw.iter().all(|&v| v.abs() < 1e-5));
    }

    #[test]
    fn test_flip_is_involutive() {
        let original = gradient_image();
        let mut flipped = original.clone();
        flip_horizontal(&mut flipped);
        assert_ne!(original, flipped);
        flip_horizontal(&mut flipped);
        assert_eq!(original, flipped);
    }

    #[test]
    fn test_augmentation_is_seeded() {
        let original = gradient_image();
        let augmenter = Augmenter::default();

        let mut a = original.clone();
        let mut rng_a = ChaCha8Rng::seed_from_u64(11);
        augmenter.apply(&mut a, &mut rng_a);

        let mut b = original.clone();
        let mut rng_b = ChaCha8Rng::seed_from_u64(11);
        augmenter.apply(&mut b, &mut rng_b);

        assert_eq!(a, b);
        assert!(a.iter().all(|&v| (0.0..=1.0).contains(&v)));
    }

    #[test]
    fn test_contrast_preserves_constant_image() {
        let mut chw = vec![0.5f32; 3 * IMAGE_SIZE * IMAGE_SIZE];
        adjust_contrast(&mut chw, 1.2);
        assert!(chw.iter().all(|&v| (v - 0.5).abs() < 1e-5));
    }
}
