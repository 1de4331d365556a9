//! Fixture helpers shared by the integration tests.

#![allow(dead_code)]

use image::{DynamicImage, GrayImage, ImageFormat, Luma, Rgb, RgbImage, Rgba, RgbaImage};
use std::path::{Path, PathBuf};

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Seeded linear congruential byte generator.
pub struct Noise(u64);

impl Noise {
    pub fn new(seed: u64) -> Self {
        Self(seed)
    }

    pub fn next_byte(&mut self) -> u8 {
        self.0 = self
            .0
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        (self.0 >> 33) as u8
    }
}

/// Gray noise; barely compressible, so size tracks pixel count.
pub fn noisy_gray(width: u32, height: u32, seed: u64) -> GrayImage {
    let mut noise = Noise::new(seed);
    GrayImage::from_fn(width, height, |_, _| Luma([noise.next_byte()]))
}

pub fn smooth_rgb(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) / 2 % 256) as u8])
    })
}

pub fn translucent_rgba(width: u32, height: u32) -> RgbaImage {
    RgbaImage::from_fn(width, height, |x, y| {
        Rgba([(x * 3 % 256) as u8, (y * 5 % 256) as u8, 120, 200])
    })
}

/// Save a buffer as an (uncompressed) TIFF fixture and return its path.
pub fn write_fixture(dir: &Path, name: &str, img: impl Into<DynamicImage>) -> PathBuf {
    let path = dir.join(name);
    let img: DynamicImage = img.into();
    img.save_with_format(&path, ImageFormat::Tiff)
        .expect("write fixture");
    path
}
