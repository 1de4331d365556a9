use image::imageops::{self, FilterType};
use image::{DynamicImage, GrayImage, ImageBuffer, Pixel, RgbImage, RgbaImage};

/// Sharpness factor applied to every candidate.
pub const SHARPNESS_FACTOR: f32 = 2.0;

/// Contrast factor applied to every candidate.
pub const CONTRAST_FACTOR: f32 = 1.5;

/// Gaussian sigma of the denoise pass.
pub const DENOISE_SIGMA: f32 = 0.1;

// 3x3 smoothing kernel used as the "blurred" reference for sharpening.
const SMOOTH_KERNEL: [u32; 9] = [1, 1, 1, 1, 5, 1, 1, 1, 1];
const SMOOTH_DIVISOR: u32 = 13;

/// 8-bit working buffer a candidate is built in.
///
/// Gray sources without alpha stay gray, anything with alpha becomes RGBA and
/// the rest becomes RGB. Deeper sources are reduced to 8 bits per channel.
#[derive(Debug, Clone)]
pub enum Raster {
    Gray(GrayImage),
    Rgb(RgbImage),
    Rgba(RgbaImage),
}

impl Raster {
    pub fn from_dynamic(img: DynamicImage) -> Self {
        match img {
            DynamicImage::ImageLuma8(buf) => Raster::Gray(buf),
            DynamicImage::ImageRgb8(buf) => Raster::Rgb(buf),
            DynamicImage::ImageRgba8(buf) => Raster::Rgba(buf),
            other @ DynamicImage::ImageLuma16(_) => Raster::Gray(other.to_luma8()),
            other if other.color().has_alpha() => Raster::Rgba(other.to_rgba8()),
            other => Raster::Rgb(other.to_rgb8()),
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        match self {
            Raster::Gray(buf) => buf.dimensions(),
            Raster::Rgb(buf) => buf.dimensions(),
            Raster::Rgba(buf) => buf.dimensions(),
        }
    }

    /// Resize to exactly `width`x`height` with Lanczos3.
    pub fn resize(&self, width: u32, height: u32) -> Self {
        match self {
            Raster::Gray(buf) => {
                Raster::Gray(imageops::resize(buf, width, height, FilterType::Lanczos3))
            }
            Raster::Rgb(buf) => {
                Raster::Rgb(imageops::resize(buf, width, height, FilterType::Lanczos3))
            }
            Raster::Rgba(buf) => {
                Raster::Rgba(imageops::resize(buf, width, height, FilterType::Lanczos3))
            }
        }
    }

    pub fn sharpen(&self, factor: f32) -> Self {
        match self {
            Raster::Gray(buf) => Raster::Gray(enhance_sharpness(buf, factor)),
            Raster::Rgb(buf) => Raster::Rgb(enhance_sharpness(buf, factor)),
            Raster::Rgba(buf) => Raster::Rgba(enhance_sharpness(buf, factor)),
        }
    }

    pub fn contrast(&self, factor: f32) -> Self {
        match self {
            Raster::Gray(buf) => Raster::Gray(enhance_contrast(buf, factor)),
            Raster::Rgb(buf) => Raster::Rgb(enhance_contrast(buf, factor)),
            Raster::Rgba(buf) => Raster::Rgba(enhance_contrast(buf, factor)),
        }
    }

    pub fn blur(&self, sigma: f32) -> Self {
        match self {
            Raster::Gray(buf) => Raster::Gray(imageops::blur(buf, sigma)),
            Raster::Rgb(buf) => Raster::Rgb(imageops::blur(buf, sigma)),
            Raster::Rgba(buf) => Raster::Rgba(imageops::blur(buf, sigma)),
        }
    }

    /// Resize, then sharpen, raise contrast and denoise, in that order.
    pub fn prepare_candidate(&self, width: u32, height: u32) -> Self {
        self.resize(width, height)
            .sharpen(SHARPNESS_FACTOR)
            .contrast(CONTRAST_FACTOR)
            .blur(DENOISE_SIGMA)
    }
}

// Gray, RGB or RGBA; alpha is always the trailing channel.
fn color_channels<P: Pixel>() -> usize {
    match P::CHANNEL_COUNT {
        1 => 1,
        _ => 3,
    }
}

// `degenerate + factor * (value - degenerate)`, truncated into 0..=255.
fn blend_channel(degenerate: u8, value: u8, factor: f32) -> u8 {
    let d = degenerate as f32;
    let out = d + factor * (value as f32 - d);
    out.clamp(0.0, 255.0) as u8
}

/// Blend the image with its 3x3 smoothed version.
///
/// Factor 1.0 returns the input, larger factors sharpen. The outermost ring of
/// pixels has no full neighbourhood and is left unchanged. Alpha is kept.
pub fn enhance_sharpness<P>(img: &ImageBuffer<P, Vec<u8>>, factor: f32) -> ImageBuffer<P, Vec<u8>>
where
    P: Pixel<Subpixel = u8>,
{
    let (width, height) = img.dimensions();
    let mut out = img.clone();
    if width < 3 || height < 3 {
        return out;
    }

    let colors = color_channels::<P>();
    for y in 1..height - 1 {
        for x in 1..width - 1 {
            let mut sums = [0u32; 4];
            for ky in 0..3 {
                for kx in 0..3 {
                    let weight = SMOOTH_KERNEL[(ky * 3 + kx) as usize];
                    let pixel = img.get_pixel(x + kx - 1, y + ky - 1);
                    for (c, value) in pixel.channels().iter().take(colors).enumerate() {
                        sums[c] += weight * *value as u32;
                    }
                }
            }

            let original = img.get_pixel(x, y);
            let target = out.get_pixel_mut(x, y);
            let channels = target.channels_mut();
            for c in 0..colors {
                let smooth = ((sums[c] + SMOOTH_DIVISOR / 2) / SMOOTH_DIVISOR) as u8;
                channels[c] = blend_channel(smooth, original.channels()[c], factor);
            }
        }
    }

    out
}

/// Rounded mean luminance (ITU-R 601 weights), ignoring alpha.
pub fn mean_luminance<P>(img: &ImageBuffer<P, Vec<u8>>) -> u8
where
    P: Pixel<Subpixel = u8>,
{
    let count = img.width() as u64 * img.height() as u64;
    if count == 0 {
        return 0;
    }

    let colors = color_channels::<P>();
    let total: u64 = img
        .pixels()
        .map(|p| {
            let ch = p.channels();
            if colors >= 3 {
                let l = (ch[0] as u32 * 19595 + ch[1] as u32 * 38470 + ch[2] as u32 * 7471
                    + 0x8000)
                    >> 16;
                l as u64
            } else {
                ch[0] as u64
            }
        })
        .sum();

    (total as f64 / count as f64 + 0.5).floor().min(255.0) as u8
}

/// Blend the image with a flat gray at its mean luminance.
///
/// Factor 1.0 returns the input, 0.0 a flat gray image. Alpha is kept.
pub fn enhance_contrast<P>(img: &ImageBuffer<P, Vec<u8>>, factor: f32) -> ImageBuffer<P, Vec<u8>>
where
    P: Pixel<Subpixel = u8>,
{
    let mean = mean_luminance(img);
    let colors = color_channels::<P>();

    let mut out = img.clone();
    for pixel in out.pixels_mut() {
        for value in pixel.channels_mut().iter_mut().take(colors) {
            *value = blend_channel(mean, *value, factor);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Luma, Rgb, Rgba};

    fn checkerboard(size: u32) -> GrayImage {
        GrayImage::from_fn(size, size, |x, y| {
            if (x + y) % 2 == 0 {
                Luma([64])
            } else {
                Luma([192])
            }
        })
    }

    #[test]
    fn test_from_dynamic_keeps_layout() {
        let gray = Raster::from_dynamic(DynamicImage::new_luma8(4, 3));
        assert!(matches!(gray, Raster::Gray(_)));
        assert_eq!(gray.dimensions(), (4, 3));

        let rgb16 = Raster::from_dynamic(DynamicImage::new_rgb16(4, 3));
        assert!(matches!(rgb16, Raster::Rgb(_)));

        let luma_alpha = Raster::from_dynamic(DynamicImage::new_luma_a8(4, 3));
        assert!(matches!(luma_alpha, Raster::Rgba(_)));
    }

    #[test]
    fn test_resize_exact() {
        let raster = Raster::Rgb(RgbImage::new(100, 50));
        assert_eq!(raster.resize(37, 41).dimensions(), (37, 41));
    }

    #[test]
    fn test_sharpness_identity() {
        let img = checkerboard(8);
        assert_eq!(enhance_sharpness(&img, 1.0), img);
    }

    #[test]
    fn test_sharpness_increases_local_contrast() {
        let img = checkerboard(8);
        let sharp = enhance_sharpness(&img, SHARPNESS_FACTOR);

        // Interior dark pixel gets darker, bright pixel brighter
        assert!(sharp.get_pixel(2, 2)[0] < 64);
        assert!(sharp.get_pixel(3, 2)[0] > 192);

        // Border untouched
        assert_eq!(sharp.get_pixel(0, 0)[0], 64);
        assert_eq!(sharp.get_pixel(7, 0)[0], 192);
    }

    #[test]
    fn test_sharpness_small_image_unchanged() {
        let img = checkerboard(2);
        assert_eq!(enhance_sharpness(&img, 2.0), img);
    }

    #[test]
    fn test_mean_luminance() {
        assert_eq!(mean_luminance(&checkerboard(4)), 128);

        let white = RgbImage::from_pixel(3, 3, Rgb([255, 255, 255]));
        assert_eq!(mean_luminance(&white), 255);

        let red = RgbImage::from_pixel(3, 3, Rgb([255, 0, 0]));
        assert_eq!(mean_luminance(&red), 76);
    }

    #[test]
    fn test_contrast_stretches_around_mean() {
        let img = checkerboard(4);
        let out = enhance_contrast(&img, CONTRAST_FACTOR);
        assert_eq!(out.get_pixel(0, 0)[0], 32);
        assert_eq!(out.get_pixel(1, 0)[0], 224);
    }

    #[test]
    fn test_contrast_clamps() {
        let img = GrayImage::from_fn(2, 1, |x, _| if x == 0 { Luma([0]) } else { Luma([255]) });
        let out = enhance_contrast(&img, 3.0);
        assert_eq!(out.get_pixel(0, 0)[0], 0);
        assert_eq!(out.get_pixel(1, 0)[0], 255);
    }

    #[test]
    fn test_enhancements_keep_alpha() {
        let img = RgbaImage::from_fn(5, 5, |x, y| Rgba([(x * 40) as u8, (y * 40) as u8, 90, 17]));
        let sharp = enhance_sharpness(&img, 2.0);
        let contrast = enhance_contrast(&img, 1.5);
        assert!(sharp.pixels().all(|p| p[3] == 17));
        assert!(contrast.pixels().all(|p| p[3] == 17));
    }

    #[test]
    fn test_prepare_candidate_dimensions() {
        let raster = Raster::Gray(checkerboard(40));
        let candidate = raster.prepare_candidate(36, 20);
        assert_eq!(candidate.dimensions(), (36, 20));
        assert!(matches!(candidate, Raster::Gray(_)));
    }
}
