use anyhow::{Context, Result};
use image::ImageReader;
use log::{debug, info, warn};
use std::path::{Path, PathBuf};

pub mod dimensions;
pub mod encode;
pub mod enhance;
pub mod error;

pub use dimensions::{
    candidate_dimensions, floor_dimensions, scale_factors, INITIAL_SCALE_FACTOR, SCALE_DECAY,
};
pub use encode::{encode_tiff, save_tiff, TiffCodec, DEFAULT_DPI};
pub use enhance::{Raster, CONTRAST_FACTOR, DENOISE_SIGMA, SHARPNESS_FACTOR};
pub use error::CompressError;

/// Prefix prepended to the input's file name to form the output name.
pub const OUTPUT_PREFIX: &str = "compressed_";

/// Smallest fraction of the original width/height a candidate may shrink to.
pub const DEFAULT_MIN_SIZE_PERCENTAGE: f64 = 0.3;

/// Upper bound on encode attempts before giving up.
pub const DEFAULT_MAX_ITERATIONS: u32 = 256;

/// Knobs for [`compress_with_options`].
#[derive(Debug, Clone, PartialEq)]
pub struct CompressOptions {
    pub min_size_percentage: f64,
    /// Resolution written into the output; `None` writes the neutral 1/1 with no unit.
    pub dpi: Option<u32>,
    pub codec: TiffCodec,
    pub max_iterations: u32,
    /// Directory the output lands in; `None` means the working directory.
    pub output_dir: Option<PathBuf>,
}

impl Default for CompressOptions {
    fn default() -> Self {
        Self {
            min_size_percentage: DEFAULT_MIN_SIZE_PERCENTAGE,
            dpi: Some(DEFAULT_DPI),
            codec: TiffCodec::default(),
            max_iterations: DEFAULT_MAX_ITERATIONS,
            output_dir: None,
        }
    }
}

impl CompressOptions {
    pub fn with_min_size_percentage(mut self, min_size_percentage: f64) -> Self {
        self.min_size_percentage = min_size_percentage;
        self
    }

    pub fn with_dpi(mut self, dpi: Option<u32>) -> Self {
        self.dpi = dpi;
        self
    }

    pub fn with_codec(mut self, codec: TiffCodec) -> Self {
        self.codec = codec;
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_output_dir(mut self, output_dir: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(output_dir.into());
        self
    }

    fn validate(&self) -> Result<(), CompressError> {
        if !(0.0..=1.0).contains(&self.min_size_percentage) {
            return Err(CompressError::InvalidOptions(format!(
                "min_size_percentage must be within [0, 1], got {}",
                self.min_size_percentage
            )));
        }
        if self.max_iterations == 0 {
            return Err(CompressError::InvalidOptions(
                "max_iterations must be at least 1".to_string(),
            ));
        }
        if self.dpi == Some(0) {
            return Err(CompressError::InvalidOptions(
                "dpi must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// What a successful run produced.
#[derive(Debug, Clone, PartialEq)]
pub struct CompressionOutcome {
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
    pub size_bytes: u64,
    pub iterations: u32,
    /// Scale factor of the accepted candidate.
    pub scale_factor: f64,
}

impl CompressionOutcome {
    pub fn size_kb(&self) -> f64 {
        bytes_to_kb(self.size_bytes)
    }
}

fn bytes_to_kb(bytes: u64) -> f64 {
    bytes as f64 / 1024.0
}

/// `compressed_<file name>` inside `output_dir`, or relative to the working directory.
pub fn output_path_for(input: &Path, output_dir: Option<&Path>) -> Result<PathBuf> {
    let name = input.file_name().ok_or_else(|| {
        CompressError::InvalidOptions(format!("input has no file name: {}", input.display()))
    })?;

    let mut file_name = std::ffi::OsString::from(OUTPUT_PREFIX);
    file_name.push(name);

    Ok(match output_dir {
        Some(dir) => dir.join(file_name),
        None => PathBuf::from(file_name),
    })
}

/// Width and height from the image header, without decoding pixels.
pub fn read_dimensions(path: &Path) -> Result<(u32, u32)> {
    ImageReader::open(path)
        .with_context(|| format!("Open image: {}", path.display()))?
        .with_guessed_format()
        .with_context(|| format!("Detect format: {}", path.display()))?
        .into_dimensions()
        .with_context(|| format!("Failed to read dimensions: {}", path.display()))
}

/// Decode the whole image into a working raster.
pub fn load_source(path: &Path) -> Result<Raster> {
    let img = ImageReader::open(path)
        .with_context(|| format!("Open image: {}", path.display()))?
        .with_guessed_format()
        .with_context(|| format!("Detect format: {}", path.display()))?
        .decode()
        .with_context(|| format!("Failed to decode image: {}", path.display()))?;
    Ok(Raster::from_dynamic(img))
}

/// Shrink and recompress `input_file` until the written TIFF is at most
/// `target_size_kb` KB, never going below `min_size_percentage` of the
/// original width and height.
///
/// The output is `compressed_<file name>` in the working directory.
pub fn compress_tiff_file(
    input_file: impl AsRef<Path>,
    target_size_kb: f64,
    min_size_percentage: f64,
) -> Result<PathBuf> {
    let options = CompressOptions::default().with_min_size_percentage(min_size_percentage);
    compress_with_options(input_file, target_size_kb, &options).map(|outcome| outcome.path)
}

/// Like [`compress_tiff_file`], with every knob exposed.
///
/// Every attempt re-decodes the source and resizes it from its original
/// dimensions, so filters are never compounded. The output file is rewritten
/// on each attempt, including failed ones. Fails with
/// [`CompressError::TargetUnreachable`] once a candidate at the floor
/// dimensions is still too large, or after `max_iterations` attempts.
pub fn compress_with_options(
    input_file: impl AsRef<Path>,
    target_size_kb: f64,
    options: &CompressOptions,
) -> Result<CompressionOutcome> {
    let input = input_file.as_ref();

    if !target_size_kb.is_finite() || target_size_kb <= 0.0 {
        return Err(CompressError::InvalidOptions(format!(
            "target_size_kb must be positive, got {}",
            target_size_kb
        ))
        .into());
    }
    options.validate()?;

    let output = output_path_for(input, options.output_dir.as_deref())?;
    let (original_width, original_height) = read_dimensions(input)?;
    let floor = floor_dimensions(
        original_width,
        original_height,
        options.min_size_percentage,
    );

    info!(
        "Compressing {} ({}x{}) to <= {:.2} KB, floor {}x{}",
        input.display(),
        original_width,
        original_height,
        target_size_kb,
        floor.0,
        floor.1
    );

    let mut scale_factor = INITIAL_SCALE_FACTOR;
    let mut iterations = 0u32;
    loop {
        iterations += 1;

        let source = load_source(input)?;
        let (width, height) = source.dimensions();
        let (new_width, new_height) = candidate_dimensions(width, height, scale_factor, floor);

        let candidate = source.prepare_candidate(new_width, new_height);
        drop(source);

        let size_bytes = save_tiff(&candidate, &output, options.codec, options.dpi)?;
        let size_kb = bytes_to_kb(size_bytes);

        debug!(
            "Attempt {}: scale {:.5}, {}x{} -> {:.2} KB",
            iterations, scale_factor, new_width, new_height, size_kb
        );

        if size_kb <= target_size_kb {
            info!(
                "Wrote {} at {}x{}, {:.2} KB after {} attempt(s)",
                output.display(),
                new_width,
                new_height,
                size_kb,
                iterations
            );
            return Ok(CompressionOutcome {
                path: output,
                width: new_width,
                height: new_height,
                size_bytes,
                iterations,
                scale_factor,
            });
        }

        // Both sides clamped: shrinking the scale further cannot change the output.
        let at_floor = (new_width, new_height) == floor;
        if at_floor || iterations >= options.max_iterations {
            warn!(
                "Giving up on {}: {}x{} is still {:.2} KB (target {:.2} KB)",
                input.display(),
                new_width,
                new_height,
                size_kb,
                target_size_kb
            );
            return Err(CompressError::TargetUnreachable {
                target_kb: target_size_kb,
                achieved_kb: size_kb,
                width: new_width,
                height: new_height,
                iterations,
            }
            .into());
        }

        scale_factor *= SCALE_DECAY;
    }
}
