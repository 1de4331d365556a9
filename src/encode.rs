use anyhow::{Context, Result};
use std::fs::File;
use std::io::{BufWriter, Seek, Write};
use std::path::Path;
use tiff::encoder::colortype::{self, ColorType};
use tiff::encoder::compression::{Compression, Deflate, Lzw, Packbits, Uncompressed};
use tiff::encoder::{Rational, TiffEncoder};
use tiff::tags::ResolutionUnit;

use crate::enhance::Raster;

/// Resolution written into every output unless disabled.
pub const DEFAULT_DPI: u32 = 300;

/// Compression scheme for the written TIFF.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TiffCodec {
    #[default]
    Lzw,
    Deflate,
    PackBits,
    Uncompressed,
}

/// Write `raster` to `path` as a single-image TIFF, replacing any existing file.
///
/// Only the tags the encoder needs are written. X/Y resolution is `dpi` per
/// inch when set, otherwise 1/1 with no unit. Returns the number of bytes on disk.
pub fn save_tiff(
    raster: &Raster,
    path: &Path,
    codec: TiffCodec,
    dpi: Option<u32>,
) -> Result<u64> {
    let f = File::create(path).with_context(|| format!("Create output: {}", path.display()))?;
    let mut writer = BufWriter::new(f);
    encode_tiff(raster, &mut writer, codec, dpi)
        .with_context(|| format!("Encode TIFF: {}", path.display()))?;
    writer
        .flush()
        .with_context(|| format!("Flush output: {}", path.display()))?;
    drop(writer);

    let size = std::fs::metadata(path)
        .with_context(|| format!("Stat output: {}", path.display()))?
        .len();
    Ok(size)
}

/// Encode `raster` as TIFF into any seekable writer.
pub fn encode_tiff<W: Write + Seek>(
    raster: &Raster,
    writer: &mut W,
    codec: TiffCodec,
    dpi: Option<u32>,
) -> Result<()> {
    let mut tiff = TiffEncoder::new(writer)?;
    match codec {
        TiffCodec::Lzw => write_raster(&mut tiff, raster, dpi, Lzw::default()),
        TiffCodec::Deflate => write_raster(&mut tiff, raster, dpi, Deflate::default()),
        TiffCodec::PackBits => write_raster(&mut tiff, raster, dpi, Packbits::default()),
        TiffCodec::Uncompressed => write_raster(&mut tiff, raster, dpi, Uncompressed::default()),
    }
}

fn write_raster<W, D>(
    tiff: &mut TiffEncoder<W>,
    raster: &Raster,
    dpi: Option<u32>,
    codec: D,
) -> Result<()>
where
    W: Write + Seek,
    D: Compression,
{
    match raster {
        Raster::Gray(buf) => write_image::<_, colortype::Gray8, _>(
            tiff,
            buf.width(),
            buf.height(),
            buf.as_raw(),
            dpi,
            codec,
        ),
        Raster::Rgb(buf) => write_image::<_, colortype::RGB8, _>(
            tiff,
            buf.width(),
            buf.height(),
            buf.as_raw(),
            dpi,
            codec,
        ),
        Raster::Rgba(buf) => write_image::<_, colortype::RGBA8, _>(
            tiff,
            buf.width(),
            buf.height(),
            buf.as_raw(),
            dpi,
            codec,
        ),
    }
}

fn write_image<W, C, D>(
    tiff: &mut TiffEncoder<W>,
    width: u32,
    height: u32,
    data: &[u8],
    dpi: Option<u32>,
    codec: D,
) -> Result<()>
where
    W: Write + Seek,
    C: ColorType<Inner = u8>,
    D: Compression,
{
    let mut img = tiff.new_image_with_compression::<C, D>(width, height, codec)?;

    // Baseline TIFF requires the resolution tags; without a DPI they carry no unit.
    let (unit, per_unit) = match dpi {
        Some(dpi) => (ResolutionUnit::Inch, dpi),
        None => (ResolutionUnit::None, 1),
    };
    img.resolution_unit(unit);
    img.x_resolution(Rational { n: per_unit, d: 1 });
    img.y_resolution(Rational { n: per_unit, d: 1 });

    img.write_data(data)?;
    Ok(())
}
