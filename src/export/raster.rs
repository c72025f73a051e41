//! Rasterization backends and raster header parsing.
//!
//! The archive embeds the rasterizer's output unchanged, so only the
//! headers are read here: JPEG frames go in as DCT streams, PNG image data
//! as Flate streams with PNG predictors.

use crate::config::ExportConfig;
use crate::error::ExportError;
use std::path::Path;
use std::process::Command;
use tracing::{debug, info};

/// Options passed to a rasterizer.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterOptions {
    /// CSS viewport width in pixels.
    pub css_width_px: u32,
    /// Device pixel ratio.
    pub pixel_ratio: f64,
}

/// Turns an HTML document into PNG or JPEG bytes.
pub trait Rasterizer: Send + Sync {
    fn rasterize(&self, html: &str, options: &RasterOptions) -> Result<Vec<u8>, ExportError>;
}

/// Rasterizer backed by an external command such as `wkhtmltoimage`.
#[derive(Debug, Clone)]
pub struct CommandRasterizer {
    program: String,
    args: Vec<String>,
}

impl CommandRasterizer {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    fn expand_args(&self, input: &Path, output: &Path, options: &RasterOptions) -> Vec<String> {
        let width = (options.css_width_px as f64 * options.pixel_ratio).round() as u64;
        self.args
            .iter()
            .map(|arg| {
                arg.replace("{input}", &input.display().to_string())
                    .replace("{output}", &output.display().to_string())
                    .replace("{zoom}", &options.pixel_ratio.to_string())
                    .replace("{width}", &width.to_string())
            })
            .collect()
    }
}

impl From<&ExportConfig> for CommandRasterizer {
    fn from(config: &ExportConfig) -> Self {
        Self::new(config.rasterizer_command.clone(), config.rasterizer_args.clone())
    }
}

impl Rasterizer for CommandRasterizer {
    fn rasterize(&self, html: &str, options: &RasterOptions) -> Result<Vec<u8>, ExportError> {
        let dir = tempfile::tempdir()?;
        let input = dir.path().join("surface.html");
        let output = dir.path().join("surface.png");
        std::fs::write(&input, html)?;

        let args = self.expand_args(&input, &output, options);
        info!("Rasterizing report with {}", self.program);
        debug!("Rasterizer arguments: {:?}", args);

        let result = Command::new(&self.program)
            .args(&args)
            .output()
            .map_err(|e| ExportError::Backend(format!("cannot run {}: {}", self.program, e)))?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            return Err(ExportError::Backend(format!(
                "{} exited with {}: {}",
                self.program,
                result.status,
                stderr.trim()
            )));
        }

        let bytes = std::fs::read(&output).map_err(|e| {
            ExportError::Backend(format!("{} produced no image: {}", self.program, e))
        })?;
        debug!("Rasterizer produced {} bytes", bytes.len());
        Ok(bytes)
    }
}

/// Colour model of an embedded raster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorSpace {
    Gray,
    Rgb,
    Cmyk,
}

impl ColorSpace {
    pub fn components(&self) -> u8 {
        match self {
            ColorSpace::Gray => 1,
            ColorSpace::Rgb => 3,
            ColorSpace::Cmyk => 4,
        }
    }

    pub fn pdf_name(&self) -> &'static str {
        match self {
            ColorSpace::Gray => "/DeviceGray",
            ColorSpace::Rgb => "/DeviceRGB",
            ColorSpace::Cmyk => "/DeviceCMYK",
        }
    }
}

/// How the pixel data is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    /// Whole JPEG file, embedded as a DCT stream.
    Jpeg,
    /// Concatenated PNG `IDAT` payload (zlib, PNG row filters).
    PngFlate,
}

/// A raster image ready for embedding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RasterImage {
    pub width: u32,
    pub height: u32,
    pub color_space: ColorSpace,
    pub encoding: Encoding,
    pub data: Vec<u8>,
}

const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

impl RasterImage {
    /// Parse the header of PNG or JPEG bytes.
    pub fn parse(bytes: Vec<u8>) -> Result<Self, ExportError> {
        if bytes.starts_with(&PNG_SIGNATURE) {
            parse_png(&bytes)
        } else if bytes.starts_with(&[0xFF, 0xD8]) {
            parse_jpeg(bytes)
        } else {
            Err(ExportError::UnsupportedImage(
                "neither PNG nor JPEG".to_string(),
            ))
        }
    }
}

fn be_u32(bytes: &[u8], at: usize) -> Option<u32> {
    let b = bytes.get(at..at + 4)?;
    Some(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
}

fn be_u16(bytes: &[u8], at: usize) -> Option<u16> {
    let b = bytes.get(at..at + 2)?;
    Some(u16::from_be_bytes([b[0], b[1]]))
}

fn truncated(kind: &str) -> ExportError {
    ExportError::UnsupportedImage(format!("truncated {}", kind))
}

fn parse_png(bytes: &[u8]) -> Result<RasterImage, ExportError> {
    let mut pos = PNG_SIGNATURE.len();
    let mut header: Option<(u32, u32, ColorSpace)> = None;
    let mut data = Vec::new();

    loop {
        let len = be_u32(bytes, pos).ok_or_else(|| truncated("PNG"))? as usize;
        let kind = bytes.get(pos + 4..pos + 8).ok_or_else(|| truncated("PNG"))?;
        let body = bytes
            .get(pos + 8..pos + 8 + len)
            .ok_or_else(|| truncated("PNG"))?;

        match kind {
            b"IHDR" => {
                if body.len() < 13 {
                    return Err(truncated("PNG header"));
                }
                let width = be_u32(body, 0).ok_or_else(|| truncated("PNG header"))?;
                let height = be_u32(body, 4).ok_or_else(|| truncated("PNG header"))?;
                let (depth, color_type, interlace) = (body[8], body[9], body[12]);

                if depth != 8 {
                    return Err(ExportError::UnsupportedImage(format!(
                        "PNG bit depth {}",
                        depth
                    )));
                }
                if interlace != 0 {
                    return Err(ExportError::UnsupportedImage(
                        "interlaced PNG".to_string(),
                    ));
                }
                let color_space = match color_type {
                    0 => ColorSpace::Gray,
                    2 => ColorSpace::Rgb,
                    other => {
                        return Err(ExportError::UnsupportedImage(format!(
                            "PNG colour type {} (alpha or palette)",
                            other
                        )))
                    }
                };
                header = Some((width, height, color_space));
            }
            b"IDAT" => data.extend_from_slice(body),
            b"IEND" => break,
            _ => {}
        }

        // length + type + body + crc
        pos += 12 + len;
    }

    let (width, height, color_space) =
        header.ok_or_else(|| ExportError::UnsupportedImage("PNG without IHDR".to_string()))?;
    if width == 0 || height == 0 || data.is_empty() {
        return Err(ExportError::UnsupportedImage("empty PNG".to_string()));
    }

    Ok(RasterImage {
        width,
        height,
        color_space,
        encoding: Encoding::PngFlate,
        data,
    })
}

fn parse_jpeg(bytes: Vec<u8>) -> Result<RasterImage, ExportError> {
    let mut pos = 2;

    loop {
        // Skip fill bytes before the marker code.
        while bytes.get(pos) == Some(&0xFF) && bytes.get(pos + 1) == Some(&0xFF) {
            pos += 1;
        }
        if bytes.get(pos) != Some(&0xFF) {
            return Err(truncated("JPEG"));
        }
        let marker = *bytes.get(pos + 1).ok_or_else(|| truncated("JPEG"))?;
        pos += 2;

        match marker {
            0x01 | 0xD0..=0xD7 => continue,
            0xD9 | 0xDA => {
                return Err(ExportError::UnsupportedImage(
                    "JPEG without frame header".to_string(),
                ))
            }
            0xC0..=0xCF if !matches!(marker, 0xC4 | 0xC8 | 0xCC) => {
                let height = be_u16(&bytes, pos + 3).ok_or_else(|| truncated("JPEG"))?;
                let width = be_u16(&bytes, pos + 5).ok_or_else(|| truncated("JPEG"))?;
                let components = *bytes.get(pos + 7).ok_or_else(|| truncated("JPEG"))?;
                let color_space = match components {
                    1 => ColorSpace::Gray,
                    3 => ColorSpace::Rgb,
                    4 => ColorSpace::Cmyk,
                    other => {
                        return Err(ExportError::UnsupportedImage(format!(
                            "JPEG with {} components",
                            other
                        )))
                    }
                };
                if width == 0 || height == 0 {
                    return Err(ExportError::UnsupportedImage("empty JPEG".to_string()));
                }
                return Ok(RasterImage {
                    width: width as u32,
                    height: height as u32,
                    color_space,
                    encoding: Encoding::Jpeg,
                    data: bytes,
                });
            }
            _ => {
                let len = be_u16(&bytes, pos).ok_or_else(|| truncated("JPEG"))? as usize;
                pos += len;
            }
        }
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[test]
    fn test_parse_png_rgb() {
        let image = RasterImage::parse(png(1588, 2400, 2, 0)).unwrap();
        assert_eq!(image.width, 1588);
        assert_eq!(image.height, 2400);
        assert_eq!(image.color_space, ColorSpace::Rgb);
        assert_eq!(image.encoding, Encoding::PngFlate);
        assert_eq!(image.data, vec![0x78, 0x9C, 0x01, 0x02, 0x03]);
    }

    #[test]
    fn test_parse_png_rejects_alpha_and_interlace() {
        assert!(matches!(
            RasterImage::parse(png(10, 10, 6, 0)),
            Err(ExportError::UnsupportedImage(_))
        ));
        assert!(matches!(
            RasterImage::parse(png(10, 10, 2, 1)),
            Err(ExportError::UnsupportedImage(_))
        ));
    }

    #[test]
    fn test_parse_jpeg() {
        let bytes = jpeg(800, 1200);
        let image = RasterImage::parse(bytes.clone()).unwrap();
        assert_eq!(image.width, 800);
        assert_eq!(image.height, 1200);
        assert_eq!(image.color_space, ColorSpace::Rgb);
        assert_eq!(image.encoding, Encoding::Jpeg);
        assert_eq!(image.data, bytes);
    }

    #[test]
    fn test_parse_rejects_unknown_and_truncated() {
        assert!(RasterImage::parse(b"GIF89a".to_vec()).is_err());
        let mut bytes = png(10, 10, 2, 0);
        bytes.truncate(20);
        assert!(RasterImage::parse(bytes).is_err());
    }

    #[test]
    fn test_expand_args() {
        let rasterizer = CommandRasterizer::from(&ExportConfig::default());
        let options = RasterOptions {
            css_width_px: 794,
            pixel_ratio: 2.0,
        };
        let args = rasterizer.expand_args(Path::new("/tmp/in.html"), Path::new("/tmp/out.png"), &options);
        assert_eq!(
            args,
            vec![
                "--quiet",
                "--format",
                "png",
                "--zoom",
                "2",
                "--width",
                "1588",
                "/tmp/in.html",
                "/tmp/out.png"
            ]
        );
    }

    #[test]
    fn test_missing_program_is_backend_error() {
        let rasterizer = CommandRasterizer::new("rfpaudit-no-such-rasterizer", vec![]);
        let options = RasterOptions {
            css_width_px: 794,
            pixel_ratio: 2.0,
        };
        let err = rasterizer.rasterize("<html></html>", &options).unwrap_err();
        assert!(matches!(err, ExportError::Backend(_)));
    }
}
