use bytes::Bytes;
use image::{
    codecs::{
        jpeg::{JpegEncoder, PixelDensity},
        png::PngEncoder,
        webp::WebPEncoder,
    },
    imageops::FilterType,
    ColorType, DynamicImage, GenericImageView, ImageEncoder,
};
use std::time::Duration;

use crate::{
    errors::{AppError, Result},
    models::{OutputFormat, TransformParams},
    utils::timeout::with_deadline,
};

const INCHES_PER_METRE: f64 = 1.0 / 0.0254;

/// End of the PNG signature plus the IHDR chunk, where `pHYs` is spliced in.
const PNG_IHDR_END: usize = 8 + 4 + 4 + 13 + 4;

#[derive(Debug, Clone)]
pub struct TransformedImage {
    pub data: Bytes,
    pub format: OutputFormat,
    pub width: u32,
    pub height: u32,
}

impl TransformedImage {
    pub fn size(&self) -> i64 {
        self.data.len() as i64
    }
}

pub struct ImageProcessor;

impl ImageProcessor {
    /// Decodes, resizes with a contain fit and re-encodes `data`.
    pub fn transform(data: &[u8], params: &TransformParams) -> Result<TransformedImage> {
        let img = image::load_from_memory(data)
            .map_err(|e| AppError::ImageDecode(format!("Failed to decode image: {}", e)))?;

        let (src_w, src_h) = img.dimensions();
        let (width, height) = calculate_contain_dimensions(
            src_w,
            src_h,
            params.width,
            params.height,
            params.enlarge,
            params.max_dimension,
        );

        let img = if (width, height) == (src_w, src_h) {
            img
        } else {
            img.resize_exact(width, height, FilterType::Lanczos3)
        };

        let data = encode_image(&img, params)?;

        tracing::debug!(
            src_w,
            src_h,
            width,
            height,
            format = ?params.format,
            bytes = data.len(),
            "transformed image"
        );

        Ok(TransformedImage {
            data: Bytes::from(data),
            format: params.format,
            width,
            height,
        })
    }

    /// Runs [`ImageProcessor::transform`] on the blocking pool under `limit`.
    ///
    /// A blocking task cannot be cancelled, so a timeout is final rather than
    /// starting a second transform next to the abandoned one.
    pub async fn transform_with_timeout(
        data: Bytes,
        params: TransformParams,
        limit: Duration,
    ) -> Result<TransformedImage> {
        let task = tokio::task::spawn_blocking(move || Self::transform(&data, &params));

        with_deadline("image.transform", limit, async move {
            task.await
                .map_err(|e| AppError::FileProcessing(format!("Transform task failed: {}", e)))?
        })
        .await
    }
}

/// Largest size that fits inside the requested box while keeping the aspect
/// ratio. Never enlarges unless `enlarge` is set, and neither side ever
/// exceeds `max_dimension`.
pub fn calculate_contain_dimensions(
    src_w: u32,
    src_h: u32,
    target_w: Option<u32>,
    target_h: Option<u32>,
    enlarge: bool,
    max_dimension: u32,
) -> (u32, u32) {
    let scale_w = target_w.map(|w| w as f64 / src_w as f64);
    let scale_h = target_h.map(|h| h as f64 / src_h as f64);

    let scale = match (scale_w, scale_h) {
        (Some(w), Some(h)) => w.min(h),
        (Some(s), None) | (None, Some(s)) => s,
        (None, None) => 1.0,
    };
    let scale = if enlarge { scale } else { scale.min(1.0) };

    // the unconstrained side grows with the aspect ratio
    let max = max_dimension.max(1) as f64;
    let scale = scale.min(max / src_w as f64).min(max / src_h as f64);

    apply_scale(src_w, src_h, scale)
}

fn apply_scale(src_w: u32, src_h: u32, scale: f64) -> (u32, u32) {
    let new_w = (src_w as f64 * scale).round() as u32;
    let new_h = (src_h as f64 * scale).round() as u32;

    (new_w.max(1), new_h.max(1))
}

fn encode_image(img: &DynamicImage, params: &TransformParams) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    let (width, height) = img.dimensions();

    match params.format {
        OutputFormat::Jpeg => {
            let rgb = img.to_rgb8();
            let mut encoder = JpegEncoder::new_with_quality(&mut buf, params.quality);
            encoder.set_pixel_density(PixelDensity::dpi(params.dpi));
            encoder
                .encode(rgb.as_raw(), width, height, ColorType::Rgb8)
                .map_err(|e| AppError::FileProcessing(format!("JPEG encode failed: {}", e)))?;
        }
        OutputFormat::Png => {
            let rgba = img.to_rgba8();
            PngEncoder::new(&mut buf)
                .write_image(rgba.as_raw(), width, height, ColorType::Rgba8)
                .map_err(|e| AppError::FileProcessing(format!("PNG encode failed: {}", e)))?;
            buf = insert_png_density(buf, params.dpi)?;
        }
        OutputFormat::WebP => {
            // lossless only, quality does not apply
            let rgba = img.to_rgba8();
            WebPEncoder::new_lossless(&mut buf)
                .write_image(rgba.as_raw(), width, height, ColorType::Rgba8)
                .map_err(|e| AppError::FileProcessing(format!("WebP encode failed: {}", e)))?;
        }
    }

    Ok(buf)
}

/// Splices a `pHYs` chunk (pixels per metre) right after IHDR.
fn insert_png_density(png: Vec<u8>, dpi: u16) -> Result<Vec<u8>> {
    if png.len() < PNG_IHDR_END || &png[12..16] != b"IHDR" {
        return Err(AppError::FileProcessing("Encoded PNG has no IHDR chunk".to_string()));
    }

    let ppm = (dpi as f64 * INCHES_PER_METRE).round() as u32;

    let mut chunk_body = Vec::with_capacity(4 + 9);
    chunk_body.extend_from_slice(b"pHYs");
    chunk_body.extend_from_slice(&ppm.to_be_bytes());
    chunk_body.extend_from_slice(&ppm.to_be_bytes());
    chunk_body.push(1); // unit: metre

    let mut out = Vec::with_capacity(png.len() + 21);
    out.extend_from_slice(&png[..PNG_IHDR_END]);
    out.extend_from_slice(&9u32.to_be_bytes());
    out.extend_from_slice(&chunk_body);
    out.extend_from_slice(&crc32fast::hash(&chunk_body).to_be_bytes());
    out.extend_from_slice(&png[PNG_IHDR_END..]);

    Ok(out)
}
