use std::collections::HashMap;

use crate::errors::{AppError, Result};

pub const DEFAULT_WIDTH: u32 = 800;
pub const DEFAULT_QUALITY: u8 = 80;
pub const DEFAULT_DPI: u16 = 72;
pub const MAX_DPI: u16 = 2400;
pub const DEFAULT_MAX_DIMENSION: u32 = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Jpeg,
    Png,
    WebP,
}

impl OutputFormat {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "jpeg" | "jpg" => Some(Self::Jpeg),
            "png" => Some(Self::Png),
            "webp" => Some(Self::WebP),
            _ => None,
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::WebP => "image/webp",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Jpeg => "jpg",
            Self::Png => "png",
            Self::WebP => "webp",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformParams {
    pub format: OutputFormat,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub quality: u8,
    pub dpi: u16,
    /// Allow the output to be larger than the source.
    pub enlarge: bool,
    /// Neither output side may exceed this, whatever the aspect ratio.
    pub max_dimension: u32,
}

impl Default for TransformParams {
    fn default() -> Self {
        Self {
            format: OutputFormat::Jpeg,
            width: Some(DEFAULT_WIDTH),
            height: None,
            quality: DEFAULT_QUALITY,
            dpi: DEFAULT_DPI,
            enlarge: false,
            max_dimension: DEFAULT_MAX_DIMENSION,
        }
    }
}

impl TransformParams {
    /// Builds parameters from the string-typed multipart fields of an upload.
    ///
    /// Missing, empty and `"null"` values fall back to the defaults. Anything
    /// else must parse and fall inside its range.
    pub fn from_fields(fields: &HashMap<String, String>, max_dimension: u32) -> Result<Self> {
        let defaults = Self::default();

        let format = match field(fields, "format") {
            Some(raw) => OutputFormat::parse(raw).ok_or_else(|| {
                AppError::Validation(format!(
                    "Unsupported format '{}': expected jpeg, jpg, png or webp",
                    raw
                ))
            })?,
            None => defaults.format,
        };

        let width = match field(fields, "width") {
            Some(raw) => Some(parse_in_range::<u32>("width", raw, 1, max_dimension)?),
            None => defaults.width,
        };
        let height = match field(fields, "height") {
            Some(raw) => Some(parse_in_range::<u32>("height", raw, 1, max_dimension)?),
            None => defaults.height,
        };
        let quality = match field(fields, "quality") {
            Some(raw) => parse_in_range::<u8>("quality", raw, 1, 100)?,
            None => defaults.quality,
        };
        let dpi = match field(fields, "dpi") {
            Some(raw) => parse_in_range::<u16>("dpi", raw, 1, MAX_DPI)?,
            None => defaults.dpi,
        };
        let enlarge = match field(fields, "enlarge") {
            Some(raw) => match raw.to_lowercase().as_str() {
                "true" | "1" | "yes" => true,
                "false" | "0" | "no" => false,
                _ => {
                    return Err(AppError::Validation(format!(
                        "enlarge must be a boolean, got '{}'",
                        raw
                    )))
                }
            },
            None => defaults.enlarge,
        };

        Ok(Self {
            format,
            width,
            height,
            quality,
            dpi,
            enlarge,
            max_dimension,
        })
    }
}

fn field<'a>(fields: &'a HashMap<String, String>, name: &str) -> Option<&'a str> {
    fields
        .get(name)
        .map(|v| v.trim())
        .filter(|v| !v.is_empty() && *v != "null" && *v != "undefined")
}

fn parse_in_range<T>(name: &str, raw: &str, min: T, max: T) -> Result<T>
where
    T: std::str::FromStr + PartialOrd + std::fmt::Display + Copy,
{
    let value: T = raw
        .parse()
        .map_err(|_| AppError::Validation(format!("{} must be an integer, got '{}'", name, raw)))?;

    if value < min || value > max {
        return Err(AppError::Validation(format!(
            "{} must be between {} and {}, got {}",
            name, min, max, value
        )));
    }

    Ok(value)
}
