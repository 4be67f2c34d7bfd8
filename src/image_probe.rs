use image::{ImageFormat, ImageReader};
use std::io::Cursor;

use crate::candidate::Dimensions;
use crate::error::ValidationError;
use crate::url_resolve::extension;

/// Formats whose headers we read dimensions from.
pub const DECODABLE: &[ImageFormat] = &[
    ImageFormat::Jpeg,
    ImageFormat::Png,
    ImageFormat::Gif,
    ImageFormat::WebP,
    ImageFormat::Bmp,
];

/// Bytes needed for a signature check.
pub const SNIFF_LEN: usize = 32;

/// Outcome of a successful validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageInfo {
    pub loaded: bool,
    pub dimensions: Option<Dimensions>,
}

impl ImageInfo {
    #[must_use]
    pub const fn loaded(dimensions: Option<Dimensions>) -> Self {
        Self {
            loaded: true,
            dimensions,
        }
    }
}

/// Format implied by the address' extension, if it is one we can size.
#[must_use]
pub fn declared_format(address: &str) -> Option<ImageFormat> {
    let ext = extension(address)?;
    ImageFormat::from_extension(ext).filter(|f| DECODABLE.contains(f))
}

/// Format recognised from the leading magic bytes.
#[must_use]
pub fn sniff(bytes: &[u8]) -> Option<ImageFormat> {
    image::guess_format(bytes).ok()
}

/// Pixel size from a possibly truncated buffer; `None` until the header is
/// complete.
#[must_use]
pub fn dimensions(bytes: &[u8]) -> Option<Dimensions> {
    let (w, h) = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .ok()?
        .into_dimensions()
        .ok()?;
    Some(Dimensions::new(w, h))
}

/// Whether the bytes read so far already answer the question.
#[must_use]
pub fn has_enough(address: &str, bytes: &[u8]) -> bool {
    if declared_format(address).is_some() {
        dimensions(bytes).is_some()
    } else {
        bytes.len() >= SNIFF_LEN
    }
}

fn format_name(f: ImageFormat) -> String {
    f.extensions_str()
        .first()
        .map_or_else(|| format!("{f:?}"), |e| (*e).to_string())
}

/// Decide what the downloaded bytes of `address` amount to.
///
/// # Errors
///
/// - [`ValidationError::UnsupportedType`] when the bytes aren't a known image
/// - [`ValidationError::TypeMismatch`] when the bytes contradict the extension
pub fn inspect(address: &str, bytes: &[u8]) -> Result<ImageInfo, ValidationError> {
    let detected = sniff(bytes);

    let Some(declared) = declared_format(address) else {
        return match detected {
            Some(_) => Ok(ImageInfo::loaded(None)),
            None => Err(ValidationError::UnsupportedType(format!(
                "unrecognised bytes from {address}"
            ))),
        };
    };

    let Some(detected) = detected else {
        return Err(ValidationError::UnsupportedType(format!(
            "expected {} from {address}",
            format_name(declared)
        )));
    };

    // JPEG is what mislabelled images usually turn out to be
    if detected != declared && detected != ImageFormat::Jpeg {
        return Err(ValidationError::TypeMismatch {
            declared: format_name(declared),
            detected: format_name(detected),
        });
    }

    let dims = dimensions(bytes);
    if dims.is_none() {
        tracing::debug!(url = %address, "image header incomplete, no dimensions");
    }
    Ok(ImageInfo::loaded(dims))
}

#[cfg(test)]
pub(crate) fn encode(width: u32, height: u32, format: ImageFormat) -> Vec<u8> {
    let img = image::RgbImage::new(width, height);
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, format).unwrap();
    buf.into_inner()
}
