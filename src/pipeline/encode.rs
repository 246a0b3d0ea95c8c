//! Image encoding: `DynamicImage` → lossless PNG bytes.
//!
//! PNG keeps glyph edges crisp; JPEG artefacts around rendered text hurt
//! recognition at low DPI. Both OCR backends send the same bytes, base64
//! wrapped for their JSON request bodies.

use crate::output::PageImage;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::DynamicImage;
use std::io::Cursor;
use tracing::debug;

/// A page ready for transmission to an OCR service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedPage {
    /// 1-based page index.
    pub index: usize,
    pub png: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl EncodedPage {
    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.png)
    }

    pub fn mime_type(&self) -> &'static str {
        "image/png"
    }
}

/// Encode a rasterised page as PNG.
pub fn encode_page(page: &PageImage) -> Result<EncodedPage, image::ImageError> {
    let img = normalise(&page.image);
    let mut png = Vec::new();
    img.write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)?;

    debug!("Encoded page {} → {} bytes PNG", page.index, png.len());

    Ok(EncodedPage {
        index: page.index,
        png,
        width: img.width(),
        height: img.height(),
    })
}

/// The PNG encoder has no 32-bit float support; convert those to RGBA8.
fn normalise(img: &DynamicImage) -> std::borrow::Cow<'_, DynamicImage> {
    match img {
        DynamicImage::ImageRgb32F(_) | DynamicImage::ImageRgba32F(_) => {
            std::borrow::Cow::Owned(DynamicImage::ImageRgba8(img.to_rgba8()))
        }
        _ => std::borrow::Cow::Borrowed(img),
    }
}
