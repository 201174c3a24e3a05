use crate::error::{DecodeError, UnsupportedImageError};
use base64::{engine::general_purpose::STANDARD as BASE64_STANDARD, Engine};
use image::{imageops::FilterType, DynamicImage, GenericImageView, ImageReader};
use ndarray::{Array, Ix4};
use std::io::Cursor;

pub const INPUT_SIZE: u32 = 224;
pub const CHANNELS: usize = 3;

/// Model input in NHWC layout, shape `(1, 224, 224, 3)`.
///
/// Values stay in the decoded 8-bit range; any rescaling belongs to the model.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageTensor(Array<f32, Ix4>);

impl ImageTensor {
    pub fn shape() -> (usize, usize, usize, usize) {
        (1, INPUT_SIZE as usize, INPUT_SIZE as usize, CHANNELS)
    }

    /// All-zero tensor of the input shape, used to probe a freshly loaded model.
    pub fn zeros() -> Self {
        Self(Array::zeros(Self::shape()))
    }

    pub fn as_array(&self) -> &Array<f32, Ix4> {
        &self.0
    }
}

fn strip_data_url(payload: &str) -> Result<&str, DecodeError> {
    let Some(rest) = payload.strip_prefix("data:") else {
        return Ok(payload);
    };
    let (metadata, data) = rest.split_once(',').ok_or(DecodeError::UnsupportedDataUrl)?;
    if !metadata.ends_with(";base64") {
        return Err(DecodeError::UnsupportedDataUrl);
    }
    Ok(data)
}

/// Decodes a base64 payload (plain or `data:` URL) into an image.
pub fn decode(payload: &str) -> Result<DynamicImage, DecodeError> {
    let data = strip_data_url(payload.trim())?;
    let compact: String = data.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    if compact.is_empty() {
        return Err(DecodeError::EmptyPayload);
    }

    let bytes = BASE64_STANDARD.decode(compact.as_bytes())?;

    let reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| DecodeError::Image(e.into()))?;
    if reader.format().is_none() {
        return Err(DecodeError::UnknownFormat);
    }

    Ok(reader.decode()?)
}

/// Resizes to 224x224 ignoring aspect ratio and lays the RGB pixels out as a
/// single-image batch.
pub fn normalize(image: &DynamicImage) -> Result<ImageTensor, UnsupportedImageError> {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return Err(UnsupportedImageError::Empty { width, height });
    }

    let rgb = match image {
        DynamicImage::ImageLuma8(_)
        | DynamicImage::ImageLumaA8(_)
        | DynamicImage::ImageRgb8(_)
        | DynamicImage::ImageRgba8(_)
        | DynamicImage::ImageLuma16(_)
        | DynamicImage::ImageLumaA16(_)
        | DynamicImage::ImageRgb16(_)
        | DynamicImage::ImageRgba16(_)
        | DynamicImage::ImageRgb32F(_)
        | DynamicImage::ImageRgba32F(_) => image
            .resize_exact(INPUT_SIZE, INPUT_SIZE, FilterType::CatmullRom)
            .to_rgb8(),
        other => return Err(UnsupportedImageError::ColorLayout(other.color())),
    };

    let mut input = Array::zeros(ImageTensor::shape());
    for (x, y, pixel) in rgb.enumerate_pixels() {
        let [r, g, b] = pixel.0;
        let (x, y) = (x as usize, y as usize);
        input[[0, y, x, 0]] = r as f32;
        input[[0, y, x, 1]] = g as f32;
        input[[0, y, x, 2]] = b as f32;
    }

    Ok(ImageTensor(input))
}
