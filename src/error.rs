use image::ColorType;
use std::path::PathBuf;
use thiserror::Error;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("payload is empty")]
    EmptyPayload,
    #[error("only base64 encoded data URLs are supported")]
    UnsupportedDataUrl,
    #[error("invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("payload is not a recognized image format")]
    UnknownFormat,
    #[error("failed to decode image: {0}")]
    Image(#[from] image::ImageError),
}

#[derive(Error, Debug)]
pub enum UnsupportedImageError {
    #[error("image has no pixels ({width}x{height})")]
    Empty { width: u32, height: u32 },
    #[error("color layout {0:?} cannot be converted to RGB")]
    ColorLayout(ColorType),
}

#[derive(Error, Debug)]
pub enum ModelLoadError {
    #[error("model file not found: {0:?}")]
    NotFound(PathBuf),
    #[error("failed to load model from {path:?}: {source}")]
    Backend {
        path: PathBuf,
        #[source]
        source: BoxError,
    },
    #[error("model outputs {actual} classes but {expected} labels are configured")]
    LabelMismatch { expected: usize, actual: usize },
}

#[derive(Error, Debug)]
pub enum InferenceError {
    #[error("forward pass failed: {0}")]
    Backend(#[source] BoxError),
    #[error("model returned {actual} values, expected {expected}")]
    OutputLength { expected: usize, actual: usize },
    #[error("model returned a non-finite probability at index {index}")]
    NonFinite { index: usize },
}

/// Everything a single prediction request can fail with.
#[derive(Error, Debug)]
pub enum ClassifyError {
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error(transparent)]
    UnsupportedImage(#[from] UnsupportedImageError),
    #[error(transparent)]
    ModelLoad(#[from] ModelLoadError),
    #[error(transparent)]
    Inference(#[from] InferenceError),
}

#[derive(Error, Debug)]
pub enum LabelsError {
    #[error("failed to read labels file {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("no class labels configured")]
    Empty,
    #[error("duplicate class label: {0}")]
    Duplicate(String),
}
