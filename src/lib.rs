mod app;
mod ort_service;

pub mod classifier;
pub mod config;
pub mod error;
pub mod labels;
pub mod model_service;
pub mod prediction;
pub mod preprocess;

pub use app::{build_classifier, handle_request, start_app, AppError};
pub use classifier::{DiseaseClassifier, ModelState};
pub use ort_service::{OrtModel, OrtModelLoader};
pub use prediction::PredictionResult;
