use crate::{
    classifier::DiseaseClassifier,
    config::Config,
    error::{ClassifyError, LabelsError},
    labels::ClassLabels,
    model_service::ModelLoader,
    ort_service::OrtModelLoader,
    prediction::{DetectionRequest, PredictionResult},
};
use std::{
    fs::File,
    io::{self, Read, Write},
    path::PathBuf,
};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Failed to load class labels: {0}")]
    Labels(#[from] LabelsError),
    #[error("Failed to read request: {0}")]
    Io(#[from] io::Error),
    #[error("Malformed detection request: {0}")]
    Request(#[from] serde_json::Error),
    #[error(transparent)]
    Classify(#[from] ClassifyError),
}

pub fn build_classifier(config: &Config) -> Result<DiseaseClassifier<OrtModelLoader>, AppError> {
    let labels = ClassLabels::from_file(&config.labels.get_path())?;
    tracing::info!(
        "Loaded {} class labels from {:?}",
        labels.len(),
        config.labels.get_path()
    );

    let loader = OrtModelLoader::new(&config.model);
    Ok(DiseaseClassifier::new(loader, config.model.get_path(), labels))
}

/// Reads one JSON detection request and classifies its image.
pub fn handle_request<L: ModelLoader>(
    classifier: &DiseaseClassifier<L>,
    reader: impl Read,
) -> Result<PredictionResult, AppError> {
    let request: DetectionRequest = serde_json::from_reader(reader)?;
    if let Some(crop_id) = &request.crop_id {
        tracing::debug!("Detection request for crop {}", crop_id);
    }

    let result = classifier.predict(&request.image_base64)?;
    tracing::info!(
        "Predicted {} with confidence {:.3}",
        result.top_label(),
        result.confidence()
    );

    Ok(result)
}

pub fn start_app(config: Config, request_path: Option<PathBuf>) -> Result<(), AppError> {
    let classifier = build_classifier(&config)?;

    if config.model.preload {
        classifier.load_model().map_err(ClassifyError::from)?;
    }
    tracing::info!("Model state: {}", classifier.state().as_str());

    let result = match request_path {
        Some(path) => handle_request(&classifier, File::open(path)?),
        None => handle_request(&classifier, io::stdin().lock()),
    };

    let result = result.inspect_err(|e| tracing::error!("Prediction failed: {}", e))?;

    let mut stdout = io::stdout().lock();
    serde_json::to_writer(&mut stdout, &result).map_err(io::Error::from)?;
    writeln!(stdout)?;

    Ok(())
}
