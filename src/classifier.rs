use crate::{
    error::{ClassifyError, ModelLoadError},
    labels::ClassLabels,
    model_service::{InferenceModel, ModelLoader},
    prediction::{self, PredictionResult},
    preprocess::{self, ImageTensor},
};
use once_cell::sync::OnceCell;
use parking_lot::RwLock;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelState {
    Unloaded,
    Loading,
    Ready,
    /// The last load attempt failed; the next call retries.
    Failed,
}

impl ModelState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelState::Unloaded => "unloaded",
            ModelState::Loading => "loading",
            ModelState::Ready => "loaded",
            ModelState::Failed => "failed",
        }
    }
}

/// Owns the model for the lifetime of the process.
///
/// The model is loaded on the first prediction (or [`DiseaseClassifier::load_model`])
/// and then shared read-only by every caller. Concurrent first callers block on
/// a single load attempt.
pub struct DiseaseClassifier<L: ModelLoader> {
    loader: L,
    model_path: PathBuf,
    labels: ClassLabels,
    model: OnceCell<L::Model>,
    state: RwLock<ModelState>,
}

impl<L: ModelLoader> DiseaseClassifier<L> {
    pub fn new(loader: L, model_path: impl Into<PathBuf>, labels: ClassLabels) -> Self {
        Self {
            loader,
            model_path: model_path.into(),
            labels,
            model: OnceCell::new(),
            state: RwLock::new(ModelState::Unloaded),
        }
    }

    pub fn model_path(&self) -> &Path {
        &self.model_path
    }

    pub fn labels(&self) -> &ClassLabels {
        &self.labels
    }

    pub fn state(&self) -> ModelState {
        *self.state.read()
    }

    pub fn is_ready(&self) -> bool {
        self.model.get().is_some()
    }

    /// Loads the model unless it is already cached.
    pub fn load_model(&self) -> Result<&L::Model, ModelLoadError> {
        self.model.get_or_try_init(|| {
            *self.state.write() = ModelState::Loading;

            let result = self.loader.load(&self.model_path).and_then(|model| {
                if model.output_len() != self.labels.len() {
                    return Err(ModelLoadError::LabelMismatch {
                        expected: self.labels.len(),
                        actual: model.output_len(),
                    });
                }
                Ok(model)
            });

            *self.state.write() = match result {
                Ok(_) => ModelState::Ready,
                Err(_) => ModelState::Failed,
            };
            result
        })
    }

    pub fn predict(&self, payload: &str) -> Result<PredictionResult, ClassifyError> {
        let model = self.load_model()?;

        let image = preprocess::decode(payload)?;
        let tensor = preprocess::normalize(&image)?;

        self.run(model, &tensor)
    }

    /// Classifies an already preprocessed tensor.
    pub fn predict_tensor(
        &self,
        tensor: &ImageTensor,
    ) -> Result<PredictionResult, ClassifyError> {
        let model = self.load_model()?;
        self.run(model, tensor)
    }

    fn run(
        &self,
        model: &L::Model,
        tensor: &ImageTensor,
    ) -> Result<PredictionResult, ClassifyError> {
        let output = model.forward(tensor)?;
        Ok(prediction::aggregate(&self.labels, &output)?)
    }
}
