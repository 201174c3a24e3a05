use crate::{
    error::{InferenceError, ModelLoadError},
    preprocess::ImageTensor,
};
use std::path::Path;

/// A loaded model, safe to share between concurrent predictions.
pub trait InferenceModel: Send + Sync + 'static {
    /// Length of the probability vector produced by [`InferenceModel::forward`].
    fn output_len(&self) -> usize;

    fn forward(&self, input: &ImageTensor) -> Result<Vec<f32>, InferenceError>;
}

pub trait ModelLoader: Send + Sync + 'static {
    type Model: InferenceModel;

    fn load(&self, path: &Path) -> Result<Self::Model, ModelLoadError>;
}
