use crate::{
    config::ModelConfig,
    error::{InferenceError, ModelLoadError},
    model_service::{InferenceModel, ModelLoader},
    preprocess::ImageTensor,
};
use ort::{
    session::{builder::GraphOptimizationLevel, Session},
    value::TensorRef,
};
use parking_lot::Mutex;
use std::{
    path::Path,
    sync::atomic::{AtomicUsize, Ordering},
};

#[derive(Debug, Clone)]
pub struct OrtModelLoader {
    num_instances: usize,
    intra_threads: usize,
    output_name: Option<String>,
}

impl OrtModelLoader {
    pub fn new(model_config: &ModelConfig) -> Self {
        Self {
            num_instances: model_config.num_instances.max(1),
            intra_threads: model_config.intra_threads.max(1),
            output_name: model_config.output_name.clone(),
        }
    }

    fn build_session(&self, path: &Path) -> Result<Session, ort::Error> {
        Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(self.intra_threads)?
            .commit_from_file(path)
    }
}

impl ModelLoader for OrtModelLoader {
    type Model = OrtModel;

    fn load(&self, path: &Path) -> Result<OrtModel, ModelLoadError> {
        if !path.exists() {
            return Err(ModelLoadError::NotFound(path.to_path_buf()));
        }

        let backend_error = |e: ort::Error| ModelLoadError::Backend {
            path: path.to_path_buf(),
            source: Box::new(e),
        };

        ort::init()
            .with_name("plant_disease")
            .commit()
            .map_err(backend_error)?;

        let sessions = (0..self.num_instances)
            .map(|_| self.build_session(path).map(Mutex::new))
            .collect::<Result<Vec<_>, ort::Error>>()
            .map_err(backend_error)?;

        let output_name = match &self.output_name {
            Some(name) => name.clone(),
            None => sessions[0]
                .lock()
                .outputs
                .first()
                .map(|output| output.name.clone())
                .ok_or_else(|| ModelLoadError::Backend {
                    path: path.to_path_buf(),
                    source: "model declares no outputs".into(),
                })?,
        };

        tracing::info!(
            "Created {} ONNX sessions for {:?} (output `{}`)",
            sessions.len(),
            path,
            output_name
        );

        let mut model = OrtModel {
            sessions,
            counter: AtomicUsize::new(0),
            output_name,
            output_len: 0,
        };

        // One probe pass checks the input shape and discovers the class count.
        let probe = model
            .forward(&ImageTensor::zeros())
            .map_err(|e| ModelLoadError::Backend {
                path: path.to_path_buf(),
                source: Box::new(e),
            })?;
        model.output_len = probe.len();

        tracing::debug!("Model at {:?} outputs {} classes", path, model.output_len);

        Ok(model)
    }
}

pub struct OrtModel {
    sessions: Vec<Mutex<Session>>,
    counter: AtomicUsize,
    output_name: String,
    output_len: usize,
}

impl InferenceModel for OrtModel {
    fn output_len(&self) -> usize {
        self.output_len
    }

    fn forward(&self, input: &ImageTensor) -> Result<Vec<f32>, InferenceError> {
        let index = self.counter.fetch_add(1, Ordering::Relaxed) % self.sessions.len();
        let mut session = self.sessions[index].lock();

        tracing::debug!("Handling request with session {}", index);

        let tensor_ref = TensorRef::from_array_view(input.as_array().view())
            .map_err(|e| InferenceError::Backend(Box::new(e)))?;

        let outputs = session
            .run(ort::inputs![tensor_ref])
            .map_err(|e| InferenceError::Backend(Box::new(e)))?;

        let output = outputs.get(self.output_name.as_str()).ok_or_else(|| {
            InferenceError::Backend(format!("missing output `{}`", self.output_name).into())
        })?;

        let (_, data) = output
            .try_extract_tensor::<f32>()
            .map_err(|e| InferenceError::Backend(Box::new(e)))?;

        Ok(data.to_vec())
    }
}
