//! ONNX Runtime session wrapper shared by every predictor.
//!
//! `Session::run` needs exclusive access, so each session sits behind a mutex.
//! This also serializes concurrent calls into the same model role.

mod ort_infer_config;

use crate::core::config::OrtSessionConfig;
use crate::core::errors::{OCRError, OcrResult};
use ndarray::{ArrayD, IxDyn};
use ort::session::Session;
use ort::value::Tensor;
use std::borrow::Cow;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, info};

/// A loaded ONNX model.
pub struct OrtInfer {
    session: Mutex<Session>,
    model_name: String,
    model_path: PathBuf,
    input_names: Vec<String>,
}

impl std::fmt::Debug for OrtInfer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrtInfer")
            .field("model_name", &self.model_name)
            .field("model_path", &self.model_path)
            .field("input_names", &self.input_names)
            .finish()
    }
}

impl OrtInfer {
    /// Loads a model from disk, applying the optional session configuration.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the `.onnx` file.
    /// * `model_name` - Name used in logs and error messages.
    /// * `config` - Session settings; `None` keeps ONNX Runtime defaults.
    pub fn from_file(
        path: impl AsRef<Path>,
        model_name: impl Into<String>,
        config: Option<&OrtSessionConfig>,
    ) -> OcrResult<Self> {
        let path = path.as_ref();
        let model_name = model_name.into();
        info!(model = %model_name, path = %path.display(), "loading onnx model");

        let mut builder = Session::builder()?;
        if let Some(cfg) = config {
            builder = Self::apply_ort_config(builder, cfg)?;
        }
        let session = builder.commit_from_file(path).map_err(|e| {
            OCRError::inference_error(&model_name, format!("load {}", path.display()), e)
        })?;

        let input_names = session
            .inputs
            .iter()
            .map(|input| input.name.clone())
            .collect::<Vec<_>>();
        debug!(model = %model_name, inputs = ?input_names, "session ready");

        Ok(Self {
            session: Mutex::new(session),
            model_name,
            model_path: path.to_path_buf(),
            input_names,
        })
    }

    /// Name of the model.
    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    /// File the model was loaded from.
    pub fn model_path(&self) -> &Path {
        &self.model_path
    }

    /// Input names declared by the model graph.
    pub fn input_names(&self) -> &[String] {
        &self.input_names
    }

    /// Runs a single-input model and returns the first output.
    pub fn run(&self, input: ArrayD<f32>) -> OcrResult<ArrayD<f32>> {
        let name = self
            .input_names
            .first()
            .cloned()
            .unwrap_or_else(|| "x".to_string());
        self.run_named(vec![(name, input)])
    }

    /// Runs the model with named inputs and returns the first output.
    pub fn run_named(&self, inputs: Vec<(String, ArrayD<f32>)>) -> OcrResult<ArrayD<f32>> {
        let mut values = Vec::with_capacity(inputs.len());
        for (name, array) in inputs {
            let tensor = Tensor::from_array(array).map_err(|e| {
                OCRError::inference_error(&self.model_name, format!("build input '{name}'"), e)
            })?;
            values.push((Cow::Owned(name), tensor));
        }

        let mut session = self.session.lock().map_err(|_| {
            OCRError::inference_error(&self.model_name, "session lock", "lock poisoned")
        })?;
        let outputs = session
            .run(values)
            .map_err(|e| OCRError::inference_error(&self.model_name, "session run", e))?;
        let (shape, data) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| OCRError::inference_error(&self.model_name, "extract output", e))?;
        let dims = shape.iter().map(|&d| d.max(0) as usize).collect::<Vec<_>>();
        let output = ArrayD::from_shape_vec(IxDyn(&dims), data.to_vec())?;
        Ok(output)
    }
}
