//! Model groups backed by ONNX predictors.
//!
//! The OCR group loads the text roles; the structure group loads the layout
//! model on top of its own copy of the text roles. Each group is managed by a
//! [`ModelRegistry`](crate::core::ModelRegistry).

use crate::core::config::{ModelManifest, OrtSessionConfig};
use crate::core::registry::{ModelEntry, ModelInfo, ModelLoader};
use crate::core::OcrResult;
use crate::oarocr::ocr::OcrEngine;
use crate::oarocr::structure::StructureAnalyzer;
use crate::predictors::{
    DocumentOrientationPredictor, LayoutDetectionPredictor, TextDetectionPredictor,
    TextLineOrientationPredictor, TextRecognitionPredictor,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

fn entry(role: &str, path: &Path) -> ModelEntry {
    ModelEntry {
        role: role.to_string(),
        path: path.to_path_buf(),
    }
}

fn ocr_entries(manifest: &ModelManifest) -> Vec<ModelEntry> {
    let mut entries = vec![
        entry("document_orientation", &manifest.doc_orientation_model),
        entry("text_detection", &manifest.det_model),
        entry("text_recognition", &manifest.rec_model),
        entry("character_dict", &manifest.rec_dict),
    ];
    if manifest.textline_orientation_model.exists() {
        entries.push(entry("text_line_orientation", &manifest.textline_orientation_model));
    }
    entries
}

/// Builds an [`OcrEngine`] from the files named in `manifest`.
///
/// The text-line orientation classifier is optional and loaded only when its
/// file exists.
pub fn build_ocr_engine(
    manifest: &ModelManifest,
    ort_config: Option<&OrtSessionConfig>,
) -> OcrResult<OcrEngine> {
    let mut det = TextDetectionPredictor::builder();
    let mut rec = TextRecognitionPredictor::builder().dict_path(&manifest.rec_dict);
    if let Some(config) = ort_config {
        det = det.ort_config(config.clone());
        rec = rec.ort_config(config.clone());
    }
    let detector = det.build(&manifest.det_model)?;
    let recognizer = rec.build(&manifest.rec_model)?;
    let doc_orientation = DocumentOrientationPredictor::new(&manifest.doc_orientation_model, ort_config)?;

    let mut builder = OcrEngine::builder(Arc::new(detector), Arc::new(recognizer))
        .with_document_orientation(Arc::new(doc_orientation));
    if manifest.textline_orientation_model.exists() {
        let line = TextLineOrientationPredictor::new(&manifest.textline_orientation_model, ort_config)?;
        builder = builder.with_text_line_orientation(Arc::new(line));
    } else {
        debug!("no text-line orientation model, lines are recognized as detected");
    }
    Ok(builder.build())
}

/// Loader of the OCR group.
#[derive(Debug, Clone)]
pub struct OcrModelLoader {
    manifest: ModelManifest,
    ort_config: Option<OrtSessionConfig>,
}

impl OcrModelLoader {
    pub fn new(manifest: ModelManifest, ort_config: Option<OrtSessionConfig>) -> Self {
        Self {
            manifest,
            ort_config,
        }
    }
}

impl ModelLoader for OcrModelLoader {
    type Models = OcrEngine;

    fn group(&self) -> &str {
        "ocr"
    }

    fn required_files(&self) -> Vec<PathBuf> {
        self.manifest
            .ocr_files()
            .into_iter()
            .map(Path::to_path_buf)
            .collect()
    }

    fn load(&self) -> OcrResult<OcrEngine> {
        build_ocr_engine(&self.manifest, self.ort_config.as_ref())
    }

    fn model_info(&self) -> ModelInfo {
        ModelInfo {
            group: self.group().to_string(),
            models_dir: self.manifest.models_dir.clone(),
            models: ocr_entries(&self.manifest),
        }
    }
}

/// Loader of the structure group.
#[derive(Debug, Clone)]
pub struct StructureModelLoader {
    manifest: ModelManifest,
    ort_config: Option<OrtSessionConfig>,
}

impl StructureModelLoader {
    pub fn new(manifest: ModelManifest, ort_config: Option<OrtSessionConfig>) -> Self {
        Self {
            manifest,
            ort_config,
        }
    }
}

impl ModelLoader for StructureModelLoader {
    type Models = StructureAnalyzer;

    fn group(&self) -> &str {
        "structure"
    }

    fn required_files(&self) -> Vec<PathBuf> {
        self.manifest
            .structure_files()
            .into_iter()
            .map(Path::to_path_buf)
            .collect()
    }

    fn load(&self) -> OcrResult<StructureAnalyzer> {
        let mut layout = LayoutDetectionPredictor::builder().variant(self.manifest.layout_variant);
        if let Some(config) = &self.ort_config {
            layout = layout.ort_config(config.clone());
        }
        let layout = layout.build(&self.manifest.layout_model)?;
        let ocr = build_ocr_engine(&self.manifest, self.ort_config.as_ref())?;
        Ok(StructureAnalyzer::builder(Arc::new(layout), ocr).build())
    }

    fn model_info(&self) -> ModelInfo {
        let mut models = vec![entry(self.manifest.layout_variant.dir_name(), &self.manifest.layout_model)];
        models.extend(ocr_entries(&self.manifest));
        ModelInfo {
            group: self.group().to_string(),
            models_dir: self.manifest.models_dir.clone(),
            models,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ModelRegistry, ModelState, OCRError};

    #[test]
    fn test_missing_models_reported_before_loading() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = ModelManifest::in_dir(dir.path());
        let registry = ModelRegistry::new(StructureModelLoader::new(manifest.clone(), None), true);
        match registry.acquire() {
            Err(OCRError::ModelFilesIncomplete { missing }) => {
                assert_eq!(missing.len(), 5);
                assert_eq!(missing[0], manifest.layout_model);
            }
            other => panic!("expected ModelFilesIncomplete, got {other:?}"),
        }
        assert_eq!(registry.state(), ModelState::Unloaded);
    }

    #[test]
    fn test_model_info_lists_roles() {
        let manifest = ModelManifest::in_dir("/models");
        let info = OcrModelLoader::new(manifest.clone(), None).model_info();
        assert_eq!(info.group, "ocr");
        let roles: Vec<&str> = info.models.iter().map(|m| m.role.as_str()).collect();
        assert_eq!(
            roles,
            vec!["document_orientation", "text_detection", "text_recognition", "character_dict"]
        );

        let info = StructureModelLoader::new(manifest, None).model_info();
        assert_eq!(info.models[0].role, "PP-DocLayout-L");
        assert_eq!(info.models.len(), 5);
    }
}
