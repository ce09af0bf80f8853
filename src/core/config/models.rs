//! Model file locations.
//!
//! A [`ModelManifest`] names every file a model group needs. The models directory
//! is resolved from the environment exactly once, when the manifest is built.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable overriding the models directory.
pub const MODELS_DIR_ENV: &str = "PPOCR_MODELS_DIR";
/// Older spelling of [`MODELS_DIR_ENV`], still honoured as a fallback.
pub const LEGACY_MODELS_DIR_ENV: &str = "OCR_MODEL_DIR";
/// Directory used when no override is set.
pub const DEFAULT_MODELS_DIR: &str = "models";

const MODEL_FILE: &str = "inference.onnx";
const DET_DIR: &str = "PP-OCRv5_server_det";
const REC_DIR: &str = "PP-OCRv5_server_rec";
const REC_DICT: &str = "ppocrv5_dict.txt";
const DOC_ORI_DIR: &str = "PP-LCNet_x1_0_doc_ori";
const TEXTLINE_ORI_DIR: &str = "PP-LCNet_x1_0_textline_ori";

/// PP-DocLayout model variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum LayoutVariant {
    /// PP-DocLayout-L, 23 classes.
    #[default]
    #[serde(rename = "PP-DocLayout-L")]
    L,
    /// PP-DocLayout-M, 23 classes.
    #[serde(rename = "PP-DocLayout-M")]
    M,
    /// PP-DocLayout-S, 23 classes.
    #[serde(rename = "PP-DocLayout-S")]
    S,
    /// PP-DocLayout_plus-L, 20 classes.
    #[serde(rename = "PP-DocLayout_plus-L")]
    PlusL,
}

impl LayoutVariant {
    /// Directory name of the variant inside the models directory.
    pub fn dir_name(&self) -> &'static str {
        match self {
            LayoutVariant::L => "PP-DocLayout-L",
            LayoutVariant::M => "PP-DocLayout-M",
            LayoutVariant::S => "PP-DocLayout-S",
            LayoutVariant::PlusL => "PP-DocLayout_plus-L",
        }
    }
}

impl std::str::FromStr for LayoutVariant {
    type Err = crate::core::OCRError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "l" | "pp-doclayout-l" => Ok(LayoutVariant::L),
            "m" | "pp-doclayout-m" => Ok(LayoutVariant::M),
            "s" | "pp-doclayout-s" => Ok(LayoutVariant::S),
            "plus-l" | "plus_l" | "pp-doclayout_plus-l" | "pp-doclayout-plus-l" => {
                Ok(LayoutVariant::PlusL)
            }
            other => Err(crate::core::OCRError::invalid_field(
                "layout_variant",
                "L, M, S or plus-L",
                other,
            )),
        }
    }
}

/// File locations for every model role.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelManifest {
    /// Root directory all default paths were derived from.
    pub models_dir: PathBuf,
    /// Layout variant, which fixes the label table and input size.
    pub layout_variant: LayoutVariant,
    /// Layout detection model.
    pub layout_model: PathBuf,
    /// DB text detection model.
    pub det_model: PathBuf,
    /// CTC text recognition model.
    pub rec_model: PathBuf,
    /// Character dictionary of the recognition model.
    pub rec_dict: PathBuf,
    /// Document orientation classifier.
    pub doc_orientation_model: PathBuf,
    /// Text-line orientation classifier; loaded only when the file exists.
    pub textline_orientation_model: PathBuf,
}

impl ModelManifest {
    /// Builds a manifest rooted at the directory named by the environment.
    ///
    /// `PPOCR_MODELS_DIR` wins over `OCR_MODEL_DIR`; without either the
    /// relative `models` directory is used.
    pub fn from_env() -> Self {
        let dir = std::env::var_os(MODELS_DIR_ENV)
            .or_else(|| std::env::var_os(LEGACY_MODELS_DIR_ENV))
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_MODELS_DIR));
        tracing::debug!(models_dir = %dir.display(), "resolved models directory");
        Self::in_dir(dir)
    }

    /// Builds a manifest with the default layout below `dir`.
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        let variant = LayoutVariant::default();
        Self {
            layout_model: dir.join(variant.dir_name()).join(MODEL_FILE),
            layout_variant: variant,
            det_model: dir.join(DET_DIR).join(MODEL_FILE),
            rec_model: dir.join(REC_DIR).join(MODEL_FILE),
            rec_dict: dir.join(REC_DIR).join(REC_DICT),
            doc_orientation_model: dir.join(DOC_ORI_DIR).join(MODEL_FILE),
            textline_orientation_model: dir.join(TEXTLINE_ORI_DIR).join(MODEL_FILE),
            models_dir: dir,
        }
    }

    /// Switches the layout variant, relocating the layout model path.
    pub fn with_layout_variant(mut self, variant: LayoutVariant) -> Self {
        self.layout_variant = variant;
        self.layout_model = self
            .models_dir
            .join(variant.dir_name())
            .join(MODEL_FILE);
        self
    }

    /// Files required by the OCR group, in load order.
    pub fn ocr_files(&self) -> Vec<&Path> {
        vec![
            self.doc_orientation_model.as_path(),
            self.det_model.as_path(),
            self.rec_model.as_path(),
            self.rec_dict.as_path(),
        ]
    }

    /// Files required by the structure group, in load order.
    pub fn structure_files(&self) -> Vec<&Path> {
        let mut files = vec![self.layout_model.as_path()];
        files.extend(self.ocr_files());
        files
    }

    /// Returns the subset of `files` that does not exist on disk.
    pub fn missing(files: &[&Path]) -> Vec<PathBuf> {
        files
            .iter()
            .filter(|path| !path.exists())
            .map(|path| path.to_path_buf())
            .collect()
    }
}

impl Default for ModelManifest {
    fn default() -> Self {
        Self::in_dir(DEFAULT_MODELS_DIR)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manifest_default_layout() {
        let manifest = ModelManifest::in_dir("/opt/models");
        assert_eq!(
            manifest.layout_model,
            PathBuf::from("/opt/models/PP-DocLayout-L/inference.onnx")
        );
        assert_eq!(
            manifest.rec_dict,
            PathBuf::from("/opt/models/PP-OCRv5_server_rec/ppocrv5_dict.txt")
        );
        assert_eq!(manifest.structure_files().len(), 5);
        assert_eq!(manifest.ocr_files().len(), 4);
    }

    #[test]
    fn test_manifest_layout_variant_relocates_model() {
        let manifest = ModelManifest::in_dir("m").with_layout_variant(LayoutVariant::PlusL);
        assert_eq!(
            manifest.layout_model,
            PathBuf::from("m/PP-DocLayout_plus-L/inference.onnx")
        );
    }

    #[test]
    fn test_manifest_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = ModelManifest::in_dir(dir.path());
        std::fs::create_dir_all(manifest.det_model.parent().unwrap()).unwrap();
        std::fs::write(&manifest.det_model, b"onnx").unwrap();

        let missing = ModelManifest::missing(&manifest.ocr_files());
        assert_eq!(missing.len(), 3);
        assert!(!missing.contains(&manifest.det_model));
        assert!(missing.contains(&manifest.rec_dict));
    }

    #[test]
    fn test_layout_variant_from_str() {
        assert_eq!("plus-L".parse::<LayoutVariant>().unwrap(), LayoutVariant::PlusL);
        assert_eq!("s".parse::<LayoutVariant>().unwrap(), LayoutVariant::S);
        assert!("xl".parse::<LayoutVariant>().is_err());
    }
}
