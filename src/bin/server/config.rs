//! Configuration types for the server and CLI.

use clap::Args;
use oar_structure::core::{LayoutVariant, ModelManifest, OcrResult, OrtSessionConfig, RenderSettings};
use std::path::PathBuf;

/// Model location and device options shared by every command.
#[derive(Debug, Clone, Args)]
pub struct ModelArgs {
    /// Directory holding the model folders
    #[arg(long = "models-dir", env = "PPOCR_MODELS_DIR")]
    pub models_dir: Option<PathBuf>,

    /// Layout model variant (L, M, S, plus-L)
    #[arg(long = "layout-variant", default_value = "L", env = "OAR_LAYOUT_VARIANT")]
    pub layout_variant: LayoutVariant,

    /// Device to use (cpu, cuda, cuda:0, etc.)
    #[arg(long, default_value = "cpu", env = "OAR_DEVICE")]
    pub device: String,

    /// PDF rendering resolution
    #[arg(long, default_value_t = 300.0, env = "OAR_PDF_DPI")]
    pub dpi: f32,
}

impl ModelArgs {
    /// Model files for these options.
    ///
    /// Without `--models-dir` the directory comes from the environment
    /// fallbacks of [`ModelManifest::from_env`].
    pub fn manifest(&self) -> ModelManifest {
        let manifest = match &self.models_dir {
            Some(dir) => ModelManifest::in_dir(dir),
            None => ModelManifest::from_env(),
        };
        manifest.with_layout_variant(self.layout_variant)
    }

    /// Session settings for the selected device; `None` keeps ONNX Runtime defaults.
    pub fn ort_config(&self) -> OcrResult<Option<OrtSessionConfig>> {
        if self.device.eq_ignore_ascii_case("cpu") {
            return Ok(None);
        }
        OrtSessionConfig::from_device(&self.device).map(Some)
    }

    pub fn render_settings(&self) -> RenderSettings {
        RenderSettings {
            dpi: self.dpi,
            ..RenderSettings::default()
        }
    }
}

/// Configuration for the HTTP server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub models: ModelArgs,
    pub host: String,
    pub port: u16,
    pub auto_load: bool,
    pub preload: bool,
    pub max_upload_mb: usize,
}
