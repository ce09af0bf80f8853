//! CLI mode for structure analysis and OCR.

use crate::config::ModelArgs;
use oar_structure::core::{ModelLoader, ModelRegistry, OcrParams, OcrResult, StructureParams};
use oar_structure::oarocr::{
    MarkdownArtifact, OcrModelLoader, PageOrchestrator, StructureModelLoader, analyze_document,
    document_markdown, ocr_document, ocr_json, ocr_text, structure_json, with_page_source,
};
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

type CliResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// Output of the `analyze` command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum AnalyzeFormat {
    Json,
    Markdown,
}

/// Output of the `ocr` command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OcrFormat {
    Json,
    Text,
}

/// Loads a model group for a one-shot command.
fn load_group<L: ModelLoader>(loader: L) -> OcrResult<Arc<L::Models>> {
    ModelRegistry::new(loader, false).load()
}

/// Analyzes a local image or PDF and prints JSON or Markdown.
///
/// With `assets_dir`, Markdown image assets are written there.
pub fn analyze_file(
    path: &Path,
    models: &ModelArgs,
    format: AnalyzeFormat,
    assets_dir: Option<&Path>,
) -> CliResult<()> {
    let bytes = std::fs::read(path)?;
    let analyzer = load_group(StructureModelLoader::new(models.manifest(), models.ort_config()?))?;
    let params = StructureParams::default();

    let start = Instant::now();
    let output = with_page_source(&bytes, &models.render_settings(), |source| {
        let run = analyze_document(&analyzer, source, PageOrchestrator::unlimited(), &params)?;
        info!(
            pages = run.processed_pages,
            analyze_ms = start.elapsed().as_secs_f64() * 1000.0,
            "analysis completed"
        );
        match format {
            AnalyzeFormat::Json => Ok(CliOutput::Json(structure_json(&run))),
            AnalyzeFormat::Markdown => Ok(CliOutput::Markdown(document_markdown(&run)?)),
        }
    })?;

    print_output(output, assets_dir)
}

fn print_output(output: CliOutput, assets_dir: Option<&Path>) -> CliResult<()> {
    match output {
        CliOutput::Json(value) => println!("{}", serde_json::to_string_pretty(&value)?),
        CliOutput::Text(text) => println!("{text}"),
        CliOutput::Markdown(artifact) => {
            if let Some(dir) = assets_dir {
                std::fs::create_dir_all(dir)?;
                for asset in &artifact.images {
                    std::fs::write(dir.join(&asset.filename), &asset.data)?;
                }
                info!(assets = artifact.images.len(), dir = %dir.display(), "wrote image assets");
            }
            println!("{}", artifact.markdown);
        }
    }
    Ok(())
}

enum CliOutput {
    Json(Value),
    Text(String),
    Markdown(MarkdownArtifact),
}

/// Runs OCR on a local file.
pub fn ocr_file(path: &Path, models: &ModelArgs, format: OcrFormat) -> CliResult<()> {
    let bytes = std::fs::read(path)?;
    ocr_bytes(&bytes, models, format)
}

/// Downloads a URL and runs OCR on it.
pub async fn ocr_url(url: &str, models: &ModelArgs, format: OcrFormat) -> CliResult<()> {
    let start = Instant::now();
    let bytes = reqwest::get(url).await?.error_for_status()?.bytes().await?;
    info!(
        bytes = bytes.len(),
        download_ms = start.elapsed().as_secs_f64() * 1000.0,
        "downloaded"
    );
    let models = models.clone();
    tokio::task::spawn_blocking(move || ocr_bytes(&bytes, &models, format)).await?
}

fn ocr_bytes(bytes: &[u8], models: &ModelArgs, format: OcrFormat) -> CliResult<()> {
    let engine = load_group(OcrModelLoader::new(models.manifest(), models.ort_config()?))?;
    let params = OcrParams::default();
    let output = with_page_source(bytes, &models.render_settings(), |source| {
        let run = ocr_document(&engine, source, PageOrchestrator::unlimited(), &params)?;
        Ok(match format {
            OcrFormat::Json => CliOutput::Json(ocr_json(&run)),
            OcrFormat::Text => CliOutput::Text(ocr_text(&run)),
        })
    })?;
    print_output(output, None)
}
