//! OAR Structure Server and CLI
//!
//! A binary for document structure analysis and OCR via CLI or HTTP server.
//!
//! # Usage
//!
//! ## CLI Mode
//! ```bash
//! oar-structure-server analyze --file paper.pdf --format markdown --assets-dir out/
//! oar-structure-server ocr --file scan.png --format text
//! oar-structure-server ocr --url "https://example.com/image.jpg"
//! ```
//!
//! ## Server Mode
//! ```bash
//! PPOCR_MODELS_DIR=/opt/models oar-structure-server serve --port 8080
//! ```

mod cli;
mod config;
mod request;
mod server;

use clap::{ArgAction, Parser, Subcommand};
use cli::{AnalyzeFormat, OcrFormat};
use config::ModelArgs;
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(name = "oar-structure-server")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Document structure analysis and OCR via CLI or HTTP server", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze the structure of an image or PDF
    Analyze {
        /// Local image or PDF to analyze
        #[arg(long)]
        file: PathBuf,

        /// Output format
        #[arg(long, value_enum, default_value = "json")]
        format: AnalyzeFormat,

        /// Directory to write Markdown image assets into
        #[arg(long = "assets-dir")]
        assets_dir: Option<PathBuf>,

        #[command(flatten)]
        models: ModelArgs,
    },
    /// Run plain OCR on an image or PDF
    Ocr {
        /// URL of the file to process
        #[arg(long, conflicts_with = "file", required_unless_present = "file")]
        url: Option<String>,

        /// Local file path to process
        #[arg(long, conflicts_with = "url")]
        file: Option<PathBuf>,

        /// Output format
        #[arg(long, value_enum, default_value = "json")]
        format: OcrFormat,

        #[command(flatten)]
        models: ModelArgs,
    },
    /// Start the HTTP server
    Serve {
        /// Port to listen on
        #[arg(long, short, default_value = "8080", env = "OAR_PORT")]
        port: u16,

        /// Host to bind to
        #[arg(long, default_value = "0.0.0.0", env = "OAR_HOST")]
        host: String,

        /// Load models on the first request that needs them
        #[arg(long = "auto-load", default_value_t = true, action = ArgAction::Set, env = "OAR_AUTO_LOAD")]
        auto_load: bool,

        /// Load both model groups before accepting requests
        #[arg(long)]
        preload: bool,

        /// Largest accepted upload in megabytes
        #[arg(long = "max-upload-mb", default_value_t = 100, env = "OAR_MAX_UPLOAD_MB")]
        max_upload_mb: usize,

        #[command(flatten)]
        models: ModelArgs,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    oar_structure::utils::init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Analyze {
            file,
            format,
            assets_dir,
            models,
        } => {
            info!("Analyzing file: {}", file.display());
            tokio::task::spawn_blocking(move || {
                cli::analyze_file(&file, &models, format, assets_dir.as_deref())
            })
            .await??;
        }
        Commands::Ocr {
            url,
            file,
            format,
            models,
        } => {
            if let Some(url) = url {
                info!("Processing URL: {}", url);
                cli::ocr_url(&url, &models, format).await?;
            } else if let Some(file) = file {
                info!("Processing file: {}", file.display());
                tokio::task::spawn_blocking(move || cli::ocr_file(&file, &models, format)).await??;
            }
        }
        Commands::Serve {
            port,
            host,
            auto_load,
            preload,
            max_upload_mb,
            models,
        } => {
            let config = config::ServerConfig {
                models,
                host,
                port,
                auto_load,
                preload,
                max_upload_mb,
            };

            info!("Starting server on {}:{}", config.host, config.port);
            server::run_server(config).await?;
        }
    }

    Ok(())
}
