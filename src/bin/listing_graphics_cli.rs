//! Listing Graphics CLI - bridge interface for the web application
//!
//! Commands: templates, validate, render
//! Outputs JSON to stdout
//! Returns 2 on validation failure

use clap::{Parser, Subcommand};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use listing_graphics_core::{AssetDescriptor, EngineConfig, RenderEngine, RenderError, TemplateRegistry};

#[derive(Parser)]
#[command(name = "listing-graphics-cli")]
#[command(about = "Listing Graphics CLI - marketing graphic composition engine")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Engine configuration file (JSON)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// List available templates
    Templates,

    /// Validate a descriptor
    Validate {
        /// JSON payload (AssetDescriptor)
        #[arg(short, long)]
        payload: String,
    },

    /// Render a descriptor to PNG
    Render {
        /// Descriptor file (AssetDescriptor JSON)
        #[arg(short, long)]
        descriptor: PathBuf,

        /// Where to write the PNG
        #[arg(short, long)]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = match cli.config.as_deref().map(EngineConfig::from_file).transpose() {
        Ok(config) => config.unwrap_or_default().apply_env(),
        Err(e) => return fail(&e.to_string()),
    };

    let mut registry = TemplateRegistry::builtin();
    if let Some(dir) = &config.templates_dir {
        if let Err(e) = registry.load_from_dir(dir) {
            return fail(&format!("Failed to load templates: {e}"));
        }
    }

    let engine = match RenderEngine::new(registry, &config) {
        Ok(engine) => engine,
        Err(e) => return fail(&e.to_string()),
    };

    match cli.command {
        Commands::Templates => {
            let templates: Vec<_> = engine
                .list_templates()
                .iter()
                .map(|t| {
                    serde_json::json!({
                        "id": t.id,
                        "name": t.name,
                        "summary": t.summary,
                        "version": t.template_version,
                        "width": t.canvas.width,
                        "height": t.canvas.height,
                        "photoSlots": t.capacity(),
                        "dpi": t.print.as_ref().map(|p| p.dpi),
                    })
                })
                .collect();
            print_json(&templates)
        }

        Commands::Validate { payload } => {
            let descriptor: AssetDescriptor = match serde_json::from_str(&payload) {
                Ok(d) => d,
                Err(e) => return fail(&format!("Invalid payload: {e}")),
            };
            match engine.validate(&descriptor) {
                Ok(result) => {
                    let code = print_json(&result);
                    if result.valid {
                        code
                    } else {
                        ExitCode::from(2)
                    }
                }
                Err(e) => render_failure(&e),
            }
        }

        Commands::Render { descriptor, output } => {
            let descriptor = match read_descriptor(&descriptor) {
                Ok(d) => d,
                Err(message) => return fail(&message),
            };
            match engine.render(&descriptor).await {
                Ok(asset) => {
                    if let Err(e) = fs::write(&output, &asset.png) {
                        return fail(&format!("Failed to write {}: {e}", output.display()));
                    }
                    print_json(&serde_json::json!({
                        "success": true,
                        "output": output.display().to_string(),
                        "asset": asset,
                    }))
                }
                Err(e) => render_failure(&e),
            }
        }
    }
}

fn read_descriptor(path: &Path) -> Result<AssetDescriptor, String> {
    let content = fs::read_to_string(path).map_err(|e| format!("Failed to read {}: {e}", path.display()))?;
    serde_json::from_str(&content).map_err(|e| format!("Invalid descriptor: {e}"))
}

fn print_json(value: &impl Serialize) -> ExitCode {
    match serde_json::to_string_pretty(value) {
        Ok(json) => {
            println!("{json}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("failed to serialize output: {e}");
            ExitCode::FAILURE
        }
    }
}

fn fail(message: &str) -> ExitCode {
    println!("{}", serde_json::json!({ "success": false, "error": message }));
    ExitCode::FAILURE
}

fn render_failure(err: &RenderError) -> ExitCode {
    println!(
        "{}",
        serde_json::json!({
            "success": false,
            "error": err.to_string(),
            "message": err.user_message(),
        })
    );
    match err {
        RenderError::ValidationFailed(_) => ExitCode::from(2),
        _ => ExitCode::FAILURE,
    }
}
