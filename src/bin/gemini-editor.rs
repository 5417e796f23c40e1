//! CLI for Gemini Editor - edit images with a text instruction.

use clap::{Args, Parser, Subcommand, ValueEnum};
use gemini_editor::view::render;
use gemini_editor::{
    GeminiEditor, GeminiModel, ImageEditor, IntakeOptions, PathSource, SubmissionController,
    SubmitOutcome,
};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "gemini-editor")]
#[command(about = "Edit images with natural-language instructions via Gemini")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Log request details to stderr
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Edit an image with a text instruction
    Edit(EditArgs),

    /// Check that the API key and model are usable
    Health(HealthArgs),
}

#[derive(Args)]
struct EditArgs {
    /// Image to edit
    input: PathBuf,

    /// What to change, e.g. "add a retro filter"
    #[arg(short, long)]
    prompt: String,

    /// Where to write the edited image
    #[arg(short, long)]
    output: PathBuf,

    /// Model to use
    #[arg(short, long, value_enum, default_value = "flash")]
    model: ModelArg,

    /// Reject inputs larger than this many megabytes
    #[arg(long)]
    max_size_mb: Option<u64>,
}

#[derive(Args)]
struct HealthArgs {
    /// Model to check
    #[arg(short, long, value_enum, default_value = "flash")]
    model: ModelArg,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ModelArg {
    Flash,
    Pro,
}

impl From<ModelArg> for GeminiModel {
    fn from(arg: ModelArg) -> Self {
        match arg {
            ModelArg::Flash => GeminiModel::Flash,
            ModelArg::Pro => GeminiModel::Pro,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Edit(args) => edit_image(args, cli.json).await,
        Commands::Health(args) => health(args, cli.json).await,
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "gemini_editor=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn edit_image(args: EditArgs, json_output: bool) -> anyhow::Result<()> {
    let editor = GeminiEditor::builder().model(args.model.into()).build()?;

    let mut intake = IntakeOptions::default();
    if let Some(mb) = args.max_size_mb {
        intake = intake.with_max_megabytes(mb);
    }
    let controller = SubmissionController::new(editor).with_intake_options(intake);

    let source = PathSource::open(&args.input).await?;
    controller.upload(&source).await?;
    controller.set_prompt(&args.prompt);

    let outcome = controller.submit().await;
    let state = controller.snapshot();

    if outcome != SubmitOutcome::Succeeded {
        let message = state
            .error
            .clone()
            .unwrap_or_else(|| format!("edit did not complete ({outcome:?})"));
        if json_output {
            let result = serde_json::json!({
                "success": false,
                "status": state.status,
                "error": message,
            });
            println!("{}", serde_json::to_string_pretty(&result)?);
            std::process::exit(1);
        }
        anyhow::bail!(message);
    }

    let bytes = state
        .result_bytes()?
        .ok_or_else(|| anyhow::anyhow!("no edited image in state"))?;
    tokio::fs::write(&args.output, &bytes).await?;

    if json_output {
        let result = serde_json::json!({
            "success": true,
            "status": state.status,
            "input": args.input.display().to_string(),
            "output": args.output.display().to_string(),
            "size_bytes": bytes.len(),
            "mime_type": state.result.as_ref().map(|r| r.mime_type().to_string()),
            "model": controller.editor().model().as_str(),
        });
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!("{}", render(&state));
        println!(
            "Edited image: {} ({} bytes)",
            args.output.display(),
            bytes.len()
        );
    }

    Ok(())
}

async fn health(args: HealthArgs, json_output: bool) -> anyhow::Result<()> {
    let model: GeminiModel = args.model.into();
    let editor = GeminiEditor::builder().model(model).build()?;
    let result = editor.health_check().await;

    if json_output {
        let body = serde_json::json!({
            "provider": editor.name(),
            "model": model.as_str(),
            "healthy": result.is_ok(),
            "error": result.as_ref().err().map(|e| e.to_string()),
        });
        println!("{}", serde_json::to_string_pretty(&body)?);
    } else {
        match &result {
            Ok(()) => println!("✓ {} ({})", editor.name(), model.as_str()),
            Err(e) => println!("✗ {} ({}): {}", editor.name(), model.as_str(), e),
        }
    }

    result.map_err(Into::into)
}
