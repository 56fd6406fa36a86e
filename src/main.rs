mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use cli::{Cli, Command, RenderArgs};
use specgram::accel::Capability;
use specgram::config::{self, Config, RenderConfig};
use specgram::pipeline::SpectrogramInfo;
use specgram::render::{RenderProfile, Renderer, TextOverlay};
use specgram::spectrum::TransformEngine;
use specgram::storage::{self, Storage};
use specgram::task::{new_task_id, Orchestrator, TaskStatus};
use specgram::validate::{service_status, validate_upload, RenderRequest};
use specgram::Pipeline;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Serialize)]
struct PreviewOutput {
    preview_url: String,
    filename: String,
    #[serde(flatten)]
    info: SpectrogramInfo,
}

#[derive(Serialize)]
struct DownloadOutput {
    path: PathBuf,
    filename: String,
    #[serde(flatten)]
    info: SpectrogramInfo,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let mut cli = Cli::parse();

    let config = match config::find_config(cli.config.as_deref()) {
        Some(path) => match config::load_config(&path) {
            Some(cfg) => {
                log::info!("Loaded config from {}", path.display());
                cfg
            }
            None => {
                log::warn!("Failed to load config from {}", path.display());
                Config::default()
            }
        },
        None => Config::default(),
    };
    if cli.font.is_none() {
        cli.font = config.render.font.clone();
    }
    if cli.font_url.is_none() {
        cli.font_url = config.render.font_url.clone();
    }

    let storage = Storage::from_config(&config.storage)?;

    match &cli.command {
        Command::Status => {
            let capability = Capability::detect(config.render.use_accelerated);
            let status = service_status(capability.is_accelerated(), config.storage.max_upload_mb);
            println!("{}", serde_json::to_string_pretty(&status)?);
        }

        Command::Cleanup { max_age_hours } => {
            let hours = max_age_hours.unwrap_or(config.storage.retention_hours);
            let removed = storage.cleanup(Duration::from_secs(hours * 3600))?;
            println!("{}", serde_json::json!({ "removed_files": removed }));
        }

        Command::Render { input, output, render } => {
            let request = resolve_request(render, &config.render)?;
            let pipeline = build_pipeline(&cli, &request);
            let orchestrator = Orchestrator::new(
                Arc::new(pipeline),
                Arc::new(storage),
                config.storage.max_upload_mb,
            );

            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()
                .context("Failed to start async runtime")?;
            let record = runtime.block_on(run_task(&orchestrator, input, request))?;

            if let (Some(dest), Some(result)) = (output, &record.result) {
                let produced = orchestrator
                    .storage()
                    .output_path(&result.spectrogram_2d.filename);
                std::fs::copy(&produced, dest)
                    .with_context(|| format!("Failed to copy image to {}", dest.display()))?;
                log::info!("Copied image to {}", dest.display());
            }
            println!("{}", serde_json::to_string_pretty(&record)?);
        }

        Command::Preview { input, output, render } => {
            validate_upload(input, config.storage.max_upload_mb)?;
            let request = resolve_request(render, &config.render)?;
            let pipeline = build_pipeline(&cli, &request);

            let image = pipeline.generate_from_path(input, &request, &RenderProfile::preview())?;
            let name = storage::preview_name(&new_task_id(), &request);
            let path = storage.write_output(&name, &image.bytes)?;
            if let Some(dest) = output {
                std::fs::copy(&path, dest)
                    .with_context(|| format!("Failed to copy preview to {}", dest.display()))?;
            }

            let out = PreviewOutput {
                preview_url: storage.public_url(&name),
                filename: name,
                info: image.info,
            };
            println!("{}", serde_json::to_string_pretty(&out)?);
        }

        Command::Download { input, render } => {
            validate_upload(input, config.storage.max_upload_mb)?;
            let request = resolve_request(render, &config.render)?;
            let pipeline = build_pipeline(&cli, &request);

            log::info!("Rendering full-size spectrogram of {}", input.display());
            let image = pipeline.generate_from_path(input, &request, &RenderProfile::final_render())?;
            let name = storage::download_name(&new_task_id());
            let path = storage.write_output(&name, &image.bytes)?;

            let out = DownloadOutput {
                path,
                filename: name,
                info: image.info,
            };
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
    }

    Ok(())
}

/// Submit `input` and poll the task until it settles, mirroring its
/// progress on a bar.
async fn run_task(
    orchestrator: &Orchestrator,
    input: &Path,
    request: RenderRequest,
) -> Result<specgram::TaskRecord> {
    let task_id = orchestrator.submit_file(input, request)?;
    log::info!("Task {} started for {}", task_id, input.display());

    let pb = ProgressBar::new(100);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}% {msg}")?
            .progress_chars("=>-"),
    );

    loop {
        let record = orchestrator.get_status(&task_id)?;
        pb.set_position(record.progress as u64);
        pb.set_message(record.message.clone());

        match record.status {
            TaskStatus::Completed => {
                pb.finish_with_message("Rendering complete");
                return Ok(record);
            }
            TaskStatus::Error => {
                pb.abandon_with_message(record.message.clone());
                anyhow::bail!("Task {} failed: {}", task_id, record.message);
            }
            TaskStatus::Pending | TaskStatus::Processing => {
                tokio::time::sleep(POLL_INTERVAL).await;
            }
        }
    }
}

/// CLI values win unless they were left at their defaults, in which case the
/// config file decides.
fn resolve_request(args: &RenderArgs, config: &RenderConfig) -> Result<RenderRequest> {
    let colormap = if args.colormap == "magma" { &config.colormap } else { &args.colormap };
    let scale = if args.scale == "linear" { &config.scale } else { &args.scale };
    let fft_size = if args.fft_size == 2048 { config.fft_size } else { args.fft_size };
    let mode = if args.mode == "classic" { &config.mode } else { &args.mode };
    let use_accelerated = config.use_accelerated && !args.no_accelerated;

    let request = RenderRequest::parse(colormap, scale, fft_size, mode, use_accelerated)?;
    log::info!(
        "Parameters: colormap={}, scale={}, fft_size={}, mode={}, accelerated={}",
        request.colormap,
        request.scale,
        request.fft_size.get(),
        request.mode,
        request.use_accelerated
    );
    Ok(request)
}

fn build_pipeline(cli: &Cli, request: &RenderRequest) -> Pipeline {
    let capability = Capability::detect(request.use_accelerated);
    log::info!("Transform backend: {:?}", capability);
    let text = TextOverlay::resolve(cli.font.as_deref(), cli.font_url.as_deref());
    Pipeline::new(TransformEngine::new(capability), Renderer::new(text))
}
