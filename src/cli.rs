use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "specgram", about = "Audio spectrogram renderer")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Config file (default: ./specgram.toml, then the user config dir)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Font file for figure text
    #[arg(long, global = true)]
    pub font: Option<PathBuf>,

    /// URL to download the figure font from
    #[arg(long, global = true)]
    pub font_url: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Submit a full-size render task and wait for it
    Render {
        /// Input audio file (MP3, WAV, FLAC, OGG, M4A, AAC, WMA)
        input: PathBuf,

        /// Also copy the finished image here
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[command(flatten)]
        render: RenderArgs,
    },

    /// Render a small preview synchronously
    Preview {
        input: PathBuf,

        /// Also copy the preview here
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[command(flatten)]
        render: RenderArgs,
    },

    /// Render a full-size image synchronously for download
    Download {
        input: PathBuf,

        #[command(flatten)]
        render: RenderArgs,
    },

    /// Delete uploads and outputs older than the retention period
    Cleanup {
        /// Maximum file age in hours (default: storage.retention_hours)
        #[arg(long)]
        max_age_hours: Option<u64>,
    },

    /// Print service status as JSON
    Status,
}

#[derive(Args, Debug, Clone)]
pub struct RenderArgs {
    /// Colour map (magma, viridis, custom, gray, ...)
    #[arg(long, default_value = "magma")]
    pub colormap: String,

    /// Frequency scale: linear, log or mel
    #[arg(long, default_value = "linear")]
    pub scale: String,

    /// FFT size: 1024, 2048, 4096, 8192 or 16384
    #[arg(long, default_value_t = 2048)]
    pub fft_size: usize,

    /// Enhancement mode: classic, sharp or sharper
    #[arg(long, default_value = "classic")]
    pub mode: String,

    /// Always use the scalar transform
    #[arg(long)]
    pub no_accelerated: bool,
}
