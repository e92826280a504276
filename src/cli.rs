use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about)]
pub struct Args {
    /// Stream file (.psgs container, or a headerless table with --raw-channels)
    #[arg(value_name = "FILE")]
    pub path: PathBuf,

    /// Treat FILE as a headerless table of N channels
    #[arg(long, value_name = "N")]
    pub raw_channels: Option<usize>,

    /// Render to a WAV file instead of playing
    #[arg(long, value_name = "OUT")]
    pub wav: Option<PathBuf>,

    /// Print every fired event instead of playing
    #[arg(long, default_value_t = false)]
    pub trace: bool,

    /// Path to config TOML
    #[arg(long, default_value = "psgseq.toml")]
    pub config: PathBuf,

    /// Tick period in microseconds (overrides config)
    #[arg(long, value_name = "US")]
    pub tick_us: Option<u64>,

    /// Upper bound on rendered audio length
    #[arg(long, value_name = "S", default_value_t = 300)]
    pub max_seconds: u32,
}
