use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};

const MAX_BUSY_TIMEOUT_MS: u64 = i32::MAX as u64;

#[derive(Parser, Debug)]
#[command(
    name = "ricegrade",
    version,
    about = "Milled-rice quality grading with classification history and spreadsheet reports"
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Grade one manually entered sample.
    Classify(ClassifyArgs),
    /// Grade every row of an .xls/.xlsx file and write a report.
    Upload(UploadArgs),
    /// List recorded classifications, newest first.
    History(HistoryArgs),
    /// Delete every recorded classification and restart ids at 1.
    ClearHistory,
    Status,
}

#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    #[arg(long, global = true, default_value = ".cache/ricegrade")]
    pub data_dir: PathBuf,

    #[arg(long, global = true)]
    pub db_path: Option<PathBuf>,

    /// Upper bound for spreadsheet reads and database lock waits; 0 means no bound.
    #[arg(long, global = true, default_value_t = 5000)]
    pub timeout_ms: u64,
}

impl GlobalArgs {
    pub fn db_path(&self) -> PathBuf {
        self.db_path
            .clone()
            .unwrap_or_else(|| self.data_dir.join("riwayat_prediksi.sqlite"))
    }

    pub fn busy_timeout(&self) -> Duration {
        match self.timeout_ms {
            0 => Duration::from_millis(MAX_BUSY_TIMEOUT_MS),
            ms => Duration::from_millis(ms.min(MAX_BUSY_TIMEOUT_MS)),
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct ClassifyArgs {
    #[arg(long, alias = "derajat-sosoh", allow_hyphen_values = true)]
    pub polish: Option<String>,

    #[arg(long, alias = "kadar-air", allow_hyphen_values = true)]
    pub moisture: Option<String>,

    #[arg(long, alias = "butir-patah", allow_hyphen_values = true)]
    pub broken: Option<String>,

    #[arg(long, alias = "butir-menir", allow_hyphen_values = true)]
    pub chalky: Option<String>,

    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Args, Debug, Clone)]
pub struct UploadArgs {
    #[arg(long)]
    pub file: PathBuf,

    /// Format to read the file as; defaults to the file's own extension.
    #[arg(long)]
    pub extension: Option<String>,

    #[arg(long)]
    pub report_dir: Option<PathBuf>,

    #[arg(long)]
    pub manifest_path: Option<PathBuf>,

    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Args, Debug, Clone)]
pub struct HistoryArgs {
    #[arg(long)]
    pub limit: Option<usize>,

    #[arg(long, default_value_t = false)]
    pub json: bool,
}
