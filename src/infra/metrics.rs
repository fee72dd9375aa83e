// ============================================================
// Layer 6 — Metrics Logger
// ============================================================
// Appends training metrics to `<repository>/metrics.csv`, one
// row per (iteration, metric):
//
//   iteration,metric,value
//   0,train_loss,0.184211
//   1,train_loss,0.162904
//   1,acc,0.750000
//
// The long format lets any metric name appear without changing
// the header, so runs with different measures share one file.

use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};

use crate::error::Result;

pub const METRICS_FILE: &str = "metrics.csv";

pub struct MetricsLogger {
    csv_path: PathBuf,
}

impl MetricsLogger {
    /// Writes the CSV header if the file doesn't exist yet.
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;

        let csv_path = dir.join(METRICS_FILE);
        if !csv_path.exists() {
            let mut f = fs::File::create(&csv_path)?;
            writeln!(f, "iteration,metric,value")?;
            tracing::debug!(path = %csv_path.display(), "created metrics csv");
        }

        Ok(Self { csv_path })
    }

    pub fn log(&self, iteration: usize, metric: &str, value: f64) -> Result<()> {
        let mut f = OpenOptions::new().append(true).open(&self.csv_path)?;
        writeln!(f, "{iteration},{metric},{value:.6}")?;
        Ok(())
    }

    pub fn csv_path(&self) -> &Path {
        &self.csv_path
    }
}
