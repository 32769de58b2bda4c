//! `ypost post` – encode files and post them to every configured server.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use ypost_core::config::{PosterConfig, SubjectMode};
use ypost_core::enumerate::{check_inputs, enumerate_files};
use ypost_core::error::SetupError;
use ypost_core::scheduler::{self, RunReport};

pub async fn run_post(
    cfg: PosterConfig,
    config_path: &Path,
    subject: SubjectMode,
    groups: Option<&str>,
    paths: &[PathBuf],
) -> Result<()> {
    check_inputs(paths, subject == SubjectMode::ParentDirectory)?;
    let run_cfg = cfg
        .into_run_config(subject, groups, &config_path.display().to_string())
        .with_context(|| format!("config {}", config_path.display()))?;

    let files = enumerate_files(paths)?;
    if files.is_empty() {
        return Err(SetupError::NoInputFiles.into());
    }
    let total_bytes: u64 = files.iter().map(|f| f.size).sum();
    tracing::info!(
        files = files.len(),
        bytes = total_bytes,
        servers = run_cfg.servers.len(),
        newsgroups = %run_cfg.newsgroups,
        "starting post"
    );

    let report = scheduler::run_post(files, Arc::new(run_cfg)).await?;
    print!("{}", summary(&report));

    if !report.is_success() {
        anyhow::bail!("not every article was posted to every server");
    }
    Ok(())
}

pub(super) fn summary(report: &RunReport) -> String {
    let mut out = format!("{} file(s)\n", report.files);
    out.push_str(&format!(
        "{:<16} {:>6} {:>8} {:>8} {:>12} {:>10}\n",
        "SERVER", "CONNS", "POSTED", "FAILED", "BYTES", "KiB/s"
    ));
    for s in &report.servers {
        out.push_str(&format!(
            "{:<16} {:>6} {:>8} {:>8} {:>12} {:>10.1}\n",
            s.name,
            format!("{}/{}", s.connected, s.connections),
            format!("{}/{}", s.posted, s.queued),
            s.failed,
            s.bytes,
            s.bytes_per_sec() / 1024.0
        ));
    }
    out
}
