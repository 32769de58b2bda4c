//! `ypost config` – show the config path and effective settings.

use anyhow::Result;
use std::path::Path;
use ypost_core::config::PosterConfig;

pub fn run_show_config(cfg: &PosterConfig, path: &Path) -> Result<()> {
    print!("{}", render(cfg, path)?);
    Ok(())
}

pub(super) fn render(cfg: &PosterConfig, path: &Path) -> Result<String> {
    let mut out = format!("# {}\n", path.display());
    out.push_str(&cfg.redacted().to_toml()?);
    if cfg.servers.is_empty() {
        out.push_str("\n# no servers configured: add a [server.<name>] section to post\n");
    }
    Ok(out)
}
