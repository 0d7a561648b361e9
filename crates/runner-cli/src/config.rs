//! Config file discovery + loading (§1.1 ambient stack). `sa_domain::Config`
//! only owns the shape and the merge helper; finding the file on disk and
//! parsing it is this crate's job: an explicit `--config` path wins,
//! otherwise a handful of conventional locations are tried in order, and
//! a missing file is not an error — it just means defaults.

use std::path::{Path, PathBuf};

use anyhow::Context;
use sa_domain::Config;

/// Search order when `--config` isn't given, checked relative to the
/// current working directory.
const DEFAULT_CANDIDATES: &[&str] = &["sa-runner.toml", ".sa-runner.toml", "config/sa-runner.toml"];

/// Load the config, returning the defaulted value and the path it was
/// actually read from (`None` if no file was found and defaults apply).
pub fn load_config(explicit_path: Option<&Path>) -> anyhow::Result<(Config, Option<PathBuf>)> {
    if let Some(path) = explicit_path {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        let config: Config = toml::from_str(&raw).with_context(|| format!("parsing config file {}", path.display()))?;
        return Ok((config, Some(path.to_path_buf())));
    }

    for candidate in DEFAULT_CANDIDATES {
        let path = Path::new(candidate);
        if path.exists() {
            let raw = std::fs::read_to_string(path).with_context(|| format!("reading config file {}", path.display()))?;
            let config: Config = toml::from_str(&raw).with_context(|| format!("parsing config file {}", path.display()))?;
            return Ok((config, Some(path.to_path_buf())));
        }
    }

    Ok((Config::default(), None))
}
