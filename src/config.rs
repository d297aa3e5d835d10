//! Pipeline configuration.
//!
//! Everything that used to be ambient site state (product tree location,
//! catalog service, environment module names) lives in one explicit record
//! loaded at startup, so the rest of the crate never reads the environment.
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const CONFIG_DIR: &str = "stokespipe";
const CONFIG_FILE: &str = "config.json";

/// Environment modules loaded by batch jobs, one per external tool suite.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleVersions {
    pub dspsr: String,
    pub psrchive: String,
    pub psrsalsa: String,
}

impl Default for ModuleVersions {
    fn default() -> Self {
        Self {
            dspsr: "dspsr/master".to_string(),
            psrchive: "psrchive/master".to_string(),
            psrsalsa: "psrsalsa/master".to_string(),
        }
    }
}

/// Site configuration for one cluster deployment.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Root of the per-observation product tree (batch scripts, data products).
    pub base_product_dir: PathBuf,

    /// Pulsar catalog service queried for rotation measures. Lookups are
    /// skipped with a warning when unset.
    pub catalog_url: Option<String>,

    /// Environment modules loaded in every batch script.
    pub modules: ModuleVersions,

    /// External plotting command invoked by the terminal stage, if any.
    pub plot_command: Option<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            base_product_dir: PathBuf::from("/data/vcs"),
            catalog_url: None,
            modules: ModuleVersions::default(),
            plot_command: None,
        }
    }
}

impl PipelineConfig {
    /// Directory batch scripts and job logs are written to for an observation.
    pub fn batch_dir(&self, obsid: &str) -> PathBuf {
        self.base_product_dir.join(obsid).join("batch")
    }

    /// Destination for an observation's final data products.
    pub fn data_products_dir(&self, obsid: &str, pulsar: &str) -> PathBuf {
        self.base_product_dir
            .join(obsid)
            .join("data_products")
            .join(pulsar)
    }
}

/// Default config location under the platform config directory.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(CONFIG_DIR).join(CONFIG_FILE))
}

/// Load the site config.
///
/// An explicit path must exist; the default location falls back to
/// `PipelineConfig::default()` when absent so a bare checkout still runs.
pub fn load_config(path: Option<&Path>) -> Result<PipelineConfig> {
    let (path, required) = match path {
        Some(path) => (path.to_path_buf(), true),
        None => match default_config_path() {
            Some(path) => (path, false),
            None => return Ok(PipelineConfig::default()),
        },
    };
    if !path.is_file() {
        if required {
            return Err(anyhow!("config file {} does not exist", path.display()));
        }
        tracing::debug!(path = %path.display(), "no config file, using defaults");
        return Ok(PipelineConfig::default());
    }
    let bytes = fs::read(&path).with_context(|| format!("read config {}", path.display()))?;
    let config: PipelineConfig =
        serde_json::from_slice(&bytes).context("parse pipeline config JSON")?;
    validate_config(&config)?;
    Ok(config)
}

/// Reject configs that would produce unusable batch scripts or lookups.
pub fn validate_config(config: &PipelineConfig) -> Result<()> {
    if config.base_product_dir.as_os_str().is_empty() {
        return Err(anyhow!("base_product_dir must be non-empty"));
    }
    if let Some(url) = config.catalog_url.as_deref() {
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(anyhow!("catalog_url must be an http(s) URL (got {url:?})"));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        validate_config(&PipelineConfig::default()).unwrap();
    }

    #[test]
    fn batch_dir_is_keyed_by_obsid() {
        let config = PipelineConfig::default();
        assert_eq!(
            config.batch_dir("1255444104"),
            PathBuf::from("/data/vcs/1255444104/batch")
        );
    }

    #[test]
    fn load_explicit_config_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let config = PipelineConfig {
            base_product_dir: PathBuf::from("/scratch/vcs"),
            catalog_url: Some("https://catalog.example.net/rm".to_string()),
            ..PipelineConfig::default()
        };
        fs::write(&path, serde_json::to_string_pretty(&config).unwrap()).unwrap();

        let loaded = load_config(Some(&path)).unwrap();
        assert_eq!(loaded.base_product_dir, PathBuf::from("/scratch/vcs"));
        assert_eq!(loaded.catalog_url.as_deref(), Some("https://catalog.example.net/rm"));
    }

    #[test]
    fn missing_explicit_config_is_an_error() {
        assert!(load_config(Some(Path::new("/nonexistent/config.json"))).is_err());
    }

    #[test]
    fn rejects_non_http_catalog_url() {
        let config = PipelineConfig {
            catalog_url: Some("file:///db.csv".to_string()),
            ..PipelineConfig::default()
        };
        assert!(validate_config(&config).is_err());
    }
}
