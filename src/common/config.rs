//! Configuration schema, defaults, and layered loading.
//!
//! Precedence: defaults < config file < environment
use anyhow::{ensure, Context, Result};
use directories::ProjectDirs;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::PathBuf;

pub const DEFAULT_MAX_FILE_SIZE_BYTES: u64 = 10 * 1024 * 1024;
const MAX_CONCURRENCY: usize = 256;

fn default_extensions() -> BTreeSet<String> {
    [".pdf", ".doc", ".docx", ".jpg", ".jpeg", ".png"]
        .into_iter()
        .map(str::to_string)
        .collect()
}

pub fn config_path() -> PathBuf {
    ProjectDirs::from("", "", "docdrop")
        .map(|p| p.config_dir().join("config.toml"))
        .unwrap_or_else(|| PathBuf::from("docdrop.toml"))
}

/// Fully resolved upload session configuration after all layers merge.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    /// Allowed extensions, dot-prefixed. Matching is case-insensitive.
    pub accepted_extensions: BTreeSet<String>,
    /// Per-file size ceiling, inclusive.
    pub max_file_size_bytes: u64,
    /// Aggregate task ceiling for one session.
    pub max_files: usize,
    /// When false the session holds at most one task.
    pub multiple: bool,
    /// Uploads allowed in flight at once. 1 means fully sequential.
    pub max_concurrent_uploads: usize,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            accepted_extensions: default_extensions(),
            max_file_size_bytes: DEFAULT_MAX_FILE_SIZE_BYTES,
            max_files: 10,
            multiple: true,
            max_concurrent_uploads: 4,
        }
    }
}

impl UploadConfig {
    /// Task ceiling with the `multiple` switch applied.
    pub fn effective_max_files(&self) -> usize {
        if self.multiple {
            self.max_files
        } else {
            1
        }
    }

    pub fn accepts_extension(&self, extension: &str) -> bool {
        self.accepted_extensions.contains(&extension.to_lowercase())
    }

    /// Validates limits and rejects unsafe values.
    pub fn validate(&self) -> Result<()> {
        ensure!(
            !self.accepted_extensions.is_empty(),
            "Invalid config: accepted_extensions must not be empty"
        );
        for ext in &self.accepted_extensions {
            ensure!(
                ext.starts_with('.') && ext.len() > 1,
                "Invalid config: extension '{ext}' must start with '.'"
            );
        }
        ensure!(
            self.max_file_size_bytes > 0,
            "Invalid config: max_file_size_bytes must be > 0"
        );
        ensure!(self.max_files >= 1, "Invalid config: max_files must be >= 1");
        ensure!(
            self.max_concurrent_uploads >= 1,
            "Invalid config: max_concurrent_uploads must be >= 1"
        );
        ensure!(
            self.max_concurrent_uploads <= MAX_CONCURRENCY,
            "Invalid config: max_concurrent_uploads must be <= {MAX_CONCURRENCY}"
        );
        Ok(())
    }

    /// Lowercases configured extensions so case differences in the config
    /// file never cause spurious rejections.
    fn normalize(mut self) -> Self {
        self.accepted_extensions = self
            .accepted_extensions
            .iter()
            .map(|e| e.to_lowercase())
            .collect();
        self
    }
}

/// Loads config from defaults/file/env.
pub fn load_config() -> Result<UploadConfig> {
    let path = config_path();

    let config: UploadConfig = Figment::new()
        .merge(Serialized::defaults(UploadConfig::default()))
        .merge(Toml::file(&path))
        .merge(Env::prefixed("DOCDROP_"))
        .extract()
        .context("Failed to load configuration")?;

    let config = config.normalize();
    config.validate()?;

    Ok(config)
}
