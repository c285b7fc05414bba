use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

pub const DEFAULT_SCRAPE_DIR: &str = "scrape";

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct FaunaConfig {
    #[serde(default)]
    pub archive: ArchiveSection,
    #[serde(default)]
    pub output: OutputSection,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct ArchiveSection {
    /// A `.zim` file, an exploded dump directory, or a `.zip` of one. Relative to the project root.
    pub path: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct OutputSection {
    pub scrape_dir: Option<String>,
}

impl FaunaConfig {
    pub fn archive_path(&self) -> Option<&str> {
        non_blank(self.archive.path.as_deref())
    }

    pub fn scrape_dir(&self) -> Option<&str> {
        non_blank(self.output.scrape_dir.as_deref())
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

/// Load and parse a FaunaConfig from a TOML file. Returns default if file doesn't exist.
pub fn load_config(config_path: &Path) -> Result<FaunaConfig> {
    if !config_path.exists() {
        return Ok(FaunaConfig::default());
    }
    let content = fs::read_to_string(config_path)
        .with_context(|| format!("failed to read {}", config_path.display()))?;
    let parsed: FaunaConfig = toml::from_str(&content)
        .with_context(|| format!("failed to parse {}", config_path.display()))?;
    Ok(parsed)
}
