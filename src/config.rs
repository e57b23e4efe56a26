//! Runtime configuration: defaults, optional CONL file, CLI overrides

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use crate::types::Category;

pub const DEFAULT_BASE_URL: &str = "https://sn.coinafrique.com";
pub const DEFAULT_CONFIG_FILE: &str = "coinafrique.conl";

/// Shape of the optional CONL config file
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    base_url: Option<String>,
    user_agent: Option<String>,
    data_dir: Option<String>,
    #[serde(default)]
    page_caps: BTreeMap<String, u32>,
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Site root; category paths are appended to it
    pub base_url: String,
    /// Sent only when configured
    pub user_agent: Option<String>,
    /// Directory holding databases, exports and local CSV files
    pub data_dir: PathBuf,
    page_caps: HashMap<Category, u32>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            user_agent: None,
            data_dir: PathBuf::from("."),
            page_caps: HashMap::new(),
        }
    }
}

impl Config {
    /// Default settings rooted at `data_dir`
    pub fn with_data_dir(data_dir: PathBuf) -> Self {
        Self {
            data_dir,
            ..Self::default()
        }
    }

    /// Build the config from an optional CONL file, then apply the CLI data dir.
    ///
    /// With no explicit path the default file is read only when present.
    pub fn load(path: Option<&Path>, data_dir: Option<PathBuf>) -> Result<Self> {
        let mut config = match path {
            Some(p) => Self::load_from_path(p)?,
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                Self::load_from_path(Path::new(DEFAULT_CONFIG_FILE))?
            }
            None => Self::default(),
        };
        if let Some(dir) = data_dir {
            config.data_dir = dir;
        }
        Ok(config)
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_conl(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    fn from_conl(content: &str) -> Result<Self> {
        let file: ConfigFile = serde_conl::from_str(content)?;
        let mut config = Self::default();

        if let Some(url) = file.base_url {
            config.base_url = url.trim_end_matches('/').to_string();
        }
        config.user_agent = file.user_agent;
        if let Some(dir) = file.data_dir {
            config.data_dir = PathBuf::from(dir);
        }

        for (name, cap) in file.page_caps {
            let Some(category) = Category::from_str(&name) else {
                bail!("Unknown category '{}' in page_caps", name);
            };
            if cap == 0 {
                bail!("page_caps.{} must be at least 1", name);
            }
            config.page_caps.insert(category, cap);
        }

        Ok(config)
    }

    pub fn category_url(&self, category: Category) -> String {
        format!("{}{}", self.base_url, category.url_path())
    }

    pub fn page_cap(&self, category: Category) -> u32 {
        self.page_caps
            .get(&category)
            .copied()
            .unwrap_or_else(|| category.page_cap())
    }

    pub fn store_path(&self, category: Category) -> PathBuf {
        self.data_dir.join(category.store_file())
    }

    pub fn export_path(&self, category: Category) -> PathBuf {
        self.data_dir.join(category.export_file())
    }

    pub fn local_path(&self, category: Category) -> PathBuf {
        self.data_dir.join(category.local_file())
    }
}
