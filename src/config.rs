use std::path::PathBuf;

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub backend: BackendConfig,
    pub store: StoreConfig,
    pub repl: ReplConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Container-control binary invoked for every operation.
    pub binary: String,
    /// Image used by `init` when none is given on the command line.
    pub default_image: String,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            binary: "lxc".into(),
            default_image: "ubuntu:22.04".into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct StoreConfig {
    /// Staging directory for push/pull; defaults to `~/.vmsh/files`.
    pub dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReplConfig {
    pub prompt: String,
}

impl Default for ReplConfig {
    fn default() -> Self {
        Self {
            prompt: "vm> ".into(),
        }
    }
}

impl Config {
    pub fn vmsh_dir() -> PathBuf {
        dirs::home_dir()
            .expect("Could not determine home directory")
            .join(".vmsh")
    }

    pub fn path() -> PathBuf {
        Self::vmsh_dir().join("config.toml")
    }

    pub fn load() -> anyhow::Result<Self> {
        let path = Self::path();
        if !path.exists() {
            tracing::debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(&path)?;
        Ok(toml::from_str(&content)?)
    }

    pub fn file_store_dir(&self) -> PathBuf {
        self.store
            .dir
            .clone()
            .unwrap_or_else(|| Self::vmsh_dir().join("files"))
    }

    /// The staging directory, created on demand before any transfer uses it.
    pub fn ensure_file_store(&self) -> std::io::Result<PathBuf> {
        let dir = self.file_store_dir();
        std::fs::create_dir_all(&dir)?;
        Ok(dir)
    }
}
