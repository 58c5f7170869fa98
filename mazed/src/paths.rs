//! Cross-platform application paths

use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct AppPaths {
    data_dir: PathBuf,
}

impl AppPaths {
    pub fn new() -> Result<Self, String> {
        let data_dir = Self::get_data_dir()?;
        Self::at(&data_dir)
    }

    /// Use `dir` as the data directory, creating it if needed.
    pub fn at(dir: &Path) -> Result<Self, String> {
        fs::create_dir_all(dir)
            .map_err(|e| format!("Failed to create data directory {:?}: {}", dir, e))?;
        Ok(Self {
            data_dir: dir.to_path_buf(),
        })
    }

    fn get_data_dir() -> Result<PathBuf, String> {
        if let Ok(dir) = std::env::var("MAZE3D_DATA_DIR") {
            return Ok(PathBuf::from(dir));
        }
        let base = dirs::data_dir().ok_or("Could not determine data directory")?;
        Ok(base.join("maze3d"))
    }

    pub fn data_dir(&self) -> &PathBuf {
        &self.data_dir
    }

    pub fn config_file(&self) -> PathBuf {
        self.data_dir.join("config.json")
    }

    /// Q-network weights picked up when no path is configured.
    pub fn default_weights_file(&self) -> PathBuf {
        self.data_dir.join("policy.json")
    }
}
