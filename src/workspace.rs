use std::fs;

use camino::{Utf8Path, Utf8PathBuf};

use crate::error::HarvestError;

/// Path authority for everything the harvester writes: one root directory
/// holding per-pipeline download directories and the raw HTML snapshots
/// that hand pages from the fetch step to the parse step.
#[derive(Debug, Clone)]
pub struct Workspace {
    root: Utf8PathBuf,
}

impl Workspace {
    pub fn new() -> Result<Self, HarvestError> {
        let cwd =
            std::env::current_dir().map_err(|err| HarvestError::Filesystem(err.to_string()))?;
        let root = Utf8PathBuf::from_path_buf(cwd.join("data"))
            .map_err(|_| HarvestError::Filesystem("invalid data path".to_string()))?;
        Ok(Self { root })
    }

    pub fn with_root(root: Utf8PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    pub fn accidents_snapshot(&self) -> Utf8PathBuf {
        self.root.join("acidentes.html")
    }

    pub fn accidents_dir(&self) -> Utf8PathBuf {
        self.root.join("acidentes")
    }

    pub fn geometry_snapshot(&self) -> Utf8PathBuf {
        self.root.join("geo_rod.html")
    }

    pub fn geometry_dir(&self) -> Utf8PathBuf {
        self.root.join("geoloc")
    }

    pub fn weather_snapshot(&self) -> Utf8PathBuf {
        self.root.join("meteorologicos.html")
    }

    pub fn weather_dir(&self) -> Utf8PathBuf {
        self.root.join("meteorologia")
    }

    pub fn ensure_root(&self) -> Result<(), HarvestError> {
        ensure_dir(&self.root)
    }

    pub fn ensure_accidents_dir(&self) -> Result<(), HarvestError> {
        ensure_dir(&self.accidents_dir())
    }

    pub fn ensure_geometry_dir(&self) -> Result<(), HarvestError> {
        ensure_dir(&self.geometry_dir())
    }

    pub fn ensure_weather_dir(&self) -> Result<(), HarvestError> {
        ensure_dir(&self.weather_dir())
    }

    pub fn write_snapshot(&self, path: &Utf8Path, html: &str) -> Result<(), HarvestError> {
        self.ensure_root()?;
        fs::write(path.as_std_path(), html)
            .map_err(|err| HarvestError::Filesystem(format!("write {path}: {err}")))
    }
}

fn ensure_dir(path: &Utf8Path) -> Result<(), HarvestError> {
    fs::create_dir_all(path.as_std_path())
        .map_err(|err| HarvestError::Filesystem(format!("create {path}: {err}")))
}
