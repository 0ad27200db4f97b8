use serde::Serialize;
use tracing::info;

use crate::accidents::{self, AccidentsReport};
use crate::config::HarvestConfig;
use crate::error::HarvestError;
use crate::fetch::Fetch;
use crate::geometry::{self, GeometryReport};
use crate::organize::{OrganizeReport, organize_by_year};
use crate::render::PageRenderer;
use crate::robots::PermissionGate;
use crate::throttle::Throttle;
use crate::weather::{self, WeatherReport};
use crate::workspace::Workspace;

#[derive(Debug, Clone, Serialize)]
pub struct HarvestSummary {
    pub accidents: AccidentsReport,
    pub geometry: GeometryReport,
    pub weather: WeatherReport,
}

/// Runs the three source pipelines strictly in sequence, sharing one
/// configuration, one workspace and one set of collaborators.
pub struct Harvester<R: PageRenderer, G: PermissionGate, F: Fetch, T: Throttle> {
    config: HarvestConfig,
    workspace: Workspace,
    renderer: R,
    gate: G,
    fetcher: F,
    throttle: T,
}

impl<R: PageRenderer, G: PermissionGate, F: Fetch, T: Throttle> Harvester<R, G, F, T> {
    pub fn new(
        config: HarvestConfig,
        workspace: Workspace,
        renderer: R,
        gate: G,
        fetcher: F,
        throttle: T,
    ) -> Self {
        Self {
            config,
            workspace,
            renderer,
            gate,
            fetcher,
            throttle,
        }
    }

    pub fn run_all(&self) -> Result<HarvestSummary, HarvestError> {
        info!("starting accident pipeline");
        let accidents = self.run_accidents()?;
        info!("starting road-geometry pipeline");
        let geometry = self.run_geometry()?;
        info!("starting weather pipeline");
        let weather = self.run_weather()?;
        Ok(HarvestSummary {
            accidents,
            geometry,
            weather,
        })
    }

    pub fn run_accidents(&self) -> Result<AccidentsReport, HarvestError> {
        accidents::run(
            &self.config,
            &self.workspace,
            &self.renderer,
            &self.gate,
            &self.fetcher,
            &self.throttle,
        )
    }

    pub fn run_geometry(&self) -> Result<GeometryReport, HarvestError> {
        geometry::run(
            &self.config,
            &self.workspace,
            &self.renderer,
            &self.gate,
            &self.fetcher,
            &self.throttle,
        )
    }

    pub fn run_weather(&self) -> Result<WeatherReport, HarvestError> {
        weather::run(
            &self.config,
            &self.workspace,
            &self.gate,
            &self.fetcher,
            &self.throttle,
        )
    }

    /// Re-run only the year bucketing of already-extracted weather CSVs.
    pub fn organize_weather(&self) -> Result<OrganizeReport, HarvestError> {
        organize_by_year(&self.workspace.weather_dir())
    }
}
