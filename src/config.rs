use std::time::Duration;

use crate::render::ScrollPlan;

/// Every parameter of a harvest run. There is no config file and no
/// environment lookup; pipelines receive this value at construction.
#[derive(Debug, Clone)]
pub struct HarvestConfig {
    pub user_agent: String,
    /// Base URL of the headless-browser rendering service.
    pub renderer_endpoint: String,
    /// Delay applied before every listing-page fetch or render.
    pub page_delay: Duration,
    /// Delay applied before every file download.
    pub download_delay: Duration,
    pub accidents: AccidentsConfig,
    pub geometry: GeometryConfig,
    pub weather: WeatherConfig,
}

#[derive(Debug, Clone)]
pub struct AccidentsConfig {
    pub listing_url: String,
}

#[derive(Debug, Clone)]
pub struct GeometryConfig {
    pub listing_url: String,
    /// Origin the share viewer's row links are resolved against.
    pub base_url: String,
    pub scroll: ScrollPlan,
}

#[derive(Debug, Clone)]
pub struct WeatherConfig {
    pub base_url: String,
    pub listing_path: String,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            user_agent: format!(
                "rodovia-harvester/{} (mailto:contato@rodovia-harvester.dev)",
                env!("CARGO_PKG_VERSION")
            ),
            renderer_endpoint: "http://127.0.0.1:3000".to_string(),
            page_delay: Duration::from_secs(2),
            download_delay: Duration::from_secs(11),
            accidents: AccidentsConfig {
                listing_url: "https://dados.antt.gov.br/dataset/acidentes-rodovias".to_string(),
            },
            geometry: GeometryConfig {
                listing_url: "https://servicos.dnit.gov.br/dnitcloud/index.php/s/oTpPRmYs5AAdiNr?path=%2FSNV%20Bases%20Geom%C3%A9tricas%20(2013-Atual)%20(SHP)"
                    .to_string(),
                base_url: "https://servicos.dnit.gov.br".to_string(),
                scroll: ScrollPlan {
                    row_selector: "tr[data-type='file']".to_string(),
                    settle: Duration::from_secs(3),
                    stable_rounds: 2,
                    final_wait: Duration::from_secs(5),
                },
            },
            weather: WeatherConfig {
                base_url: "https://portal.inmet.gov.br".to_string(),
                listing_path: "/dadoshistoricos".to_string(),
            },
        }
    }
}
