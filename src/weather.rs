use std::fs;

use camino::Utf8Path;
use scraper::{Html, Selector};
use serde::Serialize;
use tracing::{info, warn};
use url::Url;

use crate::archive::extract_zip;
use crate::config::HarvestConfig;
use crate::error::HarvestError;
use crate::fetch::{Fetch, path_basename, path_extension};
use crate::organize::{OrganizeReport, organize_by_year};
use crate::robots::{PermissionGate, robots_url_for};
use crate::throttle::Throttle;
use crate::workspace::Workspace;

/// One yearly archive advertised on the historical-data page. The year
/// is taken from anchor text shaped like "ANO 2000 (AUTOMÁTICA)" and is
/// informational only; filtering is by link extension.
#[derive(Debug, Clone)]
pub struct YearLink {
    pub year: Option<u16>,
    pub href: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct WeatherReport {
    pub years: usize,
    pub processed: usize,
    pub errors: usize,
    pub organize: OrganizeReport,
}

/// Extract the first anchor of each article preview, keeping `zip` links.
pub fn extract_year_links(html: &str) -> Vec<YearLink> {
    let document = Html::parse_document(html);
    let article_selector = Selector::parse("article.post-preview").expect("valid selector");
    let anchor_selector = Selector::parse("a").expect("valid selector");

    let mut links = Vec::new();
    for article in document.select(&article_selector) {
        let Some(anchor) = article.select(&anchor_selector).next() else {
            continue;
        };
        let Some(href) = anchor.value().attr("href") else {
            continue;
        };
        let href = href.trim().to_string();
        if path_extension(&href).as_deref() != Some("zip") {
            continue;
        }
        let text = anchor.text().collect::<String>();
        let year = text
            .split_whitespace()
            .nth(1)
            .and_then(|token| token.parse::<u16>().ok());
        links.push(YearLink { year, href });
    }
    links
}

/// Fetch the historical-data listing, then download, extract and delete
/// each yearly archive, isolating failures per year. Finally bucket the
/// extracted CSVs into per-year subdirectories.
pub fn run(
    config: &HarvestConfig,
    workspace: &Workspace,
    gate: &dyn PermissionGate,
    fetcher: &dyn Fetch,
    throttle: &dyn Throttle,
) -> Result<WeatherReport, HarvestError> {
    let listing_url = resolve_href(&config.weather.base_url, &config.weather.listing_path)?;
    let robots_url = robots_url_for(&listing_url)?;
    gate.ensure_allowed(&listing_url, &robots_url)?;

    throttle.wait(config.page_delay);
    let html = fetcher.fetch_page(&listing_url)?;
    let snapshot = workspace.weather_snapshot();
    workspace.write_snapshot(&snapshot, &html)?;
    info!(path = %snapshot, "historical-data snapshot saved");

    let links = extract_year_links(&html);
    info!(count = links.len(), "yearly archives listed");

    workspace.ensure_weather_dir()?;
    let working_dir = workspace.weather_dir();

    let mut processed = 0;
    let mut errors = 0;
    for link in &links {
        match process_year(link, &working_dir, config, gate, fetcher, throttle) {
            Ok(()) => processed += 1,
            Err(err) => {
                warn!(href = %link.href, year = link.year, error = %err, "year archive failed");
                errors += 1;
            }
        }
    }

    let organize = organize_by_year(&working_dir)?;
    info!(
        total = links.len(),
        processed,
        errors,
        moved = organize.moved,
        "weather batch finished"
    );

    Ok(WeatherReport {
        years: links.len(),
        processed,
        errors,
        organize,
    })
}

fn process_year(
    link: &YearLink,
    working_dir: &Utf8Path,
    config: &HarvestConfig,
    gate: &dyn PermissionGate,
    fetcher: &dyn Fetch,
    throttle: &dyn Throttle,
) -> Result<(), HarvestError> {
    let zip_url = if link.href.starts_with("http://") || link.href.starts_with("https://") {
        link.href.clone()
    } else {
        resolve_href(&config.weather.base_url, &link.href)?
    };

    let robots_url = robots_url_for(&zip_url)?;
    gate.ensure_allowed(&zip_url, &robots_url)?;

    let filename = path_basename(&zip_url)
        .ok_or_else(|| HarvestError::InvalidUrl(format!("no file name in {zip_url}")))?;
    let local_zip = working_dir.join(filename);

    throttle.wait(config.download_delay);
    let bytes = fetcher.download(&zip_url, local_zip.as_std_path())?;
    info!(url = %zip_url, bytes, "archive downloaded");

    extract_zip(local_zip.as_std_path(), working_dir.as_std_path())?;

    if let Err(err) = fs::remove_file(local_zip.as_std_path()) {
        warn!(path = %local_zip, error = %err, "could not remove archive");
    }
    Ok(())
}

fn resolve_href(base_url: &str, href: &str) -> Result<String, HarvestError> {
    let base = Url::parse(base_url).map_err(|err| HarvestError::InvalidUrl(err.to_string()))?;
    let resolved = base
        .join(href)
        .map_err(|err| HarvestError::InvalidUrl(err.to_string()))?;
    Ok(resolved.to_string())
}
