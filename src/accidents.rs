use camino::Utf8Path;
use scraper::{Html, Selector};
use serde::Serialize;
use tracing::{info, warn};

use crate::config::HarvestConfig;
use crate::error::HarvestError;
use crate::fetch::{Fetch, path_basename, path_extension};
use crate::render::PageRenderer;
use crate::robots::{PermissionGate, robots_url_for};
use crate::throttle::Throttle;
use crate::workspace::Workspace;

/// One `li.resource-item` inside the dataset's resource listing.
const RESOURCE_ITEM_SELECTOR: &str = "section#dataset-resources ul.resource-list li.resource-item";

#[derive(Debug, Clone)]
pub struct ResourceLink {
    pub title: Option<String>,
    pub url: String,
    pub extension: String,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct AccidentsReport {
    pub links: usize,
    pub downloaded: usize,
    pub errors: usize,
}

/// Extract the CSV resources of the accident dataset page. Items without
/// a download anchor are skipped; extensions are matched case-insensitively.
pub fn extract_csv_resources(html: &str) -> Vec<ResourceLink> {
    let document = Html::parse_document(html);
    let item_selector = Selector::parse(RESOURCE_ITEM_SELECTOR).expect("valid selector");
    let heading_selector = Selector::parse("a.heading").expect("valid selector");
    let anchor_selector = Selector::parse("a.resource-url-analytics").expect("valid selector");

    let mut links = Vec::new();
    for item in document.select(&item_selector) {
        let title = item
            .select(&heading_selector)
            .next()
            .and_then(|heading| heading.value().attr("title"))
            .map(|title| title.trim().to_string());

        let Some(anchor) = item.select(&anchor_selector).next() else {
            continue;
        };
        let Some(href) = anchor.value().attr("href") else {
            continue;
        };
        let url = href.trim().to_string();
        let Some(extension) = path_extension(&url) else {
            continue;
        };
        if extension != "csv" {
            continue;
        }
        links.push(ResourceLink {
            title,
            url,
            extension,
        });
    }
    links
}

/// Fetch the accident dataset listing, then download every CSV resource.
/// Individual download failures are logged and counted without aborting
/// the batch; a robots denial aborts the whole pipeline.
pub fn run(
    config: &HarvestConfig,
    workspace: &Workspace,
    renderer: &dyn PageRenderer,
    gate: &dyn PermissionGate,
    fetcher: &dyn Fetch,
    throttle: &dyn Throttle,
) -> Result<AccidentsReport, HarvestError> {
    let listing_url = &config.accidents.listing_url;
    let robots_url = robots_url_for(listing_url)?;
    gate.ensure_allowed(listing_url, &robots_url)?;

    throttle.wait(config.page_delay);
    let html = renderer.render(listing_url)?;
    let snapshot = workspace.accidents_snapshot();
    workspace.write_snapshot(&snapshot, &html)?;
    info!(path = %snapshot, "accident listing snapshot saved");

    let links = extract_csv_resources(&html);
    info!(count = links.len(), "csv resources found");

    workspace.ensure_accidents_dir()?;
    let download_dir = workspace.accidents_dir();

    let mut downloaded = 0;
    let mut errors = 0;
    for link in &links {
        if let Some(title) = &link.title {
            info!(title = %title, url = %link.url, "resource");
        }
        match download_resource(link, &download_dir, config, gate, fetcher, throttle) {
            Ok(bytes) => {
                info!(url = %link.url, bytes, "downloaded");
                downloaded += 1;
            }
            Err(err @ HarvestError::PermissionDenied(_)) => return Err(err),
            Err(err) => {
                warn!(url = %link.url, error = %err, "download failed");
                errors += 1;
            }
        }
    }

    info!(total = links.len(), downloaded, errors, "accident batch finished");
    Ok(AccidentsReport {
        links: links.len(),
        downloaded,
        errors,
    })
}

fn download_resource(
    link: &ResourceLink,
    download_dir: &Utf8Path,
    config: &HarvestConfig,
    gate: &dyn PermissionGate,
    fetcher: &dyn Fetch,
    throttle: &dyn Throttle,
) -> Result<u64, HarvestError> {
    let robots_url = robots_url_for(&link.url)?;
    gate.ensure_allowed(&link.url, &robots_url)?;

    let filename = path_basename(&link.url)
        .ok_or_else(|| HarvestError::InvalidUrl(format!("no file name in {}", link.url)))?;
    let destination = download_dir.join(filename);

    throttle.wait(config.download_delay);
    fetcher.download(&link.url, destination.as_std_path())
}
