use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use scraper::{Html, Selector};
use serde::Serialize;
use tracing::info;
use url::Url;

use crate::config::HarvestConfig;
use crate::error::HarvestError;
use crate::fetch::Fetch;
use crate::render::PageRenderer;
use crate::robots::{PermissionGate, robots_url_for};
use crate::throttle::Throttle;
use crate::workspace::Workspace;

const FILE_ROW_SELECTOR: &str = r#"tr[data-type="file"]"#;

/// Characters kept verbatim when re-encoding the share path; everything
/// else is percent-encoded, matching the unreserved set plus `/`.
const SHARE_PATH: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'/')
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// One file row of the share-folder listing.
#[derive(Debug, Clone)]
pub struct ShareFile {
    pub filename: String,
    pub size: String,
    pub modified: String,
    pub link: Url,
}

/// Release stamp encoded at fixed offsets of the file name: chars 0-3
/// year, 4-5 month, 6 version. Ordering is (year, month, version).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct FileStamp {
    pub year: u16,
    pub month: u8,
    pub version: char,
}

#[derive(Debug, Clone, Serialize)]
pub struct GeometryReport {
    pub files_seen: usize,
    pub latest: String,
    pub download_url: String,
    pub bytes: u64,
    pub path: String,
}

pub fn parse_stamp(filename: &str) -> Result<FileStamp, HarvestError> {
    let invalid = || HarvestError::InvalidFilename(filename.to_string());
    let year = filename
        .get(0..4)
        .and_then(|digits| digits.parse::<u16>().ok())
        .ok_or_else(invalid)?;
    let month = filename
        .get(4..6)
        .and_then(|digits| digits.parse::<u8>().ok())
        .ok_or_else(invalid)?;
    let version = filename.chars().nth(6).ok_or_else(invalid)?;
    Ok(FileStamp {
        year,
        month,
        version,
    })
}

/// Parse the share listing's file rows and keep the `.zip` entries.
/// Row links are resolved against the share host's origin.
pub fn extract_file_rows(html: &str, base_url: &str) -> Result<Vec<ShareFile>, HarvestError> {
    let base = Url::parse(base_url).map_err(|err| HarvestError::InvalidUrl(err.to_string()))?;

    let document = Html::parse_document(html);
    let row_selector = Selector::parse(FILE_ROW_SELECTOR).expect("valid selector");
    let size_selector = Selector::parse("td.filesize").expect("valid selector");
    let modified_selector = Selector::parse("span.modified").expect("valid selector");
    let name_selector = Selector::parse("a.name").expect("valid selector");

    let mut files = Vec::new();
    for row in document.select(&row_selector) {
        let Some(filename) = row.value().attr("data-file") else {
            continue;
        };
        if !filename.to_ascii_lowercase().ends_with(".zip") {
            continue;
        }
        let Some(href) = row
            .select(&name_selector)
            .next()
            .and_then(|anchor| anchor.value().attr("href"))
        else {
            continue;
        };
        let Ok(link) = base.join(href) else {
            continue;
        };
        let size = row
            .select(&size_selector)
            .next()
            .map(|cell| cell.text().collect::<String>().trim().to_string())
            .unwrap_or_default();
        let modified = row
            .select(&modified_selector)
            .next()
            .map(|cell| cell.text().collect::<String>().trim().to_string())
            .unwrap_or_default();

        files.push(ShareFile {
            filename: filename.to_string(),
            size,
            modified,
            link,
        });
    }
    Ok(files)
}

/// Most recent file by descending (year, month, version). Fails on an
/// empty listing and on any file name the stamp cannot be read from.
pub fn select_latest(files: &[ShareFile]) -> Result<(&ShareFile, FileStamp), HarvestError> {
    let mut latest: Option<(&ShareFile, FileStamp)> = None;
    for file in files {
        let stamp = parse_stamp(&file.filename)?;
        let newer = match latest {
            Some((_, best)) => stamp > best,
            None => true,
        };
        if newer {
            latest = Some((file, stamp));
        }
    }
    latest.ok_or_else(|| HarvestError::EmptyListing("no zip files in share listing".to_string()))
}

/// The row link opens the share-folder viewer, not the file. Rebuild a
/// direct download URL by appending the file name to the share's folder
/// path and substituting the re-encoded result as the `path` parameter.
pub fn rebuild_download_url(link: &Url, filename: &str) -> Result<String, HarvestError> {
    let folder = link
        .query_pairs()
        .find(|(key, _)| key == "path")
        .map(|(_, value)| value.into_owned())
        .ok_or_else(|| {
            HarvestError::InvalidUrl(format!("share link has no path parameter: {link}"))
        })?;

    let full_path = format!("{folder}/{filename}");
    let encoded = utf8_percent_encode(&full_path, SHARE_PATH).to_string();
    Ok(format!(
        "{}{}?path={}",
        link.origin().ascii_serialization(),
        link.path(),
        encoded
    ))
}

/// Drive the share listing until all rows are loaded, pick the most
/// recent geometry archive and download it.
pub fn run(
    config: &HarvestConfig,
    workspace: &Workspace,
    renderer: &dyn PageRenderer,
    gate: &dyn PermissionGate,
    fetcher: &dyn Fetch,
    throttle: &dyn Throttle,
) -> Result<GeometryReport, HarvestError> {
    throttle.wait(config.page_delay);
    let html = renderer.render_scrolled(&config.geometry.listing_url, &config.geometry.scroll)?;
    let snapshot = workspace.geometry_snapshot();
    workspace.write_snapshot(&snapshot, &html)?;
    info!(path = %snapshot, "share listing snapshot saved");

    let files = extract_file_rows(&html, &config.geometry.base_url)?;
    info!(count = files.len(), "zip files in share listing");
    for file in &files {
        info!(file = %file.filename, size = %file.size, modified = %file.modified, "share entry");
    }

    let (latest, stamp) = select_latest(&files)?;
    info!(
        file = %latest.filename,
        year = stamp.year,
        month = stamp.month,
        version = %stamp.version,
        "latest geometry archive"
    );

    let download_url = rebuild_download_url(&latest.link, &latest.filename)?;
    let robots_url = robots_url_for(&download_url)?;
    gate.ensure_allowed(&download_url, &robots_url)?;

    workspace.ensure_geometry_dir()?;
    let destination = workspace.geometry_dir().join(&latest.filename);

    throttle.wait(config.download_delay);
    let bytes = fetcher.download(&download_url, destination.as_std_path())?;
    info!(path = %destination, bytes, "geometry archive saved");

    Ok(GeometryReport {
        files_seen: files.len(),
        latest: latest.filename.clone(),
        download_url,
        bytes,
        path: destination.to_string(),
    })
}
