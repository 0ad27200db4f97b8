use std::fs::File;
use std::io;
use std::path::Path;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, HeaderMap, HeaderValue, USER_AGENT};
use url::Url;

use crate::error::HarvestError;

pub trait Fetch: Send + Sync {
    /// Plain GET of a listing page, returning the body as text.
    fn fetch_page(&self, url: &str) -> Result<String, HarvestError>;
    /// GET a file and stream the body to `destination` in fixed-size
    /// chunks. Returns the number of bytes written.
    fn download(&self, url: &str, destination: &Path) -> Result<u64, HarvestError>;
}

pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(user_agent: &str) -> Result<Self, HarvestError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(user_agent)
                .map_err(|err| HarvestError::Connection(err.to_string()))?,
        );
        headers.insert(
            ACCEPT,
            HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            ),
        );
        headers.insert(
            ACCEPT_LANGUAGE,
            HeaderValue::from_static("pt-BR,pt;q=0.9,en-US;q=0.8,en;q=0.7"),
        );

        let client = Client::builder()
            .default_headers(headers)
            .connect_timeout(Duration::from_secs(30))
            .timeout(Duration::from_secs(600))
            .build()
            .map_err(|err| HarvestError::Connection(err.to_string()))?;

        Ok(Self { client })
    }

    fn handle_status(
        response: reqwest::blocking::Response,
    ) -> Result<reqwest::blocking::Response, HarvestError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let message = response
            .text()
            .unwrap_or_else(|_| "request failed".to_string());
        Err(HarvestError::HttpStatus { status, message })
    }
}

impl Fetch for HttpFetcher {
    fn fetch_page(&self, url: &str) -> Result<String, HarvestError> {
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|err| HarvestError::Connection(err.to_string()))?;
        let response = Self::handle_status(response)?;
        response
            .text()
            .map_err(|err| HarvestError::Connection(err.to_string()))
    }

    fn download(&self, url: &str, destination: &Path) -> Result<u64, HarvestError> {
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|err| HarvestError::Connection(err.to_string()))?;
        let mut response = Self::handle_status(response)?;
        let mut file = File::create(destination).map_err(|err| {
            HarvestError::Filesystem(format!("create {}: {err}", destination.display()))
        })?;
        io::copy(&mut response, &mut file)
            .map_err(|err| HarvestError::Filesystem(err.to_string()))
    }
}

/// Lower-cased extension of a link's path component, ignoring query and
/// fragment. Works on both absolute URLs and relative hrefs.
pub fn path_extension(link: &str) -> Option<String> {
    let path = match Url::parse(link) {
        Ok(url) => url.path().to_string(),
        Err(_) => link.split(['?', '#']).next().unwrap_or("").to_string(),
    };
    let name = path.rsplit('/').next()?;
    let (stem, ext) = name.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// Final path segment of a link, used to name downloaded files.
pub fn path_basename(link: &str) -> Option<String> {
    let path = match Url::parse(link) {
        Ok(url) => url.path().to_string(),
        Err(_) => link.split(['?', '#']).next().unwrap_or("").to_string(),
    };
    let name = path.rsplit('/').next()?;
    if name.is_empty() {
        return None;
    }
    Some(name.to_string())
}
