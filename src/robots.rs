use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use texting_robots::{Robot, get_robots_url};

use crate::error::HarvestError;

/// Answers whether a URL may be fetched under the target site's
/// robots-exclusion rules. Implementations fetch and evaluate the
/// robots.txt document on every call; verdicts are never cached.
pub trait PermissionGate: Send + Sync {
    fn can_fetch(&self, url: &str, robots_url: &str) -> Result<bool, HarvestError>;

    fn ensure_allowed(&self, url: &str, robots_url: &str) -> Result<(), HarvestError> {
        if self.can_fetch(url, robots_url)? {
            Ok(())
        } else {
            Err(HarvestError::PermissionDenied(url.to_string()))
        }
    }
}

pub struct RobotsGate {
    client: Client,
    user_agent: String,
}

impl RobotsGate {
    pub fn new(user_agent: &str) -> Result<Self, HarvestError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(user_agent)
                .map_err(|err| HarvestError::Connection(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|err| HarvestError::Connection(err.to_string()))?;
        Ok(Self {
            client,
            user_agent: user_agent.to_string(),
        })
    }
}

impl PermissionGate for RobotsGate {
    fn can_fetch(&self, url: &str, robots_url: &str) -> Result<bool, HarvestError> {
        let response = self
            .client
            .get(robots_url)
            .send()
            .map_err(|err| HarvestError::Connection(err.to_string()))?;

        let status = response.status();
        if status.is_client_error() {
            // No robots.txt published: everything is permitted.
            return Ok(true);
        }
        if !status.is_success() {
            let message = response
                .text()
                .unwrap_or_else(|_| "robots.txt request failed".to_string());
            return Err(HarvestError::HttpStatus {
                status: status.as_u16(),
                message,
            });
        }

        let body = response
            .text()
            .map_err(|err| HarvestError::Connection(err.to_string()))?;
        evaluate_robots(&body, &self.user_agent, url)
    }
}

/// Evaluate a robots.txt document: user-agent group matching with
/// longest-match Allow/Disallow precedence. An empty document permits
/// everything.
pub fn evaluate_robots(
    robots_txt: &str,
    user_agent: &str,
    url: &str,
) -> Result<bool, HarvestError> {
    let robot = Robot::new(user_agent, robots_txt.as_bytes())
        .map_err(|err| HarvestError::Robots(err.to_string()))?;
    Ok(robot.allowed(url))
}

/// robots.txt location for the origin serving `url`.
pub fn robots_url_for(url: &str) -> Result<String, HarvestError> {
    get_robots_url(url).map_err(|err| HarvestError::InvalidUrl(err.to_string()))
}
