use std::time::Duration;

use reqwest::blocking::Client;
use tracing::info;

use crate::error::HarvestError;

/// How to drive a lazily-loading listing until every row is visible:
/// scroll the last row into view, wait `settle`, and stop once the row
/// count has been unchanged for `stable_rounds` consecutive iterations,
/// then wait `final_wait` before capturing markup.
#[derive(Debug, Clone)]
pub struct ScrollPlan {
    pub row_selector: String,
    pub settle: Duration,
    pub stable_rounds: u32,
    pub final_wait: Duration,
}

/// Renders JavaScript-heavy pages to final HTML. The production
/// implementation talks to a Browserless-compatible service; tests
/// substitute fixture markup.
pub trait PageRenderer: Send + Sync {
    /// Full page HTML once network activity has settled.
    fn render(&self, url: &str) -> Result<String, HarvestError>;
    /// Full page HTML after executing the scroll-until-stable protocol.
    fn render_scrolled(&self, url: &str, plan: &ScrollPlan) -> Result<String, HarvestError>;
}

pub struct BrowserlessRenderer {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl BrowserlessRenderer {
    pub fn new(base_url: &str, token: Option<&str>) -> Result<Self, HarvestError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(300))
            .build()
            .map_err(|err| HarvestError::Connection(err.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.map(String::from),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        let mut endpoint = format!("{}/{path}", self.base_url);
        if let Some(token) = &self.token {
            endpoint.push_str(&format!("?token={token}"));
        }
        endpoint
    }

    fn read_body(response: reqwest::blocking::Response) -> Result<String, HarvestError> {
        let status = response.status();
        if !status.is_success() {
            let message = response.text().unwrap_or_default();
            return Err(HarvestError::Render(format!(
                "renderer returned status {}: {message}",
                status.as_u16()
            )));
        }
        response
            .text()
            .map_err(|err| HarvestError::Connection(err.to_string()))
    }
}

impl PageRenderer for BrowserlessRenderer {
    fn render(&self, url: &str) -> Result<String, HarvestError> {
        info!(url, "rendering page");
        let body = serde_json::json!({
            "url": url,
            "gotoOptions": { "waitUntil": "networkidle2", "timeout": 120_000 },
        });
        let response = self
            .client
            .post(self.endpoint("content"))
            .json(&body)
            .send()
            .map_err(|err| HarvestError::Connection(err.to_string()))?;
        let html = Self::read_body(response)?;
        info!(url, bytes = html.len(), "page rendered");
        Ok(html)
    }

    fn render_scrolled(&self, url: &str, plan: &ScrollPlan) -> Result<String, HarvestError> {
        info!(url, selector = %plan.row_selector, "rendering page with scroll");
        let script = scroll_script(url, plan);
        let response = self
            .client
            .post(self.endpoint("function"))
            .header("Content-Type", "application/javascript")
            .body(script)
            .send()
            .map_err(|err| HarvestError::Connection(err.to_string()))?;
        let html = Self::read_body(response)?;
        info!(url, bytes = html.len(), "page rendered");
        Ok(html)
    }
}

/// Script executed inside the rendering service for `render_scrolled`.
/// The row count is server-controlled and unknown up front, so the loop
/// terminates on the count debounce rather than a fixed iteration budget.
fn scroll_script(url: &str, plan: &ScrollPlan) -> String {
    let url = serde_json::Value::String(url.to_string());
    let selector = serde_json::Value::String(plan.row_selector.clone());
    format!(
        r#"export default async function ({{ page }}) {{
  await page.goto({url}, {{ waitUntil: "networkidle2", timeout: 120000 }});
  let previous = 0;
  let stable = 0;
  while (stable < {stable_rounds}) {{
    const rows = await page.$$({selector});
    if (rows.length > 0) {{
      await rows[rows.length - 1].scrollIntoView();
    }}
    await new Promise((resolve) => setTimeout(resolve, {settle_ms}));
    const count = (await page.$$({selector})).length;
    stable = count === previous ? stable + 1 : 0;
    previous = count;
  }}
  await new Promise((resolve) => setTimeout(resolve, {final_ms}));
  const html = await page.content();
  return {{ data: html, type: "text/html" }};
}}
"#,
        stable_rounds = plan.stable_rounds,
        settle_ms = plan.settle.as_millis(),
        final_ms = plan.final_wait.as_millis(),
    )
}
