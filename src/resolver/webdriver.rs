//! Browser rendering through a W3C WebDriver endpoint
//!
//! Talks the WebDriver wire protocol (JSON over HTTP) to chromedriver,
//! geckodriver, or a Selenium server. Only the handful of commands the
//! rendered resolver needs are implemented.

use super::traits::{ElementHandle, Locator, RenderSession, Renderer};
use crate::config::ResolverConfig;
use crate::error::{Error, Result};
use async_trait::async_trait;
use reqwest::Method;
use serde::Deserialize;
use serde_json::{Value, json};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Key the W3C protocol uses for element references in JSON
const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";

/// How often to re-check for a clickable element while waiting
const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Timeout for individual WebDriver commands
const COMMAND_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Deserialize)]
struct Envelope {
    value: Value,
}

#[derive(Debug, Deserialize)]
struct NewSession {
    #[serde(rename = "sessionId")]
    session_id: String,
}

/// Starts browser sessions on a WebDriver server
#[derive(Debug, Clone)]
pub struct WebDriverRenderer {
    client: reqwest::Client,
    base_url: String,
    headless: bool,
}

impl WebDriverRenderer {
    /// Create a renderer for the WebDriver server at `base_url`
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be created
    pub fn new(base_url: impl Into<String>, headless: bool) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(COMMAND_TIMEOUT)
            .build()
            .map_err(|e| Error::Other(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            headless,
        })
    }

    /// Create a renderer from configuration
    pub fn from_config(config: &ResolverConfig) -> Result<Self> {
        Self::new(config.webdriver_url.clone(), config.headless)
    }

    fn capabilities(&self) -> Value {
        let (chrome_args, firefox_args): (Vec<&str>, Vec<&str>) = if self.headless {
            (vec!["--headless=new", "--disable-gpu"], vec!["-headless"])
        } else {
            (vec![], vec![])
        };
        json!({
            "capabilities": {
                "alwaysMatch": {
                    "goog:chromeOptions": { "args": chrome_args },
                    "moz:firefoxOptions": { "args": firefox_args }
                }
            }
        })
    }
}

#[async_trait]
impl Renderer for WebDriverRenderer {
    async fn open_session(&self) -> Result<Box<dyn RenderSession>> {
        let url = format!("{}/session", self.base_url);
        let value = send(&self.client, Method::POST, &url, Some(self.capabilities())).await?;
        let created: NewSession = serde_json::from_value(value)?;
        debug!(session = %created.session_id, "Browser session started");

        Ok(Box::new(WebDriverSession {
            client: self.client.clone(),
            session_url: format!("{}/session/{}", self.base_url, created.session_id),
            closed: false,
        }))
    }

    fn name(&self) -> &'static str {
        "webdriver"
    }
}

/// Issue one WebDriver command and unwrap its `value`
async fn send(
    client: &reqwest::Client,
    method: Method,
    url: &str,
    body: Option<Value>,
) -> Result<Value> {
    let mut request = client.request(method.clone(), url);
    if let Some(body) = body {
        request = request.json(&body);
    } else if method == Method::POST {
        request = request.json(&json!({}));
    }

    let response = request
        .send()
        .await
        .map_err(|e| Error::Render(format!("WebDriver request to {url} failed: {e}")))?;

    let status = response.status();
    let envelope: Envelope = response
        .json()
        .await
        .map_err(|e| Error::Render(format!("WebDriver returned unreadable body ({status}): {e}")))?;

    if !status.is_success() {
        let code = envelope.value["error"].as_str().unwrap_or("unknown error");
        let message = envelope.value["message"].as_str().unwrap_or("");
        return Err(Error::Render(format!(
            "WebDriver returned HTTP {}: {}: {}",
            status.as_u16(),
            code,
            message
        )));
    }

    Ok(envelope.value)
}

fn element_handles(value: &Value) -> Result<Vec<ElementHandle>> {
    let items = value
        .as_array()
        .ok_or_else(|| Error::Render("expected a list of elements".into()))?;
    items
        .iter()
        .map(|item| {
            item[ELEMENT_KEY]
                .as_str()
                .map(|id| ElementHandle(id.to_string()))
                .ok_or_else(|| Error::Render("element reference missing from response".into()))
        })
        .collect()
}

fn locator_body(locator: &Locator) -> Value {
    let (using, value) = locator.strategy();
    json!({ "using": using, "value": value })
}

/// A live WebDriver session
///
/// Dropping a session that was never closed schedules a best-effort DELETE on
/// the current Tokio runtime.
pub struct WebDriverSession {
    client: reqwest::Client,
    session_url: String,
    closed: bool,
}

impl WebDriverSession {
    async fn command(&self, method: Method, path: &str, body: Option<Value>) -> Result<Value> {
        let url = format!("{}{}", self.session_url, path);
        send(&self.client, method, &url, body).await
    }

    async fn is_clickable(&self, element: &ElementHandle) -> Result<bool> {
        let displayed = self
            .command(Method::GET, &format!("/element/{}/displayed", element.0), None)
            .await?;
        if displayed != Value::Bool(true) {
            return Ok(false);
        }
        let enabled = self
            .command(Method::GET, &format!("/element/{}/enabled", element.0), None)
            .await?;
        Ok(enabled == Value::Bool(true))
    }

    async fn poll_clickable(&mut self, locator: &Locator) -> Result<ElementHandle> {
        loop {
            for element in self.find_elements(locator).await? {
                // Elements can go stale between lookup and inspection
                if self.is_clickable(&element).await.unwrap_or(false) {
                    return Ok(element);
                }
            }
            sleep(POLL_INTERVAL).await;
        }
    }
}

#[async_trait]
impl RenderSession for WebDriverSession {
    async fn open_page(&mut self, url: &str) -> Result<()> {
        debug!(url = %url, "Loading page in browser");
        self.command(Method::POST, "/url", Some(json!({ "url": url })))
            .await?;
        Ok(())
    }

    async fn wait_until_clickable(
        &mut self,
        locator: &Locator,
        timeout: Duration,
    ) -> Result<ElementHandle> {
        // The bound covers slow WebDriver commands as well as the polling
        match tokio::time::timeout(timeout, self.poll_clickable(locator)).await {
            Ok(result) => result,
            Err(_) => Err(Error::RenderTimeout {
                selector: locator.value().to_string(),
                timeout,
            }),
        }
    }

    async fn find_elements(&mut self, locator: &Locator) -> Result<Vec<ElementHandle>> {
        let value = self
            .command(Method::POST, "/elements", Some(locator_body(locator)))
            .await?;
        element_handles(&value)
    }

    async fn attribute(&mut self, element: &ElementHandle, name: &str) -> Result<Option<String>> {
        let value = self
            .command(
                Method::GET,
                &format!("/element/{}/attribute/{}", element.0, name),
                None,
            )
            .await?;
        Ok(value.as_str().map(String::from))
    }

    async fn nearest_preceding(
        &mut self,
        element: &ElementHandle,
        tag: &str,
    ) -> Result<Option<ElementHandle>> {
        let locator = Locator::XPath(format!("./preceding::{tag}[1]"));
        let value = self
            .command(
                Method::POST,
                &format!("/element/{}/elements", element.0),
                Some(locator_body(&locator)),
            )
            .await?;
        Ok(element_handles(&value)?.into_iter().next())
    }

    async fn text(&mut self, element: &ElementHandle) -> Result<String> {
        let value = self
            .command(Method::GET, &format!("/element/{}/text", element.0), None)
            .await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    async fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.command(Method::DELETE, "", None).await?;
        debug!(session = %self.session_url, "Browser session closed");
        Ok(())
    }
}

impl Drop for WebDriverSession {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        warn!(session = %self.session_url, "Browser session dropped without close, deleting in background");
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            let client = self.client.clone();
            let url = self.session_url.clone();
            handle.spawn(async move {
                let _ = client.delete(&url).send().await;
            });
        }
    }
}
