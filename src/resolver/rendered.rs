//! Resolver for pages whose download buttons only exist after scripts run

use super::traits::{ElementHandle, LinkResolver, Locator, RenderSession, Renderer};
use crate::config::ResolverConfig;
use crate::error::{Error, Result};
use crate::types::ResolvedDownload;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Loads the link in a browser and collects every download button on the page
///
/// Each button's href becomes the download URL, and the text of the closest
/// `<p>` before it becomes the filename. Buttons without an href are skipped.
/// If no button becomes clickable within the timeout the page yields nothing.
///
/// The browser session is closed on every path out of [`LinkResolver::resolve`].
pub struct RenderedResolver {
    renderer: Arc<dyn Renderer>,
    locator: Locator,
    timeout: Duration,
}

impl RenderedResolver {
    /// Create a resolver that looks for links containing `download_text`
    pub fn new(renderer: Arc<dyn Renderer>, download_text: impl Into<String>, timeout: Duration) -> Self {
        Self {
            renderer,
            locator: Locator::PartialLinkText(download_text.into()),
            timeout,
        }
    }

    /// Create a resolver from configuration
    pub fn from_config(renderer: Arc<dyn Renderer>, config: &ResolverConfig) -> Self {
        Self::new(renderer, config.download_text.clone(), config.render_timeout)
    }

    async fn collect(
        &self,
        session: &mut dyn RenderSession,
        url: &str,
    ) -> Result<Vec<ResolvedDownload>> {
        session.open_page(url).await?;
        session
            .wait_until_clickable(&self.locator, self.timeout)
            .await?;

        let buttons = session.find_elements(&self.locator).await?;
        debug!(url = %url, count = buttons.len(), "Found download buttons");

        let mut downloads = Vec::with_capacity(buttons.len());
        for button in &buttons {
            match self.describe(session, button, url).await {
                Ok(Some(download)) => downloads.push(download),
                Ok(None) => {}
                Err(e) => {
                    warn!(url = %url, element = %button.0, error = %e, "Skipping unreadable download button");
                }
            }
        }
        Ok(downloads)
    }

    async fn describe(
        &self,
        session: &mut dyn RenderSession,
        button: &ElementHandle,
        page_url: &str,
    ) -> Result<Option<ResolvedDownload>> {
        let href = match session.attribute(button, "href").await? {
            Some(href) if !href.trim().is_empty() => href,
            _ => {
                warn!(url = %page_url, element = %button.0, "Download button has no href, skipping");
                return Ok(None);
            }
        };

        let filename = match session.nearest_preceding(button, "p").await? {
            Some(paragraph) => {
                let text = session.text(&paragraph).await?;
                text.lines()
                    .map(str::trim)
                    .find(|line| !line.is_empty())
                    .map(String::from)
            }
            None => None,
        };
        if filename.is_none() {
            debug!(url = %page_url, element = %button.0, "No preceding paragraph, fetcher will name the file");
        }

        Ok(Some(ResolvedDownload {
            filename,
            url: absolutize(page_url, href.trim()),
        }))
    }
}

/// Resolve a possibly relative href against the page it came from
fn absolutize(page_url: &str, href: &str) -> String {
    url::Url::parse(page_url)
        .and_then(|base| base.join(href))
        .map(|u| u.to_string())
        .unwrap_or_else(|_| href.to_string())
}

#[async_trait]
impl LinkResolver for RenderedResolver {
    async fn resolve(&self, url: &str) -> Result<Vec<ResolvedDownload>> {
        let mut session = self.renderer.open_session().await?;

        let outcome = self.collect(session.as_mut(), url).await;

        if let Err(e) = session.close().await {
            warn!(url = %url, error = %e, "Failed to close browser session");
        }

        match outcome {
            Ok(downloads) => {
                info!(url = %url, count = downloads.len(), "Resolved rendered page");
                Ok(downloads)
            }
            Err(Error::RenderTimeout { selector, timeout }) => {
                warn!(
                    url = %url,
                    selector = %selector,
                    ?timeout,
                    "No clickable download element appeared, page yields nothing"
                );
                Ok(Vec::new())
            }
            Err(e) => Err(e),
        }
    }

    fn name(&self) -> &'static str {
        "rendered"
    }
}
