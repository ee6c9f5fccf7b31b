//! Traits and types for link resolution and page rendering

use crate::error::Result;
use crate::types::ResolvedDownload;
use async_trait::async_trait;
use std::time::Duration;

/// Turns an extracted link into concrete downloads
///
/// # Examples
///
/// ```
/// use inbox_dl::resolver::{DirectResolver, LinkResolver};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let resolver = DirectResolver;
/// let downloads = resolver.resolve("https://example.com/files/report.zip").await?;
///
/// assert_eq!(downloads.len(), 1);
/// assert_eq!(downloads[0].filename.as_deref(), Some("report.zip"));
/// # Ok(())
/// # }
/// ```
#[async_trait]
pub trait LinkResolver: Send + Sync {
    /// Resolve a URL to zero or more (filename, URL) pairs
    ///
    /// # Errors
    ///
    /// Implementations return errors for failures that say nothing about the
    /// page itself (browser unreachable, session refused). A page that simply
    /// has no download buttons resolves to an empty list.
    async fn resolve(&self, url: &str) -> Result<Vec<ResolvedDownload>>;

    /// Name of this resolver implementation, for logging
    fn name(&self) -> &'static str;
}

/// How to find elements on a rendered page
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Locator {
    /// Links whose visible text contains the given string (case-sensitive)
    PartialLinkText(String),
    /// CSS selector
    Css(String),
    /// XPath expression, evaluated relative to the search root
    XPath(String),
}

impl Locator {
    /// WebDriver locator strategy name and value
    pub fn strategy(&self) -> (&'static str, &str) {
        match self {
            Locator::PartialLinkText(text) => ("partial link text", text),
            Locator::Css(selector) => ("css selector", selector),
            Locator::XPath(expr) => ("xpath", expr),
        }
    }

    /// The locator value, for log and error messages
    pub fn value(&self) -> &str {
        self.strategy().1
    }
}

/// Opaque reference to an element inside a render session
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ElementHandle(pub String);

/// Starts browser sessions
#[async_trait]
pub trait Renderer: Send + Sync {
    /// Start a new browser session
    async fn open_session(&self) -> Result<Box<dyn RenderSession>>;

    /// Name of this renderer implementation, for logging
    fn name(&self) -> &'static str;
}

/// A live browser session
///
/// Callers must call [`RenderSession::close`] on every path once the session
/// is open.
#[async_trait]
pub trait RenderSession: Send {
    /// Navigate to a URL and wait for the page load to finish
    async fn open_page(&mut self, url: &str) -> Result<()>;

    /// Wait until an element matching `locator` is displayed and enabled
    ///
    /// # Errors
    ///
    /// [`crate::Error::RenderTimeout`] when nothing becomes clickable in time.
    async fn wait_until_clickable(
        &mut self,
        locator: &Locator,
        timeout: Duration,
    ) -> Result<ElementHandle>;

    /// All elements matching `locator`, in document order
    async fn find_elements(&mut self, locator: &Locator) -> Result<Vec<ElementHandle>>;

    /// Value of an attribute, `None` if absent
    async fn attribute(&mut self, element: &ElementHandle, name: &str) -> Result<Option<String>>;

    /// Closest element with the given tag that precedes `element` in document order
    async fn nearest_preceding(
        &mut self,
        element: &ElementHandle,
        tag: &str,
    ) -> Result<Option<ElementHandle>>;

    /// Rendered text of an element
    async fn text(&mut self, element: &ElementHandle) -> Result<String>;

    /// End the session and release the browser
    async fn close(&mut self) -> Result<()>;
}
