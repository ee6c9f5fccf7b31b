//! Link resolution
//!
//! A link pulled out of an email either points straight at the archive, or at
//! a landing page whose download buttons are injected by scripts. Both cases
//! sit behind the [`LinkResolver`] trait:
//!
//! - [`DirectResolver`]: the link is the download
//! - [`RenderedResolver`]: the link is loaded in a browser and every
//!   download button on the page becomes a download
//!
//! The rendered variant drives a browser through the [`Renderer`] and
//! [`RenderSession`] traits. [`WebDriverRenderer`] implements them against any
//! W3C WebDriver server (chromedriver, geckodriver, Selenium).
//!
//! ## Usage
//!
//! ```no_run
//! use inbox_dl::config::{ResolverConfig, ResolverMode};
//! use inbox_dl::resolver::build_resolver;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ResolverConfig {
//!     mode: ResolverMode::Rendered,
//!     ..Default::default()
//! };
//! let resolver = build_resolver(&config)?;
//!
//! for download in resolver.resolve("https://share.example.com/t/abc").await? {
//!     println!("{:?} -> {}", download.filename, download.url);
//! }
//! # Ok(())
//! # }
//! ```

mod direct;
mod rendered;
mod traits;
mod webdriver;

pub use direct::DirectResolver;
pub use rendered::RenderedResolver;
pub use traits::{ElementHandle, LinkResolver, Locator, RenderSession, Renderer};
pub use webdriver::{WebDriverRenderer, WebDriverSession};

use crate::config::{ResolverConfig, ResolverMode};
use crate::error::Result;
use std::sync::Arc;

/// Build the resolver selected by `config.mode`
///
/// # Errors
///
/// Returns error if the WebDriver HTTP client cannot be created
pub fn build_resolver(config: &ResolverConfig) -> Result<Box<dyn LinkResolver>> {
    match config.mode {
        ResolverMode::Direct => Ok(Box::new(DirectResolver)),
        ResolverMode::Rendered => {
            let renderer = Arc::new(WebDriverRenderer::from_config(config)?);
            Ok(Box::new(RenderedResolver::from_config(renderer, config)))
        }
    }
}
