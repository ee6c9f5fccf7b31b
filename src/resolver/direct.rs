//! Resolver for links that point straight at the archive

use super::traits::LinkResolver;
use crate::types::ResolvedDownload;
use async_trait::async_trait;

/// Treats the extracted URL as the download itself
///
/// The filename is taken from the URL's last path segment when that segment
/// looks like a file (has an extension); otherwise it is left to the fetcher,
/// which can read `Content-Disposition`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectResolver;

impl DirectResolver {
    /// Filename implied by a URL path, if any
    pub fn filename_from_url(url: &str) -> Option<String> {
        let parsed = url::Url::parse(url).ok()?;
        let segment = parsed.path_segments()?.rev().find(|s| !s.is_empty())?;
        let decoded = urlencoding::decode(segment).ok()?;
        let name = decoded.trim();
        std::path::Path::new(name).extension()?;
        Some(name.to_string())
    }
}

#[async_trait]
impl LinkResolver for DirectResolver {
    async fn resolve(&self, url: &str) -> crate::Result<Vec<ResolvedDownload>> {
        Ok(vec![ResolvedDownload {
            filename: Self::filename_from_url(url),
            url: url.to_string(),
        }])
    }

    fn name(&self) -> &'static str {
        "direct"
    }
}
